#![no_main]
use libfuzzer_sys::fuzz_target;
use minitls_tls::alert::Alert;
use minitls_tls::record::{ContentType, RecordLayer};

fuzz_target!(|data: &[u8]| {
    let mut layer = RecordLayer::new();
    if let Ok((ct, plaintext, consumed)) = layer.open_record(data) {
        assert!(consumed <= data.len());
        if ct == ContentType::Alert {
            let _ = Alert::decode(&plaintext);
        }
    }
});
