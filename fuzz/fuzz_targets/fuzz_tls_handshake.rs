#![no_main]
use libfuzzer_sys::fuzz_target;
use minitls_tls::crypt::KeyExchangeAlg;
use minitls_tls::handshake::codec::{decode_server_hello, parse_handshake_header};
use minitls_tls::handshake::codec12::{
    decode_certificate12, decode_client_key_exchange, decode_finished12,
    decode_server_hello_done, decode_server_key_exchange,
};
use minitls_tls::handshake::HandshakeType;

fuzz_target!(|data: &[u8]| {
    let Ok((ty, body, _)) = parse_handshake_header(data) else {
        return;
    };
    match ty {
        HandshakeType::ServerHello => {
            let _ = decode_server_hello(body);
        }
        HandshakeType::Certificate => {
            let _ = decode_certificate12(body);
        }
        HandshakeType::ServerKeyExchange => {
            let _ = decode_server_key_exchange(body);
        }
        HandshakeType::ServerHelloDone => {
            let _ = decode_server_hello_done(body);
        }
        HandshakeType::ClientKeyExchange => {
            let _ = decode_client_key_exchange(body, KeyExchangeAlg::Ecdhe);
            let _ = decode_client_key_exchange(body, KeyExchangeAlg::Rsa);
        }
        HandshakeType::Finished => {
            let _ = decode_finished12(body);
        }
        _ => {}
    }
});
