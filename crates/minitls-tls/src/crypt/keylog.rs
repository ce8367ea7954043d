//! NSS Key Log Format support (SSLKEYLOGFILE) and the key material hook.
//!
//! Key log lines are Wireshark-compatible:
//! `CLIENT_RANDOM <client_random_hex> <master_secret_hex>`.

use super::key_schedule12::ExchangeKeys;
use crate::config::TlsConfig;
use crate::CipherSuite;

/// Everything derived for a session, handed to the key material hook once
/// the key block has been sliced.
pub struct KeyMaterialEvent<'a> {
    pub suite: CipherSuite,
    pub client_random: &'a [u8; 32],
    pub server_random: &'a [u8; 32],
    pub master_secret: &'a [u8],
    pub keys: &'a ExchangeKeys,
}

/// Convert bytes to lowercase hex string.
pub(crate) fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Log a key material line in NSS key log format.
///
/// Calls the `key_log_callback` on `config` (if set) with a line:
/// `<label> <client_random_hex> <secret_hex>`
pub fn log_key(config: &TlsConfig, label: &str, client_random: &[u8; 32], secret: &[u8]) {
    if let Some(cb) = &config.key_log_callback {
        let line = format!("{} {} {}", label, to_hex(client_random), to_hex(secret));
        cb(&line);
    }
}

/// Log the TLS 1.2 master secret.
pub fn log_master_secret(config: &TlsConfig, client_random: &[u8; 32], master_secret: &[u8]) {
    log_key(config, "CLIENT_RANDOM", client_random, master_secret);
}

/// Hand the derived session material to the configured hook, if any.
pub fn report_key_material(config: &TlsConfig, event: &KeyMaterialEvent<'_>) {
    if let Some(hook) = &config.key_material_hook {
        hook(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn capture() -> (Arc<Mutex<Vec<String>>>, TlsConfig) {
        let lines: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let lines_clone = lines.clone();
        let config = TlsConfig::builder()
            .key_log(Arc::new(move |line: &str| {
                lines_clone.lock().unwrap().push(line.to_string());
            }))
            .build();
        (lines, config)
    }

    #[test]
    fn test_to_hex() {
        assert_eq!(to_hex(&[0x01, 0xab, 0xff]), "01abff");
        assert_eq!(to_hex(&[]), "");
    }

    #[test]
    fn test_log_key_no_callback() {
        let config = TlsConfig::builder().build();
        log_key(&config, "CLIENT_RANDOM", &[0u8; 32], &[1, 2, 3]);
    }

    #[test]
    fn test_log_master_secret_nss_format() {
        let (lines, config) = capture();
        log_master_secret(&config, &[0x42; 32], &[0xFF; 48]);

        let logged = lines.lock().unwrap();
        assert_eq!(logged.len(), 1);
        let parts: Vec<&str> = logged[0].split(' ').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "CLIENT_RANDOM");
        assert_eq!(parts[1], "42".repeat(32));
        assert_eq!(parts[2], "ff".repeat(48));
    }

    #[test]
    fn test_report_key_material() {
        let seen: Arc<Mutex<Vec<(u16, usize)>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let config = TlsConfig::builder()
            .key_material_hook(Arc::new(move |ev: &KeyMaterialEvent<'_>| {
                seen_clone
                    .lock()
                    .unwrap()
                    .push((ev.suite.0, ev.keys.client_write_key.len()));
            }))
            .build();

        let keys = ExchangeKeys {
            client_write_mac_key: vec![],
            server_write_mac_key: vec![],
            client_write_key: vec![1; 16],
            server_write_key: vec![2; 16],
            client_write_iv: vec![3; 4],
            server_write_iv: vec![4; 4],
        };
        report_key_material(
            &config,
            &KeyMaterialEvent {
                suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
                client_random: &[0; 32],
                server_random: &[1; 32],
                master_secret: &[9; 48],
                keys: &keys,
            },
        );
        assert_eq!(*seen.lock().unwrap(), vec![(0xC02F, 16)]);
    }
}
