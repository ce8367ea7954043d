//! Integration tests for minitls.
//! Drives `MiniTlsClient` end to end against a loopback TLS 1.2 server.

#[cfg(test)]
mod test_server;

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use minitls_tls::alert::{Alert, AlertDescription, AlertLevel};
    use minitls_tls::client::MiniTlsClient;
    use minitls_tls::config::TlsConfig;
    use minitls_tls::crypt::keylog::KeyMaterialEvent;
    use minitls_tls::crypt::CIPHER_SUITES;
    use minitls_tls::handshake::key_exchange::{ByteOrder, X25519KeyPair};
    use minitls_tls::record::{ContentType, RecordLayer};
    use minitls_tls::CipherSuite;
    use minitls_types::{ErrorClass, FailureReason, TlsError};

    use crate::test_server::{
        ServerOptions, TestServer, LARGE_BODY_LEN, NAME_BODY, SERVER_CERT_DER,
    };

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn connect(server: &TestServer, suites: &[CipherSuite]) -> MiniTlsClient {
        MiniTlsClient::new("localhost", server.port(), TIMEOUT, None, suites).unwrap()
    }

    /// Header check only: the payload is protected under the session keys.
    fn assert_close_notify_record(bytes: &[u8]) {
        assert_eq!(bytes[0], ContentType::Alert as u8);
        assert_eq!(&bytes[1..3], &[0x03, 0x03]);
        let len = u16::from_be_bytes([bytes[3], bytes[4]]) as usize;
        assert_eq!(bytes.len(), 5 + len);
    }

    // -------------------------------------------------------
    // 1. Every registered suite: handshake, GET, close_notify
    // -------------------------------------------------------
    #[test]
    fn test_every_suite_end_to_end() {
        for params in CIPHER_SUITES {
            let server = TestServer::spawn(ServerOptions::default());
            let mut client = connect(&server, &[params.suite]);

            let verify_data = client.perform_handshake().unwrap();
            assert_eq!(verify_data.len(), 12, "{}", params.name);

            let info = client.connection_info().unwrap();
            assert_eq!(info.cipher_suite, params.suite);
            assert_eq!(info.insecure_suite, params.is_insecure());
            assert_eq!(info.server_name.as_deref(), Some("localhost"));
            assert_eq!(info.peer_certificates, vec![SERVER_CERT_DER.to_vec()]);

            assert_eq!(client.get("/name").unwrap(), NAME_BODY, "{}", params.name);

            let bytes = client.close_notify().unwrap();
            assert_close_notify_record(&bytes);
            client.close();

            let outcome = server.join().unwrap();
            assert_eq!(outcome.suite, Some(params.suite));
            assert_eq!(outcome.server_verify_data, verify_data);
            assert_eq!(
                outcome.request_line.as_deref(),
                Some("GET /name HTTP/1.1")
            );
            assert!(outcome.client_close_notify, "{}", params.name);
        }
    }

    // -------------------------------------------------------
    // 2. Client preference order is honored
    // -------------------------------------------------------
    #[test]
    fn test_client_preference_order() {
        let server = TestServer::spawn(ServerOptions::default());
        let suites = [
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
            CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        ];
        let mut client = connect(&server, &suites);
        client.perform_handshake().unwrap();
        client.get("/name").unwrap();
        client.close();

        let outcome = server.join().unwrap();
        assert_eq!(outcome.offered_suites, suites.to_vec());
        assert_eq!(outcome.suite, Some(suites[0]));
    }

    // -------------------------------------------------------
    // 3. Insecure suites are only offered when listed
    // -------------------------------------------------------
    #[test]
    fn test_default_offer_excludes_insecure_suites() {
        let server = TestServer::spawn(ServerOptions::default());
        let config = TlsConfig::builder().server_name("localhost").build();
        let mut client = MiniTlsClient::with_config("localhost", server.port(), config).unwrap();
        client.perform_handshake().unwrap();
        client.get("/name").unwrap();
        client.close();

        let outcome = server.join().unwrap();
        assert!(!outcome.offered_suites.is_empty());
        assert!(!outcome
            .offered_suites
            .contains(&CipherSuite::TLS_RSA_WITH_RC4_128_SHA));
        assert!(!outcome
            .offered_suites
            .contains(&CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256));
    }

    // -------------------------------------------------------
    // 4. No shared suite: the server's alert surfaces
    // -------------------------------------------------------
    #[test]
    fn test_no_shared_suite() {
        let server = TestServer::spawn(ServerOptions {
            suites: vec![CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA],
            ..Default::default()
        });
        let mut client = connect(&server, &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256]);
        let err = client.perform_handshake().unwrap_err();
        match err {
            TlsError::AlertReceived { level, description } => {
                assert_eq!(level, AlertLevel::Fatal as u8);
                assert_eq!(description, AlertDescription::HandshakeFailure as u8);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(client.connection_info().is_none());
        client.close();
        server.join().unwrap();
    }

    // -------------------------------------------------------
    // 5. Forged ServerKeyExchange signature
    // -------------------------------------------------------
    #[test]
    fn test_bad_signature_aborts_with_decrypt_error() {
        let server = TestServer::spawn(ServerOptions {
            corrupt_signature: true,
            ..Default::default()
        });
        let mut client = connect(&server, &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384]);
        let err = client.perform_handshake().unwrap_err();
        assert!(matches!(err, TlsError::SignatureFailure(_)));
        assert_eq!(err.reason(), FailureReason::SignatureFailure);
        assert_eq!(err.class(), ErrorClass::Cryptographic);
        client.close();

        let outcome = server.join().unwrap();
        assert_eq!(
            outcome.client_alert,
            Some(Alert::fatal(AlertDescription::DecryptError))
        );
        assert!(outcome.client_public.is_none());
    }

    // -------------------------------------------------------
    // 6. Stalled server: read timeout
    // -------------------------------------------------------
    #[test]
    fn test_stalled_server_times_out() {
        let server = TestServer::spawn(ServerOptions {
            stall_after_hello: Some(Duration::from_millis(1500)),
            ..Default::default()
        });
        let mut client = MiniTlsClient::new(
            "localhost",
            server.port(),
            Duration::from_millis(300),
            None,
            &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256],
        )
        .unwrap();
        let err = client.perform_handshake().unwrap_err();
        assert_eq!(err.reason(), FailureReason::Timeout);
        assert_eq!(err.class(), ErrorClass::Transport);
        client.close();
        server.join().unwrap();
    }

    // -------------------------------------------------------
    // 7. Caller-supplied key pair is used for the exchange
    // -------------------------------------------------------
    #[test]
    fn test_fixed_local_key_pair() {
        let key_pair = X25519KeyPair::from_private_bytes([0x42; 32]);
        let expected = key_pair.encode_public(ByteOrder::LittleEndian).to_vec();

        let server = TestServer::spawn(ServerOptions::default());
        let mut client = MiniTlsClient::new(
            "localhost",
            server.port(),
            TIMEOUT,
            Some(key_pair),
            &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256],
        )
        .unwrap();
        client.perform_handshake().unwrap();
        client.get("/name").unwrap();
        client.close();

        let outcome = server.join().unwrap();
        assert_eq!(outcome.client_public, Some(expected));
    }

    // -------------------------------------------------------
    // 8. Key log and key material hook see the server's master secret
    // -------------------------------------------------------
    #[test]
    fn test_key_log_matches_server_master_secret() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink = lines.clone();
        let key_block_len = Arc::new(Mutex::new(0usize));
        let hook_sink = key_block_len.clone();

        let server = TestServer::spawn(ServerOptions::default());
        let config = TlsConfig::builder()
            .server_name("localhost")
            .cipher_suites(&[CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA])
            .key_log(Arc::new(move |line: &str| {
                sink.lock().unwrap().push(line.to_string());
            }))
            .key_material_hook(Arc::new(move |event: &KeyMaterialEvent<'_>| {
                *hook_sink.lock().unwrap() = event.keys.total_len();
            }))
            .build();
        let mut client = MiniTlsClient::with_config("localhost", server.port(), config).unwrap();
        client.perform_handshake().unwrap();
        client.get("/name").unwrap();
        client.close();

        let outcome = server.join().unwrap();
        let ms_hex: String = outcome
            .master_secret
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let lines = lines.lock().unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("CLIENT_RANDOM "));
        assert!(lines[0].ends_with(&ms_hex));
        // 2 x (20 MAC + 32 key + 16 IV)
        assert_eq!(*key_block_len.lock().unwrap(), 136);
    }

    // -------------------------------------------------------
    // 9. Responses spanning many records
    // -------------------------------------------------------
    #[test]
    fn test_large_response() {
        let server = TestServer::spawn(ServerOptions::default());
        let mut client = connect(&server, &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256]);
        client.perform_handshake().unwrap();
        let body = client.get("/large").unwrap();
        assert_eq!(body.len(), LARGE_BODY_LEN);
        assert!(body.starts_with("abcdefghijklmnopqrstuvwxyzabc"));
        client.close();
        server.join().unwrap();
    }

    // -------------------------------------------------------
    // 10. close_notify before any handshake is still a valid alert
    // -------------------------------------------------------
    #[test]
    fn test_close_notify_without_session() {
        let server = TestServer::spawn(ServerOptions::default());
        let mut client = connect(&server, &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256]);
        let bytes = client.close_notify().unwrap();
        let (record, _) = RecordLayer::new().parse_record(&bytes).unwrap();
        let alert = Alert::decode(&record.fragment).unwrap();
        assert!(alert.is_close_notify());
        assert_eq!(alert.level, AlertLevel::Warning);
        client.close();

        let outcome = server.join().unwrap();
        assert!(outcome.client_close_notify);
        assert!(outcome.suite.is_none());
    }
}
