//! Blocking TLS 1.2 client over TCP.
//!
//! `MiniTlsClient` owns the socket: it connects with a timeout, drives the
//! handshake, runs HTTP GETs over the channel and sends close_notify.

use std::net::{IpAddr, Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use log::{debug, info, warn};

use crate::config::TlsConfig;
use crate::connection12::Tls12ClientConnection;
use crate::connection_info::ConnectionInfo;
use crate::crypt::Tls12CipherSuiteParams;
use crate::handshake::key_exchange::X25519KeyPair;
use crate::{http, CipherSuite, TlsConnection, TlsError};

/// A TLS 1.2 client connection to one server.
pub struct MiniTlsClient {
    host: String,
    conn: Tls12ClientConnection<TcpStream>,
}

impl MiniTlsClient {
    /// Connect to `host:port`, offering `cipher_suites` in order.
    ///
    /// Insecure suites are offered only if the caller lists them. When
    /// `local_key_pair` is `None` an ephemeral X25519 key is generated.
    pub fn new(
        host: &str,
        port: u16,
        connect_timeout: Duration,
        local_key_pair: Option<X25519KeyPair>,
        cipher_suites: &[CipherSuite],
    ) -> Result<Self, TlsError> {
        let listed_insecure: Vec<&str> = cipher_suites
            .iter()
            .filter_map(|s| Tls12CipherSuiteParams::from_suite(*s).ok())
            .filter(|p| p.is_insecure())
            .map(|p| p.name)
            .collect();
        if !listed_insecure.is_empty() {
            warn!("insecure suites requested: {}", listed_insecure.join(", "));
        }

        let mut builder = TlsConfig::builder()
            .cipher_suites(cipher_suites)
            .allow_insecure_suites(!listed_insecure.is_empty())
            .connect_timeout(connect_timeout)
            .read_timeout(connect_timeout);
        if host.parse::<IpAddr>().is_err() {
            builder = builder.server_name(host);
        }
        if let Some(key_pair) = local_key_pair {
            builder = builder.local_key_pair(key_pair);
        }
        Self::with_config(host, port, builder.build())
    }

    /// Connect to `host:port` with a prepared configuration.
    pub fn with_config(host: &str, port: u16, config: TlsConfig) -> Result<Self, TlsError> {
        let stream = connect_tcp(host, port, config.connect_timeout)?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        stream.set_write_timeout(Some(config.read_timeout))?;
        stream.set_nodelay(true)?;
        debug!("connected to {}", stream.peer_addr()?);
        Ok(Self {
            host: host.to_string(),
            conn: Tls12ClientConnection::new(stream, config),
        })
    }

    /// Run the handshake. Returns the server's Finished verify_data.
    ///
    /// On failure the caller should drop the client, which closes the socket.
    pub fn perform_handshake(&mut self) -> Result<Vec<u8>, TlsError> {
        self.conn.handshake()?;
        if let Some(suite) = self.conn.cipher_suite() {
            info!("TLS 1.2 session with {} using {suite}", self.host);
        }
        Ok(self.conn.peer_verify_data().to_vec())
    }

    /// GET `path` over the established channel; returns the body as text.
    pub fn get(&mut self, path: &str) -> Result<String, TlsError> {
        let resp = http::get(&mut self.conn, &self.host, path)?;
        debug!("http: status {}, {} body bytes", resp.status, resp.body.len());
        Ok(resp.body_text())
    }

    /// Send close_notify and return the record bytes sent.
    pub fn close_notify(&mut self) -> Result<Vec<u8>, TlsError> {
        self.conn.send_close_notify()
    }

    /// Send close_notify if the session got that far, then close the socket.
    pub fn close(mut self) {
        if self.conn.cipher_suite().is_some() {
            if let Err(e) = self.conn.send_close_notify() {
                debug!("close_notify failed: {e}");
            }
        }
        if let Err(e) = self.conn.get_ref().shutdown(Shutdown::Both) {
            debug!("socket shutdown: {e}");
        }
    }

    /// Negotiated parameters, once the handshake has completed.
    pub fn connection_info(&self) -> Option<ConnectionInfo> {
        self.conn.connection_info()
    }

    pub fn connection(&mut self) -> &mut Tls12ClientConnection<TcpStream> {
        &mut self.conn
    }
}

/// Connect to the first address of `host:port` that accepts within `timeout`.
fn connect_tcp(host: &str, port: u16, timeout: Duration) -> Result<TcpStream, TlsError> {
    let addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect_timeout(addr, timeout) {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last_err = Some(e);
            }
        }
    }
    match last_err {
        Some(e) => Err(e.into()),
        None => Err(TlsError::IoError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("no addresses for {host}"),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::Alert;
    use crate::record::{ContentType, RecordLayer};
    use minitls_types::FailureReason;
    use std::io::Read;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn test_connect_refused() {
        // Bind then drop to find a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = MiniTlsClient::new(
            "127.0.0.1",
            port,
            Duration::from_secs(2),
            None,
            &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256],
        )
        .err()
        .unwrap();
        assert_eq!(err.reason(), FailureReason::Transport);
    }

    #[test]
    fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            // Swallow the ClientHello and never answer.
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            thread::sleep(Duration::from_millis(800));
        });

        let mut client = MiniTlsClient::new(
            "127.0.0.1",
            port,
            Duration::from_millis(200),
            None,
            &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256],
        )
        .unwrap();
        let err = client.perform_handshake().unwrap_err();
        assert!(matches!(err, TlsError::Timeout(_)));
        assert_eq!(err.reason(), FailureReason::Timeout);
        client.close();
        server.join().unwrap();
    }

    #[test]
    fn test_close_notify_bytes_and_idempotence() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });

        let mut client = MiniTlsClient::new(
            "localhost",
            port,
            Duration::from_secs(2),
            None,
            &[CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256],
        )
        .unwrap();
        server.join().unwrap();

        // The peer is gone; sending still succeeds and yields the record.
        let bytes = client.close_notify().unwrap();
        let (record, consumed) = RecordLayer::new().parse_record(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(record.content_type, ContentType::Alert);
        assert!(Alert::decode(&record.fragment).unwrap().is_close_notify());
        assert_eq!(client.close_notify().unwrap(), bytes);
        client.close();
    }

    #[test]
    fn test_insecure_suite_listed_explicitly_is_offered() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut hello = vec![0u8; 5];
            stream.read_exact(&mut hello).unwrap();
            let len = u16::from_be_bytes([hello[3], hello[4]]) as usize;
            hello.resize(5 + len, 0);
            stream.read_exact(&mut hello[5..]).unwrap();
            hello
        });

        let mut client = MiniTlsClient::new(
            "127.0.0.1",
            port,
            Duration::from_millis(300),
            None,
            &[CipherSuite::TLS_RSA_WITH_RC4_128_SHA],
        )
        .unwrap();
        let _ = client.perform_handshake();
        let hello = server.join().unwrap();
        let (record, _) = RecordLayer::new().parse_record(&hello).unwrap();
        let ch = crate::handshake::codec::decode_client_hello(&record.fragment[4..]).unwrap();
        assert_eq!(ch.cipher_suites, vec![CipherSuite::TLS_RSA_WITH_RC4_128_SHA]);
        // IP literals are not sent as SNI.
        assert!(crate::extensions::find_extension(
            &ch.extensions,
            crate::extensions::ExtensionType::SERVER_NAME
        )
        .is_none());
    }
}
