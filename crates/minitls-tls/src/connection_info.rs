//! Connection information snapshot.
//!
//! After a TLS handshake completes, callers can query negotiated parameters
//! via the [`ConnectionInfo`] struct returned by `connection_info()`.

use crate::CipherSuite;

/// Snapshot of negotiated connection parameters after handshake.
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// The negotiated cipher suite.
    pub cipher_suite: CipherSuite,
    /// Peer certificates (DER-encoded, leaf first).
    pub peer_certificates: Vec<Vec<u8>>,
    /// Server name (SNI) used in this connection.
    pub server_name: Option<String>,
    /// Set for suites tagged legacy or insecure.
    pub insecure_suite: bool,
    /// Peer's Finished verify_data.
    pub peer_verify_data: Vec<u8>,
    /// Local Finished verify_data.
    pub local_verify_data: Vec<u8>,
}
