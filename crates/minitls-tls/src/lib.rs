#![forbid(unsafe_code)]
#![doc = "Minimal TLS 1.2 client: handshake, key schedule, and record protection."]

pub mod alert;
pub mod client;
pub mod config;
pub mod connection12;
pub mod connection_info;
pub mod crypt;
pub mod extensions;
pub mod handshake;
pub mod http;
pub mod record;

use minitls_types::TlsError;

/// TLS protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlsVersion {
    Tls12,
}

impl TlsVersion {
    /// The on-the-wire version number.
    pub const fn wire(self) -> u16 {
        match self {
            TlsVersion::Tls12 => 0x0303,
        }
    }
}

/// TLS cipher suite identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherSuite(pub u16);

impl CipherSuite {
    // ECDHE_RSA
    pub const TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0xC02F);
    pub const TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0xC030);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA: Self = Self(0xC013);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA: Self = Self(0xC014);
    pub const TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0xC027);
    pub const TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384: Self = Self(0xC028);
    pub const TLS_ECDHE_RSA_WITH_RC4_128_SHA: Self = Self(0xC011);

    // RSA key transport
    pub const TLS_RSA_WITH_AES_128_GCM_SHA256: Self = Self(0x009C);
    pub const TLS_RSA_WITH_AES_256_GCM_SHA384: Self = Self(0x009D);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA: Self = Self(0x002F);
    pub const TLS_RSA_WITH_AES_256_CBC_SHA: Self = Self(0x0035);
    pub const TLS_RSA_WITH_AES_128_CBC_SHA256: Self = Self(0x003C);
    pub const TLS_RSA_WITH_RC4_128_SHA: Self = Self(0x0005);
}

impl std::fmt::Display for CipherSuite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match crypt::Tls12CipherSuiteParams::from_suite(*self) {
            Ok(params) => f.write_str(params.name),
            Err(_) => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// A synchronous TLS connection.
pub trait TlsConnection {
    /// Perform the TLS handshake.
    fn handshake(&mut self) -> Result<(), TlsError>;
    /// Read decrypted data into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TlsError>;
    /// Write data to be encrypted and sent.
    fn write(&mut self, buf: &[u8]) -> Result<usize, TlsError>;
    /// Shut down the TLS connection gracefully.
    fn shutdown(&mut self) -> Result<(), TlsError>;
    /// Get the negotiated TLS version.
    fn version(&self) -> Option<TlsVersion>;
    /// Get the negotiated cipher suite.
    fn cipher_suite(&self) -> Option<CipherSuite>;
}
