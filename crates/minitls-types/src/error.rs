use std::io;

/// Cryptographic operation errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },
    #[error("invalid iv length")]
    InvalidIvLength,
    #[error("aead: tag verification failed")]
    AeadTagVerifyFail,
    #[error("invalid padding")]
    InvalidPadding,
    #[error("rsa: {0}")]
    Rsa(String),
    #[error("x25519: invalid public key")]
    X25519InvalidPublicKey,
    #[error("x25519: shared secret is all zero")]
    X25519NonContributory,
    #[error("random generation failed")]
    RandFail,
    #[error("operation not supported")]
    NotSupported,
}

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Timeout, reset, unexpected EOF.
    Transport,
    /// Malformed or out-of-order messages, unsupported parameters.
    Protocol,
    /// Signature, Finished, MAC, tag or padding failures.
    Cryptographic,
}

/// Reason code attached to every failure surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    Timeout,
    Transport,
    Decode,
    UnexpectedMessage,
    UnsupportedSuite,
    UnsupportedVersion,
    SignatureFailure,
    BadMac,
    FinishedMismatch,
    PeerAlert,
    Closed,
    Internal,
}

impl FailureReason {
    pub fn class(self) -> ErrorClass {
        match self {
            FailureReason::Timeout | FailureReason::Transport | FailureReason::Closed => {
                ErrorClass::Transport
            }
            FailureReason::SignatureFailure
            | FailureReason::BadMac
            | FailureReason::FinishedMismatch => ErrorClass::Cryptographic,
            FailureReason::Decode
            | FailureReason::UnexpectedMessage
            | FailureReason::UnsupportedSuite
            | FailureReason::UnsupportedVersion
            | FailureReason::PeerAlert
            | FailureReason::Internal => ErrorClass::Protocol,
        }
    }
}

/// TLS protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("timed out: {0}")]
    Timeout(String),
    #[error("io error: {0}")]
    IoError(io::Error),
    #[error("decode error: {0}")]
    DecodeError(String),
    #[error("unexpected message: {0}")]
    UnexpectedMessage(String),
    #[error("unsupported cipher suite: 0x{0:04X}")]
    UnsupportedSuite(u16),
    #[error("no shared cipher suite")]
    NoSharedCipherSuite,
    #[error("unsupported protocol version: 0x{0:04X}")]
    UnsupportedVersion(u16),
    #[error("signature verification failed: {0}")]
    SignatureFailure(String),
    #[error("Finished verify_data mismatch")]
    FinishedMismatch,
    #[error("bad record MAC")]
    BadRecordMac,
    #[error("alert received: level={level}, description={description}")]
    AlertReceived { level: u8, description: u8 },
    #[error("handshake failed: {0}")]
    HandshakeFailed(String),
    #[error("record layer error: {0}")]
    RecordError(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

impl From<io::Error> for TlsError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TlsError::Timeout(e.to_string()),
            _ => TlsError::IoError(e),
        }
    }
}

impl TlsError {
    /// The reason code for this failure.
    pub fn reason(&self) -> FailureReason {
        match self {
            TlsError::Timeout(_) => FailureReason::Timeout,
            TlsError::IoError(_) => FailureReason::Transport,
            TlsError::DecodeError(_) | TlsError::RecordError(_) => FailureReason::Decode,
            TlsError::UnexpectedMessage(_) => FailureReason::UnexpectedMessage,
            TlsError::UnsupportedSuite(_) | TlsError::NoSharedCipherSuite => {
                FailureReason::UnsupportedSuite
            }
            TlsError::UnsupportedVersion(_) => FailureReason::UnsupportedVersion,
            TlsError::SignatureFailure(_) => FailureReason::SignatureFailure,
            TlsError::FinishedMismatch => FailureReason::FinishedMismatch,
            TlsError::BadRecordMac => FailureReason::BadMac,
            TlsError::AlertReceived { .. } => FailureReason::PeerAlert,
            TlsError::HandshakeFailed(_) => FailureReason::Internal,
            TlsError::ConnectionClosed => FailureReason::Closed,
            TlsError::CryptoError(CryptoError::AeadTagVerifyFail)
            | TlsError::CryptoError(CryptoError::InvalidPadding) => FailureReason::BadMac,
            TlsError::CryptoError(CryptoError::X25519InvalidPublicKey) => FailureReason::Decode,
            TlsError::CryptoError(_) => FailureReason::Internal,
        }
    }

    /// Transport, protocol, or cryptographic.
    pub fn class(&self) -> ErrorClass {
        self.reason().class()
    }
}
