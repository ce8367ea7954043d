//! TLS alert protocol (RFC 5246 §7.2).

use minitls_types::{FailureReason, TlsError};

/// Alert severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertLevel {
    Warning = 1,
    Fatal = 2,
}

/// Alert description codes used by TLS 1.2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AlertDescription {
    CloseNotify = 0,
    UnexpectedMessage = 10,
    BadRecordMac = 20,
    RecordOverflow = 22,
    HandshakeFailure = 40,
    BadCertificate = 42,
    UnsupportedCertificate = 43,
    CertificateUnknown = 46,
    IllegalParameter = 47,
    DecodeError = 50,
    DecryptError = 51,
    ProtocolVersion = 70,
    InsufficientSecurity = 71,
    InternalError = 80,
    UserCanceled = 90,
    NoRenegotiation = 100,
    UnsupportedExtension = 110,
}

/// Alert body length: level(1) || description(1).
pub const ALERT_LEN: usize = 2;

/// A TLS alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alert {
    pub level: AlertLevel,
    pub description: AlertDescription,
}

impl AlertLevel {
    /// Convert from u8 to AlertLevel.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            1 => Ok(AlertLevel::Warning),
            2 => Ok(AlertLevel::Fatal),
            _ => Err(v),
        }
    }
}

impl AlertDescription {
    /// Convert from u8 to AlertDescription.
    pub fn from_u8(v: u8) -> Result<Self, u8> {
        match v {
            0 => Ok(AlertDescription::CloseNotify),
            10 => Ok(AlertDescription::UnexpectedMessage),
            20 => Ok(AlertDescription::BadRecordMac),
            22 => Ok(AlertDescription::RecordOverflow),
            40 => Ok(AlertDescription::HandshakeFailure),
            42 => Ok(AlertDescription::BadCertificate),
            43 => Ok(AlertDescription::UnsupportedCertificate),
            46 => Ok(AlertDescription::CertificateUnknown),
            47 => Ok(AlertDescription::IllegalParameter),
            50 => Ok(AlertDescription::DecodeError),
            51 => Ok(AlertDescription::DecryptError),
            70 => Ok(AlertDescription::ProtocolVersion),
            71 => Ok(AlertDescription::InsufficientSecurity),
            80 => Ok(AlertDescription::InternalError),
            90 => Ok(AlertDescription::UserCanceled),
            100 => Ok(AlertDescription::NoRenegotiation),
            110 => Ok(AlertDescription::UnsupportedExtension),
            _ => Err(v),
        }
    }
}

impl Alert {
    pub const CLOSE_NOTIFY: Alert = Alert {
        level: AlertLevel::Warning,
        description: AlertDescription::CloseNotify,
    };

    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::Fatal,
            description,
        }
    }

    pub fn encode(&self) -> [u8; ALERT_LEN] {
        [self.level as u8, self.description as u8]
    }

    /// Decode an alert record payload (exactly two bytes).
    pub fn decode(data: &[u8]) -> Result<Self, TlsError> {
        let &[level, description] = data else {
            return Err(TlsError::DecodeError(format!(
                "alert must be {ALERT_LEN} bytes, got {}",
                data.len()
            )));
        };
        let level = AlertLevel::from_u8(level)
            .map_err(|v| TlsError::DecodeError(format!("unknown alert level {v}")))?;
        let description = AlertDescription::from_u8(description)
            .map_err(|v| TlsError::DecodeError(format!("unknown alert description {v}")))?;
        Ok(Self { level, description })
    }

    pub fn is_close_notify(&self) -> bool {
        self.description == AlertDescription::CloseNotify
    }
}

/// The fatal alert sent to the peer when a handshake fails for `err`.
pub fn alert_for_error(err: &TlsError) -> AlertDescription {
    match err.reason() {
        FailureReason::Decode => AlertDescription::DecodeError,
        FailureReason::UnexpectedMessage => AlertDescription::UnexpectedMessage,
        FailureReason::UnsupportedSuite => AlertDescription::HandshakeFailure,
        FailureReason::UnsupportedVersion => AlertDescription::ProtocolVersion,
        FailureReason::SignatureFailure | FailureReason::FinishedMismatch => {
            AlertDescription::DecryptError
        }
        FailureReason::BadMac => AlertDescription::BadRecordMac,
        FailureReason::Timeout
        | FailureReason::Transport
        | FailureReason::PeerAlert
        | FailureReason::Closed
        | FailureReason::Internal => AlertDescription::InternalError,
    }
}
