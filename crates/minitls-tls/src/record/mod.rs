//! TLS record layer: parsing, serialization, and per-direction protection.

pub mod encryption12;
pub mod encryption12_cbc;
pub mod encryption12_stream;

use crate::crypt::hash::hmac_hash_parts;
use crate::crypt::key_schedule12::DirectionKeys;
use crate::crypt::{BulkCipherKind, Tls12CipherSuiteParams};
use encryption12::{RecordDecryptor12, RecordEncryptor12};
use encryption12_cbc::{RecordDecryptor12Cbc, RecordEncryptor12Cbc};
use encryption12_stream::{RecordDecryptor12Stream, RecordEncryptor12Stream};
use minitls_types::{MacAlgId, TlsError};

/// TLS 1.2 record version (0x0303).
pub const TLS12_VERSION: u16 = 0x0303;

/// Record header length: type(1) || version(2) || length(2).
pub const RECORD_HEADER_LEN: usize = 5;

/// Maximum plaintext fragment length (2^14).
pub const MAX_PLAINTEXT_LENGTH: usize = 16384;

/// Maximum protected fragment length (2^14 + 2048).
pub const MAX_CIPHERTEXT_LENGTH: usize = MAX_PLAINTEXT_LENGTH + 2048;

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ContentType {
    ChangeCipherSpec = 20,
    Alert = 21,
    Handshake = 22,
    ApplicationData = 23,
}

impl ContentType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            20 => Some(Self::ChangeCipherSpec),
            21 => Some(Self::Alert),
            22 => Some(Self::Handshake),
            23 => Some(Self::ApplicationData),
            _ => None,
        }
    }
}

/// A parsed TLS record.
#[derive(Debug, Clone)]
pub struct Record {
    pub content_type: ContentType,
    pub version: u16,
    pub fragment: Vec<u8>,
}

/// Return the current sequence number and advance it. Fails instead of wrapping.
pub(crate) fn next_seq(seq: &mut u64) -> Result<u64, TlsError> {
    if *seq == u64::MAX {
        return Err(TlsError::RecordError("sequence number overflow".into()));
    }
    let current = *seq;
    *seq += 1;
    Ok(current)
}

/// Record MAC for the CBC and stream families.
///
/// MAC = HMAC(mac_key, seq(8) || type(1) || version(2) || length(2) || fragment)
pub(crate) fn compute_record_mac(
    mac: MacAlgId,
    mac_key: &[u8],
    seq: u64,
    content_type: ContentType,
    fragment: &[u8],
) -> Result<Vec<u8>, TlsError> {
    hmac_hash_parts(
        mac.hash(),
        mac_key,
        &[
            &seq.to_be_bytes(),
            &[content_type as u8],
            &TLS12_VERSION.to_be_bytes(),
            &(fragment.len() as u16).to_be_bytes(),
            fragment,
        ],
    )
}

/// Write-side protection for the negotiated suite.
pub enum RecordEncryptor {
    Aead(RecordEncryptor12),
    Cbc(RecordEncryptor12Cbc),
    Stream(RecordEncryptor12Stream),
}

impl RecordEncryptor {
    pub fn new(params: &Tls12CipherSuiteParams, keys: DirectionKeys<'_>) -> Result<Self, TlsError> {
        Ok(match params.bulk {
            BulkCipherKind::Aead => {
                Self::Aead(RecordEncryptor12::new(params.cipher, keys.key, keys.iv)?)
            }
            BulkCipherKind::Cbc => Self::Cbc(RecordEncryptor12Cbc::new(
                keys.key,
                keys.mac_key,
                mac_of(params)?,
            )?),
            BulkCipherKind::Stream => Self::Stream(RecordEncryptor12Stream::new(
                keys.key,
                keys.mac_key,
                mac_of(params)?,
            )?),
        })
    }

    pub fn encrypt_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Record, TlsError> {
        match self {
            Self::Aead(e) => e.encrypt_record(content_type, plaintext),
            Self::Cbc(e) => e.encrypt_record(content_type, plaintext),
            Self::Stream(e) => e.encrypt_record(content_type, plaintext),
        }
    }

    pub fn sequence_number(&self) -> u64 {
        match self {
            Self::Aead(e) => e.sequence_number(),
            Self::Cbc(e) => e.sequence_number(),
            Self::Stream(e) => e.sequence_number(),
        }
    }
}

/// Read-side protection for the negotiated suite.
pub enum RecordDecryptor {
    Aead(RecordDecryptor12),
    Cbc(RecordDecryptor12Cbc),
    Stream(RecordDecryptor12Stream),
}

impl RecordDecryptor {
    pub fn new(params: &Tls12CipherSuiteParams, keys: DirectionKeys<'_>) -> Result<Self, TlsError> {
        Ok(match params.bulk {
            BulkCipherKind::Aead => {
                Self::Aead(RecordDecryptor12::new(params.cipher, keys.key, keys.iv)?)
            }
            BulkCipherKind::Cbc => Self::Cbc(RecordDecryptor12Cbc::new(
                keys.key,
                keys.mac_key,
                mac_of(params)?,
            )?),
            BulkCipherKind::Stream => Self::Stream(RecordDecryptor12Stream::new(
                keys.key,
                keys.mac_key,
                mac_of(params)?,
            )?),
        })
    }

    pub fn decrypt_record(&mut self, record: &Record) -> Result<Vec<u8>, TlsError> {
        match self {
            Self::Aead(d) => d.decrypt_record(record),
            Self::Cbc(d) => d.decrypt_record(record),
            Self::Stream(d) => d.decrypt_record(record),
        }
    }

    pub fn sequence_number(&self) -> u64 {
        match self {
            Self::Aead(d) => d.sequence_number(),
            Self::Cbc(d) => d.sequence_number(),
            Self::Stream(d) => d.sequence_number(),
        }
    }
}

fn mac_of(params: &Tls12CipherSuiteParams) -> Result<MacAlgId, TlsError> {
    params
        .mac
        .ok_or_else(|| TlsError::HandshakeFailed(format!("{} has no record MAC", params.name)))
}

/// Record layer state for reading and writing TLS records.
///
/// Starts in plaintext mode. Write protection is activated after the client
/// sends ChangeCipherSpec, read protection after the server's arrives; each
/// direction keeps its own sequence number starting at 0.
pub struct RecordLayer {
    /// Maximum plaintext per outgoing record (default: 16384). Incoming
    /// records are bounded by the protocol limits.
    pub max_fragment_size: usize,
    encryptor: Option<RecordEncryptor>,
    decryptor: Option<RecordDecryptor>,
}

impl RecordLayer {
    pub fn new() -> Self {
        Self {
            max_fragment_size: MAX_PLAINTEXT_LENGTH,
            encryptor: None,
            decryptor: None,
        }
    }

    /// Returns true if write encryption is active.
    pub fn is_encrypting(&self) -> bool {
        self.encryptor.is_some()
    }

    /// Returns true if read decryption is active.
    pub fn is_decrypting(&self) -> bool {
        self.decryptor.is_some()
    }

    /// Activate write protection. The sequence number starts at 0.
    pub fn activate_write_encryption(
        &mut self,
        params: &Tls12CipherSuiteParams,
        keys: DirectionKeys<'_>,
    ) -> Result<(), TlsError> {
        self.encryptor = Some(RecordEncryptor::new(params, keys)?);
        Ok(())
    }

    /// Activate read protection. The sequence number starts at 0.
    pub fn activate_read_decryption(
        &mut self,
        params: &Tls12CipherSuiteParams,
        keys: DirectionKeys<'_>,
    ) -> Result<(), TlsError> {
        self.decryptor = Some(RecordDecryptor::new(params, keys)?);
        Ok(())
    }

    /// Write sequence number, if protection is active.
    pub fn write_sequence_number(&self) -> Option<u64> {
        self.encryptor.as_ref().map(RecordEncryptor::sequence_number)
    }

    /// Read sequence number, if protection is active.
    pub fn read_sequence_number(&self) -> Option<u64> {
        self.decryptor.as_ref().map(RecordDecryptor::sequence_number)
    }

    /// Encrypt (if active) and serialize a record for sending.
    pub fn seal_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        if plaintext.len() > self.max_fragment_size {
            return Err(TlsError::RecordError(
                "plaintext exceeds max fragment size".into(),
            ));
        }
        let record = match &mut self.encryptor {
            Some(enc) => enc.encrypt_record(content_type, plaintext)?,
            None => Record {
                content_type,
                version: TLS12_VERSION,
                fragment: plaintext.to_vec(),
            },
        };
        Ok(self.serialize_record(&record))
    }

    /// Parse and, once read protection is active, decrypt an incoming record.
    ///
    /// Returns (content_type, plaintext, bytes_consumed).
    pub fn open_record(&mut self, data: &[u8]) -> Result<(ContentType, Vec<u8>, usize), TlsError> {
        let (record, consumed) = self.parse_record(data)?;
        let plaintext = match &mut self.decryptor {
            Some(dec) => dec.decrypt_record(&record)?,
            None => record.fragment,
        };
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordError("record overflow".into()));
        }
        Ok((record.content_type, plaintext, consumed))
    }

    /// Parse a TLS record from the given bytes.
    pub fn parse_record(&self, data: &[u8]) -> Result<(Record, usize), TlsError> {
        if data.len() < RECORD_HEADER_LEN {
            return Err(TlsError::RecordError("incomplete record header".into()));
        }

        let content_type = ContentType::from_u8(data[0])
            .ok_or_else(|| TlsError::RecordError("unknown content type".into()))?;

        let version = u16::from_be_bytes([data[1], data[2]]);
        if version >> 8 != 0x03 {
            return Err(TlsError::UnsupportedVersion(version));
        }
        let length = u16::from_be_bytes([data[3], data[4]]) as usize;

        if length > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::RecordError("record too large".into()));
        }

        if data.len() < RECORD_HEADER_LEN + length {
            return Err(TlsError::RecordError("incomplete record body".into()));
        }

        let fragment = data[RECORD_HEADER_LEN..RECORD_HEADER_LEN + length].to_vec();
        Ok((
            Record {
                content_type,
                version,
                fragment,
            },
            RECORD_HEADER_LEN + length,
        ))
    }

    /// Serialize a TLS record to bytes.
    pub fn serialize_record(&self, record: &Record) -> Vec<u8> {
        let mut buf = Vec::with_capacity(RECORD_HEADER_LEN + record.fragment.len());
        buf.push(record.content_type as u8);
        buf.extend_from_slice(&record.version.to_be_bytes());
        buf.extend_from_slice(&(record.fragment.len() as u16).to_be_bytes());
        buf.extend_from_slice(&record.fragment);
        buf
    }
}

impl Default for RecordLayer {
    fn default() -> Self {
        Self::new()
    }
}
