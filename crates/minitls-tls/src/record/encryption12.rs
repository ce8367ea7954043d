//! TLS 1.2 AEAD record encryption with explicit nonce (RFC 5246 §6.2.3.3).
//!
//! For GCM cipher suites, the nonce is `fixed_iv(4) || explicit_nonce(8)`.
//! The explicit nonce is sent with each record (prepended to ciphertext).
//! AAD is 13 bytes: `seq_num(8) || type(1) || version(2) || plaintext_length(2)`.

use super::{next_seq, ContentType, Record, MAX_CIPHERTEXT_LENGTH, MAX_PLAINTEXT_LENGTH, TLS12_VERSION};
use crate::crypt::aead::{create_aead, TlsAead, GCM_NONCE_LEN};
use minitls_types::{CipherAlgId, CryptoError, TlsError};
use zeroize::Zeroize;

/// Fixed (implicit) IV length for GCM (4 bytes).
pub const FIXED_IV_LEN: usize = 4;

/// Explicit nonce length for GCM (8 bytes).
pub const EXPLICIT_NONCE_LEN: usize = 8;

/// Build the TLS 1.2 GCM nonce: fixed_iv(4) || explicit_nonce(8).
fn build_nonce_tls12(fixed_iv: &[u8], explicit_nonce: &[u8; EXPLICIT_NONCE_LEN]) -> [u8; GCM_NONCE_LEN] {
    let mut nonce = [0u8; GCM_NONCE_LEN];
    nonce[..FIXED_IV_LEN].copy_from_slice(fixed_iv);
    nonce[FIXED_IV_LEN..].copy_from_slice(explicit_nonce);
    nonce
}

/// Build the TLS 1.2 AAD (13 bytes):
/// `seq_num(8) || content_type(1) || version(2) || plaintext_length(2)`
fn build_aad_tls12(seq: u64, content_type: ContentType, plaintext_len: u16) -> [u8; 13] {
    let mut aad = [0u8; 13];
    aad[..8].copy_from_slice(&seq.to_be_bytes());
    aad[8] = content_type as u8;
    aad[9..11].copy_from_slice(&TLS12_VERSION.to_be_bytes());
    aad[11..13].copy_from_slice(&plaintext_len.to_be_bytes());
    aad
}

fn check_fixed_iv(fixed_iv: &[u8]) -> Result<(), TlsError> {
    if fixed_iv.len() != FIXED_IV_LEN {
        return Err(CryptoError::InvalidIvLength.into());
    }
    Ok(())
}

/// Encrypts TLS 1.2 GCM records.
///
/// The record fragment format is: `explicit_nonce(8) || ciphertext || tag(16)`.
pub struct RecordEncryptor12 {
    aead: Box<dyn TlsAead>,
    fixed_iv: Vec<u8>,
    seq: u64,
}

impl Drop for RecordEncryptor12 {
    fn drop(&mut self) {
        self.fixed_iv.zeroize();
    }
}

impl RecordEncryptor12 {
    /// `key` is the write key, `fixed_iv` is the 4-byte IV from the key block.
    pub fn new(cipher: CipherAlgId, key: &[u8], fixed_iv: &[u8]) -> Result<Self, TlsError> {
        check_fixed_iv(fixed_iv)?;
        Ok(Self {
            aead: create_aead(cipher, key)?,
            fixed_iv: fixed_iv.to_vec(),
            seq: 0,
        })
    }

    /// Encrypt a plaintext record.
    ///
    /// Returns a Record where fragment = `explicit_nonce(8) || ciphertext || tag(16)`.
    pub fn encrypt_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Record, TlsError> {
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordError(
                "plaintext exceeds maximum fragment length".into(),
            ));
        }
        let seq = next_seq(&mut self.seq)?;

        // explicit nonce = sequence number
        let explicit_nonce = seq.to_be_bytes();
        let nonce = build_nonce_tls12(&self.fixed_iv, &explicit_nonce);
        let aad = build_aad_tls12(seq, content_type, plaintext.len() as u16);

        let ciphertext = self.aead.encrypt(&nonce, &aad, plaintext)?;

        let mut fragment = Vec::with_capacity(EXPLICIT_NONCE_LEN + ciphertext.len());
        fragment.extend_from_slice(&explicit_nonce);
        fragment.extend_from_slice(&ciphertext);

        Ok(Record {
            content_type,
            version: TLS12_VERSION,
            fragment,
        })
    }

    /// Current write sequence number.
    pub fn sequence_number(&self) -> u64 {
        self.seq
    }

    #[cfg(test)]
    pub(crate) fn set_sequence_number(&mut self, seq: u64) {
        self.seq = seq;
    }
}

/// Decrypts TLS 1.2 GCM records.
pub struct RecordDecryptor12 {
    aead: Box<dyn TlsAead>,
    fixed_iv: Vec<u8>,
    seq: u64,
    tag_len: usize,
}

impl Drop for RecordDecryptor12 {
    fn drop(&mut self) {
        self.fixed_iv.zeroize();
    }
}

impl RecordDecryptor12 {
    pub fn new(cipher: CipherAlgId, key: &[u8], fixed_iv: &[u8]) -> Result<Self, TlsError> {
        check_fixed_iv(fixed_iv)?;
        let aead = create_aead(cipher, key)?;
        let tag_len = aead.tag_size();
        Ok(Self {
            aead,
            fixed_iv: fixed_iv.to_vec(),
            seq: 0,
            tag_len,
        })
    }

    /// Decrypt a TLS 1.2 GCM record.
    ///
    /// The fragment must contain: `explicit_nonce(8) || ciphertext || tag(16)`.
    /// The content type comes from the record header.
    pub fn decrypt_record(&mut self, record: &Record) -> Result<Vec<u8>, TlsError> {
        if record.fragment.len() < EXPLICIT_NONCE_LEN + self.tag_len {
            return Err(TlsError::RecordError("encrypted record too short".into()));
        }
        if record.fragment.len() > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::RecordError("record overflow".into()));
        }

        let (nonce_bytes, ciphertext_with_tag) = record.fragment.split_at(EXPLICIT_NONCE_LEN);
        let mut explicit_nonce = [0u8; EXPLICIT_NONCE_LEN];
        explicit_nonce.copy_from_slice(nonce_bytes);

        let plaintext_len = ciphertext_with_tag.len() - self.tag_len;
        let nonce = build_nonce_tls12(&self.fixed_iv, &explicit_nonce);
        let seq = next_seq(&mut self.seq)?;
        let aad = build_aad_tls12(seq, record.content_type, plaintext_len as u16);

        self.aead
            .decrypt(&nonce, &aad, ciphertext_with_tag)
            .map_err(|_| TlsError::BadRecordMac)
    }

    /// Current read sequence number.
    pub fn sequence_number(&self) -> u64 {
        self.seq
    }
}
