//! TLS 1.2 stream cipher record protection (RFC 5246 §6.2.3.1).
//!
//! Record fragment = RC4(plaintext || MAC). The keystream runs continuously
//! across records of one direction; there is no per-record IV.

use super::{
    compute_record_mac, next_seq, ContentType, Record, MAX_CIPHERTEXT_LENGTH,
    MAX_PLAINTEXT_LENGTH, TLS12_VERSION,
};
use minitls_types::{CryptoError, MacAlgId, TlsError};
use rc4::consts::U16;
use rc4::{KeyInit, Rc4, StreamCipher};
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

fn new_rc4(key: &[u8]) -> Result<Rc4<U16>, TlsError> {
    Rc4::<U16>::new_from_slice(key).map_err(|_| {
        CryptoError::InvalidKeyLength {
            expected: 16,
            got: key.len(),
        }
        .into()
    })
}

/// RC4-128 with HMAC record encryptor.
pub struct RecordEncryptor12Stream {
    cipher: Rc4<U16>,
    mac: MacAlgId,
    mac_key: Vec<u8>,
    seq: u64,
}

impl Drop for RecordEncryptor12Stream {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

impl RecordEncryptor12Stream {
    pub fn new(enc_key: &[u8], mac_key: &[u8], mac: MacAlgId) -> Result<Self, TlsError> {
        Ok(Self {
            cipher: new_rc4(enc_key)?,
            mac,
            mac_key: mac_key.to_vec(),
            seq: 0,
        })
    }

    pub fn encrypt_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Record, TlsError> {
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordError("plaintext exceeds maximum".into()));
        }
        let seq = next_seq(&mut self.seq)?;
        let mac = compute_record_mac(self.mac, &self.mac_key, seq, content_type, plaintext)?;

        let mut fragment = Vec::with_capacity(plaintext.len() + mac.len());
        fragment.extend_from_slice(plaintext);
        fragment.extend_from_slice(&mac);
        self.cipher.apply_keystream(&mut fragment);

        Ok(Record {
            content_type,
            version: TLS12_VERSION,
            fragment,
        })
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }
}

/// RC4-128 with HMAC record decryptor.
pub struct RecordDecryptor12Stream {
    cipher: Rc4<U16>,
    mac: MacAlgId,
    mac_key: Vec<u8>,
    seq: u64,
}

impl Drop for RecordDecryptor12Stream {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

impl RecordDecryptor12Stream {
    pub fn new(enc_key: &[u8], mac_key: &[u8], mac: MacAlgId) -> Result<Self, TlsError> {
        Ok(Self {
            cipher: new_rc4(enc_key)?,
            mac,
            mac_key: mac_key.to_vec(),
            seq: 0,
        })
    }

    pub fn decrypt_record(&mut self, record: &Record) -> Result<Vec<u8>, TlsError> {
        let mac_len = self.mac.output_len();
        if record.fragment.len() < mac_len {
            return Err(TlsError::RecordError("stream record too short".into()));
        }
        if record.fragment.len() > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::RecordError("record overflow".into()));
        }
        let seq = next_seq(&mut self.seq)?;

        let mut decrypted = record.fragment.clone();
        self.cipher.apply_keystream(&mut decrypted);

        let content_len = decrypted.len() - mac_len;
        let expected = compute_record_mac(
            self.mac,
            &self.mac_key,
            seq,
            record.content_type,
            &decrypted[..content_len],
        )?;
        if decrypted[content_len..].ct_eq(&expected).unwrap_u8() != 1 {
            decrypted.zeroize();
            return Err(TlsError::BadRecordMac);
        }
        decrypted.truncate(content_len);
        Ok(decrypted)
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }
}
