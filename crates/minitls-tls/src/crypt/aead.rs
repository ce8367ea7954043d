//! TLS AEAD cipher abstraction.
//!
//! Wraps AES-GCM behind a trait so the record layer does not depend on the
//! key size.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use minitls_types::{CipherAlgId, CryptoError, TlsError};

pub const GCM_NONCE_LEN: usize = 12;
pub const GCM_TAG_LEN: usize = 16;

/// Trait for TLS record-layer AEAD operations.
pub trait TlsAead: Send + Sync {
    /// Encrypt plaintext with AEAD. Returns `ciphertext || tag`.
    fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, TlsError>;

    /// Decrypt `ciphertext || tag` with AEAD. Returns plaintext.
    fn decrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        ciphertext_with_tag: &[u8],
    ) -> Result<Vec<u8>, TlsError>;

    /// Tag size in bytes.
    fn tag_size(&self) -> usize;
}

enum GcmKey {
    Aes128(Box<Aes128Gcm>),
    Aes256(Box<Aes256Gcm>),
}

/// AES-GCM AEAD (128-bit or 256-bit key).
pub struct AesGcmAead {
    key: GcmKey,
}

impl AesGcmAead {
    pub fn new(key: &[u8]) -> Result<Self, TlsError> {
        let invalid = || CryptoError::InvalidKeyLength {
            expected: 16,
            got: key.len(),
        };
        let key = match key.len() {
            16 => GcmKey::Aes128(Box::new(Aes128Gcm::new_from_slice(key).map_err(|_| invalid())?)),
            32 => GcmKey::Aes256(Box::new(Aes256Gcm::new_from_slice(key).map_err(|_| invalid())?)),
            _ => return Err(invalid().into()),
        };
        Ok(Self { key })
    }
}

impl TlsAead for AesGcmAead {
    fn encrypt(&self, nonce: &[u8], aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, TlsError> {
        if nonce.len() != GCM_NONCE_LEN {
            return Err(CryptoError::InvalidIvLength.into());
        }
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: plaintext,
            aad,
        };
        let out = match &self.key {
            GcmKey::Aes128(c) => c.encrypt(nonce, payload),
            GcmKey::Aes256(c) => c.encrypt(nonce, payload),
        };
        out.map_err(|_| TlsError::HandshakeFailed("AES-GCM: encryption failed".into()))
    }

    fn decrypt(
        &self,
        nonce: &[u8],
        aad: &[u8],
        ciphertext_with_tag: &[u8],
    ) -> Result<Vec<u8>, TlsError> {
        if nonce.len() != GCM_NONCE_LEN {
            return Err(CryptoError::InvalidIvLength.into());
        }
        let nonce = Nonce::from_slice(nonce);
        let payload = Payload {
            msg: ciphertext_with_tag,
            aad,
        };
        let out = match &self.key {
            GcmKey::Aes128(c) => c.decrypt(nonce, payload),
            GcmKey::Aes256(c) => c.decrypt(nonce, payload),
        };
        out.map_err(|_| TlsError::CryptoError(CryptoError::AeadTagVerifyFail))
    }

    fn tag_size(&self) -> usize {
        GCM_TAG_LEN
    }
}

/// Create an AEAD instance for a record-layer cipher.
pub fn create_aead(cipher: CipherAlgId, key: &[u8]) -> Result<Box<dyn TlsAead>, TlsError> {
    match cipher {
        CipherAlgId::Aes128Gcm | CipherAlgId::Aes256Gcm => {
            if key.len() != cipher.key_len() {
                return Err(CryptoError::InvalidKeyLength {
                    expected: cipher.key_len(),
                    got: key.len(),
                }
                .into());
            }
            Ok(Box::new(AesGcmAead::new(key)?))
        }
        _ => Err(CryptoError::NotSupported.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aes128_gcm_roundtrip() {
        let aead = create_aead(CipherAlgId::Aes128Gcm, &[0x42; 16]).unwrap();
        let nonce = [0x01; 12];
        let ct = aead.encrypt(&nonce, b"aad", b"hello").unwrap();
        assert_eq!(ct.len(), 5 + GCM_TAG_LEN);
        assert_eq!(aead.decrypt(&nonce, b"aad", &ct).unwrap(), b"hello");
    }

    #[test]
    fn test_gcm_rejects_wrong_aad() {
        let aead = create_aead(CipherAlgId::Aes256Gcm, &[0x42; 32]).unwrap();
        let nonce = [0x02; 12];
        let ct = aead.encrypt(&nonce, b"aad", b"hello").unwrap();
        let err = aead.decrypt(&nonce, b"other", &ct).unwrap_err();
        assert!(matches!(
            err,
            TlsError::CryptoError(CryptoError::AeadTagVerifyFail)
        ));
    }

    #[test]
    fn test_key_length_checked() {
        assert!(create_aead(CipherAlgId::Aes128Gcm, &[0; 32]).is_err());
        assert!(create_aead(CipherAlgId::Aes128Cbc, &[0; 16]).is_err());
        assert!(AesGcmAead::new(&[0; 24]).is_err());
    }
}
