//! Server public key extraction and ServerKeyExchange signature verification.

use crate::crypt::hash::digest;
use crate::crypt::SignatureScheme;
use minitls_types::{CryptoError, HashAlgId, TlsError};
use rand::rngs::OsRng;
use rsa::pkcs8::DecodePublicKey;
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPublicKey};
use sha1::Sha1;
use sha2::{Sha256, Sha384, Sha512};
use x509_parser::prelude::{FromDer, X509Certificate};

/// RSA public key taken from the server's leaf certificate.
///
/// The certificate is parsed only to reach its SubjectPublicKeyInfo; the
/// chain is not validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerPublicKey {
    key: RsaPublicKey,
}

impl ServerPublicKey {
    /// Extract the RSA key from a DER-encoded X.509 certificate.
    pub fn from_certificate(cert_der: &[u8]) -> Result<Self, TlsError> {
        let (_, cert) = X509Certificate::from_der(cert_der)
            .map_err(|e| TlsError::DecodeError(format!("certificate: {e}")))?;
        Self::from_spki_der(cert.public_key().raw)
    }

    /// Parse a DER-encoded SubjectPublicKeyInfo holding an RSA key.
    pub fn from_spki_der(spki_der: &[u8]) -> Result<Self, TlsError> {
        let key = RsaPublicKey::from_public_key_der(spki_der)
            .map_err(|e| TlsError::DecodeError(format!("certificate key is not RSA: {e}")))?;
        Ok(Self { key })
    }

    pub fn from_rsa(key: RsaPublicKey) -> Self {
        Self { key }
    }

    /// Modulus size in bytes.
    pub fn size(&self) -> usize {
        self.key.size()
    }

    /// Verify `signature` over `message` using `scheme`.
    pub fn verify(
        &self,
        scheme: SignatureScheme,
        message: &[u8],
        signature: &[u8],
    ) -> Result<(), TlsError> {
        let hashed = |hash| digest(hash, message);
        let result = match scheme {
            SignatureScheme::RSA_PKCS1_SHA1 => self.key.verify(
                Pkcs1v15Sign::new::<Sha1>(),
                &hashed(HashAlgId::Sha1),
                signature,
            ),
            SignatureScheme::RSA_PKCS1_SHA256 => self.key.verify(
                Pkcs1v15Sign::new::<Sha256>(),
                &hashed(HashAlgId::Sha256),
                signature,
            ),
            SignatureScheme::RSA_PKCS1_SHA384 => self.key.verify(
                Pkcs1v15Sign::new::<Sha384>(),
                &hashed(HashAlgId::Sha384),
                signature,
            ),
            SignatureScheme::RSA_PKCS1_SHA512 => self.key.verify(
                Pkcs1v15Sign::new::<Sha512>(),
                &hashed(HashAlgId::Sha512),
                signature,
            ),
            SignatureScheme::RSA_PSS_RSAE_SHA256 => {
                self.key
                    .verify(Pss::new::<Sha256>(), &hashed(HashAlgId::Sha256), signature)
            }
            SignatureScheme::RSA_PSS_RSAE_SHA384 => {
                self.key
                    .verify(Pss::new::<Sha384>(), &hashed(HashAlgId::Sha384), signature)
            }
            SignatureScheme::RSA_PSS_RSAE_SHA512 => {
                self.key
                    .verify(Pss::new::<Sha512>(), &hashed(HashAlgId::Sha512), signature)
            }
            _ => {
                return Err(TlsError::SignatureFailure(format!(
                    "unsupported signature scheme 0x{:04x}",
                    scheme.0
                )))
            }
        };
        result.map_err(|e| TlsError::SignatureFailure(format!("{scheme:?}: {e}")))
    }

    /// RSAES-PKCS1-v1_5 encryption, used for the RSA pre-master secret.
    pub fn encrypt_pkcs1(&self, plaintext: &[u8]) -> Result<Vec<u8>, TlsError> {
        self.key
            .encrypt(&mut OsRng, Pkcs1v15Encrypt, plaintext)
            .map_err(|e| CryptoError::Rsa(e.to_string()).into())
    }
}
