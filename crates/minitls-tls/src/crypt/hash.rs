//! Digest and HMAC dispatch over [`HashAlgId`].

use hmac::digest::KeyInit;
use hmac::{Hmac, Mac};
use minitls_types::{CryptoError, HashAlgId, TlsError};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};

/// One-shot digest: `Hash(data)`.
pub fn digest(alg: HashAlgId, data: &[u8]) -> Vec<u8> {
    match alg {
        HashAlgId::Sha1 => Sha1::digest(data).to_vec(),
        HashAlgId::Sha256 => Sha256::digest(data).to_vec(),
        HashAlgId::Sha384 => Sha384::digest(data).to_vec(),
        HashAlgId::Sha512 => Sha512::digest(data).to_vec(),
    }
}

/// One-shot HMAC: `HMAC(key, data)`.
pub fn hmac_hash(alg: HashAlgId, key: &[u8], data: &[u8]) -> Result<Vec<u8>, TlsError> {
    hmac_hash_parts(alg, key, &[data])
}

/// HMAC over the concatenation of `parts`, without building the joined buffer.
pub fn hmac_hash_parts(alg: HashAlgId, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
    match alg {
        HashAlgId::Sha1 => hmac_with::<Hmac<Sha1>>(key, parts),
        HashAlgId::Sha256 => hmac_with::<Hmac<Sha256>>(key, parts),
        HashAlgId::Sha384 => hmac_with::<Hmac<Sha384>>(key, parts),
        HashAlgId::Sha512 => hmac_with::<Hmac<Sha512>>(key, parts),
    }
}

fn hmac_with<M: Mac + KeyInit>(key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, TlsError> {
    let mut mac = <M as Mac>::new_from_slice(key).map_err(|_| {
        TlsError::CryptoError(CryptoError::InvalidKeyLength {
            expected: 0,
            got: key.len(),
        })
    })?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().to_vec())
}
