//! TLS 1.2 key derivation using PRF (RFC 5246 §6.3, §8.1).
//!
//! Derives the master secret from the pre-master secret, then expands
//! the master secret into the per-direction keys and IVs.

use super::prf::{prf, PHash};
use super::Tls12CipherSuiteParams;
use minitls_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

pub const MASTER_SECRET_LABEL: &str = "master secret";
pub const KEY_EXPANSION_LABEL: &str = "key expansion";
pub const CLIENT_FINISHED_LABEL: &str = "client finished";
pub const SERVER_FINISHED_LABEL: &str = "server finished";

pub const MASTER_SECRET_LEN: usize = 48;
pub const VERIFY_DATA_LEN: usize = 12;

/// Session keys sliced from the key block: MAC keys (empty for AEAD),
/// encryption keys, and IVs for both directions.
pub struct ExchangeKeys {
    pub client_write_mac_key: Vec<u8>,
    pub server_write_mac_key: Vec<u8>,
    pub client_write_key: Vec<u8>,
    pub server_write_key: Vec<u8>,
    pub client_write_iv: Vec<u8>,
    pub server_write_iv: Vec<u8>,
}

/// Borrowed keys for one direction of the record layer.
#[derive(Clone, Copy)]
pub struct DirectionKeys<'a> {
    pub mac_key: &'a [u8],
    pub key: &'a [u8],
    pub iv: &'a [u8],
}

impl ExchangeKeys {
    /// Keys protecting client-to-server records.
    pub fn client_write(&self) -> DirectionKeys<'_> {
        DirectionKeys {
            mac_key: &self.client_write_mac_key,
            key: &self.client_write_key,
            iv: &self.client_write_iv,
        }
    }

    /// Keys protecting server-to-client records.
    pub fn server_write(&self) -> DirectionKeys<'_> {
        DirectionKeys {
            mac_key: &self.server_write_mac_key,
            key: &self.server_write_key,
            iv: &self.server_write_iv,
        }
    }

    /// Total bytes of key material held.
    pub fn total_len(&self) -> usize {
        self.client_write_mac_key.len()
            + self.server_write_mac_key.len()
            + self.client_write_key.len()
            + self.server_write_key.len()
            + self.client_write_iv.len()
            + self.server_write_iv.len()
    }
}

impl Drop for ExchangeKeys {
    fn drop(&mut self) {
        self.client_write_mac_key.zeroize();
        self.server_write_mac_key.zeroize();
        self.client_write_key.zeroize();
        self.server_write_key.zeroize();
        self.client_write_iv.zeroize();
        self.server_write_iv.zeroize();
    }
}

/// Derive the 48-byte master secret from the pre-master secret.
///
/// RFC 5246 §8.1:
/// ```text
/// master_secret = PRF(pre_master_secret, "master secret",
///                     ClientHello.random + ServerHello.random)[0..47]
/// ```
pub fn derive_master_secret(
    hash: HashAlgId,
    pre_master_secret: &[u8],
    client_random: &[u8; 32],
    server_random: &[u8; 32],
) -> Result<Vec<u8>, TlsError> {
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(client_random);
    seed.extend_from_slice(server_random);
    prf(
        hash,
        pre_master_secret,
        MASTER_SECRET_LABEL,
        &seed,
        MASTER_SECRET_LEN,
    )
}

/// Expand the master secret into the session keys.
///
/// RFC 5246 §6.3:
/// ```text
/// key_block = PRF(master_secret, "key expansion",
///                 ServerHello.random + ClientHello.random)
/// ```
///
/// Slices are taken in order: client MAC key, server MAC key, client key,
/// server key, client IV, server IV.
pub fn derive_key_block(
    hash: HashAlgId,
    master_secret: &[u8],
    server_random: &[u8; 32],
    client_random: &[u8; 32],
    params: &Tls12CipherSuiteParams,
) -> Result<ExchangeKeys, TlsError> {
    // Note: key expansion seed is server_random + client_random (reversed from master_secret)
    let mut seed = Vec::with_capacity(64);
    seed.extend_from_slice(server_random);
    seed.extend_from_slice(client_random);

    let mut stream = PHash::new(hash, master_secret, KEY_EXPANSION_LABEL, &seed);
    let mut take = |len: usize| -> Result<Vec<u8>, TlsError> {
        let mut out = vec![0u8; len];
        stream.fill(&mut out)?;
        Ok(out)
    };

    let keys = ExchangeKeys {
        client_write_mac_key: take(params.mac_key_len)?,
        server_write_mac_key: take(params.mac_key_len)?,
        client_write_key: take(params.key_len)?,
        server_write_key: take(params.key_len)?,
        client_write_iv: take(params.fixed_iv_len)?,
        server_write_iv: take(params.fixed_iv_len)?,
    };
    if keys.total_len() != params.key_block_len {
        return Err(TlsError::HandshakeFailed(format!(
            "key block for {} sliced to {} bytes, expected {}",
            params.name,
            keys.total_len(),
            params.key_block_len
        )));
    }
    Ok(keys)
}

/// Compute the Finished message verify_data (12 bytes).
///
/// RFC 5246 §7.4.9:
/// ```text
/// verify_data = PRF(master_secret, finished_label,
///                   Hash(handshake_messages))[0..11]
/// ```
pub fn compute_verify_data(
    hash: HashAlgId,
    master_secret: &[u8],
    label: &str,
    handshake_hash: &[u8],
) -> Result<Vec<u8>, TlsError> {
    prf(hash, master_secret, label, handshake_hash, VERIFY_DATA_LEN)
}
