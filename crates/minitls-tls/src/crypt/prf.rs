//! TLS 1.2 PRF (Pseudo-Random Function) as defined in RFC 5246 §5.
//!
//! ```text
//! PRF(secret, label, seed) = P_<hash>(secret, label + seed)
//!
//! P_hash(secret, seed) = HMAC_hash(secret, A(1) + seed) ||
//!                         HMAC_hash(secret, A(2) + seed) || ...
//! A(0) = seed
//! A(i) = HMAC_hash(secret, A(i-1))
//! ```

use super::hash::{hmac_hash, hmac_hash_parts};
use minitls_types::{HashAlgId, TlsError};
use zeroize::Zeroize;

/// TLS 1.2 PRF: Derive `output_len` bytes from `secret`, `label`, and `seed`.
pub fn prf(
    hash: HashAlgId,
    secret: &[u8],
    label: &str,
    seed: &[u8],
    output_len: usize,
) -> Result<Vec<u8>, TlsError> {
    let mut stream = PHash::new(hash, secret, label, seed);
    let mut out = vec![0u8; output_len];
    stream.fill(&mut out)?;
    Ok(out)
}

/// Resumable P_hash expansion.
///
/// Each `fill` continues where the previous call stopped, so reading 40 bytes
/// and then 64 more yields the same 104 bytes as a single read.
pub struct PHash {
    hash: HashAlgId,
    secret: Vec<u8>,
    label_seed: Vec<u8>,
    a: Vec<u8>,
    block: Vec<u8>,
    block_pos: usize,
}

impl PHash {
    pub fn new(hash: HashAlgId, secret: &[u8], label: &str, seed: &[u8]) -> Self {
        let mut label_seed = Vec::with_capacity(label.len() + seed.len());
        label_seed.extend_from_slice(label.as_bytes());
        label_seed.extend_from_slice(seed);
        Self {
            hash,
            secret: secret.to_vec(),
            // A(0) = seed
            a: label_seed.clone(),
            label_seed,
            block: Vec::new(),
            block_pos: 0,
        }
    }

    /// Write the next `out.len()` bytes of the expansion into `out`.
    pub fn fill(&mut self, out: &mut [u8]) -> Result<(), TlsError> {
        let mut written = 0;
        while written < out.len() {
            if self.block_pos == self.block.len() {
                self.next_block()?;
            }
            let take = (self.block.len() - self.block_pos).min(out.len() - written);
            out[written..written + take]
                .copy_from_slice(&self.block[self.block_pos..self.block_pos + take]);
            self.block_pos += take;
            written += take;
        }
        Ok(())
    }

    fn next_block(&mut self) -> Result<(), TlsError> {
        // A(i) = HMAC_hash(secret, A(i-1))
        let next_a = hmac_hash(self.hash, &self.secret, &self.a)?;
        self.a.zeroize();
        self.a = next_a;
        // HMAC_hash(secret, A(i) + seed)
        let block = hmac_hash_parts(self.hash, &self.secret, &[&self.a, &self.label_seed])?;
        self.block.zeroize();
        self.block = block;
        self.block_pos = 0;
        Ok(())
    }
}

impl Drop for PHash {
    fn drop(&mut self) {
        self.secret.zeroize();
        self.a.zeroize();
        self.block.zeroize();
    }
}
