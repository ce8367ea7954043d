//! Transcript hash over TLS 1.2 handshake messages.

use super::hash::digest;
use minitls_types::HashAlgId;

/// Running transcript hash over handshake messages.
///
/// The raw messages are buffered so the hash algorithm can change once the
/// negotiated suite is known: ClientHello is sent before the PRF hash is
/// fixed, and `current_hash()` replays the buffer under the current algorithm.
pub struct TranscriptHash {
    hash: HashAlgId,
    message_buffer: Vec<u8>,
}

impl TranscriptHash {
    /// Create an empty transcript hashed with `hash`.
    pub fn new(hash: HashAlgId) -> Self {
        Self {
            hash,
            message_buffer: Vec::new(),
        }
    }

    /// Feed a complete handshake message (header included).
    pub fn update(&mut self, data: &[u8]) {
        self.message_buffer.extend_from_slice(data);
    }

    /// Switch to the negotiated PRF hash. Buffered messages are kept.
    pub fn set_hash(&mut self, hash: HashAlgId) {
        self.hash = hash;
    }

    /// Hash of every message fed so far, without consuming the state.
    pub fn current_hash(&self) -> Vec<u8> {
        digest(self.hash, &self.message_buffer)
    }

    /// Hash output size in bytes.
    pub fn hash_len(&self) -> usize {
        self.hash.output_len()
    }

    /// The algorithm currently in use.
    pub fn hash_alg(&self) -> HashAlgId {
        self.hash
    }

    /// Total bytes buffered.
    pub fn len(&self) -> usize {
        self.message_buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.message_buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_incremental() {
        let mut th = TranscriptHash::new(HashAlgId::Sha256);
        assert!(th.is_empty());
        th.update(b"hello");
        let h1 = th.current_hash();
        // non-destructive
        assert_eq!(h1, th.current_hash());

        th.update(b" world");
        let h2 = th.current_hash();
        assert_ne!(h1, h2);
        assert_eq!(h2, digest(HashAlgId::Sha256, b"hello world"));
        assert_eq!(th.len(), 11);
    }

    #[test]
    fn test_switch_replays_buffer() {
        let mut th = TranscriptHash::new(HashAlgId::Sha256);
        th.update(b"client hello");
        th.set_hash(HashAlgId::Sha384);
        th.update(b"server hello");
        assert_eq!(th.hash_len(), 48);
        assert_eq!(
            th.current_hash(),
            digest(HashAlgId::Sha384, b"client helloserver hello")
        );
    }
}
