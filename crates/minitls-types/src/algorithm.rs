/// Hash algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgId {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlgId {
    /// Digest output size in bytes.
    pub const fn output_len(self) -> usize {
        match self {
            HashAlgId::Sha1 => 20,
            HashAlgId::Sha256 => 32,
            HashAlgId::Sha384 => 48,
            HashAlgId::Sha512 => 64,
        }
    }

    /// Compression function block size in bytes.
    pub const fn block_len(self) -> usize {
        match self {
            HashAlgId::Sha1 | HashAlgId::Sha256 => 64,
            HashAlgId::Sha384 | HashAlgId::Sha512 => 128,
        }
    }
}

/// MAC algorithm identifiers used by the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacAlgId {
    HmacSha1,
    HmacSha256,
    HmacSha384,
}

impl MacAlgId {
    /// Underlying hash of the HMAC construction.
    pub const fn hash(self) -> HashAlgId {
        match self {
            MacAlgId::HmacSha1 => HashAlgId::Sha1,
            MacAlgId::HmacSha256 => HashAlgId::Sha256,
            MacAlgId::HmacSha384 => HashAlgId::Sha384,
        }
    }

    /// MAC output size in bytes (also the MAC key size in TLS 1.2).
    pub const fn output_len(self) -> usize {
        self.hash().output_len()
    }
}

/// Symmetric cipher algorithm identifiers (algorithm + mode combination).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherAlgId {
    Rc4_128,
    Aes128Cbc,
    Aes256Cbc,
    Aes128Gcm,
    Aes256Gcm,
}

impl CipherAlgId {
    /// Key size in bytes.
    pub const fn key_len(self) -> usize {
        match self {
            CipherAlgId::Rc4_128 | CipherAlgId::Aes128Cbc | CipherAlgId::Aes128Gcm => 16,
            CipherAlgId::Aes256Cbc | CipherAlgId::Aes256Gcm => 32,
        }
    }
}
