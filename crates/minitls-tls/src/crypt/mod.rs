//! Cipher suite registry and the primitives behind the TLS 1.2 key schedule.

pub mod aead;
pub mod hash;
pub mod key_schedule12;
pub mod keylog;
pub mod prf;
pub mod transcript;

use crate::CipherSuite;
use minitls_types::{CipherAlgId, HashAlgId, MacAlgId, TlsError};

/// Named groups (elliptic curves) for key exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedGroup(pub u16);

impl NamedGroup {
    pub const SECP256R1: Self = Self(0x0017);
    pub const X25519: Self = Self(0x001D);
}

/// Signature schemes a server may use over its key exchange parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureScheme(pub u16);

impl SignatureScheme {
    pub const RSA_PKCS1_SHA1: Self = Self(0x0201);
    pub const RSA_PKCS1_SHA256: Self = Self(0x0401);
    pub const RSA_PKCS1_SHA384: Self = Self(0x0501);
    pub const RSA_PKCS1_SHA512: Self = Self(0x0601);
    pub const RSA_PSS_RSAE_SHA256: Self = Self(0x0804);
    pub const RSA_PSS_RSAE_SHA384: Self = Self(0x0805);
    pub const RSA_PSS_RSAE_SHA512: Self = Self(0x0806);

    /// Schemes this client can verify, most preferred first.
    pub const SUPPORTED: &'static [SignatureScheme] = &[
        Self::RSA_PSS_RSAE_SHA256,
        Self::RSA_PKCS1_SHA256,
        Self::RSA_PSS_RSAE_SHA384,
        Self::RSA_PKCS1_SHA384,
        Self::RSA_PSS_RSAE_SHA512,
        Self::RSA_PKCS1_SHA512,
        Self::RSA_PKCS1_SHA1,
    ];
}

/// TLS 1.2 key exchange algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyExchangeAlg {
    /// Ephemeral X25519, parameters signed by the server's RSA key.
    Ecdhe,
    /// Static RSA key transport (client encrypts the pre-master secret).
    Rsa,
}

impl KeyExchangeAlg {
    /// Returns true if the server sends a ServerKeyExchange message.
    pub fn expects_server_key_exchange(&self) -> bool {
        matches!(self, Self::Ecdhe)
    }
}

/// Record protection family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkCipherKind {
    /// RC4 with HMAC, keystream continuous across records.
    Stream,
    /// AES-CBC, MAC-then-encrypt with an explicit per-record IV.
    Cbc,
    /// AES-GCM with a 4-byte implicit salt and 8-byte explicit nonce.
    Aead,
}

/// Why a registry entry is considered weak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weakness {
    /// RSA key transport, no forward secrecy.
    NoForwardSecrecy,
    /// RC4 keystream biases.
    BrokenCipher,
}

/// Parameters associated with a TLS 1.2 cipher suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tls12CipherSuiteParams {
    /// The cipher suite identifier.
    pub suite: CipherSuite,
    /// IANA name.
    pub name: &'static str,
    /// Key exchange algorithm.
    pub kx_alg: KeyExchangeAlg,
    /// Record protection family.
    pub bulk: BulkCipherKind,
    /// Bulk cipher.
    pub cipher: CipherAlgId,
    /// Record MAC (None for AEAD suites).
    pub mac: Option<MacAlgId>,
    /// Hash driving the PRF and the handshake transcript.
    pub prf_hash: HashAlgId,
    /// Encryption key length in bytes.
    pub key_len: usize,
    /// Fixed IV length from key_block (4 for GCM, 16 for CBC, 0 for RC4).
    pub fixed_iv_len: usize,
    /// Explicit IV or nonce sent with each record (8 for GCM, 16 for CBC).
    pub record_iv_len: usize,
    /// AEAD tag length in bytes (16 for GCM, 0 otherwise).
    pub tag_len: usize,
    /// MAC key length (0 for AEAD).
    pub mac_key_len: usize,
    /// MAC output length (0 for AEAD).
    pub mac_len: usize,
    /// Declared key block length. Checked against the component lengths at compile time.
    pub key_block_len: usize,
    /// Set for entries kept only for interoperability with legacy servers.
    pub weakness: Option<Weakness>,
}

/// Every suite the client can negotiate, in default preference order.
pub const CIPHER_SUITES: &[Tls12CipherSuiteParams] = &[
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256,
        name: "TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Aead,
        cipher: CipherAlgId::Aes128Gcm,
        mac: None,
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 4,
        record_iv_len: 8,
        tag_len: 16,
        mac_key_len: 0,
        mac_len: 0,
        key_block_len: 40,
        weakness: None,
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384,
        name: "TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Aead,
        cipher: CipherAlgId::Aes256Gcm,
        mac: None,
        prf_hash: HashAlgId::Sha384,
        key_len: 32,
        fixed_iv_len: 4,
        record_iv_len: 8,
        tag_len: 16,
        mac_key_len: 0,
        mac_len: 0,
        key_block_len: 72,
        weakness: None,
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256,
        name: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes128Cbc,
        mac: Some(MacAlgId::HmacSha256),
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 32,
        mac_len: 32,
        key_block_len: 128,
        weakness: None,
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384,
        name: "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes256Cbc,
        mac: Some(MacAlgId::HmacSha384),
        prf_hash: HashAlgId::Sha384,
        key_len: 32,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 48,
        mac_len: 48,
        key_block_len: 192,
        weakness: None,
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA,
        name: "TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes128Cbc,
        mac: Some(MacAlgId::HmacSha1),
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 20,
        mac_len: 20,
        key_block_len: 104,
        weakness: None,
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA,
        name: "TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes256Cbc,
        mac: Some(MacAlgId::HmacSha1),
        prf_hash: HashAlgId::Sha256,
        key_len: 32,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 20,
        mac_len: 20,
        key_block_len: 136,
        weakness: None,
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256,
        name: "TLS_RSA_WITH_AES_128_GCM_SHA256",
        kx_alg: KeyExchangeAlg::Rsa,
        bulk: BulkCipherKind::Aead,
        cipher: CipherAlgId::Aes128Gcm,
        mac: None,
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 4,
        record_iv_len: 8,
        tag_len: 16,
        mac_key_len: 0,
        mac_len: 0,
        key_block_len: 40,
        weakness: Some(Weakness::NoForwardSecrecy),
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_RSA_WITH_AES_256_GCM_SHA384,
        name: "TLS_RSA_WITH_AES_256_GCM_SHA384",
        kx_alg: KeyExchangeAlg::Rsa,
        bulk: BulkCipherKind::Aead,
        cipher: CipherAlgId::Aes256Gcm,
        mac: None,
        prf_hash: HashAlgId::Sha384,
        key_len: 32,
        fixed_iv_len: 4,
        record_iv_len: 8,
        tag_len: 16,
        mac_key_len: 0,
        mac_len: 0,
        key_block_len: 72,
        weakness: Some(Weakness::NoForwardSecrecy),
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA256,
        name: "TLS_RSA_WITH_AES_128_CBC_SHA256",
        kx_alg: KeyExchangeAlg::Rsa,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes128Cbc,
        mac: Some(MacAlgId::HmacSha256),
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 32,
        mac_len: 32,
        key_block_len: 128,
        weakness: Some(Weakness::NoForwardSecrecy),
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
        name: "TLS_RSA_WITH_AES_128_CBC_SHA",
        kx_alg: KeyExchangeAlg::Rsa,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes128Cbc,
        mac: Some(MacAlgId::HmacSha1),
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 20,
        mac_len: 20,
        key_block_len: 104,
        weakness: Some(Weakness::NoForwardSecrecy),
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA,
        name: "TLS_RSA_WITH_AES_256_CBC_SHA",
        kx_alg: KeyExchangeAlg::Rsa,
        bulk: BulkCipherKind::Cbc,
        cipher: CipherAlgId::Aes256Cbc,
        mac: Some(MacAlgId::HmacSha1),
        prf_hash: HashAlgId::Sha256,
        key_len: 32,
        fixed_iv_len: 16,
        record_iv_len: 16,
        tag_len: 0,
        mac_key_len: 20,
        mac_len: 20,
        key_block_len: 136,
        weakness: Some(Weakness::NoForwardSecrecy),
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_ECDHE_RSA_WITH_RC4_128_SHA,
        name: "TLS_ECDHE_RSA_WITH_RC4_128_SHA",
        kx_alg: KeyExchangeAlg::Ecdhe,
        bulk: BulkCipherKind::Stream,
        cipher: CipherAlgId::Rc4_128,
        mac: Some(MacAlgId::HmacSha1),
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 0,
        record_iv_len: 0,
        tag_len: 0,
        mac_key_len: 20,
        mac_len: 20,
        key_block_len: 72,
        weakness: Some(Weakness::BrokenCipher),
    },
    Tls12CipherSuiteParams {
        suite: CipherSuite::TLS_RSA_WITH_RC4_128_SHA,
        name: "TLS_RSA_WITH_RC4_128_SHA",
        kx_alg: KeyExchangeAlg::Rsa,
        bulk: BulkCipherKind::Stream,
        cipher: CipherAlgId::Rc4_128,
        mac: Some(MacAlgId::HmacSha1),
        prf_hash: HashAlgId::Sha256,
        key_len: 16,
        fixed_iv_len: 0,
        record_iv_len: 0,
        tag_len: 0,
        mac_key_len: 20,
        mac_len: 20,
        key_block_len: 72,
        weakness: Some(Weakness::BrokenCipher),
    },
];

const fn entry_is_consistent(p: &Tls12CipherSuiteParams) -> bool {
    let mac_len = match p.mac {
        Some(mac) => mac.output_len(),
        None => 0,
    };
    let shape_ok = match p.bulk {
        BulkCipherKind::Aead => {
            p.fixed_iv_len == 4 && p.record_iv_len == 8 && p.tag_len == 16 && p.mac.is_none()
        }
        BulkCipherKind::Cbc => {
            p.fixed_iv_len == 16 && p.record_iv_len == 16 && p.tag_len == 0 && p.mac.is_some()
        }
        BulkCipherKind::Stream => {
            p.fixed_iv_len == 0 && p.record_iv_len == 0 && p.tag_len == 0 && p.mac.is_some()
        }
    };
    shape_ok
        && p.key_len == p.cipher.key_len()
        && p.mac_len == mac_len
        && p.mac_key_len == mac_len
        && p.key_block_len == 2 * (p.mac_key_len + p.key_len + p.fixed_iv_len)
}

const fn registry_is_consistent(table: &[Tls12CipherSuiteParams]) -> bool {
    let mut i = 0;
    while i < table.len() {
        if !entry_is_consistent(&table[i]) {
            return false;
        }
        let mut j = i + 1;
        while j < table.len() {
            if table[i].suite.0 == table[j].suite.0 {
                return false;
            }
            j += 1;
        }
        i += 1;
    }
    true
}

const _: () = assert!(
    registry_is_consistent(CIPHER_SUITES),
    "cipher suite registry has an inconsistent or duplicate entry"
);

impl Tls12CipherSuiteParams {
    /// Look up parameters for a TLS 1.2 cipher suite.
    pub fn from_suite(suite: CipherSuite) -> Result<&'static Self, TlsError> {
        CIPHER_SUITES
            .iter()
            .find(|p| p.suite == suite)
            .ok_or(TlsError::UnsupportedSuite(suite.0))
    }

    /// Look up a suite by IANA name (case-insensitive).
    pub fn by_name(name: &str) -> Option<&'static Self> {
        CIPHER_SUITES
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    /// Key block length computed from the component lengths.
    pub fn computed_key_block_len(&self) -> usize {
        2 * self.mac_key_len + 2 * self.key_len + 2 * self.fixed_iv_len
    }

    /// Returns true if this entry is tagged as weak.
    pub fn is_insecure(&self) -> bool {
        self.weakness.is_some()
    }

    /// RSA key transport entries: usable, but without forward secrecy.
    pub fn is_legacy(&self) -> bool {
        self.weakness == Some(Weakness::NoForwardSecrecy)
    }
}

/// Returns true if the cipher suite is in the registry.
pub fn is_tls12_suite(suite: CipherSuite) -> bool {
    Tls12CipherSuiteParams::from_suite(suite).is_ok()
}

/// Keep the suites the registry supports, in the caller's order, dropping
/// duplicates.
pub fn filter_supported(preferences: &[CipherSuite]) -> Vec<CipherSuite> {
    let mut out: Vec<CipherSuite> = Vec::with_capacity(preferences.len());
    for &suite in preferences {
        if is_tls12_suite(suite) && !out.contains(&suite) {
            out.push(suite);
        }
    }
    out
}

/// The default offer: every entry without a weakness tag, in registry order.
pub fn default_cipher_suites() -> Vec<CipherSuite> {
    CIPHER_SUITES
        .iter()
        .filter(|p| !p.is_insecure())
        .map(|p| p.suite)
        .collect()
}
