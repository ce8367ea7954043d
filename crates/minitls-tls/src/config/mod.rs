//! TLS configuration with builder pattern.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use log::warn;

use crate::crypt::keylog::KeyMaterialEvent;
use crate::crypt::{
    default_cipher_suites, filter_supported, NamedGroup, SignatureScheme, Tls12CipherSuiteParams,
};
use crate::handshake::key_exchange::X25519KeyPair;
use crate::record::MAX_PLAINTEXT_LENGTH;
use crate::CipherSuite;

/// Receives NSS key log lines (`CLIENT_RANDOM <cr> <ms>`).
pub type KeyLogCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Receives the session key material once the key block is sliced.
pub type KeyMaterialHook = Arc<dyn for<'a> Fn(&KeyMaterialEvent<'a>) + Send + Sync>;

/// Default connect and read timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// TLS client configuration.
#[derive(Clone)]
pub struct TlsConfig {
    /// Cipher suites in preference order.
    pub cipher_suites: Vec<CipherSuite>,
    /// Server name for SNI.
    pub server_name: Option<String>,
    /// Signature schemes accepted on ServerKeyExchange.
    pub signature_algorithms: Vec<SignatureScheme>,
    /// Groups offered for ECDHE.
    pub supported_groups: Vec<NamedGroup>,
    /// Offer suites flagged as legacy or insecure.
    pub allow_insecure_suites: bool,
    /// Verify the ServerKeyExchange signature. Disabling this is for tests only.
    pub verify_server_key_exchange: bool,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    /// Maximum plaintext per outgoing record.
    pub max_fragment_size: usize,
    /// Fixed ECDHE key pair; a fresh one is generated per session when absent.
    pub local_key_pair: Option<X25519KeyPair>,
    /// NSS key log callback.
    pub key_log_callback: Option<KeyLogCallback>,
    /// Key material hook.
    pub key_material_hook: Option<KeyMaterialHook>,
}

impl fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cipher_suites", &self.cipher_suites)
            .field("server_name", &self.server_name)
            .field("allow_insecure_suites", &self.allow_insecure_suites)
            .field(
                "verify_server_key_exchange",
                &self.verify_server_key_exchange,
            )
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_fragment_size", &self.max_fragment_size)
            .field(
                "local_key_pair",
                &self.local_key_pair.as_ref().map(|_| "<key pair>"),
            )
            .field(
                "key_log_callback",
                &self.key_log_callback.as_ref().map(|_| "<callback>"),
            )
            .field(
                "key_material_hook",
                &self.key_material_hook.as_ref().map(|_| "<callback>"),
            )
            .finish_non_exhaustive()
    }
}

impl TlsConfig {
    /// Create a builder for TLS configuration.
    pub fn builder() -> TlsConfigBuilder {
        TlsConfigBuilder::default()
    }

    /// Suites to put in the ClientHello: registered ids only, preference
    /// order kept, weak entries dropped unless `allow_insecure_suites`.
    pub fn offered_cipher_suites(&self) -> Vec<CipherSuite> {
        filter_supported(&self.cipher_suites)
            .into_iter()
            .filter(|&suite| {
                let Ok(params) = Tls12CipherSuiteParams::from_suite(suite) else {
                    return false;
                };
                match params.weakness {
                    None => true,
                    Some(weakness) if self.allow_insecure_suites => {
                        warn!("offering weak cipher suite {} ({weakness:?})", params.name);
                        true
                    }
                    Some(weakness) => {
                        warn!(
                            "dropping weak cipher suite {} ({weakness:?}); insecure suites are disabled",
                            params.name
                        );
                        false
                    }
                }
            })
            .collect()
    }
}

/// Builder for `TlsConfig`.
pub struct TlsConfigBuilder {
    cipher_suites: Vec<CipherSuite>,
    server_name: Option<String>,
    signature_algorithms: Vec<SignatureScheme>,
    supported_groups: Vec<NamedGroup>,
    allow_insecure_suites: bool,
    verify_server_key_exchange: bool,
    connect_timeout: Duration,
    read_timeout: Duration,
    max_fragment_size: usize,
    local_key_pair: Option<X25519KeyPair>,
    key_log_callback: Option<KeyLogCallback>,
    key_material_hook: Option<KeyMaterialHook>,
}

impl Default for TlsConfigBuilder {
    fn default() -> Self {
        Self {
            cipher_suites: default_cipher_suites(),
            server_name: None,
            signature_algorithms: vec![
                SignatureScheme::RSA_PSS_RSAE_SHA256,
                SignatureScheme::RSA_PKCS1_SHA256,
                SignatureScheme::RSA_PSS_RSAE_SHA384,
                SignatureScheme::RSA_PKCS1_SHA384,
                SignatureScheme::RSA_PKCS1_SHA512,
            ],
            supported_groups: vec![NamedGroup::X25519],
            allow_insecure_suites: false,
            verify_server_key_exchange: true,
            connect_timeout: DEFAULT_TIMEOUT,
            read_timeout: DEFAULT_TIMEOUT,
            max_fragment_size: MAX_PLAINTEXT_LENGTH,
            local_key_pair: None,
            key_log_callback: None,
            key_material_hook: None,
        }
    }
}

impl fmt::Debug for TlsConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TlsConfigBuilder")
            .field("cipher_suites", &self.cipher_suites)
            .field("server_name", &self.server_name)
            .finish_non_exhaustive()
    }
}

impl TlsConfigBuilder {
    pub fn cipher_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.cipher_suites = suites.to_vec();
        self
    }

    pub fn server_name(mut self, name: &str) -> Self {
        self.server_name = Some(name.to_string());
        self
    }

    pub fn signature_algorithms(mut self, schemes: &[SignatureScheme]) -> Self {
        self.signature_algorithms = schemes.to_vec();
        self
    }

    pub fn supported_groups(mut self, groups: &[NamedGroup]) -> Self {
        self.supported_groups = groups.to_vec();
        self
    }

    pub fn allow_insecure_suites(mut self, allow: bool) -> Self {
        self.allow_insecure_suites = allow;
        self
    }

    pub fn verify_server_key_exchange(mut self, verify: bool) -> Self {
        self.verify_server_key_exchange = verify;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Clamped to `1..=16384`.
    pub fn max_fragment_size(mut self, size: usize) -> Self {
        self.max_fragment_size = size.clamp(1, MAX_PLAINTEXT_LENGTH);
        self
    }

    pub fn local_key_pair(mut self, key_pair: X25519KeyPair) -> Self {
        self.local_key_pair = Some(key_pair);
        self
    }

    pub fn key_log(mut self, callback: KeyLogCallback) -> Self {
        self.key_log_callback = Some(callback);
        self
    }

    pub fn key_material_hook(mut self, hook: KeyMaterialHook) -> Self {
        self.key_material_hook = Some(hook);
        self
    }

    pub fn build(self) -> TlsConfig {
        TlsConfig {
            cipher_suites: self.cipher_suites,
            server_name: self.server_name,
            signature_algorithms: self.signature_algorithms,
            supported_groups: self.supported_groups,
            allow_insecure_suites: self.allow_insecure_suites,
            verify_server_key_exchange: self.verify_server_key_exchange,
            connect_timeout: self.connect_timeout,
            read_timeout: self.read_timeout,
            max_fragment_size: self.max_fragment_size,
            local_key_pair: self.local_key_pair,
            key_log_callback: self.key_log_callback,
            key_material_hook: self.key_material_hook,
        }
    }
}
