//! TLS 1.2 client handshake state machine.
//!
//! Drives the full handshake for ECDHE (X25519, RSA-signed) and RSA key
//! transport suites. The caller owns the transport: it feeds each received
//! handshake message in with its raw bytes, and sends whatever the
//! `build_*` methods return.

use log::{debug, warn};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::config::TlsConfig;
use crate::crypt::key_schedule12::{
    compute_verify_data, derive_key_block, derive_master_secret, ExchangeKeys,
    CLIENT_FINISHED_LABEL, SERVER_FINISHED_LABEL,
};
use crate::crypt::keylog::{log_master_secret, report_key_material, KeyMaterialEvent};
use crate::crypt::transcript::TranscriptHash;
use crate::crypt::{KeyExchangeAlg, NamedGroup, Tls12CipherSuiteParams};
use crate::extensions::{Extension, ExtensionType};
use crate::handshake::codec::{encode_client_hello, ClientHello, ServerHello};
use crate::handshake::codec12::{
    build_ske_params, build_ske_signed_data, decode_finished12, encode_client_key_exchange,
    encode_finished12, Certificate12, ServerKeyExchange,
};
use crate::handshake::extensions_codec::{
    build_ec_point_formats, build_renegotiation_info_initial, build_server_name,
    build_signature_algorithms, build_supported_groups, parse_ec_point_formats,
    parse_renegotiation_info, EC_POINT_FORMAT_UNCOMPRESSED,
};
use crate::handshake::key_exchange::{decode_public_key, ByteOrder, KeyExchange, X25519KeyPair};
use crate::handshake::verify::ServerPublicKey;
use crate::handshake::HandshakeState;
use crate::{CipherSuite, TlsVersion};
use minitls_types::{HashAlgId, TlsError};

/// The client's second flight, produced once ServerHelloDone is processed.
pub struct ClientFlight {
    /// ClientKeyExchange handshake message (sent in plaintext).
    pub client_key_exchange: Vec<u8>,
    /// Finished handshake message (sent under the new write keys).
    pub finished: Vec<u8>,
    /// Session keys for both directions.
    pub keys: ExchangeKeys,
}

/// TLS 1.2 client handshake state machine.
pub struct Tls12ClientHandshake {
    config: TlsConfig,
    state: HandshakeState,
    params: Option<&'static Tls12CipherSuiteParams>,
    offered_suites: Vec<CipherSuite>,
    offered_extensions: Vec<ExtensionType>,
    transcript: TranscriptHash,
    client_random: [u8; 32],
    server_random: [u8; 32],
    server_certs: Vec<Vec<u8>>,
    server_key: Option<ServerPublicKey>,
    server_ecdh_public: Option<x25519_dalek::PublicKey>,
    master_secret: Zeroizing<Vec<u8>>,
    keys_derived: bool,
    client_verify_data: Vec<u8>,
    server_verify_data: Vec<u8>,
}

impl Tls12ClientHandshake {
    pub fn new(config: TlsConfig) -> Self {
        Self {
            config,
            state: HandshakeState::Start,
            params: None,
            offered_suites: Vec::new(),
            offered_extensions: Vec::new(),
            // Replaced by the negotiated PRF hash once ServerHello arrives.
            transcript: TranscriptHash::new(HashAlgId::Sha256),
            client_random: [0u8; 32],
            server_random: [0u8; 32],
            server_certs: Vec::new(),
            server_key: None,
            server_ecdh_public: None,
            master_secret: Zeroizing::new(Vec::new()),
            keys_derived: false,
            client_verify_data: Vec::new(),
            server_verify_data: Vec::new(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn config(&self) -> &TlsConfig {
        &self.config
    }

    /// Negotiated suite parameters (after ServerHello).
    pub fn params(&self) -> Option<&'static Tls12CipherSuiteParams> {
        self.params
    }

    pub fn server_certificates(&self) -> &[Vec<u8>] {
        &self.server_certs
    }

    pub fn client_random(&self) -> &[u8; 32] {
        &self.client_random
    }

    pub fn server_random(&self) -> &[u8; 32] {
        &self.server_random
    }

    pub fn client_verify_data(&self) -> &[u8] {
        &self.client_verify_data
    }

    pub fn server_verify_data(&self) -> &[u8] {
        &self.server_verify_data
    }

    /// Move to `Aborted`. Every later call fails.
    pub fn abort(&mut self) {
        if self.state != HandshakeState::Aborted {
            debug!("handshake: {:?} -> Aborted", self.state);
            self.state = HandshakeState::Aborted;
        }
    }

    fn transition(&mut self, next: HandshakeState) {
        debug!("handshake: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn expect_state(&self, expected: HandshakeState, msg: &str) -> Result<(), TlsError> {
        if self.state != expected {
            return Err(TlsError::UnexpectedMessage(format!(
                "{msg} in state {:?}",
                self.state
            )));
        }
        Ok(())
    }

    fn negotiated(&self) -> Result<&'static Tls12CipherSuiteParams, TlsError> {
        self.params
            .ok_or_else(|| TlsError::HandshakeFailed("no cipher suite negotiated".into()))
    }

    /// Build the ClientHello message (handshake header included).
    pub fn build_client_hello(&mut self) -> Result<Vec<u8>, TlsError> {
        self.expect_state(HandshakeState::Start, "ClientHello")?;

        let suites = self.config.offered_cipher_suites();
        if suites.is_empty() {
            return Err(TlsError::NoSharedCipherSuite);
        }

        getrandom::getrandom(&mut self.client_random)
            .map_err(|e| TlsError::HandshakeFailed(format!("random gen failed: {e}")))?;

        let mut extensions = Vec::new();
        if let Some(name) = &self.config.server_name {
            extensions.push(build_server_name(name));
        }
        extensions.push(build_signature_algorithms(
            &self.config.signature_algorithms,
        ));
        let offers_ecdhe = suites.iter().any(|&s| {
            Tls12CipherSuiteParams::from_suite(s)
                .map(|p| p.kx_alg == KeyExchangeAlg::Ecdhe)
                .unwrap_or(false)
        });
        if offers_ecdhe {
            extensions.push(build_supported_groups(&self.config.supported_groups));
            extensions.push(build_ec_point_formats());
        }
        extensions.push(build_renegotiation_info_initial());

        self.offered_extensions = extensions.iter().map(|e| e.extension_type).collect();
        self.offered_suites = suites.clone();

        let ch = ClientHello {
            client_version: TlsVersion::Tls12.wire(),
            random: self.client_random,
            session_id: Vec::new(),
            cipher_suites: suites,
            compression_methods: vec![0],
            extensions,
        };

        let msg = encode_client_hello(&ch);
        self.transcript.update(&msg);
        self.transition(HandshakeState::ClientHelloSent);
        Ok(msg)
    }

    /// Process a ServerHello message. Locks in the suite and server random.
    pub fn process_server_hello(
        &mut self,
        raw_msg: &[u8],
        sh: &ServerHello,
    ) -> Result<CipherSuite, TlsError> {
        self.expect_state(HandshakeState::ClientHelloSent, "ServerHello")?;

        if sh.server_version != TlsVersion::Tls12.wire() {
            return Err(TlsError::UnsupportedVersion(sh.server_version));
        }
        if sh.compression_method != 0 {
            return Err(TlsError::DecodeError(format!(
                "server selected compression method {}",
                sh.compression_method
            )));
        }
        if !self.offered_suites.contains(&sh.cipher_suite) {
            return Err(TlsError::UnsupportedSuite(sh.cipher_suite.0));
        }
        let params = Tls12CipherSuiteParams::from_suite(sh.cipher_suite)?;
        self.check_server_extensions(&sh.extensions)?;

        if let Some(weakness) = params.weakness {
            warn!(
                "negotiated weak cipher suite {} ({weakness:?})",
                params.name
            );
        }

        self.server_random = sh.random;
        self.params = Some(params);
        self.transcript.set_hash(params.prf_hash);
        self.transcript.update(raw_msg);
        debug!("negotiated {}", params.name);
        self.transition(HandshakeState::ServerHelloReceived);
        Ok(sh.cipher_suite)
    }

    fn check_server_extensions(&self, exts: &[Extension]) -> Result<(), TlsError> {
        for ext in exts {
            if !self.offered_extensions.contains(&ext.extension_type) {
                return Err(TlsError::DecodeError(format!(
                    "unsolicited ServerHello extension 0x{:04X}",
                    ext.extension_type.0
                )));
            }
            match ext.extension_type {
                ExtensionType::RENEGOTIATION_INFO => {
                    if !parse_renegotiation_info(&ext.data)?.is_empty() {
                        return Err(TlsError::DecodeError(
                            "non-empty renegotiation_info on initial handshake".into(),
                        ));
                    }
                }
                ExtensionType::EC_POINT_FORMATS => {
                    if !parse_ec_point_formats(&ext.data)?.contains(&EC_POINT_FORMAT_UNCOMPRESSED)
                    {
                        return Err(TlsError::DecodeError(
                            "server does not accept uncompressed points".into(),
                        ));
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Process the server Certificate message. Only the leaf key is used;
    /// the chain is not validated.
    pub fn process_certificate(
        &mut self,
        raw_msg: &[u8],
        cert: &Certificate12,
    ) -> Result<(), TlsError> {
        self.expect_state(HandshakeState::ServerHelloReceived, "Certificate")?;

        let leaf = cert
            .certificate_list
            .first()
            .ok_or_else(|| TlsError::DecodeError("empty server certificate chain".into()))?;
        self.server_key = Some(ServerPublicKey::from_certificate(leaf)?);
        self.server_certs = cert.certificate_list.clone();

        self.transcript.update(raw_msg);
        self.transition(HandshakeState::CertificateReceived);
        Ok(())
    }

    /// Process a ServerKeyExchange message (ECDHE suites only).
    ///
    /// The signature over `client_random || server_random || params` is
    /// checked against the certificate key before the value is accepted.
    pub fn process_server_key_exchange(
        &mut self,
        raw_msg: &[u8],
        ske: &ServerKeyExchange,
    ) -> Result<(), TlsError> {
        self.expect_state(HandshakeState::CertificateReceived, "ServerKeyExchange")?;
        let params = self.negotiated()?;
        if !params.kx_alg.expects_server_key_exchange() {
            return Err(TlsError::UnexpectedMessage(format!(
                "ServerKeyExchange for {}",
                params.name
            )));
        }

        let group = NamedGroup(ske.named_curve);
        if group != NamedGroup::X25519 || !self.config.supported_groups.contains(&group) {
            return Err(TlsError::HandshakeFailed(format!(
                "server chose unsupported group 0x{:04x}",
                ske.named_curve
            )));
        }

        if self.config.verify_server_key_exchange {
            if !self
                .config
                .signature_algorithms
                .contains(&ske.signature_algorithm)
            {
                return Err(TlsError::SignatureFailure(format!(
                    "server used unoffered signature scheme 0x{:04x}",
                    ske.signature_algorithm.0
                )));
            }
            let server_key = self
                .server_key
                .as_ref()
                .ok_or_else(|| TlsError::HandshakeFailed("no server certificate key".into()))?;
            let ske_params = build_ske_params(ske.curve_type, ske.named_curve, &ske.public_key);
            let signed_data =
                build_ske_signed_data(&self.client_random, &self.server_random, &ske_params);
            server_key.verify(ske.signature_algorithm, &signed_data, &ske.signature)?;
        } else {
            warn!("ServerKeyExchange signature verification is disabled");
        }

        self.server_ecdh_public = Some(decode_public_key(
            &ske.public_key,
            ByteOrder::LittleEndian,
        )?);
        self.transcript.update(raw_msg);
        self.transition(HandshakeState::ServerKeyExchangeReceived);
        Ok(())
    }

    /// Process ServerHelloDone (empty body).
    pub fn process_server_hello_done(&mut self, raw_msg: &[u8]) -> Result<(), TlsError> {
        let params = self.negotiated().map_err(|_| {
            TlsError::UnexpectedMessage(format!("ServerHelloDone in state {:?}", self.state))
        })?;
        let expected = if params.kx_alg.expects_server_key_exchange() {
            HandshakeState::ServerKeyExchangeReceived
        } else {
            HandshakeState::CertificateReceived
        };
        self.expect_state(expected, "ServerHelloDone")?;

        self.transcript.update(raw_msg);
        self.transition(HandshakeState::ServerHelloDoneReceived);
        Ok(())
    }

    /// Run the key exchange, derive the session keys and build the client's
    /// ClientKeyExchange and Finished.
    ///
    /// Keys are derived exactly once per handshake.
    pub fn build_client_flight(&mut self) -> Result<ClientFlight, TlsError> {
        self.expect_state(HandshakeState::ServerHelloDoneReceived, "client flight")?;
        if self.keys_derived {
            return Err(TlsError::HandshakeFailed("session keys already derived".into()));
        }
        let params = self.negotiated()?;

        let kx = match params.kx_alg {
            KeyExchangeAlg::Ecdhe => KeyExchange::Ecdhe {
                local: self
                    .config
                    .local_key_pair
                    .clone()
                    .unwrap_or_else(X25519KeyPair::generate),
                peer: self
                    .server_ecdh_public
                    .ok_or_else(|| TlsError::HandshakeFailed("no server ECDHE value".into()))?,
            },
            KeyExchangeAlg::Rsa => KeyExchange::Rsa {
                server_key: self
                    .server_key
                    .clone()
                    .ok_or_else(|| TlsError::HandshakeFailed("no server certificate key".into()))?,
            },
        };
        let output = kx.complete()?;

        let cke_msg = encode_client_key_exchange(&output.client_key_exchange);
        self.transcript.update(&cke_msg);

        self.master_secret = Zeroizing::new(derive_master_secret(
            params.prf_hash,
            &output.pre_master_secret,
            &self.client_random,
            &self.server_random,
        )?);
        let keys = derive_key_block(
            params.prf_hash,
            &self.master_secret,
            &self.server_random,
            &self.client_random,
            params,
        )?;
        self.keys_derived = true;

        log_master_secret(&self.config, &self.client_random, &self.master_secret);
        report_key_material(
            &self.config,
            &KeyMaterialEvent {
                suite: params.suite,
                client_random: &self.client_random,
                server_random: &self.server_random,
                master_secret: &self.master_secret,
                keys: &keys,
            },
        );

        let verify_data = compute_verify_data(
            params.prf_hash,
            &self.master_secret,
            CLIENT_FINISHED_LABEL,
            &self.transcript.current_hash(),
        )?;
        let finished = encode_finished12(&verify_data);
        // The server's Finished covers ours.
        self.transcript.update(&finished);
        self.client_verify_data = verify_data;

        self.transition(HandshakeState::ClientKeyExchangeSent);
        Ok(ClientFlight {
            client_key_exchange: cke_msg,
            finished,
            keys,
        })
    }

    /// Record that ChangeCipherSpec went out and write protection is active.
    pub fn change_cipher_spec_sent(&mut self) -> Result<(), TlsError> {
        self.expect_state(HandshakeState::ClientKeyExchangeSent, "ChangeCipherSpec")?;
        self.transition(HandshakeState::ChangeCipherSpecSent);
        Ok(())
    }

    /// Record that the client Finished went out.
    pub fn finished_sent(&mut self) -> Result<(), TlsError> {
        self.expect_state(HandshakeState::ChangeCipherSpecSent, "Finished")?;
        self.transition(HandshakeState::FinishedSent);
        Ok(())
    }

    /// Accept the server's ChangeCipherSpec. Only valid after our Finished.
    pub fn process_change_cipher_spec(&mut self) -> Result<(), TlsError> {
        self.expect_state(HandshakeState::FinishedSent, "ChangeCipherSpec")?;
        debug!("server ChangeCipherSpec received");
        Ok(())
    }

    /// Verify the server Finished. Returns the server verify_data.
    pub fn process_finished(&mut self, raw_msg: &[u8], body: &[u8]) -> Result<Vec<u8>, TlsError> {
        self.expect_state(HandshakeState::FinishedSent, "Finished")?;
        let params = self.negotiated()?;
        let received = decode_finished12(body)?;

        let expected = compute_verify_data(
            params.prf_hash,
            &self.master_secret,
            SERVER_FINISHED_LABEL,
            &self.transcript.current_hash(),
        )?;
        if !bool::from(received.ct_eq(&expected)) {
            return Err(TlsError::FinishedMismatch);
        }

        self.transcript.update(raw_msg);
        self.server_verify_data = received.clone();
        self.transition(HandshakeState::Established);
        Ok(received)
    }
}
