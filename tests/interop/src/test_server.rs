//! Loopback TLS 1.2 server built from the client crate's own codecs and
//! record layer. Serves a tiny HTTP endpoint and reports what it saw.

use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use minitls_tls::alert::{Alert, AlertDescription};
use minitls_tls::crypt::key_schedule12::{
    compute_verify_data, derive_key_block, derive_master_secret, CLIENT_FINISHED_LABEL,
    SERVER_FINISHED_LABEL,
};
use minitls_tls::crypt::transcript::TranscriptHash;
use minitls_tls::crypt::{KeyExchangeAlg, NamedGroup, SignatureScheme, Tls12CipherSuiteParams};
use minitls_tls::handshake::codec::{
    decode_client_hello, encode_server_hello, parse_handshake_header, ServerHello,
};
use minitls_tls::handshake::codec12::{
    build_ske_params, build_ske_signed_data, decode_client_key_exchange, decode_finished12,
    encode_certificate12, encode_change_cipher_spec, encode_finished12,
    encode_server_hello_done, encode_server_key_exchange, Certificate12, ClientKeyExchange,
    ServerKeyExchange, CURVE_TYPE_NAMED_CURVE,
};
use minitls_tls::handshake::extensions_codec::{
    build_ec_point_formats, build_renegotiation_info_initial,
};
use minitls_tls::handshake::key_exchange::{decode_public_key, ByteOrder, X25519KeyPair};
use minitls_tls::handshake::HandshakeType;
use minitls_tls::record::{ContentType, RecordLayer, RECORD_HEADER_LEN};
use minitls_tls::CipherSuite;
use minitls_types::{CryptoError, TlsError};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Encrypt, Pkcs1v15Sign, RsaPrivateKey};
use sha2::{Digest, Sha256};

pub const SERVER_CERT_DER: &[u8] = include_bytes!("../testdata/server.cert.der");
pub const SERVER_KEY_PEM: &str = include_str!("../testdata/server.key.pem");

/// Body served for `GET /name`.
pub const NAME_BODY: &str = "minitls-test-server";
/// Size of the body served for `GET /large`.
pub const LARGE_BODY_LEN: usize = 40_000;

#[derive(Clone)]
pub struct ServerOptions {
    /// Suites the server accepts; it picks the client's first match.
    pub suites: Vec<CipherSuite>,
    pub corrupt_signature: bool,
    /// Answer ClientHello with ServerHello only, then go quiet.
    pub stall_after_hello: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            suites: minitls_tls::crypt::CIPHER_SUITES
                .iter()
                .map(|p| p.suite)
                .collect(),
            corrupt_signature: false,
            stall_after_hello: None,
        }
    }
}

/// What the server observed during one connection.
#[derive(Debug, Default)]
pub struct ServerOutcome {
    pub suite: Option<CipherSuite>,
    pub offered_suites: Vec<CipherSuite>,
    pub client_public: Option<Vec<u8>>,
    pub master_secret: Vec<u8>,
    pub server_verify_data: Vec<u8>,
    pub request_line: Option<String>,
    pub client_alert: Option<Alert>,
    pub client_close_notify: bool,
}

pub struct TestServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Result<ServerOutcome, TlsError>>,
}

impl TestServer {
    /// Bind to an ephemeral loopback port and serve exactly one connection.
    pub fn spawn(opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || -> Result<ServerOutcome, TlsError> {
            let (stream, _) = listener.accept()?;
            stream.set_read_timeout(Some(Duration::from_secs(5)))?;
            stream.set_write_timeout(Some(Duration::from_secs(5)))?;
            let mut conn = ServerConn {
                stream,
                rl: RecordLayer::new(),
                hs_buf: Vec::new(),
                outcome: ServerOutcome::default(),
            };
            conn.serve(&opts)?;
            Ok(conn.outcome)
        });
        Self { addr, handle }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn join(self) -> Result<ServerOutcome, TlsError> {
        self.handle
            .join()
            .map_err(|_| TlsError::HandshakeFailed("test server panicked".into()))?
    }
}

struct ServerConn {
    stream: TcpStream,
    rl: RecordLayer,
    hs_buf: Vec<u8>,
    outcome: ServerOutcome,
}

enum Incoming {
    Handshake(HandshakeType, Vec<u8>),
    Alert(Alert),
}

fn rsa_err(e: rsa::Error) -> TlsError {
    TlsError::CryptoError(CryptoError::Rsa(e.to_string()))
}

impl ServerConn {
    fn read_record(&mut self) -> Result<(ContentType, Vec<u8>), TlsError> {
        let mut record = vec![0u8; RECORD_HEADER_LEN];
        self.stream.read_exact(&mut record)?;
        let len = u16::from_be_bytes([record[3], record[4]]) as usize;
        record.resize(RECORD_HEADER_LEN + len, 0);
        self.stream.read_exact(&mut record[RECORD_HEADER_LEN..])?;
        let (ct, plaintext, _) = self.rl.open_record(&record)?;
        Ok((ct, plaintext))
    }

    fn read_handshake(&mut self) -> Result<Incoming, TlsError> {
        loop {
            if let Ok((ty, _, total)) = parse_handshake_header(&self.hs_buf) {
                let msg: Vec<u8> = self.hs_buf.drain(..total).collect();
                return Ok(Incoming::Handshake(ty, msg));
            }
            let (ct, data) = self.read_record()?;
            match ct {
                ContentType::Handshake => self.hs_buf.extend_from_slice(&data),
                ContentType::Alert => return Ok(Incoming::Alert(Alert::decode(&data)?)),
                other => {
                    return Err(TlsError::UnexpectedMessage(format!(
                        "server got {other:?} during handshake"
                    )))
                }
            }
        }
    }

    /// Next handshake message of type `ty`; `None` if the client sent an
    /// alert instead.
    fn expect_handshake(&mut self, ty: HandshakeType) -> Result<Option<Vec<u8>>, TlsError> {
        match self.read_handshake()? {
            Incoming::Handshake(got, msg) if got == ty => Ok(Some(msg)),
            Incoming::Handshake(got, _) => Err(TlsError::UnexpectedMessage(format!(
                "server expected {ty:?}, got {got:?}"
            ))),
            Incoming::Alert(alert) => {
                self.outcome.client_close_notify = alert.is_close_notify();
                self.outcome.client_alert = Some(alert);
                Ok(None)
            }
        }
    }

    fn send(&mut self, ct: ContentType, payload: &[u8]) -> Result<(), TlsError> {
        for chunk in payload.chunks(self.rl.max_fragment_size) {
            let record = self.rl.seal_record(ct, chunk)?;
            self.stream.write_all(&record)?;
        }
        Ok(())
    }

    fn serve(&mut self, opts: &ServerOptions) -> Result<(), TlsError> {
        let key = RsaPrivateKey::from_pkcs8_pem(SERVER_KEY_PEM)
            .map_err(|e| TlsError::DecodeError(e.to_string()))?;

        let Some(ch_msg) = self.expect_handshake(HandshakeType::ClientHello)? else {
            return Ok(());
        };
        let ch = decode_client_hello(&ch_msg[4..])?;
        self.outcome.offered_suites = ch.cipher_suites.clone();

        let Some(suite) = ch
            .cipher_suites
            .iter()
            .copied()
            .find(|s| opts.suites.contains(s))
        else {
            self.send(
                ContentType::Alert,
                &Alert::fatal(AlertDescription::HandshakeFailure).encode(),
            )?;
            return Ok(());
        };
        let params = Tls12CipherSuiteParams::from_suite(suite)?;
        self.outcome.suite = Some(suite);

        let mut transcript = TranscriptHash::new(params.prf_hash);
        transcript.update(&ch_msg);

        let server_random: [u8; 32] = rand::random();
        let mut extensions = vec![build_renegotiation_info_initial()];
        if params.kx_alg == KeyExchangeAlg::Ecdhe {
            extensions.push(build_ec_point_formats());
        }
        let sh = encode_server_hello(&ServerHello {
            server_version: 0x0303,
            random: server_random,
            session_id: vec![],
            cipher_suite: suite,
            compression_method: 0,
            extensions,
        });
        if let Some(stall) = opts.stall_after_hello {
            self.send(ContentType::Handshake, &sh)?;
            thread::sleep(stall);
            return Ok(());
        }

        let mut flight = vec![
            sh,
            encode_certificate12(&Certificate12 {
                certificate_list: vec![SERVER_CERT_DER.to_vec()],
            }),
        ];
        let ephemeral = X25519KeyPair::generate();
        if params.kx_alg == KeyExchangeAlg::Ecdhe {
            let point = ephemeral.encode_public(ByteOrder::LittleEndian);
            let ske_params =
                build_ske_params(CURVE_TYPE_NAMED_CURVE, NamedGroup::X25519.0, &point);
            let signed = build_ske_signed_data(&ch.random, &server_random, &ske_params);
            let mut signature = key
                .sign(Pkcs1v15Sign::new::<Sha256>(), &Sha256::digest(&signed))
                .map_err(rsa_err)?;
            if opts.corrupt_signature {
                let last = signature.len() - 1;
                signature[last] ^= 0x80;
            }
            flight.push(encode_server_key_exchange(&ServerKeyExchange {
                curve_type: CURVE_TYPE_NAMED_CURVE,
                named_curve: NamedGroup::X25519.0,
                public_key: point.to_vec(),
                signature_algorithm: SignatureScheme::RSA_PKCS1_SHA256,
                signature,
            }));
        }
        flight.push(encode_server_hello_done());
        for msg in &flight {
            transcript.update(msg);
        }
        self.send(ContentType::Handshake, &flight.concat())?;

        let Some(cke_msg) = self.expect_handshake(HandshakeType::ClientKeyExchange)? else {
            return Ok(());
        };
        transcript.update(&cke_msg);
        let pre_master = match decode_client_key_exchange(&cke_msg[4..], params.kx_alg)? {
            ClientKeyExchange::Ecdhe { public_key } => {
                let peer = decode_public_key(&public_key, ByteOrder::LittleEndian)?;
                self.outcome.client_public = Some(public_key);
                ephemeral.agree(&peer)?.to_vec()
            }
            ClientKeyExchange::Rsa {
                encrypted_pre_master,
            } => key
                .decrypt(Pkcs1v15Encrypt, &encrypted_pre_master)
                .map_err(rsa_err)?,
        };
        let ms = derive_master_secret(params.prf_hash, &pre_master, &ch.random, &server_random)?;
        let keys = derive_key_block(params.prf_hash, &ms, &server_random, &ch.random, params)?;

        let (ct, ccs) = self.read_record()?;
        if ct != ContentType::ChangeCipherSpec || ccs != encode_change_cipher_spec() {
            return Err(TlsError::UnexpectedMessage(
                "server expected ChangeCipherSpec".into(),
            ));
        }
        self.rl.activate_read_decryption(params, keys.client_write())?;

        let Some(fin_msg) = self.expect_handshake(HandshakeType::Finished)? else {
            return Ok(());
        };
        let expected = compute_verify_data(
            params.prf_hash,
            &ms,
            CLIENT_FINISHED_LABEL,
            &transcript.current_hash(),
        )?;
        if decode_finished12(&fin_msg[4..])? != expected {
            self.send(
                ContentType::Alert,
                &Alert::fatal(AlertDescription::DecryptError).encode(),
            )?;
            return Err(TlsError::FinishedMismatch);
        }
        transcript.update(&fin_msg);

        self.send(ContentType::ChangeCipherSpec, &encode_change_cipher_spec())?;
        self.rl.activate_write_encryption(params, keys.server_write())?;
        let verify_data = compute_verify_data(
            params.prf_hash,
            &ms,
            SERVER_FINISHED_LABEL,
            &transcript.current_hash(),
        )?;
        self.send(ContentType::Handshake, &encode_finished12(&verify_data))?;
        self.outcome.master_secret = ms;
        self.outcome.server_verify_data = verify_data;

        self.serve_http()
    }

    /// Answer one request, send close_notify, and wait for the client's.
    fn serve_http(&mut self) -> Result<(), TlsError> {
        let mut request = Vec::new();
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let (ct, data) = self.read_record()?;
            match ct {
                ContentType::ApplicationData => request.extend_from_slice(&data),
                ContentType::Alert => {
                    let alert = Alert::decode(&data)?;
                    self.outcome.client_close_notify = alert.is_close_notify();
                    self.outcome.client_alert = Some(alert);
                    return Ok(());
                }
                other => {
                    return Err(TlsError::UnexpectedMessage(format!(
                        "server got {other:?} after handshake"
                    )))
                }
            }
        }
        let text = String::from_utf8_lossy(&request);
        let request_line = text.lines().next().unwrap_or_default().to_string();
        let path = request_line.split(' ').nth(1).unwrap_or("/").to_string();
        self.outcome.request_line = Some(request_line);

        let (status, body) = match path.as_str() {
            "/name" => ("200 OK", NAME_BODY.as_bytes().to_vec()),
            "/large" => (
                "200 OK",
                (0..LARGE_BODY_LEN).map(|i| b'a' + (i % 26) as u8).collect(),
            ),
            _ => ("404 Not Found", b"not found".to_vec()),
        };
        let mut response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(&body);
        self.send(ContentType::ApplicationData, &response)?;
        self.send(ContentType::Alert, &Alert::CLOSE_NOTIFY.encode())?;

        let (ct, data) = self.read_record()?;
        if ct == ContentType::Alert {
            let alert = Alert::decode(&data)?;
            self.outcome.client_close_notify = alert.is_close_notify();
            self.outcome.client_alert = Some(alert);
        }
        Ok(())
    }
}
