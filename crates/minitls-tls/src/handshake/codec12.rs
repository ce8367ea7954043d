//! TLS 1.2 handshake message encoding/decoding.
//!
//! Handles Certificate, ServerKeyExchange, ServerHelloDone,
//! ClientKeyExchange (ECDHE and RSA forms), Finished, and ChangeCipherSpec.

use crate::crypt::key_schedule12::VERIFY_DATA_LEN;
use crate::crypt::{KeyExchangeAlg, SignatureScheme};
use crate::handshake::codec::{read_u24, wrap_handshake};
use crate::handshake::HandshakeType;
use minitls_types::TlsError;

/// ECCurveType.named_curve (RFC 8422 §5.4).
pub const CURVE_TYPE_NAMED_CURVE: u8 = 3;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// ServerKeyExchange for ECDHE (RFC 8422 §5.4).
#[derive(Debug, Clone)]
pub struct ServerKeyExchange {
    /// Curve type (3 = named_curve).
    pub curve_type: u8,
    /// Named curve identifier (NamedGroup value).
    pub named_curve: u16,
    /// Server's ephemeral public value.
    pub public_key: Vec<u8>,
    /// Signature algorithm used.
    pub signature_algorithm: SignatureScheme,
    /// Signature over client_random + server_random + params.
    pub signature: Vec<u8>,
}

/// ClientKeyExchange body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientKeyExchange {
    /// ECDHE: `point_len(1) || point`.
    Ecdhe { public_key: Vec<u8> },
    /// RSA: `len(2) || RSA-encrypted pre-master secret`.
    Rsa { encrypted_pre_master: Vec<u8> },
}

/// TLS 1.2 Certificate message (RFC 5246 §7.4.2).
#[derive(Debug, Clone)]
pub struct Certificate12 {
    /// List of DER-encoded certificates (leaf first).
    pub certificate_list: Vec<Vec<u8>>,
}

// ---------------------------------------------------------------------------
// ServerKeyExchange
// ---------------------------------------------------------------------------

/// Build the ServerECDHParams bytes the signature covers.
///
/// ```text
/// params = curve_type(1) || named_curve(2) || point_len(1) || point
/// ```
pub fn build_ske_params(curve_type: u8, named_curve: u16, public_key: &[u8]) -> Vec<u8> {
    let mut params = Vec::with_capacity(4 + public_key.len());
    params.push(curve_type);
    params.extend_from_slice(&named_curve.to_be_bytes());
    params.push(public_key.len() as u8);
    params.extend_from_slice(public_key);
    params
}

/// Build the data to be signed for ServerKeyExchange.
///
/// ```text
/// signed_data = client_random(32) || server_random(32) || server_params
/// ```
pub fn build_ske_signed_data(
    client_random: &[u8; 32],
    server_random: &[u8; 32],
    ske_params: &[u8],
) -> Vec<u8> {
    let mut data = Vec::with_capacity(64 + ske_params.len());
    data.extend_from_slice(client_random);
    data.extend_from_slice(server_random);
    data.extend_from_slice(ske_params);
    data
}

/// Encode a ServerKeyExchange message (wrapped with handshake header).
pub fn encode_server_key_exchange(ske: &ServerKeyExchange) -> Vec<u8> {
    let params = build_ske_params(ske.curve_type, ske.named_curve, &ske.public_key);

    let mut body = Vec::with_capacity(params.len() + 4 + ske.signature.len());
    body.extend_from_slice(&params);
    body.extend_from_slice(&ske.signature_algorithm.0.to_be_bytes());
    body.extend_from_slice(&(ske.signature.len() as u16).to_be_bytes());
    body.extend_from_slice(&ske.signature);

    wrap_handshake(HandshakeType::ServerKeyExchange, &body)
}

/// Decode a ServerKeyExchange message body (ECDHE).
pub fn decode_server_key_exchange(body: &[u8]) -> Result<ServerKeyExchange, TlsError> {
    let err = |msg: &str| TlsError::DecodeError(format!("ServerKeyExchange: {msg}"));
    if body.len() < 4 {
        return Err(err("too short"));
    }

    let curve_type = body[0];
    if curve_type != CURVE_TYPE_NAMED_CURVE {
        return Err(err(&format!(
            "unsupported curve type {curve_type} (expected named_curve)"
        )));
    }

    let named_curve = u16::from_be_bytes([body[1], body[2]]);
    let point_len = body[3] as usize;
    if point_len == 0 {
        return Err(err("empty public value"));
    }
    if body.len() < 4 + point_len + 4 {
        return Err(err("body truncated"));
    }

    let public_key = body[4..4 + point_len].to_vec();
    let offset = 4 + point_len;

    let sig_alg = u16::from_be_bytes([body[offset], body[offset + 1]]);
    let sig_len = u16::from_be_bytes([body[offset + 2], body[offset + 3]]) as usize;
    if body.len() != offset + 4 + sig_len {
        return Err(err("signature length mismatch"));
    }

    Ok(ServerKeyExchange {
        curve_type,
        named_curve,
        public_key,
        signature_algorithm: SignatureScheme(sig_alg),
        signature: body[offset + 4..].to_vec(),
    })
}

// ---------------------------------------------------------------------------
// ClientKeyExchange
// ---------------------------------------------------------------------------

/// Encode a ClientKeyExchange message (wrapped with handshake header).
pub fn encode_client_key_exchange(cke: &ClientKeyExchange) -> Vec<u8> {
    let body = match cke {
        ClientKeyExchange::Ecdhe { public_key } => {
            let mut body = Vec::with_capacity(1 + public_key.len());
            body.push(public_key.len() as u8);
            body.extend_from_slice(public_key);
            body
        }
        ClientKeyExchange::Rsa {
            encrypted_pre_master,
        } => {
            let mut body = Vec::with_capacity(2 + encrypted_pre_master.len());
            body.extend_from_slice(&(encrypted_pre_master.len() as u16).to_be_bytes());
            body.extend_from_slice(encrypted_pre_master);
            body
        }
    };
    wrap_handshake(HandshakeType::ClientKeyExchange, &body)
}

/// Decode a ClientKeyExchange body; the form depends on the key exchange.
pub fn decode_client_key_exchange(
    body: &[u8],
    kx_alg: KeyExchangeAlg,
) -> Result<ClientKeyExchange, TlsError> {
    let err = |msg: &str| TlsError::DecodeError(format!("ClientKeyExchange: {msg}"));
    match kx_alg {
        KeyExchangeAlg::Ecdhe => {
            let (&len, rest) = body.split_first().ok_or_else(|| err("empty"))?;
            if len == 0 || rest.len() != len as usize {
                return Err(err("point length mismatch"));
            }
            Ok(ClientKeyExchange::Ecdhe {
                public_key: rest.to_vec(),
            })
        }
        KeyExchangeAlg::Rsa => {
            if body.len() < 2 {
                return Err(err("too short"));
            }
            let len = u16::from_be_bytes([body[0], body[1]]) as usize;
            if len == 0 || body.len() != 2 + len {
                return Err(err("encrypted secret length mismatch"));
            }
            Ok(ClientKeyExchange::Rsa {
                encrypted_pre_master: body[2..].to_vec(),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// ServerHelloDone
// ---------------------------------------------------------------------------

/// Encode a ServerHelloDone message (empty body).
pub fn encode_server_hello_done() -> Vec<u8> {
    wrap_handshake(HandshakeType::ServerHelloDone, &[])
}

/// Check a ServerHelloDone body (must be empty).
pub fn decode_server_hello_done(body: &[u8]) -> Result<(), TlsError> {
    if !body.is_empty() {
        return Err(TlsError::DecodeError(
            "ServerHelloDone must have an empty body".into(),
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Certificate
// ---------------------------------------------------------------------------

/// Encode a TLS 1.2 Certificate message.
pub fn encode_certificate12(cert: &Certificate12) -> Vec<u8> {
    let total_len: usize = cert.certificate_list.iter().map(|c| 3 + c.len()).sum();

    let mut body = Vec::with_capacity(3 + total_len);
    body.push((total_len >> 16) as u8);
    body.push((total_len >> 8) as u8);
    body.push(total_len as u8);

    for cert_data in &cert.certificate_list {
        let len = cert_data.len();
        body.push((len >> 16) as u8);
        body.push((len >> 8) as u8);
        body.push(len as u8);
        body.extend_from_slice(cert_data);
    }

    wrap_handshake(HandshakeType::Certificate, &body)
}

/// Decode a TLS 1.2 Certificate message body.
pub fn decode_certificate12(body: &[u8]) -> Result<Certificate12, TlsError> {
    let err = |msg: &str| TlsError::DecodeError(format!("Certificate: {msg}"));
    if body.len() < 3 {
        return Err(err("too short"));
    }

    let total_len = read_u24(body) as usize;
    if body.len() != 3 + total_len {
        return Err(err("list length mismatch"));
    }

    let mut certs = Vec::new();
    let mut offset = 3;
    let end = 3 + total_len;

    while offset < end {
        if offset + 3 > end {
            return Err(err("entry length truncated"));
        }
        let cert_len = read_u24(&body[offset..]) as usize;
        offset += 3;
        if cert_len == 0 || offset + cert_len > end {
            return Err(err("bad entry length"));
        }
        certs.push(body[offset..offset + cert_len].to_vec());
        offset += cert_len;
    }

    Ok(Certificate12 {
        certificate_list: certs,
    })
}

// ---------------------------------------------------------------------------
// Finished / ChangeCipherSpec
// ---------------------------------------------------------------------------

/// Encode a TLS 1.2 Finished message (12-byte verify_data).
pub fn encode_finished12(verify_data: &[u8]) -> Vec<u8> {
    wrap_handshake(HandshakeType::Finished, verify_data)
}

/// Decode a TLS 1.2 Finished message body.
pub fn decode_finished12(body: &[u8]) -> Result<Vec<u8>, TlsError> {
    if body.len() != VERIFY_DATA_LEN {
        return Err(TlsError::DecodeError(format!(
            "Finished verify_data must be {VERIFY_DATA_LEN} bytes, got {}",
            body.len()
        )));
    }
    Ok(body.to_vec())
}

/// Encode a ChangeCipherSpec message body (content type 20, not a handshake message).
pub fn encode_change_cipher_spec() -> Vec<u8> {
    vec![0x01]
}

/// Check a ChangeCipherSpec record payload.
pub fn decode_change_cipher_spec(payload: &[u8]) -> Result<(), TlsError> {
    if payload != [0x01] {
        return Err(TlsError::DecodeError("malformed ChangeCipherSpec".into()));
    }
    Ok(())
}
