//! Hello message encoding/decoding and the handshake header (RFC 5246 §7.4).

use crate::extensions::{Extension, ExtensionType};
use crate::CipherSuite;
use minitls_types::TlsError;

use super::HandshakeType;

/// Handshake header length: msg_type(1) || length(3).
pub const HANDSHAKE_HEADER_LEN: usize = 4;

// ---------------------------------------------------------------------------
// Message types
// ---------------------------------------------------------------------------

/// ClientHello message.
#[derive(Debug, Clone)]
pub struct ClientHello {
    pub client_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suites: Vec<CipherSuite>,
    pub compression_methods: Vec<u8>,
    pub extensions: Vec<Extension>,
}

/// ServerHello message.
#[derive(Debug, Clone)]
pub struct ServerHello {
    pub server_version: u16,
    pub random: [u8; 32],
    pub session_id: Vec<u8>,
    pub cipher_suite: CipherSuite,
    pub compression_method: u8,
    pub extensions: Vec<Extension>,
}

// ---------------------------------------------------------------------------
// Handshake header
// ---------------------------------------------------------------------------

/// Parse a handshake header: msg_type(1) || length(3).
/// Returns (HandshakeType, body_slice, total_bytes_consumed).
pub fn parse_handshake_header(data: &[u8]) -> Result<(HandshakeType, &[u8], usize), TlsError> {
    if data.len() < HANDSHAKE_HEADER_LEN {
        return Err(TlsError::DecodeError("handshake header too short".into()));
    }
    let msg_type = HandshakeType::from_u8(data[0])
        .ok_or_else(|| TlsError::DecodeError(format!("unknown handshake type: {}", data[0])))?;
    let length = read_u24(&data[1..]) as usize;
    let total = HANDSHAKE_HEADER_LEN + length;
    if data.len() < total {
        return Err(TlsError::DecodeError(
            "handshake message body truncated".into(),
        ));
    }
    Ok((msg_type, &data[HANDSHAKE_HEADER_LEN..total], total))
}

/// Wrap a handshake body with the 4-byte header.
pub(crate) fn wrap_handshake(msg_type: HandshakeType, body: &[u8]) -> Vec<u8> {
    let len = body.len();
    let mut out = Vec::with_capacity(HANDSHAKE_HEADER_LEN + len);
    out.push(msg_type as u8);
    out.push((len >> 16) as u8);
    out.push((len >> 8) as u8);
    out.push(len as u8);
    out.extend_from_slice(body);
    out
}

// ---------------------------------------------------------------------------
// ClientHello
// ---------------------------------------------------------------------------

/// Encode a ClientHello as a complete handshake message (header + body).
pub fn encode_client_hello(ch: &ClientHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(256);

    body.extend_from_slice(&ch.client_version.to_be_bytes());
    body.extend_from_slice(&ch.random);

    body.push(ch.session_id.len() as u8);
    body.extend_from_slice(&ch.session_id);

    let suites_len = (ch.cipher_suites.len() * 2) as u16;
    body.extend_from_slice(&suites_len.to_be_bytes());
    for s in &ch.cipher_suites {
        body.extend_from_slice(&s.0.to_be_bytes());
    }

    body.push(ch.compression_methods.len() as u8);
    body.extend_from_slice(&ch.compression_methods);

    if !ch.extensions.is_empty() {
        let ext_data = encode_extensions(&ch.extensions);
        body.extend_from_slice(&(ext_data.len() as u16).to_be_bytes());
        body.extend_from_slice(&ext_data);
    }

    wrap_handshake(HandshakeType::ClientHello, &body)
}

/// Decode a ClientHello from handshake body bytes (after header).
pub fn decode_client_hello(data: &[u8]) -> Result<ClientHello, TlsError> {
    let mut pos = 0;
    let err = |msg: &str| TlsError::DecodeError(format!("ClientHello: {msg}"));

    if data.len() < 2 + 32 + 1 {
        return Err(err("too short"));
    }
    let client_version = u16::from_be_bytes([data[0], data[1]]);
    pos += 2;
    let mut random = [0u8; 32];
    random.copy_from_slice(&data[pos..pos + 32]);
    pos += 32;

    let sid_len = data[pos] as usize;
    pos += 1;
    if sid_len > 32 || data.len() < pos + sid_len {
        return Err(err("bad session_id"));
    }
    let session_id = data[pos..pos + sid_len].to_vec();
    pos += sid_len;

    if data.len() < pos + 2 {
        return Err(err("too short for cipher_suites length"));
    }
    let suites_len = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
    pos += 2;
    if suites_len % 2 != 0 || data.len() < pos + suites_len {
        return Err(err("bad cipher_suites"));
    }
    let cipher_suites = data[pos..pos + suites_len]
        .chunks_exact(2)
        .map(|c| CipherSuite(u16::from_be_bytes([c[0], c[1]])))
        .collect();
    pos += suites_len;

    if data.len() < pos + 1 {
        return Err(err("too short for compression_methods"));
    }
    let comp_len = data[pos] as usize;
    pos += 1;
    if data.len() < pos + comp_len {
        return Err(err("bad compression_methods"));
    }
    let compression_methods = data[pos..pos + comp_len].to_vec();
    pos += comp_len;

    let extensions = parse_extensions_from(&data[pos..])?;

    Ok(ClientHello {
        client_version,
        random,
        session_id,
        cipher_suites,
        compression_methods,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// ServerHello
// ---------------------------------------------------------------------------

/// Encode a ServerHello as a complete handshake message (header + body).
pub fn encode_server_hello(sh: &ServerHello) -> Vec<u8> {
    let mut body = Vec::with_capacity(128);
    body.extend_from_slice(&sh.server_version.to_be_bytes());
    body.extend_from_slice(&sh.random);
    body.push(sh.session_id.len() as u8);
    body.extend_from_slice(&sh.session_id);
    body.extend_from_slice(&sh.cipher_suite.0.to_be_bytes());
    body.push(sh.compression_method);
    if !sh.extensions.is_empty() {
        let ext_data = encode_extensions(&sh.extensions);
        body.extend_from_slice(&(ext_data.len() as u16).to_be_bytes());
        body.extend_from_slice(&ext_data);
    }
    wrap_handshake(HandshakeType::ServerHello, &body)
}

/// Decode a ServerHello from handshake body bytes (after header).
pub fn decode_server_hello(data: &[u8]) -> Result<ServerHello, TlsError> {
    let mut pos = 0;
    let err = |msg: &str| TlsError::DecodeError(format!("ServerHello: {msg}"));

    // server_version (2)
    if data.len() < pos + 2 {
        return Err(err("too short for version"));
    }
    let server_version = u16::from_be_bytes([data[pos], data[pos + 1]]);
    pos += 2;

    // random (32)
    if data.len() < pos + 32 {
        return Err(err("too short for random"));
    }
    let mut random = [0u8; 32];
    random.copy_from_slice(&data[pos..pos + 32]);
    pos += 32;

    // session_id
    if data.len() < pos + 1 {
        return Err(err("too short for session_id length"));
    }
    let sid_len = data[pos] as usize;
    pos += 1;
    if sid_len > 32 || data.len() < pos + sid_len {
        return Err(err("bad session_id"));
    }
    let session_id = data[pos..pos + sid_len].to_vec();
    pos += sid_len;

    // cipher_suite (2)
    if data.len() < pos + 2 {
        return Err(err("too short for cipher_suite"));
    }
    let cipher_suite = CipherSuite(u16::from_be_bytes([data[pos], data[pos + 1]]));
    pos += 2;

    // compression_method (1)
    if data.len() < pos + 1 {
        return Err(err("too short for compression"));
    }
    let compression_method = data[pos];
    pos += 1;

    let extensions = parse_extensions_from(&data[pos..])?;

    Ok(ServerHello {
        server_version,
        random,
        session_id,
        cipher_suite,
        compression_method,
        extensions,
    })
}

// ---------------------------------------------------------------------------
// Extension encoding/parsing helpers
// ---------------------------------------------------------------------------

/// Encode a list of extensions to bytes (no length prefix).
pub(crate) fn encode_extensions(exts: &[Extension]) -> Vec<u8> {
    let mut buf = Vec::new();
    for ext in exts {
        buf.extend_from_slice(&ext.extension_type.0.to_be_bytes());
        buf.extend_from_slice(&(ext.data.len() as u16).to_be_bytes());
        buf.extend_from_slice(&ext.data);
    }
    buf
}

/// Parse the optional extensions block that ends a hello message.
///
/// Empty input means no extensions. Otherwise the block is a 2-byte length
/// followed by exactly that many bytes.
fn parse_extensions_from(data: &[u8]) -> Result<Vec<Extension>, TlsError> {
    if data.is_empty() {
        return Ok(vec![]);
    }
    if data.len() < 2 {
        return Err(TlsError::DecodeError("extensions length truncated".into()));
    }
    let ext_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + ext_len {
        return Err(TlsError::DecodeError(
            "extensions block length mismatch".into(),
        ));
    }
    parse_extensions_list(&data[2..])
}

/// Parse a raw extension list (no length prefix). Duplicate types are rejected.
fn parse_extensions_list(data: &[u8]) -> Result<Vec<Extension>, TlsError> {
    let mut exts: Vec<Extension> = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        if data.len() - pos < 4 {
            return Err(TlsError::DecodeError("extension header truncated".into()));
        }
        let ext_type = ExtensionType(u16::from_be_bytes([data[pos], data[pos + 1]]));
        let ext_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;
        if data.len() < pos + ext_len {
            return Err(TlsError::DecodeError("extension data truncated".into()));
        }
        if exts.iter().any(|e| e.extension_type == ext_type) {
            return Err(TlsError::DecodeError(format!(
                "duplicate extension 0x{:04X}",
                ext_type.0
            )));
        }
        exts.push(Extension {
            extension_type: ext_type,
            data: data[pos..pos + ext_len].to_vec(),
        });
        pos += ext_len;
    }
    Ok(exts)
}

/// Read a 3-byte big-endian integer.
pub(crate) fn read_u24(data: &[u8]) -> u32 {
    ((data[0] as u32) << 16) | ((data[1] as u32) << 8) | (data[2] as u32)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
