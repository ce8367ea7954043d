//! TLS 1.2 extension encoding/decoding for ClientHello/ServerHello.

use crate::crypt::{NamedGroup, SignatureScheme};
use crate::extensions::{Extension, ExtensionType};
use minitls_types::TlsError;

/// EC point format `uncompressed` (RFC 8422 §5.1.2).
pub const EC_POINT_FORMAT_UNCOMPRESSED: u8 = 0;

// ---------------------------------------------------------------------------
// Build extensions for ClientHello
// ---------------------------------------------------------------------------

/// Build a `server_name` (SNI) extension.
pub fn build_server_name(hostname: &str) -> Extension {
    // Format: server_name_list_length(2) || name_type(1)=0 || host_name_length(2) || hostname
    let name_bytes = hostname.as_bytes();
    let list_len = 1 + 2 + name_bytes.len();
    let mut data = Vec::with_capacity(2 + list_len);
    data.extend_from_slice(&(list_len as u16).to_be_bytes());
    data.push(0); // host_name
    data.extend_from_slice(&(name_bytes.len() as u16).to_be_bytes());
    data.extend_from_slice(name_bytes);
    Extension {
        extension_type: ExtensionType::SERVER_NAME,
        data,
    }
}

/// Build the `supported_groups` extension.
pub fn build_supported_groups(groups: &[NamedGroup]) -> Extension {
    let mut data = Vec::with_capacity(2 + groups.len() * 2);
    data.extend_from_slice(&((groups.len() * 2) as u16).to_be_bytes());
    for g in groups {
        data.extend_from_slice(&g.0.to_be_bytes());
    }
    Extension {
        extension_type: ExtensionType::SUPPORTED_GROUPS,
        data,
    }
}

/// Build the `signature_algorithms` extension.
pub fn build_signature_algorithms(schemes: &[SignatureScheme]) -> Extension {
    let mut data = Vec::with_capacity(2 + schemes.len() * 2);
    data.extend_from_slice(&((schemes.len() * 2) as u16).to_be_bytes());
    for s in schemes {
        data.extend_from_slice(&s.0.to_be_bytes());
    }
    Extension {
        extension_type: ExtensionType::SIGNATURE_ALGORITHMS,
        data,
    }
}

/// Build the `ec_point_formats` extension advertising uncompressed points only.
pub fn build_ec_point_formats() -> Extension {
    Extension {
        extension_type: ExtensionType::EC_POINT_FORMATS,
        data: vec![0x01, EC_POINT_FORMAT_UNCOMPRESSED],
    }
}

/// Build the `renegotiation_info` extension (RFC 5746) for an initial handshake.
pub fn build_renegotiation_info_initial() -> Extension {
    // renegotiated_connection_length(1) = 0
    Extension {
        extension_type: ExtensionType::RENEGOTIATION_INFO,
        data: vec![0x00],
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parse a `u16` list with a 2-byte length prefix, rejecting trailing bytes.
fn parse_u16_list(data: &[u8], what: &str) -> Result<Vec<u16>, TlsError> {
    if data.len() < 2 {
        return Err(TlsError::DecodeError(format!("{what}: too short")));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + list_len || list_len % 2 != 0 {
        return Err(TlsError::DecodeError(format!("{what}: invalid length")));
    }
    Ok(data[2..]
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect())
}

/// Parse `supported_groups`.
pub fn parse_supported_groups(data: &[u8]) -> Result<Vec<NamedGroup>, TlsError> {
    Ok(parse_u16_list(data, "supported_groups")?
        .into_iter()
        .map(NamedGroup)
        .collect())
}

/// Parse `signature_algorithms`.
pub fn parse_signature_algorithms(data: &[u8]) -> Result<Vec<SignatureScheme>, TlsError> {
    Ok(parse_u16_list(data, "signature_algorithms")?
        .into_iter()
        .map(SignatureScheme)
        .collect())
}

/// Parse `server_name`. Only a single host_name entry is accepted.
pub fn parse_server_name(data: &[u8]) -> Result<String, TlsError> {
    if data.len() < 5 {
        return Err(TlsError::DecodeError("SNI: too short".into()));
    }
    let list_len = u16::from_be_bytes([data[0], data[1]]) as usize;
    if data.len() != 2 + list_len {
        return Err(TlsError::DecodeError("SNI: list length mismatch".into()));
    }
    let name_type = data[2];
    if name_type != 0 {
        return Err(TlsError::DecodeError(format!(
            "SNI: unsupported name type {name_type}"
        )));
    }
    let name_len = u16::from_be_bytes([data[3], data[4]]) as usize;
    if data.len() != 5 + name_len {
        return Err(TlsError::DecodeError("SNI: name length mismatch".into()));
    }
    String::from_utf8(data[5..].to_vec())
        .map_err(|_| TlsError::DecodeError("SNI: invalid UTF-8".into()))
}

/// Parse `ec_point_formats`.
pub fn parse_ec_point_formats(data: &[u8]) -> Result<Vec<u8>, TlsError> {
    let (&len, rest) = data
        .split_first()
        .ok_or_else(|| TlsError::DecodeError("ec_point_formats: empty".into()))?;
    if len == 0 || rest.len() != len as usize {
        return Err(TlsError::DecodeError(
            "ec_point_formats: invalid length".into(),
        ));
    }
    Ok(rest.to_vec())
}

/// Parse `renegotiation_info`, returning the renegotiated_connection bytes.
pub fn parse_renegotiation_info(data: &[u8]) -> Result<Vec<u8>, TlsError> {
    let (&len, rest) = data
        .split_first()
        .ok_or_else(|| TlsError::DecodeError("renegotiation_info: empty".into()))?;
    if rest.len() != len as usize {
        return Err(TlsError::DecodeError(
            "renegotiation_info: length mismatch".into(),
        ));
    }
    Ok(rest.to_vec())
}
