//! Minimal HTTP/1.1 GET over an established TLS connection.
//!
//! Writes one request line and headers, then reads the response until the
//! declared `Content-Length` is consumed or the server ends the stream.
//! Chunked transfer coding is not decoded.

use std::io;

use log::debug;

use crate::{TlsConnection, TlsError};

const MAX_HEAD_LEN: usize = 16 * 1024;

/// A parsed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// First header with the given name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The body as text, with invalid UTF-8 replaced.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Build a GET request asking the server to close after responding.
pub fn build_get_request(host: &str, path: &str) -> String {
    let path = if path.is_empty() { "/" } else { path };
    format!("GET {path} HTTP/1.1\r\nHost: {host}\r\nAccept: */*\r\nConnection: close\r\n\r\n")
}

/// Send a GET for `path` and read the response.
pub fn get(conn: &mut dyn TlsConnection, host: &str, path: &str) -> Result<HttpResponse, TlsError> {
    let request = build_get_request(host, path);
    conn.write(request.as_bytes())?;
    debug!("http: GET {path}");
    read_response(conn)
}

/// Read one response from the connection.
pub fn read_response(conn: &mut dyn TlsConnection) -> Result<HttpResponse, TlsError> {
    let mut data = Vec::new();
    let mut head: Option<(usize, u16, Vec<(String, String)>)> = None;
    let mut buf = vec![0u8; 16384];

    loop {
        if head.is_none() {
            if let Some(end) = find_head_end(&data) {
                let (status, headers) = parse_head(&data[..end])?;
                head = Some((end + 4, status, headers));
            } else if data.len() > MAX_HEAD_LEN {
                return Err(http_error("response head too large"));
            }
        }
        if let Some((body_start, _, headers)) = &head {
            if let Some(len) = content_length(headers)? {
                if data.len() - body_start >= len {
                    data.truncate(body_start + len);
                    break;
                }
            }
        }

        match conn.read(&mut buf) {
            Ok(0) | Err(TlsError::ConnectionClosed) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
            // Servers that skip close_notify on `Connection: close`.
            Err(TlsError::IoError(ref e))
                if matches!(
                    e.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::ConnectionReset
                ) && head.is_some() =>
            {
                debug!("http: stream ended without close_notify");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    let (body_start, status, headers) = match head {
        Some(head) => head,
        None => return Err(http_error("connection closed before response head")),
    };
    if let Some(len) = content_length(&headers)? {
        if data.len() - body_start < len {
            return Err(http_error("body shorter than Content-Length"));
        }
    }
    Ok(HttpResponse {
        status,
        headers,
        body: data[body_start..].to_vec(),
    })
}

fn http_error(msg: &str) -> TlsError {
    TlsError::DecodeError(format!("http: {msg}"))
}

fn find_head_end(data: &[u8]) -> Option<usize> {
    data.windows(4).position(|w| w == b"\r\n\r\n")
}

fn parse_head(head: &[u8]) -> Result<(u16, Vec<(String, String)>), TlsError> {
    let text = std::str::from_utf8(head).map_err(|_| http_error("head is not UTF-8"))?;
    let mut lines = text.split("\r\n");
    let status_line = lines.next().unwrap_or_default();
    let mut parts = status_line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/1.") {
        return Err(http_error("bad status line"));
    }
    let status = parts
        .next()
        .and_then(|s| s.parse::<u16>().ok())
        .ok_or_else(|| http_error("bad status code"))?;

    let mut headers = Vec::new();
    for line in lines {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| http_error("malformed header"))?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }
    Ok((status, headers))
}

fn content_length(headers: &[(String, String)]) -> Result<Option<usize>, TlsError> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| {
            v.parse::<usize>()
                .map_err(|_| http_error("bad Content-Length"))
        })
        .transpose()
}
