//! Synchronous TLS 1.2 connection wrapping a `Read + Write` transport.
//!
//! Provides `Tls12ClientConnection` implementing the `TlsConnection` trait.

mod client;

pub use client::Tls12ClientConnection;

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Handshaking,
    Connected,
    Closed,
    Error,
}
