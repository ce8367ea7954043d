//! TLS 1.2 client handshake: message codecs, key exchange, and the state machine.

pub mod client12;
pub mod codec;
pub mod codec12;
pub mod extensions_codec;
pub mod key_exchange;
pub mod verify;

/// Handshake message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HandshakeType {
    HelloRequest = 0,
    ClientHello = 1,
    ServerHello = 2,
    Certificate = 11,
    ServerKeyExchange = 12,
    CertificateRequest = 13,
    ServerHelloDone = 14,
    ClientKeyExchange = 16,
    Finished = 20,
}

impl HandshakeType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::HelloRequest),
            1 => Some(Self::ClientHello),
            2 => Some(Self::ServerHello),
            11 => Some(Self::Certificate),
            12 => Some(Self::ServerKeyExchange),
            13 => Some(Self::CertificateRequest),
            14 => Some(Self::ServerHelloDone),
            16 => Some(Self::ClientKeyExchange),
            20 => Some(Self::Finished),
            _ => None,
        }
    }
}

/// Client handshake progress. Moves strictly forward; any failure lands in
/// `Aborted`, from which nothing else is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Nothing sent yet.
    Start,
    /// ClientHello written; waiting for ServerHello.
    ClientHelloSent,
    /// Suite fixed; waiting for Certificate.
    ServerHelloReceived,
    /// Server key known; waiting for ServerKeyExchange (ECDHE) or ServerHelloDone (RSA).
    CertificateReceived,
    /// Ephemeral key verified; waiting for ServerHelloDone.
    ServerKeyExchangeReceived,
    /// Server flight complete; ready to derive keys.
    ServerHelloDoneReceived,
    /// ClientKeyExchange built and the key block derived.
    ClientKeyExchangeSent,
    /// Client write protection active.
    ChangeCipherSpecSent,
    /// Client Finished sent; waiting for the server's ChangeCipherSpec and Finished.
    FinishedSent,
    /// Server Finished verified.
    Established,
    /// Failed; the session is unusable.
    Aborted,
}

impl HandshakeState {
    /// Returns true once the session can carry application data.
    pub fn is_established(self) -> bool {
        self == Self::Established
    }
}
