//! TLS 1.2 key exchange: ephemeral X25519 and RSA key transport.

use crate::handshake::codec12::ClientKeyExchange;
use crate::handshake::verify::ServerPublicKey;
use minitls_types::{CryptoError, TlsError};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// X25519 public value length.
pub const X25519_KEY_LEN: usize = 32;

/// RSA pre-master secret length (client_version(2) || random(46)).
pub const RSA_PRE_MASTER_LEN: usize = 48;

/// Byte order of an encoded X25519 public value.
///
/// The wire format is little-endian (RFC 7748). Big-endian is the integer
/// view of the u-coordinate used by some key stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteOrder {
    LittleEndian,
    BigEndian,
}

/// An X25519 key pair.
#[derive(Clone)]
pub struct X25519KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl X25519KeyPair {
    /// Generate a fresh key pair from the OS RNG.
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Build a key pair from a little-endian private scalar.
    pub fn from_private_bytes(bytes: [u8; X25519_KEY_LEN]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public value in the given byte order.
    pub fn encode_public(&self, order: ByteOrder) -> [u8; X25519_KEY_LEN] {
        encode_public_key(&self.public, order)
    }

    /// Raw X25519 agreement. An all-zero result (low-order peer point) is rejected.
    pub fn agree(&self, peer: &PublicKey) -> Result<Zeroizing<Vec<u8>>, TlsError> {
        let shared = self.secret.diffie_hellman(peer);
        if !shared.was_contributory() {
            return Err(CryptoError::X25519NonContributory.into());
        }
        Ok(Zeroizing::new(shared.as_bytes().to_vec()))
    }
}

impl std::fmt::Debug for X25519KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("X25519KeyPair")
            .field("public", &self.public.as_bytes())
            .finish_non_exhaustive()
    }
}

/// Encode a public value in `order`.
pub fn encode_public_key(key: &PublicKey, order: ByteOrder) -> [u8; X25519_KEY_LEN] {
    let mut out = key.to_bytes();
    if order == ByteOrder::BigEndian {
        out.reverse();
    }
    out
}

/// Decode a public value given in `order`.
///
/// The decoded key is re-encoded and compared with the input, so a value
/// that does not survive the round trip is rejected.
pub fn decode_public_key(bytes: &[u8], order: ByteOrder) -> Result<PublicKey, TlsError> {
    let mut raw: [u8; X25519_KEY_LEN] = bytes.try_into().map_err(|_| {
        TlsError::DecodeError(format!(
            "X25519 public value must be {X25519_KEY_LEN} bytes, got {}",
            bytes.len()
        ))
    })?;
    if order == ByteOrder::BigEndian {
        raw.reverse();
    }
    let key = PublicKey::from(raw);
    if encode_public_key(&key, order).as_slice() != bytes {
        return Err(CryptoError::X25519InvalidPublicKey.into());
    }
    Ok(key)
}

/// Result of running the client side of a key exchange.
pub struct KeyExchangeOutput {
    pub pre_master_secret: Zeroizing<Vec<u8>>,
    pub client_key_exchange: ClientKeyExchange,
}

/// Client side of the negotiated key exchange.
pub enum KeyExchange {
    /// Ephemeral X25519 against the server's signed public value.
    Ecdhe {
        local: X25519KeyPair,
        peer: PublicKey,
    },
    /// Random pre-master secret encrypted to the certificate key.
    Rsa { server_key: ServerPublicKey },
}

impl KeyExchange {
    /// Compute the pre-master secret and the ClientKeyExchange that conveys it.
    pub fn complete(&self) -> Result<KeyExchangeOutput, TlsError> {
        match self {
            KeyExchange::Ecdhe { local, peer } => {
                let pre_master_secret = local.agree(peer)?;
                Ok(KeyExchangeOutput {
                    pre_master_secret,
                    client_key_exchange: ClientKeyExchange::Ecdhe {
                        public_key: local.encode_public(ByteOrder::LittleEndian).to_vec(),
                    },
                })
            }
            KeyExchange::Rsa { server_key } => {
                let pre_master_secret = generate_rsa_pre_master()?;
                let encrypted_pre_master = server_key.encrypt_pkcs1(&pre_master_secret)?;
                Ok(KeyExchangeOutput {
                    pre_master_secret,
                    client_key_exchange: ClientKeyExchange::Rsa {
                        encrypted_pre_master,
                    },
                })
            }
        }
    }
}

/// `0x0303 || random(46)` (RFC 5246 §7.4.7.1).
fn generate_rsa_pre_master() -> Result<Zeroizing<Vec<u8>>, TlsError> {
    let mut pms = Zeroizing::new(vec![0u8; RSA_PRE_MASTER_LEN]);
    pms[..2].copy_from_slice(&crate::TlsVersion::Tls12.wire().to_be_bytes());
    getrandom::getrandom(&mut pms[2..]).map_err(|_| CryptoError::RandFail)?;
    Ok(pms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs8::DecodePrivateKey;
    use rsa::{Pkcs1v15Encrypt, RsaPrivateKey};

    const SERVER_KEY_PEM: &str = include_str!("../../../../tests/interop/testdata/server.key.pem");

    #[test]
    fn test_public_key_round_trip_both_orders() {
        for _ in 0..16 {
            let kp = X25519KeyPair::generate();
            for order in [ByteOrder::LittleEndian, ByteOrder::BigEndian] {
                let encoded = kp.encode_public(order);
                let decoded = decode_public_key(&encoded, order).unwrap();
                assert_eq!(decoded.as_bytes(), kp.public_key().as_bytes());
                assert_eq!(encode_public_key(&decoded, order), encoded);
            }
        }
    }

    #[test]
    fn test_byte_orders_are_reversed() {
        let kp = X25519KeyPair::from_private_bytes([0x42; 32]);
        let mut le = kp.encode_public(ByteOrder::LittleEndian);
        let be = kp.encode_public(ByteOrder::BigEndian);
        le.reverse();
        assert_eq!(le, be);
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let err = decode_public_key(&[0u8; 31], ByteOrder::LittleEndian).unwrap_err();
        assert!(matches!(err, TlsError::DecodeError(_)));
        assert!(decode_public_key(&[0u8; 33], ByteOrder::BigEndian).is_err());
    }

    #[test]
    fn test_rfc7748_agreement() {
        // RFC 7748 §6.1
        let alice_sk = hex("77076d0a7318a57d3c16c17251b26645df4c2f87ebc0992ab177fba51db92c2a");
        let bob_pk = hex("de9edb7d7b7dc1b4d35b61c2ece435373f8343c85b78674dadfc7e146f882b4f");
        let expected = hex("4a5d9d5ba4ce2de1728e3bf480350f25e07e21c947d19e3376f09b3c1e161742");

        let alice = X25519KeyPair::from_private_bytes(alice_sk.try_into().unwrap());
        let peer = decode_public_key(&bob_pk, ByteOrder::LittleEndian).unwrap();
        assert_eq!(&alice.agree(&peer).unwrap()[..], &expected[..]);
    }

    #[test]
    fn test_low_order_point_rejected() {
        let kp = X25519KeyPair::generate();
        let zero = PublicKey::from([0u8; 32]);
        let err = kp.agree(&zero).unwrap_err();
        assert!(matches!(
            err,
            TlsError::CryptoError(CryptoError::X25519NonContributory)
        ));
    }

    #[test]
    fn test_ecdhe_exchange_matches_peer() {
        let client = X25519KeyPair::generate();
        let server = X25519KeyPair::generate();
        let kx = KeyExchange::Ecdhe {
            local: client.clone(),
            peer: *server.public_key(),
        };
        let out = kx.complete().unwrap();
        let ClientKeyExchange::Ecdhe { public_key } = &out.client_key_exchange else {
            panic!("expected ECDHE ClientKeyExchange");
        };
        let client_pub = decode_public_key(public_key, ByteOrder::LittleEndian).unwrap();
        let server_side = server.agree(&client_pub).unwrap();
        assert_eq!(&out.pre_master_secret[..], &server_side[..]);
    }

    #[test]
    fn test_rsa_exchange_pre_master_layout() {
        let sk = RsaPrivateKey::from_pkcs8_pem(SERVER_KEY_PEM).unwrap();
        let kx = KeyExchange::Rsa {
            server_key: ServerPublicKey::from_rsa(sk.to_public_key()),
        };
        let out = kx.complete().unwrap();
        assert_eq!(out.pre_master_secret.len(), RSA_PRE_MASTER_LEN);
        assert_eq!(&out.pre_master_secret[..2], &[0x03, 0x03]);

        let ClientKeyExchange::Rsa {
            encrypted_pre_master,
        } = &out.client_key_exchange
        else {
            panic!("expected RSA ClientKeyExchange");
        };
        let decrypted = sk.decrypt(Pkcs1v15Encrypt, encrypted_pre_master).unwrap();
        assert_eq!(&decrypted[..], &out.pre_master_secret[..]);
    }

    fn hex(s: &str) -> Vec<u8> {
        (0..s.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
            .collect()
    }
}
