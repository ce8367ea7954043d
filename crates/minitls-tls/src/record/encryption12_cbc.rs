//! TLS 1.2 CBC MAC-then-encrypt record encryption (RFC 5246 §6.2.3.2).
//!
//! Record fragment = explicit_IV(16) || encrypted(plaintext || MAC || padding)
//! MAC = HMAC(mac_key, seq(8) || type(1) || version(2) || length(2) || plaintext)
//! Padding uses TLS scheme: all padding bytes = pad_len, last byte = pad_len.

use super::{
    compute_record_mac, next_seq, ContentType, Record, MAX_CIPHERTEXT_LENGTH,
    MAX_PLAINTEXT_LENGTH, TLS12_VERSION,
};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes128, Aes256};
use crate::crypt::hash::digest;
use minitls_types::{CryptoError, MacAlgId, TlsError};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq, ConstantTimeGreater};
use zeroize::Zeroize;

/// AES block size (16 bytes).
const AES_BLOCK_SIZE: usize = 16;

/// Largest possible padding: 255 padding bytes plus the length byte.
const MAX_PADDING_WINDOW: usize = 256;

/// Bytes of filler hashed to even out HMAC cost; covers 256 bytes of
/// content difference in either 64- or 128-byte blocks.
const HMAC_FILLER: [u8; 3 * 128] = [0u8; 3 * 128];

/// AES-128 or AES-256 block cipher, keyed once per direction.
enum AesBlock {
    Aes128(Box<Aes128>),
    Aes256(Box<Aes256>),
}

impl AesBlock {
    fn new(key: &[u8]) -> Result<Self, TlsError> {
        let invalid = || CryptoError::InvalidKeyLength {
            expected: 16,
            got: key.len(),
        };
        match key.len() {
            16 => Ok(Self::Aes128(Box::new(
                Aes128::new_from_slice(key).map_err(|_| invalid())?,
            ))),
            32 => Ok(Self::Aes256(Box::new(
                Aes256::new_from_slice(key).map_err(|_| invalid())?,
            ))),
            _ => Err(invalid().into()),
        }
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

/// Build TLS-style padding for CBC (RFC 5246 §6.2.3.2).
///
/// padding_length = (block_size - ((data_len + 1) % block_size)) % block_size
/// Total padding = padding_length + 1 bytes, all set to padding_length.
fn build_tls_padding(data_len: usize) -> Vec<u8> {
    let padding_length = (AES_BLOCK_SIZE - ((data_len + 1) % AES_BLOCK_SIZE)) % AES_BLOCK_SIZE;
    vec![padding_length as u8; padding_length + 1]
}

/// AES-CBC encrypt in-place (data must be block-aligned).
fn aes_cbc_encrypt_raw(cipher: &AesBlock, iv: &[u8], data: &mut [u8]) {
    let mut prev = [0u8; AES_BLOCK_SIZE];
    prev.copy_from_slice(iv);

    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        cipher.encrypt_block(chunk);
        prev.copy_from_slice(chunk);
    }
}

/// AES-CBC decrypt in-place (no padding removal).
fn aes_cbc_decrypt_raw(cipher: &AesBlock, iv: &[u8], data: &mut [u8]) {
    let mut prev = [0u8; AES_BLOCK_SIZE];
    prev.copy_from_slice(iv);

    for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
        let mut ct_copy = [0u8; AES_BLOCK_SIZE];
        ct_copy.copy_from_slice(chunk);
        cipher.decrypt_block(chunk);
        for (b, p) in chunk.iter_mut().zip(prev.iter()) {
            *b ^= p;
        }
        prev = ct_copy;
    }
}

/// Compression function calls made by the inner hash of a record MAC over
/// `content_len` bytes (13-byte header, 0x80 terminator, length field).
fn mac_compressions(mac: MacAlgId, content_len: usize) -> usize {
    let block = mac.hash().block_len();
    let length_field = block / 8;
    (13 + content_len + 1 + length_field).div_ceil(block)
}

/// Run throwaway hash compressions so a MAC over `content_len` bytes costs
/// the same as one over `max_content_len` bytes.
fn pad_hmac_work(mac: MacAlgId, content_len: usize, max_content_len: usize) {
    let block = mac.hash().block_len();
    let missing = mac_compressions(mac, max_content_len) - mac_compressions(mac, content_len);
    let filler_len = (missing * block).min(HMAC_FILLER.len());
    std::hint::black_box(digest(mac.hash(), &HMAC_FILLER[..filler_len]));
}

/// Copy the `mac_len` bytes at `content_len` out of `data`, touching every
/// candidate offset so the access pattern does not reveal the padding.
fn extract_mac(data: &[u8], content_len: usize, max_content_len: usize, mac_len: usize) -> Vec<u8> {
    let mut out = vec![0u8; mac_len];
    let first = max_content_len.saturating_sub(MAX_PADDING_WINDOW - 1);
    for offset in first..=max_content_len {
        let here = (offset as u64).ct_eq(&(content_len as u64));
        for (k, byte) in out.iter_mut().enumerate() {
            byte.conditional_assign(&data[offset + k], here);
        }
    }
    out
}

/// TLS 1.2 CBC MAC-then-encrypt record encryptor.
pub struct RecordEncryptor12Cbc {
    cipher: AesBlock,
    mac: MacAlgId,
    mac_key: Vec<u8>,
    seq: u64,
}

impl Drop for RecordEncryptor12Cbc {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

impl RecordEncryptor12Cbc {
    pub fn new(enc_key: &[u8], mac_key: &[u8], mac: MacAlgId) -> Result<Self, TlsError> {
        Ok(Self {
            cipher: AesBlock::new(enc_key)?,
            mac,
            mac_key: mac_key.to_vec(),
            seq: 0,
        })
    }

    /// Encrypt a record with MAC-then-encrypt under a fresh random IV.
    pub fn encrypt_record(
        &mut self,
        content_type: ContentType,
        plaintext: &[u8],
    ) -> Result<Record, TlsError> {
        if plaintext.len() > MAX_PLAINTEXT_LENGTH {
            return Err(TlsError::RecordError("plaintext exceeds maximum".into()));
        }
        let seq = next_seq(&mut self.seq)?;

        let mac = compute_record_mac(self.mac, &self.mac_key, seq, content_type, plaintext)?;

        // Build: plaintext || MAC || TLS-padding
        let data_len = plaintext.len() + mac.len();
        let padding = build_tls_padding(data_len);
        let mut encrypt_data = Vec::with_capacity(data_len + padding.len());
        encrypt_data.extend_from_slice(plaintext);
        encrypt_data.extend_from_slice(&mac);
        encrypt_data.extend_from_slice(&padding);

        let mut iv = [0u8; AES_BLOCK_SIZE];
        getrandom::getrandom(&mut iv).map_err(|_| CryptoError::RandFail)?;

        aes_cbc_encrypt_raw(&self.cipher, &iv, &mut encrypt_data);

        let mut fragment = Vec::with_capacity(AES_BLOCK_SIZE + encrypt_data.len());
        fragment.extend_from_slice(&iv);
        fragment.extend_from_slice(&encrypt_data);

        Ok(Record {
            content_type,
            version: TLS12_VERSION,
            fragment,
        })
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }
}

/// TLS 1.2 CBC record decryptor.
pub struct RecordDecryptor12Cbc {
    cipher: AesBlock,
    mac: MacAlgId,
    mac_key: Vec<u8>,
    seq: u64,
}

impl Drop for RecordDecryptor12Cbc {
    fn drop(&mut self) {
        self.mac_key.zeroize();
    }
}

impl RecordDecryptor12Cbc {
    pub fn new(enc_key: &[u8], mac_key: &[u8], mac: MacAlgId) -> Result<Self, TlsError> {
        Ok(Self {
            cipher: AesBlock::new(enc_key)?,
            mac,
            mac_key: mac_key.to_vec(),
            seq: 0,
        })
    }

    /// Decrypt a TLS 1.2 CBC record.
    ///
    /// Padding and MAC are both checked in constant time and fail with the
    /// same `BadRecordMac`, so a peer cannot tell them apart.
    pub fn decrypt_record(&mut self, record: &Record) -> Result<Vec<u8>, TlsError> {
        let fragment = &record.fragment;
        let mac_len = self.mac.output_len();

        // Minimum: IV(16) + at least one block (mac + padding)
        let min_encrypted_len = (mac_len + 1).div_ceil(AES_BLOCK_SIZE) * AES_BLOCK_SIZE;
        if fragment.len() < AES_BLOCK_SIZE + min_encrypted_len {
            return Err(TlsError::RecordError("CBC record too short".into()));
        }
        if fragment.len() > MAX_CIPHERTEXT_LENGTH {
            return Err(TlsError::RecordError("record overflow".into()));
        }

        let (iv, encrypted) = fragment.split_at(AES_BLOCK_SIZE);
        if encrypted.len() % AES_BLOCK_SIZE != 0 {
            return Err(TlsError::RecordError(
                "CBC ciphertext not block-aligned".into(),
            ));
        }
        let seq = next_seq(&mut self.seq)?;

        let mut decrypted = encrypted.to_vec();
        aes_cbc_decrypt_raw(&self.cipher, iv, &mut decrypted);

        let len = decrypted.len();
        let padding_byte = decrypted[len - 1];
        let padding_length = padding_byte as usize;
        let total_overhead = padding_length + 1 + mac_len;
        let good_length = Choice::from(u8::from(total_overhead <= len));

        // Scan a fixed window so the loop count does not depend on the padding.
        let window = len.min(MAX_PADDING_WINDOW);
        let mut pad_ok = good_length;
        for i in 0..window {
            let in_padding = !(i as u16).ct_gt(&(padding_length as u16));
            let matches = decrypted[len - 1 - i].ct_eq(&padding_byte);
            pad_ok &= !in_padding | matches;
        }

        // Bad length is folded into the MAC check with an empty plaintext.
        let max_content_len = len - 1 - mac_len;
        let content_len = u64::conditional_select(
            &0,
            &(len.wrapping_sub(total_overhead) as u64),
            good_length,
        ) as usize;

        let expected_mac = compute_record_mac(
            self.mac,
            &self.mac_key,
            seq,
            record.content_type,
            &decrypted[..content_len],
        )?;
        pad_hmac_work(self.mac, content_len, max_content_len);

        let received_mac = extract_mac(&decrypted, content_len, max_content_len, mac_len);
        let mac_ok = received_mac.as_slice().ct_eq(expected_mac.as_slice());

        if !bool::from(pad_ok & mac_ok) {
            decrypted.zeroize();
            return Err(TlsError::BadRecordMac);
        }

        decrypted.truncate(content_len);
        Ok(decrypted)
    }

    pub fn sequence_number(&self) -> u64 {
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(key_len: usize, mac: MacAlgId) -> (RecordEncryptor12Cbc, RecordDecryptor12Cbc) {
        let enc_key = vec![0x42u8; key_len];
        let mac_key = vec![0xABu8; mac.output_len()];
        (
            RecordEncryptor12Cbc::new(&enc_key, &mac_key, mac).unwrap(),
            RecordDecryptor12Cbc::new(&enc_key, &mac_key, mac).unwrap(),
        )
    }

    #[test]
    fn test_padding_lengths() {
        assert_eq!(build_tls_padding(15), vec![0]);
        assert_eq!(build_tls_padding(16), vec![15; 16]);
        assert_eq!(build_tls_padding(20), vec![11; 12]);
    }

    #[test]
    fn test_cbc_roundtrip_each_mac() {
        for (key_len, mac) in [
            (16, MacAlgId::HmacSha1),
            (32, MacAlgId::HmacSha1),
            (16, MacAlgId::HmacSha256),
            (32, MacAlgId::HmacSha384),
        ] {
            let (mut enc, mut dec) = pair(key_len, mac);
            let plaintext = b"hello TLS 1.2 CBC";
            let record = enc
                .encrypt_record(ContentType::ApplicationData, plaintext)
                .unwrap();
            assert_eq!(record.fragment.len() % AES_BLOCK_SIZE, 0);
            assert_eq!(dec.decrypt_record(&record).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_explicit_iv_is_fresh() {
        let (mut enc, _) = pair(16, MacAlgId::HmacSha256);
        let a = enc.encrypt_record(ContentType::ApplicationData, b"same").unwrap();
        let b = enc.encrypt_record(ContentType::ApplicationData, b"same").unwrap();
        assert_ne!(a.fragment[..16], b.fragment[..16]);
        assert_ne!(a.fragment, b.fragment);
    }

    #[test]
    fn test_cbc_tampered_mac_detected() {
        let (mut enc, _) = pair(16, MacAlgId::HmacSha1);
        let mut dec = RecordDecryptor12Cbc::new(&[0x42; 16], &[0xCD; 20], MacAlgId::HmacSha1).unwrap();
        let record = enc
            .encrypt_record(ContentType::ApplicationData, b"secret")
            .unwrap();
        assert!(matches!(
            dec.decrypt_record(&record),
            Err(TlsError::BadRecordMac)
        ));
    }

    #[test]
    fn test_bad_padding_same_error_as_bad_mac() {
        let (mut enc, mut dec) = pair(16, MacAlgId::HmacSha256);
        let mut record = enc
            .encrypt_record(ContentType::ApplicationData, b"0123456789abcdef")
            .unwrap();
        // Flipping a byte of the second-to-last ciphertext block flips the
        // same byte of the last plaintext block, which holds the padding.
        let n = record.fragment.len();
        record.fragment[n - AES_BLOCK_SIZE - 1] ^= 0x01;
        assert!(matches!(
            dec.decrypt_record(&record),
            Err(TlsError::BadRecordMac)
        ));
    }

    #[test]
    fn test_cbc_misaligned_rejected() {
        let (_, mut dec) = pair(16, MacAlgId::HmacSha1);
        let record = Record {
            content_type: ContentType::ApplicationData,
            version: TLS12_VERSION,
            fragment: vec![0u8; 16 + 32 + 3],
        };
        assert!(matches!(
            dec.decrypt_record(&record),
            Err(TlsError::RecordError(_))
        ));
    }

    #[test]
    fn test_cbc_multiple_records_seq() {
        let (mut enc, mut dec) = pair(16, MacAlgId::HmacSha1);
        for i in 0..5 {
            let msg = format!("message {i}");
            let record = enc
                .encrypt_record(ContentType::ApplicationData, msg.as_bytes())
                .unwrap();
            assert_eq!(dec.decrypt_record(&record).unwrap(), msg.as_bytes());
        }
        assert_eq!(enc.sequence_number(), 5);
        assert_eq!(dec.sequence_number(), 5);
    }

    /// Encrypt `plaintext || MAC || padding` under a caller-chosen padding.
    fn seal_with_padding(plaintext: &[u8], padding: &[u8]) -> Record {
        let mac_key = [0xABu8; 32];
        let mut data = plaintext.to_vec();
        data.extend_from_slice(
            &compute_record_mac(
                MacAlgId::HmacSha256,
                &mac_key,
                0,
                ContentType::ApplicationData,
                plaintext,
            )
            .unwrap(),
        );
        data.extend_from_slice(padding);
        assert_eq!(data.len() % AES_BLOCK_SIZE, 0);
        let iv = [0x11u8; AES_BLOCK_SIZE];
        aes_cbc_encrypt_raw(&AesBlock::new(&[0x42; 16]).unwrap(), &iv, &mut data);
        let mut fragment = iv.to_vec();
        fragment.extend_from_slice(&data);
        Record {
            content_type: ContentType::ApplicationData,
            version: TLS12_VERSION,
            fragment,
        }
    }

    #[test]
    fn test_maximal_padding_accepted() {
        let (_, mut dec) = pair(16, MacAlgId::HmacSha256);
        // 16 + 32 + 256 = 19 blocks
        let record = seal_with_padding(b"0123456789abcdef", &[255u8; 256]);
        assert_eq!(dec.decrypt_record(&record).unwrap(), b"0123456789abcdef");
    }

    #[test]
    fn test_bad_byte_deep_in_padding_rejected() {
        let (_, mut dec) = pair(16, MacAlgId::HmacSha256);
        let mut padding = [255u8; 256];
        padding[3] = 254;
        let record = seal_with_padding(b"0123456789abcdef", &padding);
        assert!(matches!(
            dec.decrypt_record(&record),
            Err(TlsError::BadRecordMac)
        ));
    }

    #[test]
    fn test_padding_longer_than_record_rejected() {
        let (_, mut dec) = pair(16, MacAlgId::HmacSha256);
        // Claims 255 bytes of padding in a 64-byte plaintext.
        let record = seal_with_padding(b"", &[255u8; 32]);
        assert!(matches!(
            dec.decrypt_record(&record),
            Err(TlsError::BadRecordMac)
        ));
    }

    #[test]
    fn test_hmac_work_independent_of_padding() {
        for mac in [MacAlgId::HmacSha1, MacAlgId::HmacSha256, MacAlgId::HmacSha384] {
            let block = mac.hash().block_len();
            for max_content_len in [300usize, 1000, 16384] {
                let target = mac_compressions(mac, max_content_len);
                for content_len in max_content_len - 255..=max_content_len {
                    let missing = target - mac_compressions(mac, content_len);
                    assert!(missing * block <= HMAC_FILLER.len());
                }
            }
        }
    }

    #[test]
    fn test_extract_mac_every_offset() {
        let data: Vec<u8> = (0..=255u8).cycle().take(600).collect();
        let max_content_len = 600 - 1 - 20;
        for content_len in [max_content_len, max_content_len - 100, max_content_len - 255] {
            assert_eq!(
                extract_mac(&data, content_len, max_content_len, 20),
                &data[content_len..content_len + 20]
            );
        }
    }
}
