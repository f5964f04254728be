//! Cipher and MAC capabilities installed into the packet layer.
//!
//! The packet layer does not choose algorithms. Key exchange negotiates
//! them, derives keys, and hands the result over as a [`CipherSlot`]: a
//! directional bundle of a block cipher, its block size, a MAC engine and the
//! number of MAC bytes carried on the wire.
//!
//! Supported engines:
//! - AES-128/192/256-CTR (RFC 4344)
//! - AES-128/256-CBC (RFC 4253)
//! - HMAC-SHA1, HMAC-SHA1-96, HMAC-SHA2-256, HMAC-SHA2-512 (RFC 4253, RFC 6668)
//!
//! # Security
//!
//! - MAC keys are zeroized on drop and redacted in `Debug` output
//! - Cipher state carries chaining/counter state across calls, so a packet may
//!   be processed in several whole-block pieces
//!
//! # Example
//!
//! ```rust
//! use wirelay_proto::ssh::crypto::{CipherAlgorithm, CipherSlot, MacAlgorithm};
//! use wirelay_proto::ssh::packet::Direction;
//!
//! let slot = CipherSlot::from_algorithms(
//!     CipherAlgorithm::Aes128Ctr,
//!     Direction::Outbound,
//!     &[7u8; 16],
//!     &[9u8; 16],
//!     MacAlgorithm::HmacSha256,
//!     &[1u8; 32],
//! )
//! .unwrap();
//! assert_eq!(slot.block_size(), 16);
//! assert_eq!(slot.mac_size(), 32);
//! ```

use crate::ssh::packet::Direction;
use aes::{Aes128, Aes192, Aes256};
use cbc::{Decryptor, Encryptor};
use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use sha2::{Sha256, Sha512};
use wirelay_platform::{WirelayError, WirelayResult};
use zeroize::Zeroize;

/// Smallest block size the framing code accepts.
pub const MIN_BLOCK_SIZE: usize = 8;

/// Largest block size the framing code accepts.
///
/// Outbound padding reaches `block_size + 3` bytes, which must stay within
/// the inbound padding bound of 32.
pub const MAX_BLOCK_SIZE: usize = 16;

/// In-place block transform for one direction.
///
/// Implementations keep their chaining or counter state between calls.
pub trait BlockCipher: Send {
    /// Enciphers or deciphers `data` in place. `data` is a whole number of blocks.
    fn apply(&mut self, data: &mut [u8]) -> WirelayResult<()>;
}

/// Message authentication over `uint32 sequence || packet`.
pub trait PacketMac: Send {
    /// Number of bytes produced by [`PacketMac::compute`].
    fn output_size(&self) -> usize;

    /// Computes the tag for the packet with the given sequence number.
    fn compute(&mut self, sequence: u32, packet: &[u8]) -> WirelayResult<Vec<u8>>;
}

/// Directional cipher + MAC bundle.
pub struct CipherSlot {
    cipher: Box<dyn BlockCipher>,
    block_size: usize,
    mac: Box<dyn PacketMac>,
    mac_size: usize,
}

impl std::fmt::Debug for CipherSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherSlot")
            .field("cipher", &"<redacted>")
            .field("block_size", &self.block_size)
            .field("mac", &"<redacted>")
            .field("mac_size", &self.mac_size)
            .finish()
    }
}

impl CipherSlot {
    /// Bundles a cipher and MAC for installation.
    ///
    /// # Errors
    ///
    /// Returns [`WirelayError::Config`] if `block_size` is outside `8..=16`
    /// or `mac_size` exceeds what the MAC engine produces.
    pub fn new(
        cipher: Box<dyn BlockCipher>,
        block_size: usize,
        mac: Box<dyn PacketMac>,
        mac_size: usize,
    ) -> WirelayResult<Self> {
        if !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
            return Err(WirelayError::Config(format!(
                "Invalid block size {} (must be {}..={})",
                block_size, MIN_BLOCK_SIZE, MAX_BLOCK_SIZE
            )));
        }
        if mac_size > mac.output_size() {
            return Err(WirelayError::Config(format!(
                "MAC size {} exceeds engine output {}",
                mac_size,
                mac.output_size()
            )));
        }
        Ok(Self {
            cipher,
            block_size,
            mac,
            mac_size,
        })
    }

    /// Builds a slot from negotiated algorithms and derived key material.
    ///
    /// `direction` selects encryptor (outbound) or decryptor (inbound).
    pub fn from_algorithms(
        cipher: CipherAlgorithm,
        direction: Direction,
        key: &[u8],
        iv: &[u8],
        mac: MacAlgorithm,
        mac_key: &[u8],
    ) -> WirelayResult<Self> {
        let engine = match direction {
            Direction::Outbound => cipher.encryptor(key, iv)?,
            Direction::Inbound => cipher.decryptor(key, iv)?,
        };
        let mac_engine = MacKey::new(mac, mac_key)?;
        Self::new(engine, cipher.block_size(), Box::new(mac_engine), mac.mac_size())
    }

    /// Block size used for framing in this direction.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of MAC bytes carried after each packet.
    pub fn mac_size(&self) -> usize {
        self.mac_size
    }

    pub(crate) fn apply(&mut self, data: &mut [u8]) -> WirelayResult<()> {
        self.cipher.apply(data)
    }

    pub(crate) fn sign(&mut self, sequence: u32, packet: &[u8]) -> WirelayResult<Vec<u8>> {
        let mut tag = self.mac.compute(sequence, packet)?;
        if tag.len() < self.mac_size {
            return Err(WirelayError::Crypto(format!(
                "MAC engine returned {} bytes, expected {}",
                tag.len(),
                self.mac_size
            )));
        }
        tag.truncate(self.mac_size);
        Ok(tag)
    }
}

/// Block cipher algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherAlgorithm {
    /// AES-128 in counter mode
    Aes128Ctr,
    /// AES-192 in counter mode
    Aes192Ctr,
    /// AES-256 in counter mode
    Aes256Ctr,
    /// AES-128 in CBC mode
    Aes128Cbc,
    /// AES-256 in CBC mode
    Aes256Cbc,
}

impl CipherAlgorithm {
    /// Returns the algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            CipherAlgorithm::Aes128Ctr => "aes128-ctr",
            CipherAlgorithm::Aes192Ctr => "aes192-ctr",
            CipherAlgorithm::Aes256Ctr => "aes256-ctr",
            CipherAlgorithm::Aes128Cbc => "aes128-cbc",
            CipherAlgorithm::Aes256Cbc => "aes256-cbc",
        }
    }

    /// Returns the key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            CipherAlgorithm::Aes128Ctr | CipherAlgorithm::Aes128Cbc => 16,
            CipherAlgorithm::Aes192Ctr => 24,
            CipherAlgorithm::Aes256Ctr | CipherAlgorithm::Aes256Cbc => 32,
        }
    }

    /// Returns the IV size in bytes.
    pub fn iv_size(&self) -> usize {
        16
    }

    /// Returns the cipher block size in bytes.
    pub fn block_size(&self) -> usize {
        16
    }

    /// Parses cipher algorithm from name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aes128-ctr" => Some(CipherAlgorithm::Aes128Ctr),
            "aes192-ctr" => Some(CipherAlgorithm::Aes192Ctr),
            "aes256-ctr" => Some(CipherAlgorithm::Aes256Ctr),
            "aes128-cbc" => Some(CipherAlgorithm::Aes128Cbc),
            "aes256-cbc" => Some(CipherAlgorithm::Aes256Cbc),
            _ => None,
        }
    }

    /// Creates the outbound (encrypting) engine.
    pub fn encryptor(&self, key: &[u8], iv: &[u8]) -> WirelayResult<Box<dyn BlockCipher>> {
        let (key, iv) = self.check_material(key, iv)?;
        let engine: Box<dyn BlockCipher> = match self {
            CipherAlgorithm::Aes128Ctr => Box::new(Ctr(ctr::Ctr128BE::<Aes128>::new_from_slices(
                key, iv,
            )
            .map_err(init_error)?)),
            CipherAlgorithm::Aes192Ctr => Box::new(Ctr(ctr::Ctr128BE::<Aes192>::new_from_slices(
                key, iv,
            )
            .map_err(init_error)?)),
            CipherAlgorithm::Aes256Ctr => Box::new(Ctr(ctr::Ctr128BE::<Aes256>::new_from_slices(
                key, iv,
            )
            .map_err(init_error)?)),
            CipherAlgorithm::Aes128Cbc => Box::new(CbcEncrypt(
                Encryptor::<Aes128>::new_from_slices(key, iv).map_err(init_error)?,
            )),
            CipherAlgorithm::Aes256Cbc => Box::new(CbcEncrypt(
                Encryptor::<Aes256>::new_from_slices(key, iv).map_err(init_error)?,
            )),
        };
        Ok(engine)
    }

    /// Creates the inbound (decrypting) engine.
    pub fn decryptor(&self, key: &[u8], iv: &[u8]) -> WirelayResult<Box<dyn BlockCipher>> {
        let (key, iv) = self.check_material(key, iv)?;
        let engine: Box<dyn BlockCipher> = match self {
            // CTR is symmetric
            CipherAlgorithm::Aes128Ctr
            | CipherAlgorithm::Aes192Ctr
            | CipherAlgorithm::Aes256Ctr => return self.encryptor(key, iv),
            CipherAlgorithm::Aes128Cbc => Box::new(CbcDecrypt(
                Decryptor::<Aes128>::new_from_slices(key, iv).map_err(init_error)?,
            )),
            CipherAlgorithm::Aes256Cbc => Box::new(CbcDecrypt(
                Decryptor::<Aes256>::new_from_slices(key, iv).map_err(init_error)?,
            )),
        };
        Ok(engine)
    }

    fn check_material<'a>(
        &self,
        key: &'a [u8],
        iv: &'a [u8],
    ) -> WirelayResult<(&'a [u8], &'a [u8])> {
        if key.len() < self.key_size() {
            return Err(WirelayError::Crypto(format!(
                "Insufficient key material for {}: expected {}, got {}",
                self.name(),
                self.key_size(),
                key.len()
            )));
        }
        if iv.len() < self.iv_size() {
            return Err(WirelayError::Crypto(format!(
                "Insufficient IV material for {}: expected {}, got {}",
                self.name(),
                self.iv_size(),
                iv.len()
            )));
        }
        Ok((&key[..self.key_size()], &iv[..self.iv_size()]))
    }
}

fn init_error(_: cipher::InvalidLength) -> WirelayError {
    WirelayError::Crypto("Failed to initialize cipher".to_string())
}

struct Ctr<C>(C);

impl<C: StreamCipher + Send> BlockCipher for Ctr<C> {
    fn apply(&mut self, data: &mut [u8]) -> WirelayResult<()> {
        self.0
            .try_apply_keystream(data)
            .map_err(|_| WirelayError::Crypto("CTR keystream exhausted".to_string()))
    }
}

struct CbcEncrypt<C>(C);

impl<C: BlockEncryptMut + Send> BlockCipher for CbcEncrypt<C> {
    fn apply(&mut self, data: &mut [u8]) -> WirelayResult<()> {
        let block = C::block_size();
        if data.len() % block != 0 {
            return Err(WirelayError::Crypto(format!(
                "encipher error: short buffer ({} bytes, block {})",
                data.len(),
                block
            )));
        }
        for chunk in data.chunks_exact_mut(block) {
            self.0.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        Ok(())
    }
}

struct CbcDecrypt<C>(C);

impl<C: BlockDecryptMut + Send> BlockCipher for CbcDecrypt<C> {
    fn apply(&mut self, data: &mut [u8]) -> WirelayResult<()> {
        let block = C::block_size();
        if data.len() % block != 0 {
            return Err(WirelayError::Crypto(format!(
                "decode error: short buffer ({} bytes, block {})",
                data.len(),
                block
            )));
        }
        for chunk in data.chunks_exact_mut(block) {
            self.0.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
        Ok(())
    }
}

/// MAC algorithm for SSH.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacAlgorithm {
    /// HMAC-SHA1
    HmacSha1,
    /// HMAC-SHA1 truncated to 96 bits
    HmacSha1_96,
    /// HMAC-SHA256
    HmacSha256,
    /// HMAC-SHA512
    HmacSha512,
}

impl MacAlgorithm {
    /// Returns the algorithm name.
    pub fn name(&self) -> &'static str {
        match self {
            MacAlgorithm::HmacSha1 => "hmac-sha1",
            MacAlgorithm::HmacSha1_96 => "hmac-sha1-96",
            MacAlgorithm::HmacSha256 => "hmac-sha2-256",
            MacAlgorithm::HmacSha512 => "hmac-sha2-512",
        }
    }

    /// Returns the key size in bytes.
    pub fn key_size(&self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 | MacAlgorithm::HmacSha1_96 => 20,
            MacAlgorithm::HmacSha256 => 32,
            MacAlgorithm::HmacSha512 => 64,
        }
    }

    /// Returns the number of MAC bytes sent on the wire.
    pub fn mac_size(&self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacSha1_96 => 12,
            MacAlgorithm::HmacSha256 => 32,
            MacAlgorithm::HmacSha512 => 64,
        }
    }

    /// Parses MAC algorithm from name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "hmac-sha1" => Some(MacAlgorithm::HmacSha1),
            "hmac-sha1-96" => Some(MacAlgorithm::HmacSha1_96),
            "hmac-sha2-256" => Some(MacAlgorithm::HmacSha256),
            "hmac-sha2-512" => Some(MacAlgorithm::HmacSha512),
            _ => None,
        }
    }
}

/// HMAC engine keyed for one direction.
pub struct MacKey {
    algorithm: MacAlgorithm,
    key: Vec<u8>,
}

impl std::fmt::Debug for MacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MacKey")
            .field("algorithm", &self.algorithm)
            .field("key", &"<redacted>")
            .finish()
    }
}

macro_rules! hmac_tag {
    ($digest:ty, $key:expr, $sequence:expr, $packet:expr) => {{
        let mut mac = Hmac::<$digest>::new_from_slice($key)
            .map_err(|_| WirelayError::Crypto("Invalid HMAC key".to_string()))?;
        mac.update(&$sequence.to_be_bytes());
        mac.update($packet);
        mac.finalize().into_bytes().to_vec()
    }};
}

impl MacKey {
    /// Creates a new MAC key.
    pub fn new(algorithm: MacAlgorithm, key_material: &[u8]) -> WirelayResult<Self> {
        if key_material.len() < algorithm.key_size() {
            return Err(WirelayError::Crypto(format!(
                "Insufficient key material for MAC: expected {}, got {}",
                algorithm.key_size(),
                key_material.len()
            )));
        }

        Ok(Self {
            algorithm,
            key: key_material[..algorithm.key_size()].to_vec(),
        })
    }

    /// Returns the algorithm.
    pub fn algorithm(&self) -> MacAlgorithm {
        self.algorithm
    }
}

impl PacketMac for MacKey {
    fn output_size(&self) -> usize {
        self.algorithm.mac_size()
    }

    fn compute(&mut self, sequence: u32, packet: &[u8]) -> WirelayResult<Vec<u8>> {
        let mut tag = match self.algorithm {
            MacAlgorithm::HmacSha1 | MacAlgorithm::HmacSha1_96 => {
                hmac_tag!(Sha1, &self.key, sequence, packet)
            }
            MacAlgorithm::HmacSha256 => hmac_tag!(Sha256, &self.key, sequence, packet),
            MacAlgorithm::HmacSha512 => hmac_tag!(Sha512, &self.key, sequence, packet),
        };
        tag.truncate(self.algorithm.mac_size());
        Ok(tag)
    }
}

impl Drop for MacKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cipher_algorithm_properties() {
        let ctr = CipherAlgorithm::Aes256Ctr;
        assert_eq!(ctr.name(), "aes256-ctr");
        assert_eq!(ctr.key_size(), 32);
        assert_eq!(ctr.iv_size(), 16);
        assert_eq!(ctr.block_size(), 16);

        assert_eq!(CipherAlgorithm::Aes192Ctr.key_size(), 24);
        assert_eq!(CipherAlgorithm::Aes128Cbc.key_size(), 16);
    }

    #[test]
    fn test_cipher_from_name() {
        assert_eq!(
            CipherAlgorithm::from_name("aes128-ctr"),
            Some(CipherAlgorithm::Aes128Ctr)
        );
        assert_eq!(
            CipherAlgorithm::from_name("aes256-cbc"),
            Some(CipherAlgorithm::Aes256Cbc)
        );
        assert!(CipherAlgorithm::from_name("3des-cbc").is_none());
    }

    #[test]
    fn test_mac_algorithm_properties() {
        assert_eq!(MacAlgorithm::HmacSha1_96.mac_size(), 12);
        assert_eq!(MacAlgorithm::HmacSha1_96.key_size(), 20);
        assert_eq!(MacAlgorithm::HmacSha512.mac_size(), 64);
        assert_eq!(
            MacAlgorithm::from_name("hmac-sha2-256"),
            Some(MacAlgorithm::HmacSha256)
        );
        assert!(MacAlgorithm::from_name("umac-64@openssh.com").is_none());
    }

    #[test]
    fn test_ctr_split_matches_single_pass() {
        let key = [3u8; 16];
        let iv = [5u8; 16];
        let mut whole = vec![0x42u8; 64];
        let mut split = whole.clone();

        let mut a = CipherAlgorithm::Aes128Ctr.encryptor(&key, &iv).unwrap();
        a.apply(&mut whole).unwrap();

        let mut b = CipherAlgorithm::Aes128Ctr.encryptor(&key, &iv).unwrap();
        let (first, rest) = split.split_at_mut(16);
        b.apply(first).unwrap();
        b.apply(rest).unwrap();

        assert_eq!(whole, split);
    }

    #[test]
    fn test_cbc_encrypt_decrypt() {
        let key = [1u8; 32];
        let iv = [2u8; 16];
        let original: Vec<u8> = (0u8..48).collect();
        let mut data = original.clone();

        let mut enc = CipherAlgorithm::Aes256Cbc.encryptor(&key, &iv).unwrap();
        enc.apply(&mut data).unwrap();
        assert_ne!(data, original);

        let mut dec = CipherAlgorithm::Aes256Cbc.decryptor(&key, &iv).unwrap();
        let (first, rest) = data.split_at_mut(16);
        dec.apply(first).unwrap();
        dec.apply(rest).unwrap();
        assert_eq!(data, original);
    }

    #[test]
    fn test_cbc_rejects_partial_block() {
        let mut enc = CipherAlgorithm::Aes128Cbc
            .encryptor(&[0u8; 16], &[0u8; 16])
            .unwrap();
        let mut data = vec![0u8; 20];
        assert!(matches!(enc.apply(&mut data), Err(WirelayError::Crypto(_))));
    }

    #[test]
    fn test_insufficient_key_material() {
        let result = CipherAlgorithm::Aes256Ctr.encryptor(&[0u8; 16], &[0u8; 16]);
        assert!(matches!(result, Err(WirelayError::Crypto(_))));

        let result = MacKey::new(MacAlgorithm::HmacSha256, &[0u8; 8]);
        assert!(matches!(result, Err(WirelayError::Crypto(_))));
    }

    #[test]
    fn test_mac_binds_sequence_number() {
        let mut mac = MacKey::new(MacAlgorithm::HmacSha256, &[0u8; 32]).unwrap();
        let a = mac.compute(0, b"packet").unwrap();
        let b = mac.compute(1, b"packet").unwrap();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
        assert_eq!(a, mac.compute(0, b"packet").unwrap());
    }

    #[test]
    fn test_truncated_mac() {
        let mut full = MacKey::new(MacAlgorithm::HmacSha1, &[9u8; 20]).unwrap();
        let mut short = MacKey::new(MacAlgorithm::HmacSha1_96, &[9u8; 20]).unwrap();
        let full_tag = full.compute(7, b"data").unwrap();
        let short_tag = short.compute(7, b"data").unwrap();
        assert_eq!(short_tag.len(), 12);
        assert_eq!(&full_tag[..12], &short_tag[..]);
    }

    #[test]
    fn test_slot_validation() {
        let cipher = CipherAlgorithm::Aes128Ctr
            .encryptor(&[0u8; 16], &[0u8; 16])
            .unwrap();
        let mac = Box::new(MacKey::new(MacAlgorithm::HmacSha1_96, &[0u8; 20]).unwrap());
        assert!(matches!(
            CipherSlot::new(cipher, 4, mac, 12),
            Err(WirelayError::Config(_))
        ));

        let cipher = CipherAlgorithm::Aes128Ctr
            .encryptor(&[0u8; 16], &[0u8; 16])
            .unwrap();
        let mac = Box::new(MacKey::new(MacAlgorithm::HmacSha1_96, &[0u8; 20]).unwrap());
        assert!(matches!(
            CipherSlot::new(cipher, 16, mac, 20),
            Err(WirelayError::Config(_))
        ));
    }

    #[test]
    fn test_debug_redacts_key() {
        let mac = MacKey::new(MacAlgorithm::HmacSha256, &[0xab; 32]).unwrap();
        let debug = format!("{:?}", mac);
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("171"));
    }
}
