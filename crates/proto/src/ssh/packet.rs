//! SSH binary packet framing (RFC 4253 Section 6).
//!
//! # Packet Format
//!
//! ```text
//! uint32    packet_length
//! byte      padding_length
//! byte[n1]  payload (n1 = packet_length - padding_length - 1)
//! byte[n2]  random padding (n2 = padding_length)
//! byte[m]   mac (m = MAC size of the installed cipher slot, 0 in plaintext mode)
//! ```
//!
//! # Constraints
//!
//! - `packet_length` does NOT include `mac` or the `packet_length` field itself
//! - `4 + packet_length` MUST be a multiple of the block size (8 in plaintext mode)
//! - Outbound padding is at least 4 bytes and filled from the injected RNG
//! - Inbound padding above 32 bytes is rejected, tighter than the RFC's 255
//! - `packet_length` above 35000 is rejected before any allocation
//!
//! These helpers are pure: they never touch a stream, a cipher or a counter.
//! [`Packetizer`](crate::ssh::packetizer::Packetizer) composes them.
//!
//! # Example
//!
//! ```rust
//! use rand::{rngs::StdRng, SeedableRng};
//! use wirelay_proto::ssh::packet::{frame, parse_header, PLAINTEXT_BLOCK_SIZE};
//!
//! let mut rng = StdRng::seed_from_u64(1);
//! let bytes = frame(b"\x05hello", PLAINTEXT_BLOCK_SIZE, &mut rng).unwrap();
//! assert_eq!(bytes.len() % 8, 0);
//!
//! let header = parse_header(&bytes[..8], PLAINTEXT_BLOCK_SIZE).unwrap();
//! assert_eq!(header.payload_length(), 6);
//! ```

use crate::ssh::message::{describe_payload, MessageType};
use bytes::{BufMut, BytesMut};
use rand::RngCore;
use wirelay_platform::{WirelayError, WirelayResult};

/// Maximum accepted `packet_length` field value.
pub const MAX_PACKET_LENGTH: usize = 35000;

/// Minimum padding written on outbound packets.
pub const MIN_PADDING_LEN: usize = 4;

/// Largest padding accepted on inbound packets.
pub const MAX_INBOUND_PADDING_LEN: usize = 32;

/// Block size used before any cipher is installed.
pub const PLAINTEXT_BLOCK_SIZE: usize = 8;

/// `uint32 packet_length || byte padding_length`
pub const HEADER_LEN: usize = 5;

/// Traffic direction of a packet or cipher slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Peer to us.
    Inbound,
    /// Us to peer.
    Outbound,
}

impl Direction {
    /// Short label used in packet logs.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Inbound => "IN",
            Direction::Outbound => "OUT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Returns the padding needed to frame `payload_len` bytes at `block_size`.
///
/// The result is the smallest value `>= 4` that makes
/// `5 + payload_len + padding` a multiple of `block_size`, so it always lies
/// in `4..block_size + 4`.
pub fn padding_len(payload_len: usize, block_size: usize) -> usize {
    let mut padding = block_size - (HEADER_LEN + payload_len) % block_size;
    if padding < MIN_PADDING_LEN {
        padding += block_size;
    }
    padding
}

/// Lays out `length || padding_len || payload || padding` for one packet.
///
/// The MAC is not appended; the caller computes it over the returned bytes.
///
/// # Errors
///
/// Returns [`WirelayError::Protocol`] if the framed packet would exceed
/// [`MAX_PACKET_LENGTH`].
pub fn frame(payload: &[u8], block_size: usize, rng: &mut dyn RngCore) -> WirelayResult<Vec<u8>> {
    let padding = padding_len(payload.len(), block_size);
    let packet_length = 1 + payload.len() + padding;
    if packet_length > MAX_PACKET_LENGTH {
        return Err(WirelayError::Protocol(format!(
            "Packet too large: {} bytes (maximum {})",
            packet_length, MAX_PACKET_LENGTH
        )));
    }

    let mut buf = BytesMut::with_capacity(4 + packet_length);
    buf.put_u32(packet_length as u32);
    buf.put_u8(padding as u8);
    buf.put_slice(payload);

    let mut pad = [0u8; 255];
    rng.fill_bytes(&mut pad[..padding]);
    buf.put_slice(&pad[..padding]);

    Ok(buf.to_vec())
}

/// Validated header of an inbound packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    packet_length: usize,
    padding_length: usize,
}

impl PacketHeader {
    /// Value of the `packet_length` field.
    pub fn packet_length(&self) -> usize {
        self.packet_length
    }

    /// Value of the `padding_length` field.
    pub fn padding_length(&self) -> usize {
        self.padding_length
    }

    /// Number of payload bytes carried by the packet.
    pub fn payload_length(&self) -> usize {
        self.packet_length - self.padding_length - 1
    }

    /// Total framed size, `4 + packet_length`, excluding the MAC.
    pub fn frame_length(&self) -> usize {
        4 + self.packet_length
    }
}

/// Validates the (already deciphered) first block of an inbound packet.
///
/// # Errors
///
/// Returns [`WirelayError::Framing`] if:
/// - `first_block` is shorter than `block_size` or `block_size < 8`
/// - `packet_length + 4` is not a multiple of `block_size`
/// - `packet_length` exceeds [`MAX_PACKET_LENGTH`]
/// - `padding_length` exceeds [`MAX_INBOUND_PADDING_LEN`] or `packet_length - 1`
pub fn parse_header(first_block: &[u8], block_size: usize) -> WirelayResult<PacketHeader> {
    if block_size < PLAINTEXT_BLOCK_SIZE || first_block.len() < block_size {
        return Err(WirelayError::Framing(format!(
            "Short first block: {} bytes (block size {})",
            first_block.len(),
            block_size
        )));
    }

    let packet_length = u32::from_be_bytes([
        first_block[0],
        first_block[1],
        first_block[2],
        first_block[3],
    ]) as usize;

    if packet_length > MAX_PACKET_LENGTH {
        return Err(WirelayError::Framing(format!(
            "Packet too large: {} bytes (maximum {})",
            packet_length, MAX_PACKET_LENGTH
        )));
    }

    if (packet_length + 4) % block_size != 0 {
        return Err(WirelayError::Framing(format!(
            "Invalid packet blocking: length {} not aligned to block size {}",
            packet_length, block_size
        )));
    }

    let padding_length = first_block[4] as usize;
    if padding_length > MAX_INBOUND_PADDING_LEN {
        return Err(WirelayError::Framing(format!(
            "Invalid padding: {} bytes (maximum {})",
            padding_length, MAX_INBOUND_PADDING_LEN
        )));
    }

    if padding_length + 1 > packet_length {
        return Err(WirelayError::Framing(format!(
            "Invalid padding: {} bytes in a {}-byte packet",
            padding_length, packet_length
        )));
    }

    Ok(PacketHeader {
        packet_length,
        padding_length,
    })
}

/// A verified, deciphered inbound message.
///
/// Holds the payload only: the length/padding header and the padding itself
/// are stripped. The first payload byte is the message type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    payload: Vec<u8>,
    sequence: u32,
}

impl Packet {
    /// Creates a packet view over a payload received with `sequence`.
    pub fn new(payload: Vec<u8>, sequence: u32) -> Self {
        Self { payload, sequence }
    }

    /// Returns the payload, starting with the message-type byte.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consumes the packet and returns its payload.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Inbound sequence number this packet was authenticated with.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Raw message-type byte, if the payload is non-empty.
    pub fn type_byte(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// Known message type, if any.
    pub fn message_type(&self) -> Option<MessageType> {
        self.type_byte().and_then(MessageType::from_u8)
    }

    /// Human-readable message type for logs.
    pub fn describe(&self) -> String {
        describe_payload(&self.payload)
    }
}
