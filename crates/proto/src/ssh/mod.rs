//! SSH2 binary packet layer.
//!
//! This module implements the packet protocol of RFC 4253 Section 6: framing,
//! padding, MAC, encryption, sequence numbers and rekey accounting. Key
//! exchange, authentication and channels sit above it and are not part of
//! this crate.
//!
//! # Architecture
//!
//! 1. **Framing** ([`packet`]) - Length/padding layout and header validation
//! 2. **Crypto** ([`crypto`]) - Cipher/MAC slots installed after key exchange
//! 3. **Accounting** ([`sequence`], [`rekey`]) - Sequence numbers and rekey limits
//! 4. **Liveness** ([`keepalive`]) - Idle keep-alive scheduling
//! 5. **Driver** ([`packetizer`]) - Reads and writes packets over a byte stream
//!
//! # Security Considerations
//!
//! - **Input Validation**: Inbound lengths are checked against 35000 bytes and
//!   the block size before any allocation
//! - **Constant-Time Operations**: MAC tags are compared with [`subtle`]
//! - **Memory Safety**: MAC keys are zeroized on drop using [`zeroize`]
//! - **No Unsafe Code**: Pure Rust implementation without `unsafe`
//!
//! # Example
//!
//! ```rust
//! use wirelay_proto::ssh::{Packetizer, PacketizerConfig};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (a, b) = tokio::io::duplex(4096);
//! let client = Packetizer::from_stream(a, PacketizerConfig::default())?;
//! let server = Packetizer::from_stream(b, PacketizerConfig::default())?;
//!
//! client.write_banner_line("SSH-2.0-Wirelay_0.1.0\r\n").await?;
//! let banner = server.read_banner_line(std::time::Duration::from_secs(5)).await?;
//! assert_eq!(banner.as_deref(), Some("SSH-2.0-Wirelay_0.1.0"));
//! # Ok(())
//! # }
//! ```
//!
//! # References
//!
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol
//! - [RFC 4344](https://datatracker.ietf.org/doc/html/rfc4344) - SSH Transport Layer Encryption Modes

pub mod config;
pub mod crypto;
pub mod keepalive;
pub mod logging;
pub mod message;
pub mod packet;
pub mod packetizer;
pub mod rekey;
pub mod sequence;

// Re-export main types
pub use config::PacketizerConfig;
pub use crypto::{BlockCipher, CipherAlgorithm, CipherSlot, MacAlgorithm, MacKey, PacketMac};
pub use keepalive::{create_keepalive_message, KeepAliveHandler, KeepAliveScheduler};
pub use message::MessageType;
pub use packet::{Direction, Packet, PacketHeader};
pub use packetizer::Packetizer;
pub use rekey::{RekeyLimits, RekeyPolicy};
pub use sequence::SequenceCounter;
