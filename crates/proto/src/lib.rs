//! SSH2 binary packet layer for the Wirelay transport stack.
//!
//! This crate turns a raw byte stream into authenticated, encrypted SSH
//! messages:
//!
//! - **Framing** - length, padding and block alignment (RFC 4253 Section 6)
//! - **Integrity** - per-packet MAC keyed on a 32-bit sequence number
//! - **Confidentiality** - pluggable block ciphers (AES-CTR, AES-CBC)
//! - **Rekey accounting** - byte/packet limits with a grace window
//! - **Keep-alive** - idle detection without a timer task
//! - **Banner exchange** - line reads before the first packet
//!
//! # Features
//!
//! - `ssh` (default) - SSH packet layer
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
//! client.write(b"\x00hello").await?;
//! let packet = server.read().await?.expect("packet");
//! assert_eq!(packet.payload(), b"\x00hello");
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! - All cryptographic primitives come from RustCrypto crates
//! - MAC verification is constant-time
//! - MAC keys are wiped with `zeroize`
//!
//! # References
//!
//! - [RFC 4253](https://datatracker.ietf.org/doc/html/rfc4253) - SSH Transport Layer Protocol

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

#[cfg(feature = "ssh")]
pub mod ssh;
