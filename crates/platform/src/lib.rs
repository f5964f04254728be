//! # Wirelay Platform
//!
//! Core platform types shared by the Wirelay SSH transport crates.
//!
//! This crate provides:
//! - Unified error types (`WirelayError`, `WirelayResult`)
//! - The crate version constant
//!
//! # Examples
//!
//! ```
//! use wirelay_platform::{WirelayError, WirelayResult};
//!
//! fn check_block_size(size: usize) -> WirelayResult<usize> {
//!     if size < 8 {
//!         return Err(WirelayError::Config(format!("block size {} too small", size)));
//!     }
//!     Ok(size)
//! }
//!
//! # fn main() -> WirelayResult<()> {
//! assert_eq!(check_block_size(16)?, 16);
//! assert!(check_block_size(4).is_err());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod error;

pub use error::{WirelayError, WirelayResult};

/// Platform version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
