//! Packet layer configuration.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use wirelay_proto::ssh::config::PacketizerConfig;
//!
//! let mut config = PacketizerConfig::default();
//! config.poll_interval = Duration::from_millis(250);
//! config.dump_packets = true;
//! assert!(config.validate().is_ok());
//! ```

use crate::ssh::rekey::RekeyLimits;
use std::time::Duration;
use wirelay_platform::{WirelayError, WirelayResult};

/// Default timeout for a single read or write attempt.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Default cap on a banner line, terminator excluded.
pub const DEFAULT_MAX_BANNER_LINE: usize = 8192;

/// Configuration for a [`Packetizer`](crate::ssh::packetizer::Packetizer).
#[derive(Debug, Clone)]
pub struct PacketizerConfig {
    /// Traffic limits that trigger a rekey request.
    pub rekey: RekeyLimits,

    /// Timeout applied to each underlying read/write attempt.
    ///
    /// When it expires the full-read and full-write loops re-check the
    /// closed flag, and the read loop polls the keep-alive scheduler.
    pub poll_interval: Duration,

    /// Emit hex dumps of every packet at TRACE level.
    pub dump_packets: bool,

    /// Longest banner line accepted before any cipher is installed.
    pub max_banner_line: usize,
}

impl Default for PacketizerConfig {
    fn default() -> Self {
        Self {
            rekey: RekeyLimits::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            dump_packets: false,
            max_banner_line: DEFAULT_MAX_BANNER_LINE,
        }
    }
}

impl PacketizerConfig {
    /// Checks the configuration for values the packet layer cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`WirelayError::Config`] for a zero poll interval, zero rekey
    /// limits, or a zero banner line cap.
    pub fn validate(&self) -> WirelayResult<()> {
        if self.poll_interval.is_zero() {
            return Err(WirelayError::Config(
                "poll_interval must be non-zero".to_string(),
            ));
        }
        if self.rekey.bytes == 0 || self.rekey.packets == 0 {
            return Err(WirelayError::Config(
                "rekey limits must be non-zero".to_string(),
            ));
        }
        if self.rekey.grace_packets == 0 {
            return Err(WirelayError::Config(
                "rekey grace window must be non-zero".to_string(),
            ));
        }
        if self.max_banner_line == 0 {
            return Err(WirelayError::Config(
                "max_banner_line must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
