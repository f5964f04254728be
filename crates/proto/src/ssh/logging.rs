//! Structured logging for the packet layer.
//!
//! Every event goes through `tracing`; the process-wide subscriber is the
//! log sink.
//!
//! # Log Levels
//!
//! - **TRACE**: hex dumps of packet bytes (only with `dump_packets`)
//! - **DEBUG**: per-packet direction/type/length, rekey requests, cipher installs, keep-alives
//! - **WARN**: fatal read/write failures surfaced to the transport
//!
//! # Example
//!
//! ```no_run
//! use wirelay_proto::ssh::logging;
//! use wirelay_proto::ssh::packet::Direction;
//!
//! tracing_subscriber::fmt()
//!     .with_env_filter("wirelay_proto=trace")
//!     .init();
//!
//! logging::log_packet(Direction::Outbound, "SSH_MSG_KEXINIT", 152);
//! ```

use crate::ssh::packet::Direction;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Log one packet read or written.
///
/// # Arguments
///
/// * `direction` - Inbound or outbound
/// * `message_type` - Description of the first payload byte
/// * `length` - Payload length for reads, framed length for writes
pub fn log_packet(direction: Direction, message_type: &str, length: usize) {
    debug!(
        direction = direction.label(),
        message_type = message_type,
        length = length,
        "{} packet <{}>, length {}",
        match direction {
            Direction::Inbound => "Read",
            Direction::Outbound => "Write",
        },
        message_type,
        length
    );
}

/// Hex dump of raw packet bytes.
pub fn log_dump(direction: Direction, bytes: &[u8]) {
    trace!(
        direction = direction.label(),
        len = bytes.len(),
        bytes = %hex::encode(bytes),
        "packet dump"
    );
}

/// Log a rekey request raised by traffic volume.
pub fn log_rekey_triggered(direction: Direction, packets: u64, bytes: u64) {
    debug!(
        direction = direction.label(),
        packets = packets,
        bytes = bytes,
        "Rekeying (hit {} packets, {} bytes {})",
        packets,
        bytes,
        match direction {
            Direction::Inbound => "received",
            Direction::Outbound => "sent",
        }
    );
}

/// Log activation of a new cipher slot.
pub fn log_cipher_installed(direction: Direction, block_size: usize, mac_size: usize) {
    debug!(
        direction = direction.label(),
        block_size = block_size,
        mac_size = mac_size,
        "Cipher installed"
    );
}

/// Log a deferred inbound cipher install.
pub fn log_cipher_deferred() {
    debug!(
        direction = Direction::Inbound.label(),
        "Reader busy; inbound cipher will be installed at the next packet boundary"
    );
}

/// Log a keep-alive firing.
pub fn log_keepalive_fired(interval: Duration) {
    debug!(interval_ms = interval.as_millis() as u64, "Keep-alive fired");
}

/// Log a fatal packet-layer failure.
pub fn log_failure(direction: Direction, error: &dyn std::fmt::Display) {
    warn!(direction = direction.label(), error = %error, "Packet layer failure");
}
