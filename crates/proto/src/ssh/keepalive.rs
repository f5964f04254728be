//! Idle-connection keep-alive.
//!
//! There is no timer task. The scheduler is polled from the blocking
//! full-read loop each time a read attempt times out without data; if the
//! interval has elapsed since the last keep-alive, the handler runs. The
//! handler is expected to push an SSH_MSG_IGNORE through the normal write
//! path (see [`create_keepalive_message`]).
//!
//! Keep-alives are suppressed while no outbound cipher is installed and
//! while a rekey is pending.

use crate::ssh::message::MessageType;
use rand::RngCore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Callback fired when the connection has been idle for the interval.
pub type KeepAliveHandler = Arc<dyn Fn() + Send + Sync>;

/// Interval bookkeeping for keep-alives.
pub struct KeepAliveScheduler {
    interval: Duration,
    last_fired: Instant,
    handler: Option<KeepAliveHandler>,
}

impl std::fmt::Debug for KeepAliveScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeepAliveScheduler")
            .field("interval", &self.interval)
            .field("last_fired", &self.last_fired)
            .field("handler", &self.handler.as_ref().map(|_| "<callback>"))
            .finish()
    }
}

impl Default for KeepAliveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl KeepAliveScheduler {
    /// Creates a disabled scheduler.
    pub fn new() -> Self {
        Self {
            interval: Duration::ZERO,
            last_fired: Instant::now(),
            handler: None,
        }
    }

    /// Sets the interval and handler. A zero interval disables keep-alives.
    pub fn configure(&mut self, interval: Duration, handler: KeepAliveHandler) {
        self.interval = interval;
        self.handler = Some(handler);
        self.last_fired = Instant::now();
    }

    /// Returns the configured interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns true if an interval and handler are set.
    pub fn is_enabled(&self) -> bool {
        !self.interval.is_zero() && self.handler.is_some()
    }

    /// Checks whether a keep-alive is due at `now`.
    ///
    /// Returns the handler to invoke (outside any lock) and records `now` as
    /// the last firing time.
    pub fn poll(
        &mut self,
        now: Instant,
        cipher_active: bool,
        rekey_pending: bool,
    ) -> Option<KeepAliveHandler> {
        if !self.is_enabled() || !cipher_active || rekey_pending {
            return None;
        }
        if now > self.last_fired + self.interval {
            self.last_fired = now;
            return self.handler.clone();
        }
        None
    }
}

/// Creates an SSH_MSG_IGNORE payload for keep-alive.
///
/// # Format
///
/// ```text
/// byte    SSH_MSG_IGNORE (2)
/// string  data
/// ```
///
/// The data is random so keep-alives are indistinguishable from each other.
///
/// # Example
///
/// ```rust
/// use wirelay_proto::ssh::keepalive::create_keepalive_message;
///
/// let msg = create_keepalive_message(16);
/// assert_eq!(msg[0], 2);
/// assert_eq!(msg.len(), 1 + 4 + 16);
/// ```
pub fn create_keepalive_message(data_len: usize) -> Vec<u8> {
    let mut msg = vec![0u8; 1 + 4 + data_len];
    msg[0] = MessageType::Ignore as u8;
    msg[1..5].copy_from_slice(&(data_len as u32).to_be_bytes());
    rand::thread_rng().fill_bytes(&mut msg[5..]);
    msg
}
