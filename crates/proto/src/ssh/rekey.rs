//! Rekey policy for the packet layer (RFC 4253 Section 9).
//!
//! Counts bytes and packets per direction since each direction's cipher was
//! last installed. Crossing either limit in either direction arms the
//! `need_rekey` flag exactly once per epoch. The packet layer only *requests*
//! the rekey; the owning transport renegotiates and installs new cipher slots.
//!
//! # Epochs
//!
//! An epoch closes when both directions have reinstalled a cipher since the
//! flag was raised (a two-bit mask, outbound = bit 0, inbound = bit 1). Until
//! then the flag stays armed, so a half-completed rekey is never reported as
//! done.
//!
//! # Grace window
//!
//! While armed, the peer may send at most `grace_packets - 1` further
//! packets; the packet that reaches `grace_packets` fails with
//! [`WirelayError::RekeyIgnored`]. No such cap applies to our own writes.

use wirelay_platform::{WirelayError, WirelayResult};

/// Default byte limit per direction (1 GiB).
pub const REKEY_BYTES: u64 = 0x4000_0000;

/// Default packet limit per direction.
pub const REKEY_PACKETS: u64 = 0x4000_0000;

/// Packets the peer may send after a rekey request before we give up.
pub const REKEY_GRACE_PACKETS: u32 = 20;

const OUTBOUND_INSTALLED: u8 = 0b01;
const INBOUND_INSTALLED: u8 = 0b10;
const BOTH_INSTALLED: u8 = OUTBOUND_INSTALLED | INBOUND_INSTALLED;

/// Traffic limits that trigger a rekey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RekeyLimits {
    /// Bytes per direction before a rekey is requested.
    pub bytes: u64,
    /// Packets per direction before a rekey is requested.
    pub packets: u64,
    /// Inbound packets tolerated after the request.
    pub grace_packets: u32,
}

impl Default for RekeyLimits {
    fn default() -> Self {
        Self {
            bytes: REKEY_BYTES,
            packets: REKEY_PACKETS,
            grace_packets: REKEY_GRACE_PACKETS,
        }
    }
}

/// Per-connection rekey bookkeeping.
#[derive(Debug, Clone)]
pub struct RekeyPolicy {
    limits: RekeyLimits,
    need_rekey: bool,
    sent_bytes: u64,
    sent_packets: u64,
    received_bytes: u64,
    received_packets: u64,
    received_overflow: u32,
    init_mask: u8,
}

impl RekeyPolicy {
    /// Creates a policy with the given limits.
    pub fn new(limits: RekeyLimits) -> Self {
        Self {
            limits,
            need_rekey: false,
            sent_bytes: 0,
            sent_packets: 0,
            received_bytes: 0,
            received_packets: 0,
            received_overflow: 0,
            init_mask: 0,
        }
    }

    /// Returns the configured limits.
    pub fn limits(&self) -> &RekeyLimits {
        &self.limits
    }

    /// Returns true once a rekey has been requested and not yet completed.
    pub fn need_rekey(&self) -> bool {
        self.need_rekey
    }

    /// `(bytes, packets)` sent since the outbound cipher was installed.
    pub fn sent(&self) -> (u64, u64) {
        (self.sent_bytes, self.sent_packets)
    }

    /// `(bytes, packets)` received since the inbound cipher was installed.
    pub fn received(&self) -> (u64, u64) {
        (self.received_bytes, self.received_packets)
    }

    /// Records one outbound packet.
    ///
    /// Returns true if this packet armed the rekey flag.
    pub fn record_sent(&mut self, bytes: u64) -> bool {
        self.sent_bytes = self.sent_bytes.saturating_add(bytes);
        self.sent_packets = self.sent_packets.saturating_add(1);
        if self.need_rekey {
            return false;
        }
        if self.sent_packets >= self.limits.packets || self.sent_bytes >= self.limits.bytes {
            self.arm();
            return true;
        }
        false
    }

    /// Records one inbound packet.
    ///
    /// Returns `Ok(true)` if this packet armed the rekey flag.
    ///
    /// # Errors
    ///
    /// Returns [`WirelayError::RekeyIgnored`] once the peer has sent
    /// `grace_packets` packets while a rekey was pending.
    pub fn record_received(&mut self, bytes: u64) -> WirelayResult<bool> {
        self.received_bytes = self.received_bytes.saturating_add(bytes);
        self.received_packets = self.received_packets.saturating_add(1);
        if self.need_rekey {
            self.received_overflow += 1;
            if self.received_overflow >= self.limits.grace_packets {
                return Err(WirelayError::RekeyIgnored {
                    packets: self.received_overflow,
                });
            }
            return Ok(false);
        }
        if self.received_packets >= self.limits.packets
            || self.received_bytes >= self.limits.bytes
        {
            self.arm();
            return Ok(true);
        }
        Ok(false)
    }

    /// Resets outbound counters after a new outbound cipher is installed.
    pub fn outbound_installed(&mut self) {
        self.sent_bytes = 0;
        self.sent_packets = 0;
        self.mark_installed(OUTBOUND_INSTALLED);
    }

    /// Resets inbound counters after a new inbound cipher is installed.
    pub fn inbound_installed(&mut self) {
        self.received_bytes = 0;
        self.received_packets = 0;
        self.received_overflow = 0;
        self.mark_installed(INBOUND_INSTALLED);
    }

    fn mark_installed(&mut self, bit: u8) {
        self.init_mask |= bit;
        if self.init_mask == BOTH_INSTALLED {
            self.init_mask = 0;
            self.need_rekey = false;
        }
    }

    fn arm(&mut self) {
        self.received_overflow = 0;
        self.need_rekey = true;
    }
}

impl Default for RekeyPolicy {
    fn default() -> Self {
        Self::new(RekeyLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(bytes: u64, packets: u64) -> RekeyPolicy {
        RekeyPolicy::new(RekeyLimits {
            bytes,
            packets,
            grace_packets: REKEY_GRACE_PACKETS,
        })
    }

    #[test]
    fn test_default_limits() {
        let policy = RekeyPolicy::default();
        assert_eq!(policy.limits().bytes, 1 << 30);
        assert_eq!(policy.limits().packets, 1 << 30);
        assert_eq!(policy.limits().grace_packets, 20);
        assert!(!policy.need_rekey());
    }

    #[test]
    fn test_sent_bytes_threshold() {
        let mut policy = RekeyPolicy::default();
        assert!(!policy.record_sent(REKEY_BYTES - 1));
        assert!(!policy.need_rekey());
        assert!(policy.record_sent(1));
        assert!(policy.need_rekey());
    }

    #[test]
    fn test_large_simulated_transfer() {
        let mut policy = small(2_000_000_000, REKEY_PACKETS);
        for _ in 0..1999 {
            assert!(!policy.record_sent(1_000_000));
        }
        assert!(!policy.need_rekey());
        assert!(policy.record_sent(1_000_000));
        assert!(policy.need_rekey());
    }

    #[test]
    fn test_packet_threshold_and_idempotence() {
        let mut policy = small(u64::MAX, 3);
        assert!(!policy.record_sent(10));
        assert!(!policy.record_sent(10));
        assert!(policy.record_sent(10));
        // armed once only
        assert!(!policy.record_sent(10));
        assert!(!policy.record_received(10).unwrap());
        assert!(policy.need_rekey());
    }

    #[test]
    fn test_received_threshold() {
        let mut policy = small(100, u64::MAX);
        assert!(!policy.record_received(99).unwrap());
        assert!(policy.record_received(1).unwrap());
        assert!(policy.need_rekey());
    }

    #[test]
    fn test_grace_window() {
        let mut policy = small(u64::MAX, 1);
        assert!(policy.record_sent(1));

        for _ in 0..19 {
            assert!(policy.record_received(64).is_ok());
        }
        match policy.record_received(64) {
            Err(WirelayError::RekeyIgnored { packets }) => assert_eq!(packets, 20),
            other => panic!("Expected RekeyIgnored, got {:?}", other),
        }
    }

    #[test]
    fn test_flag_clears_only_after_both_directions() {
        let mut policy = small(u64::MAX, 1);
        policy.record_sent(1);
        assert!(policy.need_rekey());

        policy.outbound_installed();
        assert!(policy.need_rekey());
        assert_eq!(policy.sent(), (0, 0));

        policy.inbound_installed();
        assert!(!policy.need_rekey());
        assert_eq!(policy.received(), (0, 0));
    }

    #[test]
    fn test_repeated_install_same_direction_does_not_clear() {
        let mut policy = small(u64::MAX, 1);
        policy.record_sent(1);
        policy.outbound_installed();
        policy.outbound_installed();
        assert!(policy.need_rekey());
        policy.inbound_installed();
        assert!(!policy.need_rekey());
    }

    #[test]
    fn test_inbound_install_resets_grace_window() {
        let mut policy = small(u64::MAX, 1);
        policy.record_sent(1);
        for _ in 0..19 {
            policy.record_received(1).unwrap();
        }
        policy.inbound_installed();
        // still armed (outbound not reinstalled), but the window restarts
        assert!(policy.need_rekey());
        for _ in 0..19 {
            policy.record_received(1).unwrap();
        }
        assert!(policy.record_received(1).is_err());
    }
}
