//! Per-direction packet sequence numbers (RFC 4253 Section 6.4).
//!
//! Each direction keeps an unsigned 32-bit counter that starts at zero,
//! increments once per packet (including packets sent before any cipher is
//! installed), and wraps silently after `2^32 - 1`. The counter is never
//! reset by rekeying and is never sent on the wire; it only feeds the MAC.

/// Monotonic, wrapping packet counter for one direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceCounter {
    value: u32,
}

impl SequenceCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter at an arbitrary position.
    pub fn starting_at(value: u32) -> Self {
        Self { value }
    }

    /// Returns the sequence number of the next packet.
    pub fn current(&self) -> u32 {
        self.value
    }

    /// Consumes the current number and moves to the next one.
    ///
    /// Returns the number that was current before the call.
    pub fn advance(&mut self) -> u32 {
        let used = self.value;
        self.value = self.value.wrapping_add(1);
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_at_zero() {
        assert_eq!(SequenceCounter::new().current(), 0);
    }

    #[test]
    fn test_advance_increments_by_one() {
        let mut seq = SequenceCounter::new();
        assert_eq!(seq.advance(), 0);
        assert_eq!(seq.advance(), 1);
        assert_eq!(seq.current(), 2);
    }

    #[test]
    fn test_wraps_without_error() {
        let mut seq = SequenceCounter::starting_at(u32::MAX);
        assert_eq!(seq.advance(), u32::MAX);
        assert_eq!(seq.current(), 0);
        assert_eq!(seq.advance(), 0);
    }
}
