//! # Packet Counters
//!
//! Per-direction sequence numbers folded into every frame MAC. The counter
//! is never transmitted: both ends advance in lock-step, so a replayed,
//! dropped or reordered frame is authenticated against the wrong value and
//! fails its MAC check.
//!
//! Counters start at [`COUNTER_START`] after each handshake and never wrap.
//! Once a direction has carried its frame budget, the next use reports
//! [`DacError::RekeyRequired`] and the session must run a fresh handshake.

use crate::constants::{COUNTER_START, DEFAULT_MAX_FRAMES_PER_KEY};
use crate::error::{DacError, Result};

/// Monotonic per-direction frame counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketCounter {
    next: u32,
    used: u64,
    limit: u64,
}

impl PacketCounter {
    /// Create a counter allowing `limit` frames (clamped to the 32-bit range)
    pub fn new(limit: u64) -> Self {
        PacketCounter {
            next: COUNTER_START,
            used: 0,
            limit: limit.clamp(1, u32::MAX as u64),
        }
    }

    /// Value to bind into the next frame
    ///
    /// Does not advance; call [`PacketCounter::advance`] once the frame has
    /// been sent or accepted.
    #[inline]
    pub fn current(&self) -> Result<u32> {
        if self.used >= self.limit {
            return Err(DacError::RekeyRequired);
        }
        Ok(self.next)
    }

    /// Consume the current value
    #[inline]
    pub fn advance(&mut self) -> Result<()> {
        self.current()?;
        self.used += 1;
        // Saturates only when the budget is used up, and current() refuses then.
        self.next = self.next.saturating_add(1);
        Ok(())
    }

    /// Frames carried so far
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Frames left before a new handshake is required
    pub fn remaining(&self) -> u64 {
        self.limit - self.used
    }
}

impl Default for PacketCounter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAMES_PER_KEY)
    }
}
