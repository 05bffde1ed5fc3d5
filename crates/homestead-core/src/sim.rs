//! Per-frame results and determinism checks.

use crate::clock::FrameTick;
use crate::command_queue::Command;
use crate::farm::FarmError;
use crate::fixed::Fixed64;

// ---------------------------------------------------------------------------
// Advance report
// ---------------------------------------------------------------------------

/// Result of a [`Farm::advance`](crate::farm::Farm::advance) call.
#[derive(Debug, Default)]
pub struct AdvanceReport {
    /// Frame data, or `None` if the farm is paused.
    pub tick: Option<FrameTick>,
    /// Timers that fired this frame.
    pub timers_fired: usize,
    /// Timers whose handler failed. The pass continued past them.
    pub timers_failed: usize,
    /// Commands applied at the start of the frame.
    pub commands_applied: usize,
    /// Commands that were rejected, with the reason.
    pub command_errors: Vec<(Command, FarmError)>,
}

impl AdvanceReport {
    pub fn was_paused(&self) -> bool {
        self.tick.is_none()
    }
}

// ---------------------------------------------------------------------------
// State hash
// ---------------------------------------------------------------------------

/// A deterministic hash of farm state, for comparing two runs fed identical
/// input.
///
/// Uses FNV-1a (64-bit). Not cryptographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateHash(pub u64);

impl StateHash {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    pub fn new() -> Self {
        Self(Self::FNV_OFFSET)
    }

    pub fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= b as u64;
            self.0 = self.0.wrapping_mul(Self::FNV_PRIME);
        }
    }

    pub fn write_u64(&mut self, v: u64) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.write(&v.to_le_bytes());
    }

    pub fn write_bool(&mut self, v: bool) {
        self.write(&[v as u8]);
    }

    pub fn write_fixed64(&mut self, v: Fixed64) {
        self.write(&v.to_bits().to_le_bytes());
    }

    pub fn finish(self) -> u64 {
        self.0
    }
}

impl Default for StateHash {
    fn default() -> Self {
        Self::new()
    }
}
