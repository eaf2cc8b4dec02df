//! Delta-time computation from native transport clocks.

use serde::{Deserialize, Serialize};

/// Resolution of a transport's native timestamp.
///
/// The conversion factor is a per-transport constant: ALSA sequencer time
/// and midir timestamps are microseconds, WinMM delivers milliseconds, and
/// some driver clocks tick at 100 ns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TickUnit {
    Milliseconds,
    Microseconds,
    HundredNanoseconds,
}

impl TickUnit {
    #[inline]
    pub fn seconds_per_tick(self) -> f64 {
        match self {
            TickUnit::Milliseconds => 1e-3,
            TickUnit::Microseconds => 1e-6,
            TickUnit::HundredNanoseconds => 1e-7,
        }
    }
}

/// Per-connection clock state. Producer-thread-only.
///
/// Stamps run once per completed message, in arrival order, and update the
/// baseline unconditionally -- a message that is later filtered out must not
/// distort the delta of the message after it.
#[derive(Debug)]
pub struct ClockNormalizer {
    seconds_per_tick: f64,
    last: u64,
    first_message: bool,
}

impl ClockNormalizer {
    pub fn new(unit: TickUnit) -> Self {
        Self {
            seconds_per_tick: unit.seconds_per_tick(),
            last: 0,
            first_message: true,
        }
    }

    /// Delta in seconds since the previous stamped message; 0.0 for the
    /// first message on the connection. Clock wraparound or out-of-order
    /// delivery clamps to 0.0 instead of going negative.
    pub fn stamp(&mut self, native: u64) -> f64 {
        if self.first_message {
            self.first_message = false;
            self.last = native;
            return 0.0;
        }
        let delta = match native.checked_sub(self.last) {
            Some(ticks) => ticks as f64 * self.seconds_per_tick,
            None => 0.0,
        };
        self.last = native;
        delta
    }
}
