//! Message-class filtering, applied after assembly and clock-stamping.

use serde::{Deserialize, Serialize};

use crate::message::{is_sensing_status, is_timing_status};

/// Which message classes to drop before delivery.
///
/// Bit layout matches the classic `ignoreTypes(sysex, time, sense)` API:
/// 0x01 sysex, 0x02 timing (Clock/Tick/MTC quarter-frame), 0x04 active
/// sensing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IgnoreFlags(u8);

impl IgnoreFlags {
    pub const NONE: IgnoreFlags = IgnoreFlags(0);
    pub const SYSEX: u8 = 0x01;
    pub const TIMING: u8 = 0x02;
    pub const SENSING: u8 = 0x04;

    pub fn new(sysex: bool, timing: bool, sensing: bool) -> Self {
        let mut bits = 0;
        if sysex {
            bits |= Self::SYSEX;
        }
        if timing {
            bits |= Self::TIMING;
        }
        if sensing {
            bits |= Self::SENSING;
        }
        IgnoreFlags(bits)
    }

    pub fn from_bits(bits: u8) -> Self {
        IgnoreFlags(bits & (Self::SYSEX | Self::TIMING | Self::SENSING))
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn ignores_sysex(self) -> bool {
        self.0 & Self::SYSEX != 0
    }

    #[inline]
    pub fn ignores_timing(self) -> bool {
        self.0 & Self::TIMING != 0
    }

    #[inline]
    pub fn ignores_sensing(self) -> bool {
        self.0 & Self::SENSING != 0
    }

    /// Gate for a completed message, keyed on its status byte. Dropping a
    /// message here has no side effect; the clock baseline was already
    /// updated by the stamp that precedes filtering.
    #[inline]
    pub fn should_keep(self, bytes: &[u8]) -> bool {
        let status = match bytes.first() {
            Some(&b) => b,
            None => return false,
        };
        if status == 0xF0 {
            return !self.ignores_sysex();
        }
        if is_timing_status(status) {
            return !self.ignores_timing();
        }
        if is_sensing_status(status) {
            return !self.ignores_sensing();
        }
        true
    }
}
