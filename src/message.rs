//! Completed MIDI messages and status-byte classification.

use smallvec::SmallVec;

/// Inline capacity covers every channel voice message; sysex spills to the
/// heap, off the hot path for typical input streams.
pub type MessageBytes = SmallVec<[u8; 3]>;

/// One complete MIDI message as delivered to the consumer.
///
/// `bytes` is never empty. `delta` is seconds since the previous delivered
/// message on the same connection, 0.0 for the first message.
#[derive(Debug, Clone, PartialEq)]
pub struct MidiMessage {
    pub delta: f64,
    pub bytes: MessageBytes,
}

impl MidiMessage {
    pub fn new(delta: f64, bytes: MessageBytes) -> Self {
        Self { delta, bytes }
    }

    /// Leading status byte.
    #[inline]
    pub fn status(&self) -> u8 {
        self.bytes[0]
    }

    #[inline]
    pub fn is_sysex(&self) -> bool {
        self.status() == 0xF0
    }
}

/// True if `byte` can start a MIDI message.
#[inline]
pub fn is_status_byte(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Expected total length for a fixed-length message with this status byte.
///
/// Channel voice: 3 bytes except Program Change / Channel Pressure (2).
/// System common: MTC quarter-frame and Song Select are 2, Song Position
/// is 3. System realtime and the remaining system common messages are a
/// single byte.
#[inline]
pub fn short_message_len(status: u8) -> usize {
    match status {
        0x80..=0xBF => 3,
        0xC0..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF1 => 2,
        0xF2 => 3,
        0xF3 => 2,
        _ => 1,
    }
}

/// Timing class: MIDI Clock, Tick, and MTC quarter-frame.
#[inline]
pub(crate) fn is_timing_status(status: u8) -> bool {
    matches!(status, 0xF8 | 0xF9 | 0xF1)
}

#[inline]
pub(crate) fn is_sensing_status(status: u8) -> bool {
    status == 0xFE
}
