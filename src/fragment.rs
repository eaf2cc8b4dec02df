//! Raw transport events before assembly.
//!
//! A transport backend (hardware driver callback or polling thread) hands the
//! pipeline one `RawFragment` per native event. Short channel/system messages
//! arrive whole; sysex data may be segmented into bounded-size chunks.

/// How the transport classified a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    /// A complete fixed-length MIDI message (status byte + data bytes).
    ShortMessage,
    /// A sysex segment; more data follows.
    SysexChunk,
    /// The transport believes this is the last segment of a sysex message.
    SysexChunkFinal,
    /// The transport reported an error mid-sysex; the accumulated message
    /// is unusable.
    SysexError,
}

/// One raw event from the transport, consumed exactly once by the assembler.
///
/// `timestamp` is in the transport's native clock ticks; the tick unit is a
/// per-transport constant (see [`crate::TickUnit`]).
#[derive(Debug, Clone, Copy)]
pub struct RawFragment<'a> {
    pub kind: FragmentKind,
    pub bytes: &'a [u8],
    pub timestamp: u64,
}

impl<'a> RawFragment<'a> {
    pub fn new(kind: FragmentKind, bytes: &'a [u8], timestamp: u64) -> Self {
        Self {
            kind,
            bytes,
            timestamp,
        }
    }

    /// A whole short message.
    pub fn short(bytes: &'a [u8], timestamp: u64) -> Self {
        Self::new(FragmentKind::ShortMessage, bytes, timestamp)
    }

    /// A non-final sysex segment.
    pub fn sysex_chunk(bytes: &'a [u8], timestamp: u64) -> Self {
        Self::new(FragmentKind::SysexChunk, bytes, timestamp)
    }

    /// A final sysex segment.
    pub fn sysex_final(bytes: &'a [u8], timestamp: u64) -> Self {
        Self::new(FragmentKind::SysexChunkFinal, bytes, timestamp)
    }
}
