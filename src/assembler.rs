//! Accumulates raw transport fragments into complete MIDI messages.
//!
//! Some transports segment sysex data into bounded-size chunks (the ALSA
//! sequencer caps events at 256 bytes, WinMM recycles fixed sysex buffers),
//! so a single logical message may span several fragments. This state machine
//! is the one place that reassembly happens; transports only classify.

use crate::fragment::{FragmentKind, RawFragment};
use crate::message::{is_status_byte, short_message_len, MessageBytes};

const SYSEX_END: u8 = 0xF7;

/// Per-connection assembly state. Producer-thread-only; one instance per
/// open input connection.
#[derive(Debug, Default)]
pub struct MessageAssembler {
    buffer: MessageBytes,
    in_sysex: bool,
}

impl MessageAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one fragment; returns the completed byte sequence when a
    /// message finishes, `None` while accumulation continues.
    ///
    /// A short fragment whose first byte is not a status byte is a desynced
    /// stream, not an error: it is dropped without touching any state.
    pub fn feed(&mut self, fragment: RawFragment<'_>) -> Option<MessageBytes> {
        match fragment.kind {
            FragmentKind::ShortMessage => self.feed_short(fragment.bytes),
            FragmentKind::SysexChunk | FragmentKind::SysexChunkFinal => {
                self.feed_sysex(fragment.bytes, fragment.kind == FragmentKind::SysexChunkFinal)
            }
            FragmentKind::SysexError => {
                if self.in_sysex {
                    tracing::trace!(
                        discarded = self.buffer.len(),
                        "sysex aborted by transport"
                    );
                }
                self.reset();
                None
            }
        }
    }

    fn feed_short(&mut self, bytes: &[u8]) -> Option<MessageBytes> {
        let (&status, _) = bytes.split_first()?;
        if !is_status_byte(status) {
            tracing::trace!(byte = status, "dropping fragment without status byte");
            return None;
        }
        // A short fragment interleaved with sysex chunks means the sysex was
        // interrupted; the partial accumulation stays pending (ALSA delivers
        // realtime messages between sysex segments).
        let len = short_message_len(status).min(bytes.len());
        Some(MessageBytes::from_slice(&bytes[..len]))
    }

    fn feed_sysex(&mut self, bytes: &[u8], is_final: bool) -> Option<MessageBytes> {
        // A fragment with no decodable bytes yields nothing and leaves all
        // state untouched, even if the accumulation already ends in the
        // terminator (WinMM hands over empty sysex headers on port close).
        if bytes.is_empty() {
            return None;
        }
        if !self.in_sysex {
            self.buffer.clear();
            self.in_sysex = true;
        }
        self.buffer.extend_from_slice(bytes);

        // Only complete on the terminator: some backends truncate the
        // terminator-carrying chunk, in which case we keep accumulating.
        if is_final && self.buffer.last() == Some(&SYSEX_END) {
            self.in_sysex = false;
            return Some(std::mem::take(&mut self.buffer));
        }
        None
    }

    /// True while a sysex message is partially accumulated.
    pub fn in_sysex(&self) -> bool {
        self.in_sysex
    }

    /// Discard any partial accumulation.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_sysex = false;
    }
}
