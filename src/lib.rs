//! Realtime MIDI input pipeline.
//!
//! Turns raw, possibly fragmented transport events into complete,
//! delta-timestamped MIDI messages and hands them to exactly one consumer:
//! either a callback invoked synchronously on the transport thread, or a
//! lock-free fixed-capacity queue drained by non-blocking polls.
//!
//! ```ignore
//! use midistream::{open_input, InputConfig, RawFragment};
//!
//! let (mut driver, mut handle) = open_input(InputConfig::default());
//!
//! // Transport thread: one fragment per native event.
//! driver.feed(RawFragment::short(&[0x90, 60, 100], timestamp));
//!
//! // Application thread: non-blocking poll.
//! while let Some(msg) = handle.poll()? {
//!     println!("+{:.3}s {:02X?}", msg.delta, msg.bytes);
//! }
//! ```
//!
//! Feature gate: `midi-io` (hardware input via midir).

pub mod error;
pub use error::{Error, Result};

mod fragment;
pub use fragment::{FragmentKind, RawFragment};

mod message;
pub use message::{is_status_byte, short_message_len, MessageBytes, MidiMessage};

mod assembler;
pub use assembler::MessageAssembler;

mod clock;
pub use clock::{ClockNormalizer, TickUnit};

mod filter;
pub use filter::IgnoreFlags;

mod queue;

mod dispatch;
pub use dispatch::MidiCallback;

mod input;
pub use input::{open_input, Diagnostic, InputConfig, InputDriver, InputHandle};

#[cfg(feature = "midi-io")]
pub(crate) mod io;

#[cfg(feature = "midi-io")]
pub use io::{connect_input, list_input_devices, MidiInputConnection, MidiInputDevice};
