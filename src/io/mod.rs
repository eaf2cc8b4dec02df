//! Hardware MIDI input via midir.
//!
//! Device enumeration and port connection feeding the assembly pipeline.
//! Requires the `midi-io` feature.

mod input;

pub use input::{connect_input, list_input_devices, MidiInputConnection, MidiInputDevice};
