//! midir-backed input transport.
//!
//! This layer only classifies what midir delivers into raw fragments; all
//! reassembly, timestamping, and filtering happens in the core pipeline.

use midir::{Ignore, MidiInput};
use tracing::debug;

use crate::error::{Error, Result};
use crate::fragment::{FragmentKind, RawFragment};
use crate::input::{open_input, InputConfig, InputHandle};
use crate::message::is_status_byte;
use crate::TickUnit;

const CLIENT_NAME: &str = "midistream";
const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;

#[derive(Debug, Clone)]
pub struct MidiInputDevice {
    pub index: usize,
    pub name: String,
}

/// Enumerate currently available MIDI input devices.
pub fn list_input_devices() -> Result<Vec<MidiInputDevice>> {
    let input = MidiInput::new(CLIENT_NAME)?;
    let mut devices = Vec::new();
    for (index, port) in input.ports().iter().enumerate() {
        let name = input
            .port_name(port)
            .unwrap_or_else(|_| format!("Port {index}"));
        devices.push(MidiInputDevice { index, name });
    }
    Ok(devices)
}

/// An open hardware input port. Dropping this disconnects the port and stops
/// the transport callback; drop it before (or together with) the handle.
pub struct MidiInputConnection {
    _connection: midir::MidiInputConnection<()>,
    device_name: String,
}

impl MidiInputConnection {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

/// Map one midir buffer to a fragment kind. midir usually delivers whole
/// messages, but some backends hand sysex over in segments; a buffer without
/// a leading status byte can only be such a continuation.
fn classify(bytes: &[u8]) -> FragmentKind {
    let first = bytes[0];
    if first == SYSEX_START || !is_status_byte(first) {
        if bytes.last() == Some(&SYSEX_END) {
            FragmentKind::SysexChunkFinal
        } else {
            FragmentKind::SysexChunk
        }
    } else {
        FragmentKind::ShortMessage
    }
}

/// Open the device at `device_index` and feed its events through the
/// pipeline. midir timestamps are microseconds, so the config's tick unit is
/// overridden accordingly.
pub fn connect_input(
    device_index: usize,
    config: InputConfig,
) -> Result<(MidiInputConnection, InputHandle)> {
    let mut input = MidiInput::new(CLIENT_NAME)?;
    // Filtering is the pipeline's job; take everything from the driver.
    input.ignore(Ignore::None);

    let ports = input.ports();
    let port = ports.get(device_index).ok_or_else(|| {
        Error::MidiDevice(format!("input device index {device_index} out of range"))
    })?;
    let device_name = input
        .port_name(port)
        .unwrap_or_else(|_| format!("Port {device_index}"));

    let config = InputConfig {
        tick_unit: TickUnit::Microseconds,
        ..config
    };
    let (mut driver, handle) = open_input(config);

    let connection = input.connect(
        port,
        CLIENT_NAME,
        move |timestamp, bytes, _| {
            if bytes.is_empty() {
                return;
            }
            driver.feed(RawFragment::new(classify(bytes), bytes, timestamp));
        },
        (),
    )?;

    debug!(device = %device_name, "connected MIDI input");
    Ok((
        MidiInputConnection {
            _connection: connection,
            device_name,
        },
        handle,
    ))
}
