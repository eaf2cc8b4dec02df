//! Error types for the MIDI input pipeline.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("a callback is already set for this connection")]
    CallbackAlreadySet,

    #[error("no callback is set for this connection")]
    NoCallbackSet,

    #[error("connection is in queue mode; callbacks cannot be registered")]
    QueueModeActive,

    #[error("connection is in callback mode; polling is not available")]
    CallbackModeActive,

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::MidiPort(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
