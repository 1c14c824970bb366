//! File formats for perpetual-groove.
//!
//! Reads and writes standard MIDI files (format 1, 480 ticks per quarter)
//! and the Groove JSON project format.

mod groove;
mod header;
mod midi_file;
mod reader;
mod track_chunk;

pub use groove::{GrooveFile, GrooveLoop, GrooveNode, GrooveTrack};
pub use header::{HeaderChunk, HEADER_CHUNK_LEN, HEADER_DATA_LEN, MIDI_FORMAT};
pub use midi_file::{load_midi, save_midi, write_midi, MidiFile};
pub use track_chunk::TrackChunk;

use pg_ir::EventError;
use thiserror::Error;

/// Error type for file decoding and encoding.
#[derive(Debug, Error)]
pub enum FormatError {
    /// Missing or wrong chunk magic
    #[error("invalid header")]
    InvalidHeader,
    /// A declared length disagrees with the bytes present
    #[error("invalid length")]
    InvalidLength,
    /// Header fields describe a file this codec does not produce
    #[error("file structurally unsound")]
    FileStructurallyUnsound,
    /// Status byte that starts no known event
    #[error("unsupported event {0:#04x}")]
    UnsupportedEvent(u8),
    /// Truncated or overflowing variable-length quantity
    #[error("malformed variable-length quantity")]
    MalformedVarLen,
    /// Input ended early
    #[error("unexpected end of file")]
    UnexpectedEof,
    /// Groove document missing a required field
    #[error("malformed project: {0}")]
    MalformedProject(String),
    /// Event payload that does not decode
    #[error("invalid event: {0}")]
    Event(EventError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<EventError> for FormatError {
    fn from(e: EventError) -> Self {
        match e {
            EventError::MalformedVarLen => FormatError::MalformedVarLen,
            EventError::InvalidLength { .. } => FormatError::InvalidLength,
            EventError::UnsupportedEventType(status) => FormatError::UnsupportedEvent(status),
            other => FormatError::Event(other),
        }
    }
}

impl From<binrw::Error> for FormatError {
    fn from(e: binrw::Error) -> Self {
        match e {
            binrw::Error::BadMagic { .. } => FormatError::InvalidHeader,
            binrw::Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => FormatError::InvalidLength,
            binrw::Error::Io(io) => FormatError::Io(io),
            _ => FormatError::FileStructurallyUnsound,
        }
    }
}
