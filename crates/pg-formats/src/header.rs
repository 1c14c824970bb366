//! The `MThd` header chunk.

use binrw::io::Cursor;
use binrw::{binrw, BinRead, BinWrite};
use pg_ir::TICKS_PER_QUARTER;

use crate::FormatError;

/// Bytes in a header chunk, magic included.
pub const HEADER_CHUNK_LEN: usize = 14;

/// Value of the header's length field.
pub const HEADER_DATA_LEN: u32 = 6;

/// The only file format written and accepted: simultaneous tracks.
pub const MIDI_FORMAT: u16 = 1;

#[binrw]
#[brw(big, magic = b"MThd")]
struct RawHeader {
    length: u32,
    format: u16,
    number_of_tracks: u16,
    division: u16,
}

/// Decoded header fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderChunk {
    pub format: u16,
    pub number_of_tracks: u16,
    /// Ticks per quarter note.
    pub division: u16,
}

impl HeaderChunk {
    pub fn new(number_of_tracks: u16) -> Self {
        Self { format: MIDI_FORMAT, number_of_tracks, division: TICKS_PER_QUARTER as u16 }
    }

    pub fn to_bytes(&self) -> Result<[u8; HEADER_CHUNK_LEN], FormatError> {
        let raw = RawHeader {
            length: HEADER_DATA_LEN,
            format: self.format,
            number_of_tracks: self.number_of_tracks,
            division: self.division,
        };
        let mut out = [0u8; HEADER_CHUNK_LEN];
        raw.write(&mut Cursor::new(&mut out[..]))?;
        Ok(out)
    }

    /// Decode the first 14 bytes of `bytes`.
    ///
    /// Fails with `InvalidHeader` on a wrong magic, `InvalidLength` when the
    /// chunk is short or its length field is not 6, and
    /// `FileStructurallyUnsound` for any format other than 1 or a
    /// timecode-based division.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() < 4 || &bytes[..4] != b"MThd" {
            return Err(FormatError::InvalidHeader);
        }
        if bytes.len() < HEADER_CHUNK_LEN {
            return Err(FormatError::InvalidLength);
        }
        let raw = RawHeader::read(&mut Cursor::new(&bytes[..HEADER_CHUNK_LEN]))?;
        if raw.length != HEADER_DATA_LEN {
            return Err(FormatError::InvalidLength);
        }
        if raw.format != MIDI_FORMAT || raw.division == 0 || raw.division & 0x8000 != 0 {
            return Err(FormatError::FileStructurallyUnsound);
        }
        Ok(Self { format: raw.format, number_of_tracks: raw.number_of_tracks, division: raw.division })
    }
}
