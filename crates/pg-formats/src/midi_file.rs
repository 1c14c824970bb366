//! Whole standard MIDI files.

use std::io::Write;

use pg_ir::{Sequence, TrackColor, Track};

use crate::header::{HeaderChunk, HEADER_CHUNK_LEN};
use crate::track_chunk::{TrackChunk, TRACK_MAGIC};
use crate::FormatError;

/// A header plus its track chunks.
#[derive(Clone, Debug, PartialEq)]
pub struct MidiFile {
    pub header: HeaderChunk,
    pub tracks: Vec<TrackChunk>,
}

impl MidiFile {
    /// Tempo track first, then one chunk per instrument track.
    pub fn from_sequence(sequence: &Sequence) -> Self {
        let mut tracks = Vec::with_capacity(sequence.tracks.len() + 1);
        tracks.push(TrackChunk::from_container(&sequence.tempo_events_for_file()));
        for track in &sequence.tracks {
            tracks.push(TrackChunk::from_container(&track.events_for_file()));
        }
        Self { header: HeaderChunk::new(tracks.len() as u16), tracks }
    }

    pub fn into_sequence(self) -> Sequence {
        let mut chunks = self.tracks.into_iter();
        let mut sequence = Sequence::empty();
        if let Some(tempo) = chunks.next() {
            sequence.tempo = Sequence::tempo_from_events(tempo.events);
        }
        for (index, chunk) in chunks.enumerate() {
            let mut track = Track::from_events(chunk.events);
            track.color = TrackColor::for_index(index);
            sequence.tracks.push(track);
        }
        sequence.refresh_end_of_file();
        sequence
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.header.to_bytes()?);
        for track in &self.tracks {
            out.extend_from_slice(&track.to_bytes());
        }
        Ok(out)
    }

    /// Decode a file. Chunks with an unrecognized magic are skipped; the
    /// number of `MTrk` chunks must match the header.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let header = HeaderChunk::decode(bytes)?;
        let mut tracks = Vec::with_capacity(header.number_of_tracks as usize);
        let mut pos = HEADER_CHUNK_LEN;

        while pos < bytes.len() {
            let rest = &bytes[pos..];
            if rest.len() < 8 {
                return Err(FormatError::InvalidLength);
            }
            if &rest[..4] == TRACK_MAGIC {
                let (chunk, used) = TrackChunk::decode(rest, header.division)?;
                tracks.push(chunk);
                pos += used;
            } else {
                let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
                log::debug!("skipping {:?} chunk of {} bytes", String::from_utf8_lossy(&rest[..4]), len);
                pos = pos.checked_add(8 + len).filter(|&p| p <= bytes.len()).ok_or(FormatError::InvalidLength)?;
            }
        }

        if tracks.len() != header.number_of_tracks as usize {
            return Err(FormatError::FileStructurallyUnsound);
        }
        Ok(Self { header, tracks })
    }
}

/// Decode MIDI file bytes into a sequence. The first track is the tempo
/// track.
pub fn load_midi(data: &[u8]) -> Result<Sequence, FormatError> {
    let file = MidiFile::decode(data)?;
    log::debug!("loaded MIDI file with {} tracks", file.tracks.len());
    Ok(file.into_sequence())
}

pub fn save_midi(sequence: &Sequence) -> Result<Vec<u8>, FormatError> {
    MidiFile::from_sequence(sequence).to_bytes()
}

pub fn write_midi(w: &mut impl Write, sequence: &Sequence) -> Result<(), FormatError> {
    w.write_all(&save_midi(sequence)?)?;
    Ok(())
}
