//! `MTrk` track chunks: delta-timed event records.

use pg_ir::{BarBeatTime, ChannelKind, Event, EventContainer, VarLenQuantity, META_STATUS, TICKS_PER_QUARTER};

use crate::reader::ChunkReader;
use crate::FormatError;

pub const TRACK_MAGIC: &[u8; 4] = b"MTrk";

/// One track's events with their deltas filled in.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrackChunk {
    pub events: Vec<Event>,
}

impl TrackChunk {
    /// Events of `container` in time order, each annotated with its
    /// distance from the previous one (the first from tick zero).
    pub fn from_container(container: &EventContainer) -> Self {
        let mut previous = 0u64;
        let events = container
            .iter()
            .map(|event| {
                let ticks = event.time().ticks();
                let mut event = event.clone();
                event.set_delta(Some(VarLenQuantity(ticks - previous)));
                previous = ticks;
                event
            })
            .collect();
        Self { events }
    }

    pub fn into_container(self) -> EventContainer {
        self.events.into_iter().collect()
    }

    /// Chunk bytes: magic, big-endian body length, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body = self.body();
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(TRACK_MAGIC);
        out.extend_from_slice(&(body.len() as u32).to_be_bytes());
        out.extend_from_slice(&body);
        out
    }

    /// Deltas are recomputed from absolute times; cached deltas are ignored.
    fn body(&self) -> Vec<u8> {
        let mut body = Vec::new();
        let mut previous = 0u64;
        for event in &self.events {
            let ticks = event.time().ticks();
            body.extend_from_slice(&VarLenQuantity(ticks.saturating_sub(previous)).bytes());
            body.extend_from_slice(&event.to_bytes());
            previous = previous.max(ticks);
        }
        body
    }

    /// Decode a whole chunk from the front of `bytes`, returning it with the
    /// number of bytes consumed. Times are rescaled from `division` to 480
    /// ticks per quarter.
    pub fn decode(bytes: &[u8], division: u16) -> Result<(Self, usize), FormatError> {
        if bytes.len() < 8 {
            return Err(FormatError::InvalidLength);
        }
        if &bytes[..4] != TRACK_MAGIC {
            return Err(FormatError::InvalidHeader);
        }
        let declared = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let body = bytes.get(8..8 + declared).ok_or(FormatError::InvalidLength)?;
        let chunk = Self::decode_body(body, division)?;
        Ok((chunk, 8 + declared))
    }

    /// Decode the records of a chunk body. The last record must end exactly
    /// at the end of `body`.
    pub fn decode_body(body: &[u8], division: u16) -> Result<Self, FormatError> {
        let mut reader = ChunkReader::new(body);
        let mut events = Vec::new();
        let mut ticks = 0u64;

        while !reader.is_empty() {
            let delta = reader.read_var_len()?;
            ticks = ticks.checked_add(delta).ok_or(FormatError::MalformedVarLen)?;
            let start = reader.position();
            skip_event(&mut reader).map_err(|e| match e {
                FormatError::UnexpectedEof => FormatError::InvalidLength,
                other => other,
            })?;
            let time = BarBeatTime::from_ticks(rescale(ticks, division));
            events.push(Event::from_bytes(reader.since(start), time, Some(VarLenQuantity(delta)))?);
        }
        log::trace!("decoded track chunk: {} events in {} bytes", events.len(), body.len());
        Ok(Self { events })
    }
}

/// Advance past one event without interpreting its payload.
fn skip_event(reader: &mut ChunkReader<'_>) -> Result<(), FormatError> {
    let status = reader.peek_u8()?;
    match status {
        META_STATUS => {
            reader.skip(2)?;
            let len = reader.read_var_len()?;
            reader.skip(usize::try_from(len).map_err(|_| FormatError::InvalidLength)?)
        }
        0x80..=0xEF => {
            let kind = ChannelKind::from_nibble(status >> 4).ok_or(FormatError::UnsupportedEvent(status))?;
            reader.skip(kind.byte_count())
        }
        _ => Err(FormatError::UnsupportedEvent(status)),
    }
}

fn rescale(ticks: u64, division: u16) -> u64 {
    if division as u32 == TICKS_PER_QUARTER || division == 0 {
        return ticks;
    }
    (ticks as u128 * TICKS_PER_QUARTER as u128 / division as u128) as u64
}
