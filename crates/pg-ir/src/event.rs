//! Timeline events.
//!
//! Every event carries its absolute position and an optional delta. The
//! delta is only filled in while a track is being serialized; absolute time
//! is authoritative. Two events compare equal when their wire bytes match.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use arrayvec::ArrayVec;

use crate::node::NodeData;
use crate::time::{BarBeatTime, TimeSignature};
use crate::var_len::{self, VarLenQuantity};
use crate::EventError;

/// Status byte introducing meta events.
pub const META_STATUS: u8 = 0xFF;

/// Meta type reserved for node events.
pub const NODE_META_TYPE: u8 = 0x07;

// ---------------------------------------------------------------------------
// Event
// ---------------------------------------------------------------------------

/// One event on a track.
#[derive(Clone, Debug)]
pub enum Event {
    Meta(MetaEvent),
    Channel(ChannelEvent),
    Node(NodeEvent),
}

impl Event {
    pub fn time(&self) -> BarBeatTime {
        match self {
            Event::Meta(e) => e.time,
            Event::Channel(e) => e.time,
            Event::Node(e) => e.time,
        }
    }

    pub fn set_time(&mut self, time: BarBeatTime) {
        match self {
            Event::Meta(e) => e.time = time,
            Event::Channel(e) => e.time = time,
            Event::Node(e) => e.time = time,
        }
    }

    /// This event moved to `time`, with its delta cleared.
    pub fn with_time(mut self, time: BarBeatTime) -> Self {
        self.set_time(time);
        self.set_delta(None);
        self
    }

    pub fn delta(&self) -> Option<VarLenQuantity> {
        match self {
            Event::Meta(e) => e.delta,
            Event::Channel(e) => e.delta,
            Event::Node(e) => e.delta,
        }
    }

    pub fn set_delta(&mut self, delta: Option<VarLenQuantity>) {
        match self {
            Event::Meta(e) => e.delta = delta,
            Event::Channel(e) => e.delta = delta,
            Event::Node(e) => e.delta = delta,
        }
    }

    /// Wire form without the leading delta.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Event::Meta(e) => e.to_bytes(),
            Event::Channel(e) => e.to_bytes().to_vec(),
            Event::Node(e) => e.to_bytes(),
        }
    }

    /// Decode one complete event. `bytes` must hold exactly the event, from
    /// its status byte to its last data byte.
    pub fn from_bytes(
        bytes: &[u8],
        time: BarBeatTime,
        delta: Option<VarLenQuantity>,
    ) -> Result<Self, EventError> {
        match bytes {
            [META_STATUS, NODE_META_TYPE, ..] => NodeEvent::from_bytes(bytes, time, delta).map(Event::Node),
            [META_STATUS, ..] => MetaEvent::from_bytes(bytes, time, delta).map(Event::Meta),
            [_, ..] => ChannelEvent::from_bytes(bytes, time, delta).map(Event::Channel),
            [] => Err(EventError::InvalidLength { expected: 1, actual: 0 }),
        }
    }

    pub fn as_meta(&self) -> Option<&MetaEvent> {
        match self {
            Event::Meta(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelEvent> {
        match self {
            Event::Channel(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<&NodeEvent> {
        match self {
            Event::Node(e) => Some(e),
            _ => None,
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        core::mem::discriminant(self) == core::mem::discriminant(other) && self.to_bytes() == other.to_bytes()
    }
}

impl From<MetaEvent> for Event {
    fn from(e: MetaEvent) -> Self {
        Event::Meta(e)
    }
}

impl From<ChannelEvent> for Event {
    fn from(e: ChannelEvent) -> Self {
        Event::Channel(e)
    }
}

impl From<NodeEvent> for Event {
    fn from(e: NodeEvent) -> Self {
        Event::Node(e)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Meta(e) => write!(f, "{} meta {}", e.time, e.data),
            Event::Channel(e) => write!(
                f,
                "{} {:?} ch{} {:02X?}",
                e.time,
                e.kind,
                e.channel,
                &e.to_bytes()[1..]
            ),
            Event::Node(e) => match &e.data {
                NodeData::Add { identifier, trajectory, generator } => {
                    write!(f, "{} add {} {} {}", e.time, identifier, trajectory, generator)
                }
                NodeData::Remove { identifier } => write!(f, "{} remove {}", e.time, identifier),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Meta events
// ---------------------------------------------------------------------------

/// Meta event payloads, keyed by their type byte.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MetaData {
    Text(String),
    Copyright(String),
    SequenceName(String),
    InstrumentName(String),
    Marker(String),
    ProgramName(String),
    DeviceName(String),
    EndOfTrack,
    Tempo { micros_per_quarter: u32 },
    TimeSignature(TimeSignature),
    /// Any type not listed above, kept verbatim.
    Unknown { kind: u8, data: Vec<u8> },
}

impl MetaData {
    /// Tempo event for `bpm` beats per minute.
    pub fn tempo(bpm: f64) -> Self {
        let micros = libm::round(60_000_000.0 / bpm.max(1.0)) as u32;
        MetaData::Tempo { micros_per_quarter: micros.min(0x00FF_FFFF) }
    }

    pub fn kind(&self) -> u8 {
        match self {
            MetaData::Text(_) => 0x01,
            MetaData::Copyright(_) => 0x02,
            MetaData::SequenceName(_) => 0x03,
            MetaData::InstrumentName(_) => 0x04,
            MetaData::Marker(_) => 0x06,
            MetaData::ProgramName(_) => 0x08,
            MetaData::DeviceName(_) => 0x09,
            MetaData::EndOfTrack => 0x2F,
            MetaData::Tempo { .. } => 0x51,
            MetaData::TimeSignature(_) => 0x58,
            MetaData::Unknown { kind, .. } => *kind,
        }
    }

    /// Tempo in beats per minute, for tempo events.
    pub fn bpm(&self) -> Option<f64> {
        match self {
            MetaData::Tempo { micros_per_quarter } if *micros_per_quarter > 0 => {
                Some(60_000_000.0 / *micros_per_quarter as f64)
            }
            _ => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            MetaData::Text(s)
            | MetaData::Copyright(s)
            | MetaData::SequenceName(s)
            | MetaData::InstrumentName(s)
            | MetaData::Marker(s)
            | MetaData::ProgramName(s)
            | MetaData::DeviceName(s) => Some(s),
            _ => None,
        }
    }

    pub fn payload(&self) -> Vec<u8> {
        match self {
            MetaData::EndOfTrack => Vec::new(),
            MetaData::Tempo { micros_per_quarter } => micros_per_quarter.to_be_bytes()[1..].to_vec(),
            MetaData::TimeSignature(sig) => sig.bytes().to_vec(),
            MetaData::Unknown { data, .. } => data.clone(),
            other => other.text().map(|s| s.as_bytes().to_vec()).unwrap_or_default(),
        }
    }

    pub fn from_payload(kind: u8, data: &[u8]) -> Result<Self, EventError> {
        // Other tools write Latin-1 and friends; invalid sequences become U+FFFD.
        let text = || String::from_utf8_lossy(data).into_owned();
        Ok(match kind {
            0x01 => MetaData::Text(text()),
            0x02 => MetaData::Copyright(text()),
            0x03 => MetaData::SequenceName(text()),
            0x04 => MetaData::InstrumentName(text()),
            0x06 => MetaData::Marker(text()),
            0x08 => MetaData::ProgramName(text()),
            0x09 => MetaData::DeviceName(text()),
            0x2F => {
                expect_len(data, 0)?;
                MetaData::EndOfTrack
            }
            0x51 => {
                expect_len(data, 3)?;
                MetaData::Tempo { micros_per_quarter: u32::from_be_bytes([0, data[0], data[1], data[2]]) }
            }
            0x58 => MetaData::TimeSignature(TimeSignature::from_bytes(data)?),
            NODE_META_TYPE => return Err(EventError::UnsupportedEventType(NODE_META_TYPE)),
            _ => MetaData::Unknown { kind, data: data.to_vec() },
        })
    }
}

impl fmt::Display for MetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetaData::EndOfTrack => f.write_str("end of track"),
            MetaData::Tempo { .. } => write!(f, "tempo {:.2} bpm", self.bpm().unwrap_or(0.0)),
            MetaData::TimeSignature(sig) => write!(f, "time signature {}", sig),
            MetaData::Unknown { kind, data } => write!(f, "unknown {:#04x} ({} bytes)", kind, data.len()),
            MetaData::Marker(s) => write!(f, "marker {:?}", s),
            other => write!(f, "text {:#04x} {:?}", other.kind(), other.text().unwrap_or_default()),
        }
    }
}

fn expect_len(data: &[u8], expected: usize) -> Result<(), EventError> {
    if data.len() == expected {
        Ok(())
    } else {
        Err(EventError::InvalidLength { expected, actual: data.len() })
    }
}

/// Split `FF type VLQ(len) data` into type and data, checking the declared
/// length against the bytes actually present.
fn split_meta(bytes: &[u8]) -> Result<(u8, &[u8]), EventError> {
    let [META_STATUS, kind, rest @ ..] = bytes else {
        return match bytes.first() {
            Some(&status) if status != META_STATUS => Err(EventError::UnsupportedEventType(status)),
            _ => Err(EventError::InvalidLength { expected: 3, actual: bytes.len() }),
        };
    };
    let (len, used) = var_len::decode(rest)?;
    let data = &rest[used..];
    if data.len() as u64 != len {
        let expected = (2 + used).saturating_add(usize::try_from(len).unwrap_or(usize::MAX));
        return Err(EventError::InvalidLength { expected, actual: bytes.len() });
    }
    Ok((*kind, data))
}

fn join_meta(kind: u8, data: &[u8]) -> Vec<u8> {
    let len = var_len::encode(data.len() as u64);
    let mut out = Vec::with_capacity(2 + len.len() + data.len());
    out.push(META_STATUS);
    out.push(kind);
    out.extend_from_slice(&len);
    out.extend_from_slice(data);
    out
}

/// A non-performance event: tempo, signature, text, end of track.
#[derive(Clone, Debug)]
pub struct MetaEvent {
    pub time: BarBeatTime,
    pub delta: Option<VarLenQuantity>,
    pub data: MetaData,
}

impl MetaEvent {
    pub fn new(time: BarBeatTime, data: MetaData) -> Self {
        Self { time, delta: None, data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        join_meta(self.data.kind(), &self.data.payload())
    }

    pub fn from_bytes(
        bytes: &[u8],
        time: BarBeatTime,
        delta: Option<VarLenQuantity>,
    ) -> Result<Self, EventError> {
        let (kind, data) = split_meta(bytes)?;
        Ok(Self { time, delta, data: MetaData::from_payload(kind, data)? })
    }
}

// ---------------------------------------------------------------------------
// Node events
// ---------------------------------------------------------------------------

/// Addition or removal of a node, carried as meta type 0x07.
#[derive(Clone, Debug)]
pub struct NodeEvent {
    pub time: BarBeatTime,
    pub delta: Option<VarLenQuantity>,
    pub data: NodeData,
}

impl NodeEvent {
    pub fn new(time: BarBeatTime, data: NodeData) -> Self {
        Self { time, delta: None, data }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        join_meta(NODE_META_TYPE, &self.data.to_bytes())
    }

    pub fn from_bytes(
        bytes: &[u8],
        time: BarBeatTime,
        delta: Option<VarLenQuantity>,
    ) -> Result<Self, EventError> {
        let (kind, data) = split_meta(bytes)?;
        if kind != NODE_META_TYPE {
            return Err(EventError::UnsupportedEventType(kind));
        }
        Ok(Self { time, delta, data: NodeData::from_bytes(data)? })
    }
}

// ---------------------------------------------------------------------------
// Channel events
// ---------------------------------------------------------------------------

/// Channel voice message type, the high nibble of the status byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    NoteOff = 0x8,
    NoteOn = 0x9,
    PolyphonicPressure = 0xA,
    ControlChange = 0xB,
    ProgramChange = 0xC,
    ChannelPressure = 0xD,
    PitchBend = 0xE,
}

impl ChannelKind {
    pub fn from_nibble(nibble: u8) -> Option<Self> {
        Some(match nibble {
            0x8 => ChannelKind::NoteOff,
            0x9 => ChannelKind::NoteOn,
            0xA => ChannelKind::PolyphonicPressure,
            0xB => ChannelKind::ControlChange,
            0xC => ChannelKind::ProgramChange,
            0xD => ChannelKind::ChannelPressure,
            0xE => ChannelKind::PitchBend,
            _ => return None,
        })
    }

    /// Total bytes on the wire, status byte included.
    pub const fn byte_count(self) -> usize {
        match self {
            ChannelKind::ControlChange | ChannelKind::ProgramChange | ChannelKind::ChannelPressure => 2,
            _ => 3,
        }
    }
}

/// A MIDI voice message.
///
/// Channel numbers are clamped to 0..=15 and data bytes to 0..=127 on
/// construction. `data2` is present exactly when the kind uses 3 bytes.
#[derive(Clone, Debug)]
pub struct ChannelEvent {
    pub time: BarBeatTime,
    pub delta: Option<VarLenQuantity>,
    pub kind: ChannelKind,
    pub channel: u8,
    pub data1: u8,
    pub data2: Option<u8>,
}

impl ChannelEvent {
    pub fn new(kind: ChannelKind, channel: u8, data1: u8, data2: Option<u8>, time: BarBeatTime) -> Self {
        let data2 = (kind.byte_count() == 3).then(|| data2.unwrap_or(0).min(0x7F));
        Self { time, delta: None, kind, channel: channel.min(0x0F), data1: data1.min(0x7F), data2 }
    }

    pub fn note_on(channel: u8, note: u8, velocity: u8, time: BarBeatTime) -> Self {
        Self::new(ChannelKind::NoteOn, channel, note, Some(velocity), time)
    }

    pub fn note_off(channel: u8, note: u8, velocity: u8, time: BarBeatTime) -> Self {
        Self::new(ChannelKind::NoteOff, channel, note, Some(velocity), time)
    }

    /// Control change is a two-byte event in this model; only the controller number travels.
    pub fn control_change(channel: u8, controller: u8, time: BarBeatTime) -> Self {
        Self::new(ChannelKind::ControlChange, channel, controller, None, time)
    }

    pub fn program_change(channel: u8, program: u8, time: BarBeatTime) -> Self {
        Self::new(ChannelKind::ProgramChange, channel, program, None, time)
    }

    pub fn channel_pressure(channel: u8, pressure: u8, time: BarBeatTime) -> Self {
        Self::new(ChannelKind::ChannelPressure, channel, pressure, None, time)
    }

    pub fn polyphonic_pressure(channel: u8, note: u8, pressure: u8, time: BarBeatTime) -> Self {
        Self::new(ChannelKind::PolyphonicPressure, channel, note, Some(pressure), time)
    }

    /// 14-bit bend value, 0x2000 centred.
    pub fn pitch_bend(channel: u8, value: u16, time: BarBeatTime) -> Self {
        let value = value.min(0x3FFF);
        Self::new(ChannelKind::PitchBend, channel, (value & 0x7F) as u8, Some((value >> 7) as u8), time)
    }

    pub fn status(&self) -> u8 {
        (self.kind as u8) << 4 | self.channel
    }

    pub fn to_bytes(&self) -> ArrayVec<u8, 3> {
        let mut out = ArrayVec::new();
        out.push(self.status());
        out.push(self.data1);
        if let Some(data2) = self.data2 {
            out.push(data2);
        }
        out
    }

    pub fn from_bytes(
        bytes: &[u8],
        time: BarBeatTime,
        delta: Option<VarLenQuantity>,
    ) -> Result<Self, EventError> {
        let &status = bytes.first().ok_or(EventError::InvalidLength { expected: 2, actual: 0 })?;
        let kind = ChannelKind::from_nibble(status >> 4).ok_or(EventError::UnsupportedEventType(status))?;
        if bytes.len() != kind.byte_count() {
            return Err(EventError::InvalidLength { expected: kind.byte_count(), actual: bytes.len() });
        }
        let mut event = Self::new(kind, status & 0x0F, bytes[1], bytes.get(2).copied(), time);
        event.delta = delta;
        Ok(event)
    }
}
