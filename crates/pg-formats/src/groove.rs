//! Groove JSON project documents.
//!
//! A document holds tracks of nodes and loops, a sparse tempo map and the
//! end-of-file position. Required document fields (`tracks`,
//! `tempoChanges`, `endOfFile`) fail the whole load when missing. A track,
//! loop or node that does not decode is skipped with a warning and the rest
//! of the document is kept.

use std::collections::BTreeMap;

use pg_ir::{
    BarBeatTime, Event, EventContainer, Generator, Loop, NodeData, NodeEvent, NodeIdentifier, Sequence,
    Track, TrackColor, Trajectory, Uuid,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FormatError;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A node's lifetime on a track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrooveNode {
    pub identifier: NodeIdentifier,
    pub generator: Generator,
    pub trajectory: Trajectory,
    pub add_time: BarBeatTime,
    remove_time: Option<BarBeatTime>,
}

impl GrooveNode {
    pub fn new(
        identifier: NodeIdentifier,
        generator: Generator,
        trajectory: Trajectory,
        add_time: BarBeatTime,
    ) -> Self {
        Self { identifier, generator, trajectory, add_time, remove_time: None }
    }

    pub fn remove_time(&self) -> Option<BarBeatTime> {
        self.remove_time
    }

    /// A remove time earlier than the add time is treated as absent.
    pub fn set_remove_time(&mut self, time: Option<BarBeatTime>) {
        self.remove_time = time.filter(|t| *t >= self.add_time);
    }

    fn add_event(&self) -> Event {
        NodeEvent::new(
            self.add_time,
            NodeData::Add { identifier: self.identifier, trajectory: self.trajectory, generator: self.generator },
        )
        .into()
    }

    fn remove_event(&self, time: BarBeatTime) -> Event {
        NodeEvent::new(time, NodeData::Remove { identifier: self.identifier }).into()
    }
}

/// A loop and the nodes in one pass of it. Node times are relative to
/// `start`.
#[derive(Clone, Debug, PartialEq)]
pub struct GrooveLoop {
    pub identifier: Uuid,
    pub repetitions: i64,
    pub repeat_delay: u64,
    pub start: BarBeatTime,
    pub end: BarBeatTime,
    pub nodes: BTreeMap<NodeIdentifier, GrooveNode>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GrooveTrack {
    pub name: String,
    pub color: TrackColor,
    /// Instrument descriptor, stored without interpretation.
    pub instrument: Value,
    pub nodes: BTreeMap<NodeIdentifier, GrooveNode>,
    pub loops: Vec<GrooveLoop>,
}

/// A whole Groove document.
#[derive(Clone, Debug, PartialEq)]
pub struct GrooveFile {
    pub source: Option<String>,
    pub tracks: Vec<GrooveTrack>,
    pub tempo_changes: BTreeMap<BarBeatTime, f64>,
    pub end_of_file: BarBeatTime,
}

// ---------------------------------------------------------------------------
// Wire mirrors
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentRecord {
    #[serde(default)]
    source: Option<String>,
    tracks: Vec<Value>,
    tempo_changes: BTreeMap<String, f64>,
    end_of_file: BarBeatTime,
}

#[derive(Serialize, Deserialize)]
struct TrackRecord {
    name: String,
    color: TrackColor,
    instrument: Value,
    nodes: Value,
    #[serde(default)]
    loops: Vec<Value>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoopRecord {
    identifier: Uuid,
    repetitions: i64,
    repeat_delay: u64,
    start: BarBeatTime,
    end: BarBeatTime,
    nodes: Value,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

impl GrooveFile {
    pub fn from_json(text: &str) -> Result<Self, FormatError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, FormatError> {
        let value: Value = serde_json::from_slice(bytes)?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self, FormatError> {
        let document: DocumentRecord =
            serde_json::from_value(value).map_err(|e| FormatError::MalformedProject(e.to_string()))?;

        let tracks = document
            .tracks
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match decode_track(value) {
                Ok(track) => Some(track),
                Err(e) => {
                    log::warn!("skipping track {}: {}", index, e);
                    None
                }
            })
            .collect();

        let mut tempo_changes = BTreeMap::new();
        for (key, bpm) in document.tempo_changes {
            match parse_tempo_key(&key) {
                Some(time) => {
                    tempo_changes.insert(time, bpm);
                }
                None => log::warn!("skipping tempo change with key {:?}", key),
            }
        }

        Ok(Self { source: document.source, tracks, tempo_changes, end_of_file: document.end_of_file })
    }
}

fn decode_track(value: Value) -> Result<GrooveTrack, FormatError> {
    let record: TrackRecord =
        serde_json::from_value(value).map_err(|e| FormatError::MalformedProject(e.to_string()))?;
    let loops = record
        .loops
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<LoopRecord>(value) {
            Ok(lp) => Some(GrooveLoop {
                identifier: lp.identifier,
                repetitions: lp.repetitions,
                repeat_delay: lp.repeat_delay,
                start: lp.start,
                end: lp.end,
                nodes: decode_nodes(lp.nodes),
            }),
            Err(e) => {
                log::warn!("skipping loop in track {:?}: {}", record.name, e);
                None
            }
        })
        .collect();
    Ok(GrooveTrack {
        name: record.name,
        color: record.color,
        instrument: record.instrument,
        nodes: decode_nodes(record.nodes),
        loops,
    })
}

/// Nodes may be an object keyed by identifier or a plain array.
fn decode_nodes(value: Value) -> BTreeMap<NodeIdentifier, GrooveNode> {
    let values: Vec<Value> = match value {
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        Value::Array(items) => items,
        other => {
            log::warn!("node collection is neither object nor array: {}", other);
            Vec::new()
        }
    };
    let mut nodes = BTreeMap::new();
    for value in values {
        match serde_json::from_value::<GrooveNode>(value) {
            Ok(mut node) => {
                if node.remove_time.is_some_and(|t| t < node.add_time) {
                    log::debug!("node {} removed before it was added; dropping remove time", node.identifier);
                }
                node.set_remove_time(node.remove_time);
                nodes.insert(node.identifier, node);
            }
            Err(e) => log::warn!("skipping node: {}", e),
        }
    }
    nodes
}

/// Tempo keys are raw bar-beat times; plain tick counts are accepted too.
fn parse_tempo_key(key: &str) -> Option<BarBeatTime> {
    key.parse::<BarBeatTime>()
        .ok()
        .or_else(|| key.parse::<u64>().ok().map(BarBeatTime::from_ticks))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

impl GrooveFile {
    pub fn to_value(&self) -> Result<Value, FormatError> {
        let tracks = self.tracks.iter().map(encode_track).collect::<Result<Vec<_>, _>>()?;
        let document = DocumentRecord {
            source: self.source.clone(),
            tracks,
            tempo_changes: self.tempo_changes.iter().map(|(time, bpm)| (time.raw(), *bpm)).collect(),
            end_of_file: self.end_of_file,
        };
        Ok(serde_json::to_value(document)?)
    }

    pub fn to_json(&self) -> Result<String, FormatError> {
        Ok(serde_json::to_string_pretty(&self.to_value()?)?)
    }
}

fn encode_track(track: &GrooveTrack) -> Result<Value, FormatError> {
    let loops = track
        .loops
        .iter()
        .map(|lp| {
            serde_json::to_value(LoopRecord {
                identifier: lp.identifier,
                repetitions: lp.repetitions,
                repeat_delay: lp.repeat_delay,
                start: lp.start,
                end: lp.end,
                nodes: encode_nodes(&lp.nodes)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let record = TrackRecord {
        name: track.name.clone(),
        color: track.color,
        instrument: track.instrument.clone(),
        nodes: encode_nodes(&track.nodes)?,
        loops,
    };
    Ok(serde_json::to_value(record)?)
}

fn encode_nodes(nodes: &BTreeMap<NodeIdentifier, GrooveNode>) -> Result<Value, serde_json::Error> {
    let mut map = serde_json::Map::new();
    for (identifier, node) in nodes {
        map.insert(identifier.to_string(), serde_json::to_value(node)?);
    }
    Ok(Value::Object(map))
}

// ---------------------------------------------------------------------------
// Sequence conversion
// ---------------------------------------------------------------------------

impl GrooveFile {
    /// Snapshot the node content, loops and tempo map of a sequence.
    /// Channel and text events have no Groove form and are not carried.
    pub fn from_sequence(sequence: &Sequence, source: Option<String>) -> Self {
        let tracks = sequence
            .tracks
            .iter()
            .map(|track| GrooveTrack {
                name: track.name.clone(),
                color: track.color,
                instrument: instrument_value(track.instrument.as_deref()),
                nodes: collect_nodes(&track.events),
                loops: track
                    .loops
                    .iter()
                    .map(|lp| GrooveLoop {
                        identifier: lp.identifier,
                        repetitions: lp.repetitions,
                        repeat_delay: lp.repeat_delay,
                        start: lp.start,
                        end: lp.end,
                        nodes: collect_nodes(&lp.events),
                    })
                    .collect(),
            })
            .collect();

        let mut tempo_changes: BTreeMap<BarBeatTime, f64> = sequence.tempo_changes().into_iter().collect();
        if tempo_changes.is_empty() {
            tempo_changes.insert(BarBeatTime::zero(), pg_ir::DEFAULT_BPM as f64);
        }

        let end_of_file = sequence.end_of_file.max(sequence.content_end());
        Self { source, tracks, tempo_changes, end_of_file }
    }

    pub fn to_sequence(&self) -> Sequence {
        let mut sequence = Sequence::new();
        for (time, bpm) in &self.tempo_changes {
            sequence.set_tempo(*time, *bpm);
        }
        for groove in &self.tracks {
            let mut track = Track::new(&groove.name, groove.color);
            track.instrument = instrument_text(&groove.instrument);
            track.events = node_events(groove.nodes.values(), None);
            for groove_loop in &groove.loops {
                let zero = groove_loop.start.with_ticks(0);
                let mut events = node_events(groove_loop.nodes.values(), Some(groove_loop.identifier));
                events.set_span(zero, zero.shifted(groove_loop.end.ticks_since(&groove_loop.start)));
                let mut lp = Loop::new(groove_loop.identifier, groove_loop.start, events);
                lp.repetitions = groove_loop.repetitions;
                lp.repeat_delay = groove_loop.repeat_delay;
                lp.end = groove_loop.end;
                track.loops.push(lp);
            }
            sequence.tracks.push(track);
        }
        sequence.end_of_file = self.end_of_file;
        sequence.refresh_end_of_file();
        sequence
    }
}

/// Fold add/remove node events into node records.
fn collect_nodes(events: &EventContainer) -> BTreeMap<NodeIdentifier, GrooveNode> {
    let mut nodes: BTreeMap<NodeIdentifier, GrooveNode> = BTreeMap::new();
    for event in events.node_events() {
        match &event.data {
            NodeData::Add { identifier, trajectory, generator } => {
                nodes.insert(*identifier, GrooveNode::new(*identifier, *generator, *trajectory, event.time));
            }
            NodeData::Remove { identifier } => match nodes.get_mut(identifier) {
                Some(node) => node.set_remove_time(Some(event.time)),
                None => log::warn!("remove event for unknown node {}", identifier),
            },
        }
    }
    nodes
}

/// Expand node records into add/remove events. Loop nodes are tagged with
/// the owning loop so they find their way back on reload.
fn node_events<'a>(nodes: impl Iterator<Item = &'a GrooveNode>, owner: Option<Uuid>) -> EventContainer {
    let mut events = EventContainer::new();
    for node in nodes {
        let mut node = node.clone();
        if owner.is_some() {
            node.identifier.loop_identifier = owner;
        }
        events.insert(node.add_event());
        if let Some(time) = node.remove_time {
            events.insert(node.remove_event(time));
        }
    }
    events
}

fn instrument_value(instrument: Option<&str>) -> Value {
    match instrument {
        None => Value::Null,
        Some(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned())),
    }
}

fn instrument_text(instrument: &Value) -> Option<String> {
    match instrument {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pg_ir::{Duration, NoteGenerator, Point, Velocity};
    use serde_json::json;

    fn node(n: u128, add: u64) -> GrooveNode {
        GrooveNode::new(
            NodeIdentifier::new(Uuid::from_u128(n), None),
            Generator::Note(NoteGenerator::new(60 + n as u8, Duration::Quarter, Velocity::Mf)),
            Trajectory::new(Point::new(1.0, 2.0), Point::new(-0.5, 0.5)),
            BarBeatTime::from_ticks(add),
        )
    }

    #[test]
    fn remove_before_add_is_absent() {
        let mut n = node(1, 960);
        n.set_remove_time(Some(BarBeatTime::from_ticks(480)));
        assert_eq!(n.remove_time(), None);
        n.set_remove_time(Some(BarBeatTime::from_ticks(960)));
        assert_eq!(n.remove_time().map(|t| t.ticks()), Some(960));
    }

    #[test]
    fn decoded_remove_before_add_is_dropped() {
        let mut value = serde_json::to_value(node(1, 960)).unwrap();
        value["removeTime"] = json!("0:0.0");
        let nodes = decode_nodes(json!([value]));
        assert_eq!(nodes.values().next().unwrap().remove_time(), None);
    }

    #[test]
    fn node_json_shape() {
        let value = serde_json::to_value(node(1, 0)).unwrap();
        assert_eq!(value["addTime"], json!("0:0/4.0/480@120"));
        assert_eq!(value["removeTime"], Value::Null);
        assert_eq!(value["trajectory"]["position"], json!([1.0, 2.0]));
        assert_eq!(value["identifier"]["nodeIdentifier"], json!(Uuid::from_u128(1).to_string()));
        assert_eq!(value["generator"]["note"]["duration"], json!("quarter"));
    }

    #[test]
    fn tempo_keys_accept_ticks() {
        assert_eq!(parse_tempo_key("960").map(|t| t.ticks()), Some(960));
        assert_eq!(parse_tempo_key("1:0/4.0/480@120").map(|t| t.ticks()), Some(1920));
        assert_eq!(parse_tempo_key("soon"), None);
    }

    #[test]
    fn instrument_text_round_trip() {
        let descriptor = json!({"soundFont": "Grand Piano", "program": 0});
        let text = instrument_text(&descriptor).unwrap();
        assert_eq!(instrument_value(Some(&text)), descriptor);
        assert_eq!(instrument_value(Some("Flute")), json!("Flute"));
        assert_eq!(instrument_text(&Value::Null), None);
    }
}
