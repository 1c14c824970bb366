//! Tracks and whole sequences.

use alloc::string::String;
use alloc::vec::Vec;

use crate::color::TrackColor;
use crate::container::EventContainer;
use crate::event::{Event, MetaData, MetaEvent};
use crate::loops::{Loop, LoopMarker};
use crate::time::{BarBeatTime, TimeSignature, DEFAULT_BPM};

// --- Track ---

/// An instrument track: its own events plus the loops recorded on it.
#[derive(Clone, Debug, Default)]
pub struct Track {
    pub name: String,
    pub color: TrackColor,
    pub instrument: Option<String>,
    pub events: EventContainer,
    pub loops: Vec<Loop>,
}

impl Track {
    pub fn new(name: &str, color: TrackColor) -> Self {
        Self { name: String::from(name), color, ..Self::default() }
    }

    /// Latest position touched by an event or loop boundary.
    pub fn end_time(&self) -> BarBeatTime {
        let events_end = self.events.max_time().unwrap_or_default();
        self.loops.iter().map(|lp| lp.end).fold(events_end, BarBeatTime::max)
    }

    pub fn find_loop(&self, identifier: uuid::Uuid) -> Option<&Loop> {
        self.loops.iter().find(|lp| lp.identifier == identifier)
    }

    /// Everything a track chunk should hold, in write order: the name and
    /// instrument metas, the track's events, each loop as begin marker +
    /// one pass + end marker, then end of track.
    pub fn events_for_file(&self) -> EventContainer {
        let zero = BarBeatTime::zero();
        let mut out = EventContainer::new();
        out.insert(MetaEvent::new(zero, MetaData::SequenceName(self.name.clone())).into());
        if let Some(instrument) = &self.instrument {
            out.insert(MetaEvent::new(zero, MetaData::InstrumentName(instrument.clone())).into());
        }
        out.extend(self.events.iter().cloned());
        for lp in &self.loops {
            out.insert(lp.begin_marker());
            for event in &lp.events {
                out.insert(event.clone().with_time(lp.start.shifted(event.time().ticks())));
            }
            out.insert(lp.end_marker());
        }
        let end = out.max_time().unwrap_or(zero);
        out.insert(MetaEvent::new(end, MetaData::EndOfTrack).into());
        out
    }

    /// Rebuild a track from a decoded event stream.
    ///
    /// A start/end marker pair that parses as a loop becomes a [`Loop`]; node
    /// events tagged with that loop's identifier between the markers are
    /// moved into it. Markers that do not parse stay as ordinary events.
    pub fn from_events<I: IntoIterator<Item = Event>>(events: I) -> Self {
        let mut track = Track::default();
        let mut open: Vec<Loop> = Vec::new();

        for event in events {
            if let Some(meta) = event.as_meta() {
                match &meta.data {
                    MetaData::SequenceName(name) if track.name.is_empty() => {
                        track.name = name.clone();
                        continue;
                    }
                    MetaData::InstrumentName(name) if track.instrument.is_none() => {
                        track.instrument = Some(name.clone());
                        continue;
                    }
                    MetaData::EndOfTrack => continue,
                    MetaData::Marker(text) => match LoopMarker::parse(text) {
                        Some(LoopMarker::Start { identifier, repetitions, repeat_delay }) => {
                            let mut lp = Loop::new(identifier, event.time(), EventContainer::new());
                            lp.repetitions = repetitions;
                            lp.repeat_delay = repeat_delay;
                            open.push(lp);
                            continue;
                        }
                        Some(LoopMarker::End { identifier }) => {
                            if let Some(index) = open.iter().position(|lp| lp.identifier == identifier) {
                                let mut lp = open.remove(index);
                                close_loop(&mut lp, event.time());
                                track.loops.push(lp);
                                continue;
                            }
                            log::debug!("end marker for unknown loop {} kept as a marker", identifier);
                        }
                        None => log::debug!("marker {:?} is not a loop boundary", text),
                    },
                    _ => {}
                }
            }

            let loop_id = event.as_node().and_then(|n| n.data.identifier().loop_identifier);
            if let Some(lp) = loop_id.and_then(|id| open.iter_mut().find(|lp| lp.identifier == id)) {
                let time = event.time();
                lp.events.insert(event.with_time(time.with_ticks(time.ticks_since(&lp.start))));
                continue;
            }
            track.events.insert(event);
        }

        for mut lp in open {
            log::debug!("loop {} has no end marker", lp.identifier);
            let end = lp.start.shifted(lp.events.max_time().map_or(0, |t| t.ticks()));
            close_loop(&mut lp, end);
            track.loops.push(lp);
        }
        track
    }
}

fn close_loop(lp: &mut Loop, end: BarBeatTime) {
    lp.end = end.max(lp.start);
    let zero = lp.start.with_ticks(0);
    lp.events.set_span(zero, zero.shifted(lp.end.ticks_since(&lp.start)));
}

// --- Sequence ---

/// A whole song: the tempo track and the instrument tracks.
#[derive(Clone, Debug)]
pub struct Sequence {
    /// Tempo and time-signature events.
    pub tempo: EventContainer,
    pub tracks: Vec<Track>,
    pub end_of_file: BarBeatTime,
}

impl Sequence {
    /// An empty sequence at 120 bpm in 4/4.
    pub fn new() -> Self {
        let zero = BarBeatTime::zero();
        let mut tempo = EventContainer::new();
        tempo.insert(MetaEvent::new(zero, MetaData::TimeSignature(TimeSignature::default())).into());
        tempo.insert(MetaEvent::new(zero, MetaData::tempo(DEFAULT_BPM as f64)).into());
        Self { tempo, tracks: Vec::new(), end_of_file: zero }
    }

    /// A sequence with no tempo events at all.
    pub fn empty() -> Self {
        Self { tempo: EventContainer::new(), tracks: Vec::new(), end_of_file: BarBeatTime::zero() }
    }

    /// Append a track coloured by its position.
    pub fn add_track(&mut self, name: &str) -> &mut Track {
        let color = TrackColor::for_index(self.tracks.len());
        self.tracks.push(Track::new(name, color));
        let last = self.tracks.len() - 1;
        &mut self.tracks[last]
    }

    /// Replace any tempo change at `time` with `bpm`.
    pub fn set_tempo(&mut self, time: BarBeatTime, bpm: f64) {
        let existing: Vec<Event> = self
            .tempo
            .events_at(time)
            .iter()
            .filter(|e| matches!(e.as_meta().map(|m| &m.data), Some(MetaData::Tempo { .. })))
            .cloned()
            .collect();
        for event in &existing {
            self.tempo.remove(event);
        }
        self.tempo.insert(MetaEvent::new(time, MetaData::tempo(bpm)).into());
    }

    /// `(time, bpm)` for every tempo change, in time order.
    pub fn tempo_changes(&self) -> Vec<(BarBeatTime, f64)> {
        self.tempo
            .tempo_events()
            .filter_map(|e| Some((e.time, e.data.bpm()?)))
            .collect()
    }

    /// Tempo in effect at `time`.
    pub fn tempo_at(&self, time: BarBeatTime) -> f64 {
        self.tempo_changes()
            .into_iter()
            .take_while(|(t, _)| *t <= time)
            .last()
            .map_or(DEFAULT_BPM as f64, |(_, bpm)| bpm)
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.tempo
            .time_events()
            .find_map(|e| match e.data {
                MetaData::TimeSignature(sig) => Some(sig),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Latest position across the tempo track and every track.
    pub fn content_end(&self) -> BarBeatTime {
        let tempo_end = self.tempo.max_time().unwrap_or_default();
        self.tracks.iter().map(Track::end_time).fold(tempo_end, BarBeatTime::max)
    }

    /// Move `end_of_file` out to cover all content.
    pub fn refresh_end_of_file(&mut self) {
        self.end_of_file = self.end_of_file.max(self.content_end());
    }

    /// Tempo track contents in write order, closed with end of track.
    pub fn tempo_events_for_file(&self) -> EventContainer {
        let mut out = self.tempo.clone();
        let end = out.max_time().unwrap_or_default();
        out.insert(MetaEvent::new(end, MetaData::EndOfTrack).into());
        out
    }

    /// Keep the timing metas from a decoded tempo track.
    pub fn tempo_from_events<I: IntoIterator<Item = Event>>(events: I) -> EventContainer {
        events
            .into_iter()
            .filter(|e| !matches!(e.as_meta().map(|m| &m.data), Some(MetaData::EndOfTrack)))
            .collect()
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}
