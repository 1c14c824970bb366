//! Loop definitions and their boundary markers.

use alloc::string::ToString;
use core::fmt;

use uuid::Uuid;

use crate::container::EventContainer;
use crate::event::{Event, MetaData, MetaEvent};
use crate::time::BarBeatTime;

/// A captured block of events replayed `repetitions` times, `repeat_delay`
/// ticks apart.
///
/// `events` holds one pass, timed relative to `start`. A negative
/// repetition count repeats forever.
#[derive(Clone, Debug)]
pub struct Loop {
    pub identifier: Uuid,
    pub repetitions: i64,
    pub repeat_delay: u64,
    pub start: BarBeatTime,
    pub end: BarBeatTime,
    pub events: EventContainer,
}

impl Loop {
    /// Repetition count meaning "never stop".
    pub const INFINITE: i64 = -1;

    pub fn new(identifier: Uuid, start: BarBeatTime, events: EventContainer) -> Self {
        let end = start.shifted(events.duration());
        Self { identifier, repetitions: 0, repeat_delay: 0, start, end, events }
    }

    pub fn is_infinite(&self) -> bool {
        self.repetitions < 0
    }

    /// Length of one pass: the captured slice's `max - min`.
    pub fn slice_duration(&self) -> u64 {
        self.events.duration()
    }

    pub fn begin_marker(&self) -> Event {
        let text = LoopMarker::Start {
            identifier: self.identifier,
            repetitions: self.repetitions,
            repeat_delay: self.repeat_delay,
        }
        .to_string();
        MetaEvent::new(self.start, MetaData::Marker(text)).into()
    }

    /// End marker at `time`.
    pub fn end_marker_at(&self, time: BarBeatTime) -> Event {
        let text = LoopMarker::End { identifier: self.identifier }.to_string();
        MetaEvent::new(time, MetaData::Marker(text)).into()
    }

    pub fn end_marker(&self) -> Event {
        self.end_marker_at(self.end)
    }
}

/// Parsed text of a loop boundary marker.
///
/// Start markers read `start(<id>):<repetitions>:<delay>`, end markers
/// `end(<id>)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopMarker {
    Start { identifier: Uuid, repetitions: i64, repeat_delay: u64 },
    End { identifier: Uuid },
}

impl LoopMarker {
    /// `None` for any text that is not a well-formed loop marker.
    pub fn parse(text: &str) -> Option<Self> {
        if let Some(rest) = text.strip_prefix("start(") {
            let (id, rest) = rest.split_once(')')?;
            let (repetitions, delay) = rest.strip_prefix(':')?.split_once(':')?;
            if !is_digits(repetitions.strip_prefix('-').unwrap_or(repetitions)) || !is_digits(delay) {
                return None;
            }
            return Some(LoopMarker::Start {
                identifier: parse_id(id)?,
                repetitions: repetitions.parse().ok()?,
                repeat_delay: delay.parse().ok()?,
            });
        }
        let id = text.strip_prefix("end(")?.strip_suffix(')')?;
        Some(LoopMarker::End { identifier: parse_id(id)? })
    }

    pub fn identifier(&self) -> Uuid {
        match self {
            LoopMarker::Start { identifier, .. } | LoopMarker::End { identifier } => *identifier,
        }
    }

    /// Parse the text of a marker meta event.
    pub fn from_event(event: &Event) -> Option<Self> {
        match &event.as_meta()?.data {
            MetaData::Marker(text) => Self::parse(text),
            _ => None,
        }
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_id(id: &str) -> Option<Uuid> {
    Uuid::parse_str(id).ok()
}

impl fmt::Display for LoopMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buffer = Uuid::encode_buffer();
        match self {
            LoopMarker::Start { identifier, repetitions, repeat_delay } => {
                let id = identifier.hyphenated().encode_upper(&mut buffer);
                write!(f, "start({}):{}:{}", id, repetitions, repeat_delay)
            }
            LoopMarker::End { identifier } => {
                write!(f, "end({})", identifier.hyphenated().encode_upper(&mut buffer))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::string::String;

    const ID: &str = "6F9619FF-8B86-D011-B42D-00C04FC964FF";

    #[test]
    fn start_marker_text() {
        let marker = LoopMarker::parse(&format!("start({}):3:120", ID)).unwrap();
        assert_eq!(
            marker,
            LoopMarker::Start { identifier: Uuid::parse_str(ID).unwrap(), repetitions: 3, repeat_delay: 120 }
        );
        assert_eq!(marker.to_string(), format!("start({}):3:120", ID));
    }

    #[test]
    fn infinite_start_marker() {
        let marker = LoopMarker::parse(&format!("start({}):-1:0", ID)).unwrap();
        assert!(matches!(marker, LoopMarker::Start { repetitions: -1, .. }));
    }

    #[test]
    fn end_marker_text() {
        let marker = LoopMarker::parse(&format!("end({})", ID)).unwrap();
        assert_eq!(marker, LoopMarker::End { identifier: Uuid::parse_str(ID).unwrap() });
        assert_eq!(marker.to_string(), format!("end({})", ID));
    }

    #[test]
    fn malformed_markers_are_not_loops() {
        let bad = [
            String::from("verse"),
            format!("start({})", ID),
            format!("start({}):3", ID),
            format!("start({}):x:1", ID),
            format!("start({}):3:-1", ID),
            format!("start({}):3:1 ", ID),
            String::from("start(not-a-uuid):1:0"),
            String::from("start():1:0"),
            format!("end({}", ID),
            format!("end({})x", ID),
        ];
        for text in &bad {
            assert_eq!(LoopMarker::parse(text), None, "parsed {:?}", text);
        }
    }

    #[test]
    fn markers_from_loop() {
        let mut lp = Loop::new(Uuid::parse_str(ID).unwrap(), BarBeatTime::from_ticks(960), EventContainer::new());
        lp.repetitions = 2;
        lp.repeat_delay = 10;
        let begin = lp.begin_marker();
        assert_eq!(begin.time().ticks(), 960);
        assert_eq!(
            LoopMarker::from_event(&begin),
            Some(LoopMarker::Start { identifier: lp.identifier, repetitions: 2, repeat_delay: 10 })
        );
        assert_eq!(LoopMarker::from_event(&lp.end_marker()), Some(LoopMarker::End { identifier: lp.identifier }));
    }
}
