//! Lazy expansion of a loop into its played event stream.

use pg_ir::{BarBeatTime, Event, Iter, Loop};

/// Where a [`LoopEvents`] stream is.
#[derive(Debug)]
enum Phase<'a> {
    NotStarted,
    Emitting { repetition: u64, cursor: Iter<'a> },
    Closing,
    Ended,
}

/// The events a loop plays: its begin marker, every pass of its slice, then
/// its end marker.
///
/// Pass `k` shifts each slice event by `k * (slice duration + repeat delay)`
/// from the loop start. A loop with zero repetitions plays no pass; `n > 0`
/// repetitions play the slice once and then repeat it `n` times. An
/// infinite loop never yields its end marker, so consumers cap what they
/// pull. The end marker sits one repeat delay after the last content event,
/// or on the loop start when nothing played.
///
/// Each stream owns its cursor. Take a fresh one per consumer.
#[derive(Debug)]
pub struct LoopEvents<'a> {
    lp: &'a Loop,
    phase: Phase<'a>,
    last_content: Option<BarBeatTime>,
}

impl<'a> LoopEvents<'a> {
    pub fn new(lp: &'a Loop) -> Self {
        Self { lp, phase: Phase::NotStarted, last_content: None }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Ended)
    }

    /// Current repetition index, while content is being emitted.
    pub fn repetition(&self) -> Option<u64> {
        match self.phase {
            Phase::Emitting { repetition, .. } => Some(repetition),
            _ => None,
        }
    }

    /// Rewind to the begin marker. Refused for an infinite loop that has
    /// already started.
    pub fn restart(&mut self) -> bool {
        if self.lp.is_infinite() && !matches!(self.phase, Phase::NotStarted) {
            return false;
        }
        self.phase = Phase::NotStarted;
        self.last_content = None;
        true
    }

    fn has_another_pass(&self, repetition: u64) -> bool {
        self.lp.is_infinite() || repetition <= self.lp.repetitions as u64
    }
}

/// Absolute time of a slice event in pass `repetition`.
fn time_in_pass(lp: &Loop, repetition: u64, event_time: BarBeatTime) -> BarBeatTime {
    let stride = lp.slice_duration().saturating_add(lp.repeat_delay);
    let offset = repetition.saturating_mul(stride).saturating_add(event_time.ticks());
    lp.start.shifted(offset)
}

impl Iterator for LoopEvents<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let lp = self.lp;
        loop {
            match &mut self.phase {
                Phase::NotStarted => {
                    self.phase = if lp.repetitions == 0 || lp.events.is_empty() {
                        Phase::Closing
                    } else {
                        Phase::Emitting { repetition: 0, cursor: lp.events.iter() }
                    };
                    return Some(lp.begin_marker());
                }
                Phase::Emitting { repetition, cursor } => {
                    if let Some(event) = cursor.next() {
                        let time = time_in_pass(lp, *repetition, event.time());
                        self.last_content = Some(time);
                        return Some(event.clone().with_time(time));
                    }
                    let next = *repetition + 1;
                    if self.has_another_pass(next) {
                        log::trace!("loop {} pass {}", lp.identifier, next);
                        self.phase = Phase::Emitting { repetition: next, cursor: lp.events.iter() };
                    } else {
                        self.phase = Phase::Closing;
                    }
                }
                Phase::Closing => {
                    self.phase = Phase::Ended;
                    let end = self.last_content.map_or(lp.start, |t| t.shifted(lp.repeat_delay));
                    return Some(lp.end_marker_at(end));
                }
                Phase::Ended => return None,
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.lp.is_infinite() && !matches!(self.phase, Phase::Closing | Phase::Ended) && !self.lp.events.is_empty() {
            return (usize::MAX, None);
        }
        let remaining = match &self.phase {
            Phase::NotStarted => {
                let passes = if self.lp.events.is_empty() { 0 } else { self.lp.repetitions as usize + usize::from(self.lp.repetitions > 0) };
                2 + passes.saturating_mul(self.lp.events.len())
            }
            Phase::Emitting { repetition, cursor } => {
                let later = (self.lp.repetitions as u64).saturating_sub(*repetition) as usize;
                cursor.clone().count() + later.saturating_mul(self.lp.events.len()) + 1
            }
            Phase::Closing => 1,
            Phase::Ended => 0,
        };
        (remaining, Some(remaining))
    }
}

impl core::iter::FusedIterator for LoopEvents<'_> {}

/// Loops that can produce their played event stream.
pub trait Expand {
    fn expand(&self) -> LoopEvents<'_>;
}

impl Expand for Loop {
    fn expand(&self) -> LoopEvents<'_> {
        LoopEvents::new(self)
    }
}
