//! Track-to-event scheduling.
//!
//! Merges a track's own events with the expansion of each of its loops,
//! producing a time-ordered stream the transport can play. Infinite loops
//! are cut off at a horizon.

use pg_ir::{BarBeatTime, EventContainer, Sequence, Track};

use crate::event_queue::EventQueue;
use crate::loop_events::Expand;

/// Everything `track` plays before `horizon`.
///
/// Loop content replaces the single recorded pass, so the loop slices
/// themselves are only reachable through their expansion.
pub fn schedule_track(track: &Track, horizon: BarBeatTime) -> EventContainer {
    let mut out = EventContainer::new();
    for event in track.events.iter().filter(|e| e.time() < horizon) {
        out.insert(event.clone());
    }
    for lp in &track.loops {
        let before = out.len();
        out.append(lp.expand().take_while(|e| e.time() < horizon));
        log::debug!("loop {} scheduled {} events before {}", lp.identifier, out.len() - before, horizon);
    }
    out
}

/// Tempo events then every track's schedule, merged into one queue.
pub fn schedule_sequence(sequence: &Sequence, horizon: BarBeatTime) -> EventQueue {
    let mut queue = EventQueue::new();
    queue.extend(sequence.tempo.iter().filter(|e| e.time() < horizon).cloned());
    for track in &sequence.tracks {
        queue.extend(schedule_track(track, horizon).iter().cloned());
    }
    queue
}
