//! Time-sorted queue of scheduled events.

use alloc::vec::Vec;
use pg_ir::{BarBeatTime, Event};

/// Events sorted by time. Events pushed at an equal time stay in push
/// order.
///
/// Playback reads through a cursor that moves forward without removing
/// anything, so a schedule can be replayed after [`reset_cursor`].
///
/// [`reset_cursor`]: EventQueue::reset_cursor
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    events: Vec<Event>,
    /// Next event index to hand out.
    cursor: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { events: Vec::new(), cursor: 0 }
    }

    /// Insert after every queued event at or before `event`'s time.
    pub fn push(&mut self, event: Event) {
        let ticks = event.time().ticks();
        let pos = self.events.partition_point(|e| e.time().ticks() <= ticks);
        self.events.insert(pos, event);
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.get(self.cursor)
    }

    /// Index range of the events at or before `time`, advancing the cursor
    /// past them.
    pub fn drain_until(&mut self, time: BarBeatTime) -> core::ops::Range<usize> {
        let start = self.cursor;
        while self.cursor < self.events.len() && self.events[self.cursor].time() <= time {
            self.cursor += 1;
        }
        start..self.cursor
    }

    /// Event by index, for use with [`drain_until`](Self::drain_until) ranges.
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Remove and return every event at or before `time`.
    pub fn pop_until(&mut self, time: BarBeatTime) -> Vec<Event> {
        let end = self.events.partition_point(|e| e.time() <= time);
        self.cursor = self.cursor.saturating_sub(end);
        self.events.drain(..end).collect()
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, Event> {
        self.events.iter()
    }
}

impl Extend<Event> for EventQueue {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        for event in iter {
            self.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use pg_ir::{MetaData, MetaEvent};

    fn marker(label: &str, ticks: u64) -> Event {
        MetaEvent::new(BarBeatTime::from_ticks(ticks), MetaData::Marker(label.to_string())).into()
    }

    fn label(event: &Event) -> &str {
        event.as_meta().and_then(|m| m.data.text()).unwrap_or("")
    }

    #[test]
    fn events_come_out_in_time_order() {
        let mut queue = EventQueue::new();
        queue.push(marker("c", 960));
        queue.push(marker("a", 0));
        queue.push(marker("b", 480));

        let popped = queue.pop_until(BarBeatTime::from_ticks(960));
        let labels: Vec<&str> = popped.iter().map(label).collect();
        assert_eq!(labels, ["a", "b", "c"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn equal_times_keep_push_order() {
        let mut queue = EventQueue::new();
        queue.push(marker("first", 480));
        queue.push(marker("early", 0));
        queue.push(marker("second", 480));
        queue.push(marker("third", 480));

        let labels: Vec<&str> = queue.iter().map(label).collect();
        assert_eq!(labels, ["early", "first", "second", "third"]);
    }

    #[test]
    fn drain_until_returns_range() {
        let mut queue = EventQueue::new();
        queue.extend([marker("a", 5), marker("b", 10), marker("c", 15)]);

        let range = queue.drain_until(BarBeatTime::from_ticks(12));
        assert_eq!(range, 0..2);
        assert_eq!(label(queue.get(1).unwrap()), "b");
        assert_eq!(label(queue.peek().unwrap()), "c");

        let rest = queue.drain_until(BarBeatTime::from_ticks(100));
        assert_eq!(rest, 2..3);
        assert!(queue.peek().is_none());
    }

    #[test]
    fn reset_cursor_allows_replay() {
        let mut queue = EventQueue::new();
        queue.push(marker("a", 1));

        assert_eq!(queue.drain_until(BarBeatTime::from_ticks(5)).len(), 1);
        assert_eq!(queue.drain_until(BarBeatTime::from_ticks(5)).len(), 0);
        queue.reset_cursor();
        assert_eq!(queue.drain_until(BarBeatTime::from_ticks(5)).len(), 1);
    }
}
