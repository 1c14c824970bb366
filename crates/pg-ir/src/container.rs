//! Time-indexed event storage.

use alloc::collections::btree_map::{self, BTreeMap};
use alloc::vec::Vec;
use core::iter::Flatten;

use crate::event::{Event, MetaData, MetaEvent, ChannelEvent, NodeEvent};
use crate::time::BarBeatTime;

/// Ascending iterator over a container's events.
pub type Iter<'a> = Flatten<btree_map::Values<'a, u64, Vec<Event>>>;

/// Events keyed by absolute tick.
///
/// Events sharing a tick keep their insertion order. Nothing is
/// deduplicated: inserting the same event twice stores it twice.
#[derive(Clone, Debug, Default)]
pub struct EventContainer {
    events: BTreeMap<u64, Vec<Event>>,
    len: usize,
    min_time: Option<BarBeatTime>,
    max_time: Option<BarBeatTime>,
    /// Bounds that hold even when no event sits on them.
    span: Option<(BarBeatTime, BarBeatTime)>,
}

impl EventContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty container whose bounds already cover `lo..=hi`.
    pub fn with_span(lo: BarBeatTime, hi: BarBeatTime) -> Self {
        let mut container = Self::new();
        container.set_span(lo, hi);
        container
    }

    pub fn from_events<I: IntoIterator<Item = Event>>(events: I) -> Self {
        let mut container = Self::new();
        container.append(events);
        container
    }

    /// Insert after any events already at the same time.
    pub fn insert(&mut self, event: Event) {
        let time = event.time();
        self.events.entry(time.ticks()).or_default().push(event);
        self.len += 1;
        self.widen(time);
    }

    pub fn append<I: IntoIterator<Item = Event>>(&mut self, events: I) {
        for event in events {
            self.insert(event);
        }
    }

    /// Remove the first stored event equal to `event` at its time.
    pub fn remove(&mut self, event: &Event) -> bool {
        let key = event.time().ticks();
        let Some(bag) = self.events.get_mut(&key) else {
            return false;
        };
        let Some(index) = bag.iter().position(|e| e == event) else {
            return false;
        };
        bag.remove(index);
        if bag.is_empty() {
            self.events.remove(&key);
        }
        self.len -= 1;
        self.recompute_bounds();
        true
    }

    /// Widen the cached bounds to cover `lo..=hi` without adding events.
    pub fn set_span(&mut self, lo: BarBeatTime, hi: BarBeatTime) {
        let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
        self.span = Some((lo, hi));
        self.widen(lo);
        self.widen(hi);
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.len = 0;
        self.recompute_bounds();
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn min_time(&self) -> Option<BarBeatTime> {
        self.min_time
    }

    pub fn max_time(&self) -> Option<BarBeatTime> {
        self.max_time
    }

    /// `max_time - min_time` in ticks.
    pub fn duration(&self) -> u64 {
        match (self.min_time, self.max_time) {
            (Some(min), Some(max)) => max.ticks_since(&min),
            _ => 0,
        }
    }

    /// Events at exactly `time`, in insertion order.
    pub fn events_at(&self, time: BarBeatTime) -> &[Event] {
        self.events.get(&time.ticks()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Events with `lo <= time < hi`, ascending.
    pub fn range(&self, lo: BarBeatTime, hi: BarBeatTime) -> impl Iterator<Item = &Event> + '_ {
        let (lo, hi) = (lo.ticks(), hi.ticks());
        let bags = if lo < hi { Some(self.events.range(lo..hi)) } else { None };
        bags.into_iter().flatten().flat_map(|(_, bag)| bag.iter())
    }

    pub fn filter<P: FnMut(&Event) -> bool>(&self, mut predicate: P) -> Vec<&Event> {
        self.iter().filter(|e| predicate(e)).collect()
    }

    pub fn iter(&self) -> Iter<'_> {
        self.events.values().flatten()
    }

    /// Copy of the events in `lo..hi`, moved so `lo` becomes zero. The copy
    /// spans the whole range even when no event sits on its edges.
    pub fn capture(&self, lo: BarBeatTime, hi: BarBeatTime) -> EventContainer {
        let zero = lo.with_ticks(0);
        let mut slice = EventContainer::with_span(zero, zero.shifted(hi.ticks_since(&lo)));
        for event in self.range(lo, hi) {
            let time = event.time().with_ticks(event.time().ticks_since(&lo));
            slice.insert(event.clone().with_time(time));
        }
        slice
    }

    pub fn meta_events(&self) -> impl Iterator<Item = &MetaEvent> + '_ {
        self.iter().filter_map(Event::as_meta)
    }

    pub fn channel_events(&self) -> impl Iterator<Item = &ChannelEvent> + '_ {
        self.iter().filter_map(Event::as_channel)
    }

    pub fn node_events(&self) -> impl Iterator<Item = &NodeEvent> + '_ {
        self.iter().filter_map(Event::as_node)
    }

    pub fn tempo_events(&self) -> impl Iterator<Item = &MetaEvent> + '_ {
        self.meta_events().filter(|e| matches!(e.data, MetaData::Tempo { .. }))
    }

    /// Tempo and time-signature events.
    pub fn time_events(&self) -> impl Iterator<Item = &MetaEvent> + '_ {
        self.meta_events()
            .filter(|e| matches!(e.data, MetaData::Tempo { .. } | MetaData::TimeSignature(_)))
    }

    fn widen(&mut self, time: BarBeatTime) {
        if self.min_time.map_or(true, |min| time < min) {
            self.min_time = Some(time);
        }
        if self.max_time.map_or(true, |max| time > max) {
            self.max_time = Some(time);
        }
    }

    fn recompute_bounds(&mut self) {
        self.min_time = None;
        self.max_time = None;
        let first = self.events.values().next().and_then(|bag| bag.first()).map(Event::time);
        let last = self.events.values().next_back().and_then(|bag| bag.first()).map(Event::time);
        let span = self.span;
        for time in first.into_iter().chain(last) {
            self.widen(time);
        }
        if let Some((lo, hi)) = span {
            self.widen(lo);
            self.widen(hi);
        }
    }
}

impl<'a> IntoIterator for &'a EventContainer {
    type Item = &'a Event;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl FromIterator<Event> for EventContainer {
    fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
        Self::from_events(iter)
    }
}

impl Extend<Event> for EventContainer {
    fn extend<I: IntoIterator<Item = Event>>(&mut self, iter: I) {
        self.append(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChannelEvent;

    fn note(ticks: u64, tone: u8) -> Event {
        ChannelEvent::note_on(0, tone, 100, BarBeatTime::from_ticks(ticks)).into()
    }

    fn tones<'a>(events: impl Iterator<Item = &'a Event>) -> Vec<u8> {
        events.map(|e| e.as_channel().unwrap().data1).collect()
    }

    #[test]
    fn iteration_is_time_ordered() {
        let container = EventContainer::from_events([note(960, 3), note(0, 1), note(480, 2)]);
        assert_eq!(tones(container.iter()), [1, 2, 3]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let mut container = EventContainer::new();
        for tone in [10, 11, 12, 13] {
            container.insert(note(480, tone));
        }
        container.insert(note(0, 1));
        assert_eq!(tones(container.events_at(BarBeatTime::from_ticks(480)).iter()), [10, 11, 12, 13]);
        assert_eq!(tones(container.iter()), [1, 10, 11, 12, 13]);
    }

    #[test]
    fn duplicates_are_kept() {
        let container = EventContainer::from_events([note(5, 1), note(5, 1)]);
        assert_eq!(container.len(), 2);
    }

    #[test]
    fn bounds_track_insertions() {
        let mut container = EventContainer::new();
        assert_eq!(container.min_time(), None);
        container.insert(note(500, 1));
        container.insert(note(100, 1));
        container.insert(note(900, 1));
        assert_eq!(container.min_time().unwrap().ticks(), 100);
        assert_eq!(container.max_time().unwrap().ticks(), 900);
        assert_eq!(container.duration(), 800);
    }

    #[test]
    fn range_is_half_open() {
        let container = EventContainer::from_events((0..10).map(|i| note(i * 100, i as u8)));
        let picked = tones(container.range(BarBeatTime::from_ticks(200), BarBeatTime::from_ticks(500)));
        assert_eq!(picked, [2, 3, 4]);
        assert_eq!(container.range(BarBeatTime::from_ticks(500), BarBeatTime::from_ticks(500)).count(), 0);
        assert_eq!(container.range(BarBeatTime::from_ticks(600), BarBeatTime::from_ticks(100)).count(), 0);
    }

    #[test]
    fn remove_takes_first_match_and_updates_bounds() {
        let mut container = EventContainer::from_events([note(0, 1), note(100, 2), note(100, 2), note(200, 3)]);
        assert!(container.remove(&note(100, 2)));
        assert_eq!(container.len(), 3);
        assert!(container.remove(&note(200, 3)));
        assert_eq!(container.max_time().unwrap().ticks(), 100);
        assert!(!container.remove(&note(200, 3)));
    }

    #[test]
    fn capture_rebases_and_spans_range() {
        let container = EventContainer::from_events([note(40, 1), note(150, 2), note(180, 3), note(300, 4)]);
        let slice = container.capture(BarBeatTime::from_ticks(100), BarBeatTime::from_ticks(200));
        assert_eq!(tones(slice.iter()), [2, 3]);
        assert_eq!(slice.iter().map(|e| e.time().ticks()).collect::<Vec<_>>(), [50, 80]);
        assert_eq!(slice.min_time().unwrap().ticks(), 0);
        assert_eq!(slice.max_time().unwrap().ticks(), 100);
        assert_eq!(slice.duration(), 100);
    }

    #[test]
    fn span_survives_removal() {
        let mut container = EventContainer::with_span(BarBeatTime::zero(), BarBeatTime::from_ticks(100));
        container.insert(note(50, 1));
        container.remove(&note(50, 1));
        assert!(container.is_empty());
        assert_eq!(container.duration(), 100);
    }

    #[test]
    fn typed_views() {
        let mut container = EventContainer::new();
        container.insert(note(0, 1));
        container.insert(MetaEvent::new(BarBeatTime::zero(), MetaData::tempo(90.0)).into());
        container.insert(MetaEvent::new(BarBeatTime::zero(), MetaData::Marker("m".into())).into());
        assert_eq!(container.channel_events().count(), 1);
        assert_eq!(container.meta_events().count(), 2);
        assert_eq!(container.tempo_events().count(), 1);
        assert_eq!(container.time_events().count(), 1);
        assert_eq!(container.node_events().count(), 0);
        assert_eq!(container.filter(|e| e.as_meta().is_some()).len(), 2);
    }
}
