//! Transport clock with tick-keyed and predicated callbacks.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use pg_ir::{BarBeatTime, Clock};

type Callback = Box<dyn FnMut(BarBeatTime)>;
type Predicate = Box<dyn FnMut(BarBeatTime) -> bool>;

/// Handle for removing a registered callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallbackId(u64);

struct Predicated {
    id: CallbackId,
    predicate: Predicate,
    callback: Callback,
}

/// Current playback position and the callbacks waiting on it.
///
/// One-shot callbacks fire once when the transport reaches their tick and
/// are then dropped. Predicated callbacks stay registered and fire at every
/// step where their predicate holds.
pub struct Transport {
    clock: Clock,
    /// Ticks between predicate checks while advancing.
    resolution: u64,
    timed: BTreeMap<u64, Vec<(CallbackId, Callback)>>,
    predicated: Vec<Predicated>,
    next_id: u64,
    /// When set, advancing moves the clock without firing anything.
    pub suppress_callbacks: bool,
}

impl Transport {
    pub fn new(clock: Clock) -> Self {
        Self {
            clock,
            resolution: 1,
            timed: BTreeMap::new(),
            predicated: Vec::new(),
            next_id: 0,
            suppress_callbacks: false,
        }
    }

    /// Check predicates every `ticks` instead of every tick.
    pub fn with_resolution(mut self, ticks: u64) -> Self {
        self.resolution = ticks.max(1);
        self
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    pub fn time(&self) -> BarBeatTime {
        self.clock.time()
    }

    pub fn ticks(&self) -> u64 {
        self.clock.ticks
    }

    pub fn seconds(&self) -> f64 {
        self.clock.ticks_to_seconds(self.clock.ticks)
    }

    pub fn set_tempo(&mut self, bpm: f64) {
        self.clock.set_tempo(bpm);
    }

    fn issue_id(&mut self) -> CallbackId {
        self.next_id += 1;
        CallbackId(self.next_id)
    }

    /// Run `callback` once when the transport reaches `time`.
    ///
    /// Returns `None` and drops the callback when `time` is not after the
    /// current position.
    pub fn at(&mut self, time: BarBeatTime, callback: impl FnMut(BarBeatTime) + 'static) -> Option<CallbackId> {
        if time.ticks() <= self.clock.ticks {
            log::debug!("dropping one-shot callback for past time {}", time);
            return None;
        }
        let id = self.issue_id();
        self.timed.entry(time.ticks()).or_default().push((id, Box::new(callback)));
        Some(id)
    }

    /// Run `callback` at every step where `predicate` holds.
    pub fn when(
        &mut self,
        predicate: impl FnMut(BarBeatTime) -> bool + 'static,
        callback: impl FnMut(BarBeatTime) + 'static,
    ) -> CallbackId {
        let id = self.issue_id();
        self.predicated.push(Predicated { id, predicate: Box::new(predicate), callback: Box::new(callback) });
        id
    }

    pub fn is_registered(&self, id: CallbackId) -> bool {
        self.predicated.iter().any(|p| p.id == id)
            || self.timed.values().any(|bag| bag.iter().any(|(cid, _)| *cid == id))
    }

    pub fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.pending();
        self.predicated.retain(|p| p.id != id);
        for bag in self.timed.values_mut() {
            bag.retain(|(cid, _)| *cid != id);
        }
        self.timed.retain(|_, bag| !bag.is_empty());
        self.pending() != before
    }

    /// Number of registered callbacks of either kind.
    pub fn pending(&self) -> usize {
        self.predicated.len() + self.timed.values().map(Vec::len).sum::<usize>()
    }

    pub fn clear_callbacks(&mut self) {
        self.timed.clear();
        self.predicated.clear();
    }

    /// Move back to tick zero. Registered callbacks stay.
    pub fn reset(&mut self) {
        self.clock.ticks = 0;
    }

    /// Move forward to `ticks`, firing due one-shot callbacks in tick order
    /// and checking predicates at each step along the way. Moving backwards
    /// only repositions the clock. A suppressed advance discards the
    /// one-shot callbacks it passes over.
    pub fn advance_to(&mut self, ticks: u64) {
        let mut position = self.clock.ticks;
        if ticks <= position {
            self.clock.ticks = ticks;
            return;
        }
        if self.suppress_callbacks {
            let skipped: Vec<u64> = self.timed.range(position + 1..=ticks).map(|(tick, _)| *tick).collect();
            for tick in skipped {
                self.timed.remove(&tick);
            }
            self.clock.ticks = ticks;
            return;
        }
        while position < ticks {
            let step = (position + self.resolution).min(ticks);
            self.fire_timed(position, step);
            self.clock.ticks = step;
            self.fire_predicated(self.clock.time());
            position = step;
        }
    }

    pub fn advance_by(&mut self, ticks: u64) {
        self.advance_to(self.clock.ticks.saturating_add(ticks));
    }

    /// Advance by a wall-clock span at the current tempo.
    pub fn advance_seconds(&mut self, seconds: f64) {
        let ticks = self.clock.seconds_to_ticks(seconds);
        self.advance_by(ticks);
    }

    /// One-shot callbacks keyed in `(from, to]`.
    fn fire_timed(&mut self, from: u64, to: u64) {
        let due: Vec<u64> = self.timed.range(from + 1..=to).map(|(tick, _)| *tick).collect();
        for tick in due {
            let Some(bag) = self.timed.remove(&tick) else { continue };
            let time = self.clock.time().with_ticks(tick);
            log::trace!("firing {} callbacks at {}", bag.len(), time);
            for (_, mut callback) in bag {
                callback(time);
            }
        }
    }

    fn fire_predicated(&mut self, time: BarBeatTime) {
        for entry in &mut self.predicated {
            if (entry.predicate)(time) {
                (entry.callback)(time);
            }
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(Clock::default())
    }
}

impl core::fmt::Debug for Transport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Transport")
            .field("clock", &self.clock)
            .field("resolution", &self.resolution)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<u64>>>, impl FnMut(BarBeatTime) + Clone + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |time: BarBeatTime| sink.borrow_mut().push(time.ticks()))
    }

    #[test]
    fn one_shot_callbacks_fire_in_tick_order_once() {
        let mut transport = Transport::default();
        let (log, record) = recorder();
        transport.at(BarBeatTime::from_ticks(960), record.clone());
        transport.at(BarBeatTime::from_ticks(480), record.clone());
        transport.at(BarBeatTime::from_ticks(5000), record);

        transport.advance_to(1920);
        assert_eq!(*log.borrow(), vec![480, 960]);
        assert_eq!(transport.pending(), 1);

        transport.reset();
        transport.advance_to(1920);
        assert_eq!(*log.borrow(), vec![480, 960]);
    }

    #[test]
    fn callbacks_for_past_ticks_are_refused() {
        let mut transport = Transport::default();
        let (log, record) = recorder();
        assert_eq!(transport.at(BarBeatTime::zero(), record.clone()), None);
        transport.advance_to(500);
        assert_eq!(transport.at(BarBeatTime::from_ticks(480), record.clone()), None);
        assert_eq!(transport.at(BarBeatTime::from_ticks(500), record.clone()), None);
        assert_eq!(transport.pending(), 0);

        transport.reset();
        transport.advance_to(1000);
        assert!(log.borrow().is_empty());
        assert!(transport.at(BarBeatTime::from_ticks(1001), record).is_some());
    }

    #[test]
    fn predicated_callbacks_fire_on_every_match() {
        let mut transport = Transport::default().with_resolution(120);
        let (log, record) = recorder();
        transport.when(|t| t.subbeat == 0, record);

        transport.advance_to(1920);
        assert_eq!(*log.borrow(), vec![480, 960, 1440, 1920]);
    }

    #[test]
    fn removed_callbacks_do_not_fire() {
        let mut transport = Transport::default();
        let (log, record) = recorder();
        let id = transport.when(|_| true, record.clone());
        let timed = transport.at(BarBeatTime::from_ticks(10), record).unwrap();
        assert!(transport.is_registered(id));
        assert!(transport.remove(id));
        assert!(transport.remove(timed));
        assert!(!transport.remove(timed));
        transport.advance_to(20);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn suppressed_transport_only_moves() {
        let mut transport = Transport::default();
        let (log, record) = recorder();
        transport.at(BarBeatTime::from_ticks(10), record);
        transport.suppress_callbacks = true;
        transport.advance_to(20);
        assert_eq!(transport.ticks(), 20);
        assert_eq!(transport.pending(), 0);

        transport.suppress_callbacks = false;
        transport.reset();
        transport.advance_to(20);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn advance_seconds_uses_tempo() {
        let mut transport = Transport::new(Clock::new(120.0));
        transport.advance_seconds(0.5);
        assert_eq!(transport.ticks(), 480);
        assert!((transport.seconds() - 0.5).abs() < 1e-9);
    }
}
