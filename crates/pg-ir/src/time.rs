//! Bar/beat positions on the sequencer timeline.
//!
//! `BarBeatTime` is the position type carried by every event. Its identity
//! is its tick projection at a fixed 480 ticks per quarter note, so two
//! positions written with different units compare equal when they land on
//! the same tick.

use alloc::format;
use alloc::string::String;
use core::cmp::Ordering;
use core::fmt;
use core::hash::{Hash, Hasher};
use core::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::EventError;

/// Ticks per quarter note (the file division).
pub const TICKS_PER_QUARTER: u32 = 480;

/// Beats per bar unless a time signature says otherwise.
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Tempo assumed when none is given.
pub const DEFAULT_BPM: u16 = 120;

/// Failure to parse a textual bar/beat position.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid bar-beat time {0:?}")]
pub struct ParseTimeError(pub String);

/// A musical position: bar, beat within the bar, subbeat within the beat.
///
/// `beats_per_bar` and `subbeat_divisor` are the units the position was
/// written in; `bpm` is informational and does not affect the tick value.
#[derive(Clone, Copy, Debug)]
pub struct BarBeatTime {
    pub bar: u64,
    pub beat: u32,
    pub subbeat: u32,
    pub beats_per_bar: u32,
    pub subbeat_divisor: u32,
    pub bpm: u16,
}

impl BarBeatTime {
    /// Bar zero, beat zero.
    pub const fn zero() -> Self {
        Self {
            bar: 0,
            beat: 0,
            subbeat: 0,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            subbeat_divisor: TICKS_PER_QUARTER,
            bpm: DEFAULT_BPM,
        }
    }

    /// A position in the default units (4 beats per bar, 480 subbeats).
    /// Out-of-range beats and subbeats carry into the next bar or beat.
    pub fn new(bar: u64, beat: u32, subbeat: u32) -> Self {
        let zero = Self::zero();
        let ticks = (bar * zero.beats_per_bar as u64 + beat as u64) * TICKS_PER_QUARTER as u64
            + subbeat as u64;
        Self::from_ticks(ticks)
    }

    /// The position `ticks` ticks after zero in the default units.
    pub fn from_ticks(ticks: u64) -> Self {
        Self::zero().with_ticks(ticks)
    }

    /// A position at `ticks` expressed in the same units as `self`.
    ///
    /// When the subbeat remainder does not land on a whole subbeat of the
    /// current divisor, the result switches to 480 subbeats per beat so the
    /// tick value is kept exactly.
    pub fn with_ticks(&self, ticks: u64) -> Self {
        let tpq = TICKS_PER_QUARTER as u64;
        let bpb = self.beats_per_bar.max(1) as u64;
        let beats = ticks / tpq;
        let remainder = ticks % tpq;
        let mut divisor = self.subbeat_divisor.max(1) as u64;
        if (remainder * divisor) % tpq != 0 {
            divisor = tpq;
        }
        Self {
            bar: beats / bpb,
            beat: (beats % bpb) as u32,
            subbeat: (remainder * divisor / tpq) as u32,
            beats_per_bar: bpb as u32,
            subbeat_divisor: divisor as u32,
            bpm: self.bpm,
        }
    }

    /// Absolute tick position, saturating at `u64::MAX`.
    pub fn ticks(&self) -> u64 {
        self.checked_ticks().unwrap_or(u64::MAX)
    }

    /// Absolute tick position, `None` when it does not fit a `u64`.
    pub fn checked_ticks(&self) -> Option<u64> {
        let tpq = TICKS_PER_QUARTER as u64;
        let beats = self.bar.checked_mul(self.beats_per_bar as u64)?.checked_add(self.beat as u64)?;
        let sub = self.subbeat as u64 * tpq / self.subbeat_divisor.max(1) as u64;
        beats.checked_mul(tpq)?.checked_add(sub)
    }

    /// This position moved `delta` ticks later, keeping its units.
    pub fn shifted(&self, delta: u64) -> Self {
        self.with_ticks(self.ticks().saturating_add(delta))
    }

    /// Ticks from `earlier` to `self`, zero if `earlier` is later.
    pub fn ticks_since(&self, earlier: &BarBeatTime) -> u64 {
        self.ticks().saturating_sub(earlier.ticks())
    }

    /// Canonical text form, `bar:beat/beatsPerBar.subbeat/divisor@bpm`.
    pub fn raw(&self) -> String {
        format!(
            "{}:{}/{}.{}/{}@{}",
            self.bar, self.beat, self.beats_per_bar, self.subbeat, self.subbeat_divisor, self.bpm
        )
    }
}

impl Default for BarBeatTime {
    fn default() -> Self {
        Self::zero()
    }
}

impl PartialEq for BarBeatTime {
    fn eq(&self, other: &Self) -> bool {
        self.ticks() == other.ticks()
    }
}

impl Eq for BarBeatTime {}

impl PartialOrd for BarBeatTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for BarBeatTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ticks().cmp(&other.ticks())
    }
}

impl Hash for BarBeatTime {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ticks().hash(state);
    }
}

/// One-based display form, e.g. `001:1.001`.
impl fmt::Display for BarBeatTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03}:{}.{:03}", self.bar + 1, self.beat + 1, self.subbeat + 1)
    }
}

impl FromStr for BarBeatTime {
    type Err = ParseTimeError;

    /// Parses the raw form. The `/n` unit suffixes and `@bpm` are optional,
    /// and `╱` is accepted in place of `/`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fail = || ParseTimeError(String::from(s));
        let normalized = s.trim().replace('╱', "/");

        let (position, bpm) = match normalized.split_once('@') {
            Some((position, bpm)) => (position, bpm.parse::<u16>().map_err(|_| fail())?),
            None => (normalized.as_str(), DEFAULT_BPM),
        };
        let (bar, rest) = position.split_once(':').ok_or_else(fail)?;
        let (beat_part, subbeat_part) = rest.split_once('.').ok_or_else(fail)?;
        let (beat, beats_per_bar) = split_units(beat_part, DEFAULT_BEATS_PER_BAR).ok_or_else(fail)?;
        let (subbeat, divisor) = split_units(subbeat_part, TICKS_PER_QUARTER).ok_or_else(fail)?;

        if beats_per_bar == 0 || divisor == 0 || beat >= beats_per_bar || subbeat >= divisor {
            return Err(fail());
        }
        let time = Self {
            bar: bar.parse().map_err(|_| fail())?,
            beat,
            subbeat,
            beats_per_bar,
            subbeat_divisor: divisor,
            bpm,
        };
        // Positions past the end of the tick range have no tick value.
        time.checked_ticks().ok_or_else(fail)?;
        Ok(time)
    }
}

fn split_units(part: &str, default_units: u32) -> Option<(u32, u32)> {
    match part.split_once('/') {
        Some((value, units)) => Some((value.parse().ok()?, units.parse().ok()?)),
        None => Some((part.parse().ok()?, default_units)),
    }
}

impl Serialize for BarBeatTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw())
    }
}

impl<'de> Deserialize<'de> for BarBeatTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RawVisitor;

        impl Visitor<'_> for RawVisitor {
            type Value = BarBeatTime;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a bar-beat time such as \"1:2/4.0/480@120\"")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<BarBeatTime, E> {
                v.parse().map_err(E::custom)
            }
        }

        deserializer.deserialize_str(RawVisitor)
    }
}

/// A time signature as carried by the 0x58 meta event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TimeSignature {
    pub beats_per_bar: u8,
    /// Note value of one beat: 2 for half notes, 4 for quarters, 8 for eighths.
    pub beat_unit: u8,
}

impl TimeSignature {
    /// MIDI clocks per metronome click.
    const CLOCKS_PER_CLICK: u8 = 24;
    /// Notated 32nd notes per MIDI quarter note.
    const THIRTY_SECONDS_PER_QUARTER: u8 = 8;

    pub const fn new(beats_per_bar: u8, beat_unit: u8) -> Self {
        Self { beats_per_bar, beat_unit }
    }

    pub fn bytes(&self) -> [u8; 4] {
        let log2_unit = self.beat_unit.max(1).trailing_zeros() as u8;
        [
            self.beats_per_bar,
            log2_unit,
            Self::CLOCKS_PER_CLICK,
            Self::THIRTY_SECONDS_PER_QUARTER,
        ]
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        let [beats, log2_unit, _, _] = bytes else {
            return Err(EventError::InvalidLength { expected: 4, actual: bytes.len() });
        };
        if *log2_unit > 7 {
            return Err(EventError::InvalidPayload("time signature beat unit"));
        }
        Ok(Self { beats_per_bar: *beats, beat_unit: 1 << log2_unit })
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::new(4, 4)
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_bar, self.beat_unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_default() {
        assert_eq!(BarBeatTime::zero(), BarBeatTime::default());
        assert_eq!(BarBeatTime::zero().ticks(), 0);
    }

    #[test]
    fn tick_projection() {
        let t = BarBeatTime::new(2, 3, 120);
        assert_eq!(t.ticks(), (2 * 4 + 3) * 480 + 120);
        assert_eq!(BarBeatTime::from_ticks(t.ticks()), t);
        assert_eq!((t.bar, t.beat, t.subbeat), (2, 3, 120));
    }

    #[test]
    fn new_carries_overflowing_fields() {
        let t = BarBeatTime::new(0, 5, 480);
        assert_eq!((t.bar, t.beat, t.subbeat), (1, 2, 0));
    }

    #[test]
    fn equality_uses_ticks_across_units() {
        let quarter_units: BarBeatTime = "1:1/4.2/4@120".parse().unwrap();
        let default_units = BarBeatTime::new(1, 1, 240);
        assert_eq!(quarter_units, default_units);
        assert_eq!(quarter_units.ticks(), 5 * 480 + 240);
    }

    #[test]
    fn ordering_is_monotonic_in_ticks() {
        let mut previous = BarBeatTime::zero();
        for ticks in (1..10_000).step_by(37) {
            let t = BarBeatTime::from_ticks(ticks);
            assert!(previous < t);
            previous = t;
        }
    }

    #[test]
    fn raw_round_trip() {
        let t = BarBeatTime::new(12, 2, 17);
        assert_eq!(t.raw(), "12:2/4.17/480@120");
        assert_eq!(t.raw().parse::<BarBeatTime>().unwrap(), t);
    }

    #[test]
    fn parse_accepts_short_and_alternate_forms() {
        let short: BarBeatTime = "3:1.0".parse().unwrap();
        assert_eq!(short, BarBeatTime::new(3, 1, 0));
        let slashed: BarBeatTime = "3:1╱4.0╱480@96".parse().unwrap();
        assert_eq!(slashed, short);
        assert_eq!(slashed.bpm, 96);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", "1", "1:2", "a:b.c", "1:4/4.0", "1:0.480", "1:0/0.0"] {
            assert!(bad.parse::<BarBeatTime>().is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn display_is_one_based() {
        assert_eq!(BarBeatTime::zero().to_string(), "001:1.001");
        assert_eq!(BarBeatTime::new(9, 3, 99).to_string(), "010:4.100");
    }

    #[test]
    fn shifted_keeps_units() {
        let t: BarBeatTime = "0:0/3.0/4".parse().unwrap();
        let later = t.shifted(480 * 4);
        assert_eq!((later.bar, later.beat, later.subbeat), (1, 1, 0));
        assert_eq!(later.beats_per_bar, 3);
        assert_eq!(later.ticks_since(&t), 480 * 4);
        assert_eq!(t.ticks_since(&later), 0);
    }

    #[test]
    fn shifted_is_exact_in_coarse_units() {
        let start: BarBeatTime = "0:1/4.0/4".parse().unwrap();
        assert_eq!(start.ticks(), 480);
        for delta in [0, 50, 120, 150, 160, 479] {
            let moved = start.shifted(delta);
            assert_eq!(moved.ticks(), 480 + delta, "shifted by {}", delta);
        }
        // Whole quarter subbeats stay in the written units.
        let on_grid = start.shifted(120);
        assert_eq!((on_grid.subbeat, on_grid.subbeat_divisor), (1, 4));
        let off_grid = start.shifted(50);
        assert_eq!((off_grid.subbeat, off_grid.subbeat_divisor), (50, 480));
    }

    #[test]
    fn parse_rejects_positions_past_tick_range() {
        let huge = format!("{}:0.0", u64::MAX);
        assert!(huge.parse::<BarBeatTime>().is_err());
        let last_bar = u64::MAX / (4 * 480);
        assert!(format!("{}:0.0", last_bar).parse::<BarBeatTime>().is_ok());
        assert!(format!("{}:0.0", last_bar + 1).parse::<BarBeatTime>().is_err());
    }

    #[test]
    fn hand_built_overflow_saturates() {
        let t = BarBeatTime { bar: u64::MAX, ..BarBeatTime::zero() };
        assert_eq!(t.checked_ticks(), None);
        assert_eq!(t.ticks(), u64::MAX);
    }

    #[test]
    fn time_signature_bytes() {
        let sig = TimeSignature::new(6, 8);
        assert_eq!(sig.bytes(), [6, 3, 24, 8]);
        assert_eq!(TimeSignature::from_bytes(&sig.bytes()), Ok(sig));
        assert_eq!(
            TimeSignature::from_bytes(&[4, 2, 24]),
            Err(EventError::InvalidLength { expected: 4, actual: 3 })
        );
    }
}
