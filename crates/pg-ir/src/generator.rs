//! Sound generator descriptors carried by node events.

use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::EventError;

/// Dynamic marking mapped onto MIDI velocity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Velocity {
    Ppp,
    Pp,
    P,
    Mp,
    #[default]
    Mf,
    F,
    Ff,
    Fff,
}

impl Velocity {
    pub const fn midi(self) -> u8 {
        match self {
            Velocity::Ppp => 16,
            Velocity::Pp => 33,
            Velocity::P => 49,
            Velocity::Mp => 64,
            Velocity::Mf => 80,
            Velocity::F => 96,
            Velocity::Ff => 112,
            Velocity::Fff => 126,
        }
    }

    /// Nearest dynamic for a raw velocity. Ranges do not overlap.
    pub const fn from_midi(value: u8) -> Self {
        match value {
            0..=22 => Velocity::Ppp,
            23..=40 => Velocity::Pp,
            41..=51 => Velocity::P,
            52..=70 => Velocity::Mp,
            71..=88 => Velocity::Mf,
            89..=102 => Velocity::F,
            103..=119 => Velocity::Ff,
            _ => Velocity::Fff,
        }
    }
}

/// Note value, measured in quarter-note beats.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Duration {
    DoubleWhole,
    DottedWhole,
    Whole,
    DottedHalf,
    Half,
    DottedQuarter,
    Quarter,
    DottedEighth,
    #[default]
    Eighth,
    DottedSixteenth,
    Sixteenth,
    DottedThirtySecond,
    ThirtySecond,
    DottedSixtyFourth,
    SixtyFourth,
    DottedHundredTwentyEighth,
    HundredTwentyEighth,
    DottedTwoHundredFiftySixth,
    TwoHundredFiftySixth,
}

impl Duration {
    pub const ALL: [Duration; 19] = [
        Duration::DoubleWhole,
        Duration::DottedWhole,
        Duration::Whole,
        Duration::DottedHalf,
        Duration::Half,
        Duration::DottedQuarter,
        Duration::Quarter,
        Duration::DottedEighth,
        Duration::Eighth,
        Duration::DottedSixteenth,
        Duration::Sixteenth,
        Duration::DottedThirtySecond,
        Duration::ThirtySecond,
        Duration::DottedSixtyFourth,
        Duration::SixtyFourth,
        Duration::DottedHundredTwentyEighth,
        Duration::HundredTwentyEighth,
        Duration::DottedTwoHundredFiftySixth,
        Duration::TwoHundredFiftySixth,
    ];

    /// Length in quarter-note beats.
    pub fn beats(self) -> f64 {
        match self {
            Duration::DoubleWhole => 8.0,
            Duration::DottedWhole => 6.0,
            Duration::Whole => 4.0,
            Duration::DottedHalf => 3.0,
            Duration::Half => 2.0,
            Duration::DottedQuarter => 1.5,
            Duration::Quarter => 1.0,
            Duration::DottedEighth => 0.75,
            Duration::Eighth => 0.5,
            Duration::DottedSixteenth => 0.375,
            Duration::Sixteenth => 0.25,
            Duration::DottedThirtySecond => 0.1875,
            Duration::ThirtySecond => 0.125,
            Duration::DottedSixtyFourth => 0.09375,
            Duration::SixtyFourth => 0.0625,
            Duration::DottedHundredTwentyEighth => 0.046875,
            Duration::HundredTwentyEighth => 0.03125,
            Duration::DottedTwoHundredFiftySixth => 0.0234375,
            Duration::TwoHundredFiftySixth => 0.015625,
        }
    }

    /// Length in ticks at the clock's resolution, rounded to the nearest tick.
    pub fn ticks(self, clock: &Clock) -> u64 {
        libm::round(self.beats() * clock.ticks_per_quarter as f64) as u64
    }

    /// Wall-clock length at the clock's tempo.
    pub fn seconds(self, clock: &Clock) -> f64 {
        self.beats() * 60.0 / clock.bpm
    }

    /// Name used in generator bytes and JSON.
    pub const fn name(self) -> &'static str {
        match self {
            Duration::DoubleWhole => "doubleWhole",
            Duration::DottedWhole => "dottedWhole",
            Duration::Whole => "whole",
            Duration::DottedHalf => "dottedHalf",
            Duration::Half => "half",
            Duration::DottedQuarter => "dottedQuarter",
            Duration::Quarter => "quarter",
            Duration::DottedEighth => "dottedEighth",
            Duration::Eighth => "eighth",
            Duration::DottedSixteenth => "dottedSixteenth",
            Duration::Sixteenth => "sixteenth",
            Duration::DottedThirtySecond => "dottedThirtySecond",
            Duration::ThirtySecond => "thirtySecond",
            Duration::DottedSixtyFourth => "dottedSixtyFourth",
            Duration::SixtyFourth => "sixtyFourth",
            Duration::DottedHundredTwentyEighth => "dottedHundredTwentyEighth",
            Duration::HundredTwentyEighth => "hundredTwentyEighth",
            Duration::DottedTwoHundredFiftySixth => "dottedTwoHundredFiftySixth",
            Duration::TwoHundredFiftySixth => "twoHundredFiftySixth",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.name() == name)
    }
}

/// Octave number in scientific pitch notation, -1 through 9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub struct Octave(i8);

impl Octave {
    pub const MIN: i8 = -1;
    pub const MAX: i8 = 9;

    pub const fn new(value: i8) -> Option<Self> {
        if value >= Self::MIN && value <= Self::MAX {
            Some(Self(value))
        } else {
            None
        }
    }

    pub const fn value(self) -> i8 {
        self.0
    }
}

impl Default for Octave {
    fn default() -> Self {
        Self(4)
    }
}

impl TryFrom<i8> for Octave {
    type Error = EventError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(EventError::InvalidPayload("octave out of range"))
    }
}

impl From<Octave> for i8 {
    fn from(octave: Octave) -> Self {
        octave.0
    }
}

/// One of the twelve pitch classes, C = 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    #[default]
    C,
    #[serde(rename = "C#")]
    CSharp,
    D,
    #[serde(rename = "D#")]
    DSharp,
    E,
    F,
    #[serde(rename = "F#")]
    FSharp,
    G,
    #[serde(rename = "G#")]
    GSharp,
    A,
    #[serde(rename = "A#")]
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    pub const fn semitone(self) -> u8 {
        self as u8
    }

    pub fn from_semitone(semitone: u8) -> Self {
        Self::ALL[(semitone % 12) as usize]
    }
}

/// Chord shapes as semitone offsets from the root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChordPattern {
    #[default]
    Major,
    Minor,
    Augmented,
    Diminished,
    Suspended2,
    Suspended4,
    Major6,
    Minor6,
    Major7,
    Minor7,
    Dominant7,
    Diminished7,
    HalfDiminished7,
    Add9,
}

impl ChordPattern {
    pub const ALL: [ChordPattern; 14] = [
        ChordPattern::Major,
        ChordPattern::Minor,
        ChordPattern::Augmented,
        ChordPattern::Diminished,
        ChordPattern::Suspended2,
        ChordPattern::Suspended4,
        ChordPattern::Major6,
        ChordPattern::Minor6,
        ChordPattern::Major7,
        ChordPattern::Minor7,
        ChordPattern::Dominant7,
        ChordPattern::Diminished7,
        ChordPattern::HalfDiminished7,
        ChordPattern::Add9,
    ];

    pub const fn intervals(self) -> &'static [u8] {
        match self {
            ChordPattern::Major => &[0, 4, 7],
            ChordPattern::Minor => &[0, 3, 7],
            ChordPattern::Augmented => &[0, 4, 8],
            ChordPattern::Diminished => &[0, 3, 6],
            ChordPattern::Suspended2 => &[0, 2, 7],
            ChordPattern::Suspended4 => &[0, 5, 7],
            ChordPattern::Major6 => &[0, 4, 7, 9],
            ChordPattern::Minor6 => &[0, 3, 7, 9],
            ChordPattern::Major7 => &[0, 4, 7, 11],
            ChordPattern::Minor7 => &[0, 3, 7, 10],
            ChordPattern::Dominant7 => &[0, 4, 7, 10],
            ChordPattern::Diminished7 => &[0, 3, 6, 9],
            ChordPattern::HalfDiminished7 => &[0, 3, 6, 10],
            ChordPattern::Add9 => &[0, 4, 7, 14],
        }
    }

    pub const fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }
}

/// A single note.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NoteGenerator {
    pub channel: u8,
    /// MIDI note number.
    pub tone: u8,
    pub duration: Duration,
    pub velocity: Velocity,
}

impl NoteGenerator {
    pub fn new(tone: u8, duration: Duration, velocity: Velocity) -> Self {
        Self { channel: 0, tone: tone.min(127), duration, velocity }
    }

    pub fn octave(&self) -> Octave {
        Octave((self.tone / 12) as i8 - 1)
    }

    pub fn pitch_class(&self) -> PitchClass {
        PitchClass::from_semitone(self.tone)
    }
}

impl Default for NoteGenerator {
    /// Middle C eighth note, mezzo-forte.
    fn default() -> Self {
        Self::new(60, Duration::Eighth, Velocity::Mf)
    }
}

/// A chord built from a root, a shape, and the octave of the root.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChordGenerator {
    pub channel: u8,
    pub root: PitchClass,
    pub pattern: ChordPattern,
    pub octave: Octave,
    pub duration: Duration,
    pub velocity: Velocity,
}

impl ChordGenerator {
    /// The chord's notes, lowest first. Notes above MIDI 127 are dropped.
    pub fn notes(&self) -> Vec<NoteGenerator> {
        let base = (self.octave.value() as i16 + 1) * 12 + self.root.semitone() as i16;
        self.pattern
            .intervals()
            .iter()
            .map(|&interval| base + interval as i16)
            .filter(|tone| (0..=127).contains(tone))
            .map(|tone| NoteGenerator {
                channel: self.channel,
                tone: tone as u8,
                duration: self.duration,
                velocity: self.velocity,
            })
            .collect()
    }
}

/// What a node plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Generator {
    Note(NoteGenerator),
    Chord(ChordGenerator),
}

const CHORD_FLAG: u8 = 0x80;

impl Generator {
    pub fn channel(&self) -> u8 {
        match self {
            Generator::Note(note) => note.channel,
            Generator::Chord(chord) => chord.channel,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Generator::Note(note) => note.duration,
            Generator::Chord(chord) => chord.duration,
        }
    }

    /// Every note this generator sounds.
    pub fn notes(&self) -> Vec<NoteGenerator> {
        match self {
            Generator::Note(note) => alloc::vec![*note],
            Generator::Chord(chord) => chord.notes(),
        }
    }

    /// Note: `[channel, tone, velocity] ++ duration name`.
    /// Chord: `[0x80 | channel, root, pattern, octave + 1, velocity] ++ duration name`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self {
            Generator::Note(note) => {
                out.extend_from_slice(&[note.channel & 0x0F, note.tone & 0x7F, note.velocity.midi()]);
                out.extend_from_slice(note.duration.name().as_bytes());
            }
            Generator::Chord(chord) => {
                out.extend_from_slice(&[
                    CHORD_FLAG | (chord.channel & 0x0F),
                    chord.root.semitone(),
                    chord.pattern.index(),
                    (chord.octave.value() + 1) as u8,
                    chord.velocity.midi(),
                ]);
                out.extend_from_slice(chord.duration.name().as_bytes());
            }
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        let first = *bytes.first().ok_or(EventError::InvalidLength { expected: 3, actual: 0 })?;
        let fixed = if first & CHORD_FLAG == 0 { 3 } else { 5 };
        if bytes.len() < fixed {
            return Err(EventError::InvalidLength { expected: fixed, actual: bytes.len() });
        }
        let name = core::str::from_utf8(&bytes[fixed..])
            .map_err(|_| EventError::InvalidPayload("duration name is not utf-8"))?;
        let duration = Duration::from_name(name).ok_or(EventError::InvalidPayload("unknown duration"))?;

        if fixed == 3 {
            return Ok(Generator::Note(NoteGenerator {
                channel: first & 0x0F,
                tone: bytes[1] & 0x7F,
                duration,
                velocity: Velocity::from_midi(bytes[2]),
            }));
        }
        let octave = i8::try_from(bytes[3] as i16 - 1)
            .ok()
            .and_then(Octave::new)
            .ok_or(EventError::InvalidPayload("octave out of range"))?;
        Ok(Generator::Chord(ChordGenerator {
            channel: first & 0x0F,
            root: PitchClass::from_semitone(bytes[1]),
            pattern: ChordPattern::from_index(bytes[2]).ok_or(EventError::InvalidPayload("unknown chord pattern"))?,
            octave,
            duration,
            velocity: Velocity::from_midi(bytes[4]),
        }))
    }
}

impl Default for Generator {
    fn default() -> Self {
        Generator::Note(NoteGenerator::default())
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Generator::Note(n) => write!(f, "note {} {:?} {}", n.tone, n.velocity, n.duration.name()),
            Generator::Chord(c) => write!(
                f,
                "chord {:?}{} {:?} {:?} {}",
                c.root,
                c.octave.value(),
                c.pattern,
                c.velocity,
                c.duration.name()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn velocity_partition_has_no_overlap() {
        let mut previous = Velocity::from_midi(0);
        let mut changes = 0;
        for v in 1..=127u8 {
            let current = Velocity::from_midi(v);
            if current != previous {
                changes += 1;
            }
            previous = current;
        }
        assert_eq!(changes, 7);
        assert_eq!(Velocity::from_midi(81), Velocity::Mf);
        assert_eq!(Velocity::from_midi(89), Velocity::F);
    }

    #[test]
    fn velocity_midi_maps_back_to_itself() {
        for v in [
            Velocity::Ppp,
            Velocity::Pp,
            Velocity::P,
            Velocity::Mp,
            Velocity::Mf,
            Velocity::F,
            Velocity::Ff,
            Velocity::Fff,
        ] {
            assert_eq!(Velocity::from_midi(v.midi()), v);
        }
    }

    #[test]
    fn duration_seconds_follow_clock() {
        let clock = Clock::new(120.0);
        assert!((Duration::Quarter.seconds(&clock) - 0.5).abs() < 1e-12);
        assert!((Duration::DottedHalf.seconds(&Clock::new(60.0)) - 3.0).abs() < 1e-12);
        assert_eq!(Duration::Eighth.ticks(&clock), 240);
        assert_eq!(Duration::TwoHundredFiftySixth.ticks(&clock), 8);
    }

    #[test]
    fn duration_names_resolve() {
        for d in Duration::ALL {
            assert_eq!(Duration::from_name(d.name()), Some(d));
        }
        assert_eq!(Duration::from_name("breve"), None);
    }

    #[test]
    fn octave_bounds() {
        assert!(Octave::new(-1).is_some());
        assert!(Octave::new(9).is_some());
        assert!(Octave::new(-2).is_none());
        assert!(Octave::new(10).is_none());
    }

    #[test]
    fn note_generator_bytes() {
        let g = Generator::Note(NoteGenerator {
            channel: 2,
            tone: 64,
            duration: Duration::Quarter,
            velocity: Velocity::F,
        });
        let bytes = g.to_bytes();
        assert_eq!(&bytes[..3], &[2, 64, 96]);
        assert_eq!(&bytes[3..], b"quarter");
        assert_eq!(Generator::from_bytes(&bytes), Ok(g));
    }

    #[test]
    fn chord_generator_bytes() {
        let g = Generator::Chord(ChordGenerator {
            channel: 1,
            root: PitchClass::A,
            pattern: ChordPattern::Minor7,
            octave: Octave::new(3).unwrap(),
            duration: Duration::Half,
            velocity: Velocity::Pp,
        });
        let bytes = g.to_bytes();
        assert_eq!(&bytes[..5], &[0x81, 9, 9, 4, 33]);
        assert_eq!(Generator::from_bytes(&bytes), Ok(g));
    }

    #[test]
    fn generator_bytes_reject_short_or_unknown() {
        assert!(matches!(Generator::from_bytes(&[0, 60]), Err(EventError::InvalidLength { .. })));
        assert!(matches!(
            Generator::from_bytes(b"\x00\x3c\x50crotchet"),
            Err(EventError::InvalidPayload(_))
        ));
    }

    #[test]
    fn chord_expands_from_root_octave() {
        let chord = ChordGenerator {
            root: PitchClass::C,
            pattern: ChordPattern::Major,
            octave: Octave::new(4).unwrap(),
            ..ChordGenerator::default()
        };
        let tones: Vec<u8> = chord.notes().iter().map(|n| n.tone).collect();
        assert_eq!(tones, [60, 64, 67]);
    }

    #[test]
    fn chord_drops_notes_above_range() {
        let chord = ChordGenerator {
            root: PitchClass::G,
            pattern: ChordPattern::Add9,
            octave: Octave::new(9).unwrap(),
            ..ChordGenerator::default()
        };
        let tones: Vec<u8> = chord.notes().iter().map(|n| n.tone).collect();
        assert_eq!(tones, [127]);
    }

    #[test]
    fn note_octave_and_pitch() {
        let n = NoteGenerator::default();
        assert_eq!(n.octave().value(), 4);
        assert_eq!(n.pitch_class(), PitchClass::C);
    }
}
