//! Core timeline types for perpetual-groove.
//!
//! This crate defines the values every other crate passes around: musical
//! time, MIDI-style events, the time-indexed event container, loops, and
//! tracks. The format crate reads and writes them, and the engine expands
//! loops into playable streams.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod clock;
mod color;
mod container;
mod error;
mod event;
mod generator;
mod loops;
mod node;
mod time;
mod track;
mod trajectory;
pub mod var_len;

pub use clock::Clock;
pub use color::TrackColor;
pub use container::{EventContainer, Iter};
pub use error::EventError;
pub use event::{ChannelEvent, ChannelKind, Event, MetaData, MetaEvent, NodeEvent, META_STATUS, NODE_META_TYPE};
pub use generator::{
    ChordGenerator, ChordPattern, Duration, Generator, NoteGenerator, Octave, PitchClass, Velocity,
};
pub use loops::{Loop, LoopMarker};
pub use node::{NodeData, NodeIdentifier};
pub use time::{
    BarBeatTime, ParseTimeError, TimeSignature, DEFAULT_BEATS_PER_BAR, DEFAULT_BPM, TICKS_PER_QUARTER,
};
pub use track::{Sequence, Track};
pub use trajectory::{Point, Trajectory};
pub use var_len::VarLenQuantity;

pub use uuid::Uuid;
