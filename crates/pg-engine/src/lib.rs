//! Playback-side consumers of the perpetual-groove timeline.
//!
//! Expands loops into lazy event streams, merges them with track content
//! for scheduling, and drives callbacks from a transport clock.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod event_queue;
mod loop_events;
pub mod scheduler;
mod transport;

pub use event_queue::EventQueue;
pub use loop_events::{Expand, LoopEvents};
pub use scheduler::{schedule_sequence, schedule_track};
pub use transport::{CallbackId, Transport};
