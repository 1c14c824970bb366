//! Motion data attached to node events.

use alloc::format;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};

use crate::EventError;

/// A 2D point or vector, serialized as `[x, y]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 2]", into = "[f32; 2]")]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

impl From<Point> for [f32; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

/// Starting position and velocity of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub position: Point,
    pub velocity: Point,
}

impl Trajectory {
    pub const fn new(position: Point, velocity: Point) -> Self {
        Self { position, velocity }
    }

    /// ASCII form `{{px, py}, {vx, vy}}`.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_string_form().into_bytes()
    }

    fn to_string_form(&self) -> String {
        format!(
            "{{{{{}, {}}}, {{{}, {}}}}}",
            self.position.x, self.position.y, self.velocity.x, self.velocity.y
        )
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        const BAD: EventError = EventError::InvalidPayload("trajectory");
        let text = core::str::from_utf8(bytes).map_err(|_| BAD)?;
        let inner = text
            .trim()
            .strip_prefix("{{")
            .and_then(|t| t.strip_suffix("}}"))
            .ok_or(BAD)?;
        let (position, velocity) = inner.split_once("}, {").ok_or(BAD)?;
        Ok(Self { position: parse_pair(position).ok_or(BAD)?, velocity: parse_pair(velocity).ok_or(BAD)? })
    }
}

fn parse_pair(text: &str) -> Option<Point> {
    let (x, y) = text.split_once(',')?;
    Some(Point::new(x.trim().parse().ok()?, y.trim().parse().ok()?))
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_form())
    }
}
