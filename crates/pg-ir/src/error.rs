//! Errors raised while building or decoding events.

use thiserror::Error;

/// Failure to interpret event bytes or an event field.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EventError {
    /// A variable-length quantity was truncated or overflowed 64 bits.
    #[error("malformed variable-length quantity")]
    MalformedVarLen,
    /// The payload is not the size the event type requires.
    #[error("invalid length: expected {expected} bytes, found {actual}")]
    InvalidLength { expected: usize, actual: usize },
    /// The status byte or meta tag does not name a known event type.
    #[error("unsupported event type {0:#04x}")]
    UnsupportedEventType(u8),
    /// The bytes have the right size but do not decode to a value.
    #[error("invalid payload: {0}")]
    InvalidPayload(&'static str),
}
