//! MIDI variable-length quantities.
//!
//! Values are split into 7-bit groups, most significant group first.
//! Every byte except the last has its high bit set.

use arrayvec::ArrayVec;

use crate::EventError;

/// Longest encoding of a `u64` (ceil(64 / 7) groups).
pub const MAX_VAR_LEN_BYTES: usize = 10;

/// A non-negative integer in MIDI's variable-length encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarLenQuantity(pub u64);

impl VarLenQuantity {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Minimal encoded form.
    pub fn bytes(self) -> ArrayVec<u8, MAX_VAR_LEN_BYTES> {
        encode(self.0)
    }

    /// Number of bytes in the minimal encoding.
    pub fn encoded_len(self) -> usize {
        let bits = 64 - self.0.leading_zeros() as usize;
        bits.div_ceil(7).max(1)
    }

    /// Decode one quantity from the front of `bytes`, returning it with the
    /// number of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), EventError> {
        decode(bytes).map(|(value, used)| (Self(value), used))
    }
}

impl From<u64> for VarLenQuantity {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<VarLenQuantity> for u64 {
    fn from(q: VarLenQuantity) -> Self {
        q.0
    }
}

/// Encode `value` using the fewest 7-bit groups.
pub fn encode(value: u64) -> ArrayVec<u8, MAX_VAR_LEN_BYTES> {
    let mut out = ArrayVec::new();
    let mut rest = value;
    out.push((rest & 0x7F) as u8);
    rest >>= 7;
    while rest > 0 {
        out.push((rest & 0x7F) as u8 | 0x80);
        rest >>= 7;
    }
    out.reverse();
    out
}

/// Decode one quantity from the front of `bytes`.
///
/// Stops at the first byte with the high bit clear and never looks past it,
/// so concatenated quantities can be read one after another.
pub fn decode(bytes: &[u8]) -> Result<(u64, usize), EventError> {
    let mut value: u64 = 0;
    for (i, &byte) in bytes.iter().enumerate() {
        if value > u64::MAX >> 7 {
            return Err(EventError::MalformedVarLen);
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(EventError::MalformedVarLen)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_encodings() {
        let cases: &[(u64, &[u8])] = &[
            (0, &[0x00]),
            (0x40, &[0x40]),
            (0x7F, &[0x7F]),
            (0x80, &[0x81, 0x00]),
            (0x2000, &[0xC0, 0x00]),
            (0x3FFF, &[0xFF, 0x7F]),
            (0x4000, &[0x81, 0x80, 0x00]),
            (0x1F_FFFF, &[0xFF, 0xFF, 0x7F]),
            (0x20_0000, &[0x81, 0x80, 0x80, 0x00]),
            (0x0FFF_FFFF, &[0xFF, 0xFF, 0xFF, 0x7F]),
        ];
        for &(value, expected) in cases {
            assert_eq!(encode(value).as_slice(), expected, "encode {:#x}", value);
            assert_eq!(decode(expected), Ok((value, expected.len())), "decode {:#x}", value);
        }
    }

    #[test]
    fn encoding_is_minimal() {
        for shift in 0..64 {
            let value = 1u64 << shift;
            let bytes = encode(value);
            assert_eq!(bytes.len(), shift / 7 + 1, "length for 1 << {}", shift);
            assert_ne!(bytes[0], 0x80, "leading empty group for 1 << {}", shift);
            assert_eq!(VarLenQuantity(value).encoded_len(), bytes.len());
        }
    }

    #[test]
    fn extremes_round_trip() {
        for value in [0, 1, 127, 128, u32::MAX as u64, u64::MAX - 1, u64::MAX] {
            let bytes = encode(value);
            assert_eq!(decode(&bytes), Ok((value, bytes.len())));
        }
        assert_eq!(encode(u64::MAX).len(), MAX_VAR_LEN_BYTES);
    }

    #[test]
    fn truncated_input_fails() {
        assert_eq!(decode(&[]), Err(EventError::MalformedVarLen));
        assert_eq!(decode(&[0x81]), Err(EventError::MalformedVarLen));
        assert_eq!(decode(&[0xFF, 0xFF]), Err(EventError::MalformedVarLen));
    }

    #[test]
    fn overflow_fails() {
        let mut bytes = [0xFFu8; 11];
        bytes[10] = 0x7F;
        assert_eq!(decode(&bytes), Err(EventError::MalformedVarLen));
    }

    #[test]
    fn concatenated_stream_decodes_in_sequence() {
        let values = [0u64, 240, 240, 0x4000, 7];
        let mut stream = alloc::vec::Vec::new();
        for &v in &values {
            stream.extend_from_slice(&encode(v));
        }

        let mut pos = 0;
        for &v in &values {
            let (q, used) = VarLenQuantity::decode(&stream[pos..]).unwrap();
            assert_eq!(q.value(), v);
            pos += used;
        }
        assert_eq!(pos, stream.len());
    }

    #[test]
    fn decode_ignores_trailing_bytes() {
        assert_eq!(decode(&[0x81, 0x00, 0xFF, 0xFF]), Ok((0x80, 2)));
    }
}
