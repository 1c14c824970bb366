//! Node events: a generator appearing on or leaving the playing field.

use alloc::vec::Vec;
use core::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generator::Generator;
use crate::trajectory::Trajectory;
use crate::EventError;

/// Identifies a node, and the loop that owns it when there is one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeIdentifier {
    pub node_identifier: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loop_identifier: Option<Uuid>,
}

impl NodeIdentifier {
    pub const fn new(node_identifier: Uuid, loop_identifier: Option<Uuid>) -> Self {
        Self { node_identifier, loop_identifier }
    }

    /// `u32 BE loop-id length`, loop id bytes, `:`, node id bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let loop_bytes = self.loop_identifier.as_ref().map(|id| id.as_bytes().as_slice()).unwrap_or(&[]);
        let mut out = Vec::with_capacity(4 + loop_bytes.len() + 1 + 16);
        out.extend_from_slice(&(loop_bytes.len() as u32).to_be_bytes());
        out.extend_from_slice(loop_bytes);
        out.push(b':');
        out.extend_from_slice(self.node_identifier.as_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        let (len_bytes, rest) = split_at_checked(bytes, 4)?;
        let loop_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let loop_identifier = match loop_len {
            0 => None,
            16 => Some(Uuid::from_slice(&rest[..16.min(rest.len())]).map_err(|_| EventError::InvalidLength {
                expected: 4 + 16 + 1 + 16,
                actual: bytes.len(),
            })?),
            _ => return Err(EventError::InvalidPayload("loop identifier length")),
        };
        let expected = 4 + loop_len + 1 + 16;
        if bytes.len() != expected {
            return Err(EventError::InvalidLength { expected, actual: bytes.len() });
        }
        if rest[loop_len] != b':' {
            return Err(EventError::InvalidPayload("node identifier separator"));
        }
        let node_identifier = Uuid::from_slice(&rest[loop_len + 1..])
            .map_err(|_| EventError::InvalidPayload("node identifier"))?;
        Ok(Self { node_identifier, loop_identifier })
    }
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loop_identifier {
            Some(loop_id) => write!(f, "{}:{}", loop_id, self.node_identifier),
            None => write!(f, "{}", self.node_identifier),
        }
    }
}

/// What a node event does.
#[derive(Clone, Debug, PartialEq)]
pub enum NodeData {
    Add { identifier: NodeIdentifier, trajectory: Trajectory, generator: Generator },
    Remove { identifier: NodeIdentifier },
}

impl NodeData {
    pub fn identifier(&self) -> &NodeIdentifier {
        match self {
            NodeData::Add { identifier, .. } | NodeData::Remove { identifier } => identifier,
        }
    }

    /// Payload of the 0x07 meta event.
    ///
    /// `u32 BE identifier length ++ identifier`, then for additions
    /// `u8 length ++ trajectory ++ u8 length ++ generator`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let id = self.identifier().to_bytes();
        let mut out = Vec::new();
        out.extend_from_slice(&(id.len() as u32).to_be_bytes());
        out.extend_from_slice(&id);
        if let NodeData::Add { trajectory, generator, .. } = self {
            push_short(&mut out, &trajectory.to_bytes());
            push_short(&mut out, &generator.to_bytes());
        }
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EventError> {
        let (len_bytes, rest) = split_at_checked(bytes, 4)?;
        let id_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
        let (id_bytes, rest) = split_at_checked(rest, id_len)?;
        let identifier = NodeIdentifier::from_bytes(id_bytes)?;
        if rest.is_empty() {
            return Ok(NodeData::Remove { identifier });
        }

        let (trajectory_bytes, rest) = take_short(rest)?;
        let (generator_bytes, rest) = take_short(rest)?;
        if !rest.is_empty() {
            return Err(EventError::InvalidLength { expected: bytes.len() - rest.len(), actual: bytes.len() });
        }
        Ok(NodeData::Add {
            identifier,
            trajectory: Trajectory::from_bytes(trajectory_bytes)?,
            generator: Generator::from_bytes(generator_bytes)?,
        })
    }
}

fn split_at_checked(bytes: &[u8], at: usize) -> Result<(&[u8], &[u8]), EventError> {
    if bytes.len() < at {
        return Err(EventError::InvalidLength { expected: at, actual: bytes.len() });
    }
    Ok(bytes.split_at(at))
}

fn push_short(out: &mut Vec<u8>, field: &[u8]) {
    let len = field.len().min(u8::MAX as usize);
    out.push(len as u8);
    out.extend_from_slice(&field[..len]);
}

fn take_short(bytes: &[u8]) -> Result<(&[u8], &[u8]), EventError> {
    let (&len, rest) = bytes.split_first().ok_or(EventError::InvalidLength { expected: 1, actual: 0 })?;
    split_at_checked(rest, len as usize)
}
