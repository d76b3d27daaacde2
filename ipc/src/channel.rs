//! Channel identity and endpoint sides

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a dynamically paired channel
///
/// Identifiers are allocated by a channel factory from a counter scoped to
/// that factory. They only mean something to the factory that minted them;
/// modules pass them around as opaque values to rendezvous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelIdentifier(u64);

impl ChannelIdentifier {
    /// Creates an identifier from its raw value
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Returns the identifier that follows this one
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for ChannelIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

/// One side of a bidirectional channel
///
/// The input side is handed out by `create_channel`, the output side by the
/// matching `bind_channel`. A message sent on one side is observed on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelSide {
    /// Side returned to the creator
    Input,
    /// Side returned to the binder
    Output,
}

impl ChannelSide {
    /// Returns the opposite side
    pub fn peer(&self) -> ChannelSide {
        match self {
            ChannelSide::Input => ChannelSide::Output,
            ChannelSide::Output => ChannelSide::Input,
        }
    }

    /// Returns a stable index for per-side tables
    pub fn index(&self) -> usize {
        match self {
            ChannelSide::Input => 0,
            ChannelSide::Output => 1,
        }
    }
}

impl fmt::Display for ChannelSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelSide::Input => f.write_str("input"),
            ChannelSide::Output => f.write_str("output"),
        }
    }
}
