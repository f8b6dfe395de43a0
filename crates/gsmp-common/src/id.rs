//! State and event identifiers.
//!
//! States are dense indices `0..num_states` of the explored model; events are
//! indices into the model's event declarations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a model state.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct StateId(pub usize);

impl StateId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

impl From<usize> for StateId {
    fn from(index: usize) -> Self {
        StateId(index)
    }
}

/// Index of an event declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub usize);

impl EventId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

impl From<usize> for EventId {
    fn from(index: usize) -> Self {
        EventId(index)
    }
}
