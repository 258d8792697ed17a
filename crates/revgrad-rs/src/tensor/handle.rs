//! Identity-keyed tensor handles and their issuance.

use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use super::shape::Shape;

/// Identifies one tensor within a graph execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TensorId(pub u32);

/// Identity plus shape descriptor used to key value maps.
///
/// Two refs compare equal only when their ids match; shapes never
/// participate, so distinct tensors of the same shape stay distinct.
#[derive(Debug, Clone)]
pub struct TensorRef {
    id: TensorId,
    shape: Shape,
}

impl TensorRef {
    pub fn id(&self) -> TensorId {
        self.id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }
}

impl PartialEq for TensorRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TensorRef {}

impl Hash for TensorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Issues fresh tensor identities for one graph.
///
/// Graph builders create every ref up front, before any node references
/// it; the arena only guarantees that no id is handed out twice.
#[derive(Debug, Default)]
pub struct TensorArena {
    next_id: u32,
}

impl TensorArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a ref with a previously unused id carrying `shape`.
    pub fn tensor(&mut self, shape: Shape) -> TensorRef {
        let id = TensorId(self.next_id);
        self.next_id += 1;
        TensorRef { id, shape }
    }
}
