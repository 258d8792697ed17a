//! Tensor shapes and the scalar classifier driving broadcast dispatch.

use serde::{Deserialize, Serialize};

/// Ordered dimensions of a dense tensor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Builds a shape from `dims`. Rank zero is rejected: a one-element
    /// tensor is written `[1]` (or `[1, 1]`, ...), never `[]`.
    pub fn new<D: Into<Vec<usize>>>(dims: D) -> Self {
        let dims = dims.into();
        assert!(!dims.is_empty(), "shape must have at least one dimension");
        Shape { dims }
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Total element count across all axes.
    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    /// Whether the shape holds exactly one element, at any rank.
    ///
    /// This is the broadcasting classifier. Construction-time validation
    /// and both pass dispatches must agree on it, so it has exactly one
    /// implementation.
    pub fn is_scalar(&self) -> bool {
        self.num_elements() == 1
    }
}
