use std::fmt;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::tensor::Shape;

/// Dense host-side array value: a flat `f32` payload plus the shape it
/// was produced with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayLiteral {
    pub shape: Shape,
    pub values: Vec<f32>,
}

impl ArrayLiteral {
    /// Constructs a literal from raw values, validating the length against the shape.
    pub fn from_vec(shape: Shape, values: Vec<f32>) -> anyhow::Result<Self> {
        if values.len() != shape.num_elements() {
            bail!(
                "array data length ({}) does not match shape {:?}",
                values.len(),
                shape.dims()
            );
        }
        Ok(ArrayLiteral { shape, values })
    }

    /// One-element literal of shape `[1]`.
    pub fn scalar(value: f32) -> Self {
        ArrayLiteral {
            shape: Shape::new([1]),
            values: vec![value],
        }
    }
}

/// Backend error surfaced to higher layers.
#[derive(Debug)]
pub enum BackendError {
    /// A handle did not resolve to a live buffer (stale or already released).
    UnknownHandle { op: &'static str },
    Execution { message: String },
}

impl BackendError {
    pub fn unknown_handle(op: &'static str) -> Self {
        BackendError::UnknownHandle { op }
    }

    pub fn execution(message: impl Into<String>) -> Self {
        BackendError::Execution {
            message: message.into(),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::UnknownHandle { op } => {
                write!(f, "{op} received a handle with no live buffer")
            }
            BackendError::Execution { message } => {
                write!(f, "backend execution failure: {message}")
            }
        }
    }
}

impl std::error::Error for BackendError {}

/// Convenience alias for results returned by backend routines.
pub type BackendResult<T> = Result<T, BackendError>;

/// Numeric backend that owns array storage and evaluates the kernels the
/// operation-node contract consumes.
///
/// Buffers live until [`ArrayBackend::release`] is called on their handle;
/// cloning a handle never clones the buffer behind it. Backends are
/// stateless services apart from the buffer registry and may be called
/// repeatedly with the same operands.
pub trait ArrayBackend: Send + Sync {
    /// Opaque reference to a backend-owned buffer.
    type ArrayHandle: Clone + PartialEq + Send + Sync + 'static;

    /// Returns a human-readable backend identifier (e.g., `"cpu-ref"`).
    fn backend_name(&self) -> &str;

    /// Materialises a buffer from host data.
    fn materialize(&self, literal: &ArrayLiteral) -> BackendResult<Self::ArrayHandle>;

    /// Materialises a one-element buffer holding `value`.
    fn scalar(&self, value: f32) -> BackendResult<Self::ArrayHandle> {
        self.materialize(&ArrayLiteral::scalar(value))
    }

    /// Reads a buffer back into a dense host literal.
    fn to_host(&self, array: &Self::ArrayHandle) -> BackendResult<ArrayLiteral>;

    /// Elementwise subtraction. A one-element operand broadcasts against
    /// the other; otherwise the shapes must match.
    fn sub(
        &self,
        lhs: &Self::ArrayHandle,
        rhs: &Self::ArrayHandle,
    ) -> BackendResult<Self::ArrayHandle>;

    /// Elementwise negation.
    fn neg(&self, array: &Self::ArrayHandle) -> BackendResult<Self::ArrayHandle>;

    /// Sum of all elements, reduced to a one-element buffer.
    fn sum(&self, array: &Self::ArrayHandle) -> BackendResult<Self::ArrayHandle>;

    /// Elementwise division with the same broadcasting rule as [`ArrayBackend::sub`].
    fn div(
        &self,
        lhs: &Self::ArrayHandle,
        rhs: &Self::ArrayHandle,
    ) -> BackendResult<Self::ArrayHandle>;

    /// Returns a fresh handle over the same storage. Either handle can be
    /// released without affecting the other.
    fn alias(&self, array: &Self::ArrayHandle) -> BackendResult<Self::ArrayHandle>;

    /// Releases a buffer. Unknown or already released handles are a no-op.
    fn release(&self, array: &Self::ArrayHandle);

    /// Number of currently allocated buffers.
    fn live_arrays(&self) -> usize;
}
