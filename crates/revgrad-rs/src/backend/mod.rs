//! Numeric backend contract consumed by operation nodes.
//!
//! The backend owns all array storage. Nodes refer to buffers through the
//! backend's opaque handle type and free them explicitly, so every
//! allocation has exactly one owner at any point in time.

pub mod spec;

pub use spec::{ArrayBackend, ArrayLiteral, BackendError, BackendResult};
