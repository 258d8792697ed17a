//! Operation-node contract, value storage, and the scoped-allocation
//! discipline that keeps buffer lifetimes deterministic across passes.
//!
//! The pieces compose in one direction: a driver owns two [`ValueMap`]s
//! (activations and gradients), walks [`OpNode`]s forward then backward,
//! and every node routes its backend allocations through an
//! [`AllocScope`] so temporaries never outlive the call that produced
//! them.

pub mod executor;
pub mod node;
pub mod scope;
pub mod values;

pub use executor::GraphExecutor;
pub use node::{GradientPolicy, OpNode, TrainAll};
pub use scope::AllocScope;
pub use values::ValueMap;

use thiserror::Error;

use crate::backend::spec::BackendError;
use crate::tensor::{Shape, TensorId};

/// Errors surfaced by operation nodes to the graph driver.
///
/// None of these are recovered internally: shape mismatches are fatal to
/// node construction, and missing map entries indicate a driver ordering
/// bug. The driver decides whether to abort the whole execution.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("operand shapes {lhs:?} and {rhs:?} are neither equal nor scalar-broadcastable")]
    ShapeMismatch { lhs: Shape, rhs: Shape },
    #[error("no forward value recorded for tensor {0:?}")]
    MissingValue(TensorId),
    #[error("no gradient recorded for tensor {0:?}")]
    MissingGradient(TensorId),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Convenience alias for results returned by nodes and drivers.
pub type GraphResult<T> = Result<T, GraphError>;
