//! The operation-node contract dispatched by graph drivers.

use std::collections::HashSet;

use super::{GraphResult, ValueMap};
use crate::backend::spec::ArrayBackend;
use crate::tensor::{TensorId, TensorRef};

/// Capability query owned by the graph driver: whether an input tensor
/// needs a gradient in the current pass.
///
/// Nodes consult the policy per input and write no entry at all, not
/// even a zero, for inputs the policy excludes.
pub trait GradientPolicy {
    fn requires_grad(&self, tensor: TensorId) -> bool;
}

/// Grants a gradient to every input.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainAll;

impl GradientPolicy for TrainAll {
    fn requires_grad(&self, _tensor: TensorId) -> bool {
        true
    }
}

impl GradientPolicy for HashSet<TensorId> {
    fn requires_grad(&self, tensor: TensorId) -> bool {
        self.contains(&tensor)
    }
}

/// One computation step of the graph.
///
/// The driver calls `forward` for every node in topological order, then
/// `backward` in reverse order, then `release` at teardown. `forward`
/// must have populated the node's output entry before `backward` runs;
/// nodes fail loudly when the driver violates that ordering. A failing
/// call leaves both maps untouched; there is no partially written node.
pub trait OpNode<B: ArrayBackend> {
    /// The tensor this node produces.
    fn output(&self) -> &TensorRef;

    /// Computes the output value from the recorded input values.
    fn forward(&self, values: &mut ValueMap<B>) -> GraphResult<()>;

    /// Propagates the output gradient to every input the policy selects.
    fn backward(
        &mut self,
        values: &ValueMap<B>,
        gradients: &mut ValueMap<B>,
        policy: &dyn GradientPolicy,
    ) -> GraphResult<()>;

    /// Disposes privately cached buffers. Calling it again is a no-op.
    fn release(&mut self);
}
