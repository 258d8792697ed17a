//! Minimal driver walking recorded nodes forward and backward.

use std::sync::Arc;

use super::node::{GradientPolicy, OpNode};
use super::values::ValueMap;
use super::{GraphError, GraphResult};
use crate::backend::spec::{ArrayBackend, ArrayLiteral};
use crate::profiling;
use crate::tensor::{TensorId, TensorRef};

/// Executes a recorded sequence of nodes: forward in recording order,
/// backward in reverse, one value map per pass family.
///
/// Topological ordering is the caller's responsibility: nodes run
/// exactly in the order they were recorded. Which inputs receive
/// gradients is likewise the caller's call, expressed through the
/// [`GradientPolicy`] handed to [`GraphExecutor::backward`].
pub struct GraphExecutor<B: ArrayBackend + 'static> {
    backend: Arc<B>,
    nodes: Vec<Box<dyn OpNode<B>>>,
    values: ValueMap<B>,
    gradients: ValueMap<B>,
}

impl<B: ArrayBackend + 'static> GraphExecutor<B> {
    pub fn new(backend: Arc<B>) -> Self {
        GraphExecutor {
            backend,
            nodes: Vec::new(),
            values: ValueMap::new(),
            gradients: ValueMap::new(),
        }
    }

    /// Returns the backend the executor materialises buffers on.
    pub fn backend(&self) -> Arc<B> {
        Arc::clone(&self.backend)
    }

    /// Appends a node; it runs after every previously recorded node.
    pub fn record(&mut self, node: Box<dyn OpNode<B>>) {
        self.nodes.push(node);
    }

    /// Uploads `literal` as the forward value of `tensor`.
    pub fn bind_input(&mut self, tensor: &TensorRef, literal: &ArrayLiteral) -> GraphResult<()> {
        let array = self.backend.materialize(literal)?;
        if let Some(previous) = self.values.insert(tensor.id(), array) {
            self.backend.release(&previous);
        }
        Ok(())
    }

    /// Uploads `literal` as the output gradient of `tensor`, seeding the
    /// backward pass.
    pub fn seed_gradient(&mut self, tensor: &TensorRef, literal: &ArrayLiteral) -> GraphResult<()> {
        let array = self.backend.materialize(literal)?;
        if let Some(previous) = self.gradients.insert(tensor.id(), array) {
            self.backend.release(&previous);
        }
        Ok(())
    }

    /// Runs every node's forward pass in recording order.
    pub fn forward(&mut self) -> GraphResult<()> {
        let _guard = profiling::op_scope("GraphExecutor::forward");
        for node in &self.nodes {
            node.forward(&mut self.values)?;
        }
        Ok(())
    }

    /// Runs every node's backward pass in reverse recording order.
    pub fn backward(&mut self, policy: &dyn GradientPolicy) -> GraphResult<()> {
        let _guard = profiling::op_scope("GraphExecutor::backward");
        for node in self.nodes.iter_mut().rev() {
            node.backward(&self.values, &mut self.gradients, policy)?;
        }
        Ok(())
    }

    /// Reads the forward value recorded for `tensor` back to the host.
    pub fn value(&self, tensor: &TensorRef) -> GraphResult<ArrayLiteral> {
        let array = self
            .values
            .get(tensor.id())
            .ok_or(GraphError::MissingValue(tensor.id()))?;
        Ok(self.backend.to_host(array)?)
    }

    /// Reads the gradient recorded for `tensor` back to the host.
    pub fn gradient(&self, tensor: &TensorRef) -> GraphResult<ArrayLiteral> {
        let array = self
            .gradients
            .get(tensor.id())
            .ok_or(GraphError::MissingGradient(tensor.id()))?;
        Ok(self.backend.to_host(array)?)
    }

    /// Whether a gradient entry was recorded for `id`.
    pub fn has_gradient(&self, id: TensorId) -> bool {
        self.gradients.contains(id)
    }

    /// Releases every node and both value maps.
    ///
    /// Safe to call more than once; also runs from `Drop`.
    pub fn teardown(&mut self) {
        for node in &mut self.nodes {
            node.release();
        }
        self.nodes.clear();
        self.values.release_all(self.backend.as_ref());
        self.gradients.release_all(self.backend.as_ref());
    }
}

impl<B: ArrayBackend + 'static> Drop for GraphExecutor<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
