//! Elementwise subtraction node `output = lhs - rhs` with scalar broadcasting.

use std::fmt;
use std::sync::Arc;

use crate::backend::spec::ArrayBackend;
use crate::graph::{AllocScope, GradientPolicy, GraphError, GraphResult, OpNode, ValueMap};
use crate::profiling;
use crate::tensor::TensorRef;

/// Operation node computing `output = lhs - rhs`.
///
/// Shape compatibility is decided once, at construction; `forward` and
/// `backward` dispatch on the recorded classification and never re-check.
/// A one-element operand of any rank broadcasts against the other
/// operand; otherwise the operand shapes must match exactly.
pub struct Subtract<B: ArrayBackend + 'static> {
    backend: Arc<B>,
    lhs: TensorRef,
    rhs: TensorRef,
    output: TensorRef,
    lhs_scalar: bool,
    rhs_scalar: bool,
    /// Divisor for the broadcast-scalar gradient, materialised on first
    /// backward use and released exactly once.
    grad_divisor: Option<B::ArrayHandle>,
}

impl<B: ArrayBackend + 'static> Subtract<B> {
    /// Validates operand shapes and builds the node.
    ///
    /// Fails with [`GraphError::ShapeMismatch`] when neither operand is
    /// scalar-shaped and the shapes differ, or when the declared output
    /// shape does not match the result shape.
    pub fn new(
        backend: Arc<B>,
        lhs: TensorRef,
        rhs: TensorRef,
        output: TensorRef,
    ) -> GraphResult<Self> {
        let lhs_scalar = lhs.shape().is_scalar();
        let rhs_scalar = rhs.shape().is_scalar();
        if !lhs_scalar && !rhs_scalar && lhs.shape() != rhs.shape() {
            return Err(GraphError::ShapeMismatch {
                lhs: lhs.shape().clone(),
                rhs: rhs.shape().clone(),
            });
        }

        // Result takes the non-scalar operand's shape; lhs wins when both
        // operands are scalar.
        let result_shape = if lhs_scalar && !rhs_scalar {
            rhs.shape()
        } else {
            lhs.shape()
        };
        if output.shape() != result_shape {
            return Err(GraphError::ShapeMismatch {
                lhs: result_shape.clone(),
                rhs: output.shape().clone(),
            });
        }

        Ok(Subtract {
            backend,
            lhs,
            rhs,
            output,
            lhs_scalar,
            rhs_scalar,
            grad_divisor: None,
        })
    }

    pub fn lhs(&self) -> &TensorRef {
        &self.lhs
    }

    pub fn rhs(&self) -> &TensorRef {
        &self.rhs
    }

    /// Returns the cached gradient divisor, materialising it on first use.
    ///
    /// The divisor is the element count of the output gradient, which by
    /// the pass-ordering invariant equals the output's own element count,
    /// so it can be derived without touching the gradient map.
    fn grad_divisor(&mut self) -> GraphResult<B::ArrayHandle> {
        match &self.grad_divisor {
            Some(divisor) => Ok(divisor.clone()),
            None => {
                let count = self.output.shape().num_elements() as f32;
                let divisor = self.backend.scalar(count)?;
                self.grad_divisor = Some(divisor.clone());
                Ok(divisor)
            }
        }
    }

    fn release_cached(&mut self) {
        if let Some(divisor) = self.grad_divisor.take() {
            self.backend.release(&divisor);
        }
    }
}

impl<B: ArrayBackend + 'static> OpNode<B> for Subtract<B> {
    fn output(&self) -> &TensorRef {
        &self.output
    }

    fn forward(&self, values: &mut ValueMap<B>) -> GraphResult<()> {
        let _guard = profiling::op_scope("Subtract::forward");
        let lhs = values
            .get(self.lhs.id())
            .ok_or(GraphError::MissingValue(self.lhs.id()))?;
        let rhs = values
            .get(self.rhs.id())
            .ok_or(GraphError::MissingValue(self.rhs.id()))?;

        let mut scope = AllocScope::enter(self.backend.as_ref());
        let result = scope.track(self.backend.sub(lhs, rhs)?);
        scope.keep(&result);
        if let Some(previous) = values.insert(self.output.id(), result) {
            self.backend.release(&previous);
        }
        Ok(())
    }

    fn backward(
        &mut self,
        _values: &ValueMap<B>,
        gradients: &mut ValueMap<B>,
        policy: &dyn GradientPolicy,
    ) -> GraphResult<()> {
        let _guard = profiling::op_scope("Subtract::backward");
        let dy = gradients
            .get(self.output.id())
            .ok_or(GraphError::MissingGradient(self.output.id()))?
            .clone();

        let backend = Arc::clone(&self.backend);
        let mut scope = AllocScope::enter(backend.as_ref());

        let lhs_grad = if policy.requires_grad(self.lhs.id()) {
            let grad = if self.lhs_scalar {
                let total = scope.track(backend.sum(&dy)?);
                let divisor = self.grad_divisor()?;
                scope.track(backend.div(&total, &divisor)?)
            } else {
                scope.track(backend.alias(&dy)?)
            };
            Some(grad)
        } else {
            None
        };

        let rhs_grad = if policy.requires_grad(self.rhs.id()) {
            let grad = if self.rhs_scalar {
                let total = scope.track(backend.sum(&dy)?);
                let divisor = self.grad_divisor()?;
                let mean = scope.track(backend.div(&total, &divisor)?);
                scope.track(backend.neg(&mean)?)
            } else {
                scope.track(backend.neg(&dy)?)
            };
            Some(grad)
        } else {
            None
        };

        // Publish only after every kernel has succeeded, so a failing call
        // leaves the gradient map untouched.
        if let Some(grad) = lhs_grad {
            scope.keep(&grad);
            if let Some(previous) = gradients.insert(self.lhs.id(), grad) {
                backend.release(&previous);
            }
        }
        if let Some(grad) = rhs_grad {
            scope.keep(&grad);
            if let Some(previous) = gradients.insert(self.rhs.id(), grad) {
                backend.release(&previous);
            }
        }
        Ok(())
    }

    fn release(&mut self) {
        self.release_cached();
    }
}

impl<B: ArrayBackend + 'static> Drop for Subtract<B> {
    fn drop(&mut self) {
        self.release_cached();
    }
}

impl<B: ArrayBackend + 'static> fmt::Debug for Subtract<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subtract")
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .field("output", &self.output)
            .finish()
    }
}
