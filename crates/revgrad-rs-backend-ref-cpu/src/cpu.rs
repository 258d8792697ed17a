use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use revgrad_rs::backend::spec::{ArrayBackend, ArrayLiteral, BackendError, BackendResult};
use revgrad_rs::tensor::Shape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(u64);

#[derive(Clone)]
struct CpuArray {
    shape: Shape,
    data: Arc<[f32]>,
}

/// Reference backend keeping every live buffer in an explicit registry.
///
/// Buffers are freed only through [`ArrayBackend::release`]; the registry
/// size doubles as the leak detector for the scoped-allocation tests.
/// Aliased handles share their `Arc`-backed storage, so releasing one
/// handle leaves the other intact.
pub struct CpuArrayBackend {
    buffers: Mutex<HashMap<BufferId, CpuArray>>,
    next_id: AtomicU64,
}

impl CpuArrayBackend {
    pub fn new() -> Self {
        CpuArrayBackend {
            buffers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn insert(&self, array: CpuArray) -> BufferId {
        let id = BufferId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.buffers
            .lock()
            .expect("cpu buffer registry poisoned")
            .insert(id, array);
        id
    }

    fn lookup(&self, op: &'static str, id: BufferId) -> BackendResult<CpuArray> {
        self.buffers
            .lock()
            .expect("cpu buffer registry poisoned")
            .get(&id)
            .cloned()
            .ok_or(BackendError::unknown_handle(op))
    }

    fn binary(
        &self,
        op: &'static str,
        lhs: BufferId,
        rhs: BufferId,
        kernel: impl Fn(f32, f32) -> f32,
    ) -> BackendResult<BufferId> {
        let lhs = self.lookup(op, lhs)?;
        let rhs = self.lookup(op, rhs)?;
        let (shape, data) = if lhs.shape == rhs.shape {
            let data = lhs
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(a, b)| kernel(*a, *b))
                .collect::<Vec<_>>();
            (lhs.shape.clone(), data)
        } else if rhs.shape.is_scalar() {
            let b = rhs.data[0];
            let data = lhs.data.iter().map(|a| kernel(*a, b)).collect::<Vec<_>>();
            (lhs.shape.clone(), data)
        } else if lhs.shape.is_scalar() {
            let a = lhs.data[0];
            let data = rhs.data.iter().map(|b| kernel(a, *b)).collect::<Vec<_>>();
            (rhs.shape.clone(), data)
        } else {
            return Err(BackendError::execution(format!(
                "{op} operands have incompatible shapes {:?} and {:?}",
                lhs.shape.dims(),
                rhs.shape.dims()
            )));
        };
        Ok(self.insert(CpuArray {
            shape,
            data: Arc::from(data),
        }))
    }
}

impl Default for CpuArrayBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ArrayBackend for CpuArrayBackend {
    type ArrayHandle = BufferId;

    fn backend_name(&self) -> &str {
        "cpu-ref"
    }

    fn materialize(&self, literal: &ArrayLiteral) -> BackendResult<Self::ArrayHandle> {
        if literal.values.len() != literal.shape.num_elements() {
            return Err(BackendError::execution(format!(
                "literal data length ({}) does not match shape {:?}",
                literal.values.len(),
                literal.shape.dims()
            )));
        }
        Ok(self.insert(CpuArray {
            shape: literal.shape.clone(),
            data: Arc::from(literal.values.clone()),
        }))
    }

    fn to_host(&self, array: &Self::ArrayHandle) -> BackendResult<ArrayLiteral> {
        let stored = self.lookup("to_host", *array)?;
        Ok(ArrayLiteral {
            shape: stored.shape.clone(),
            values: stored.data.to_vec(),
        })
    }

    fn sub(
        &self,
        lhs: &Self::ArrayHandle,
        rhs: &Self::ArrayHandle,
    ) -> BackendResult<Self::ArrayHandle> {
        self.binary("sub", *lhs, *rhs, |a, b| a - b)
    }

    fn neg(&self, array: &Self::ArrayHandle) -> BackendResult<Self::ArrayHandle> {
        let stored = self.lookup("neg", *array)?;
        let data = stored.data.iter().map(|value| -value).collect::<Vec<_>>();
        Ok(self.insert(CpuArray {
            shape: stored.shape.clone(),
            data: Arc::from(data),
        }))
    }

    fn sum(&self, array: &Self::ArrayHandle) -> BackendResult<Self::ArrayHandle> {
        let stored = self.lookup("sum", *array)?;
        let total = stored.data.iter().sum::<f32>();
        Ok(self.insert(CpuArray {
            shape: Shape::new([1]),
            data: Arc::from(vec![total]),
        }))
    }

    fn div(
        &self,
        lhs: &Self::ArrayHandle,
        rhs: &Self::ArrayHandle,
    ) -> BackendResult<Self::ArrayHandle> {
        self.binary("div", *lhs, *rhs, |a, b| a / b)
    }

    fn alias(&self, array: &Self::ArrayHandle) -> BackendResult<Self::ArrayHandle> {
        let stored = self.lookup("alias", *array)?;
        Ok(self.insert(stored))
    }

    fn release(&self, array: &Self::ArrayHandle) {
        self.buffers
            .lock()
            .expect("cpu buffer registry poisoned")
            .remove(array);
    }

    fn live_arrays(&self) -> usize {
        self.buffers
            .lock()
            .expect("cpu buffer registry poisoned")
            .len()
    }
}
