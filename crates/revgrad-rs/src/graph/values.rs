//! Associative storage mapping tensor identities to backend buffers.

use std::collections::HashMap;

use crate::backend::spec::ArrayBackend;
use crate::tensor::TensorId;

/// Maps tensor ids to materialised backend buffers.
///
/// One instance holds forward activations, a second holds backward
/// gradients. Each entry exclusively owns the handle it stores until the
/// entry is removed or the map is torn down with
/// [`ValueMap::release_all`].
pub struct ValueMap<B: ArrayBackend> {
    entries: HashMap<TensorId, B::ArrayHandle>,
}

impl<B: ArrayBackend> ValueMap<B> {
    pub fn new() -> Self {
        ValueMap {
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: TensorId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Borrows the buffer recorded for `id`, if any.
    pub fn get(&self, id: TensorId) -> Option<&B::ArrayHandle> {
        self.entries.get(&id)
    }

    /// Records `array` under `id`, returning any displaced handle.
    ///
    /// Ownership of a returned handle transfers to the caller, which must
    /// release it. Node implementations never write the same key twice
    /// within one call.
    pub fn insert(&mut self, id: TensorId, array: B::ArrayHandle) -> Option<B::ArrayHandle> {
        self.entries.insert(id, array)
    }

    /// Removes the entry for `id`, transferring buffer ownership to the caller.
    pub fn remove(&mut self, id: TensorId) -> Option<B::ArrayHandle> {
        self.entries.remove(&id)
    }

    /// Releases every held buffer and empties the map.
    pub fn release_all(&mut self, backend: &B) {
        for (_, array) in self.entries.drain() {
            backend.release(&array);
        }
    }
}

impl<B: ArrayBackend> Default for ValueMap<B> {
    fn default() -> Self {
        Self::new()
    }
}
