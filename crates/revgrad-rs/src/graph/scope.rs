//! Scoped tracking of backend allocations.

use crate::backend::spec::ArrayBackend;

/// Tracks buffers allocated during one `forward` or `backward` call.
///
/// Every buffer a node obtains from the backend is registered with the
/// scope; when the scope drops (on the normal path or on an early error
/// return), every tracked buffer that was not promoted with
/// [`AllocScope::keep`] is released. Only kept buffers survive the call.
pub struct AllocScope<'b, B: ArrayBackend> {
    backend: &'b B,
    tracked: Vec<B::ArrayHandle>,
}

impl<'b, B: ArrayBackend> AllocScope<'b, B> {
    /// Opens a scope over `backend`.
    pub fn enter(backend: &'b B) -> Self {
        AllocScope {
            backend,
            tracked: Vec::new(),
        }
    }

    /// Registers a freshly allocated buffer and hands it back.
    pub fn track(&mut self, array: B::ArrayHandle) -> B::ArrayHandle {
        self.tracked.push(array.clone());
        array
    }

    /// Exempts `array` from cleanup, promoting it to the caller's ownership.
    pub fn keep(&mut self, array: &B::ArrayHandle) {
        if let Some(index) = self.tracked.iter().position(|tracked| tracked == array) {
            self.tracked.swap_remove(index);
        }
    }

    /// Number of buffers the scope would release if dropped now.
    pub fn pending(&self) -> usize {
        self.tracked.len()
    }
}

impl<B: ArrayBackend> Drop for AllocScope<'_, B> {
    fn drop(&mut self) {
        for array in self.tracked.drain(..) {
            self.backend.release(&array);
        }
    }
}
