use revgrad_rs::backend::spec::{ArrayBackend, ArrayLiteral};
use revgrad_rs::graph::AllocScope;
use revgrad_rs_backend_ref_cpu::{BufferId, CpuArrayBackend};

fn upload(backend: &CpuArrayBackend, value: f32) -> BufferId {
    backend
        .materialize(&ArrayLiteral::scalar(value))
        .expect("materialize succeeds")
}

#[test]
fn drop_releases_tracked_buffers() {
    let backend = CpuArrayBackend::new();
    {
        let mut scope = AllocScope::enter(&backend);
        scope.track(upload(&backend, 1.0));
        scope.track(upload(&backend, 2.0));
        assert_eq!(scope.pending(), 2);
        assert_eq!(backend.live_arrays(), 2);
    }
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn keep_exempts_a_buffer_from_cleanup() {
    let backend = CpuArrayBackend::new();
    let kept = {
        let mut scope = AllocScope::enter(&backend);
        scope.track(upload(&backend, 1.0));
        let kept = scope.track(upload(&backend, 2.0));
        scope.keep(&kept);
        assert_eq!(scope.pending(), 1);
        kept
    };
    assert_eq!(backend.live_arrays(), 1);

    let host = backend.to_host(&kept).expect("kept buffer is live");
    assert_eq!(host.values, vec![2.0]);
    backend.release(&kept);
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn early_error_return_still_cleans_up() {
    let backend = CpuArrayBackend::new();

    fn failing_computation(backend: &CpuArrayBackend) -> Result<(), &'static str> {
        let mut scope = AllocScope::enter(backend);
        scope.track(
            backend
                .materialize(&ArrayLiteral::scalar(1.0))
                .map_err(|_| "materialize failed")?,
        );
        Err("kernel failed")
    }

    assert!(failing_computation(&backend).is_err());
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn keep_of_untracked_buffer_is_a_noop() {
    let backend = CpuArrayBackend::new();
    let outside = upload(&backend, 3.0);
    {
        let mut scope = AllocScope::enter(&backend);
        scope.track(upload(&backend, 1.0));
        scope.keep(&outside);
        assert_eq!(scope.pending(), 1);
    }
    assert_eq!(backend.live_arrays(), 1);
    backend.release(&outside);
}
