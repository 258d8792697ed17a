use revgrad_rs::backend::spec::{ArrayBackend, ArrayLiteral, BackendError};
use revgrad_rs::tensor::Shape;
use revgrad_rs_backend_ref_cpu::{BufferId, CpuArrayBackend};

fn upload(backend: &CpuArrayBackend, dims: &[usize], values: &[f32]) -> BufferId {
    let literal = ArrayLiteral::from_vec(Shape::new(dims.to_vec()), values.to_vec())
        .expect("literal matches shape");
    backend.materialize(&literal).expect("materialize succeeds")
}

#[test]
fn materialize_roundtrips_through_to_host() {
    let backend = CpuArrayBackend::new();
    let handle = upload(&backend, &[2, 2], &[1.0, 2.0, 3.0, 4.0]);

    let host = backend.to_host(&handle).unwrap();
    assert_eq!(host.shape.dims(), &[2, 2]);
    assert_eq!(host.values, vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn materialize_rejects_length_mismatch() {
    let backend = CpuArrayBackend::new();
    let literal = ArrayLiteral {
        shape: Shape::new([3]),
        values: vec![1.0],
    };
    let err = backend.materialize(&literal).unwrap_err();
    assert!(matches!(err, BackendError::Execution { .. }));
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn sub_broadcasts_one_element_operands() {
    let backend = CpuArrayBackend::new();
    let full = upload(&backend, &[3], &[1.0, 2.0, 3.0]);
    let scalar = upload(&backend, &[1], &[2.0]);

    let left = backend.sub(&scalar, &full).unwrap();
    assert_eq!(backend.to_host(&left).unwrap().values, vec![1.0, 0.0, -1.0]);

    let right = backend.sub(&full, &scalar).unwrap();
    assert_eq!(backend.to_host(&right).unwrap().values, vec![-1.0, 0.0, 1.0]);
}

#[test]
fn sub_rejects_incompatible_shapes() {
    let backend = CpuArrayBackend::new();
    let a = upload(&backend, &[2], &[1.0, 2.0]);
    let b = upload(&backend, &[3], &[1.0, 2.0, 3.0]);

    let err = backend.sub(&a, &b).unwrap_err();
    assert!(matches!(err, BackendError::Execution { .. }));
}

#[test]
fn scalar_broadcast_keeps_the_full_operand_shape() {
    let backend = CpuArrayBackend::new();
    let full = upload(&backend, &[2, 2], &[4.0, 6.0, 8.0, 10.0]);
    let scalar = upload(&backend, &[1], &[2.0]);

    let quotient = backend.div(&full, &scalar).unwrap();
    let host = backend.to_host(&quotient).unwrap();
    assert_eq!(host.shape.dims(), &[2, 2]);
    assert_eq!(host.values, vec![2.0, 3.0, 4.0, 5.0]);
}

#[test]
fn sum_reduces_to_a_single_element() {
    let backend = CpuArrayBackend::new();
    let array = upload(&backend, &[2, 2], &[1.0, 2.0, 3.0, 4.0]);

    let total = backend.sum(&array).unwrap();
    let host = backend.to_host(&total).unwrap();
    assert!(host.shape.is_scalar());
    assert_eq!(host.values, vec![10.0]);
}

#[test]
fn neg_flips_every_element() {
    let backend = CpuArrayBackend::new();
    let array = upload(&backend, &[3], &[1.0, -2.0, 0.0]);

    let negated = backend.neg(&array).unwrap();
    assert_eq!(
        backend.to_host(&negated).unwrap().values,
        vec![-1.0, 2.0, -0.0]
    );
}

#[test]
fn release_of_stale_handle_is_a_noop() {
    let backend = CpuArrayBackend::new();
    let array = upload(&backend, &[2], &[1.0, 2.0]);
    assert_eq!(backend.live_arrays(), 1);

    backend.release(&array);
    assert_eq!(backend.live_arrays(), 0);
    backend.release(&array);
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn kernels_on_released_handles_report_unknown_handle() {
    let backend = CpuArrayBackend::new();
    let array = upload(&backend, &[2], &[1.0, 2.0]);
    backend.release(&array);

    let err = backend.sum(&array).unwrap_err();
    assert!(matches!(err, BackendError::UnknownHandle { op: "sum" }));
    let err = backend.to_host(&array).unwrap_err();
    assert!(matches!(err, BackendError::UnknownHandle { op: "to_host" }));
}

#[test]
fn alias_shares_storage_without_copying() {
    let backend = CpuArrayBackend::new();
    let source = upload(&backend, &[2], &[1.0, 2.0]);
    let alias = backend.alias(&source).unwrap();
    assert_ne!(source, alias);
    assert_eq!(backend.live_arrays(), 2);

    backend.release(&source);
    assert_eq!(backend.to_host(&alias).unwrap().values, vec![1.0, 2.0]);
    backend.release(&alias);
    assert_eq!(backend.live_arrays(), 0);
}
