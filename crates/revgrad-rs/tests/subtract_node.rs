use std::sync::Arc;

use revgrad_rs::graph::GraphError;
use revgrad_rs::ops::Subtract;
use revgrad_rs::tensor::{Shape, TensorArena};
use revgrad_rs_backend_ref_cpu::CpuArrayBackend;

fn backend() -> Arc<CpuArrayBackend> {
    Arc::new(CpuArrayBackend::new())
}

#[test]
fn construction_rejects_two_full_operands_with_different_shapes() {
    let mut arena = TensorArena::new();
    let lhs = arena.tensor(Shape::new([2, 3]));
    let rhs = arena.tensor(Shape::new([4]));
    let out = arena.tensor(Shape::new([2, 3]));

    let err = Subtract::new(backend(), lhs, rhs, out).unwrap_err();
    assert!(matches!(err, GraphError::ShapeMismatch { .. }));
}

#[test]
fn construction_accepts_a_scalar_operand_of_any_rank() {
    let mut arena = TensorArena::new();
    let scalar = arena.tensor(Shape::new([1, 1, 1]));
    let full = arena.tensor(Shape::new([5]));
    let out = arena.tensor(Shape::new([5]));

    assert!(Subtract::new(backend(), scalar, full, out).is_ok());

    let mut arena = TensorArena::new();
    let full = arena.tensor(Shape::new([5]));
    let scalar = arena.tensor(Shape::new([1]));
    let out = arena.tensor(Shape::new([5]));

    assert!(Subtract::new(backend(), full, scalar, out).is_ok());
}

#[test]
fn construction_accepts_two_scalar_operands_of_different_rank() {
    let mut arena = TensorArena::new();
    let lhs = arena.tensor(Shape::new([1]));
    let rhs = arena.tensor(Shape::new([1, 1]));
    let out = arena.tensor(Shape::new([1]));

    assert!(Subtract::new(backend(), lhs, rhs, out).is_ok());
}

#[test]
fn construction_rejects_an_output_shape_that_differs_from_the_result() {
    let mut arena = TensorArena::new();
    let lhs = arena.tensor(Shape::new([1]));
    let rhs = arena.tensor(Shape::new([3]));
    let out = arena.tensor(Shape::new([4]));

    let err = Subtract::new(backend(), lhs, rhs, out).unwrap_err();
    assert!(matches!(err, GraphError::ShapeMismatch { .. }));
}

#[test]
fn shape_errors_name_both_shapes() {
    let mut arena = TensorArena::new();
    let lhs = arena.tensor(Shape::new([2]));
    let rhs = arena.tensor(Shape::new([3]));
    let out = arena.tensor(Shape::new([2]));

    let err = Subtract::new(backend(), lhs, rhs, out).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("[2]"), "unexpected message: {message}");
    assert!(message.contains("[3]"), "unexpected message: {message}");
}
