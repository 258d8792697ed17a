//! Generic contract tests for the operation-node semantics on a backend.
//!
//! Every function takes a freshly constructed backend and leaves it with
//! the same number of live buffers it started with, so the suite doubles
//! as a leak check for the backend's release path.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use revgrad_rs::backend::spec::{ArrayBackend, ArrayLiteral};
use revgrad_rs::graph::{GraphError, GraphExecutor, OpNode, TrainAll, ValueMap};
use revgrad_rs::ops::Subtract;
use revgrad_rs::tensor::{Shape, TensorArena, TensorId, TensorRef};

fn literal(dims: &[usize], values: &[f32]) -> ArrayLiteral {
    ArrayLiteral::from_vec(Shape::new(dims.to_vec()), values.to_vec())
        .expect("literal matches shape")
}

struct NodeFixture<B: ArrayBackend + 'static> {
    node: Subtract<B>,
    lhs: TensorRef,
    rhs: TensorRef,
    out: TensorRef,
}

fn subtract_node<B: ArrayBackend + 'static>(
    backend: &Arc<B>,
    lhs_dims: &[usize],
    rhs_dims: &[usize],
    out_dims: &[usize],
) -> NodeFixture<B> {
    let mut arena = TensorArena::new();
    let lhs = arena.tensor(Shape::new(lhs_dims.to_vec()));
    let rhs = arena.tensor(Shape::new(rhs_dims.to_vec()));
    let out = arena.tensor(Shape::new(out_dims.to_vec()));
    let node = Subtract::new(Arc::clone(backend), lhs.clone(), rhs.clone(), out.clone())
        .expect("operand shapes are compatible");
    NodeFixture {
        node,
        lhs,
        rhs,
        out,
    }
}

pub fn forward_same_shape_subtracts_elementwise<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let fixture = subtract_node(backend, &[2], &[2], &[2]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[2], &[3.0, 5.0])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend.materialize(&literal(&[2], &[1.0, 2.0])).unwrap(),
    );

    fixture.node.forward(&mut values).expect("forward succeeds");

    let result = backend
        .to_host(values.get(fixture.out.id()).expect("output recorded"))
        .unwrap();
    assert_eq!(result.values, vec![2.0, 3.0]);
    assert_eq!(result.shape.dims(), &[2]);

    values.release_all(backend.as_ref());
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn forward_broadcasts_scalar_lhs<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let fixture = subtract_node(backend, &[1], &[3], &[3]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[1], &[5.0])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend
            .materialize(&literal(&[3], &[1.0, 2.0, 3.0]))
            .unwrap(),
    );

    fixture.node.forward(&mut values).expect("forward succeeds");

    let result = backend
        .to_host(values.get(fixture.out.id()).expect("output recorded"))
        .unwrap();
    assert_eq!(result.values, vec![4.0, 3.0, 2.0]);

    values.release_all(backend.as_ref());
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn forward_broadcasts_scalar_rhs<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let fixture = subtract_node(backend, &[3], &[1], &[3]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend
            .materialize(&literal(&[3], &[1.0, 2.0, 3.0]))
            .unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend.materialize(&literal(&[1], &[2.0])).unwrap(),
    );

    fixture.node.forward(&mut values).expect("forward succeeds");

    let result = backend
        .to_host(values.get(fixture.out.id()).expect("output recorded"))
        .unwrap();
    assert_eq!(result.values, vec![-1.0, 0.0, 1.0]);

    values.release_all(backend.as_ref());
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn forward_missing_input_fails_without_writing<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let fixture = subtract_node(backend, &[2], &[2], &[2]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[2], &[1.0, 2.0])).unwrap(),
    );

    let err = fixture
        .node
        .forward(&mut values)
        .expect_err("missing input must fail");
    assert!(matches!(err, GraphError::MissingValue(id) if id == fixture.rhs.id()));
    assert!(!values.contains(fixture.out.id()));
    assert_eq!(backend.live_arrays(), baseline + 1);

    values.release_all(backend.as_ref());
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn backward_same_shape_passes_and_negates<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[3], &[3], &[3]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend
            .materialize(&literal(&[3], &[1.0, 2.0, 3.0]))
            .unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend
            .materialize(&literal(&[3], &[4.0, 5.0, 6.0]))
            .unwrap(),
    );
    fixture.node.forward(&mut values).expect("forward succeeds");

    let mut gradients = ValueMap::<B>::new();
    gradients.insert(
        fixture.out.id(),
        backend
            .materialize(&literal(&[3], &[1.0, 1.0, 1.0]))
            .unwrap(),
    );
    fixture
        .node
        .backward(&values, &mut gradients, &TrainAll)
        .expect("backward succeeds");

    let lhs_grad = backend
        .to_host(gradients.get(fixture.lhs.id()).expect("lhs gradient"))
        .unwrap();
    assert_eq!(lhs_grad.values, vec![1.0, 1.0, 1.0]);
    let rhs_grad = backend
        .to_host(gradients.get(fixture.rhs.id()).expect("rhs gradient"))
        .unwrap();
    assert_eq!(rhs_grad.values, vec![-1.0, -1.0, -1.0]);

    values.release_all(backend.as_ref());
    gradients.release_all(backend.as_ref());
    fixture.node.release();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn backward_scalar_lhs_reduces_to_mean<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[1], &[4], &[4]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[1], &[5.0])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend
            .materialize(&literal(&[4], &[1.0, 2.0, 3.0, 4.0]))
            .unwrap(),
    );
    fixture.node.forward(&mut values).expect("forward succeeds");

    let mut gradients = ValueMap::<B>::new();
    gradients.insert(
        fixture.out.id(),
        backend
            .materialize(&literal(&[4], &[2.0, 2.0, 2.0, 2.0]))
            .unwrap(),
    );
    fixture
        .node
        .backward(&values, &mut gradients, &TrainAll)
        .expect("backward succeeds");

    let lhs_grad = backend
        .to_host(gradients.get(fixture.lhs.id()).expect("lhs gradient"))
        .unwrap();
    assert_eq!(lhs_grad.values, vec![2.0]);
    assert!(lhs_grad.shape.is_scalar());
    let rhs_grad = backend
        .to_host(gradients.get(fixture.rhs.id()).expect("rhs gradient"))
        .unwrap();
    assert_eq!(rhs_grad.values, vec![-2.0, -2.0, -2.0, -2.0]);

    values.release_all(backend.as_ref());
    gradients.release_all(backend.as_ref());
    fixture.node.release();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn backward_scalar_rhs_reduces_to_negated_mean<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[4], &[1], &[4]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend
            .materialize(&literal(&[4], &[1.0, 2.0, 3.0, 4.0]))
            .unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend.materialize(&literal(&[1], &[2.0])).unwrap(),
    );
    fixture.node.forward(&mut values).expect("forward succeeds");

    let mut gradients = ValueMap::<B>::new();
    gradients.insert(
        fixture.out.id(),
        backend
            .materialize(&literal(&[4], &[2.0, 2.0, 2.0, 2.0]))
            .unwrap(),
    );
    fixture
        .node
        .backward(&values, &mut gradients, &TrainAll)
        .expect("backward succeeds");

    let rhs_grad = backend
        .to_host(gradients.get(fixture.rhs.id()).expect("rhs gradient"))
        .unwrap();
    assert_eq!(rhs_grad.values, vec![-2.0]);
    assert!(rhs_grad.shape.is_scalar());
    let lhs_grad = backend
        .to_host(gradients.get(fixture.lhs.id()).expect("lhs gradient"))
        .unwrap();
    assert_eq!(lhs_grad.values, vec![2.0, 2.0, 2.0, 2.0]);

    values.release_all(backend.as_ref());
    gradients.release_all(backend.as_ref());
    fixture.node.release();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn backward_skips_unselected_inputs<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[2], &[2], &[2]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[2], &[1.0, 2.0])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend.materialize(&literal(&[2], &[3.0, 4.0])).unwrap(),
    );
    fixture.node.forward(&mut values).expect("forward succeeds");

    let mut gradients = ValueMap::<B>::new();
    gradients.insert(
        fixture.out.id(),
        backend.materialize(&literal(&[2], &[1.0, 1.0])).unwrap(),
    );
    let policy: HashSet<TensorId> = [fixture.lhs.id()].into_iter().collect();
    fixture
        .node
        .backward(&values, &mut gradients, &policy)
        .expect("backward succeeds");

    assert!(gradients.contains(fixture.lhs.id()));
    assert!(!gradients.contains(fixture.rhs.id()));

    values.release_all(backend.as_ref());
    gradients.release_all(backend.as_ref());
    fixture.node.release();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn backward_missing_gradient_fails_without_writing<B: ArrayBackend + 'static>(
    backend: &Arc<B>,
) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[2], &[2], &[2]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[2], &[1.0, 2.0])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend.materialize(&literal(&[2], &[3.0, 4.0])).unwrap(),
    );
    fixture.node.forward(&mut values).expect("forward succeeds");

    let mut gradients = ValueMap::<B>::new();
    let err = fixture
        .node
        .backward(&values, &mut gradients, &TrainAll)
        .expect_err("missing output gradient must fail");
    assert!(matches!(err, GraphError::MissingGradient(id) if id == fixture.out.id()));
    assert!(gradients.is_empty());
    assert_eq!(backend.live_arrays(), baseline + 3);

    values.release_all(backend.as_ref());
    fixture.node.release();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn release_is_idempotent<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[1], &[4], &[4]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[1], &[0.5])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend
            .materialize(&literal(&[4], &[1.0, 2.0, 3.0, 4.0]))
            .unwrap(),
    );
    fixture.node.forward(&mut values).expect("forward succeeds");

    let mut gradients = ValueMap::<B>::new();
    gradients.insert(
        fixture.out.id(),
        backend
            .materialize(&literal(&[4], &[1.0, 1.0, 1.0, 1.0]))
            .unwrap(),
    );
    fixture
        .node
        .backward(&values, &mut gradients, &TrainAll)
        .expect("backward succeeds");

    // One cached divisor on top of the map-owned buffers.
    let with_divisor = backend.live_arrays();
    fixture.node.release();
    assert_eq!(backend.live_arrays(), with_divisor - 1);
    fixture.node.release();
    assert_eq!(backend.live_arrays(), with_divisor - 1);

    values.release_all(backend.as_ref());
    gradients.release_all(backend.as_ref());
    drop(fixture);
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn passes_leave_no_temporaries<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut fixture = subtract_node(backend, &[1], &[4], &[4]);

    let mut values = ValueMap::<B>::new();
    values.insert(
        fixture.lhs.id(),
        backend.materialize(&literal(&[1], &[5.0])).unwrap(),
    );
    values.insert(
        fixture.rhs.id(),
        backend
            .materialize(&literal(&[4], &[1.0, 2.0, 3.0, 4.0]))
            .unwrap(),
    );
    assert_eq!(backend.live_arrays(), baseline + 2);

    fixture.node.forward(&mut values).expect("forward succeeds");
    // Exactly the output was added; forward temporaries are gone.
    assert_eq!(backend.live_arrays(), baseline + 3);

    let mut gradients = ValueMap::<B>::new();
    gradients.insert(
        fixture.out.id(),
        backend
            .materialize(&literal(&[4], &[2.0, 2.0, 2.0, 2.0]))
            .unwrap(),
    );
    fixture
        .node
        .backward(&values, &mut gradients, &TrainAll)
        .expect("backward succeeds");
    // Seeded dy, two gradients, and the cached divisor; the reduction
    // temporaries and the pre-negation mean are gone.
    assert_eq!(backend.live_arrays(), baseline + 7);

    values.release_all(backend.as_ref());
    gradients.release_all(backend.as_ref());
    fixture.node.release();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn alias_survives_source_release<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let source = backend.materialize(&literal(&[2], &[1.0, 2.0])).unwrap();
    let alias = backend.alias(&source).unwrap();
    backend.release(&source);

    let host = backend.to_host(&alias).unwrap();
    assert_eq!(host.values, vec![1.0, 2.0]);

    backend.release(&alias);
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn executor_runs_chain_forward_and_backward<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut arena = TensorArena::new();
    let a = arena.tensor(Shape::new([2]));
    let b = arena.tensor(Shape::new([2]));
    let c = arena.tensor(Shape::new([2]));
    let t = arena.tensor(Shape::new([2]));
    let d = arena.tensor(Shape::new([2]));

    let mut executor = GraphExecutor::new(Arc::clone(backend));
    executor.record(Box::new(
        Subtract::new(Arc::clone(backend), a.clone(), b.clone(), t.clone()).unwrap(),
    ));
    executor.record(Box::new(
        Subtract::new(Arc::clone(backend), t.clone(), c.clone(), d.clone()).unwrap(),
    ));

    executor.bind_input(&a, &literal(&[2], &[5.0, 7.0])).unwrap();
    executor.bind_input(&b, &literal(&[2], &[2.0, 3.0])).unwrap();
    executor.bind_input(&c, &literal(&[2], &[1.0, 1.0])).unwrap();
    executor.forward().expect("forward pass succeeds");

    assert_eq!(executor.value(&t).unwrap().values, vec![3.0, 4.0]);
    assert_eq!(executor.value(&d).unwrap().values, vec![2.0, 3.0]);

    executor
        .seed_gradient(&d, &literal(&[2], &[1.0, 1.0]))
        .unwrap();
    executor.backward(&TrainAll).expect("backward pass succeeds");

    assert_eq!(executor.gradient(&a).unwrap().values, vec![1.0, 1.0]);
    assert_eq!(executor.gradient(&b).unwrap().values, vec![-1.0, -1.0]);
    assert_eq!(executor.gradient(&c).unwrap().values, vec![-1.0, -1.0]);

    executor.teardown();
    assert_eq!(backend.live_arrays(), baseline);
}

pub fn randomized_chain_preserves_accounting<B: ArrayBackend + 'static>(backend: &Arc<B>) {
    let baseline = backend.live_arrays();
    let mut rng = StdRng::seed_from_u64(17);

    for _ in 0..8 {
        let len = rng.gen_range(1..=16usize);
        let lhs_values = (0..len).map(|_| rng.gen::<f32>()).collect::<Vec<_>>();
        let rhs_values = (0..len).map(|_| rng.gen::<f32>()).collect::<Vec<_>>();
        let expected = lhs_values
            .iter()
            .zip(rhs_values.iter())
            .map(|(a, b)| a - b)
            .collect::<Vec<_>>();

        let mut arena = TensorArena::new();
        let lhs = arena.tensor(Shape::new([len]));
        let rhs = arena.tensor(Shape::new([len]));
        let out = arena.tensor(Shape::new([len]));

        let mut executor = GraphExecutor::new(Arc::clone(backend));
        executor.record(Box::new(
            Subtract::new(Arc::clone(backend), lhs.clone(), rhs.clone(), out.clone()).unwrap(),
        ));
        executor.bind_input(&lhs, &literal(&[len], &lhs_values)).unwrap();
        executor.bind_input(&rhs, &literal(&[len], &rhs_values)).unwrap();
        executor.forward().expect("forward pass succeeds");
        assert_eq!(executor.value(&out).unwrap().values, expected);

        executor
            .seed_gradient(&out, &literal(&[len], &vec![1.0; len]))
            .unwrap();
        executor.backward(&TrainAll).expect("backward pass succeeds");
        assert_eq!(executor.gradient(&lhs).unwrap().values, vec![1.0; len]);
        assert_eq!(executor.gradient(&rhs).unwrap().values, vec![-1.0; len]);

        drop(executor);
        assert_eq!(backend.live_arrays(), baseline);
    }
}
