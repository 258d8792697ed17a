use revgrad_rs::backend::spec::{ArrayBackend, ArrayLiteral};
use revgrad_rs::graph::ValueMap;
use revgrad_rs::tensor::{Shape, TensorArena};
use revgrad_rs_backend_ref_cpu::{BufferId, CpuArrayBackend};

fn upload(backend: &CpuArrayBackend, value: f32) -> BufferId {
    backend
        .materialize(&ArrayLiteral::scalar(value))
        .expect("materialize succeeds")
}

#[test]
fn entries_are_keyed_by_identity() {
    let backend = CpuArrayBackend::new();
    let mut arena = TensorArena::new();
    let a = arena.tensor(Shape::new([1]));
    let b = arena.tensor(Shape::new([1]));

    let mut map = ValueMap::<CpuArrayBackend>::new();
    map.insert(a.id(), upload(&backend, 1.0));
    assert!(map.contains(a.id()));
    assert!(!map.contains(b.id()));
    assert_eq!(map.len(), 1);

    map.release_all(&backend);
    assert!(map.is_empty());
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn insert_returns_the_displaced_handle() {
    let backend = CpuArrayBackend::new();
    let mut arena = TensorArena::new();
    let tensor = arena.tensor(Shape::new([1]));

    let mut map = ValueMap::<CpuArrayBackend>::new();
    assert!(map.insert(tensor.id(), upload(&backend, 1.0)).is_none());
    let displaced = map
        .insert(tensor.id(), upload(&backend, 2.0))
        .expect("previous entry is handed back");
    backend.release(&displaced);

    let current = backend.to_host(map.get(tensor.id()).unwrap()).unwrap();
    assert_eq!(current.values, vec![2.0]);

    map.release_all(&backend);
    assert_eq!(backend.live_arrays(), 0);
}

#[test]
fn remove_transfers_ownership_to_the_caller() {
    let backend = CpuArrayBackend::new();
    let mut arena = TensorArena::new();
    let tensor = arena.tensor(Shape::new([1]));

    let mut map = ValueMap::<CpuArrayBackend>::new();
    map.insert(tensor.id(), upload(&backend, 4.0));
    let taken = map.remove(tensor.id()).expect("entry present");
    assert!(map.is_empty());

    // The buffer is still live until the caller releases it.
    assert_eq!(backend.live_arrays(), 1);
    backend.release(&taken);
    assert_eq!(backend.live_arrays(), 0);
}
