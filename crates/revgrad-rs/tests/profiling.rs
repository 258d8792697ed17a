#![cfg(feature = "profiler")]

use revgrad_rs::profiling;

#[test]
fn scopes_aggregate_into_the_profile_table() {
    profiling::take_table();

    for _ in 0..3 {
        let _guard = profiling::op_scope("test::scope");
    }

    let table = profiling::take_table();
    let row = table
        .iter()
        .find(|row| row.name == "test::scope")
        .expect("scope recorded");
    assert_eq!(row.calls, 3);
    assert!(row.total_ms >= 0.0);

    assert!(!profiling::take_table().iter().any(|row| row.name == "test::scope"));
}
