use trie_spline_index::{BuildOptions, MultiMap};

#[test_log::test]
fn step_function() {
    let dir = tempfile::tempdir().unwrap();
    let elements = [(0u64, 0u64), (0, 1), (0, 2), (10, 3), (10, 4), (20, 5)];

    let mm = MultiMap::build(
        &elements,
        BuildOptions::new()
            .num_bins(2)
            .cht_max_error(2)
            .spline_max_error(2),
        dir.path(),
    )
    .unwrap();

    assert_eq!(0, mm.lower_bound(0));
    assert_eq!(3, mm.sum_for_key(0));
    assert_eq!(7, mm.sum_for_key(10));
    assert_eq!(0, mm.sum_for_key(5));
}
