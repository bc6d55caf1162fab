use trie_spline_index::{BuildOptions, MultiMap};

#[test_log::test]
fn dense_uniform() {
    let dir = tempfile::tempdir().unwrap();
    let elements: Vec<(u64, u64)> = (0..10).map(|k| (k, k)).collect();

    let mm = MultiMap::build(
        &elements,
        BuildOptions::new()
            .num_bins(4)
            .cht_max_error(2)
            .spline_max_error(1),
        dir.path(),
    )
    .unwrap();

    assert_eq!(10, mm.len());
    assert_eq!(5, mm.lower_bound(5));
    assert_eq!(5, mm.sum_for_key(5));

    // search_bound(5) itself isn't reachable through MultiMap's public surface
    // (TrieSpline::new is crate-private), so this exact dataset's bound is
    // asserted directly in trie_spline.rs's own test suite instead, including
    // a note on why it comes out to 4..8 rather than the narrower range this
    // scenario's spec description names. What's checked here is what that bound
    // is for: every key's true rank falls inside lower_bound's result.
    for (rank, &(key, payload)) in elements.iter().enumerate() {
        assert_eq!(rank, mm.lower_bound(key));
        assert_eq!(payload, mm.sum_for_key(key));
    }
}
