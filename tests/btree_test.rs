use treeline::common::{RowId, TreeConfig};
use treeline::index::{
    BTree, Key, KeyRange, MultiComparator, NodePayload, Order, SimpleComparator,
};
use treeline::TreeError;

/// Insertion order chosen to exercise every split direction at fan-out 5.
const SEQUENCE: [i64; 23] = [
    13, 9, 21, 17, 5, 11, 3, 25, 27, 14, 15, 31, 29, 22, 23, 38, 45, 47, 49, 1, 10, 12, 16,
];

fn unique_tree() -> BTree {
    BTree::with_config(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::with_order(5),
    )
}

fn non_unique_tree() -> BTree {
    BTree::with_config(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        false,
        TreeConfig::with_order(5),
    )
}

/// Inserts the first `count` keys of SEQUENCE, with each key doubling as its
/// own row id.
fn insert_prefix(tree: &mut BTree, count: usize) {
    for &key in &SEQUENCE[..count] {
        tree.add(key, RowId::new(key as u64)).unwrap();
    }
}

fn rows(keys: &[i64]) -> Vec<RowId> {
    keys.iter().map(|&k| RowId::new(k as u64)).collect()
}

#[test]
fn test_empty_tree() {
    let tree = unique_tree();
    assert_eq!(tree.to_string(), "0[]\n_{}_\n");
    assert_eq!(tree.get(13), vec![]);
    assert!(!tree.contains_key(13));
    assert_eq!(tree.stats().total_rows, 0);
    assert_eq!(tree.get_range(None, false, None, None), vec![]);
    assert_eq!(tree.cost(None), 0);
    tree.verify().unwrap();
}

#[test]
fn test_add_fills_root_leaf() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 4);
    assert_eq!(tree.to_string(), "0[9|13|17|21]\n_{9/13/17/21}_\n");
    tree.verify().unwrap();
}

#[test]
fn test_add_splits_root_leaf() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 5);
    let expected = "2[13]\n\
                    _{0|1}_\n\
                    0[5|9]  1[13|17|21]\n\
                    _{5/9}2  0{13/17/21}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_add_splits_leaf_under_root() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    let expected = "2[13|21]\n\
                    _{0|1|3}_\n\
                    0[3|5|9|11]  1[13|17]  3[21|25|27]\n\
                    _{3/5/9/11}2  0{13/17}2  1{21/25/27}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_add_splits_internal_node() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 19);
    let expected = "8[27]\n\
                    _{2|7}_\n\
                    2[13|21]  7[31|45]\n\
                    _{0|1|3}8  2{4|5|6}8\n\
                    0[3|5|9|11]  1[13|14|15|17]  3[21|22|23|25]  4[27|29]  5[31|38]  6[45|47|49]\n\
                    _{3/5/9/11}2  0{13/14/15/17}2  1{21/22/23/25}2  3{27/29}7  4{31/38}7  5{45/47/49}7\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_add_full_sequence() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, SEQUENCE.len());
    let expected = "8[13|27]\n\
                    _{2|12|7}_\n\
                    2[5|10]  12[15|21]  7[31|45]\n\
                    _{0|9|10}8  2{1|11|3}8  12{4|5|6}8\n\
                    0[1|3]  9[5|9]  10[10|11|12]  1[13|14]  11[15|16|17]  3[21|22|23|25]  \
                    4[27|29]  5[31|38]  6[45|47|49]\n\
                    _{1/3}2  0{5/9}2  9{10/11/12}2  10{13/14}12  1{15/16/17}12  \
                    11{21/22/23/25}12  3{27/29}7  4{31/38}7  5{45/47/49}7\n";
    assert_eq!(tree.to_string(), expected);
    assert_eq!(tree.stats().total_rows, SEQUENCE.len());
    for &key in &SEQUENCE {
        assert_eq!(tree.get(key), rows(&[key]), "lookup of {}", key);
    }
    tree.verify().unwrap();
}

#[test]
fn test_add_duplicate_on_unique_tree_fails() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    let before = tree.to_string();

    let result = tree.add(13, RowId::new(999));
    assert!(matches!(
        result,
        Err(TreeError::UniquenessViolation { .. })
    ));
    assert_eq!(tree.to_string(), before);
    assert_eq!(tree.get(13), rows(&[13]));
    assert_eq!(tree.stats().total_rows, 9);
}

#[test]
fn test_add_duplicates_share_a_slot() {
    let mut tree = non_unique_tree();
    tree.add(5, RowId::new(100)).unwrap();
    tree.add(5, RowId::new(200)).unwrap();
    tree.add(5, RowId::new(300)).unwrap();
    tree.add(7, RowId::new(400)).unwrap();

    assert_eq!(
        tree.get(5),
        vec![RowId::new(100), RowId::new(200), RowId::new(300)]
    );
    assert_eq!(tree.stats().total_rows, 4);
    assert_eq!(tree.to_string(), "0[5|7]\n_{100,200,300/400}_\n");
    tree.verify().unwrap();
}

#[test]
fn test_remove_from_leaf_without_underflow() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    assert_eq!(tree.remove(3, None), 1);
    let expected = "2[13|21]\n\
                    _{0|1|3}_\n\
                    0[5|9|11]  1[13|17]  3[21|25|27]\n\
                    _{5/9/11}2  0{13/17}2  1{21/25/27}2\n";
    assert_eq!(tree.to_string(), expected);
    assert!(!tree.contains_key(3));
    tree.verify().unwrap();
}

#[test]
fn test_remove_missing_key_is_noop() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    let before = tree.to_string();
    assert_eq!(tree.remove(99, None), 0);
    assert_eq!(tree.remove(12, None), 0);
    assert_eq!(tree.to_string(), before);
    assert_eq!(tree.stats().total_rows, 9);
}

#[test]
fn test_remove_steals_from_left_sibling() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    assert_eq!(tree.remove(17, None), 1);
    let expected = "2[11|21]\n\
                    _{0|1|3}_\n\
                    0[3|5|9]  1[11|13]  3[21|25|27]\n\
                    _{3/5/9}2  0{11/13}2  1{21/25/27}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_remove_steals_from_right_and_refreshes_separator() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    tree.remove(3, None);
    tree.remove(5, None);
    // The left sibling has no surplus, so 21 rotates in from the right, and
    // the stale separator 13 is refreshed from the repaired subtree.
    assert_eq!(tree.remove(13, None), 1);
    let expected = "2[17|25]\n\
                    _{0|1|3}_\n\
                    0[9|11]  1[17|21]  3[25|27]\n\
                    _{9/11}2  0{17/21}2  1{25/27}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_remove_merges_into_left_sibling() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    tree.remove(27, None);
    assert_eq!(tree.remove(25, None), 1);
    let expected = "2[13]\n\
                    _{0|1}_\n\
                    0[3|5|9|11]  1[13|17|21]\n\
                    _{3/5/9/11}2  0{13/17/21}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_remove_merges_into_right_sibling() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    tree.remove(3, None);
    tree.remove(5, None);
    assert_eq!(tree.remove(9, None), 1);
    let expected = "2[21]\n\
                    _{1|3}_\n\
                    1[11|13|17]  3[21|25|27]\n\
                    _{11/13/17}2  1{21/25/27}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_remove_demotes_root_after_merge() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 5);
    tree.remove(17, None);
    assert_eq!(tree.remove(21, None), 1);
    assert_eq!(tree.to_string(), "0[5|9|13]\n_{5/9/13}_\n");
    tree.verify().unwrap();

    tree.remove(5, None);
    tree.remove(9, None);
    tree.remove(13, None);
    assert_eq!(tree.to_string(), "0[]\n_{}_\n");
    assert_eq!(tree.stats().total_rows, 0);
    tree.verify().unwrap();
}

#[test]
fn test_remove_steal_then_merge_demotes_root() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 5);
    assert_eq!(tree.remove(5, None), 1);
    let expected = "2[17]\n\
                    _{0|1}_\n\
                    0[9|13]  1[17|21]\n\
                    _{9/13}2  0{17/21}2\n";
    assert_eq!(tree.to_string(), expected);

    assert_eq!(tree.remove(13, None), 1);
    assert_eq!(tree.to_string(), "1[9|17|21]\n_{9/17/21}_\n");
    tree.verify().unwrap();
}

#[test]
fn test_remove_refreshes_internal_separator() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 19);
    // 45 is both a leaf key and a separator two levels up.
    assert_eq!(tree.remove(45, None), 1);
    let expected = "8[27]\n\
                    _{2|7}_\n\
                    2[13|21]  7[31|47]\n\
                    _{0|1|3}8  2{4|5|6}8\n\
                    0[3|5|9|11]  1[13|14|15|17]  3[21|22|23|25]  4[27|29]  5[31|38]  6[47|49]\n\
                    _{3/5/9/11}2  0{13/14/15/17}2  1{21/22/23/25}2  3{27/29}7  4{31/38}7  5{47/49}7\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_remove_cascading_merge_shrinks_depth() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 19);
    // The leaf merge underflows its parent, which merges in turn and leaves
    // the old root with a single child.
    assert_eq!(tree.remove(27, None), 1);
    let expected = "2[13|21|27|45]\n\
                    _{0|1|3|5|6}_\n\
                    0[3|5|9|11]  1[13|14|15|17]  3[21|22|23|25]  5[29|31|38]  6[45|47|49]\n\
                    _{3/5/9/11}2  0{13/14/15/17}2  1{21/22/23/25}2  3{29/31/38}2  5{45/47/49}2\n";
    assert_eq!(tree.to_string(), expected);
    tree.verify().unwrap();
}

#[test]
fn test_remove_single_value_from_slot() {
    let mut tree = non_unique_tree();
    tree.add(5, RowId::new(100)).unwrap();
    tree.add(5, RowId::new(200)).unwrap();
    tree.add(5, RowId::new(300)).unwrap();

    assert_eq!(tree.remove(5, Some(RowId::new(200))), 1);
    assert_eq!(tree.get(5), vec![RowId::new(100), RowId::new(300)]);
    assert_eq!(tree.stats().total_rows, 2);

    assert_eq!(tree.remove(5, Some(RowId::new(999))), 0);
    assert_eq!(tree.stats().total_rows, 2);

    assert_eq!(tree.remove(5, None), 2);
    assert!(!tree.contains_key(5));
    assert_eq!(tree.stats().total_rows, 0);
}

#[test]
fn test_remove_last_value_drops_the_slot() {
    let mut tree = non_unique_tree();
    tree.add(5, RowId::new(100)).unwrap();
    tree.add(7, RowId::new(200)).unwrap();

    assert_eq!(tree.remove(5, Some(RowId::new(100))), 1);
    assert!(!tree.contains_key(5));
    assert_eq!(tree.to_string(), "0[7]\n_{200}_\n");
    tree.verify().unwrap();
}

#[test]
fn test_set_on_unique_tree() {
    let mut tree = unique_tree();
    for &key in &SEQUENCE[..9] {
        tree.set(key, RowId::new(key as u64)).unwrap();
    }
    // Same structure as plain insertion.
    let mut added = unique_tree();
    insert_prefix(&mut added, 9);
    assert_eq!(tree.to_string(), added.to_string());

    tree.set(13, RowId::new(1300)).unwrap();
    assert_eq!(tree.get(13), vec![RowId::new(1300)]);
    assert_eq!(tree.stats().total_rows, 9);
}

#[test]
fn test_set_replaces_whole_slot_on_non_unique_tree() {
    let mut tree = non_unique_tree();
    tree.add(5, RowId::new(100)).unwrap();
    tree.add(5, RowId::new(200)).unwrap();
    tree.add(5, RowId::new(300)).unwrap();
    assert_eq!(tree.stats().total_rows, 3);

    tree.set(5, RowId::new(400)).unwrap();
    assert_eq!(tree.get(5), vec![RowId::new(400)]);
    assert_eq!(tree.stats().total_rows, 1);

    tree.set(8, RowId::new(500)).unwrap();
    assert_eq!(tree.get(8), vec![RowId::new(500)]);
    assert_eq!(tree.stats().total_rows, 2);
    tree.verify().unwrap();
}

#[test]
fn test_get_range_numeric() {
    let mut tree = unique_tree();
    for key in 1..=10 {
        tree.add(key, RowId::new(key as u64)).unwrap();
    }

    let scan = |range: KeyRange| tree.get_range(Some(&[range]), false, None, None);

    assert_eq!(scan(KeyRange::all()), rows(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]));
    assert_eq!(scan(KeyRange::only(5)), rows(&[5]));
    assert_eq!(scan(KeyRange::only(99)), vec![]);
    assert_eq!(scan(KeyRange::lower_bound(7, false)), rows(&[7, 8, 9, 10]));
    assert_eq!(scan(KeyRange::lower_bound(7, true)), rows(&[8, 9, 10]));
    assert_eq!(scan(KeyRange::upper_bound(3, false)), rows(&[1, 2, 3]));
    assert_eq!(scan(KeyRange::upper_bound(3, true)), rows(&[1, 2]));
    assert_eq!(
        scan(KeyRange::between(3, 7, false, false)),
        rows(&[3, 4, 5, 6, 7])
    );
    assert_eq!(scan(KeyRange::between(3, 7, true, true)), rows(&[4, 5, 6]));
    assert_eq!(scan(KeyRange::between(20, 30, false, false)), vec![]);
}

#[test]
fn test_get_range_reverse_limit_skip() {
    let mut tree = unique_tree();
    for key in 1..=10 {
        tree.add(key, RowId::new(key as u64)).unwrap();
    }

    assert_eq!(
        tree.get_range(None, true, None, None),
        rows(&[10, 9, 8, 7, 6, 5, 4, 3, 2, 1])
    );
    assert_eq!(tree.get_range(None, false, Some(3), None), rows(&[1, 2, 3]));
    assert_eq!(
        tree.get_range(None, false, Some(3), Some(2)),
        rows(&[3, 4, 5])
    );
    // Skip applies after reversal.
    assert_eq!(
        tree.get_range(None, true, Some(4), Some(2)),
        rows(&[8, 7, 6, 5])
    );
    assert_eq!(
        tree.get_range(
            Some(&[KeyRange::between(3, 8, false, false)]),
            true,
            Some(2),
            Some(1)
        ),
        rows(&[7, 6])
    );
    assert_eq!(tree.get_range(None, false, Some(0), None), vec![]);
    assert_eq!(tree.get_range(None, false, None, Some(100)), vec![]);
}

#[test]
fn test_get_range_with_descending_comparator() {
    let mut tree = BTree::with_config(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Desc)),
        true,
        TreeConfig::with_order(5),
    );
    for key in 1..=8 {
        tree.add(key, RowId::new(key as u64)).unwrap();
    }

    assert_eq!(
        tree.get_range(None, false, None, None),
        rows(&[8, 7, 6, 5, 4, 3, 2, 1])
    );
    // Range membership is in value space; only visit order changes.
    assert_eq!(
        tree.get_range(Some(&[KeyRange::lower_bound(6, false)]), false, None, None),
        rows(&[8, 7, 6])
    );
    assert_eq!(
        tree.get_range(Some(&[KeyRange::lower_bound(6, false)]), true, None, None),
        rows(&[6, 7, 8])
    );
    tree.verify().unwrap();
}

fn multi_key_pairs() -> Vec<(&'static str, &'static str)> {
    vec![
        ("F", "A"),
        ("F", "B"),
        ("F", "C"),
        ("F", "D"),
        ("G", "B"),
        ("G", "G"),
        ("G", "X"),
        ("P", "K"),
        ("P", "M"),
        ("P", "P"),
        ("S", "A"),
        ("S", "B"),
        ("S", "C"),
        ("S", "D"),
    ]
}

#[test]
fn test_multi_key_lookups() {
    let mut tree = BTree::with_config(
        "test.idx",
        Box::new(MultiComparator::uniform(2, Order::Asc)),
        true,
        TreeConfig::with_order(5),
    );
    for (i, (a, b)) in multi_key_pairs().into_iter().enumerate() {
        tree.add((a, b), RowId::new(i as u64)).unwrap();
    }

    assert_eq!(tree.get(("G", "X")), vec![RowId::new(6)]);
    assert!(tree.contains_key(("S", "D")));
    assert!(!tree.contains_key(("S", "E")));

    assert_eq!(
        tree.get_range(
            Some(&[KeyRange::only("G"), KeyRange::only("X")]),
            false,
            None,
            None
        ),
        vec![RowId::new(6)]
    );
    assert_eq!(
        tree.get_range(
            Some(&[KeyRange::only("P"), KeyRange::only("P")]),
            false,
            None,
            None
        ),
        vec![RowId::new(9)]
    );
    // Bounded on the first field only.
    assert_eq!(
        tree.get_range(Some(&[KeyRange::only("G")]), false, None, None),
        vec![RowId::new(4), RowId::new(5), RowId::new(6)]
    );
    let all: Vec<RowId> = (0..14).map(RowId::new).collect();
    assert_eq!(tree.get_range(None, false, None, None), all);
    tree.verify().unwrap();
}

#[test]
fn test_multi_key_mixed_directions() {
    let mut tree = BTree::with_config(
        "test.idx",
        Box::new(MultiComparator::new(vec![Order::Asc, Order::Desc])),
        true,
        TreeConfig::with_order(5),
    );
    for (i, (a, b)) in multi_key_pairs().into_iter().enumerate() {
        tree.add((a, b), RowId::new(i as u64)).unwrap();
    }

    let expected: Vec<RowId> = [3, 2, 1, 0, 6, 5, 4, 9, 8, 7, 13, 12, 11, 10]
        .iter()
        .map(|&i| RowId::new(i))
        .collect();
    assert_eq!(tree.get_range(None, false, None, None), expected);
    assert_eq!(tree.get(("G", "X")), vec![RowId::new(6)]);
    tree.verify().unwrap();
}

#[test]
fn test_stats_tracks_every_mutation() {
    let mut tree = non_unique_tree();
    assert_eq!(tree.stats().total_rows, 0);

    tree.add(10, RowId::new(1)).unwrap();
    tree.add(10, RowId::new(2)).unwrap();
    tree.add(11, RowId::new(3)).unwrap();
    assert_eq!(tree.stats().total_rows, 3);

    // set() drops both stored values of 10 before adding one back.
    tree.set(10, RowId::new(4)).unwrap();
    assert_eq!(tree.stats().total_rows, 2);

    assert_eq!(tree.remove(10, Some(RowId::new(4))), 1);
    assert_eq!(tree.stats().total_rows, 1);

    tree.add(11, RowId::new(5)).unwrap();
    assert_eq!(tree.remove(11, None), 2);
    assert_eq!(tree.stats().total_rows, 0);
}

#[test]
fn test_cost_matches_scan_size() {
    let mut tree = non_unique_tree();
    insert_prefix(&mut tree, SEQUENCE.len());
    tree.add(13, RowId::new(1300)).unwrap();
    tree.add(13, RowId::new(1301)).unwrap();

    assert_eq!(tree.cost(None), tree.stats().total_rows);
    assert_eq!(tree.cost(Some(&KeyRange::only(13))), 3);
    assert_eq!(tree.cost(Some(&KeyRange::only(99))), 0);

    let ranges = [
        KeyRange::all(),
        KeyRange::between(10, 25, false, false),
        KeyRange::between(10, 25, true, true),
        KeyRange::lower_bound(27, false),
        KeyRange::upper_bound(5, true),
    ];
    for range in &ranges {
        let scanned = tree.get_range(Some(std::slice::from_ref(range)), false, None, None);
        assert_eq!(
            tree.cost(Some(range)),
            scanned.len(),
            "cost mismatch for {:?}",
            range
        );
    }
}

#[test]
fn test_clear_resets_the_tree() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, SEQUENCE.len());
    tree.clear();

    assert_eq!(tree.to_string(), "0[]\n_{}_\n");
    assert_eq!(tree.stats().total_rows, 0);
    assert_eq!(tree.get(13), vec![]);

    tree.add(13, RowId::new(13)).unwrap();
    assert_eq!(tree.get(13), rows(&[13]));
    tree.verify().unwrap();
}

#[test]
fn test_from_sorted_packs_evenly() {
    let mut sorted = SEQUENCE.to_vec();
    sorted.sort_unstable();
    let data: Vec<(Key, RowId)> = sorted
        .iter()
        .map(|&k| (Key::from(k), RowId::new(k as u64)))
        .collect();

    let tree = BTree::from_sorted(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::with_order(5),
        data,
    )
    .unwrap();

    let expected = "8[21]\n\
                    _{6|7}_\n\
                    6[10|14]  7[27|45]\n\
                    _{0|1|2}8  6{3|4|5}8\n\
                    0[1|3|5|9]  1[10|11|12|13]  2[14|15|16|17]  3[21|22|23|25]  \
                    4[27|29|31|38]  5[45|47|49]\n\
                    _{1/3/5/9}6  0{10/11/12/13}6  1{14/15/16/17}6  2{21/22/23/25}7  \
                    3{27/29/31/38}7  4{45/47/49}7\n";
    assert_eq!(tree.to_string(), expected);
    assert_eq!(tree.stats().total_rows, SEQUENCE.len());
    tree.verify().unwrap();

    let mut incremental = unique_tree();
    insert_prefix(&mut incremental, SEQUENCE.len());
    assert_eq!(
        tree.get_range(None, false, None, None),
        incremental.get_range(None, false, None, None)
    );
}

#[test]
fn test_from_sorted_rejects_bad_input() {
    let comparator = || Box::new(SimpleComparator::new(Order::Asc));
    let config = TreeConfig::with_order(5);

    let unsorted = vec![
        (Key::from(3), RowId::new(3)),
        (Key::from(1), RowId::new(1)),
    ];
    assert!(matches!(
        BTree::from_sorted("test.idx", comparator(), true, config, unsorted),
        Err(TreeError::UnsortedData(_))
    ));

    let duplicated = vec![
        (Key::from(1), RowId::new(1)),
        (Key::from(1), RowId::new(2)),
    ];
    assert!(matches!(
        BTree::from_sorted("test.idx", comparator(), true, config, duplicated),
        Err(TreeError::UniquenessViolation { .. })
    ));

    // Adjacent duplicates are one slot on a non-unique tree.
    let duplicated = vec![
        (Key::from(1), RowId::new(1)),
        (Key::from(1), RowId::new(2)),
    ];
    let tree =
        BTree::from_sorted("test.idx", comparator(), false, config, duplicated).unwrap();
    assert_eq!(tree.get(1), vec![RowId::new(1), RowId::new(2)]);

    let empty = BTree::from_sorted("test.idx", comparator(), true, config, vec![]).unwrap();
    assert_eq!(empty.to_string(), "0[]\n_{}_\n");
    empty.verify().unwrap();
}

#[test]
fn test_serialize_round_trip() {
    let mut tree = non_unique_tree();
    insert_prefix(&mut tree, SEQUENCE.len());
    tree.add(13, RowId::new(1300)).unwrap();

    let serialized = tree.serialize();
    assert_eq!(serialized[0].id, 0);

    let restored = BTree::deserialize(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        false,
        TreeConfig::with_order(5),
        &serialized,
    )
    .unwrap();
    restored.verify().unwrap();

    assert_eq!(restored.stats().total_rows, tree.stats().total_rows);
    assert_eq!(restored.get(13), tree.get(13));
    assert_eq!(
        restored.get_range(None, false, None, None),
        tree.get_range(None, false, None, None)
    );
    // Row ids are canonical, so a second round trip is byte-for-byte stable.
    assert_eq!(restored.serialize(), serialized);
}

#[test]
fn test_serialize_empty_tree() {
    let tree = unique_tree();
    let serialized = tree.serialize();
    assert_eq!(serialized.len(), 1);
    assert!(matches!(
        serialized[0].payload,
        NodePayload::Leaf { ref keys, .. } if keys.is_empty()
    ));

    let restored = BTree::deserialize(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::with_order(5),
        &serialized,
    )
    .unwrap();
    assert_eq!(restored.to_string(), "0[]\n_{}_\n");
    restored.verify().unwrap();
}

#[test]
fn test_deserialize_rejects_corrupt_rows() {
    let mut tree = unique_tree();
    insert_prefix(&mut tree, 9);
    let serialized = tree.serialize();

    let deserialize = |rows: &[treeline::index::IndexRow]| {
        BTree::deserialize(
            "test.idx",
            Box::new(SimpleComparator::new(Order::Asc)),
            true,
            TreeConfig::with_order(5),
            rows,
        )
    };
    let is_corrupt = |result: treeline::Result<BTree>| {
        matches!(result, Err(TreeError::StructuralCorruption(_)))
    };

    assert!(is_corrupt(deserialize(&[])));

    let mut duplicated = serialized.clone();
    duplicated.push(serialized[1].clone());
    assert!(is_corrupt(deserialize(&duplicated)));

    // A referenced row missing from the input.
    let mut truncated = serialized.clone();
    truncated.remove(2);
    assert!(is_corrupt(deserialize(&truncated)));

    // A row no other row references, next to the real root.
    let mut orphaned = serialized.clone();
    let mut orphan = serialized[1].clone();
    orphan.id = 100;
    orphaned.push(orphan);
    assert!(is_corrupt(deserialize(&orphaned)));

    let mut unsorted = serialized.clone();
    if let NodePayload::Leaf { keys, .. } = &mut unsorted[1].payload {
        keys.swap(0, 1);
    }
    assert!(is_corrupt(deserialize(&unsorted)));

    let mut lopsided = serialized.clone();
    if let NodePayload::Leaf { values, .. } = &mut lopsided[1].payload {
        values.pop();
    }
    assert!(is_corrupt(deserialize(&lopsided)));

    let mut broken_chain = serialized.clone();
    if let NodePayload::Leaf { next, .. } = &mut broken_chain[1].payload {
        *next = None;
    }
    assert!(is_corrupt(deserialize(&broken_chain)));

    // The untouched input still deserializes.
    assert!(deserialize(&serialized).is_ok());
}

#[test]
fn test_delete_everything_in_both_orders() {
    let mut ascending = SEQUENCE.to_vec();
    ascending.sort_unstable();
    let mut descending = ascending.clone();
    descending.reverse();

    for order in [ascending, descending] {
        let mut tree = unique_tree();
        insert_prefix(&mut tree, SEQUENCE.len());
        for (i, &key) in order.iter().enumerate() {
            assert_eq!(tree.remove(key, None), 1, "removal of {}", key);
            tree.verify().unwrap();
            assert_eq!(tree.stats().total_rows, SEQUENCE.len() - i - 1);
        }
        assert_eq!(tree.to_string(), "0[]\n_{}_\n");
    }
}

#[test]
fn test_even_order_churn() {
    let mut tree = BTree::with_config(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::with_order(4),
    );
    // Every split direction fires at fan-out 4; no node may dip below the
    // minimum occupancy on the way.
    for key in 0..64 {
        tree.add(key, RowId::new(key as u64)).unwrap();
        tree.verify().unwrap();
    }
    for key in 0..20 {
        assert_eq!(tree.remove(key, None), 1);
        tree.verify().unwrap();
    }

    let serialized = tree.serialize();
    let restored = BTree::deserialize(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::with_order(4),
        &serialized,
    )
    .unwrap();
    restored.verify().unwrap();
    assert_eq!(restored.serialize(), serialized);

    let expected: Vec<RowId> = (20..64).map(|k| RowId::new(k as u64)).collect();
    assert_eq!(tree.get_range(None, false, None, None), expected);
    for key in 20..64 {
        assert_eq!(tree.remove(key, None), 1);
        tree.verify().unwrap();
    }
    assert_eq!(tree.stats().total_rows, 0);
}

#[test]
fn test_default_order_churn() {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(7);
    let mut keys: Vec<i64> = (0..2000).collect();
    keys.shuffle(&mut rng);

    let mut tree = BTree::new(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
    );
    for (i, &key) in keys.iter().enumerate() {
        tree.add(key, RowId::new(key as u64)).unwrap();
        if i % 250 == 0 {
            tree.verify().unwrap();
        }
    }
    tree.verify().unwrap();

    let serialized = tree.serialize();
    let restored = BTree::deserialize(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::default(),
        &serialized,
    )
    .unwrap();
    restored.verify().unwrap();
    assert_eq!(restored.serialize(), serialized);

    keys.shuffle(&mut rng);
    for (i, &key) in keys.iter().enumerate() {
        assert_eq!(tree.remove(key, None), 1);
        if i % 250 == 0 {
            tree.verify().unwrap();
        }
    }
    tree.verify().unwrap();
    assert_eq!(tree.to_string(), "0[]\n_{}_\n");
}

#[test]
fn test_randomized_churn() {
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    let mut rng = StdRng::seed_from_u64(42);
    let mut keys: Vec<i64> = (0..500).collect();
    keys.shuffle(&mut rng);

    let mut tree = unique_tree();
    for (i, &key) in keys.iter().enumerate() {
        tree.add(key, RowId::new(key as u64)).unwrap();
        if i % 50 == 0 {
            tree.verify().unwrap();
        }
    }
    tree.verify().unwrap();

    let expected: Vec<RowId> = (0..500).map(|k| RowId::new(k as u64)).collect();
    assert_eq!(tree.get_range(None, false, None, None), expected);
    for &key in &keys {
        assert_eq!(tree.get(key), rows(&[key]), "lookup of {}", key);
    }

    let serialized = tree.serialize();
    let restored = BTree::deserialize(
        "test.idx",
        Box::new(SimpleComparator::new(Order::Asc)),
        true,
        TreeConfig::with_order(5),
        &serialized,
    )
    .unwrap();
    assert_eq!(restored.serialize(), serialized);

    keys.shuffle(&mut rng);
    for (i, &key) in keys.iter().enumerate() {
        assert_eq!(tree.remove(key, None), 1, "removal of {}", key);
        if i % 50 == 0 {
            tree.verify().unwrap();
        }
    }
    assert_eq!(tree.stats().total_rows, 0);
    assert_eq!(tree.to_string(), "0[]\n_{}_\n");
}
