use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

fn validate_tree<V>(t: &Tree<V>) {
    let issues = t.verify_integrity();
    assert!(issues.is_empty(), "integrity issues: {issues:?}");
}

#[derive(Clone, Debug)]
enum Op<V> {
    Insert(Vec<u8>, V),
    Remove(Vec<u8>),
    Get(Vec<u8>),
}

#[derive(Clone, Debug)]
enum Walk {
    Next,
    Prev,
    Seek(Vec<u8>),
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    // A small alphabet forces shared prefixes; the long stem pushes compressed
    // paths past the inline prefix capacity.
    (any::<bool>(), prop::collection::vec(b'a'..=b'd', 0..=8)).prop_map(|(long, tail)| {
        if long {
            [&b"xxxxxxxxxxxxxxxx"[..], tail.as_slice()].concat()
        } else {
            tail
        }
    })
}

/// Keys over the full byte range, so nodes reach every size class.
fn wide_key_strategy() -> impl Strategy<Value = Vec<u8>> + Clone {
    (0..3usize, prop::collection::vec(any::<u8>(), 0..=3)).prop_map(|(stem, tail)| {
        let stems: [&[u8]; 3] = [b"", b"w", b"wwwwwwwwwwwwwwww"];
        [stems[stem], tail.as_slice()].concat()
    })
}

/// Up to 256 distinct bytes fanned out below `"w"`, plus random wide keys.
fn wide_keys_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    let bytes: Vec<u8> = (0..=255).collect();
    (
        prop::sample::subsequence(bytes, 0..=256),
        prop::collection::vec(wide_key_strategy(), 0..=100),
    )
        .prop_map(|(fan, extra)| fan.into_iter().map(|b| vec![b'w', b]).chain(extra).collect())
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op<u64>>> {
    let key = key_strategy();
    let op = prop_oneof![
        50 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Insert(k, v)),
        25 => key.clone().prop_map(Op::Remove),
        25 => key.clone().prop_map(Op::Get),
    ];
    prop::collection::vec(op, 0..=500)
}

fn walk_strategy<S>(keys: S) -> impl Strategy<Value = Vec<Walk>>
where
    S: Strategy<Value = Vec<u8>> + 'static,
{
    let step = prop_oneof![
        40 => Just(Walk::Next),
        40 => Just(Walk::Prev),
        20 => keys.prop_map(Walk::Seek),
    ];
    prop::collection::vec(step, 0..=200)
}

fn build(keys: &[Vec<u8>]) -> (Tree<u64>, BTreeMap<Vec<u8>, u64>) {
    let mut t = Tree::new();
    let mut m = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        t.insert(k, i as u64);
        m.insert(k.clone(), i as u64);
    }
    (t, m)
}

/// Cursor position over an ordered element list.
#[derive(Clone, Copy, Debug)]
enum Pos {
    Fresh,
    Gap(usize),
    On(usize),
}

impl Pos {
    fn next(self, n: usize) -> Option<usize> {
        match self {
            Pos::Fresh => (n > 0).then_some(0),
            Pos::Gap(i) => (i < n).then_some(i),
            Pos::On(i) => (i + 1 < n).then_some(i + 1),
        }
    }

    fn prev(self, n: usize) -> Option<usize> {
        match self {
            Pos::Fresh => n.checked_sub(1),
            Pos::Gap(i) | Pos::On(i) => i.checked_sub(1),
        }
    }
}

fn node_addrs<'a>(nodes: impl IntoIterator<Item = &'a Node<u64>>) -> Vec<*const Node<u64>> {
    nodes.into_iter().map(|n| n as *const Node<u64>).collect()
}

fn drain<C: TreeCursor>(cursor: &mut C, tree: &Tree<u64>, forward: bool) -> Vec<*const Node<u64>> {
    let mut out = Vec::new();
    loop {
        let step = if forward {
            if !cursor.has_next(tree) {
                break;
            }
            cursor.next(tree)
        } else {
            if !cursor.has_prev(tree) {
                break;
            }
            cursor.prev(tree)
        };
        out.push(step.expect("step after has_next/has_prev") as *const Node<u64>);
    }
    out
}

fn check_cursor_orders(keys: &[Vec<u8>]) -> Result<(), TestCaseError> {
    let (t, m) = build(keys);

    let mut all = Vec::new();
    t.for_each(TraverseOptions::ALL, |node| {
        all.push(node);
        true
    });
    let preorder = node_addrs(all.iter().copied());
    let leaves = node_addrs(all.iter().copied().filter(|n| n.is_leaf()));
    let internal = node_addrs(all.iter().copied().filter(|n| !n.is_leaf()));

    // Pre-order visits leaves in key order.
    let leaf_keys: Vec<Vec<u8>> = all.iter().filter_map(|n| n.key()).map(<[u8]>::to_vec).collect();
    let model_keys: Vec<Vec<u8>> = m.keys().cloned().collect();
    prop_assert_eq!(leaf_keys, model_keys);

    for (options, expected) in [
        (TraverseOptions::ALL, &preorder),
        (TraverseOptions::LEAF, &leaves),
        (TraverseOptions::NODE, &internal),
    ] {
        let mut cursor = t.cursor(options);
        prop_assert_eq!(&drain(&mut cursor, &t, true), expected);

        let mut reversed = expected.clone();
        reversed.reverse();
        let mut cursor = t.cursor(options);
        prop_assert_eq!(drain(&mut cursor, &t, false), reversed);
    }
    Ok(())
}

fn check_seek_lower_bound(keys: &[Vec<u8>], targets: Vec<Vec<u8>>) -> Result<(), TestCaseError> {
    let (t, m) = build(keys);

    for target in targets {
        let mut cursor = t.cursor(TraverseOptions::LEAF);
        cursor.seek(&t, &target);
        let expected_next = m.range(target.clone()..).next().map(|(k, _)| k.clone());
        let got_next = cursor.has_next(&t).then(|| cursor.next(&t).map(|n| n.key().map(<[u8]>::to_vec)));
        prop_assert_eq!(got_next.map(|r| r.ok().flatten()), expected_next.map(Some));

        let mut cursor = t.cursor(TraverseOptions::LEAF);
        cursor.seek(&t, &target);
        let expected_prev = m.range(..target.clone()).next_back().map(|(k, _)| k.clone());
        let got_prev = cursor.has_prev(&t).then(|| cursor.prev(&t).map(|n| n.key().map(<[u8]>::to_vec)));
        prop_assert_eq!(got_prev.map(|r| r.ok().flatten()), expected_prev.map(Some));

        let from: Vec<Vec<u8>> = t.iter_from(&target).map(|(k, _)| k.to_vec()).collect();
        let expected: Vec<Vec<u8>> = m.range(target.clone()..).map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(from, expected);

        // Walking back from the landing point visits everything below the target.
        let mut cursor = t.cursor(TraverseOptions::LEAF);
        cursor.seek(&t, &target);
        let mut below = Vec::new();
        while cursor.has_prev(&t) {
            let node = cursor.prev(&t).map_err(|e| TestCaseError::fail(e.to_string()))?;
            below.extend(node.key().map(<[u8]>::to_vec));
        }
        let expected: Vec<Vec<u8>> = m.range(..target.clone()).rev().map(|(k, _)| k.clone()).collect();
        prop_assert_eq!(below, expected);
    }
    Ok(())
}

fn check_random_walk(keys: &[Vec<u8>], walk: Vec<Walk>) -> Result<(), TestCaseError> {
    let (t, m) = build(keys);
    let model: Vec<(&Vec<u8>, &u64)> = m.iter().collect();
    let n = model.len();

    let mut cursor = t.cursor(TraverseOptions::LEAF);
    let mut pos = Pos::Fresh;

    for step in walk {
        match step {
            Walk::Next => {
                let expected = pos.next(n);
                prop_assert_eq!(cursor.has_next(&t), expected.is_some());
                match (cursor.next(&t), expected) {
                    (Ok(node), Some(i)) => {
                        prop_assert_eq!(node.key(), Some(model[i].0.as_slice()));
                        pos = Pos::On(i);
                    }
                    (Err(Error::NoMoreElements), None) => {}
                    (got, want) => prop_assert!(false, "next: got {:?}, want {:?}", got.map(Node::key), want),
                }
            }
            Walk::Prev => {
                let expected = pos.prev(n);
                prop_assert_eq!(cursor.has_prev(&t), expected.is_some());
                match (cursor.prev(&t), expected) {
                    (Ok(node), Some(i)) => {
                        prop_assert_eq!(node.key(), Some(model[i].0.as_slice()));
                        pos = Pos::On(i);
                    }
                    (Err(Error::NoMoreElements), None) => {}
                    (got, want) => prop_assert!(false, "prev: got {:?}, want {:?}", got.map(Node::key), want),
                }
            }
            Walk::Seek(key) => {
                cursor.seek(&t, &key);
                pos = Pos::Gap(model.partition_point(|(k, _)| k.as_slice() < key.as_slice()));
            }
        }

        let expected_value = match pos {
            Pos::On(i) => Some(model[i].1),
            Pos::Fresh | Pos::Gap(_) => None,
        };
        prop_assert_eq!(cursor.value(&t), expected_value);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in ops_strategy()) {
        let mut t: Tree<u64> = Tree::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let old_t = t.insert(&key, value);
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Remove(key) => {
                    let old_t = t.remove(&key);
                    let old_m = m.remove(key.as_slice());
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Get(key) => {
                    let got_t = t.get(&key).copied();
                    let got_m = m.get(key.as_slice()).copied();
                    prop_assert_eq!(got_t, got_m);
                }
            }

            prop_assert_eq!(t.len(), m.len());
        }

        validate_tree(&t);
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_cursor_orders(keys in prop::collection::vec(key_strategy(), 0..=200)) {
        check_cursor_orders(&keys)?;
    }

    #[test]
    fn prop_cursor_orders_wide(keys in wide_keys_strategy()) {
        check_cursor_orders(&keys)?;
    }

    #[test]
    fn prop_seek_lower_bound(
        keys in prop::collection::vec(key_strategy(), 0..=200),
        targets in prop::collection::vec(key_strategy(), 1..=20),
    ) {
        check_seek_lower_bound(&keys, targets)?;
    }

    #[test]
    fn prop_seek_lower_bound_wide(
        keys in wide_keys_strategy(),
        targets in prop::collection::vec(wide_key_strategy(), 1..=20),
    ) {
        check_seek_lower_bound(&keys, targets)?;
    }

    #[test]
    fn prop_prefix_scan(
        keys in prop::collection::vec(key_strategy(), 0..=200),
        prefixes in prop::collection::vec(key_strategy(), 1..=20),
    ) {
        let (t, m) = build(&keys);

        let mut candidates = prefixes;
        candidates.push(Vec::new());
        candidates.extend(keys.first().cloned());
        candidates.extend(keys.first().map(|k| [k.as_slice(), &b"zzz"[..]].concat()));

        for prefix in candidates {
            let got: Vec<(Vec<u8>, u64)> = t
                .prefix_scan(&prefix)
                .into_iter()
                .map(|(k, v)| (k.to_vec(), *v))
                .collect();
            let expected: Vec<(Vec<u8>, u64)> = m
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(k, v)| (k.clone(), *v))
                .collect();
            prop_assert_eq!(got, expected, "prefix {:?}", prefix);
        }
    }

    #[test]
    fn prop_random_walk(
        keys in prop::collection::vec(key_strategy(), 0..=100),
        walk in walk_strategy(key_strategy()),
    ) {
        check_random_walk(&keys, walk)?;
    }

    #[test]
    fn prop_random_walk_wide(keys in wide_keys_strategy(), walk in walk_strategy(wide_key_strategy())) {
        check_random_walk(&keys, walk)?;
    }

    #[test]
    fn prop_raw_walk_matches_preorder(
        keys in wide_keys_strategy(),
        steps in prop::collection::vec(any::<bool>(), 0..=400),
    ) {
        let (t, _) = build(&keys);
        let mut all = Vec::new();
        t.for_each(TraverseOptions::ALL, |node| {
            all.push(node);
            true
        });
        let preorder = node_addrs(all);
        let n = preorder.len();

        let mut cursor = t.cursor(TraverseOptions::ALL);
        let mut pos = Pos::Fresh;
        for forward in steps {
            let (expected, has, step) = if forward {
                let expected = pos.next(n);
                (expected, cursor.has_next(&t), cursor.next(&t))
            } else {
                let expected = pos.prev(n);
                (expected, cursor.has_prev(&t), cursor.prev(&t))
            };
            prop_assert_eq!(has, expected.is_some());
            match (step, expected) {
                (Ok(node), Some(i)) => {
                    prop_assert_eq!(node as *const Node<u64>, preorder[i]);
                    pos = Pos::On(i);
                }
                (Err(Error::NoMoreElements), None) => {}
                (got, want) => prop_assert!(false, "got {:?}, want {:?}", got.map(Node::kind), want),
            }
        }
    }

    #[test]
    fn prop_modification_detected(
        keys in prop::collection::vec(key_strategy(), 1..=100),
        extra in key_strategy(),
        steps in 0usize..10,
    ) {
        let (mut t, m) = build(&keys);

        let mut cursor = t.cursor(TraverseOptions::ALL);
        for _ in 0..steps {
            if cursor.has_next(&t) {
                cursor.next_ref(&t).expect("next");
            }
        }

        // Overwriting keeps the structure, so the cursor stays valid.
        let first = keys[0].clone();
        t.insert(&first, 7);
        prop_assert_eq!(cursor.version(), t.version());

        let structural = !m.contains_key(&extra);
        t.insert(&extra, 8);
        if structural {
            // Exhausted directions report that before looking at the version.
            let can_step = cursor.has_next(&t);
            let err = cursor.next_ref(&t).expect_err("stale cursor stepped forward");
            prop_assert_eq!(err.is_concurrent_modification(), can_step);
            let can_step = cursor.has_prev(&t);
            let err = cursor.prev_ref(&t).expect_err("stale cursor stepped backward");
            prop_assert_eq!(err.is_concurrent_modification(), can_step);
        }

        let version = t.version();
        t.remove(&first);
        prop_assert_ne!(t.version(), version);
        prop_assert!(cursor.next_ref(&t).is_err() && cursor.prev_ref(&t).is_err());
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn small_set() -> Vec<Vec<u8>> {
    vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
    ]
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = small_set();

    for_each_permutation(&keys, |perm| {
        let mut t: Tree<u64> = Tree::new();
        let mut m: BTreeMap<Vec<u8>, u64> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as u64;
            assert_eq!(t.insert(&k, v), m.insert(k, v));
        }

        validate_tree(&t);
        let got: Vec<(Vec<u8>, u64)> = t.iter().map(|(k, v)| (k.to_vec(), *v)).collect();
        let expected: Vec<(Vec<u8>, u64)> = m.iter().map(|(k, v)| (k.clone(), *v)).collect();
        assert_eq!(got, expected);

        let mut cursor = t.cursor(TraverseOptions::LEAF);
        let mut backward = Vec::new();
        while cursor.has_prev(&t) {
            backward.extend(cursor.prev(&t).expect("prev").key().map(<[u8]>::to_vec));
        }
        let mut expected_keys: Vec<Vec<u8>> = m.keys().cloned().collect();
        expected_keys.reverse();
        assert_eq!(backward, expected_keys);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = small_set();

    // Insert in a fixed order, then remove in all permutations.
    let mut base_tree: Tree<u64> = Tree::new();
    let mut base_map: BTreeMap<Vec<u8>, u64> = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        let v = i as u64;
        assert_eq!(base_tree.insert(k, v), base_map.insert(k.clone(), v));
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base_tree.clone();
        let mut m = base_map.clone();

        for k in perm {
            assert_eq!(t.remove(&k), m.remove(k.as_slice()));
            assert_eq!(t.len(), m.len());
            validate_tree(&t);
            let got: Vec<Vec<u8>> = t.iter().map(|(k, _)| k.to_vec()).collect();
            let expected: Vec<Vec<u8>> = m.keys().cloned().collect();
            assert_eq!(got, expected);
        }
        assert_eq!(t.len(), 0);
        assert!(t.root().is_none());
    });
}
