//! Property-based tests driving the engine with random operation
//! sequences against a flat multiset model.

use holly::tree::RbTree;
use proptest::prelude::*;

// =============================================================================
// Test helpers
// =============================================================================

/// One engine operation.
#[derive(Clone, Debug)]
enum Op {
    Insert(i64),
    Delete(i64),
    Search(i64),
}

fn arbitrary_op() -> impl Strategy<Value = Op> {
    // A narrow key range so deletes and searches actually hit.
    prop_oneof![
        (0i64..64).prop_map(Op::Insert),
        (0i64..64).prop_map(Op::Delete),
        (0i64..64).prop_map(Op::Search),
    ]
}

// =============================================================================
// Operation-sequence properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Invariants hold and the tree agrees with a multiset model after
    /// every single operation.
    #[test]
    fn tree_matches_model(ops in prop::collection::vec(arbitrary_op(), 1..200)) {
        let mut tree = RbTree::new();
        let mut model: Vec<i64> = Vec::new();

        for op in &ops {
            match op {
                Op::Insert(key) => {
                    tree.insert(*key);
                    model.push(*key);
                }
                Op::Delete(key) => {
                    let removed = tree.delete(*key);
                    let position = model.iter().position(|have| have == key);
                    prop_assert_eq!(removed, position.is_some());
                    if let Some(position) = position {
                        model.swap_remove(position);
                    }
                }
                Op::Search(key) => {
                    prop_assert_eq!(tree.contains(*key), model.contains(key));
                }
            }
            if let Err(violation) = tree.validate() {
                return Err(TestCaseError::fail(format!("invariant violated: {}", violation)));
            }
            prop_assert_eq!(tree.len(), model.len());
        }
    }

    /// Repeated searches without mutation always agree.
    #[test]
    fn search_is_idempotent(
        keys in prop::collection::vec(0i64..64, 0..50),
        probe in 0i64..64,
    ) {
        let mut tree = RbTree::new();
        for &key in &keys {
            tree.insert(key);
        }
        let first = tree.contains(probe);
        for _ in 0..5 {
            prop_assert_eq!(tree.contains(probe), first);
        }
    }

    /// Inserting a set of distinct keys and deleting them all leaves an
    /// empty tree, with deleted keys unreachable throughout.
    #[test]
    fn distinct_set_drains_to_empty(
        keys in prop::collection::hash_set(-1000i64..1000, 1..100)
    ) {
        let keys: Vec<i64> = keys.into_iter().collect();
        let mut tree = RbTree::new();
        for &key in &keys {
            tree.insert(key);
        }
        for &key in &keys {
            prop_assert!(tree.contains(key));
            prop_assert!(tree.delete(key));
            prop_assert!(!tree.contains(key));
            prop_assert!(tree.validate().is_ok());
        }
        prop_assert!(tree.is_empty());
    }

    /// The height bound follows from the black-height invariant.
    #[test]
    fn height_stays_logarithmic(keys in prop::collection::vec(any::<i64>(), 1..500)) {
        let mut tree = RbTree::new();
        for &key in &keys {
            tree.insert(key);
        }
        let bound = 2.0 * (tree.len() as f64 + 1.0).log2();
        prop_assert!(
            (tree.height() as f64) <= bound,
            "height {} exceeds bound {}", tree.height(), bound
        );
    }
}

// =============================================================================
// Full-lifecycle property (heavier, fewer cases)
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// A shuffled permutation inserted then deleted in a different
    /// shuffled order keeps every intermediate state valid.
    #[test]
    fn shuffled_lifecycle_keeps_invariants(
        insert_order in Just((1i64..=500).collect::<Vec<_>>()).prop_shuffle(),
        delete_order in Just((1i64..=500).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let mut tree = RbTree::new();
        for &key in &insert_order {
            tree.insert(key);
            prop_assert!(tree.validate().is_ok());
        }
        for &key in &delete_order {
            prop_assert!(tree.delete(key));
            prop_assert!(tree.validate().is_ok());
        }
        prop_assert!(tree.is_empty());
    }
}
