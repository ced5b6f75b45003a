//! Property tests for the structural matching engine.

use pactum::match_pattern;
use pactum::matchers::{array_min_like, array_min_max_like, like, Pattern};
use proptest::prelude::*;
use serde_json::{Map, Value};

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z0-9 ]{0,8}".prop_map(Value::from),
    ]
}

/// Scalars and arrays, no objects.
fn flat_tree() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::Array)
    })
}

fn tree() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,4}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<_, _>>())),
        ]
    })
}

fn object_tree() -> impl Strategy<Value = Map<String, Value>> {
    prop::collection::btree_map("[a-z]{1,4}", tree(), 1..5)
        .prop_map(|m| m.into_iter().collect::<Map<_, _>>())
}

proptest! {
    #[test]
    fn literal_tree_matches_itself(value in tree()) {
        prop_assert!(match_pattern(&Pattern::from(value.clone()), &value).ok());
    }

    #[test]
    fn literal_flat_tree_matches_iff_equal(expected in flat_tree(), actual in flat_tree()) {
        let result = match_pattern(&Pattern::from(expected.clone()), &actual);
        prop_assert_eq!(result.ok(), expected == actual);
    }

    #[test]
    fn extra_keys_never_mismatch(object in object_tree(), extra in scalar()) {
        let mut actual = object.clone();
        actual.insert("extrakey".to_string(), extra);
        let result = match_pattern(&Pattern::from(Value::Object(object)), &Value::Object(actual));
        prop_assert!(result.ok());
    }

    #[test]
    fn missing_key_mismatches_at_its_path(object in object_tree(), pick in any::<prop::sample::Index>()) {
        let keys: Vec<String> = object.keys().cloned().collect();
        let missing = pick.get(&keys).clone();
        let mut actual = object.clone();
        actual.remove(&missing);
        let result = match_pattern(&Pattern::from(Value::Object(object)), &Value::Object(actual));
        prop_assert!(!result.ok());
        let expected_path = format!("$.{missing}");
        prop_assert!(result.mismatches.iter().any(|m| m.path == expected_path));
    }

    #[test]
    fn like_accepts_any_string(example in "[a-z]{1,8}", actual in ".{0,16}") {
        prop_assert!(match_pattern(&like(example.as_str()), &Value::from(actual)).ok());
    }

    #[test]
    fn array_min_like_respects_minimum(len in 0usize..8, min in 0usize..6) {
        let actual = Value::Array((0..len as i64).map(Value::from).collect());
        let result = match_pattern(&array_min_like(1, min), &actual);
        prop_assert_eq!(result.ok(), len >= min);
    }

    #[test]
    fn array_min_max_like_respects_bounds(len in 0usize..10, min in 0usize..4, span in 0usize..4) {
        let max = min + span;
        let actual = Value::Array(vec![Value::from("x"); len]);
        let result = match_pattern(&array_min_max_like("y", min, max), &actual);
        prop_assert_eq!(result.ok(), len >= min && len <= max);
    }
}
