//! Property-based test generators using proptest.
//!
//! Provides strategies for keys, database names, and request sequences.

use proptest::prelude::*;
use versadb_codec::Value;

/// Strategy for finite numbers, including negative zero and extremes.
pub fn number_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        any::<i32>().prop_map(f64::from),
        (-1.0e12f64..1.0e12f64),
        Just(f64::INFINITY),
        Just(f64::NEG_INFINITY),
        Just(-0.0),
    ]
}

/// Strategy for valid keys, nested up to three levels deep.
pub fn key_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        number_strategy().prop_map(Value::Number),
        number_strategy()
            .prop_filter("dates are finite", |n| n.is_finite())
            .prop_map(Value::Date),
        "[a-zA-Z0-9\u{e9}\u{1F600}]{0,6}".prop_map(Value::Text),
        prop::collection::vec(any::<u8>(), 0..6).prop_map(Value::Binary),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::Array)
    })
}

/// Strategy for values that are never valid keys.
pub fn invalid_key_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        Just(Value::Number(f64::NAN)),
        Just(Value::empty_object()),
        Just(Value::Array(vec![Value::Null])),
    ]
}

/// Strategy for database names, including characters that need encoding.
pub fn database_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9._ %-]{0,15}").expect("Invalid regex")
}

/// Strategy for a batch of requested versions, each in `1..=max`.
pub fn version_sequence_strategy(max: u64, len: usize) -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(1..=max, 1..=len)
}
