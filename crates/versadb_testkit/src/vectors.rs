//! Key-order test vectors.
//!
//! Operands are written as JSON so the same vectors drive the codec tests
//! and the `versadb cmp` command. `{"$date": n}` and `{"$binary": [..]}`
//! denote dates and binary keys.

use serde::{Deserialize, Serialize};

/// A key comparison vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// First operand, as JSON.
    pub first: String,
    /// Second operand, as JSON.
    pub second: String,
    /// Expected comparison result.
    pub expected: Option<i8>,
    /// Expected error name (if this should fail).
    pub expected_error: Option<String>,
}

fn ordered(id: &str, description: &str, first: &str, second: &str, expected: i8) -> KeyVector {
    KeyVector {
        id: id.into(),
        description: description.into(),
        first: first.into(),
        second: second.into(),
        expected: Some(expected),
        expected_error: None,
    }
}

fn invalid(id: &str, description: &str, first: &str, second: &str) -> KeyVector {
    KeyVector {
        id: id.into(),
        description: description.into(),
        first: first.into(),
        second: second.into(),
        expected: None,
        expected_error: Some("DataError".into()),
    }
}

/// Key comparison vectors.
pub fn key_order_vectors() -> Vec<KeyVector> {
    vec![
        ordered("num_lt", "1 before 2", "1", "2", -1),
        ordered("num_eq", "equal numbers", "2.5", "2.5", 0),
        ordered("num_gt", "negative after more negative", "-1", "-3", 1),
        ordered("text_eq", "equal strings", r#""a""#, r#""a""#, 0),
        ordered("text_lt", "prefix first", r#""ab""#, r#""abc""#, -1),
        ordered(
            "text_utf16",
            "astral plane sorts below U+FFFF by UTF-16 code unit",
            r#""\ud83d\ude00""#,
            r#""\uffff""#,
            -1,
        ),
        ordered("num_before_text", "numbers before strings", "999", r#""0""#, -1),
        ordered(
            "num_before_date",
            "numbers before dates",
            "5",
            r#"{"$date": 0}"#,
            -1,
        ),
        ordered(
            "date_before_text",
            "dates before strings",
            r#"{"$date": 1e12}"#,
            r#""""#,
            -1,
        ),
        ordered(
            "text_before_binary",
            "strings before binary",
            r#""zzz""#,
            r#"{"$binary": []}"#,
            -1,
        ),
        ordered(
            "binary_bytes",
            "binary compares bytewise",
            r#"{"$binary": [1, 2]}"#,
            r#"{"$binary": [1, 3]}"#,
            -1,
        ),
        ordered(
            "binary_before_array",
            "binary before arrays",
            r#"{"$binary": [255]}"#,
            "[]",
            -1,
        ),
        ordered("array_elements", "arrays compare element-wise", "[1, 2]", "[1, 3]", -1),
        ordered("array_length", "shorter array first", "[1]", "[1, 0]", -1),
        ordered("array_nested", "nested arrays", "[[1]]", "[[1]]", 0),
        invalid("object_operands", "objects are not keys", "{}", "{}"),
        invalid("null_operand", "null is not a key", "null", "1"),
        invalid("bool_operand", "booleans are not keys", "1", "true"),
        invalid("array_with_null", "arrays must contain keys", "[1, null]", "[1]"),
    ]
}

/// Exports all vectors as pretty JSON.
pub fn all_vectors_json() -> String {
    serde_json::to_string_pretty(&key_order_vectors()).expect("Failed to serialize vectors")
}
