//! Validated keys and their total order.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use std::cmp::Ordering;

/// A valid key.
///
/// Keys are a strict subset of [`Value`]: finite-or-infinite numbers (never
/// NaN), dates with a defined time value, strings, binary buffers, and arrays
/// whose elements are themselves valid keys.
#[derive(Debug, Clone, PartialEq)]
pub enum Key {
    /// Number key (never NaN).
    Number(f64),
    /// Date key, milliseconds since the Unix epoch (never NaN).
    Date(f64),
    /// String key.
    Text(String),
    /// Binary key.
    Binary(Vec<u8>),
    /// Array key.
    Array(Vec<Key>),
}

impl Key {
    /// Compare two keys.
    ///
    /// Keys of different types order as
    /// `Number < Date < Text < Binary < Array`. Within a type:
    /// - numbers and dates compare numerically,
    /// - strings compare by UTF-16 code unit,
    /// - binary compares bytewise (shorter prefix first),
    /// - arrays compare element by element, then by length.
    pub fn cmp_key(&self, other: &Self) -> Ordering {
        let self_rank = self.type_rank();
        let other_rank = other.type_rank();

        if self_rank != other_rank {
            return self_rank.cmp(&other_rank);
        }

        match (self, other) {
            (Key::Number(a), Key::Number(b)) | (Key::Date(a), Key::Date(b)) => {
                // NaN is rejected at construction, so partial_cmp is total here
                a.partial_cmp(b).unwrap_or(Ordering::Equal)
            }
            (Key::Text(a), Key::Text(b)) => a.encode_utf16().cmp(b.encode_utf16()),
            (Key::Binary(a), Key::Binary(b)) => a.cmp(b),
            (Key::Array(a), Key::Array(b)) => {
                for (ak, bk) in a.iter().zip(b.iter()) {
                    let ord = ak.cmp_key(bk);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal, // unreachable with equal ranks
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Key::Number(_) => 0,
            Key::Date(_) => 1,
            Key::Text(_) => 2,
            Key::Binary(_) => 3,
            Key::Array(_) => 4,
        }
    }

    /// Converts the key back into a plain value.
    pub fn into_value(self) -> Value {
        match self {
            Key::Number(n) => Value::Number(n),
            Key::Date(t) => Value::Date(t),
            Key::Text(s) => Value::Text(s),
            Key::Binary(b) => Value::Binary(b),
            Key::Array(items) => Value::Array(items.into_iter().map(Key::into_value).collect()),
        }
    }
}

impl TryFrom<&Value> for Key {
    type Error = CodecError;

    fn try_from(value: &Value) -> CodecResult<Self> {
        match value {
            Value::Number(n) if n.is_nan() => Err(CodecError::invalid_key("number is NaN")),
            Value::Number(n) => Ok(Key::Number(*n)),
            Value::Date(t) if t.is_nan() => Err(CodecError::invalid_key("date has no time value")),
            Value::Date(t) => Ok(Key::Date(*t)),
            Value::Text(s) => Ok(Key::Text(s.clone())),
            Value::Binary(b) => Ok(Key::Binary(b.clone())),
            Value::Array(items) => items
                .iter()
                .map(Key::try_from)
                .collect::<CodecResult<Vec<_>>>()
                .map(Key::Array),
            other => Err(CodecError::invalid_key(format!(
                "{} is not a valid key type",
                other.type_name()
            ))),
        }
    }
}

/// Returns true if `value` is a valid key.
pub fn is_valid_key(value: &Value) -> bool {
    Key::try_from(value).is_ok()
}

/// Compare two values as keys.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] if either operand is not a valid key.
pub fn compare(first: &Value, second: &Value) -> CodecResult<Ordering> {
    let a = Key::try_from(first)?;
    let b = Key::try_from(second)?;
    Ok(a.cmp_key(&b))
}

/// Compare two values as keys, returning `-1`, `0` or `1`.
///
/// # Errors
///
/// Returns [`CodecError::InvalidKey`] if either operand is not a valid key.
pub fn cmp(first: &Value, second: &Value) -> CodecResult<i8> {
    Ok(match compare(first, second)? {
        Ordering::Less => -1,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn basic_comparisons() {
        assert_eq!(cmp(&Value::from(1), &Value::from(2)).unwrap(), -1);
        assert_eq!(cmp(&text("a"), &text("a")).unwrap(), 0);
        assert_eq!(cmp(&text("b"), &text("a")).unwrap(), 1);
    }

    #[test]
    fn objects_are_not_keys() {
        let err = cmp(&Value::empty_object(), &Value::empty_object()).unwrap_err();
        assert_eq!(err.name(), "DataError");
    }

    #[test]
    fn invalid_operands() {
        assert!(!is_valid_key(&Value::Number(f64::NAN)));
        assert!(!is_valid_key(&Value::Date(f64::NAN)));
        assert!(!is_valid_key(&Value::Null));
        assert!(!is_valid_key(&Value::Undefined));
        assert!(!is_valid_key(&Value::Bool(true)));
        assert!(!is_valid_key(&Value::Array(vec![Value::from(1), Value::Null])));
        assert!(cmp(&Value::from(1), &Value::Null).is_err());
    }

    #[test]
    fn type_order() {
        let ordered = [
            Value::Number(f64::INFINITY),
            Value::Date(0.0),
            text(""),
            Value::Binary(vec![]),
            Value::Array(vec![]),
        ];
        for pair in ordered.windows(2) {
            assert_eq!(cmp(&pair[0], &pair[1]).unwrap(), -1, "{:?}", pair);
        }
    }

    #[test]
    fn strings_use_utf16_code_units() {
        // U+FF61 is a single BMP unit; U+1F600 is a surrogate pair starting 0xD83D.
        // UTF-8 byte order would put the emoji last, UTF-16 puts it first.
        assert_eq!(cmp(&text("\u{1F600}"), &text("\u{FF61}")).unwrap(), -1);
    }

    #[test]
    fn arrays_compare_elementwise_then_by_length() {
        let short = Value::Array(vec![Value::from(1)]);
        let long = Value::Array(vec![Value::from(1), Value::from(0)]);
        let bigger = Value::Array(vec![Value::from(2)]);
        assert_eq!(cmp(&short, &long).unwrap(), -1);
        assert_eq!(cmp(&long, &bigger).unwrap(), -1);
    }

    #[test]
    fn binary_prefix_first() {
        let a = Value::Binary(vec![1, 2]);
        let b = Value::Binary(vec![1, 2, 0]);
        assert_eq!(cmp(&a, &b).unwrap(), -1);
    }

    #[test]
    fn negative_zero_equals_zero() {
        assert_eq!(cmp(&Value::Number(-0.0), &Value::Number(0.0)).unwrap(), 0);
    }

    fn key_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            any::<i32>().prop_map(|n| Value::Number(f64::from(n))),
            any::<i32>().prop_map(|n| Value::Date(f64::from(n))),
            "[a-c]{0,3}".prop_map(Value::Text),
            prop::collection::vec(0u8..3, 0..3).prop_map(Value::Binary),
        ];
        leaf.prop_recursive(2, 8, 3, |inner| {
            prop::collection::vec(inner, 0..3).prop_map(Value::Array)
        })
    }

    proptest! {
        #[test]
        fn antisymmetric(a in key_strategy(), b in key_strategy()) {
            prop_assert_eq!(cmp(&a, &b).unwrap(), -cmp(&b, &a).unwrap());
        }

        #[test]
        fn transitive(a in key_strategy(), b in key_strategy(), c in key_strategy()) {
            if cmp(&a, &b).unwrap() <= 0 && cmp(&b, &c).unwrap() <= 0 {
                prop_assert!(cmp(&a, &c).unwrap() <= 0);
            }
        }

        #[test]
        fn reflexive(a in key_strategy()) {
            prop_assert_eq!(cmp(&a, &a).unwrap(), 0);
        }
    }
}
