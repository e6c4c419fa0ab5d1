//! # VersaDB Codec
//!
//! Key model and total key ordering for VersaDB.
//!
//! This crate provides:
//! - A dynamic [`Value`] type for arbitrary caller input
//! - The [`Key`] subset and its validity predicate
//! - The total order over keys used by `Factory::cmp`
//! - A JSON mapping so tools and tests can write keys as text
//!
//! ## Key Order
//!
//! - Types order as `Number < Date < String < Binary < Array`
//! - Strings compare by UTF-16 code unit
//! - Arrays compare element by element, shorter prefix first
//!
//! ## Usage
//!
//! ```
//! use versadb_codec::{cmp, Value};
//!
//! assert_eq!(cmp(&Value::from(1), &Value::from(2)).unwrap(), -1);
//! assert_eq!(cmp(&Value::from("a"), &Value::from("a")).unwrap(), 0);
//! assert!(cmp(&Value::empty_object(), &Value::empty_object()).is_err());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod key;
mod value;

pub use error::{CodecError, CodecResult};
pub use json::{from_json, from_json_str};
pub use key::{cmp, compare, is_valid_key, Key};
pub use value::Value;
