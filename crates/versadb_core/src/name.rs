//! Database name canonicalization.
//!
//! Registry keys are derived from caller-supplied names by percent-encoding
//! every byte outside `[A-Za-z0-9_~-]`. The mapping is injective, so two
//! distinct logical names can never share a registry entry, and the key
//! never contains `.`, `/` or other separators a storage backend might
//! interpret.

use std::fmt::Write;

/// Maps an arbitrary database name to its canonical registry key.
pub fn canonicalize(name: &str) -> String {
    let mut key = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'_' | b'~' | b'-') {
            key.push(char::from(byte));
        } else {
            // Writing to a String cannot fail
            let _ = write!(key, "%{byte:02X}");
        }
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn plain_names_unchanged() {
        assert_eq!(canonicalize("library"), "library");
        assert_eq!(canonicalize("my-db_2~x"), "my-db_2~x");
    }

    #[test]
    fn dots_are_encoded() {
        assert_eq!(canonicalize("a.b"), "a%2Eb");
    }

    #[test]
    fn percent_is_encoded() {
        // "a%2Eb" and "a.b" must not collide
        assert_eq!(canonicalize("a%2Eb"), "a%252Eb");
        assert_ne!(canonicalize("a%2Eb"), canonicalize("a.b"));
    }

    #[test]
    fn unicode_and_empty() {
        assert_eq!(canonicalize(""), "");
        assert_eq!(canonicalize("é"), "%C3%A9");
        assert_eq!(canonicalize("a b/c"), "a%20b%2Fc");
    }

    proptest! {
        #[test]
        fn injective(a in ".{0,8}", b in ".{0,8}") {
            if a != b {
                prop_assert_ne!(canonicalize(&a), canonicalize(&b));
            }
        }

        #[test]
        fn deterministic(a in ".{0,16}") {
            prop_assert_eq!(canonicalize(&a), canonicalize(&a));
        }
    }
}
