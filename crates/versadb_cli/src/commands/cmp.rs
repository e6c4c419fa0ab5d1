//! Cmp command implementation.

use versadb_codec::from_json_str;
use versadb_core::Factory;

/// Runs the cmp command.
pub fn run(first: &str, second: &str) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", compare(first, second)?);
    Ok(())
}

/// Parses both keys and compares them through a factory.
fn compare(first: &str, second: &str) -> Result<i8, Box<dyn std::error::Error>> {
    let first = from_json_str(first)?;
    let second = from_json_str(second)?;
    let factory = Factory::in_memory();
    factory
        .cmp(&first, &second)
        .map_err(|e| format!("{}: {}", e.name(), e).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compare_numbers() {
        assert_eq!(compare("1", "2").unwrap(), -1);
        assert_eq!(compare("[1, \"a\"]", "[1, \"a\"]").unwrap(), 0);
    }

    #[test]
    fn test_compare_tagged_forms() {
        assert_eq!(compare("{\"$date\": 5}", "10").unwrap(), 1);
        assert_eq!(compare("{\"$binary\": [1]}", "\"z\"").unwrap(), 1);
    }

    #[test]
    fn test_invalid_key_reports_data_error() {
        let err = compare("{}", "1").unwrap_err();
        assert!(err.to_string().starts_with("DataError"));
    }

    #[test]
    fn test_invalid_json() {
        assert!(compare("{", "1").is_err());
    }
}
