//! Arguments of `open`.

use crate::error::{CoreError, CoreResult};
use versadb_codec::Value;
use versadb_storage::{DatabaseOptions, StoreDefinition};

/// Arguments for [`crate::Factory::open_with`].
///
/// ```
/// use versadb_core::OpenArgs;
///
/// let args = OpenArgs::new("library").version(3);
/// assert_eq!(args.requested_version(), Some(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenArgs {
    name: String,
    version: Option<u64>,
    options: DatabaseOptions,
}

impl OpenArgs {
    /// Opens `name` at the factory's default version.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: None,
            options: DatabaseOptions::default(),
        }
    }

    /// Requests a specific version. Must be at least 1.
    #[must_use]
    pub fn version(mut self, version: u64) -> Self {
        self.version = Some(version);
        self
    }

    /// Sets the store definitions used if the database is created.
    #[must_use]
    pub fn options(mut self, options: DatabaseOptions) -> Self {
        self.options = options;
        self
    }

    /// Returns the database name as given.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the requested version, if one was given.
    pub fn requested_version(&self) -> Option<u64> {
        self.version
    }

    /// Returns the store definitions.
    pub fn database_options(&self) -> &DatabaseOptions {
        &self.options
    }

    pub(crate) fn validate(&self) -> CoreResult<()> {
        if self.version == Some(0) {
            return Err(CoreError::invalid_argument("version must be at least 1"));
        }
        Ok(())
    }

    /// Builds arguments from dynamically typed values.
    ///
    /// `second` is the version when it is a number; anything else is taken
    /// as the options and the version defaults. `third` supplies the
    /// options when `second` is a version.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` (TypeError) if the name is not text, the
    /// version is not an integer of at least 1, or the options are present
    /// but not an object.
    pub fn from_values(
        name: &Value,
        second: Option<&Value>,
        third: Option<&Value>,
    ) -> CoreResult<Self> {
        let name = name
            .as_text()
            .ok_or_else(|| CoreError::invalid_argument("database name must be a string"))?;
        let mut args = Self::new(name);

        let options = match second {
            Some(Value::Number(n)) => {
                args.version = Some(version_from_number(*n)?);
                third
            }
            other => other,
        };

        if let Some(options) = options.filter(|v| !v.is_null() && !v.is_undefined()) {
            args.options = options_from_value(options)?;
        }
        Ok(args)
    }
}

fn version_from_number(n: f64) -> CoreResult<u64> {
    if n.is_finite() && n.fract() == 0.0 && n >= 1.0 && n <= u64::MAX as f64 {
        Ok(n as u64)
    } else {
        Err(CoreError::invalid_argument(format!(
            "version must be an integer of at least 1, got {n}"
        )))
    }
}

/// Maps `{ store: { keyPath?, autoIncrement? } }` onto store definitions.
fn options_from_value(value: &Value) -> CoreResult<DatabaseOptions> {
    let entries = value
        .as_object()
        .ok_or_else(|| CoreError::invalid_argument("database options must be an object"))?;

    let mut options = DatabaseOptions::new();
    for (store, definition) in entries {
        let mut def = StoreDefinition::new();
        if definition.is_object() {
            if let Some(path) = definition.get("keyPath").and_then(Value::as_text) {
                def = def.key_path(path);
            }
            if let Some(auto) = definition.get("autoIncrement").and_then(Value::as_bool) {
                def = def.auto_increment(auto);
            }
        }
        options = options.store(store.clone(), def);
    }
    Ok(options)
}
