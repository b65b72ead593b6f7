//! Error types for loading.
//!
//! Errors fall into two disjoint groups:
//!
//! - **Setup errors** ([`LoadError`] variants other than `Invalid`) mean the
//!   declaration or the backend is broken. They abort the load immediately.
//! - **Value errors** are collected per field as [`ConfigError`]s and returned
//!   together as [`ConfigErrors`] once the whole target has been walked.

use std::error::Error as StdError;
use std::fmt;

use thiserror::Error;

/// Boxed error produced by converters, validators, and key sources.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Fatal errors that stop a load, plus the aggregate of collected value errors.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no handler registered for type `{type_name}` (field {path})")]
    NoHandler {
        path: String,
        type_name: &'static str,
    },

    #[error("field {path} cannot be bound but declares key '{key}'")]
    Unbindable { path: String, key: String },

    #[error("cannot build pipeline for field {path}: {source}")]
    Build { path: String, source: BuildError },

    #[error("handler for field {path} produced a value that is not a `{expected}`")]
    TypeMismatch {
        path: String,
        expected: &'static str,
    },

    #[error("key source failed for '{key}': {source}")]
    Source { key: String, source: SourceError },

    #[error(transparent)]
    Invalid(#[from] ConfigErrors),
}

impl LoadError {
    /// Returns the collected value errors if this is an aggregate.
    pub fn config_errors(&self) -> Option<&ConfigErrors> {
        match self {
            LoadError::Invalid(errors) => Some(errors),
            _ => None,
        }
    }

    /// Whether this error aborted the load rather than reporting bad values.
    pub fn is_setup(&self) -> bool {
        !matches!(self, LoadError::Invalid(_))
    }
}

/// Raised while turning a handler plus metadata into a pipeline.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    #[error("invalid '{annotation}' annotation '{value}': {reason}")]
    InvalidAnnotation {
        annotation: String,
        value: String,
        reason: String,
    },

    #[error("incompatible type conversion from `{from}` to `{to}`")]
    IncompatibleCast {
        from: &'static str,
        to: &'static str,
    },

    #[error("{0}")]
    Custom(String),
}

/// Raised by a [`KeySource`](crate::KeySource) when the backend itself fails.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("value of '{key}' is not valid unicode")]
    NotUnicode { key: String },

    #[error("lookup cancelled")]
    Cancelled,

    #[error("Failed to parse TOML source: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Flatten(#[from] crate::flatten::FlattenError),

    #[error(transparent)]
    Custom(BoxError),
}

/// Built-in validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("value is below minimum {min}")]
    BelowMin { min: String },

    #[error("value is above maximum {max}")]
    AboveMax { max: String },

    #[error("value does not match pattern '{pattern}'")]
    PatternMismatch { pattern: String },

    #[error("invalid value: `{0}`")]
    InvalidChoice(String),
}

/// The key was not present in the source at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no configuration found for this key")]
pub struct MissingKey;

/// The key was absent or resolved to an empty value on a required field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("missing or blank value")]
pub struct MissingValue;

/// A value error attributed to the key it was read from.
#[derive(Debug)]
pub struct ConfigError {
    key: String,
    source: BoxError,
}

impl ConfigError {
    pub fn new(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying error, for downcasting.
    pub fn error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self.source.as_ref()
    }

    /// Whether the underlying error is an `E`, e.g. [`MissingKey`].
    pub fn is<E: StdError + 'static>(&self) -> bool {
        self.source.downcast_ref::<E>().is_some()
    }

    /// The underlying message without a redundant `invalid value for <key>: ` prefix.
    pub fn message(&self) -> String {
        let message = self.source.to_string();
        let redundant = format!("invalid value for {}: ", self.key);
        match message.strip_prefix(&redundant) {
            Some(rest) => rest.to_string(),
            None => message,
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.key, self.message())
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.source.as_ref())
    }
}

/// Every value error from one load, in field visitation order.
#[derive(Debug, Default)]
pub struct ConfigErrors(Vec<ConfigError>);

impl ConfigErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ConfigError) {
        self.0.push(error);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigError> {
        self.0.iter()
    }

    /// First error recorded for `key`.
    pub fn get(&self, key: &str) -> Option<&ConfigError> {
        self.0.iter().find(|e| e.key == key)
    }

    pub fn keys(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.key.as_str()).collect()
    }

    /// `Ok(())` when nothing was collected, otherwise the aggregate.
    pub fn into_result(self) -> Result<(), ConfigErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl StdError for ConfigErrors {}

impl IntoIterator for ConfigErrors {
    type Item = ConfigError;
    type IntoIter = std::vec::IntoIter<ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigErrors {
    type Item = &'a ConfigError;
    type IntoIter = std::slice::Iter<'a, ConfigError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
