//! Per-field metadata annotations.
//!
//! A [`Metadata`] is the ordered set of named string values attached to one
//! field. The walker reads `key`, `default`, `required`, and `key_required`;
//! handler wrappers read `min`, `max`, `pattern`, and anything custom.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::error::BuildError;

pub const KEY: &str = "key";
pub const DEFAULT: &str = "default";
pub const REQUIRED: &str = "required";
pub const KEY_REQUIRED: &str = "key_required";
/// Camel-case spelling of [`KEY_REQUIRED`], accepted as an alias.
pub const KEY_REQUIRED_ALIAS: &str = "keyRequired";
pub const MIN: &str = "min";
pub const MAX: &str = "max";
pub const PATTERN: &str = "pattern";

/// Ordered annotation map for a single field. Later entries with the same
/// name shadow earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: Vec<(String, String)>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation, builder style.
    pub fn with(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl ToString) {
        self.entries.push((name.into(), value.to_string()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The last entry named by any of `names`.
    fn get_any(&self, names: &[&str]) -> Option<(&str, &str)> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| names.contains(&n.as_str()))
            .map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Boolean annotation: `true`/`1` or `false`/`0`, case-insensitive. A
    /// missing annotation is `false`; anything else is an invalid annotation.
    pub fn flag(&self, name: &str) -> Result<bool, BuildError> {
        self.flag_any(&[name])
    }

    fn flag_any(&self, names: &[&str]) -> Result<bool, BuildError> {
        let Some((name, value)) = self.get_any(names) else {
            return Ok(false);
        };
        match value.to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(BuildError::InvalidAnnotation {
                annotation: name.to_string(),
                value: value.to_string(),
                reason: "expected true, false, 1 or 0".to_string(),
            }),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.get(KEY)
    }

    pub fn default_value(&self) -> Option<&str> {
        self.get(DEFAULT)
    }

    pub fn required(&self) -> Result<bool, BuildError> {
        self.flag(REQUIRED)
    }

    /// Also reads the `keyRequired` spelling.
    pub fn key_required(&self) -> Result<bool, BuildError> {
        self.flag_any(&[KEY_REQUIRED, KEY_REQUIRED_ALIAS])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for Metadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{name}=\"")?;
            for c in value.chars() {
                if matches!(c, '"' | '\\') {
                    write!(f, "\\")?;
                }
                write!(f, "{c}")?;
            }
            write!(f, "\"")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed annotation at byte {position}: {reason}")]
pub struct MetadataParseError {
    pub position: usize,
    pub reason: &'static str,
}

/// Parses tag strings such as `key="PORT" default=8080 required`.
///
/// Values may be bare words or double-quoted with `\"` and `\\` escapes.
/// A bare name is shorthand for `name="true"`.
impl FromStr for Metadata {
    type Err = MetadataParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut meta = Metadata::new();
        let mut chars = s.char_indices().peekable();

        loop {
            while chars.next_if(|(_, c)| c.is_whitespace()).is_some() {}
            let Some(&(start, _)) = chars.peek() else {
                break;
            };

            let mut name = String::new();
            while let Some((_, c)) = chars.next_if(|(_, c)| *c != '=' && !c.is_whitespace()) {
                name.push(c);
            }
            if name.is_empty() {
                return Err(MetadataParseError {
                    position: start,
                    reason: "expected annotation name",
                });
            }

            if chars.next_if(|(_, c)| *c == '=').is_none() {
                meta.insert(name, "true");
                continue;
            }

            let value = match chars.peek() {
                Some(&(quote_at, '"')) => {
                    chars.next();
                    let mut value = String::new();
                    let mut closed = false;
                    while let Some((_, c)) = chars.next() {
                        match c {
                            '"' => {
                                closed = true;
                                break;
                            }
                            '\\' => match chars.next() {
                                Some((_, escaped)) => value.push(escaped),
                                None => break,
                            },
                            other => value.push(other),
                        }
                    }
                    if !closed {
                        return Err(MetadataParseError {
                            position: quote_at,
                            reason: "unterminated quoted value",
                        });
                    }
                    value
                }
                _ => {
                    let mut value = String::new();
                    while let Some((_, c)) = chars.next_if(|(_, c)| !c.is_whitespace()) {
                        value.push(c);
                    }
                    value
                }
            };
            meta.insert(name, value);
        }

        Ok(meta)
    }
}

/// Build a [`Metadata`] from `name = value` pairs and bare flags.
///
/// ```
/// let meta = envbind::meta!(key = "PORT", default = 8080, required);
/// assert_eq!(meta.key(), Some("PORT"));
/// assert_eq!(meta.default_value(), Some("8080"));
/// assert!(meta.required().unwrap());
/// ```
#[macro_export]
macro_rules! meta {
    (@value) => {
        "true"
    };
    (@value $value:expr) => {
        $value
    };
    () => {
        $crate::Metadata::new()
    };
    ($($name:ident $(= $value:expr)?),+ $(,)?) => {
        $crate::Metadata::new()
            $(.with(stringify!($name), $crate::meta!(@value $($value)?)))+
    };
}
