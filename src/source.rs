//! Key sources: where raw values come from.
//!
//! A [`KeySource`] answers one question per key: `Ok(Some(value))` when the key
//! is configured (possibly as the empty string), `Ok(None)` when it is not
//! configured at all, and `Err` when the backend itself failed. Errors are
//! never collected; they abort the load.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::error::SourceError;
use crate::flatten;

/// Cancellation token handed to every lookup.
///
/// The loader never checks it itself; honoring it is up to the source.
#[derive(Debug, Clone, Default)]
pub struct Context {
    cancelled: Arc<AtomicBool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel this context and every clone of it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub trait KeySource: Send + Sync {
    fn lookup(&self, ctx: &Context, key: &str) -> Result<Option<String>, SourceError>;
}

impl<F> KeySource for F
where
    F: Fn(&Context, &str) -> Result<Option<String>, SourceError> + Send + Sync,
{
    fn lookup(&self, ctx: &Context, key: &str) -> Result<Option<String>, SourceError> {
        self(ctx, key)
    }
}

/// Combinators available on every sized source.
pub trait KeySourceExt: KeySource + Sized + 'static {
    /// Try `self`, then `next` if the key is not configured in `self`.
    fn or<S: KeySource + 'static>(self, next: S) -> Chain {
        Chain::new().then(self).then(next)
    }

    /// Prepend `prefix` to every key before looking it up in `self`.
    fn prefixed(self, prefix: impl Into<String>) -> Prefixed<Self> {
        Prefixed {
            prefix: prefix.into(),
            inner: self,
        }
    }
}

impl<S: KeySource + Sized + 'static> KeySourceExt for S {}

/// Sources tried in order. The first configured value or the first error wins.
#[derive(Default)]
pub struct Chain {
    sources: Vec<Box<dyn KeySource>>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then<S: KeySource + 'static>(mut self, source: S) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

impl KeySource for Chain {
    fn lookup(&self, ctx: &Context, key: &str) -> Result<Option<String>, SourceError> {
        for source in &self.sources {
            if let Some(value) = source.lookup(ctx, key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

/// Build a [`Chain`] from boxed sources.
///
/// ```
/// use envbind::{chain, EnvSource, KeySource, MapSource};
///
/// let defaults = MapSource::from_iter([("PORT", "8080")]);
/// let sources: [Box<dyn KeySource>; 2] = [Box::new(EnvSource::new()), Box::new(defaults)];
/// let source = chain(sources);
/// ```
pub fn chain<I>(sources: I) -> Chain
where
    I: IntoIterator<Item = Box<dyn KeySource>>,
{
    Chain {
        sources: sources.into_iter().collect(),
    }
}

/// Looks up `prefix + key` in the inner source.
pub struct Prefixed<S> {
    prefix: String,
    inner: S,
}

impl<S> Prefixed<S> {
    pub fn new(prefix: impl Into<String>, inner: S) -> Self {
        Self {
            prefix: prefix.into(),
            inner,
        }
    }
}

impl<S: KeySource> KeySource for Prefixed<S> {
    fn lookup(&self, ctx: &Context, key: &str) -> Result<Option<String>, SourceError> {
        self.inner.lookup(ctx, &format!("{}{key}", self.prefix))
    }
}

/// In-memory key source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSource {
    values: HashMap<String, String>,
}

impl MapSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Keys from a serializable value, struct fields joined with `.`.
    /// Sequences and maps are stored as JSON text; `None` fields are absent.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self, SourceError> {
        Ok(flatten::flatten(value)?.into_iter().collect())
    }

    /// Keys from a TOML document. Tables nest with `.`, arrays become JSON text.
    pub fn from_toml_str(document: &str) -> Result<Self, SourceError> {
        let table: toml::Table = toml::from_str(document)?;
        let mut source = Self::new();
        insert_toml(&mut source.values, "", &table)?;
        Ok(source)
    }
}

fn insert_toml(
    values: &mut HashMap<String, String>,
    prefix: &str,
    table: &toml::Table,
) -> Result<(), SourceError> {
    for (key, value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        let raw = match value {
            toml::Value::Table(nested) => {
                insert_toml(values, &path, nested)?;
                continue;
            }
            toml::Value::String(s) => s.clone(),
            toml::Value::Integer(i) => i.to_string(),
            toml::Value::Float(f) => f.to_string(),
            toml::Value::Boolean(b) => b.to_string(),
            toml::Value::Datetime(d) => d.to_string(),
            toml::Value::Array(_) => serde_json::to_string(value)
                .map_err(|e| SourceError::Custom(format!("{path}: {e}").into()))?,
        };
        values.insert(path, raw);
    }
    Ok(())
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapSource {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl KeySource for MapSource {
    fn lookup(&self, _ctx: &Context, key: &str) -> Result<Option<String>, SourceError> {
        Ok(self.values.get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn get(source: &dyn KeySource, key: &str) -> Result<Option<String>, SourceError> {
        source.lookup(&Context::new(), key)
    }

    #[test]
    fn context_cancel_is_shared_by_clones() {
        let ctx = Context::new();
        let clone = ctx.clone();
        assert!(!clone.is_cancelled());
        ctx.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn closure_is_a_source() {
        let source = |_: &Context, key: &str| -> Result<Option<String>, SourceError> {
            Ok((key == "A").then(|| "1".to_string()))
        };
        assert_eq!(get(&source, "A").unwrap().as_deref(), Some("1"));
        assert_eq!(get(&source, "B").unwrap(), None);
    }

    #[test]
    fn chain_takes_first_configured_value() {
        let first = MapSource::from_iter([("A", "")]);
        let second = MapSource::from_iter([("A", "second"), ("B", "second")]);
        let source = first.or(second);
        // Configured-as-empty counts as configured.
        assert_eq!(get(&source, "A").unwrap().as_deref(), Some(""));
        assert_eq!(get(&source, "B").unwrap().as_deref(), Some("second"));
        assert_eq!(get(&source, "C").unwrap(), None);
    }

    #[test]
    fn chain_stops_at_first_error() {
        let failing = |_: &Context, _: &str| -> Result<Option<String>, SourceError> {
            Err(SourceError::Custom("backend down".into()))
        };
        let never = |_: &Context, _: &str| -> Result<Option<String>, SourceError> {
            panic!("should not be consulted")
        };
        let sources: [Box<dyn KeySource>; 2] = [Box::new(failing), Box::new(never)];
        let source = chain(sources);
        assert_eq!(get(&source, "A").unwrap_err().to_string(), "backend down");
    }

    #[test]
    fn empty_chain_has_nothing() {
        let source = Chain::new();
        assert!(source.is_empty());
        assert_eq!(get(&source, "A").unwrap(), None);
    }

    #[test]
    fn prefixed_source() {
        let source = MapSource::from_iter([("APP_PORT", "80")]).prefixed("APP_");
        assert_eq!(get(&source, "PORT").unwrap().as_deref(), Some("80"));
        assert_eq!(get(&source, "APP_PORT").unwrap(), None);
    }

    #[test]
    fn map_source_from_serialize() {
        #[derive(Serialize)]
        struct Defaults {
            port: u16,
            tags: Vec<String>,
            token: Option<String>,
        }
        let source = MapSource::from_serialize(&Defaults {
            port: 8080,
            tags: vec!["a".into()],
            token: None,
        })
        .unwrap();
        assert_eq!(source.get("port"), Some("8080"));
        assert_eq!(source.get("tags"), Some(r#"["a"]"#));
        assert_eq!(source.get("token"), None);
    }

    #[test]
    fn map_source_from_toml() {
        let source = MapSource::from_toml_str(
            r#"
            port = 8080
            debug = true
            hosts = ["a", "b"]

            [database]
            url = "pg://db"
            "#,
        )
        .unwrap();
        assert_eq!(source.get("port"), Some("8080"));
        assert_eq!(source.get("debug"), Some("true"));
        assert_eq!(source.get("hosts"), Some(r#"["a","b"]"#));
        assert_eq!(source.get("database.url"), Some("pg://db"));
        assert_eq!(source.len(), 4);
    }

    #[test]
    fn invalid_toml_is_source_error() {
        let err = MapSource::from_toml_str("port = ").unwrap_err();
        assert!(matches!(err, SourceError::Toml(_)));
    }
}
