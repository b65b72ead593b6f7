use std::collections::HashMap;
use std::env::VarError;

use crate::error::SourceError;
use crate::source::{Context, KeySource};

/// Key source backed by environment variables.
///
/// Keys are looked up verbatim, after an optional prefix: with
/// `EnvSource::with_prefix("APP_")` the key `PORT` reads `APP_PORT`.
/// A variable that is set to a non-UTF-8 value is a source error rather than
/// an absent key.
#[derive(Debug, Clone, Default)]
pub struct EnvSource {
    prefix: String,
    snapshot: Option<HashMap<String, String>>,
}

impl EnvSource {
    /// Read the live process environment.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            snapshot: None,
        }
    }

    /// Read from a fixed set of variables instead of the process environment.
    ///
    /// Takes an iterator so tests can pass synthetic data instead of `std::env::vars()`.
    pub fn from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            prefix: String::new(),
            snapshot: Some(vars.into_iter().collect()),
        }
    }

    /// Replace the prefix, keeping the variable set.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    fn var_name(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

impl KeySource for EnvSource {
    fn lookup(&self, ctx: &Context, key: &str) -> Result<Option<String>, SourceError> {
        if ctx.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        let name = self.var_name(key);
        if let Some(vars) = &self.snapshot {
            return Ok(vars.get(&name).cloned());
        }
        match std::env::var(&name) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(_)) => Err(SourceError::NotUnicode { key: name }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn get(source: &EnvSource, key: &str) -> Option<String> {
        source.lookup(&Context::new(), key).unwrap()
    }

    #[test]
    fn snapshot_lookup() {
        let source = EnvSource::from_vars(vars(&[("HOST", "0.0.0.0")]));
        assert_eq!(get(&source, "HOST").as_deref(), Some("0.0.0.0"));
        assert_eq!(get(&source, "PORT"), None);
    }

    #[test]
    fn empty_value_is_present() {
        let source = EnvSource::from_vars(vars(&[("HOST", "")]));
        assert_eq!(get(&source, "HOST").as_deref(), Some(""));
    }

    #[test]
    fn prefix_is_prepended() {
        let source = EnvSource::from_vars(vars(&[("MYAPP_PORT", "8080"), ("PORT", "1")])).prefix("MYAPP_");
        assert_eq!(get(&source, "PORT").as_deref(), Some("8080"));
    }

    #[test]
    fn keys_are_case_sensitive() {
        let source = EnvSource::from_vars(vars(&[("PORT", "8080")]));
        assert_eq!(get(&source, "port"), None);
    }

    #[test]
    fn cancelled_context_is_source_error() {
        let source = EnvSource::from_vars(vars(&[("PORT", "8080")]));
        let ctx = Context::new();
        ctx.cancel();
        assert!(matches!(
            source.lookup(&ctx, "PORT"),
            Err(SourceError::Cancelled)
        ));
    }

    #[test]
    fn live_environment() {
        let name = "ENVBIND_TEST_LIVE_ENVIRONMENT_7F3A";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(name, "on") };
        let source = EnvSource::new();
        assert_eq!(get(&source, name).as_deref(), Some("on"));
        assert_eq!(get(&source, "ENVBIND_TEST_NEVER_SET_7F3A"), None);
        unsafe { std::env::remove_var(name) };
    }

    #[test]
    fn live_environment_with_prefix() {
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var("ENVBIND_PFX_9C1D_PORT", "9000") };
        let source = EnvSource::with_prefix("ENVBIND_PFX_9C1D_");
        assert_eq!(get(&source, "PORT").as_deref(), Some("9000"));
        unsafe { std::env::remove_var("ENVBIND_PFX_9C1D_PORT") };
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_value_is_source_error() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = "ENVBIND_TEST_NOT_UNICODE_52B8";
        // SAFETY: the variable name is unique to this test.
        unsafe { std::env::set_var(name, OsStr::from_bytes(&[0x66, 0x6f, 0x80])) };
        let err = EnvSource::new().lookup(&Context::new(), name).unwrap_err();
        unsafe { std::env::remove_var(name) };
        match err {
            SourceError::NotUnicode { key } => assert_eq!(key, name),
            other => panic!("Expected NotUnicode, got: {other:?}"),
        }
    }
}
