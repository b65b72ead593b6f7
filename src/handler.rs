//! Typed handlers and the type-erased adapter the registry stores.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{BoxError, BuildError};
use crate::meta::Metadata;
use crate::pipeline::{self, Converter, Pipeline, Wrapper};
use crate::types::{BoxedValue, Repr, TypeInfo};

/// A converter plus the metadata-driven wrapper that adds validation to it.
///
/// A handler with no converter can only modify: [`build`](Self::build)
/// returns `Ok(None)` for it. A handler with no wrapper ignores metadata.
pub struct TypedHandler<T> {
    pub(crate) converter: Option<Converter<T>>,
    pub(crate) wrapper: Option<Wrapper<T>>,
    pub(crate) broken: Option<BuildError>,
}

impl<T> Clone for TypedHandler<T> {
    fn clone(&self) -> Self {
        Self {
            converter: self.converter.clone(),
            wrapper: self.wrapper.clone(),
            broken: self.broken.clone(),
        }
    }
}

impl<T> fmt::Debug for TypedHandler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedHandler")
            .field("type", &std::any::type_name::<T>())
            .field("converter", &self.converter.is_some())
            .field("wrapper", &self.wrapper.is_some())
            .field("broken", &self.broken)
            .finish()
    }
}

impl<T: 'static> TypedHandler<T> {
    pub fn new(converter: Converter<T>) -> Self {
        Self {
            converter: Some(converter),
            wrapper: None,
            broken: None,
        }
    }

    /// Handler from a plain conversion function.
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&str) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        Self::new(pipeline::converter(f))
    }

    /// A modification-only handler: it carries a wrapper but cannot
    /// originate a pipeline until a converter is supplied.
    pub fn modifier(wrapper: Wrapper<T>) -> Self {
        Self {
            converter: None,
            wrapper: Some(wrapper),
            broken: None,
        }
    }

    /// A handler whose every build fails with `error`.
    pub fn broken(error: BuildError) -> Self {
        Self {
            converter: None,
            wrapper: None,
            broken: Some(error),
        }
    }

    pub fn with_wrapper(mut self, wrapper: Wrapper<T>) -> Self {
        self.wrapper = Some(wrapper);
        self
    }

    pub fn converter(&self) -> Option<&Converter<T>> {
        self.converter.as_ref()
    }

    pub fn wrapper(&self) -> Option<&Wrapper<T>> {
        self.wrapper.as_ref()
    }

    /// Build the pipeline for one field.
    pub fn build(&self, meta: &Metadata) -> Result<Option<Pipeline<T>>, BuildError> {
        if let Some(error) = &self.broken {
            return Err(error.clone());
        }
        let Some(converter) = &self.converter else {
            return Ok(None);
        };
        match &self.wrapper {
            Some(wrap) => wrap(meta, converter.clone()).map(Some),
            None => Ok(Some(converter.clone())),
        }
    }
}

impl<T> TypedHandler<T>
where
    T: FromStr + 'static,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    /// Handler that parses with `FromStr`.
    pub fn from_parse() -> Self {
        Self::from_fn(|raw| Ok(raw.parse::<T>()?))
    }
}

/// Uniform output of an erased pipeline.
pub type ErasedPipeline = Arc<dyn Fn(&str) -> Result<BoxedValue, BoxError> + Send + Sync>;

/// Object-safe face of a handler, as stored in the registry.
pub trait ErasedHandler: Send + Sync {
    fn build(&self, meta: &Metadata) -> Result<Option<ErasedPipeline>, BuildError>;
}

impl<T: Send + 'static> ErasedHandler for TypedHandler<T> {
    fn build(&self, meta: &Metadata) -> Result<Option<ErasedPipeline>, BuildError> {
        let Some(typed) = TypedHandler::<T>::build(self, meta)? else {
            return Ok(None);
        };
        Ok(Some(Arc::new(move |raw: &str| {
            typed(raw).map(|v| Box::new(v) as BoxedValue)
        })))
    }
}

/// Erased handler produced by a category factory: it works on the kind's
/// [`Repr`] and decodes into the concrete field type as its last stage.
pub(crate) struct KindHandler {
    pub(crate) inner: TypedHandler<Repr>,
    pub(crate) target: TypeInfo,
}

impl ErasedHandler for KindHandler {
    fn build(&self, meta: &Metadata) -> Result<Option<ErasedPipeline>, BuildError> {
        let Some(typed) = self.inner.build(meta)? else {
            return Ok(None);
        };
        let target = self.target;
        Ok(Some(Arc::new(move |raw: &str| -> Result<BoxedValue, BoxError> {
            let repr = typed(raw)?;
            target.decode(repr)
        })))
    }
}

/// Box a typed handler for registry storage.
pub fn erase<T: Send + 'static>(handler: TypedHandler<T>) -> Arc<dyn ErasedHandler> {
    Arc::new(handler)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int_handler() -> TypedHandler<i64> {
        TypedHandler::from_fn(|raw| Ok(raw.parse::<i64>()?)).with_wrapper(pipeline::bounds())
    }

    #[test]
    fn build_applies_wrapper() {
        let p = int_handler().build(&crate::meta!(max = 5)).unwrap().unwrap();
        assert_eq!(p("5").unwrap(), 5);
        assert!(p("6").is_err());
    }

    #[test]
    fn modifier_builds_nothing() {
        let handler = TypedHandler::<i64>::modifier(pipeline::bounds());
        assert!(handler.build(&Metadata::new()).unwrap().is_none());
    }

    #[test]
    fn broken_handler_always_errors() {
        let handler = TypedHandler::<i64>::broken(BuildError::Custom("nope".into()));
        assert!(handler.build(&Metadata::new()).is_err());
    }

    #[test]
    fn erased_pipeline_boxes_values() {
        let erased = erase(int_handler());
        let p = erased.build(&Metadata::new()).unwrap().unwrap();
        let value = p("42").unwrap();
        assert_eq!(*value.downcast::<i64>().unwrap(), 42);
    }

    #[test]
    fn erased_build_propagates_setup_errors() {
        let erased = erase(int_handler());
        assert!(erased.build(&crate::meta!(min = "x")).is_err());
    }

    #[test]
    fn from_parse_uses_from_str() {
        let handler = TypedHandler::<std::net::IpAddr>::from_parse();
        let p = handler.build(&Metadata::new()).unwrap().unwrap();
        assert!(p("127.0.0.1").unwrap().is_loopback());
        assert!(p("nope").is_err());
    }
}
