//! Build new handlers out of existing ones.
//!
//! Everything here stays fully typed; erasure only happens when the result
//! is registered.

use std::sync::Arc;

use crate::error::{BoxError, BuildError, ValidationError};
use crate::handler::TypedHandler;
use crate::leaf::Leaf;
use crate::meta::Metadata;
use crate::pipeline::{self, Converter, Validator, Wrapper};

/// Keep `handler`'s converter and run `validators` after its own
/// metadata-driven validation.
pub fn add_validators<T: 'static>(
    handler: TypedHandler<T>,
    validators: Vec<Validator<T>>,
) -> TypedHandler<T> {
    let extra: Wrapper<T> = Arc::new(move |_: &Metadata, converter: Converter<T>| -> Result<Converter<T>, BuildError> {
        Ok(pipeline::pipe_multiple(converter, validators.clone()))
    });
    let wrapper = match handler.wrapper {
        Some(own) => pipeline::compose_wrappers(vec![own, extra]),
        None => extra,
    };
    TypedHandler {
        converter: handler.converter,
        wrapper: Some(wrapper),
        broken: handler.broken,
    }
}

/// Swap the converter, keeping the metadata wrapper so `min`, `max`, and
/// `pattern` apply to the new converter's output.
pub fn replace_parser<T: 'static>(handler: TypedHandler<T>, converter: Converter<T>) -> TypedHandler<T> {
    TypedHandler {
        converter: Some(converter),
        wrapper: handler.wrapper,
        broken: handler.broken,
    }
}

/// Reuse a handler for `B` as a handler for `T`.
///
/// `B` and `T` must have convertible kinds (both string-like, both numeric,
/// or both boolean). Otherwise the returned handler fails every build with
/// [`BuildError::IncompatibleCast`]. Values cross over through their kind
/// representation, with range checks.
pub fn cast_handler<B: Leaf, T: Leaf>(handler: TypedHandler<B>) -> TypedHandler<T> {
    if !B::KIND.convertible_to(T::KIND) {
        return TypedHandler::broken(BuildError::IncompatibleCast {
            from: std::any::type_name::<B>(),
            to: std::any::type_name::<T>(),
        });
    }
    if let Some(broken) = handler.broken {
        return TypedHandler::broken(broken);
    }

    let converter = handler
        .converter
        .map(|from_b| -> Converter<T> { Arc::new(move |raw: &str| cast::<B, T>(from_b(raw)?)) });

    let wrapper = handler.wrapper.map(|wrap_b| -> Wrapper<T> {
        Arc::new(move |meta: &Metadata, from_t: Converter<T>| -> Result<Converter<T>, BuildError> {
            let as_b: Converter<B> = Arc::new(move |raw: &str| cast::<T, B>(from_t(raw)?));
            let wrapped = wrap_b(meta, as_b)?;
            let back: Converter<T> = Arc::new(move |raw: &str| cast::<B, T>(wrapped(raw)?));
            Ok(back)
        })
    });

    TypedHandler {
        converter,
        wrapper,
        broken: None,
    }
}

fn cast<F: Leaf, T: Leaf>(value: F) -> Result<T, BoxError> {
    let repr = value
        .into_repr()
        .ok_or_else(|| format!("`{}` has no kind representation", std::any::type_name::<F>()))?;
    T::from_repr(repr.coerce(T::KIND, T::BITS)?)
}

/// A string handler that accepts only `values`, compared exactly.
pub fn enum_handler<I, S>(values: I) -> TypedHandler<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let allowed: Vec<String> = values.into_iter().map(Into::into).collect();
    TypedHandler::from_fn(move |raw| {
        if allowed.iter().any(|v| v == raw) {
            Ok(raw.to_string())
        } else {
            Err(ValidationError::InvalidChoice(raw.to_string()).into())
        }
    })
    .with_wrapper(pipeline::pattern())
}

/// A handler mapping exact names to values, e.g. for fieldless enums.
pub fn enum_map<T, I, S>(pairs: I) -> TypedHandler<T>
where
    T: Clone + Send + Sync + 'static,
    I: IntoIterator<Item = (S, T)>,
    S: Into<String>,
{
    let table: Vec<(String, T)> = pairs.into_iter().map(|(k, v)| (k.into(), v)).collect();
    TypedHandler::from_fn(move |raw| {
        table
            .iter()
            .find(|(name, _)| name == raw)
            .map(|(_, value)| value.clone())
            .ok_or_else(|| ValidationError::InvalidChoice(raw.to_string()).into())
    })
    .with_wrapper(pipeline::pattern())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Kind, Repr};

    fn u32_handler() -> TypedHandler<u32> {
        TypedHandler::from_fn(|raw| Ok(raw.parse::<u32>()?)).with_wrapper(pipeline::ordered())
    }

    fn build<T: 'static>(handler: &TypedHandler<T>, meta: Metadata) -> pipeline::Pipeline<T> {
        handler.build(&meta).unwrap().unwrap()
    }

    #[test]
    fn added_validators_run_after_metadata_validation() {
        let odd_only = pipeline::validator(|v: &u32| {
            if v % 2 == 1 { Ok(()) } else { Err("must be odd".into()) }
        });
        let handler = add_validators(u32_handler(), vec![odd_only]);
        let p = build(&handler, crate::meta!(max = 10));
        assert_eq!(p("7").unwrap(), 7);
        assert_eq!(p("4").unwrap_err().to_string(), "must be odd");
        let above = p("11").unwrap_err();
        assert!(above.downcast_ref::<ValidationError>().is_some());
    }

    #[test]
    fn added_validators_without_own_wrapper() {
        let handler = TypedHandler::from_fn(|raw| Ok(raw.to_string()));
        let non_empty = pipeline::validator(|v: &String| {
            if v.is_empty() { Err("empty".into()) } else { Ok(()) }
        });
        let p = build(&add_validators(handler, vec![non_empty]), Metadata::new());
        assert!(p("").is_err());
        assert_eq!(p("x").unwrap(), "x");
    }

    #[test]
    fn replaced_parser_keeps_bounds() {
        let hex = pipeline::converter(|raw: &str| Ok(u32::from_str_radix(raw, 16)?));
        let handler = replace_parser(u32_handler(), hex);
        // Bounds are parsed with the new converter too.
        let p = build(&handler, crate::meta!(max = "ff"));
        assert_eq!(p("a0").unwrap(), 160);
        assert!(p("100").is_err());
    }

    #[test]
    fn replace_parser_completes_a_modifier() {
        let modifier = TypedHandler::<u32>::modifier(pipeline::bounds());
        assert!(modifier.build(&Metadata::new()).unwrap().is_none());
        let handler = replace_parser(modifier, pipeline::converter(|raw: &str| Ok(raw.len() as u32)));
        let p = build(&handler, crate::meta!(min = "xx"));
        assert_eq!(p("abc").unwrap(), 3);
        assert!(p("a").is_err());
    }

    #[test]
    fn cast_between_numeric_kinds() {
        #[derive(Debug, PartialEq)]
        struct Millis(u64);
        impl Leaf for Millis {
            const KIND: Kind = Kind::Uint;
            const BITS: u32 = 64;
            fn from_repr(repr: Repr) -> Result<Self, BoxError> {
                u64::from_repr(repr).map(Millis)
            }
            fn into_repr(self) -> Option<Repr> {
                Some(Repr::Uint(self.0))
            }
        }

        let handler = cast_handler::<u32, Millis>(u32_handler());
        let p = build(&handler, crate::meta!(min = 10));
        assert_eq!(p("250").unwrap(), Millis(250));
        assert!(p("5").is_err());
        assert!(p("x").is_err());
    }

    #[test]
    fn cast_narrowing_is_range_checked() {
        let handler = cast_handler::<u32, u8>(u32_handler());
        let p = build(&handler, Metadata::new());
        assert_eq!(p("200").unwrap(), 200u8);
        assert!(p("300").is_err());
    }

    #[test]
    fn incompatible_cast_fails_every_build() {
        let handler = cast_handler::<u32, String>(u32_handler());
        match handler.build(&Metadata::new()) {
            Err(BuildError::IncompatibleCast { from, to }) => {
                assert_eq!(from, "u32");
                assert!(to.ends_with("String"));
            }
            other => panic!("Expected IncompatibleCast, got: {:?}", other.map(|p| p.is_some())),
        }
    }

    #[test]
    fn enum_handler_is_exact_and_case_sensitive() {
        let handler = enum_handler(["debug", "info", "warn"]);
        let p = build(&handler, Metadata::new());
        assert_eq!(p("info").unwrap(), "info");
        let err = p("INFO").unwrap_err();
        assert_eq!(err.to_string(), "invalid value: `INFO`");
    }

    #[test]
    fn enum_map_yields_values() {
        #[derive(Debug, Clone, PartialEq)]
        enum Mode {
            Fast,
            Slow,
        }
        let handler = enum_map([("fast", Mode::Fast), ("slow", Mode::Slow)]);
        let p = build(&handler, Metadata::new());
        assert_eq!(p("slow").unwrap(), Mode::Slow);
        assert!(p("medium").is_err());
    }
}
