//! Built-in handler catalog, installed into the global registry's root.

use std::any::type_name;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::BoxError;
use crate::handler::{ErasedHandler, KindHandler, TypedHandler};
use crate::pipeline;
use crate::registry::Registry;
use crate::types::{Kind, Repr, TypeInfo};

/// Install every built-in exact handler and category factory.
pub(crate) fn install(registry: &mut Registry) {
    macro_rules! ordered_parse {
        ($($t:ty),*) => {$(
            registry.register(
                TypedHandler::<$t>::from_fn(parse::<$t>).with_wrapper(pipeline::ordered()),
            );
        )*};
    }

    ordered_parse!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64, char);

    registry.register(TypedHandler::from_fn(parse_bool).with_wrapper(pipeline::pattern()));
    registry.register(
        TypedHandler::from_fn(|raw| Ok(raw.to_string())).with_wrapper(pipeline::ordered::<String>()),
    );
    registry.register(
        TypedHandler::from_fn(|raw| Ok(PathBuf::from(raw)))
            .with_wrapper(pipeline::ordered::<PathBuf>()),
    );
    registry.register(
        TypedHandler::<IpAddr>::from_fn(parse::<IpAddr>).with_wrapper(pipeline::pattern()),
    );
    registry.register(
        TypedHandler::<SocketAddr>::from_fn(parse::<SocketAddr>).with_wrapper(pipeline::pattern()),
    );

    #[cfg(feature = "humantime")]
    registry.register(
        TypedHandler::from_fn(parse_duration)
            .with_wrapper(pipeline::ordered::<std::time::Duration>()),
    );

    #[cfg(feature = "url")]
    registry.register(
        TypedHandler::<url::Url>::from_fn(|raw| Ok(url::Url::parse(raw)?))
            .with_wrapper(pipeline::pattern()),
    );

    registry
        .register_kind(Kind::Int, int_factory)
        .register_kind(Kind::Uint, uint_factory)
        .register_kind(Kind::Float, float_factory)
        .register_kind(Kind::Bool, bool_factory)
        .register_kind(Kind::String, string_factory)
        .register_kind(Kind::Structured, json_factory);
}

fn parse<T>(raw: &str) -> Result<T, BoxError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse::<T>()
        .map_err(|e| format!("cannot parse {raw:?} as {}: {e}", type_name::<T>()).into())
}

/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub fn parse_bool(raw: &str) -> Result<bool, BoxError> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(format!("cannot parse {raw:?} as bool").into()),
    }
}

/// Human-friendly durations such as `1h30m`, `250ms`, or `2days`.
#[cfg(feature = "humantime")]
pub fn parse_duration(raw: &str) -> Result<std::time::Duration, BoxError> {
    humantime::parse_duration(raw).map_err(|e| format!("cannot parse {raw:?} as duration: {e}").into())
}

fn kind_handler(ty: &TypeInfo, inner: TypedHandler<Repr>) -> Arc<dyn ErasedHandler> {
    Arc::new(KindHandler { inner, target: *ty })
}

pub(crate) fn int_factory(ty: &TypeInfo) -> Arc<dyn ErasedHandler> {
    let bits = ty.bits;
    let inner = TypedHandler::from_fn(move |raw| {
        let repr = Repr::Int(parse::<i64>(raw)?);
        repr.check_width(bits)?;
        Ok(repr)
    });
    kind_handler(ty, inner.with_wrapper(pipeline::ordered()))
}

pub(crate) fn uint_factory(ty: &TypeInfo) -> Arc<dyn ErasedHandler> {
    let bits = ty.bits;
    let inner = TypedHandler::from_fn(move |raw| {
        let repr = Repr::Uint(parse::<u64>(raw)?);
        repr.check_width(bits)?;
        Ok(repr)
    });
    kind_handler(ty, inner.with_wrapper(pipeline::ordered()))
}

pub(crate) fn float_factory(ty: &TypeInfo) -> Arc<dyn ErasedHandler> {
    let bits = ty.bits;
    let inner = TypedHandler::from_fn(move |raw| {
        let repr = Repr::Float(parse::<f64>(raw)?);
        repr.check_width(bits)?;
        Ok(repr)
    });
    kind_handler(ty, inner.with_wrapper(pipeline::ordered()))
}

pub(crate) fn bool_factory(ty: &TypeInfo) -> Arc<dyn ErasedHandler> {
    let inner = TypedHandler::from_fn(|raw| parse_bool(raw).map(Repr::Bool));
    kind_handler(ty, inner.with_wrapper(pipeline::pattern()))
}

pub(crate) fn string_factory(ty: &TypeInfo) -> Arc<dyn ErasedHandler> {
    let inner = TypedHandler::from_fn(|raw| Ok(Repr::Str(raw.to_string())));
    kind_handler(ty, inner.with_wrapper(pipeline::ordered()))
}

pub(crate) fn json_factory(ty: &TypeInfo) -> Arc<dyn ErasedHandler> {
    let inner = TypedHandler::from_fn(|raw| {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))?;
        Ok(Repr::Json(value))
    });
    kind_handler(ty, inner.with_wrapper(pipeline::pattern()))
}
