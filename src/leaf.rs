//! The [`Leaf`] trait: what a field type must provide to be bound from a string.

use std::collections::{BTreeMap, HashMap};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::BoxError;
use crate::types::{BoxedValue, Kind, Repr, TypeInfo};

/// A type that can be the target of a single key.
///
/// Types with an exact handler in the registry only need an empty impl.
/// Types that should bind through a category fallback set [`KIND`](Self::KIND)
/// (and [`BITS`](Self::BITS) for numbers) and implement
/// [`from_repr`](Self::from_repr):
///
/// ```
/// use envbind::{BoxError, Kind, Leaf, Repr};
///
/// struct Port(u16);
///
/// impl Leaf for Port {
///     const KIND: Kind = Kind::Uint;
///     const BITS: u32 = 16;
///
///     fn from_repr(repr: Repr) -> Result<Self, BoxError> {
///         match repr {
///             Repr::Uint(v) => Ok(Port(u16::try_from(v)?)),
///             other => Err(format!("expected a port, got {other}").into()),
///         }
///     }
/// }
/// ```
pub trait Leaf: Sized + Send + 'static {
    const KIND: Kind = Kind::Opaque;
    /// Bit width for numeric kinds, 0 otherwise.
    const BITS: u32 = 0;

    /// The pointed-to type for pointer-like wrappers.
    fn pointee() -> Option<TypeInfo> {
        None
    }

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        Err(format!(
            "`{}` cannot be built from {:?}",
            std::any::type_name::<Self>(),
            repr.kind()
        )
        .into())
    }

    fn into_repr(self) -> Option<Repr> {
        None
    }

    /// Recover a value from a pipeline's output. Gives the value back when it
    /// is not something this type can be assigned from.
    fn from_boxed(value: BoxedValue) -> Result<Self, BoxedValue> {
        value.downcast::<Self>().map(|v| *v)
    }
}

macro_rules! int_leaf {
    ($($t:ty),*) => {$(
        impl Leaf for $t {
            const KIND: Kind = Kind::Int;
            const BITS: u32 = <$t>::BITS;

            fn from_repr(repr: Repr) -> Result<Self, BoxError> {
                match repr.coerce(Kind::Int, Self::BITS)? {
                    Repr::Int(v) => Ok(<$t>::try_from(v)?),
                    _ => unreachable!("coerce returns the requested kind"),
                }
            }

            fn into_repr(self) -> Option<Repr> {
                i64::try_from(self).ok().map(Repr::Int)
            }
        }
    )*};
}

macro_rules! uint_leaf {
    ($($t:ty),*) => {$(
        impl Leaf for $t {
            const KIND: Kind = Kind::Uint;
            const BITS: u32 = <$t>::BITS;

            fn from_repr(repr: Repr) -> Result<Self, BoxError> {
                match repr.coerce(Kind::Uint, Self::BITS)? {
                    Repr::Uint(v) => Ok(<$t>::try_from(v)?),
                    _ => unreachable!("coerce returns the requested kind"),
                }
            }

            fn into_repr(self) -> Option<Repr> {
                u64::try_from(self).ok().map(Repr::Uint)
            }
        }
    )*};
}

int_leaf!(i8, i16, i32, i64, isize);
uint_leaf!(u8, u16, u32, u64, usize);

impl Leaf for f32 {
    const KIND: Kind = Kind::Float;
    const BITS: u32 = 32;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        match repr.coerce(Kind::Float, Self::BITS)? {
            Repr::Float(v) => Ok(v as f32),
            _ => unreachable!("coerce returns the requested kind"),
        }
    }

    fn into_repr(self) -> Option<Repr> {
        Some(Repr::Float(self as f64))
    }
}

impl Leaf for f64 {
    const KIND: Kind = Kind::Float;
    const BITS: u32 = 64;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        match repr.coerce(Kind::Float, Self::BITS)? {
            Repr::Float(v) => Ok(v),
            _ => unreachable!("coerce returns the requested kind"),
        }
    }

    fn into_repr(self) -> Option<Repr> {
        Some(Repr::Float(self))
    }
}

impl Leaf for bool {
    const KIND: Kind = Kind::Bool;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        match repr {
            Repr::Bool(v) => Ok(v),
            other => Err(format!("expected a boolean, got {other}").into()),
        }
    }

    fn into_repr(self) -> Option<Repr> {
        Some(Repr::Bool(self))
    }
}

impl Leaf for String {
    const KIND: Kind = Kind::String;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        match repr {
            Repr::Str(v) => Ok(v),
            other => Err(format!("expected a string, got {other}").into()),
        }
    }

    fn into_repr(self) -> Option<Repr> {
        Some(Repr::Str(self))
    }
}

impl Leaf for PathBuf {
    const KIND: Kind = Kind::String;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        String::from_repr(repr).map(PathBuf::from)
    }

    fn into_repr(self) -> Option<Repr> {
        self.into_os_string().into_string().ok().map(Repr::Str)
    }
}

impl Leaf for char {}
impl Leaf for Duration {}
impl Leaf for IpAddr {}
impl Leaf for SocketAddr {}

#[cfg(feature = "url")]
impl Leaf for url::Url {}

/// Decode a [`Repr::Json`] into any deserializable type. Handy for
/// [`Leaf::from_repr`] impls of structured user types.
pub fn from_json_repr<T: DeserializeOwned>(repr: Repr) -> Result<T, BoxError> {
    match repr {
        Repr::Json(value) => Ok(serde_json::from_value(value)?),
        Repr::Str(text) => Ok(serde_json::from_str(&text)?),
        other => Err(format!("expected JSON, got {other}").into()),
    }
}

impl<T: DeserializeOwned + Send + 'static> Leaf for Vec<T> {
    const KIND: Kind = Kind::Structured;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        from_json_repr(repr)
    }
}

impl<V: DeserializeOwned + Send + 'static> Leaf for HashMap<String, V> {
    const KIND: Kind = Kind::Structured;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        from_json_repr(repr)
    }
}

impl<V: DeserializeOwned + Send + 'static> Leaf for BTreeMap<String, V> {
    const KIND: Kind = Kind::Structured;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        from_json_repr(repr)
    }
}

impl Leaf for serde_json::Value {
    const KIND: Kind = Kind::Structured;

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        from_json_repr(repr)
    }
}

impl<T: Leaf> Leaf for Option<T> {
    const KIND: Kind = Kind::Pointer;

    fn pointee() -> Option<TypeInfo> {
        Some(TypeInfo::of::<T>())
    }

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        T::from_repr(repr).map(Some)
    }

    fn into_repr(self) -> Option<Repr> {
        self.and_then(T::into_repr)
    }

    fn from_boxed(value: BoxedValue) -> Result<Self, BoxedValue> {
        match value.downcast::<Self>() {
            Ok(v) => Ok(*v),
            Err(value) => T::from_boxed(value).map(Some),
        }
    }
}

impl<T: Leaf> Leaf for Box<T> {
    const KIND: Kind = Kind::Pointer;

    fn pointee() -> Option<TypeInfo> {
        Some(TypeInfo::of::<T>())
    }

    fn from_repr(repr: Repr) -> Result<Self, BoxError> {
        T::from_repr(repr).map(Box::new)
    }

    fn into_repr(self) -> Option<Repr> {
        T::into_repr(*self)
    }

    fn from_boxed(value: BoxedValue) -> Result<Self, BoxedValue> {
        match value.downcast::<Self>() {
            Ok(v) => Ok(*v),
            Err(value) => T::from_boxed(value).map(Box::new),
        }
    }
}
