//! Runtime type descriptors used at the type-erasure boundary.
//!
//! The registry is keyed by [`TypeId`], but category fallback needs to know a
//! bit more about a type than its identity: its broad [`Kind`], the bit width
//! of numeric kinds, what it points to, and how to build it from the kind's
//! canonical [`Repr`]. [`TypeInfo`] bundles those facts; it is produced by
//! [`TypeInfo::of`] for any [`Leaf`] type.

use std::any::{Any, TypeId};
use std::cmp::Ordering;
use std::fmt;

use crate::error::BoxError;
use crate::leaf::Leaf;

/// A value crossing the type-erasure boundary.
pub type BoxedValue = Box<dyn Any + Send>;

/// Broad type category, used to pick a fallback handler factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Bool,
    Int,
    Uint,
    Float,
    String,
    /// Maps, sequences, and structs decoded from JSON text.
    Structured,
    /// `Option<T>` / `Box<T>`: resolved through the pointee.
    Pointer,
    /// No category fallback; needs an exact handler.
    Opaque,
}

impl Kind {
    pub fn is_numeric(self) -> bool {
        matches!(self, Kind::Int | Kind::Uint | Kind::Float)
    }

    /// Whether values of kind `self` can be cast to kind `to`.
    pub fn convertible_to(self, to: Kind) -> bool {
        match (self, to) {
            (Kind::Opaque, _) | (_, Kind::Opaque) => false,
            (Kind::Pointer, _) | (_, Kind::Pointer) => false,
            (a, b) if a.is_numeric() && b.is_numeric() => true,
            (a, b) => a == b,
        }
    }
}

/// Canonical representation of a value of each kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Repr {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Str(String),
    Json(serde_json::Value),
}

impl Repr {
    pub fn kind(&self) -> Kind {
        match self {
            Repr::Bool(_) => Kind::Bool,
            Repr::Int(_) => Kind::Int,
            Repr::Uint(_) => Kind::Uint,
            Repr::Float(_) => Kind::Float,
            Repr::Str(_) => Kind::String,
            Repr::Json(_) => Kind::Structured,
        }
    }

    /// Convert into the representation of `kind`, checking that integers fit
    /// in `bits` and that floats are integral before becoming integers.
    pub fn coerce(self, kind: Kind, bits: u32) -> Result<Repr, BoxError> {
        let out = match (self, kind) {
            (repr, k) if repr.kind() == k => repr,
            (Repr::Int(v), Kind::Uint) => {
                Repr::Uint(u64::try_from(v).map_err(|_| format!("{v} is negative"))?)
            }
            (Repr::Uint(v), Kind::Int) => {
                Repr::Int(i64::try_from(v).map_err(|_| format!("{v} overflows i64"))?)
            }
            (Repr::Int(v), Kind::Float) => Repr::Float(v as f64),
            (Repr::Uint(v), Kind::Float) => Repr::Float(v as f64),
            (Repr::Float(v), Kind::Int) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                Repr::Int(v as i64)
            }
            (Repr::Float(v), Kind::Uint) if v.fract() == 0.0 && v >= 0.0 && v < u64::MAX as f64 => {
                Repr::Uint(v as u64)
            }
            (repr, kind) => {
                return Err(format!("cannot represent {repr} as {kind:?}").into());
            }
        };
        out.check_width(bits)?;
        Ok(out)
    }

    /// Check that an integer fits in `bits` (0 means unchecked).
    pub fn check_width(&self, bits: u32) -> Result<(), BoxError> {
        if bits == 0 || bits >= 64 {
            return Ok(());
        }
        match *self {
            Repr::Int(v) => {
                let max = (1i64 << (bits - 1)) - 1;
                let min = -(1i64 << (bits - 1));
                if v < min || v > max {
                    return Err(format!("{v} out of range for {bits}-bit integer").into());
                }
            }
            Repr::Uint(v) => {
                if v > (1u64 << bits) - 1 {
                    return Err(format!("{v} out of range for {bits}-bit unsigned integer").into());
                }
            }
            Repr::Float(v) if bits == 32 => {
                if v.is_finite() && v.abs() > f32::MAX as f64 {
                    return Err(format!("{v} out of range for f32").into());
                }
            }
            _ => {}
        }
        Ok(())
    }
}

impl PartialOrd for Repr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Repr::Bool(a), Repr::Bool(b)) => a.partial_cmp(b),
            (Repr::Int(a), Repr::Int(b)) => a.partial_cmp(b),
            (Repr::Uint(a), Repr::Uint(b)) => a.partial_cmp(b),
            (Repr::Float(a), Repr::Float(b)) => a.partial_cmp(b),
            (Repr::Str(a), Repr::Str(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Repr::Bool(v) => write!(f, "{v}"),
            Repr::Int(v) => write!(f, "{v}"),
            Repr::Uint(v) => write!(f, "{v}"),
            Repr::Float(v) => write!(f, "{v}"),
            Repr::Str(v) => write!(f, "{v}"),
            Repr::Json(v) => write!(f, "{v}"),
        }
    }
}

/// Everything the registry and walker need to know about a field type.
#[derive(Clone, Copy)]
pub struct TypeInfo {
    pub id: TypeId,
    pub name: &'static str,
    pub kind: Kind,
    pub bits: u32,
    pointee: fn() -> Option<TypeInfo>,
    decode: fn(Repr) -> Result<BoxedValue, BoxError>,
}

impl TypeInfo {
    pub fn of<T: Leaf>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            kind: T::KIND,
            bits: T::BITS,
            pointee: T::pointee,
            decode: decode_repr::<T>,
        }
    }

    /// The type this one points to, for `Option<T>` and `Box<T>`.
    pub fn pointee(&self) -> Option<TypeInfo> {
        (self.pointee)()
    }

    /// Build a boxed value of this type from its kind representation.
    pub fn decode(&self, repr: Repr) -> Result<BoxedValue, BoxError> {
        (self.decode)(repr)
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("bits", &self.bits)
            .finish()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

fn decode_repr<T: Leaf>(repr: Repr) -> Result<BoxedValue, BoxError> {
    T::from_repr(repr).map(|v| Box::new(v) as BoxedValue)
}
