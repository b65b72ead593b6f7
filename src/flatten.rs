//! A serde Serializer that flattens any `Serialize` value into dotted
//! `(key, raw string)` pairs, the shape every key source hands out.
//!
//! Struct fields nest with `.`: `Outer { db: Inner { url: "pg://" } }` becomes
//! `[("db.url", "pg://")]`. Scalars are rendered as text, strings verbatim.
//! Sequences and maps are leaves: their value is JSON text, ready for the
//! structured-kind handlers. `None` and unit values produce no entry, so the
//! key reads as absent.

use serde::ser::{self, Serialize};
use thiserror::Error;

pub fn flatten<S: Serialize + ?Sized>(source: &S) -> Result<Vec<(String, String)>, FlattenError> {
    let mut out = Vec::new();
    source.serialize(FlattenSerializer {
        prefix: String::new(),
        out: &mut out,
    })?;
    Ok(out)
}

#[derive(Debug, Error)]
#[error("cannot flatten value: {0}")]
pub struct FlattenError(String);

impl ser::Error for FlattenError {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        FlattenError(msg.to_string())
    }
}

struct FlattenSerializer<'a> {
    prefix: String,
    out: &'a mut Vec<(String, String)>,
}

impl FlattenSerializer<'_> {
    fn emit(self, value: impl ToString) -> Result<(), FlattenError> {
        if self.prefix.is_empty() {
            return Err(FlattenError("top-level value must be a struct".into()));
        }
        self.out.push((self.prefix, value.to_string()));
        Ok(())
    }
}

fn dotted(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<serde_json::Value, FlattenError> {
    serde_json::to_value(value).map_err(|e| FlattenError(e.to_string()))
}

impl<'a> ser::Serializer for FlattenSerializer<'a> {
    type Ok = ();
    type Error = FlattenError;
    type SerializeSeq = JsonSeq<'a>;
    type SerializeTuple = JsonSeq<'a>;
    type SerializeTupleStruct = JsonSeq<'a>;
    type SerializeTupleVariant = JsonSeq<'a>;
    type SerializeMap = JsonMap<'a>;
    type SerializeStruct = FlattenStruct<'a>;
    type SerializeStructVariant = FlattenStruct<'a>;

    fn serialize_bool(self, v: bool) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_i8(self, v: i8) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_i16(self, v: i16) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_i32(self, v: i32) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_i64(self, v: i64) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_u8(self, v: u8) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_u16(self, v: u16) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_u32(self, v: u32) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_u64(self, v: u64) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_f32(self, v: f32) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_f64(self, v: f64) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_char(self, v: char) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_str(self, v: &str) -> Result<(), Self::Error> {
        self.emit(v)
    }

    fn serialize_bytes(self, _v: &[u8]) -> Result<(), Self::Error> {
        Err(FlattenError("bytes not supported".into()))
    }

    fn serialize_none(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<(), Self::Error> {
        Ok(())
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<(), Self::Error> {
        self.emit(variant)
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(self)
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<Self::SerializeSeq, Self::Error> {
        Ok(JsonSeq {
            target: self,
            items: Vec::with_capacity(len.unwrap_or(0)),
        })
    }

    fn serialize_tuple(self, len: usize) -> Result<Self::SerializeTuple, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleStruct, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        len: usize,
    ) -> Result<Self::SerializeTupleVariant, Self::Error> {
        self.serialize_seq(Some(len))
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, Self::Error> {
        // A top-level map is the key space itself.
        let top_level = self.prefix.is_empty();
        Ok(JsonMap {
            target: self,
            entries: serde_json::Map::new(),
            current_key: None,
            top_level,
        })
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, Self::Error> {
        Ok(FlattenStruct {
            prefix: self.prefix,
            out: self.out,
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, Self::Error> {
        Ok(FlattenStruct {
            prefix: self.prefix,
            out: self.out,
        })
    }
}

struct FlattenStruct<'a> {
    prefix: String,
    out: &'a mut Vec<(String, String)>,
}

impl ser::SerializeStruct for FlattenStruct<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        value.serialize(FlattenSerializer {
            prefix: dotted(&self.prefix, key),
            out: self.out,
        })
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl ser::SerializeStructVariant for FlattenStruct<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), Self::Error> {
        ser::SerializeStruct::serialize_field(self, key, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        Ok(())
    }
}

struct JsonSeq<'a> {
    target: FlattenSerializer<'a>,
    items: Vec<serde_json::Value>,
}

impl ser::SerializeSeq for JsonSeq<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        self.items.push(to_json(value)?);
        Ok(())
    }

    fn end(self) -> Result<(), Self::Error> {
        self.target.emit(serde_json::Value::Array(self.items))
    }
}

impl ser::SerializeTuple for JsonSeq<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleStruct for JsonSeq<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

impl ser::SerializeTupleVariant for JsonSeq<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        ser::SerializeSeq::serialize_element(self, value)
    }

    fn end(self) -> Result<(), Self::Error> {
        ser::SerializeSeq::end(self)
    }
}

struct JsonMap<'a> {
    target: FlattenSerializer<'a>,
    entries: serde_json::Map<String, serde_json::Value>,
    current_key: Option<String>,
    top_level: bool,
}

impl ser::SerializeMap for JsonMap<'_> {
    type Ok = ();
    type Error = FlattenError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), Self::Error> {
        let key = match to_json(key)? {
            serde_json::Value::String(s) => s,
            other @ (serde_json::Value::Number(_) | serde_json::Value::Bool(_)) => other.to_string(),
            _ => return Err(FlattenError("map keys must be strings".into())),
        };
        self.current_key = Some(key);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), Self::Error> {
        let Some(key) = self.current_key.take() else {
            return Err(FlattenError("map value without a key".into()));
        };
        if self.top_level {
            return value.serialize(FlattenSerializer {
                prefix: key,
                out: &mut *self.target.out,
            });
        }
        self.entries.insert(key, to_json(value)?);
        Ok(())
    }

    fn end(self) -> Result<(), Self::Error> {
        if self.top_level {
            return Ok(());
        }
        self.target.emit(serde_json::Value::Object(self.entries))
    }
}
