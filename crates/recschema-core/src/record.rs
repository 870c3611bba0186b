//! # Record Description Traits
//!
//! Records describe themselves explicitly; there is no runtime
//! reflection. A record implements [`Record`]:
//!
//! - `describe` declares fields (in order), bases, discriminators and
//!   variants through a [`TypeBuilder`].
//! - `write_fields` hands each field value to a [`FieldWriter`].
//! - `read_fields` pulls each field value from a [`FieldReader`].
//!
//! Field types implement [`FieldValue`]. Implementations are provided for
//! the std primitives, `String`, `Option`, `Vec`, sets, string-keyed maps,
//! 2- and 3-tuples, `serde_json::Value` (opaque data), every `Record` and
//! `Box<R: Record>`. Enumerations use [`literal_enum!`](crate::literal_enum)
//! scalar types handled by a registered encoder use
//! [`custom_field!`](crate::custom_field), and enums wrapping one of
//! several field types use [`union_enum!`](crate::union_enum).

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::net::{Ipv4Addr, Ipv6Addr};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::codec::{DecodeContext, EncodeContext, FieldReader, FieldWriter, PathSegment};
use crate::error::{ConvertError, SchemaGenerationError};
use crate::registry::{Introspection, TypeBuilder};
use crate::signature::{Primitive, TypeKey, TypeSignature};

/// A structured type with a fixed, named, ordered set of fields.
pub trait Record: Sized + Send + Sync + 'static {
    /// Name used for schema definitions and references.
    const NAME: &'static str;

    /// Identity of this record in the type registry.
    fn type_key() -> TypeKey {
        TypeKey::of::<Self>(Self::NAME)
    }

    /// Declare the record's shape.
    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError>;

    /// Hand every field value to the writer.
    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError>;

    /// Construct an instance from the reader's fields.
    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError>;
}

/// A boxed record is the same record; boxing only breaks up recursive
/// Rust layouts.
impl<T: Record> Record for Box<T> {
    const NAME: &'static str = T::NAME;

    fn type_key() -> TypeKey {
        T::type_key()
    }

    fn describe(t: &mut TypeBuilder<'_, '_>) -> Result<(), SchemaGenerationError> {
        T::describe(t)
    }

    fn write_fields(&self, w: &mut FieldWriter<'_, '_>) -> Result<(), ConvertError> {
        (**self).write_fields(w)
    }

    fn read_fields(r: &mut FieldReader<'_, '_>) -> Result<Self, ConvertError> {
        T::read_fields(r).map(Box::new)
    }
}

/// A type that can appear as a record field.
///
/// Implementations resolve inner types through
/// [`Introspection::resolve`], [`EncodeContext::encode`] and
/// [`DecodeContext::decode`] rather than calling the inner impl directly,
/// so a registered encoder for the inner type takes precedence.
pub trait FieldValue: Sized + 'static {
    /// Structural signature of this type.
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError>;

    /// Convert to generic data.
    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError>;

    /// Construct from generic data.
    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError>;
}

impl<R: Record> FieldValue for R {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        cx.record::<R>().map(TypeSignature::Record)
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        cx.encode_record(self)
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        cx.decode_record(value)
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn integer_of(value: &Value) -> Option<i128> {
    if let Some(n) = value.as_i64() {
        return Some(i128::from(n));
    }
    if let Some(n) = value.as_u64() {
        return Some(i128::from(n));
    }
    match value.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Some(f as i128),
        _ => None,
    }
}

macro_rules! integer_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl FieldValue for $ty {
                fn signature(_cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
                    Ok(TypeSignature::Primitive(Primitive::Integer))
                }

                fn to_generic(&self, _cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
                    Ok(Value::from(*self))
                }

                fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
                    if cx.exact() && value.is_f64() {
                        return Err(cx.error(format!("expected an integer, got {value}")).into());
                    }
                    let n = integer_of(value).ok_or_else(|| {
                        cx.error(format!("expected an integer, got {}", json_kind(value)))
                    })?;
                    <$ty>::try_from(n).map_err(|_| {
                        cx.error(format!("{n} is out of range for {}", stringify!($ty))).into()
                    })
                }
            }
        )+
    };
}

integer_field!(i8, i16, i32, i64, u8, u16, u32, u64, usize);

impl FieldValue for f64 {
    fn signature(_cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Primitive(Primitive::Number))
    }

    fn to_generic(&self, _cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        Ok(Value::from(*self))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        if cx.exact() && !value.is_f64() && value.is_number() {
            return Err(cx.error(format!("expected a fractional number, got {value}")).into());
        }
        value
            .as_f64()
            .ok_or_else(|| cx.error(format!("expected a number, got {}", json_kind(value))).into())
    }
}

impl FieldValue for f32 {
    fn signature(_cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Primitive(Primitive::Number))
    }

    fn to_generic(&self, _cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        Ok(Value::from(*self))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        if cx.exact() && !value.is_f64() && value.is_number() {
            return Err(cx.error(format!("expected a fractional number, got {value}")).into());
        }
        value
            .as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| cx.error(format!("expected a number, got {}", json_kind(value))).into())
    }
}

impl FieldValue for bool {
    fn signature(_cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Primitive(Primitive::Boolean))
    }

    fn to_generic(&self, _cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        Ok(Value::Bool(*self))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        value
            .as_bool()
            .ok_or_else(|| cx.error(format!("expected a boolean, got {}", json_kind(value))).into())
    }
}

impl FieldValue for String {
    fn signature(_cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Primitive(Primitive::String))
    }

    fn to_generic(&self, _cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        Ok(Value::String(self.clone()))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| cx.error(format!("expected a string, got {}", json_kind(value))).into())
    }
}

impl FieldValue for Value {
    fn signature(_cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Any)
    }

    fn to_generic(&self, _cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        Ok(self.clone())
    }

    fn from_generic(value: &Value, _cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        Ok(value.clone())
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Nullable(Box::new(cx.resolve::<T>()?)))
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        match self {
            Some(inner) => cx.encode(inner),
            None => Ok(Value::Null),
        }
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        match value {
            Value::Null => Ok(None),
            other => cx.decode(other).map(Some),
        }
    }
}

fn expect_array<'v>(value: &'v Value, cx: &DecodeContext<'_>) -> Result<&'v Vec<Value>, ConvertError> {
    value
        .as_array()
        .ok_or_else(|| cx.error(format!("expected an array, got {}", json_kind(value))).into())
}

fn decode_items<T: FieldValue>(items: &[Value], cx: &mut DecodeContext<'_>) -> Result<Vec<T>, ConvertError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| cx.at(PathSegment::Index(i), |cx| cx.decode(item)))
        .collect()
}

fn encode_items<'v, T: FieldValue>(
    items: impl Iterator<Item = &'v T>,
    cx: &mut EncodeContext<'_>,
) -> Result<Vec<Value>, ConvertError> {
    items
        .enumerate()
        .map(|(i, item)| cx.at(PathSegment::Index(i), |cx| cx.encode(item)))
        .collect()
}

impl<T: FieldValue> FieldValue for Vec<T> {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Sequence(Box::new(cx.resolve::<T>()?)))
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        encode_items(self.iter(), cx).map(Value::Array)
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        let items = expect_array(value, cx)?;
        decode_items(items, cx)
    }
}

impl<T: FieldValue + Ord> FieldValue for BTreeSet<T> {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Set(Box::new(cx.resolve::<T>()?)))
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        encode_items(self.iter(), cx).map(Value::Array)
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        let items = expect_array(value, cx)?;
        decode_items::<T>(items, cx).map(|v| v.into_iter().collect())
    }
}

impl<T: FieldValue + Eq + Hash> FieldValue for HashSet<T> {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Set(Box::new(cx.resolve::<T>()?)))
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        let mut items = encode_items(self.iter(), cx)?;
        items.sort_by_cached_key(Value::to_string);
        Ok(Value::Array(items))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        let items = expect_array(value, cx)?;
        decode_items::<T>(items, cx).map(|v| v.into_iter().collect())
    }
}

fn encode_key<K: FieldValue>(key: &K, cx: &mut EncodeContext<'_>) -> Result<String, ConvertError> {
    match cx.encode(key)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(cx
            .error(format!("map keys must encode to strings, got {}", json_kind(&other)))
            .into()),
    }
}

fn decode_key<K: FieldValue>(key: &str, cx: &mut DecodeContext<'_>) -> Result<K, ConvertError> {
    let as_string = Value::String(key.to_string());
    match cx.decode::<K>(&as_string) {
        Ok(k) => Ok(k),
        Err(first) => match serde_json::from_str::<Value>(key) {
            Ok(parsed @ (Value::Number(_) | Value::Bool(_))) => cx.decode::<K>(&parsed),
            _ => Err(first),
        },
    }
}

fn encode_entries<'v, K: FieldValue + 'v, V: FieldValue + 'v>(
    entries: impl Iterator<Item = (&'v K, &'v V)>,
    cx: &mut EncodeContext<'_>,
) -> Result<Vec<(String, Value)>, ConvertError> {
    entries
        .map(|(k, v)| {
            let key = encode_key(k, cx)?;
            let value = cx.at(PathSegment::Key(key.clone()), |cx| cx.encode(v))?;
            Ok((key, value))
        })
        .collect()
}

fn decode_entries<K: FieldValue, V: FieldValue>(
    value: &Value,
    cx: &mut DecodeContext<'_>,
) -> Result<Vec<(K, V)>, ConvertError> {
    let object = value
        .as_object()
        .ok_or_else(|| cx.error(format!("expected an object, got {}", json_kind(value))))?;
    object
        .iter()
        .map(|(k, v)| {
            cx.at(PathSegment::Key(k.clone()), |cx| {
                let key = decode_key::<K>(k, cx)?;
                let value = cx.decode::<V>(v)?;
                Ok((key, value))
            })
        })
        .collect()
}

impl<K: FieldValue + Ord, V: FieldValue> FieldValue for BTreeMap<K, V> {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Mapping(Box::new(cx.resolve::<V>()?)))
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        let entries = encode_entries(self.iter(), cx)?;
        Ok(Value::Object(entries.into_iter().collect::<Map<String, Value>>()))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        decode_entries(value, cx).map(|e| e.into_iter().collect())
    }
}

impl<K: FieldValue + Eq + Hash, V: FieldValue> FieldValue for HashMap<K, V> {
    fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
        Ok(TypeSignature::Mapping(Box::new(cx.resolve::<V>()?)))
    }

    fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
        let mut entries = encode_entries(self.iter(), cx)?;
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(Value::Object(entries.into_iter().collect::<Map<String, Value>>()))
    }

    fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
        decode_entries(value, cx).map(|e| e.into_iter().collect())
    }
}

macro_rules! tuple_field {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: FieldValue),+> FieldValue for ($($name,)+) {
            fn signature(cx: &mut Introspection<'_>) -> Result<TypeSignature, SchemaGenerationError> {
                Ok(TypeSignature::Tuple(vec![$(cx.resolve::<$name>()?),+]))
            }

            fn to_generic(&self, cx: &mut EncodeContext<'_>) -> Result<Value, ConvertError> {
                Ok(Value::Array(vec![
                    $(cx.at(PathSegment::Index($idx), |cx| cx.encode(&self.$idx))?),+
                ]))
            }

            fn from_generic(value: &Value, cx: &mut DecodeContext<'_>) -> Result<Self, ConvertError> {
                let items = expect_array(value, cx)?;
                if items.len() != $len {
                    return Err(cx
                        .error(format!("expected {} items, got {}", $len, items.len()))
                        .into());
                }
                Ok(($(cx.at(PathSegment::Index($idx), |cx| cx.decode::<$name>(&items[$idx]))?,)+))
            }
        }
    };
}

tuple_field!(2; A: 0, B: 1);
tuple_field!(3; A: 0, B: 1, C: 2);

/// Declare an enumeration of fixed wire values and its [`FieldValue`]
/// impl.
///
/// The macro derives `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`,
/// `PartialOrd` and `Ord`; do not derive them again.
///
/// ```
/// recschema_core::literal_enum! {
///     /// Working days.
///     pub enum Weekday {
///         Mon => "Monday",
///         Tue => "Tuesday",
///     }
/// }
/// assert_eq!(Weekday::Tue.wire_value(), "Tuesday");
/// ```
#[macro_export]
macro_rules! literal_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $value:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Every variant, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The value this variant takes in generic data.
            pub fn wire_value(&self) -> $crate::serde_json::Value {
                match self {
                    $($name::$variant => $crate::serde_json::Value::from($value)),+
                }
            }
        }

        impl $crate::FieldValue for $name {
            fn signature(
                _cx: &mut $crate::Introspection<'_>,
            ) -> ::std::result::Result<$crate::TypeSignature, $crate::SchemaGenerationError> {
                ::std::result::Result::Ok($crate::TypeSignature::Enum {
                    name: stringify!($name),
                    values: $name::ALL.iter().map($name::wire_value).collect(),
                })
            }

            fn to_generic(
                &self,
                _cx: &mut $crate::EncodeContext<'_>,
            ) -> ::std::result::Result<$crate::serde_json::Value, $crate::ConvertError> {
                ::std::result::Result::Ok(self.wire_value())
            }

            fn from_generic(
                value: &$crate::serde_json::Value,
                cx: &mut $crate::DecodeContext<'_>,
            ) -> ::std::result::Result<Self, $crate::ConvertError> {
                $name::ALL
                    .iter()
                    .find(|v| &v.wire_value() == value)
                    .copied()
                    .ok_or_else(|| {
                        cx.error(format!(
                            "{} is not a valid {}",
                            value,
                            stringify!($name)
                        ))
                        .into()
                    })
            }
        }
    };
}

/// Give scalar types a [`FieldValue`] impl that defers entirely to a
/// registered field encoder.
///
/// Until an encoder is registered for the type, describing a record that
/// uses it fails with [`SchemaGenerationError::NoEncoder`].
#[macro_export]
macro_rules! custom_field {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::FieldValue for $ty {
                fn signature(
                    _cx: &mut $crate::Introspection<'_>,
                ) -> ::std::result::Result<$crate::TypeSignature, $crate::SchemaGenerationError> {
                    ::std::result::Result::Err($crate::SchemaGenerationError::NoEncoder {
                        type_name: ::std::any::type_name::<$ty>(),
                    })
                }

                fn to_generic(
                    &self,
                    _cx: &mut $crate::EncodeContext<'_>,
                ) -> ::std::result::Result<$crate::serde_json::Value, $crate::ConvertError> {
                    ::std::result::Result::Err($crate::SchemaGenerationError::NoEncoder {
                        type_name: ::std::any::type_name::<$ty>(),
                    }
                    .into())
                }

                fn from_generic(
                    _value: &$crate::serde_json::Value,
                    _cx: &mut $crate::DecodeContext<'_>,
                ) -> ::std::result::Result<Self, $crate::ConvertError> {
                    ::std::result::Result::Err($crate::SchemaGenerationError::NoEncoder {
                        type_name: ::std::any::type_name::<$ty>(),
                    }
                    .into())
                }
            }
        )+
    };
}

crate::custom_field!(DateTime<Utc>, NaiveDate, Decimal, Uuid, Ipv4Addr, Ipv6Addr);

/// Declare an enum whose variants each wrap one field type, and give it a
/// [`FieldValue`] impl with a union signature.
///
/// Encoding writes the wrapped value as is. Decoding tries the variants in
/// declaration order twice: first with exact number kinds, so `3` picks an
/// integer variant and `3.0` a float variant, then leniently. The first
/// variant that fits wins.
#[macro_export]
macro_rules! union_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident($ty:ty)),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis enum $name {
            $($variant($ty)),+
        }

        impl $crate::FieldValue for $name {
            fn signature(
                cx: &mut $crate::Introspection<'_>,
            ) -> ::std::result::Result<$crate::TypeSignature, $crate::SchemaGenerationError> {
                ::std::result::Result::Ok($crate::TypeSignature::Union(vec![
                    $(cx.resolve::<$ty>()?),+
                ]))
            }

            fn to_generic(
                &self,
                cx: &mut $crate::EncodeContext<'_>,
            ) -> ::std::result::Result<$crate::serde_json::Value, $crate::ConvertError> {
                match self {
                    $($name::$variant(inner) => cx.encode(inner)),+
                }
            }

            fn from_generic(
                value: &$crate::serde_json::Value,
                cx: &mut $crate::DecodeContext<'_>,
            ) -> ::std::result::Result<Self, $crate::ConvertError> {
                $(
                    if let ::std::result::Result::Ok(inner) = cx.exactly(|cx| cx.decode::<$ty>(value)) {
                        return ::std::result::Result::Ok($name::$variant(inner));
                    }
                )+
                $(
                    if let ::std::result::Result::Ok(inner) = cx.decode::<$ty>(value) {
                        return ::std::result::Result::Ok($name::$variant(inner));
                    }
                )+
                ::std::result::Result::Err(cx
                    .error(format!("{} matches no variant of {}", value, stringify!($name)))
                    .into())
            }
        }
    };
}
