//! # Type Signatures
//!
//! The closed set of shapes a record field can take. Every consumer
//! (schema builder, converter) dispatches on [`TypeSignature`] with an
//! exhaustive `match`; adding a shape forces every consumer to handle it.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::Value;

/// Stable identity of a record type: its `TypeId` plus its schema name.
///
/// Equality and hashing use the `TypeId` only; the name is carried for
/// rendering references and error messages.
#[derive(Debug, Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// Key for the Rust type `T`, published under `name`.
    pub fn of<T: 'static>(name: &'static str) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name,
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Schema name of the record.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Identity of a scalar type handled by a registered field encoder.
#[derive(Debug, Clone, Copy)]
pub struct EncoderMarker {
    id: TypeId,
    type_name: &'static str,
}

impl EncoderMarker {
    /// Marker for the Rust type `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Rust type name, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl PartialEq for EncoderMarker {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EncoderMarker {}

/// Scalars native to the generic data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// UTF-8 string.
    String,
    /// Whole number.
    Integer,
    /// Any JSON number.
    Number,
    /// `true` / `false`.
    Boolean,
}

impl Primitive {
    /// JSON Schema `type` keyword for this primitive.
    pub fn json_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

/// Shape of a field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeSignature {
    /// Opaque generic data; no constraint.
    Any,
    /// Scalar native to the generic data model.
    Primitive(Primitive),
    /// Nested record, by identity.
    Record(TypeKey),
    /// Ordered sequence of the inner signature.
    Sequence(Box<TypeSignature>),
    /// Unordered collection of unique values.
    Set(Box<TypeSignature>),
    /// Fixed-length heterogeneous sequence.
    Tuple(Vec<TypeSignature>),
    /// String-keyed mapping to the inner signature.
    Mapping(Box<TypeSignature>),
    /// The inner signature or null.
    Nullable(Box<TypeSignature>),
    /// Named enumeration of fixed values.
    Enum {
        /// Enumeration name.
        name: &'static str,
        /// Allowed values, in declaration order.
        values: Vec<Value>,
    },
    /// Anonymous union of fixed literal values.
    Literal(Vec<Value>),
    /// Union of distinct type signatures; the first that fits wins.
    Union(Vec<TypeSignature>),
    /// Scalar handled by a registered field encoder.
    Custom(EncoderMarker),
}

impl TypeSignature {
    /// Whether `null` is an acceptable value for this signature.
    pub fn is_nullable(&self) -> bool {
        match self {
            Self::Nullable(_) | Self::Any => true,
            Self::Literal(values) | Self::Enum { values, .. } => values.contains(&Value::Null),
            _ => false,
        }
    }

    /// The single literal value of this signature, if it has exactly one.
    pub fn single_literal(&self) -> Option<&Value> {
        match self {
            Self::Literal(values) if values.len() == 1 => values.first(),
            _ => None,
        }
    }

    /// Record keys referenced by this signature, in encounter order.
    pub fn referenced_records(&self, out: &mut Vec<TypeKey>) {
        match self {
            Self::Record(key) => out.push(*key),
            Self::Sequence(inner) | Self::Set(inner) | Self::Mapping(inner) | Self::Nullable(inner) => {
                inner.referenced_records(out)
            }
            Self::Tuple(items) | Self::Union(items) => {
                for item in items {
                    item.referenced_records(out);
                }
            }
            Self::Any
            | Self::Primitive(_)
            | Self::Enum { .. }
            | Self::Literal(_)
            | Self::Custom(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct A;
    struct B;

    #[test]
    fn type_key_identity_ignores_name() {
        assert_eq!(TypeKey::of::<A>("A"), TypeKey::of::<A>("Other"));
        assert_ne!(TypeKey::of::<A>("Same"), TypeKey::of::<B>("Same"));
    }

    #[test]
    fn nullable_signatures() {
        let opt = TypeSignature::Nullable(Box::new(TypeSignature::Primitive(Primitive::String)));
        assert!(opt.is_nullable());
        assert!(TypeSignature::Literal(vec![json!(8), Value::Null]).is_nullable());
        assert!(!TypeSignature::Primitive(Primitive::Number).is_nullable());
    }

    #[test]
    fn referenced_records_walks_containers() {
        let a = TypeKey::of::<A>("A");
        let b = TypeKey::of::<B>("B");
        let sig = TypeSignature::Tuple(vec![
            TypeSignature::Sequence(Box::new(TypeSignature::Record(a))),
            TypeSignature::Mapping(Box::new(TypeSignature::Nullable(Box::new(
                TypeSignature::Record(b),
            )))),
        ]);
        let mut out = Vec::new();
        sig.referenced_records(&mut out);
        assert_eq!(out, vec![a, b]);
    }
}
