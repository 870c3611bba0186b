//! # Type and Field Descriptors
//!
//! Plain data describing the shape of a record type. Descriptors are
//! produced by the introspector ([`crate::registry`]), shared as
//! `Arc<TypeDescriptor>` and never mutated afterwards. Behavior lives in
//! the schema builder and the converter, not here.

use serde_json::Value;

use crate::signature::{TypeKey, TypeSignature};

/// Validation constraints attached to a single field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldConstraints {
    /// Inclusive lower bound.
    pub minimum: Option<f64>,
    /// Inclusive upper bound.
    pub maximum: Option<f64>,
    /// Exclusive lower bound.
    pub exclusive_minimum: Option<f64>,
    /// Exclusive upper bound.
    pub exclusive_maximum: Option<f64>,
    /// Value must be a multiple of this.
    pub multiple_of: Option<f64>,
    /// Minimum string length.
    pub min_length: Option<u64>,
    /// Maximum string length.
    pub max_length: Option<u64>,
    /// Minimum number of sequence items.
    pub min_items: Option<u64>,
    /// Maximum number of sequence items.
    pub max_items: Option<u64>,
    /// Regular expression the string must match.
    pub pattern: Option<String>,
    /// Format tag (`date-time`, `email`, ...).
    pub format: Option<String>,
}

impl FieldConstraints {
    /// True if no constraint is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One declared field of a record.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    /// Declared (Rust-side) field name.
    pub name: &'static str,
    /// Property name on the wire, when it differs from `name`.
    pub serialized_name: Option<&'static str>,
    /// Shape of the field's type.
    pub signature: TypeSignature,
    /// Explicit default, in generic form.
    pub default: Option<Value>,
    /// True iff there is no default and the signature is not nullable.
    pub required: bool,
    /// Validation constraints.
    pub constraints: FieldConstraints,
    /// Short title.
    pub title: Option<String>,
    /// Longer description.
    pub description: Option<String>,
    /// Example values, in generic form.
    pub examples: Vec<Value>,
    /// Field is produced by the server and ignored on input.
    pub read_only: bool,
    /// Vendor extensions, emitted as `x-<name>` in dialects that allow them.
    pub extensions: Vec<(String, Value)>,
}

impl FieldDescriptor {
    /// A required field with no metadata.
    pub fn new(name: &'static str, signature: TypeSignature) -> Self {
        Self {
            name,
            serialized_name: None,
            signature,
            default: None,
            required: true,
            constraints: FieldConstraints::default(),
            title: None,
            description: None,
            examples: Vec::new(),
            read_only: false,
            extensions: Vec::new(),
        }
    }

    /// Property name used in generic data and schemas.
    pub fn wire_name(&self) -> &'static str {
        self.serialized_name.unwrap_or(self.name)
    }

    /// Recompute `required` from the default and the signature.
    pub(crate) fn settle_required(&mut self) {
        self.required = self.default.is_none() && !self.signature.is_nullable();
    }
}

/// A concrete subtype of a discriminated base.
#[derive(Debug, Clone, PartialEq)]
pub struct Variant {
    /// Discriminator value selecting this variant.
    pub value: Value,
    /// Identity of the concrete record.
    pub key: TypeKey,
}

/// Shape of one record type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Identity of the record.
    pub key: TypeKey,
    /// Description text, if any.
    pub description: Option<String>,
    /// Fields in declaration order, base fields first.
    pub fields: Vec<FieldDescriptor>,
    /// Direct bases whose fields were merged in.
    pub bases: Vec<TypeKey>,
    /// Discriminator property, set on abstract bases.
    pub discriminator: Option<String>,
    /// Concrete variants of an abstract base, in declaration order.
    pub variants: Vec<Variant>,
    /// Whether properties outside `fields` are tolerated.
    pub additional_properties: bool,
    /// Encoder-registry version this descriptor was resolved against.
    pub encoder_version: u64,
}

impl TypeDescriptor {
    /// Schema name of the record.
    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    /// True for a discriminated base whose instances are always variants.
    pub fn is_abstract(&self) -> bool {
        self.discriminator.is_some()
    }

    /// Look up a field by its declared name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Position of a field by its declared name.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Look up a field by its wire name.
    pub fn field_by_wire_name(&self, wire: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.wire_name() == wire)
    }

    /// Wire names of the required fields, in declaration order.
    pub fn required_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(FieldDescriptor::wire_name)
            .collect()
    }

    /// The variant registered under `value`.
    pub fn variant_for(&self, value: &Value) -> Option<&Variant> {
        self.variants.iter().find(|v| &v.value == value)
    }

    /// Every record type this descriptor refers to: field types, bases
    /// and variants, in that order.
    pub fn referenced_records(&self) -> Vec<TypeKey> {
        let mut out = Vec::new();
        for field in &self.fields {
            field.signature.referenced_records(&mut out);
        }
        out.extend(self.bases.iter().copied());
        out.extend(self.variants.iter().map(|v| v.key));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::Primitive;
    use serde_json::json;

    struct Product;

    fn product() -> TypeDescriptor {
        let mut name = FieldDescriptor::new("name", TypeSignature::Primitive(Primitive::String));
        name.settle_required();
        let mut cost = FieldDescriptor::new("cost", TypeSignature::Primitive(Primitive::Number));
        cost.default = Some(json!(20.0));
        cost.settle_required();
        let mut note = FieldDescriptor::new(
            "note",
            TypeSignature::Nullable(Box::new(TypeSignature::Primitive(Primitive::String))),
        );
        note.serialized_name = Some("remark");
        note.settle_required();
        TypeDescriptor {
            key: TypeKey::of::<Product>("Product"),
            description: None,
            fields: vec![name, cost, note],
            bases: Vec::new(),
            discriminator: None,
            variants: Vec::new(),
            additional_properties: true,
            encoder_version: 0,
        }
    }

    #[test]
    fn required_excludes_defaults_and_nullables() {
        assert_eq!(product().required_fields(), vec!["name"]);
    }

    #[test]
    fn lookup_by_wire_name() {
        let desc = product();
        assert_eq!(desc.field_by_wire_name("remark").map(|f| f.name), Some("note"));
        assert!(desc.field_by_wire_name("note").is_none());
        assert_eq!(desc.field_index("cost"), Some(1));
    }
}
