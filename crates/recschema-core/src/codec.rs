//! # Structural Codec
//!
//! Walks native values and generic data (`serde_json::Value`) guided by
//! descriptors. Encoding goes through [`EncodeContext`] and
//! [`FieldWriter`]; decoding goes through [`DecodeContext`] and
//! [`FieldReader`]. Both contexts track the current [`FieldPath`] so every
//! failure names the field it happened at.
//!
//! Decoding here is purely structural. Schema validation runs before it,
//! in the converter.

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::descriptor::TypeDescriptor;
use crate::error::{ConvertError, DecodeError, SchemaGenerationError};
use crate::record::{json_kind, FieldValue, Record};
use crate::registry::Catalog;
use crate::signature::TypeSignature;

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Record field, by wire name.
    Field(String),
    /// Sequence or tuple position.
    Index(usize),
    /// Mapping key.
    Key(String),
}

/// Location within a value, rendered as `items[0].name`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPath(Vec<PathSegment>);

impl FieldPath {
    /// The root path.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a JSON Pointer (`/items/0/name`) into the `instance` it was
    /// reported against. A token under an array is an index; a token under
    /// an object is a field, even when it is numeric. Where the instance
    /// ends, numeric tokens are taken as indices.
    pub fn from_pointer(pointer: &str, instance: &Value) -> Self {
        let mut current = Some(instance);
        let mut segments = Vec::new();
        for token in pointer.split('/').skip(1).filter(|t| !t.is_empty()) {
            let token = token.replace("~1", "/").replace("~0", "~");
            let segment = match current {
                Some(Value::Object(map)) => {
                    current = map.get(&token);
                    PathSegment::Field(token)
                }
                Some(Value::Array(items)) => match token.parse::<usize>() {
                    Ok(i) => {
                        current = items.get(i);
                        PathSegment::Index(i)
                    }
                    Err(_) => {
                        current = None;
                        PathSegment::Field(token)
                    }
                },
                _ => {
                    current = None;
                    match token.parse::<usize>() {
                        Ok(i) => PathSegment::Index(i),
                        Err(_) => PathSegment::Field(token),
                    }
                }
            };
            segments.push(segment);
        }
        Self(segments)
    }

    pub fn push(&mut self, segment: PathSegment) {
        self.0.push(segment);
    }

    pub fn pop(&mut self) -> Option<PathSegment> {
        self.0.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                PathSegment::Field(name) | PathSegment::Key(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                PathSegment::Index(n) => write!(f, "[{n}]")?,
            }
        }
        Ok(())
    }
}

/// Knobs for encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeOptions {
    /// Omit fields whose value is `None` (unless their default is not
    /// null).
    pub omit_none: bool,
    /// Omit fields whose value equals their declared default.
    pub omit_defaults: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            omit_none: true,
            omit_defaults: false,
        }
    }
}

/// Knobs for structural decoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Reject properties no field declares, for every record.
    pub strict: bool,
}

/// State for one encode call.
pub struct EncodeContext<'c> {
    catalog: &'c Catalog,
    options: EncodeOptions,
    path: FieldPath,
}

impl<'c> EncodeContext<'c> {
    pub fn new(catalog: &'c Catalog, options: EncodeOptions) -> Self {
        Self {
            catalog,
            options,
            path: FieldPath::root(),
        }
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn options(&self) -> EncodeOptions {
        self.options
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Error at the current path.
    pub fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::new(self.path.to_string(), message)
    }

    /// Run `f` one segment deeper. The segment is popped even when `f`
    /// fails.
    pub fn at<T>(
        &mut self,
        segment: PathSegment,
        f: impl FnOnce(&mut Self) -> Result<T, ConvertError>,
    ) -> Result<T, ConvertError> {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    /// Encode any field value, preferring a registered encoder.
    pub fn encode<F: FieldValue>(&mut self, value: &F) -> Result<Value, ConvertError> {
        if let Some(bundle) = self.catalog.encoders().get(TypeId::of::<F>()) {
            return bundle.encode(value).map_err(|m| self.error(m).into());
        }
        value.to_generic(self)
    }

    /// Encode a record through its [`Record::write_fields`].
    pub fn encode_record<R: Record>(&mut self, record: &R) -> Result<Value, ConvertError> {
        let descriptor = self.catalog.describe::<R>()?;
        let mut writer = FieldWriter::new(descriptor, self);
        record.write_fields(&mut writer)?;
        writer.finish()
    }
}

/// Collects the field values of one record during encoding.
pub struct FieldWriter<'a, 'c> {
    descriptor: Arc<TypeDescriptor>,
    cx: &'a mut EncodeContext<'c>,
    values: Vec<Option<Value>>,
    replaced: Option<Value>,
}

impl<'a, 'c> FieldWriter<'a, 'c> {
    fn new(descriptor: Arc<TypeDescriptor>, cx: &'a mut EncodeContext<'c>) -> Self {
        let values = vec![None; descriptor.fields.len()];
        Self {
            descriptor,
            cx,
            values,
            replaced: None,
        }
    }

    /// The record's descriptor.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Write the value of the field declared as `name`.
    pub fn field<F: FieldValue>(&mut self, name: &str, value: &F) -> Result<&mut Self, ConvertError> {
        let index = self.descriptor.field_index(name).ok_or_else(|| {
            SchemaGenerationError::UndeclaredField {
                type_name: self.descriptor.name(),
                field: name.to_string(),
            }
        })?;
        let wire = self.descriptor.fields[index].wire_name();
        let encoded = self
            .cx
            .at(PathSegment::Field(wire.to_string()), |cx| cx.encode(value))?;
        self.values[index] = Some(encoded);
        Ok(self)
    }

    /// Encode this abstract record as the concrete variant `V`.
    pub fn variant<V: Record>(&mut self, variant: &V) -> Result<(), ConvertError> {
        let key = V::type_key();
        if !self.descriptor.variants.iter().any(|v| v.key == key) {
            return Err(SchemaGenerationError::UndeclaredField {
                type_name: self.descriptor.name(),
                field: format!("variant {}", key.name()),
            }
            .into());
        }
        self.replaced = Some(self.cx.encode_record(variant)?);
        Ok(())
    }

    fn finish(self) -> Result<Value, ConvertError> {
        if let Some(value) = self.replaced {
            return Ok(value);
        }
        let options = self.cx.options;
        let mut object = Map::new();
        for (field, value) in self.descriptor.fields.iter().zip(self.values) {
            let value = match value {
                Some(value) => value,
                None => match field.signature.single_literal() {
                    Some(literal) => literal.clone(),
                    None => continue,
                },
            };
            if options.omit_none
                && value.is_null()
                && field.signature.is_nullable()
                && field.default.as_ref().map_or(true, Value::is_null)
            {
                continue;
            }
            if options.omit_defaults && field.default.as_ref() == Some(&value) {
                continue;
            }
            object.insert(field.wire_name().to_string(), value);
        }
        Ok(Value::Object(object))
    }
}

/// State for one structural decode call.
pub struct DecodeContext<'c> {
    catalog: &'c Catalog,
    options: DecodeOptions,
    path: FieldPath,
    exact: bool,
}

impl<'c> DecodeContext<'c> {
    pub fn new(catalog: &'c Catalog, options: DecodeOptions) -> Self {
        Self {
            catalog,
            options,
            path: FieldPath::root(),
            exact: false,
        }
    }

    /// True while numbers must keep their generic kind: integers only
    /// decode from integral JSON numbers and floats only from fractional
    /// ones.
    pub fn exact(&self) -> bool {
        self.exact
    }

    /// Run `f` with exact number kinds. Union decoding tries every member
    /// this way before falling back to lenient first-fit.
    pub fn exactly<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, ConvertError>) -> Result<T, ConvertError> {
        let previous = std::mem::replace(&mut self.exact, true);
        let out = f(self);
        self.exact = previous;
        out
    }

    pub fn catalog(&self) -> &'c Catalog {
        self.catalog
    }

    pub fn options(&self) -> DecodeOptions {
        self.options
    }

    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Error at the current path.
    pub fn error(&self, message: impl Into<String>) -> DecodeError {
        DecodeError::new(self.path.to_string(), message)
    }

    /// Run `f` one segment deeper. The segment is popped even when `f`
    /// fails.
    pub fn at<T>(
        &mut self,
        segment: PathSegment,
        f: impl FnOnce(&mut Self) -> Result<T, ConvertError>,
    ) -> Result<T, ConvertError> {
        self.path.push(segment);
        let out = f(self);
        self.path.pop();
        out
    }

    /// Decode any field value, preferring a registered encoder.
    pub fn decode<F: FieldValue>(&mut self, value: &Value) -> Result<F, ConvertError> {
        if let Some(bundle) = self.catalog.encoders().get(TypeId::of::<F>()) {
            return bundle.decode::<F>(value).map_err(|m| self.error(m).into());
        }
        F::from_generic(value, self)
    }

    /// Follow discriminators from `declared` down to the concrete record
    /// that `value` describes.
    pub fn resolve_concrete(
        &mut self,
        declared: Arc<TypeDescriptor>,
        value: &Value,
    ) -> Result<Arc<TypeDescriptor>, ConvertError> {
        let mut current = declared;
        while let Some(property) = current.discriminator.clone() {
            let Some(object) = value.as_object() else {
                return Err(self
                    .error(format!(
                        "expected an object for '{}', got {}",
                        current.name(),
                        json_kind(value)
                    ))
                    .into());
            };
            let Some(tag) = object.get(&property) else {
                return self.at(PathSegment::Field(property), |cx| {
                    Err(cx.error("missing discriminator").into())
                });
            };
            let Some(variant) = current.variant_for(tag) else {
                let message = format!("no variant of '{}' matches {}", current.name(), tag);
                return self.at(PathSegment::Field(property), |cx| Err(cx.error(message).into()));
            };
            let key = variant.key;
            current = self
                .catalog
                .descriptor(&key)
                .ok_or(SchemaGenerationError::UnknownType { type_name: key.name() })?;
        }
        Ok(current)
    }

    /// Decode a record through its [`Record::read_fields`].
    pub fn decode_record<R: Record>(&mut self, value: &Value) -> Result<R, ConvertError> {
        let declared = self.catalog.describe::<R>()?;
        let concrete = self.resolve_concrete(declared, value)?;
        let mut reader = FieldReader::new(concrete, value, self)?;
        R::read_fields(&mut reader)
    }
}

/// Hands out the field values of one record during decoding.
pub struct FieldReader<'a, 'c> {
    descriptor: Arc<TypeDescriptor>,
    source: &'a Value,
    object: &'a Map<String, Value>,
    cx: &'a mut DecodeContext<'c>,
}

impl<'a, 'c> FieldReader<'a, 'c> {
    fn new(
        descriptor: Arc<TypeDescriptor>,
        source: &'a Value,
        cx: &'a mut DecodeContext<'c>,
    ) -> Result<Self, ConvertError> {
        let Some(object) = source.as_object() else {
            return Err(cx
                .error(format!(
                    "expected an object for '{}', got {}",
                    descriptor.name(),
                    json_kind(source)
                ))
                .into());
        };
        if cx.options.strict || !descriptor.additional_properties {
            if let Some(key) = object.keys().find(|k| descriptor.field_by_wire_name(k).is_none()) {
                return cx.at(PathSegment::Field(key.clone()), |cx| {
                    Err(cx.error("unexpected field").into())
                });
            }
        }
        for field in &descriptor.fields {
            if let TypeSignature::Literal(allowed) = &field.signature {
                if let Some(found) = object.get(field.wire_name()) {
                    if !allowed.contains(found) {
                        let message = format!("{found} is not one of {}", Value::from(allowed.clone()));
                        return cx.at(PathSegment::Field(field.wire_name().to_string()), |cx| {
                            Err(cx.error(message).into())
                        });
                    }
                }
            }
        }
        Ok(Self {
            descriptor,
            source,
            object,
            cx,
        })
    }

    /// The descriptor being read.
    pub fn descriptor(&self) -> &TypeDescriptor {
        &self.descriptor
    }

    /// Read the field declared as `name`. An absent property falls back to
    /// the declared default, then to null for nullable fields.
    pub fn field<F: FieldValue>(&mut self, name: &str) -> Result<F, ConvertError> {
        let field = self.descriptor.field(name).ok_or_else(|| {
            SchemaGenerationError::UndeclaredField {
                type_name: self.descriptor.name(),
                field: name.to_string(),
            }
        })?;
        let wire = field.wire_name();
        let segment = PathSegment::Field(wire.to_string());
        match (self.object.get(wire), &field.default) {
            (Some(value), _) => self.cx.at(segment, |cx| cx.decode::<F>(value)),
            (None, Some(default)) => self.cx.at(segment, |cx| cx.decode::<F>(default)),
            (None, None) if field.signature.is_nullable() => {
                self.cx.at(segment, |cx| cx.decode::<F>(&Value::Null))
            }
            (None, None) => self
                .cx
                .at(segment, |cx| Err(cx.error("missing required field").into())),
        }
    }

    /// Schema name of the concrete record the data describes.
    pub fn variant(&self) -> &'static str {
        self.descriptor.name()
    }

    /// Read the whole record as the concrete variant `V`.
    pub fn read_variant<V: Record>(&mut self) -> Result<V, ConvertError> {
        if V::type_key() != self.descriptor.key {
            return Err(self
                .cx
                .error(format!(
                    "'{}' is not the resolved variant '{}'",
                    V::NAME,
                    self.descriptor.name()
                ))
                .into());
        }
        let mut reader = FieldReader::new(self.descriptor.clone(), self.source, self.cx)?;
        V::read_fields(&mut reader)
    }

    /// Error for a resolved variant the native type has no case for.
    pub fn unknown_variant(&self) -> ConvertError {
        self.cx
            .error(format!("no native case for variant '{}'", self.variant()))
            .into()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn segment() -> impl Strategy<Value = PathSegment> {
        prop_oneof![
            "[a-z][a-z0-9_]{0,8}".prop_map(PathSegment::Field),
            "[0-9]{1,3}".prop_map(PathSegment::Field),
            (0usize..64).prop_map(PathSegment::Index),
        ]
    }

    /// A value in which every segment of `segments` exists.
    fn instance(segments: &[PathSegment]) -> Value {
        segments.iter().rev().fold(Value::Null, |inner, segment| match segment {
            PathSegment::Field(name) | PathSegment::Key(name) => {
                let mut map = Map::new();
                map.insert(name.clone(), inner);
                Value::Object(map)
            }
            PathSegment::Index(i) => {
                let mut items = vec![Value::Null; *i];
                items.push(inner);
                Value::Array(items)
            }
        })
    }

    fn pointer(segments: &[PathSegment]) -> String {
        segments
            .iter()
            .map(|s| match s {
                PathSegment::Field(name) | PathSegment::Key(name) => format!("/{name}"),
                PathSegment::Index(i) => format!("/{i}"),
            })
            .collect()
    }

    proptest! {
        /// Pointers from the validator map back onto the same segments.
        #[test]
        fn pointer_segments_survive(segments in prop::collection::vec(segment(), 0..6)) {
            let path = FieldPath::from_pointer(&pointer(&segments), &instance(&segments));
            prop_assert_eq!(path.segments(), segments.as_slice());
        }
    }
}
