//! # Schema Builder
//!
//! Renders type descriptors into schema documents for one [`Dialect`].
//!
//! ## Document Shapes
//!
//! - [`DocumentShape::Standalone`]: the root schema plus a definitions
//!   container holding every record it reaches. Draft dialects add
//!   `$schema`; OpenAPI 3 keeps definitions under `components.schemas` so
//!   references resolve inside the document.
//! - [`DocumentShape::Embeddable`]: a name → schema map of the root and
//!   every record it reaches, for splicing into a larger document.
//! - [`DocumentShape::Inline`]: nested records are inlined. A reference
//!   is emitted only at a point of recursion, and the records referenced
//!   that way are emitted as definitions.
//!
//! Inheritance is flattened: a record's schema lists its inherited fields
//! directly instead of composing base schemas with `allOf`.

use std::any::TypeId;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use recschema_core::{
    Catalog, FieldDescriptor, Record, SchemaGenerationError, TypeDescriptor, TypeKey,
    TypeSignature,
};
use serde_json::{Map, Value};

use crate::cache::{CacheKey, SchemaCache};
use crate::dialect::{Dialect, ExampleStyle, NullableStyle};
use crate::node::SchemaNode;

/// Layout of an emitted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentShape {
    /// Root schema with a definitions container.
    Standalone,
    /// Name → schema map.
    Embeddable,
    /// Nested records inlined; references only at recursion points.
    Inline,
}

/// Everything that changes the bytes of a rendered document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchemaOptions {
    pub dialect: Dialect,
    pub shape: DocumentShape,
    /// Emit `enum` lists for enumerations. Literal fields always carry
    /// theirs.
    pub strict_enums: bool,
}

impl SchemaOptions {
    /// Standalone, strict enums.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            shape: DocumentShape::Standalone,
            strict_enums: true,
        }
    }

    pub fn with_shape(mut self, shape: DocumentShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_strict_enums(mut self, strict: bool) -> Self {
        self.strict_enums = strict;
        self
    }
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self::new(Dialect::Draft06)
    }
}

/// Builds and caches schema documents for the records of one catalog.
pub struct SchemaGenerator {
    catalog: Arc<Catalog>,
    cache: SchemaCache,
}

impl SchemaGenerator {
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            catalog,
            cache: SchemaCache::new(),
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Schema document for `T`.
    pub fn schema<T: Record>(&self, options: SchemaOptions) -> Result<Arc<Value>, SchemaGenerationError> {
        let version = self.catalog.encoders().version();
        let descriptor = self.catalog.describe::<T>()?;
        self.cached(&descriptor, options, version)
    }

    /// Schema document for an already described record.
    pub fn schema_for(
        &self,
        descriptor: &TypeDescriptor,
        options: SchemaOptions,
    ) -> Result<Arc<Value>, SchemaGenerationError> {
        let version = self.catalog.encoders().version();
        self.cached(descriptor, options, version)
    }

    fn cached(
        &self,
        descriptor: &TypeDescriptor,
        options: SchemaOptions,
        version: u64,
    ) -> Result<Arc<Value>, SchemaGenerationError> {
        let key = CacheKey::new(descriptor.key.id(), options);
        if let Some(document) = self.cache.get(&key, version) {
            return Ok(document);
        }
        tracing::debug!(
            type_name = descriptor.name(),
            dialect = %options.dialect,
            version,
            "building schema document"
        );
        let document = Arc::new(DocumentBuilder::new(&self.catalog, options).document(descriptor)?);
        self.cache.insert(key, version, Arc::clone(&document));
        Ok(document)
    }

    /// Name → schema map covering every record described so far, rebuilt
    /// against the current encoder registry.
    pub fn all_schemas(&self, dialect: Dialect, strict_enums: bool) -> Result<Value, SchemaGenerationError> {
        let options = SchemaOptions::new(dialect)
            .with_shape(DocumentShape::Embeddable)
            .with_strict_enums(strict_enums);
        let mut builder = DocumentBuilder::new(&self.catalog, options);
        let mut out = Map::new();
        for descriptor in self.catalog.descriptors()? {
            let (root, definitions) = builder.graph(&descriptor)?;
            for (key, node) in std::iter::once((descriptor.key, root)).chain(definitions) {
                if !out.contains_key(key.name()) {
                    out.insert(key.name().to_string(), node.render(dialect));
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Schema of one field, as it appears under `properties`.
    pub fn field_schema(
        &self,
        field: &FieldDescriptor,
        options: SchemaOptions,
    ) -> Result<Value, SchemaGenerationError> {
        let node = DocumentBuilder::new(&self.catalog, options).field(field)?;
        Ok(node.render(options.dialect))
    }
}

impl std::fmt::Debug for SchemaGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaGenerator")
            .field("cached", &self.cache.len())
            .finish()
    }
}

struct DocumentBuilder<'a> {
    catalog: &'a Catalog,
    options: SchemaOptions,
    names: HashMap<&'static str, TypeId>,
    inlining: Vec<TypeId>,
}

impl<'a> DocumentBuilder<'a> {
    fn new(catalog: &'a Catalog, options: SchemaOptions) -> Self {
        Self {
            catalog,
            options,
            names: HashMap::new(),
            inlining: Vec::new(),
        }
    }

    fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    fn document(&mut self, root: &TypeDescriptor) -> Result<Value, SchemaGenerationError> {
        let dialect = self.dialect();
        let (root_node, definitions) = self.graph(root)?;
        if self.options.shape == DocumentShape::Embeddable {
            let mut out = SchemaNode::map();
            out.insert(root.name(), root_node);
            for (key, node) in definitions {
                if key != root.key {
                    out.insert(key.name(), node);
                }
            }
            return Ok(out.render(dialect));
        }

        let mut document = SchemaNode::map();
        if let Some(uri) = dialect.schema_uri() {
            document.insert("$schema", SchemaNode::scalar(uri));
        }
        if let SchemaNode::Map(entries) = root_node {
            for (k, v) in entries {
                document.insert(k, v);
            }
        }
        if !definitions.is_empty() {
            let container = SchemaNode::Map(
                definitions
                    .into_iter()
                    .map(|(key, node)| (key.name().to_string(), node))
                    .collect(),
            );
            match dialect {
                Dialect::OpenApi3 => {
                    let mut components = SchemaNode::map();
                    components.insert("schemas", container);
                    document.insert("components", components);
                }
                Dialect::Draft04 | Dialect::Draft06 | Dialect::Swagger2 => {
                    document.insert("definitions", container);
                }
            }
        }
        Ok(document.render(dialect))
    }

    /// The root node plus a node for every record referenced from it,
    /// transitively, in first-reference order.
    fn graph(
        &mut self,
        root: &TypeDescriptor,
    ) -> Result<(SchemaNode, Vec<(TypeKey, SchemaNode)>), SchemaGenerationError> {
        self.claim_name(&root.key)?;
        let root_node = self.definition(root)?;

        let mut queue = VecDeque::new();
        let mut pending = Vec::new();
        root_node.references(&mut pending);
        queue.extend(pending);

        let mut done = HashSet::new();
        let mut definitions = Vec::new();
        while let Some(key) = queue.pop_front() {
            if !done.insert(key.id()) {
                continue;
            }
            self.claim_name(&key)?;
            let descriptor = self.descriptor(&key)?;
            let node = self.definition(&descriptor)?;
            let mut pending = Vec::new();
            node.references(&mut pending);
            queue.extend(pending);
            definitions.push((key, node));
        }
        Ok((root_node, definitions))
    }

    fn definition(&mut self, descriptor: &TypeDescriptor) -> Result<SchemaNode, SchemaGenerationError> {
        self.inlining.push(descriptor.key.id());
        let node = self.object(descriptor);
        self.inlining.pop();
        node
    }

    fn descriptor(&self, key: &TypeKey) -> Result<Arc<TypeDescriptor>, SchemaGenerationError> {
        self.catalog
            .descriptor(key)
            .ok_or(SchemaGenerationError::UnknownType { type_name: key.name() })
    }

    fn claim_name(&mut self, key: &TypeKey) -> Result<(), SchemaGenerationError> {
        match self.names.entry(key.name()) {
            Entry::Occupied(e) if *e.get() != key.id() => {
                Err(SchemaGenerationError::NameCollision { name: key.name() })
            }
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(e) => {
                e.insert(key.id());
                Ok(())
            }
        }
    }

    fn object(&mut self, descriptor: &TypeDescriptor) -> Result<SchemaNode, SchemaGenerationError> {
        let mut node = SchemaNode::map();
        if let Some(text) = &descriptor.description {
            node.insert("description", SchemaNode::scalar(text.clone()));
        }

        if let Some(property) = &descriptor.discriminator {
            let variants = descriptor
                .variants
                .iter()
                .map(|v| self.record(&v.key))
                .collect::<Result<Vec<_>, _>>()?;
            node.insert("oneOf", SchemaNode::List(variants));
            if self.dialect().supports_discriminator() {
                let mut discriminator = SchemaNode::map();
                discriminator.insert("propertyName", SchemaNode::scalar(property.clone()));
                if self.options.shape != DocumentShape::Inline {
                    let mapping = descriptor
                        .variants
                        .iter()
                        .map(|v| (mapping_key(&v.value), SchemaNode::Path(v.key)))
                        .collect();
                    discriminator.insert("mapping", SchemaNode::Map(mapping));
                }
                node.insert("discriminator", discriminator);
            }
            return Ok(node);
        }

        node.insert("type", SchemaNode::scalar("object"));
        let mut properties = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            properties.push((field.wire_name().to_string(), self.field(field)?));
        }
        node.insert("properties", SchemaNode::Map(properties));
        let required = descriptor.required_fields();
        if !required.is_empty() {
            node.insert(
                "required",
                SchemaNode::List(required.into_iter().map(SchemaNode::scalar).collect()),
            );
        }
        if !descriptor.additional_properties {
            node.insert("additionalProperties", SchemaNode::scalar(false));
        }
        Ok(node)
    }

    fn record(&mut self, key: &TypeKey) -> Result<SchemaNode, SchemaGenerationError> {
        if self.options.shape == DocumentShape::Inline && !self.inlining.contains(&key.id()) {
            let descriptor = self.descriptor(key)?;
            return self.definition(&descriptor);
        }
        Ok(SchemaNode::Ref(*key))
    }

    fn field(&mut self, field: &FieldDescriptor) -> Result<SchemaNode, SchemaGenerationError> {
        let node = self.signature(&field.signature)?;
        let SchemaNode::Map(decorations) = self.decorations(field) else {
            return Ok(node);
        };
        if decorations.is_empty() {
            return Ok(node);
        }
        let mut node = match node {
            SchemaNode::Map(_) => node,
            other => wrap_all_of(other),
        };
        for (k, v) in decorations {
            node.insert(k, v);
        }
        Ok(node)
    }

    fn decorations(&self, field: &FieldDescriptor) -> SchemaNode {
        let dialect = self.dialect();
        let c = &field.constraints;
        let mut node = SchemaNode::map();

        if let Some(title) = &field.title {
            node.insert("title", SchemaNode::scalar(title.clone()));
        }
        if let Some(text) = &field.description {
            node.insert("description", SchemaNode::scalar(text.clone()));
        }
        if let Some(default) = &field.default {
            node.insert("default", SchemaNode::Scalar(default.clone()));
        }

        if let Some(n) = c.minimum {
            node.insert("minimum", SchemaNode::scalar(n));
        }
        if let Some(n) = c.maximum {
            node.insert("maximum", SchemaNode::scalar(n));
        }
        if let Some(n) = c.exclusive_minimum {
            if dialect.numeric_exclusive_bounds() {
                node.insert("exclusiveMinimum", SchemaNode::scalar(n));
            } else {
                node.insert("minimum", SchemaNode::scalar(n));
                node.insert("exclusiveMinimum", SchemaNode::scalar(true));
            }
        }
        if let Some(n) = c.exclusive_maximum {
            if dialect.numeric_exclusive_bounds() {
                node.insert("exclusiveMaximum", SchemaNode::scalar(n));
            } else {
                node.insert("maximum", SchemaNode::scalar(n));
                node.insert("exclusiveMaximum", SchemaNode::scalar(true));
            }
        }
        if let Some(n) = c.multiple_of {
            node.insert("multipleOf", SchemaNode::scalar(n));
        }
        if let Some(n) = c.min_length {
            node.insert("minLength", SchemaNode::scalar(n));
        }
        if let Some(n) = c.max_length {
            node.insert("maxLength", SchemaNode::scalar(n));
        }
        if let Some(n) = c.min_items {
            node.insert("minItems", SchemaNode::scalar(n));
        }
        if let Some(n) = c.max_items {
            node.insert("maxItems", SchemaNode::scalar(n));
        }
        if let Some(pattern) = &c.pattern {
            node.insert("pattern", SchemaNode::scalar(pattern.clone()));
        }
        if let Some(format) = &c.format {
            node.insert("format", SchemaNode::scalar(format.clone()));
        }

        match dialect.example_style() {
            ExampleStyle::List if !field.examples.is_empty() => {
                node.insert("examples", SchemaNode::Scalar(Value::Array(field.examples.clone())));
            }
            ExampleStyle::Single => {
                if let Some(first) = field.examples.first() {
                    node.insert("example", SchemaNode::Scalar(first.clone()));
                }
            }
            ExampleStyle::List | ExampleStyle::None => {}
        }

        if dialect.supports_extensions() {
            if field.read_only {
                node.insert("readOnly", SchemaNode::scalar(true));
            }
            for (name, value) in &field.extensions {
                let key = if name.starts_with("x-") {
                    name.clone()
                } else {
                    format!("x-{name}")
                };
                node.insert(key, SchemaNode::Scalar(value.clone()));
            }
        }
        node
    }

    fn signature(&mut self, signature: &TypeSignature) -> Result<SchemaNode, SchemaGenerationError> {
        let dialect = self.dialect();
        let node = match signature {
            TypeSignature::Any => SchemaNode::map(),
            TypeSignature::Primitive(p) => typed(p.json_type()),
            TypeSignature::Record(key) => self.record(key)?,
            TypeSignature::Sequence(inner) => self.array(inner, false)?,
            TypeSignature::Set(inner) => self.array(inner, true)?,
            TypeSignature::Tuple(items) => {
                let mut node = typed("array");
                if dialect.supports_tuples() {
                    let items = items
                        .iter()
                        .map(|s| self.signature(s))
                        .collect::<Result<Vec<_>, _>>()?;
                    node.insert("items", SchemaNode::List(items));
                }
                node.insert("minItems", SchemaNode::scalar(items.len()));
                node.insert("maxItems", SchemaNode::scalar(items.len()));
                node
            }
            TypeSignature::Mapping(inner) => {
                let mut node = typed("object");
                if **inner != TypeSignature::Any {
                    node.insert("additionalProperties", self.signature(inner)?);
                }
                node
            }
            TypeSignature::Nullable(inner) => {
                if **inner == TypeSignature::Any {
                    return Ok(SchemaNode::map());
                }
                let inner = self.signature(inner)?;
                match dialect.nullable_style() {
                    NullableStyle::AnyOfNull => {
                        let mut node = SchemaNode::map();
                        node.insert("anyOf", SchemaNode::List(vec![inner, typed("null")]));
                        node
                    }
                    NullableStyle::Flag(keyword) => {
                        let mut node = match inner {
                            SchemaNode::Map(_) => inner,
                            other => wrap_all_of(other),
                        };
                        node.insert(keyword, SchemaNode::scalar(true));
                        node
                    }
                }
            }
            TypeSignature::Enum { name, values } => {
                let mut node = SchemaNode::map();
                if let Some(t) = homogeneous_type(values) {
                    node.insert("type", SchemaNode::scalar(t));
                }
                if self.options.strict_enums {
                    node.insert("enum", SchemaNode::Scalar(Value::Array(values.clone())));
                }
                if dialect.supports_extensions() {
                    node.insert("x-enum-name", SchemaNode::scalar(*name));
                }
                node
            }
            TypeSignature::Literal(values) => {
                let mut node = SchemaNode::map();
                if let Some(t) = homogeneous_type(values) {
                    node.insert("type", SchemaNode::scalar(t));
                }
                node.insert("enum", SchemaNode::Scalar(Value::Array(values.clone())));
                node
            }
            TypeSignature::Union(members) => {
                if !dialect.supports_unions() {
                    return Err(SchemaGenerationError::UnsupportedDialect {
                        dialect: dialect.as_str(),
                        operation: "union field rendering",
                    });
                }
                let members = members
                    .iter()
                    .map(|s| self.signature(s))
                    .collect::<Result<Vec<_>, _>>()?;
                // Members may overlap (integer and number); any match is valid.
                let mut node = SchemaNode::map();
                node.insert("anyOf", SchemaNode::List(members));
                node
            }
            TypeSignature::Custom(marker) => {
                let bundle = self.catalog.encoders().get(marker.id()).ok_or(
                    SchemaGenerationError::NoEncoder {
                        type_name: marker.type_name(),
                    },
                )?;
                SchemaNode::from_value(&bundle.json_schema())
            }
        };
        Ok(node)
    }

    fn array(&mut self, inner: &TypeSignature, unique: bool) -> Result<SchemaNode, SchemaGenerationError> {
        let mut node = typed("array");
        if *inner != TypeSignature::Any {
            node.insert("items", self.signature(inner)?);
        }
        if unique {
            node.insert("uniqueItems", SchemaNode::scalar(true));
        }
        Ok(node)
    }
}

fn typed(json_type: &'static str) -> SchemaNode {
    SchemaNode::Map(vec![("type".to_string(), SchemaNode::scalar(json_type))])
}

fn wrap_all_of(node: SchemaNode) -> SchemaNode {
    SchemaNode::Map(vec![("allOf".to_string(), SchemaNode::List(vec![node]))])
}

fn mapping_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// JSON type shared by every value, if there is one.
fn homogeneous_type(values: &[Value]) -> Option<&'static str> {
    let first = values.first()?;
    let kind = |v: &Value| match v {
        Value::String(_) => Some("string"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    };
    let head = kind(first)?;
    let mut result = head;
    for value in &values[1..] {
        match (result, kind(value)?) {
            (a, b) if a == b => {}
            ("integer", "number") | ("number", "integer") => result = "number",
            _ => return None,
        }
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn homogeneous_types() {
        assert_eq!(homogeneous_type(&[json!("a"), json!("b")]), Some("string"));
        assert_eq!(homogeneous_type(&[json!(1), json!(2)]), Some("integer"));
        assert_eq!(homogeneous_type(&[json!(1), json!(2.5)]), Some("number"));
        assert_eq!(homogeneous_type(&[json!(1), json!("x")]), None);
        assert_eq!(homogeneous_type(&[json!(8), Value::Null]), None);
        assert_eq!(homogeneous_type(&[]), None);
    }

    #[test]
    fn mapping_keys_are_strings() {
        assert_eq!(mapping_key(&json!("circle")), "circle");
        assert_eq!(mapping_key(&json!(3)), "3");
    }

    #[test]
    fn options_builder() {
        let options = SchemaOptions::new(Dialect::OpenApi3)
            .with_shape(DocumentShape::Embeddable)
            .with_strict_enums(false);
        assert_eq!(options.dialect, Dialect::OpenApi3);
        assert_eq!(options.shape, DocumentShape::Embeddable);
        assert!(!options.strict_enums);
        assert_eq!(SchemaOptions::default().dialect, Dialect::Draft06);
    }
}
