//! # Documentation Tooling Hooks
//!
//! [`SpecComponents`] collects record schemas for an API description
//! document (Swagger 2 or OpenAPI 3). Every schema a record reaches is
//! registered as a named component so the references inside it resolve,
//! and parameter lists can be derived from a record's fields.

use recschema_core::{Record, SchemaGenerationError};
use serde_json::{Map, Value};

use crate::builder::{DocumentShape, SchemaGenerator, SchemaOptions};
use crate::dialect::Dialect;

/// Where an operation parameter is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Query,
    Path,
    Header,
    /// OpenAPI 3 only.
    Cookie,
}

impl ParameterLocation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Cookie => "cookie",
        }
    }
}

/// Named component schemas gathered for one API description document.
#[derive(Debug)]
pub struct SpecComponents<'g> {
    generator: &'g SchemaGenerator,
    options: SchemaOptions,
    schemas: Map<String, Value>,
}

impl<'g> SpecComponents<'g> {
    /// Collector for `dialect`, which must be an API dialect.
    pub fn new(generator: &'g SchemaGenerator, dialect: Dialect) -> Result<Self, SchemaGenerationError> {
        if !matches!(dialect, Dialect::Swagger2 | Dialect::OpenApi3) {
            return Err(SchemaGenerationError::UnsupportedDialect {
                dialect: dialect.as_str(),
                operation: "API component collection",
            });
        }
        Ok(Self {
            generator,
            options: SchemaOptions::new(dialect).with_shape(DocumentShape::Embeddable),
            schemas: Map::new(),
        })
    }

    /// Emit `enum` lists for enumerations (default true).
    pub fn strict_enums(mut self, strict: bool) -> Self {
        self.options = self.options.with_strict_enums(strict);
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.options.dialect
    }

    /// Register every record `T` reaches and return `T`'s own schema.
    /// `T` itself is not registered.
    pub fn schema_helper<T: Record>(&mut self) -> Result<Value, SchemaGenerationError> {
        let mut document = self.embeddable::<T>()?;
        let root = document.remove(T::NAME).unwrap_or(Value::Object(Map::new()));
        self.absorb(document);
        Ok(root)
    }

    /// Register `T` and everything it reaches; return a reference to `T`.
    pub fn resolve_schema<T: Record>(&mut self) -> Result<Value, SchemaGenerationError> {
        let document = self.embeddable::<T>()?;
        self.absorb(document);
        let mut reference = Map::new();
        reference.insert(
            "$ref".to_string(),
            Value::String(self.dialect().reference(T::NAME)),
        );
        Ok(Value::Object(reference))
    }

    /// One parameter object per field of `T`.
    ///
    /// Path parameters are always required. Swagger 2 spells the value
    /// schema inline on the parameter; OpenAPI 3 nests it under `schema`.
    pub fn resolve_parameters<T: Record>(
        &mut self,
        location: ParameterLocation,
    ) -> Result<Vec<Value>, SchemaGenerationError> {
        let dialect = self.dialect();
        if location == ParameterLocation::Cookie && dialect == Dialect::Swagger2 {
            return Err(SchemaGenerationError::UnsupportedDialect {
                dialect: dialect.as_str(),
                operation: "cookie parameters",
            });
        }
        let descriptor = self.generator.catalog().describe::<T>()?;
        self.schema_helper::<T>()?;

        let mut parameters = Vec::with_capacity(descriptor.fields.len());
        for field in &descriptor.fields {
            let schema = self.generator.field_schema(field, self.options)?;
            let mut parameter = Map::new();
            parameter.insert("name".to_string(), Value::String(field.wire_name().to_string()));
            parameter.insert("in".to_string(), Value::String(location.as_str().to_string()));
            parameter.insert(
                "required".to_string(),
                Value::Bool(location == ParameterLocation::Path || field.required),
            );
            if let Some(text) = &field.description {
                parameter.insert("description".to_string(), Value::String(text.clone()));
            }
            match (dialect, schema) {
                (Dialect::Swagger2, Value::Object(entries)) => {
                    for (k, v) in entries {
                        if k != "description" || !parameter.contains_key("description") {
                            parameter.insert(k, v);
                        }
                    }
                }
                (_, schema) => {
                    parameter.insert("schema".to_string(), schema);
                }
            }
            parameters.push(Value::Object(parameter));
        }
        Ok(parameters)
    }

    /// Registered component schemas, by name.
    pub fn components(&self) -> &Map<String, Value> {
        &self.schemas
    }

    /// The components section for the document: `definitions` for
    /// Swagger 2, `components.schemas` for OpenAPI 3.
    pub fn into_components(self) -> Value {
        let schemas = Value::Object(self.schemas);
        let mut out = Map::new();
        match self.options.dialect {
            Dialect::OpenApi3 => {
                let mut components = Map::new();
                components.insert("schemas".to_string(), schemas);
                out.insert("components".to_string(), Value::Object(components));
            }
            _ => {
                out.insert("definitions".to_string(), schemas);
            }
        }
        Value::Object(out)
    }

    fn embeddable<T: Record>(&self) -> Result<Map<String, Value>, SchemaGenerationError> {
        let document = self.generator.schema::<T>(self.options)?;
        Ok(document.as_object().cloned().unwrap_or_default())
    }

    fn absorb(&mut self, document: Map<String, Value>) {
        for (name, schema) in document {
            if self.schemas.contains_key(&name) {
                continue;
            }
            tracing::debug!(component = %name, dialect = %self.options.dialect, "registered component schema");
            self.schemas.insert(name, schema);
        }
    }
}
