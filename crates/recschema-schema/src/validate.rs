//! # Schema Validation
//!
//! Checks generic data against a generated draft-04 or draft-06 document
//! and reports every violation with a dot/bracket field path.
//!
//! Two [`ValidationBackend`]s are provided. [`ReferenceBackend`] compiles
//! the schema on every call. [`CompiledBackend`] keeps compiled validators
//! keyed by the SHA-256 digest of the schema's canonical bytes, so a
//! regenerated but unchanged schema reuses its validator.
//!
//! Generated schemas only reference their own `definitions`. Any other
//! `$ref` target is refused by a local retriever instead of being fetched.

use std::collections::HashMap;
use std::sync::Arc;

use jsonschema::error::ValidationErrorKind;
use jsonschema::{Draft, Retrieve, Uri, ValidationOptions, Validator};
use parking_lot::RwLock;
use recschema_core::{FieldPath, PathSegment, SchemaGenerationError, Violation};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// A validator for generated schema documents.
pub trait ValidationBackend: Send + Sync {
    /// Short backend name, for logs and configuration.
    fn name(&self) -> &'static str;

    /// Every violation of `schema` by `instance`, in backend report order.
    /// An empty list means the instance is valid.
    fn validate(&self, schema: &Value, instance: &Value) -> Result<Vec<Violation>, SchemaGenerationError>;
}

/// Refuses every external reference.
struct LocalOnly;

impl Retrieve for LocalOnly {
    fn retrieve(&self, uri: &Uri<&str>) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err(format!("external schema reference '{}' is not resolvable", uri.as_str()).into())
    }
}

fn draft_of(schema: &Value) -> Draft {
    match schema.get("$schema").and_then(Value::as_str) {
        Some(uri) if uri.contains("draft-06") => Draft::Draft6,
        _ => Draft::Draft4,
    }
}

fn options_for(schema: &Value) -> ValidationOptions {
    let mut opts = jsonschema::options();
    opts.with_draft(draft_of(schema));
    opts.with_retriever(LocalOnly);
    opts
}

fn compile(schema: &Value) -> Result<Validator, SchemaGenerationError> {
    options_for(schema)
        .build(schema)
        .map_err(|e| SchemaGenerationError::InvalidSchema {
            type_name: schema_title(schema),
            reason: e.to_string(),
        })
}

fn schema_title(schema: &Value) -> String {
    schema
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("(anonymous)")
        .to_string()
}

fn violations(validator: &Validator, instance: &Value) -> Vec<Violation> {
    validator
        .iter_errors(instance)
        .map(|e| {
            let mut path = FieldPath::from_pointer(&e.instance_path.to_string(), instance);
            if let ValidationErrorKind::Required { property } = &e.kind {
                if let Some(name) = property.as_str() {
                    path.push(PathSegment::Field(name.to_string()));
                }
            }
            Violation {
                path: path.to_string(),
                schema_path: e.schema_path.to_string(),
                message: e.to_string(),
            }
        })
        .collect()
}

/// Compiles on every call.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceBackend;

impl ValidationBackend for ReferenceBackend {
    fn name(&self) -> &'static str {
        "reference"
    }

    fn validate(&self, schema: &Value, instance: &Value) -> Result<Vec<Violation>, SchemaGenerationError> {
        let validator = compile(schema)?;
        Ok(violations(&validator, instance))
    }
}

/// Keeps compiled validators by schema digest.
#[derive(Default)]
pub struct CompiledBackend {
    validators: RwLock<HashMap<[u8; 32], Arc<Validator>>>,
}

impl CompiledBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of compiled validators held.
    pub fn len(&self) -> usize {
        self.validators.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.read().is_empty()
    }

    fn validator(&self, schema: &Value) -> Result<Arc<Validator>, SchemaGenerationError> {
        let digest = schema_digest(schema)?;
        if let Some(v) = self.validators.read().get(&digest) {
            return Ok(Arc::clone(v));
        }
        let compiled = Arc::new(compile(schema)?);
        tracing::debug!(digest = %hex(&digest), "compiled schema validator");
        Ok(Arc::clone(
            self.validators.write().entry(digest).or_insert(compiled),
        ))
    }
}

impl ValidationBackend for CompiledBackend {
    fn name(&self) -> &'static str {
        "compiled"
    }

    fn validate(&self, schema: &Value, instance: &Value) -> Result<Vec<Violation>, SchemaGenerationError> {
        let validator = self.validator(schema)?;
        Ok(violations(&validator, instance))
    }
}

impl std::fmt::Debug for CompiledBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledBackend")
            .field("validators", &self.len())
            .finish()
    }
}

/// SHA-256 over the serialized document. Generated documents have a
/// deterministic key order, so equal schemas hash equally.
pub fn schema_digest(schema: &Value) -> Result<[u8; 32], SchemaGenerationError> {
    let bytes = serde_json::to_vec(schema).map_err(|e| SchemaGenerationError::InvalidSchema {
        type_name: schema_title(schema),
        reason: format!("schema does not serialize: {e}"),
    })?;
    Ok(Sha256::digest(&bytes).into())
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
