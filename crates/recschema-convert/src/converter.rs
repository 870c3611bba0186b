//! # Converter
//!
//! Moves values between native records and generic data, validating the
//! generic side against the generated schema of the concrete record.
//!
//! ## Decode Pipeline
//!
//! 1. Resolve the concrete record through discriminators. A missing or
//!    unknown discriminator value is a [`DecodeError`] at the
//!    discriminator's path.
//! 2. Validate against the concrete record's standalone schema in the
//!    validation dialect (draft-06 unless configured). Violations abort the
//!    decode as a [`ValidationError`].
//! 3. Construct the record bottom-up through its `read_fields`.
//!
//! Nothing is constructed unless every step succeeds.

use std::sync::{Arc, OnceLock};

use recschema_core::{
    Catalog, ConvertError, DecodeContext, DecodeError, DecodeOptions, EncodeContext,
    EncodeOptions, FieldEncoder, Record, SchemaGenerationError, TypeDescriptor, ValidationError,
    ValidationViolations,
};
use recschema_schema::{CompiledBackend, Dialect, SchemaGenerator, SchemaOptions, ValidationBackend};
use serde_json::Value;

/// Behavior knobs of one converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConverterOptions {
    pub encode: EncodeOptions,
    pub decode: DecodeOptions,
    /// Validate generic data before decoding it.
    pub validate: bool,
    /// Validate the output of every encode.
    pub validate_encoded: bool,
    /// Dialect of the schemas used for validation. Must be validatable.
    pub validation_dialect: Dialect,
}

impl Default for ConverterOptions {
    fn default() -> Self {
        Self {
            encode: EncodeOptions::default(),
            decode: DecodeOptions::default(),
            validate: true,
            validate_encoded: false,
            validation_dialect: Dialect::Draft06,
        }
    }
}

/// Encodes, decodes and validates records of one catalog.
pub struct Converter {
    schemas: SchemaGenerator,
    backend: Arc<dyn ValidationBackend>,
    options: ConverterOptions,
}

impl Converter {
    /// A converter with default options and a compiled backend.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self {
            schemas: SchemaGenerator::new(catalog),
            backend: Arc::new(CompiledBackend::new()),
            options: ConverterOptions::default(),
        }
    }

    /// The process-wide converter over [`Catalog::global`].
    pub fn global() -> &'static Converter {
        static GLOBAL: OnceLock<Converter> = OnceLock::new();
        GLOBAL.get_or_init(|| Converter::new(Catalog::global()))
    }

    pub fn with_backend(mut self, backend: Arc<dyn ValidationBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Replace every option. Fails if the validation dialect cannot be
    /// validated against.
    pub fn with_options(mut self, options: ConverterOptions) -> Result<Self, SchemaGenerationError> {
        if !options.validation_dialect.is_validatable() {
            return Err(SchemaGenerationError::UnsupportedDialect {
                dialect: options.validation_dialect.as_str(),
                operation: "validation",
            });
        }
        self.options = options;
        Ok(self)
    }

    pub fn options(&self) -> ConverterOptions {
        self.options
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        self.schemas.catalog()
    }

    pub fn schemas(&self) -> &SchemaGenerator {
        &self.schemas
    }

    pub fn backend(&self) -> &dyn ValidationBackend {
        self.backend.as_ref()
    }

    /// Register a field encoder on the underlying catalog. Cached
    /// descriptors and schemas go stale.
    pub fn register_encoder<T: 'static, E: FieldEncoder<T>>(&self, encoder: E) -> u64 {
        self.catalog().register_encoder(encoder)
    }

    /// Schema document for `T`.
    pub fn schema<T: Record>(&self, options: SchemaOptions) -> Result<Arc<Value>, SchemaGenerationError> {
        self.schemas.schema::<T>(options)
    }

    /// Encode with the configured options.
    pub fn encode<T: Record>(&self, record: &T) -> Result<Value, ConvertError> {
        self.encode_with(record, self.options.encode)
    }

    pub fn encode_with<T: Record>(&self, record: &T, options: EncodeOptions) -> Result<Value, ConvertError> {
        let value = EncodeContext::new(self.catalog(), options).encode_record(record)?;
        if self.options.validate_encoded {
            let descriptor = self.catalog().describe::<T>()?;
            let mut cx = DecodeContext::new(self.catalog(), self.options.decode);
            let concrete = cx.resolve_concrete(descriptor, &value)?;
            self.check(&concrete, &value)?;
        }
        Ok(value)
    }

    /// Decode with the configured options.
    pub fn decode<T: Record>(&self, value: &Value) -> Result<T, ConvertError> {
        self.decode_with(value, self.options.validate)
    }

    /// Decode, validating first only when `validate` is set.
    pub fn decode_with<T: Record>(&self, value: &Value, validate: bool) -> Result<T, ConvertError> {
        let mut cx = DecodeContext::new(self.catalog(), self.options.decode);
        if validate {
            let declared = self.catalog().describe::<T>()?;
            let concrete = cx.resolve_concrete(declared, value)?;
            self.check(&concrete, value)?;
        }
        cx.decode_record::<T>(value)
    }

    /// Validate generic data against the schema of the record it
    /// describes, without constructing anything.
    pub fn validate<T: Record>(&self, value: &Value) -> Result<(), ConvertError> {
        let declared = self.catalog().describe::<T>()?;
        let mut cx = DecodeContext::new(self.catalog(), self.options.decode);
        let concrete = cx.resolve_concrete(declared, value)?;
        self.check(&concrete, value)
    }

    /// Encode to compact JSON text.
    pub fn to_json<T: Record>(&self, record: &T) -> Result<String, ConvertError> {
        let value = self.encode(record)?;
        serde_json::to_string(&value).map_err(|e| DecodeError::new("", e.to_string()).into())
    }

    /// Parse JSON text and decode it.
    pub fn from_json<T: Record>(&self, text: &str) -> Result<T, ConvertError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| DecodeError::new("", format!("invalid JSON: {e}")))?;
        self.decode(&value)
    }

    fn check(&self, descriptor: &TypeDescriptor, value: &Value) -> Result<(), ConvertError> {
        let options = SchemaOptions::new(self.options.validation_dialect);
        let schema = self.schemas.schema_for(descriptor, options)?;
        let found = self.backend.validate(&schema, value).map_err(|e| match e {
            SchemaGenerationError::InvalidSchema { reason, .. } => SchemaGenerationError::InvalidSchema {
                type_name: descriptor.name().to_string(),
                reason,
            },
            other => other,
        })?;
        if found.is_empty() {
            return Ok(());
        }
        tracing::debug!(
            type_name = descriptor.name(),
            dialect = %self.options.validation_dialect,
            backend = self.backend.name(),
            violations = found.len(),
            "validation failed"
        );
        Err(ValidationError {
            type_name: descriptor.name().to_string(),
            violations: ValidationViolations::new(found),
        }
        .into())
    }
}

impl std::fmt::Debug for Converter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("backend", &self.backend.name())
            .field("options", &self.options)
            .finish()
    }
}
