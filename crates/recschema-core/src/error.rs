//! # Error Types — Structured Error Hierarchy
//!
//! Defines the three failure classes surfaced by recschema, plus the
//! umbrella [`ConvertError`] returned by encode/decode paths. All errors use
//! `thiserror` for derive-based `Display` and `Error` implementations.
//!
//! ## Design
//!
//! - Schema generation errors name the type (and field) that could not be
//!   represented. They are fatal to the call that raised them and never
//!   leave partially built descriptors in the registry.
//! - Validation errors carry every violation found, each with a
//!   dot/bracket field path from the decode root.
//! - Decode errors always carry the field path at which construction
//!   failed. Decoding is all-or-nothing.

use std::fmt;

use thiserror::Error;

/// A type graph could not be turned into descriptors or schema documents.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaGenerationError {
    /// A field type has no structural signature and no registered encoder.
    #[error("no field encoder registered for '{type_name}'")]
    NoEncoder {
        /// Rust type name of the unresolvable type.
        type_name: &'static str,
    },

    /// Two variants of a discriminated base declare the same value.
    #[error("discriminator '{property}' of '{base}' maps {value} to both '{first}' and '{second}'")]
    DiscriminatorCollision {
        /// Name of the abstract base type.
        base: &'static str,
        /// Discriminator property name.
        property: String,
        /// The colliding discriminator value.
        value: String,
        /// Variant registered first under `value`.
        first: &'static str,
        /// Variant that attempted to reuse `value`.
        second: &'static str,
    },

    /// A variant does not declare a single literal value for the
    /// discriminator property of its base.
    #[error("variant '{variant}' of '{base}' has no literal '{property}' field")]
    MissingDiscriminator {
        /// Name of the abstract base type.
        base: &'static str,
        /// Name of the variant type.
        variant: &'static str,
        /// Discriminator property name.
        property: String,
    },

    /// A record inherits (directly or transitively) from itself.
    #[error("record '{type_name}' inherits from itself through '{base}'")]
    CyclicInheritance {
        /// Record being described.
        type_name: &'static str,
        /// Base that is still under construction.
        base: &'static str,
    },

    /// A field name was declared twice by the same record.
    #[error("field '{field}' declared twice on '{type_name}'")]
    DuplicateField {
        /// Record being described.
        type_name: &'static str,
        /// Repeated field name.
        field: &'static str,
    },

    /// A field was written or read that the record never declared.
    #[error("field '{field}' is not declared on '{type_name}'")]
    UndeclaredField {
        /// Record whose descriptor was consulted.
        type_name: &'static str,
        /// Field name used by the record implementation.
        field: String,
    },

    /// A declared default value could not be encoded.
    #[error("default for '{type_name}.{field}' cannot be encoded: {reason}")]
    InvalidDefault {
        /// Record being described.
        type_name: &'static str,
        /// Field carrying the default.
        field: &'static str,
        /// Encoder failure.
        reason: String,
    },

    /// Two distinct types share a name within a single schema document.
    #[error("two distinct types are both named '{name}'")]
    NameCollision {
        /// The shared definition name.
        name: &'static str,
    },

    /// A type key was referenced that the registry does not hold.
    #[error("type '{type_name}' is not registered")]
    UnknownType {
        /// Name of the missing type.
        type_name: &'static str,
    },

    /// The requested operation has no rendition in the given dialect.
    #[error("{operation} is not available for dialect '{dialect}'")]
    UnsupportedDialect {
        /// Dialect name.
        dialect: &'static str,
        /// What was attempted.
        operation: &'static str,
    },

    /// A generated schema was rejected by the validation backend.
    #[error("schema for '{type_name}' does not compile: {reason}")]
    InvalidSchema {
        /// Type whose schema failed to compile.
        type_name: String,
        /// Backend compiler message.
        reason: String,
    },
}

/// A single validation violation with structured context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Dot/bracket path from the validated root, e.g. `items[0].name`.
    /// Empty for the root itself.
    pub path: String,
    /// JSON Pointer path within the schema that triggered the error.
    pub schema_path: String,
    /// Human-readable description of the violation.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "  (root): {}", self.message)
        } else {
            write!(f, "  {}: {}", self.path, self.message)
        }
    }
}

/// Collection of validation violations, in backend report order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationViolations {
    violations: Vec<Violation>,
}

impl ValidationViolations {
    /// Wrap an ordered list of violations.
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Returns the number of violations.
    pub fn len(&self) -> usize {
        self.violations.len()
    }

    /// Returns true if there are no violations.
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns a slice of all violations.
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Iterate over the paths of all violations.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.violations.iter().map(|v| v.path.as_str())
    }

    /// Consumes self and returns the inner Vec.
    pub fn into_inner(self) -> Vec<Violation> {
        self.violations
    }
}

impl fmt::Display for ValidationViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.violations.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

/// Generic data did not conform to the schema of the target type.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("validation failed against '{type_name}':\n{violations}")]
pub struct ValidationError {
    /// Name of the type whose schema was validated against.
    pub type_name: String,
    /// Structured list of individual violations.
    pub violations: ValidationViolations,
}

/// Instance construction failed at a specific field path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("decode error at '{path}': {message}")]
pub struct DecodeError {
    /// Dot/bracket path from the decode root. Empty for the root.
    pub path: String,
    /// What went wrong.
    pub message: String,
}

impl DecodeError {
    /// Build a decode error at `path`.
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Top-level error for encode, decode and validation calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// The type graph could not be described or rendered.
    #[error("schema generation error: {0}")]
    Schema(#[from] SchemaGenerationError),

    /// The generic value failed schema validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Instance construction failed.
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl ConvertError {
    /// The field path carried by this error, if any.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Decode(e) => Some(&e.path),
            Self::Validation(e) => e.violations.violations().first().map(|v| v.path.as_str()),
            Self::Schema(_) => None,
        }
    }
}
