//! # recschema-convert — Validated Conversion
//!
//! The top of the recschema workspace. A [`Converter`] encodes records into
//! generic data (`serde_json::Value`) and decodes generic data back into
//! records, validating it first against the generated schema of the
//! concrete record. Its behavior is set through [`ConverterOptions`] or a
//! [`ConverterConfig`] loaded from YAML or JSON.
//!
//! [`Converter::global`] is a process-wide instance over the global
//! catalog; explicit instances keep their own catalog and caches.
//!
//! ## Crate Policy
//!
//! - Decoding is all-or-nothing: no partially built record escapes.
//! - No subscriber is installed; events go through `tracing`.

pub mod config;
pub mod converter;

pub use config::{BackendKind, ConfigError, ConverterConfig};
pub use converter::{Converter, ConverterOptions};

pub use recschema_core::{ConvertError, DecodeError, SchemaGenerationError, ValidationError};
pub use recschema_schema::{Dialect, DocumentShape, SchemaOptions};
