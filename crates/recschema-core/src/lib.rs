//! # recschema-core — Record Descriptions and Structural Codec
//!
//! This crate is the bottom of the recschema workspace. It turns record
//! types into descriptors and moves values between native records and
//! generic data (`serde_json::Value`). Schema rendering and validation live
//! in `recschema-schema`; the validated conversion pipeline lives in
//! `recschema-convert`.
//!
//! ## Key Design Principles
//!
//! 1. **Explicit description, no reflection.** Records implement
//!    [`Record`] and declare their fields through a [`TypeBuilder`].
//!    Field types implement [`FieldValue`].
//!
//! 2. **Closed signature set.** Every field resolves to one
//!    [`TypeSignature`] variant; consumers match on it exhaustively.
//!
//! 3. **Registered encoders win.** A type with an entry in the
//!    [`EncoderRegistry`] is treated as an opaque scalar everywhere it
//!    appears, including inside containers.
//!
//! 4. **Atomic introspection.** A type graph is committed to the registry
//!    all at once or not at all. Descriptors are immutable once shared.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `recschema-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod codec;
pub mod descriptor;
pub mod encoder;
pub mod error;
pub mod record;
pub mod registry;
pub mod signature;

// Re-export primary types for ergonomic imports.
pub use codec::{
    DecodeContext, DecodeOptions, EncodeContext, EncodeOptions, FieldPath, FieldReader,
    FieldWriter, PathSegment,
};
pub use descriptor::{FieldConstraints, FieldDescriptor, TypeDescriptor, Variant};
pub use encoder::{EncoderBundle, EncoderRegistry, FieldEncoder};
pub use error::{
    ConvertError, DecodeError, SchemaGenerationError, ValidationError, ValidationViolations,
    Violation,
};
pub use record::{FieldValue, Record};
pub use registry::{Catalog, FieldBuilder, Introspection, TypeBuilder, TypeRegistry};
pub use signature::{EncoderMarker, Primitive, TypeKey, TypeSignature};

// Used by the exported macros.
pub use serde_json;
