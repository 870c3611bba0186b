//! # recschema-schema — Schema Rendering & Validation
//!
//! Renders the descriptors produced by `recschema-core` into schema
//! documents and validates generic data against them.
//!
//! ## Dialects (`dialect`)
//!
//! [`Dialect`] names the four supported flavors (draft-04, draft-06,
//! Swagger 2, OpenAPI 3) and answers every "how does this dialect spell X"
//! question the builder asks.
//!
//! ## Rendering (`builder`, `node`, `cache`)
//!
//! [`SchemaGenerator`] walks a descriptor graph into a [`SchemaNode`] tree
//! and renders it for one dialect in one [`DocumentShape`]. Finished
//! documents are cached per record and [`SchemaOptions`], stamped with the
//! encoder registry version so a registration invalidates them.
//!
//! ## Validation (`validate`)
//!
//! [`ValidationBackend`] checks a value against a draft document with the
//! `jsonschema` crate and reports violations with field paths.
//!
//! ## API Description Hooks (`plugin`)
//!
//! [`SpecComponents`] registers record schemas as named components of a
//! Swagger 2 or OpenAPI 3 document and derives parameter lists.
//!
//! ## Crate Policy
//!
//! - Depends only on `recschema-core` internally.
//! - Generated documents never reference anything outside themselves.

pub mod builder;
pub mod cache;
pub mod dialect;
pub mod node;
pub mod plugin;
pub mod validate;

pub use builder::{DocumentShape, SchemaGenerator, SchemaOptions};
pub use cache::{CacheKey, SchemaCache};
pub use dialect::{Dialect, ExampleStyle, NullableStyle, UnknownDialect};
pub use node::SchemaNode;
pub use plugin::{ParameterLocation, SpecComponents};
pub use validate::{schema_digest, CompiledBackend, ReferenceBackend, ValidationBackend};
