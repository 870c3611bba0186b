//! # Schema Dialects
//!
//! The four document flavors the builder can emit, and the capability
//! table that decides how each one spells the features that differ
//! between them. The builder asks the table; it never matches on a
//! dialect directly.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A schema document flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dialect {
    /// JSON Schema draft-04.
    #[serde(rename = "draft-04")]
    Draft04,
    /// JSON Schema draft-06.
    #[serde(rename = "draft-06")]
    Draft06,
    /// Swagger 2.0 definitions.
    #[serde(rename = "swagger-2")]
    Swagger2,
    /// OpenAPI 3 component schemas.
    #[serde(rename = "openapi-3")]
    OpenApi3,
}

/// How a dialect marks a value as nullable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullableStyle {
    /// `anyOf: [inner, {type: null}]`.
    AnyOfNull,
    /// A boolean keyword set on the inner schema.
    Flag(&'static str),
}

/// How a dialect carries example values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExampleStyle {
    /// Not carried.
    None,
    /// `examples: [...]`.
    List,
    /// `example: <first>`.
    Single,
}

impl Dialect {
    /// Every dialect, in a stable order.
    pub const ALL: [Dialect; 4] = [
        Dialect::Draft04,
        Dialect::Draft06,
        Dialect::Swagger2,
        Dialect::OpenApi3,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft04 => "draft-04",
            Self::Draft06 => "draft-06",
            Self::Swagger2 => "swagger-2",
            Self::OpenApi3 => "openapi-3",
        }
    }

    /// `$schema` URI for standalone documents; `None` for API dialects.
    pub fn schema_uri(self) -> Option<&'static str> {
        match self {
            Self::Draft04 => Some("http://json-schema.org/draft-04/schema#"),
            Self::Draft06 => Some("http://json-schema.org/draft-06/schema#"),
            Self::Swagger2 | Self::OpenApi3 => None,
        }
    }

    /// Prefix every definition reference starts with.
    pub fn reference_prefix(self) -> &'static str {
        match self {
            Self::OpenApi3 => "#/components/schemas/",
            Self::Draft04 | Self::Draft06 | Self::Swagger2 => "#/definitions/",
        }
    }

    /// Reference string for the definition `name`.
    pub fn reference(self, name: &str) -> String {
        format!("{}{}", self.reference_prefix(), name)
    }

    pub fn nullable_style(self) -> NullableStyle {
        match self {
            Self::Draft04 | Self::Draft06 => NullableStyle::AnyOfNull,
            Self::Swagger2 => NullableStyle::Flag("x-nullable"),
            Self::OpenApi3 => NullableStyle::Flag("nullable"),
        }
    }

    /// Draft-06 spells exclusive bounds as numbers; the others as booleans
    /// next to `minimum` / `maximum`.
    pub fn numeric_exclusive_bounds(self) -> bool {
        matches!(self, Self::Draft06)
    }

    pub fn example_style(self) -> ExampleStyle {
        match self {
            Self::Draft04 => ExampleStyle::None,
            Self::Draft06 => ExampleStyle::List,
            Self::Swagger2 | Self::OpenApi3 => ExampleStyle::Single,
        }
    }

    /// `discriminator: {propertyName, mapping}` on abstract bases.
    pub fn supports_discriminator(self) -> bool {
        matches!(self, Self::OpenApi3)
    }

    /// `readOnly`, `x-` extensions and `x-enum-name`.
    pub fn supports_extensions(self) -> bool {
        matches!(self, Self::Swagger2 | Self::OpenApi3)
    }

    /// Positional `items` lists for tuples.
    pub fn supports_tuples(self) -> bool {
        matches!(self, Self::Draft04 | Self::Draft06)
    }

    /// `anyOf` over the members of a union field.
    pub fn supports_unions(self) -> bool {
        !matches!(self, Self::Swagger2)
    }

    /// Dialects a generic value can be validated against.
    pub fn is_validatable(self) -> bool {
        matches!(self, Self::Draft04 | Self::Draft06)
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized dialect name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown schema dialect '{0}'")]
pub struct UnknownDialect(pub String);

impl FromStr for Dialect {
    type Err = UnknownDialect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "draft-04" | "draft04" | "draft4" => Ok(Self::Draft04),
            "draft-06" | "draft06" | "draft6" => Ok(Self::Draft06),
            "swagger-2" | "swagger2" | "swagger" => Ok(Self::Swagger2),
            "openapi-3" | "openapi3" | "openapi" => Ok(Self::OpenApi3),
            _ => Err(UnknownDialect(s.to_string())),
        }
    }
}
