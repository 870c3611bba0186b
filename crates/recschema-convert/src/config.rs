//! Converter configuration, loadable from YAML or JSON.
//!
//! ```yaml
//! backend: compiled
//! validation_dialect: draft-04
//! omit_defaults: true
//! strict: true
//! ```
//!
//! Every key is optional; absent keys take the defaults of
//! [`ConverterOptions`].

use std::path::Path;
use std::sync::Arc;

use recschema_core::{Catalog, DecodeOptions, EncodeOptions};
use recschema_schema::{CompiledBackend, Dialect, ReferenceBackend, ValidationBackend};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::converter::{Converter, ConverterOptions};

/// Which validation backend a converter uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Compile the schema on every call.
    Reference,
    /// Keep compiled validators by schema digest.
    #[default]
    Compiled,
}

impl BackendKind {
    pub fn build(self) -> Arc<dyn ValidationBackend> {
        match self {
            Self::Reference => Arc::new(ReferenceBackend),
            Self::Compiled => Arc::new(CompiledBackend::new()),
        }
    }
}

/// Serializable converter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    pub backend: BackendKind,
    pub validation_dialect: Dialect,
    pub omit_none: bool,
    pub omit_defaults: bool,
    /// Validate before decoding.
    pub validate: bool,
    /// Validate after encoding.
    pub validate_encoded: bool,
    /// Reject unknown properties on every record.
    pub strict: bool,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        let options = ConverterOptions::default();
        Self {
            backend: BackendKind::default(),
            validation_dialect: options.validation_dialect,
            omit_none: options.encode.omit_none,
            omit_defaults: options.encode.omit_defaults,
            validate: options.validate,
            validate_encoded: options.validate_encoded,
            strict: options.decode.strict,
        }
    }
}

/// Error loading or applying a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot read configuration '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Schemas in this dialect cannot be validated against.
    #[error("dialect '{0}' cannot be used for validation")]
    UnvalidatableDialect(Dialect),
}

impl ConverterConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Load from a file. `.json` files are read as JSON, everything else
    /// as YAML.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        }
    }

    /// The equivalent converter options.
    pub fn options(&self) -> Result<ConverterOptions, ConfigError> {
        if !self.validation_dialect.is_validatable() {
            return Err(ConfigError::UnvalidatableDialect(self.validation_dialect));
        }
        Ok(ConverterOptions {
            encode: EncodeOptions {
                omit_none: self.omit_none,
                omit_defaults: self.omit_defaults,
            },
            decode: DecodeOptions { strict: self.strict },
            validate: self.validate,
            validate_encoded: self.validate_encoded,
            validation_dialect: self.validation_dialect,
        })
    }
}

impl Converter {
    /// A converter over `catalog` configured by `config`.
    pub fn from_config(catalog: Arc<Catalog>, config: &ConverterConfig) -> Result<Self, ConfigError> {
        let options = config.options()?;
        let converter = Converter::new(catalog)
            .with_backend(config.backend.build())
            .with_options(options)
            .map_err(|_| ConfigError::UnvalidatableDialect(config.validation_dialect))?;
        tracing::debug!(
            backend = converter.backend().name(),
            dialect = %config.validation_dialect,
            "converter configured"
        );
        Ok(converter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_is_default() {
        let config = ConverterConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ConverterConfig::default());
        assert_eq!(config.options().unwrap(), ConverterOptions::default());
    }

    #[test]
    fn yaml_overrides() {
        let config = ConverterConfig::from_yaml_str(
            "backend: reference\nvalidation_dialect: draft-04\nomit_defaults: true\nstrict: true\n",
        )
        .unwrap();
        assert_eq!(config.backend, BackendKind::Reference);
        let options = config.options().unwrap();
        assert_eq!(options.validation_dialect, Dialect::Draft04);
        assert!(options.encode.omit_defaults);
        assert!(options.encode.omit_none);
        assert!(options.decode.strict);
    }

    #[test]
    fn json_and_unknown_keys() {
        let config = ConverterConfig::from_json_str(r#"{"validate": false}"#).unwrap();
        assert!(!config.validate);
        assert!(matches!(
            ConverterConfig::from_json_str(r#"{"validat": false}"#),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn api_dialect_is_rejected() {
        let config = ConverterConfig::from_yaml_str("validation_dialect: openapi-3").unwrap();
        let err = Converter::from_config(Arc::new(Catalog::new()), &config).unwrap_err();
        assert!(matches!(err, ConfigError::UnvalidatableDialect(Dialect::OpenApi3)));
    }

    #[test]
    fn builds_requested_backend() {
        let config = ConverterConfig {
            backend: BackendKind::Reference,
            ..ConverterConfig::default()
        };
        let converter = Converter::from_config(Arc::new(Catalog::new()), &config).unwrap();
        assert_eq!(converter.backend().name(), "reference");
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ConverterConfig::from_path("/nonexistent/recschema.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
