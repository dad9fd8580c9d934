//! SAML processing configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dom::DEFAULT_MAX_DEPTH;
use crate::error::{SamlError, SamlResult};

/// Settings for assertion parsing, verification and token processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamlConfig {
    /// Accept SHA-1 digest and signature algorithms.
    pub allow_sha1: bool,

    /// Reject unsigned assertions during token processing.
    pub require_signed_assertions: bool,

    /// Require the verified signing certificate or key to be in the trust store.
    pub validate_signature_trust: bool,

    /// Maximum element nesting accepted by the streaming builder.
    pub max_element_depth: usize,
}

impl Default for SamlConfig {
    fn default() -> Self {
        Self {
            allow_sha1: false,
            require_signed_assertions: false,
            validate_signature_trust: true,
            max_element_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl SamlConfig {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> SamlResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SamlError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file, or the defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> SamlResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            SamlError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Serializes to TOML.
    pub fn to_toml_string(&self) -> SamlResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SamlError::Config(format!("failed to serialize config: {e}")))
    }

    /// Checks value ranges.
    pub fn validate(&self) -> SamlResult<()> {
        if self.max_element_depth == 0 {
            return Err(SamlError::Config(
                "max_element_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
