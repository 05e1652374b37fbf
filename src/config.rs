//! Configuration for SBDH readers and writers.
//!
//! The reader and writer are configured independently: the version a writer
//! emits is not tied to the version a reader accepts, so both can differ
//! during a migration.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{SbdhError, SbdhResult};
use crate::identifier::DEFAULT_PARTICIPANT_SCHEME;

/// The only SBDH header version currently defined.
pub const DEFAULT_HEADER_VERSION: &str = "1.0";

/// Reader and writer settings.
///
/// # Example
///
/// ```rust
/// use sbdh_envelope::SbdhConfig;
///
/// let config = SbdhConfig::new()
///     .with_header_version_to_write("1.1")
///     .with_favour_speed(true);
///
/// assert_eq!(config.expected_header_version, "1.0");
/// assert_eq!(config.header_version_to_write, "1.1");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SbdhConfig {
    /// Run the validation rules before extracting
    pub perform_value_checks: bool,
    /// Header version accepted by the default rules
    pub expected_header_version: String,
    /// Identifier authority accepted by the default rules
    pub default_participant_scheme: String,
    /// Header version emitted by the writer
    pub header_version_to_write: String,
    /// Let the writer share the business message instead of copying it
    pub favour_speed: bool,
}

impl Default for SbdhConfig {
    fn default() -> Self {
        Self {
            perform_value_checks: true,
            expected_header_version: DEFAULT_HEADER_VERSION.to_string(),
            default_participant_scheme: DEFAULT_PARTICIPANT_SCHEME.to_string(),
            header_version_to_write: DEFAULT_HEADER_VERSION.to_string(),
            favour_speed: false,
        }
    }
}

impl SbdhConfig {
    /// Create a new default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the validation rules.
    pub fn with_perform_value_checks(mut self, enabled: bool) -> Self {
        self.perform_value_checks = enabled;
        self
    }

    /// Set the header version the default rules accept.
    pub fn with_expected_header_version(mut self, version: impl Into<String>) -> Self {
        self.expected_header_version = version.into();
        self
    }

    /// Set the identifier authority the default rules accept.
    pub fn with_default_participant_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.default_participant_scheme = scheme.into();
        self
    }

    /// Set the header version the writer emits.
    pub fn with_header_version_to_write(mut self, version: impl Into<String>) -> Self {
        self.header_version_to_write = version.into();
        self
    }

    /// Let the writer share instead of copy the business message.
    pub fn with_favour_speed(mut self, enabled: bool) -> Self {
        self.favour_speed = enabled;
        self
    }

    /// Validates the configuration.
    ///
    /// Returns Ok(()) if valid, or an error message describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.expected_header_version.is_empty() {
            return Err("expected_header_version may not be empty".to_string());
        }
        if self.header_version_to_write.is_empty() {
            return Err("header_version_to_write may not be empty".to_string());
        }
        if self.default_participant_scheme.is_empty() {
            return Err("default_participant_scheme may not be empty".to_string());
        }
        Ok(())
    }

    /// Load a JSON configuration file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> SbdhResult<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate().map_err(SbdhError::Config)?;
        Ok(config)
    }

    /// Save the configuration as JSON.
    pub fn to_file(&self, path: impl AsRef<Path>) -> SbdhResult<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}
