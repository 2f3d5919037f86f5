//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default upper bound on mapping instructions per command
pub const DEFAULT_MAX_MAPPING_INSTRUCTIONS: usize = 1_000;

/// Failure to load an [`EngineConfig`]
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Engine configuration
///
/// ```toml
/// partition_id = 1
/// max_mapping_instructions = 500
/// verify_log_integrity = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Partition the engine runs on; keys it generates carry this id
    pub partition_id: u16,
    /// Commands with more mapping instructions are rejected
    pub max_mapping_instructions: usize,
    /// Re-walk the log hash chain after every committed batch
    pub verify_log_integrity: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            partition_id: 1,
            max_mapping_instructions: DEFAULT_MAX_MAPPING_INSTRUCTIONS,
            verify_log_integrity: false,
        }
    }
}

impl EngineConfig {
    /// Defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the partition id
    #[inline]
    #[must_use]
    pub fn with_partition_id(mut self, partition_id: u16) -> Self {
        self.partition_id = partition_id;
        self
    }

    /// Set the mapping instruction limit
    #[inline]
    #[must_use]
    pub fn with_max_mapping_instructions(mut self, max: usize) -> Self {
        self.max_mapping_instructions = max;
        self
    }

    /// Toggle the integrity check after each commit
    #[inline]
    #[must_use]
    pub fn with_log_verification(mut self, enabled: bool) -> Self {
        self.verify_log_integrity = enabled;
        self
    }

    /// Parse and validate a TOML document; missing keys take their defaults
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`]
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`EngineConfig::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// # Errors
    /// [`ConfigError::Invalid`] if `max_mapping_instructions` is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_mapping_instructions == 0 {
            return Err(ConfigError::Invalid(
                "max_mapping_instructions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    ///
    /// # Errors
    /// Never for this struct; kept fallible to match the `toml` API
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }
}
