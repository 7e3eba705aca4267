//! Keyfile configuration.
//!
//! Configuration is a JSON file; every field is optional.
//!
//! ```json
//! {
//!   "env_prefix": "BT_COLD_PW_",
//!   "policy": { "min_length": 8, "min_entropy_bits": 10.0, "min_strength": 0.2 }
//! }
//! ```

use crate::crypto::password::{PasswordPolicy, MIN_ENTROPY_BITS, MIN_LENGTH, MIN_STRENGTH};
use crate::error::{KeyFileError, Result};
use crate::storage::source::DEFAULT_ENV_PREFIX;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Settings shared by every keyfile a process opens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyfileConfig {
    /// Prefix of environment variables that supply keyfile passwords.
    pub env_prefix: String,

    /// Password strength requirements for new passwords.
    pub policy: PolicyConfig,
}

impl Default for KeyfileConfig {
    fn default() -> Self {
        Self {
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            policy: PolicyConfig::default(),
        }
    }
}

impl KeyfileConfig {
    /// Load configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            KeyFileError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        Self::from_json(&content).map_err(|e| match e {
            KeyFileError::ConfigError(reason) => {
                KeyFileError::ConfigError(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Parse configuration from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| KeyFileError::ConfigError(format!("Invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.env_prefix.is_empty() {
            return Err(KeyFileError::ConfigError(
                "env_prefix must not be empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.policy.min_strength) {
            return Err(KeyFileError::ConfigError(format!(
                "policy.min_strength must be between 0 and 1, got {}",
                self.policy.min_strength
            )));
        }
        if self.policy.min_entropy_bits < 0.0 {
            return Err(KeyFileError::ConfigError(format!(
                "policy.min_entropy_bits must not be negative, got {}",
                self.policy.min_entropy_bits
            )));
        }
        Ok(())
    }
}

/// Password policy thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Minimum password length in characters.
    pub min_length: usize,
    /// Minimum entropy estimate in bits.
    pub min_entropy_bits: f64,
    /// Minimum strength score between 0 and 1.
    pub min_strength: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_length: MIN_LENGTH,
            min_entropy_bits: MIN_ENTROPY_BITS,
            min_strength: MIN_STRENGTH,
        }
    }
}

impl From<&PolicyConfig> for PasswordPolicy {
    fn from(config: &PolicyConfig) -> Self {
        PasswordPolicy::new(config.min_length, config.min_entropy_bits, config.min_strength)
    }
}
