use crate::core::errors::{PhaseflowError, Result};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Initial capacity of a command's output log
pub const DEFAULT_OUTPUT_CAPACITY: usize = 8;

/// Command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// Command name, used in logs and run reports
    pub name: String,
    /// Number of output lines to allocate up front
    pub output_capacity: usize,
    /// Whether each forwarded output line is also emitted as a debug event
    pub log_output: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            name: format!("command_{}", Uuid::new_v4()),
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            log_output: false,
        }
    }
}

impl CommandConfig {
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Parse a configuration from YAML and validate it
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(PhaseflowError::configuration_field(
                "name must not be empty",
                "name",
            ));
        }
        if self.output_capacity == 0 {
            return Err(PhaseflowError::configuration_field(
                "output_capacity must be greater than 0",
                "output_capacity",
            ));
        }
        Ok(())
    }
}
