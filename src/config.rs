use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level configuration, loaded from TOML. Every field has a default so
/// a missing or partial file still yields a runnable setup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub limits: LimitsConfig,
}

/// Where and how the generator endpoint is reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:7b".to_string(),
            temperature: 0.7,
        }
    }
}

/// Bounds on a single loop run. Sized for small locally-run models with
/// narrow context windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Hard cap on reason/act iterations per run.
    pub max_iterations: u32,
    /// Single global per-tool-call timeout. Whether slow tools (code
    /// execution) deserve a longer allowance is an open product question;
    /// until then one knob covers all of them.
    pub tool_timeout_secs: u64,
    /// Character budget (token-count proxy) for the conversation sent to
    /// the generator each iteration.
    pub max_context_chars: usize,
    /// Cap on a single recorded observation.
    pub observation_max_chars: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            tool_timeout_secs: 30,
            max_context_chars: 12_000,
            observation_max_chars: 2_000,
        }
    }
}

impl Config {
    /// Load and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&raw).map_err(|e| ConfigError::Load(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.max_iterations == 0 {
            return Err(ConfigError::Validation(
                "limits.max_iterations must be at least 1".to_string(),
            ));
        }
        if self.limits.tool_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.tool_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.limits.max_context_chars < 1_000 {
            return Err(ConfigError::Validation(
                "limits.max_context_chars must be at least 1000".to_string(),
            ));
        }
        Ok(())
    }
}
