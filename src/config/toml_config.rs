use crate::core::orchestrator::{DEFAULT_MAX_ROUNDS, DEFAULT_UTILITIES};
use crate::core::parser::ParseLimits;
use crate::utils::error::{DemoError, Result};
use crate::utils::validation::{
    validate_algo_selector, validate_non_empty_string, validate_positive_number, validate_range,
    Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub defaults: DefaultsConfig,
    pub limits: LimitsConfig,
    pub logging: LoggingConfig,
}

/// Form defaults used when a request leaves a field out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub k: i64,
    pub algo: String,
    pub utilities: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            k: 2,
            algo: "1".to_string(),
            utilities: DEFAULT_UTILITIES.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_payload_bytes: usize,
    pub max_items: usize,
    pub max_rounds: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let parse = ParseLimits::default();
        Self {
            max_payload_bytes: parse.max_payload_bytes,
            max_items: parse.max_items,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

impl LimitsConfig {
    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_payload_bytes: self.max_payload_bytes,
            max_items: self.max_items,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub verbose: bool,
    pub json: bool,
}

impl DemoConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(DemoError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| DemoError::ConfigError {
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${RFA_MAX_ITEMS})
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| DemoError::ConfigError {
            message: format!("invalid placeholder pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }
}

impl Validate for DemoConfig {
    fn validate(&self) -> Result<()> {
        validate_positive_number("limits.max_payload_bytes", self.limits.max_payload_bytes, 2)?;
        validate_positive_number("limits.max_items", self.limits.max_items, 1)?;
        validate_positive_number("limits.max_rounds", self.limits.max_rounds, 2)?;

        validate_range(
            "defaults.k",
            self.defaults.k,
            2,
            i64::try_from(self.limits.max_rounds).unwrap_or(i64::MAX),
        )?;
        validate_algo_selector("defaults.algo", &self.defaults.algo)?;
        validate_non_empty_string("defaults.utilities", &self.defaults.utilities)?;
        Ok(())
    }
}
