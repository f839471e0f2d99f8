use std::fs;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::error::IsaError;
use crate::tokenizer::QuotePolicy;

pub const DEFAULT_CONFIG_FILE: &str = "kira-isa.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub quote: Option<String>,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub skip: Vec<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub quote: QuotePolicy,
    pub strict: bool,
    pub skip: Vec<Utf8PathBuf>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            quote: QuotePolicy::Char('"'),
            strict: false,
            skip: Vec::new(),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, IsaError> {
        let config_path = Utf8PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_FILE));

        if path.is_none() && !config_path.exists() {
            tracing::debug!(path = %config_path, "no config file, using defaults");
            return Ok(ResolvedConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| IsaError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| IsaError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, IsaError> {
        let schema_version = config.schema_version.unwrap_or(1);
        if schema_version != 1 {
            return Err(IsaError::InvalidConfig(format!(
                "unsupported schema_version {schema_version}"
            )));
        }

        let quote = match config.quote.as_deref() {
            None => QuotePolicy::Char('"'),
            Some(value) => parse_quote(value)?,
        };

        Ok(ResolvedConfig {
            schema_version,
            quote,
            strict: config.strict,
            skip: config.skip,
        })
    }
}

// An empty string turns quoting off.
pub fn parse_quote(value: &str) -> Result<QuotePolicy, IsaError> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(QuotePolicy::None),
        (Some(quote), None) if quote != '\t' && quote != '\n' => Ok(QuotePolicy::Char(quote)),
        _ => Err(IsaError::InvalidConfig(format!(
            "quote must be empty or a single character other than tab or newline, got {value:?}"
        ))),
    }
}
