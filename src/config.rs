//! TOML configuration.
//!
//! Every section is optional; a file containing nothing at all is a valid
//! configuration that uses the disabled responder and no item sources.
//!
//! ```toml
//! [responder]
//! provider = "auto"            # disabled | echo | openai | anthropic | auto
//! model = "gpt-4o"
//! timeout_secs = 120
//! max_retries = 3
//!
//! [relay]
//! max_concurrency = 1
//! enable_reasoning = false
//!
//! [items]
//! manifest = "./retrieved.json"
//!
//! [connectors.filesystem]
//! root = "./docs"
//! include_globs = ["**/*.md"]
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub responder: ResponderConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub items: ItemsConfig,
    #[serde(default)]
    pub connectors: ConnectorsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResponderConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Model used when `--model` is not given on the command line.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_openai_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_anthropic_base_url")]
    pub anthropic_base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Token budget for Anthropic extended thinking.
    #[serde(default = "default_thinking_budget")]
    pub thinking_budget: u32,
    /// Anthropic models that accept extended thinking.
    #[serde(default = "default_reasoning_models")]
    pub reasoning_models: Vec<String>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            openai_base_url: default_openai_base_url(),
            anthropic_base_url: default_anthropic_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            thinking_budget: default_thinking_budget(),
            reasoning_models: default_reasoning_models(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_anthropic_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_timeout_secs() -> u64 {
    120
}
fn default_max_retries() -> u32 {
    3
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_temperature() -> f32 {
    0.7
}
fn default_thinking_budget() -> u32 {
    4000
}
fn default_reasoning_models() -> Vec<String> {
    vec![
        "claude-3-7-sonnet-latest".to_string(),
        "claude-3-5-sonnet-latest".to_string(),
    ]
}

impl ResponderConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default)]
    pub enable_reasoning: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            enable_reasoning: false,
        }
    }
}

fn default_max_concurrency() -> usize {
    1
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ItemsConfig {
    /// JSON manifest of retrieved items.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ConnectorsConfig {
    pub filesystem: Option<FilesystemConnectorConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemConnectorConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

impl Config {
    /// Configuration used when no config file exists.
    pub fn minimal() -> Self {
        Self::default()
    }
}

/// Load the config at `path`, or [`Config::minimal`] if the file does not exist.
pub fn load_config_or_minimal(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::minimal())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.responder.provider.as_str() {
        "disabled" | "echo" | "openai" | "anthropic" | "auto" => {}
        other => bail!(
            "Unknown responder provider: '{}'. Must be disabled, echo, openai, anthropic, or auto.",
            other
        ),
    }

    if config.responder.timeout_secs == 0 {
        bail!("responder.timeout_secs must be > 0");
    }
    if config.responder.max_tokens == 0 {
        bail!("responder.max_tokens must be > 0");
    }
    if !(0.0..=2.0).contains(&config.responder.temperature) {
        bail!("responder.temperature must be in [0.0, 2.0]");
    }
    if config.responder.thinking_budget >= config.responder.max_tokens {
        bail!("responder.thinking_budget must be less than responder.max_tokens");
    }

    if config.relay.max_concurrency == 0 {
        bail!("relay.max_concurrency must be >= 1");
    }

    Ok(())
}
