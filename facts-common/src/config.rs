//! Configuration loading for the facts services
//!
//! Settings come from a TOML file whose keys mirror the service property names
//! (`[app.llm.proxyapi]` → `api-key = "..."`). Every leaf can then be
//! overridden from the environment using its dotted path, uppercased, with `.`
//! and `-` turned into `_`:
//!
//! ```text
//! app.llm.proxyapi.api-key      → APP_LLM_PROXYAPI_API_KEY
//! app.kafka.bootstrap-servers   → APP_KAFKA_BOOTSTRAP_SERVERS
//! ```
//!
//! # Resolution Order
//!
//! 1. Environment variable for the leaf
//! 2. TOML file (`FACTS_GEN_CONFIG`, else `./facts-gen.toml`)
//! 3. Built-in defaults
//!
//! A missing default file is not an error; the service starts on defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FACTS_GEN_CONFIG";

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "facts-gen.toml";

/// Service name, also the default consumer group
pub const SERVICE_NAME: &str = "facts-gen";

/// The only LLM provider wired into the generator
pub const PROVIDER_PROXYAPI: &str = "proxyapi";

/// Root of the configuration tree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    pub app: AppSettings,
    pub server: ServerSettings,
    pub logging: LoggingConfig,
}

/// `app.*` properties
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AppSettings {
    pub kafka: KafkaSettings,
    pub music_service: MusicServiceSettings,
    pub llm: LlmSettings,
    pub dispatch: DispatchSettings,
}

// ============================================================================
// Bus
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct KafkaSettings {
    /// Comma-separated broker list
    pub bootstrap_servers: String,
    pub topics: TopicSettings,
    pub consumer: ConsumerSettings,
    pub producer: ProducerSettings,
    pub listener: ListenerSettings,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topics: TopicSettings::default(),
            consumer: ConsumerSettings::default(),
            producer: ProducerSettings::default(),
            listener: ListenerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TopicSettings {
    /// Inbound generation commands
    pub facts_events: String,
    /// Outbound generated facts
    pub generated_facts: String,
}

impl TopicSettings {
    /// Dead-letter topic for the inbound topic
    pub fn dead_letter(&self) -> String {
        format!("{}.dlt", self.facts_events)
    }
}

impl Default for TopicSettings {
    fn default() -> Self {
        Self {
            facts_events: "music.facts.events".to_string(),
            generated_facts: "music.track.facts.generated".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConsumerSettings {
    pub group_id: String,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group_id: SERVICE_NAME.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProducerSettings {
    /// Upper bound for a delivery report
    pub message_timeout_ms: u64,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            message_timeout_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListenerSettings {
    pub retry: ListenerRetrySettings,
}

/// Per-record redelivery policy applied before dead-lettering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ListenerRetrySettings {
    pub max_retries: u32,
    pub initial_interval_ms: u64,
    pub multiplier: f64,
}

impl Default for ListenerRetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_interval_ms: 1_000,
            multiplier: 2.0,
        }
    }
}

// ============================================================================
// Upstreams
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MusicServiceSettings {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for MusicServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmSettings {
    pub provider: String,
    pub prompt: PromptSettings,
    pub proxyapi: ProxyApiSettings,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: PROVIDER_PROXYAPI.to_string(),
            prompt: PromptSettings::default(),
            proxyapi: ProxyApiSettings::default(),
        }
    }
}

/// Prompt defaults for facts generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PromptSettings {
    pub format_version: i64,
    pub lang: String,
    pub max_sources: u32,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            format_version: 1,
            lang: "ru".to_string(),
            max_sources: 3,
        }
    }
}

/// OpenAI-compatible gateway settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ProxyApiSettings {
    pub base_url: String,
    /// Bearer token; blank means every completion fails fast
    pub api_key: String,
    pub model: String,
    /// Total budget for one completion, retries included
    pub timeout_ms: u64,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Transport/status retries inside the client
    pub retry: RetrySettings,
    /// Re-prompts when the answer fails validation; missing keys fall back
    /// to [`RetrySettings::format_default`]
    #[serde(deserialize_with = "deserialize_format_retry")]
    pub format_retry: RetrySettings,
}

impl Default for ProxyApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://openai.api.proxyapi.ru/v1".to_string(),
            api_key: String::new(),
            model: "openai/gpt-4o-mini".to_string(),
            timeout_ms: 10_000,
            temperature: 0.2,
            max_tokens: 600,
            retry: RetrySettings::default(),
            format_retry: RetrySettings::format_default(),
        }
    }
}

/// Format-retry table as written, before defaults are filled in
#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PartialRetrySettings {
    max_attempts: Option<u32>,
    backoff_ms: Option<u64>,
}

fn deserialize_format_retry<'de, D>(deserializer: D) -> std::result::Result<RetrySettings, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let partial = PartialRetrySettings::deserialize(deserializer)?;
    let defaults = RetrySettings::format_default();
    Ok(RetrySettings {
        max_attempts: partial.max_attempts.unwrap_or(defaults.max_attempts),
        backoff_ms: partial.backoff_ms.unwrap_or(defaults.backoff_ms),
    })
}

/// Attempts + base backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl RetrySettings {
    /// Defaults for `format-retry`
    pub fn format_default() -> Self {
        Self {
            max_attempts: 2,
            backoff_ms: 400,
        }
    }

    /// Attempt count, never below one
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 400,
        }
    }
}

// ============================================================================
// Dispatch, server, logging
// ============================================================================

/// Where generation runs relative to the bus listener
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Priority queue drained by a single background worker
    #[default]
    Queue,
    /// Generate inside the listener call; failures go to the bus error handler
    Direct,
}

impl DispatchMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Direct => "direct",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DispatchSettings {
    pub mode: DispatchMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ServerSettings {
    /// Health endpoint listen address
    pub bind_address: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8086".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins when set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Settings {
    /// Resolve the config file, apply environment overrides and validate
    pub fn load() -> Result<Self> {
        let settings = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    warn!(
                        "No config file found ({} unset, {} missing), using built-in defaults",
                        CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE
                    );
                    Self::default()
                }
            }
        };

        let settings = settings.apply_env_overrides(|name| std::env::var(name).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
        let settings = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }

    /// Replace every leaf that has a matching environment variable
    ///
    /// `lookup` maps a variable name to its value; tests pass a map instead of
    /// touching the process environment.
    pub fn apply_env_overrides<F>(self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut tree = toml::Value::try_from(&self)
            .map_err(|e| Error::Config(format!("Serialize settings failed: {}", e)))?;

        let mut path = Vec::new();
        override_leaves(&mut tree, &mut path, &lookup)?;

        tree.try_into()
            .map_err(|e| Error::Config(format!("Environment override rejected: {}", e)))
    }

    /// Fail fast on values the service cannot run with
    pub fn validate(&self) -> Result<()> {
        let app = &self.app;

        if app.kafka.topics.facts_events.trim().is_empty() {
            return Err(Error::Config("app.kafka.topics.facts-events is required".to_string()));
        }
        if app.kafka.topics.generated_facts.trim().is_empty() {
            return Err(Error::Config("app.kafka.topics.generated-facts is required".to_string()));
        }
        if app.kafka.listener.retry.multiplier < 1.0 {
            return Err(Error::Config(
                "app.kafka.listener.retry.multiplier must be >= 1".to_string(),
            ));
        }
        if !is_http_base(&app.music_service.base_url) {
            return Err(Error::Config(format!(
                "app.music-service.base-url must be an http(s) URL, got '{}'",
                app.music_service.base_url
            )));
        }
        if !app.llm.provider.eq_ignore_ascii_case(PROVIDER_PROXYAPI) {
            return Err(Error::Config(format!(
                "Unsupported app.llm.provider '{}' (supported: {})",
                app.llm.provider, PROVIDER_PROXYAPI
            )));
        }
        if !is_http_base(&app.llm.proxyapi.base_url) {
            return Err(Error::Config(format!(
                "app.llm.proxyapi.base-url must be an http(s) URL, got '{}'",
                app.llm.proxyapi.base_url
            )));
        }
        if app.llm.prompt.max_sources == 0 {
            return Err(Error::Config("app.llm.prompt.max-sources must be >= 1".to_string()));
        }

        Ok(())
    }
}

fn is_http_base(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Environment variable name for a dotted property path
pub fn env_var_name(path: &[String]) -> String {
    path.join("_").to_ascii_uppercase().replace('-', "_")
}

fn override_leaves<F>(value: &mut toml::Value, path: &mut Vec<String>, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    if let toml::Value::Table(table) = value {
        for (key, child) in table.iter_mut() {
            path.push(key.clone());
            override_leaves(child, path, lookup)?;
            path.pop();
        }
        return Ok(());
    }

    let name = env_var_name(path);
    let Some(raw) = lookup(&name) else {
        return Ok(());
    };

    let invalid = |kind: &str| Error::InvalidInput(format!("{} must be {}, got '{}'", name, kind, raw));
    *value = match &*value {
        toml::Value::String(_) => toml::Value::String(raw.clone()),
        toml::Value::Integer(_) => {
            toml::Value::Integer(raw.trim().parse().map_err(|_| invalid("an integer"))?)
        }
        toml::Value::Float(_) => {
            toml::Value::Float(raw.trim().parse().map_err(|_| invalid("a number"))?)
        }
        toml::Value::Boolean(_) => {
            toml::Value::Boolean(raw.trim().parse().map_err(|_| invalid("true or false"))?)
        }
        _ => return Err(invalid("a scalar")),
    };

    info!("Configuration override from environment: {}", name);
    Ok(())
}
