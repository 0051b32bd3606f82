use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

/// Text-completion provider settings.
///
/// `provider` is `"openai"` for any OpenAI-compatible chat endpoint
/// (`base_url` selects the gateway) or `"disabled"`.
#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: default_model(),
            base_url: default_base_url(),
            max_retries: 5,
            timeout_secs: 60,
        }
    }
}

impl CompletionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    60
}

/// Remote tender registry settings.
#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_base_url")]
    pub base_url: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: default_source_base_url(),
            timeout_secs: 30,
        }
    }
}

fn default_source_base_url() -> String {
    "https://zakupki.gov.ru".to_string()
}
fn default_source_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AnalysisConfig {
    /// Redact PII-shaped substrings from every textual analysis field.
    #[serde(default)]
    pub confidential_mode: bool,
}

/// Periods for the four monitoring jobs plus the retention window.
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde(default = "default_refresh_secs")]
    pub refresh_secs: u64,
    #[serde(default = "default_cleanup_secs")]
    pub cleanup_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_secs: u64,
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
    #[serde(default = "default_retention_days")]
    pub retention_days: i64,
    #[serde(default = "default_deadline_warn_days")]
    pub deadline_warn_days: i64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_secs: default_refresh_secs(),
            cleanup_secs: default_cleanup_secs(),
            sweep_secs: default_sweep_secs(),
            deadline_secs: default_deadline_secs(),
            retention_days: default_retention_days(),
            deadline_warn_days: default_deadline_warn_days(),
        }
    }
}

impl SchedulerConfig {
    pub fn refresh_period(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }
    pub fn cleanup_period(&self) -> Duration {
        Duration::from_secs(self.cleanup_secs)
    }
    pub fn sweep_period(&self) -> Duration {
        Duration::from_secs(self.sweep_secs)
    }
    pub fn deadline_period(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

fn default_refresh_secs() -> u64 {
    3600
}
fn default_cleanup_secs() -> u64 {
    86_400
}
fn default_sweep_secs() -> u64 {
    14_400
}
fn default_deadline_secs() -> u64 {
    21_600
}
fn default_retention_days() -> i64 {
    30
}
fn default_deadline_warn_days() -> i64 {
    7
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    match config.completion.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown completion provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    if config.completion.is_enabled() && config.completion.model.is_empty() {
        anyhow::bail!(
            "completion.model must be set when provider is '{}'",
            config.completion.provider
        );
    }

    if config.scheduler.retention_days < 1 {
        anyhow::bail!("scheduler.retention_days must be >= 1");
    }

    if config.scheduler.deadline_warn_days < 1 {
        anyhow::bail!("scheduler.deadline_warn_days must be >= 1");
    }

    for (name, secs) in [
        ("refresh_secs", config.scheduler.refresh_secs),
        ("cleanup_secs", config.scheduler.cleanup_secs),
        ("sweep_secs", config.scheduler.sweep_secs),
        ("deadline_secs", config.scheduler.deadline_secs),
    ] {
        if secs == 0 {
            anyhow::bail!("scheduler.{} must be > 0", name);
        }
    }

    Ok(config)
}
