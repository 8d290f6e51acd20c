use crate::error::ConfigError;
use crate::llm::AdapterKind;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

// ── Top-level config ──────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    pub api_key: Option<String>,
    #[serde(default)]
    pub adapter: AdapterKind,
    pub model: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Override the adapter endpoint (self-hosted proxies, tests)
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub canvas: CanvasConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default)]
    pub training: TrainingConfig,

    #[serde(default)]
    pub attachments: AttachmentsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

fn default_temperature() -> f64 {
    0.7
}

fn default_true() -> bool {
    true
}

// ── Canvas ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasConfig {
    /// WebSocket endpoint of the shared canvas
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

fn default_server_url() -> String {
    "ws://localhost:3001/updates".into()
}

fn default_heartbeat_secs() -> u64 {
    5
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

// ── Agent loop ───────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Target time between iteration starts (0 = back to back)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_max_batch")]
    pub max_batch: usize,
    /// Consecutive invocation failures before the agent stops
    #[serde(default = "default_failure_budget")]
    pub max_consecutive_failures: u32,
    /// Consecutive zero-command iterations before the agent stops
    #[serde(default = "default_failure_budget")]
    pub max_empty_replies: u32,
    /// Escalating waits for generic invocation failures
    #[serde(default = "default_backoff_tiers")]
    pub backoff_tiers_secs: Vec<u64>,
    /// Rate-limit waits are at least this long (and at least the cadence)
    #[serde(default = "default_rate_limit_secs")]
    pub rate_limit_floor_secs: u64,
    #[serde(default = "default_timeout_backoff_secs")]
    pub timeout_backoff_secs: u64,
    #[serde(default = "default_empty_backoff_secs")]
    pub empty_backoff_secs: u64,
    #[serde(default = "default_validation_retry_secs")]
    pub validation_retry_secs: u64,
    /// Re-prompt once with a clarifying instruction on an empty reply
    #[serde(default = "default_true")]
    pub clarify: bool,
    /// Share of the cadence the dispatcher may spread a batch over
    #[serde(default = "default_dispatch_share")]
    pub dispatch_share: f64,
}

fn default_interval_secs() -> u64 {
    20
}

fn default_max_batch() -> usize {
    crate::canvas::MAX_BATCH
}

fn default_failure_budget() -> u32 {
    5
}

fn default_backoff_tiers() -> Vec<u64> {
    vec![15, 60, 120]
}

fn default_rate_limit_secs() -> u64 {
    60
}

fn default_timeout_backoff_secs() -> u64 {
    180
}

fn default_empty_backoff_secs() -> u64 {
    60
}

fn default_validation_retry_secs() -> u64 {
    3
}

fn default_dispatch_share() -> f64 {
    0.8
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_batch: default_max_batch(),
            max_consecutive_failures: default_failure_budget(),
            max_empty_replies: default_failure_budget(),
            backoff_tiers_secs: default_backoff_tiers(),
            rate_limit_floor_secs: default_rate_limit_secs(),
            timeout_backoff_secs: default_timeout_backoff_secs(),
            empty_backoff_secs: default_empty_backoff_secs(),
            validation_retry_secs: default_validation_retry_secs(),
            clarify: true,
            dispatch_share: default_dispatch_share(),
        }
    }
}

impl AgentConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

// ── Prompts ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// JSON file overriding the built-in prompt fragments
    #[serde(default)]
    pub fragments_path: Option<String>,
    /// Extra user text appended as the task
    #[serde(default)]
    pub custom_prompt: Option<String>,
    /// Vivid colors suggested per prompt
    #[serde(default = "default_vivid_colors")]
    pub vivid_colors: usize,
}

fn default_vivid_colors() -> usize {
    8
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            fragments_path: None,
            custom_prompt: None,
            vivid_colors: default_vivid_colors(),
        }
    }
}

// ── Training ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_exercise")]
    pub exercise: String,
    #[serde(default = "default_true")]
    pub auto_advance: bool,
}

fn default_exercise() -> String {
    "A1".into()
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            exercise: default_exercise(),
            auto_advance: true,
        }
    }
}

// ── Attachments ──────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentsConfig {
    /// Rasterizer endpoint; no attachments when unset
    #[serde(default)]
    pub rasterizer_url: Option<String>,
}

// ── Observability ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "none" | "log"
    pub backend: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            backend: "log".into(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        Self {
            config_path: home.join(".poietic-agent").join("config.toml"),
            api_key: None,
            adapter: AdapterKind::default(),
            model: None,
            temperature: default_temperature(),
            base_url: None,
            canvas: CanvasConfig::default(),
            agent: AgentConfig::default(),
            prompts: PromptsConfig::default(),
            training: TrainingConfig::default(),
            attachments: AttachmentsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_at(&home.join(".poietic-agent").join("config.toml"))
    }

    /// Load `path`, or write the defaults there when it does not exist yet.
    pub fn load_or_init_at(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).map_err(|e| ConfigError::Load(e.to_string()))?;
            config.config_path = path.to_path_buf();
            config
        } else {
            if let Some(dir) = path.parent() {
                fs::create_dir_all(dir).context("Failed to create config directory")?;
            }
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            config
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("POIETIC_API_KEY")
            && !key.trim().is_empty()
        {
            self.api_key = Some(key.trim().to_string());
        }

        if let Ok(adapter) = std::env::var("POIETIC_ADAPTER") {
            match adapter.parse::<AdapterKind>() {
                Ok(kind) => self.adapter = kind,
                Err(_) if adapter.is_empty() => {}
                Err(_) => tracing::warn!(adapter = %adapter, "ignoring unknown POIETIC_ADAPTER"),
            }
        }

        if let Ok(model) = std::env::var("POIETIC_MODEL")
            && !model.is_empty()
        {
            self.model = Some(model);
        }

        if let Ok(url) = std::env::var("POIETIC_SERVER_URL")
            && !url.is_empty()
        {
            self.canvas.server_url = url;
        }

        if let Ok(secs) = std::env::var("POIETIC_INTERVAL_SECS")
            && let Ok(secs) = secs.trim().parse::<u64>()
        {
            self.agent.interval_secs = secs;
        }

        if let Ok(temp) = std::env::var("POIETIC_TEMPERATURE")
            && let Ok(temp) = temp.trim().parse::<f64>()
        {
            self.temperature = temp;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));
        if !(0.0..=2.0).contains(&self.temperature) {
            return invalid(format!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            ));
        }
        if self.agent.interval_secs > 3600 {
            return invalid("agent.interval_secs must not exceed one hour".into());
        }
        if !(1..=crate::canvas::MAX_BATCH).contains(&self.agent.max_batch) {
            return invalid(format!(
                "agent.max_batch must be within [1, {}]",
                crate::canvas::MAX_BATCH
            ));
        }
        if self.agent.max_consecutive_failures == 0 || self.agent.max_empty_replies == 0 {
            return invalid("failure budgets must be at least 1".into());
        }
        if self.agent.backoff_tiers_secs.is_empty() {
            return invalid("agent.backoff_tiers_secs must not be empty".into());
        }
        if !(self.agent.dispatch_share > 0.0 && self.agent.dispatch_share <= 1.0) {
            return invalid("agent.dispatch_share must be within (0, 1]".into());
        }
        if self.canvas.heartbeat_secs == 0 {
            return invalid("canvas.heartbeat_secs must be at least 1".into());
        }
        if let Err(e) = url::Url::parse(&self.canvas.server_url) {
            return invalid(format!("canvas.server_url is not a URL: {e}"));
        }
        if let Some(raster) = &self.attachments.rasterizer_url
            && let Err(e) = url::Url::parse(raster)
        {
            return invalid(format!("attachments.rasterizer_url is not a URL: {e}"));
        }
        if self.training.enabled && crate::training::exercise(&self.training.exercise).is_none() {
            return invalid(format!("unknown exercise '{}'", self.training.exercise));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str)
            .map_err(ConfigError::Io)
            .context("Failed to write config file")?;
        Ok(())
    }
}
