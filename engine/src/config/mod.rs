//! Configuration management
//!
//! This module handles loading, validation, and management of the Captain
//! configuration. Configuration is stored in TOML format at
//! ~/.captain/config.toml.
//!
//! # Configuration Sections
//!
//! - **core**: Log level
//! - **llm**: Chat-completion endpoint, model and sampling settings
//! - **orchestrator**: Nested hub switch, cascading GC, user identity
//! - **persist**: Thread mode and persistence target per space kind
//! - **spokes**: LLM-backed workers registered at startup
//! - **memory**: Conversational memory limits
//!
//! # Environment Overrides
//!
//! `ORCH_NESTED`, `THREAD_MODE`, `ORCH_PERSIST_WORKCELL`, `ORCH_PERSIST_ORCH`,
//! `ORCH_PERSIST_AGENT_ST`, `OPENAI_BASE_URL` and `OPENAI_MODEL` take
//! precedence over the file. The API key is only ever read from
//! `OPENAI_API_KEY`.
//!
//! # Examples
//!
//! ```no_run
//! use captain_engine::config::Config;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = Config::load_or_create()?;
//! config.apply_env_overrides()?;
//!
//! println!("Model: {}", config.llm.model);
//! println!("Nested: {}", config.orchestrator.nested);
//! # Ok(())
//! # }
//! ```

use crate::memory::adapter::{TARGET_AGENT_ST, TARGET_ORCH, TARGET_WORKCELL};
use crate::memory::{PersistTarget, ThreadMode};
use sdk::errors::HubError;
use sdk::types::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Core engine settings
    #[serde(default)]
    pub core: CoreConfig,

    /// Chat-completion endpoint
    #[serde(default)]
    pub llm: LlmConfig,

    /// Hub behaviour
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Memory persistence routing
    #[serde(default)]
    pub persist: PersistConfig,

    /// Spokes registered at startup
    #[serde(default)]
    pub spokes: Vec<SpokeConfig>,

    /// Conversational memory limits
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Core engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// OpenAI-compatible endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature (0.0-2.0)
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Hub behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Use the nested hub (builder_captain spokes may take the coder phase)
    #[serde(default)]
    pub nested: bool,

    /// Collect per-role child spaces together with the workcell
    ///
    /// Without cascading every closed run leaves its planner, coder and critic
    /// spaces behind. Unset, it follows `PersistConfig::is_ephemeral`: on when
    /// workcell and agent_st spaces only live in memory, off otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade_gc: Option<bool>,

    /// Owner of the conversational thread
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

/// Memory persistence routing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistConfig {
    #[serde(default)]
    pub thread_mode: ThreadMode,

    #[serde(default = "default_workcell_target")]
    pub workcell: PersistTarget,

    #[serde(default = "default_orch_target")]
    pub orch: PersistTarget,

    #[serde(default = "default_agent_st_target")]
    pub agent_st: PersistTarget,
}

/// One LLM-backed spoke
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpokeConfig {
    pub role: Role,

    /// Fitness score, higher wins
    #[serde(default)]
    pub score: i64,

    /// Display name, defaults to the role
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Model override for this spoke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Single-tenant: unavailable to other runs while acquired
    #[serde(default)]
    pub exclusive: bool,
}

/// Conversational memory limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Turns included in the chat context block
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,

    /// Token budget of the local thread history
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            nested: false,
            cascade_gc: None,
            user_id: default_user_id(),
        }
    }
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            thread_mode: ThreadMode::default(),
            workcell: default_workcell_target(),
            orch: default_orch_target(),
            agent_st: default_agent_st_target(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            recent_limit: default_recent_limit(),
            context_limit: default_context_limit(),
        }
    }
}

impl PersistConfig {
    /// True when workcells and their role spaces are never persisted outside
    /// the process
    pub fn is_ephemeral(&self) -> bool {
        self.workcell == PersistTarget::Inmem && self.agent_st == PersistTarget::Inmem
    }

    /// Persist targets keyed the way the memory adapter expects them
    pub fn targets(&self) -> BTreeMap<String, PersistTarget> {
        BTreeMap::from([
            (TARGET_WORKCELL.to_string(), self.workcell),
            (TARGET_ORCH.to_string(), self.orch),
            (TARGET_AGENT_ST.to_string(), self.agent_st),
        ])
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_user_id() -> String {
    "local_user".to_string()
}

fn default_workcell_target() -> PersistTarget {
    PersistTarget::Inmem
}

fn default_orch_target() -> PersistTarget {
    PersistTarget::Graph
}

fn default_agent_st_target() -> PersistTarget {
    PersistTarget::Inmem
}

fn default_recent_limit() -> usize {
    8
}

fn default_context_limit() -> usize {
    8000
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

impl Config {
    /// Load configuration from the default location (~/.captain/config.toml)
    ///
    /// If the configuration file doesn't exist, creates a default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    pub fn load_or_create() -> Result<Self, HubError> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_path(&config_path)
        } else {
            Self::create_default(&config_path)
        }
    }

    /// Whether closing a workcell also collects its role spaces
    pub fn cascade_gc(&self) -> bool {
        self.orchestrator
            .cascade_gc
            .unwrap_or_else(|| self.persist.is_ephemeral())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, HubError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| HubError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| HubError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Create default configuration and save to path
    pub fn create_default(path: &Path) -> Result<Self, HubError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                HubError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let config = Self::default();

        let toml_string = toml::to_string_pretty(&config)
            .map_err(|e| HubError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(path, toml_string)
            .map_err(|e| HubError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(config)
    }

    /// Get the default configuration file path (~/.captain/config.toml)
    pub fn default_config_path() -> Result<PathBuf, HubError> {
        let home = dirs::home_dir()
            .ok_or_else(|| HubError::Config("Could not determine home directory".to_string()))?;

        Ok(home.join(".captain").join("config.toml"))
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<(), HubError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup
    ///
    /// Unset keys leave the current value alone. Invalid persist targets are
    /// configuration errors; `THREAD_MODE` and `ORCH_NESTED` parse leniently.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), HubError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ORCH_NESTED") {
            self.orchestrator.nested = is_truthy(&v);
        }
        if let Some(v) = lookup("THREAD_MODE") {
            self.persist.thread_mode = ThreadMode::from_env_value(&v);
        }

        let targets = [
            ("ORCH_PERSIST_WORKCELL", &mut self.persist.workcell),
            ("ORCH_PERSIST_ORCH", &mut self.persist.orch),
            ("ORCH_PERSIST_AGENT_ST", &mut self.persist.agent_st),
        ];
        for (key, slot) in targets {
            if let Some(v) = lookup(key) {
                *slot = v
                    .parse()
                    .map_err(|e| HubError::Config(format!("{}: {}", key, e)))?;
            }
        }

        if let Some(v) = lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()) {
            self.llm.base_url = v.trim().to_string();
        }
        if let Some(v) = lookup("OPENAI_MODEL").filter(|v| !v.trim().is_empty()) {
            self.llm.model = v.trim().to_string();
        }

        self.validate()
    }

    fn validate(&self) -> Result<(), HubError> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.core.log_level.as_str()) {
            return Err(HubError::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.core.log_level,
                valid_log_levels.join(", ")
            )));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(HubError::Config(
                "temperature must be between 0.0 and 2.0".to_string(),
            ));
        }

        if self.llm.timeout_secs == 0 {
            return Err(HubError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.llm.base_url.trim().is_empty() {
            return Err(HubError::Config("llm.base_url must not be empty".to_string()));
        }

        if self.orchestrator.user_id.trim().is_empty() {
            return Err(HubError::Config(
                "orchestrator.user_id must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}
