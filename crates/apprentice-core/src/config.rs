use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ApprenticeError, Result};

/// Top-level configuration for the Apprentice trainer.
///
/// Loaded from `~/.apprentice/config.toml` by default. Each section corresponds
/// to one collaborator or cross-cutting concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApprenticeConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    #[serde(default)]
    pub writer: WriterConfig,
}

impl ApprenticeConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ApprenticeConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.console.base_url.trim().is_empty() {
            return Err(ApprenticeError::Config(
                "console.base_url must not be empty".to_string(),
            ));
        }
        if self.console.request_timeout_secs == 0 {
            return Err(ApprenticeError::Config(
                "console.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.analyzer.completion_threshold > 100 {
            return Err(ApprenticeError::Config(format!(
                "analyzer.completion_threshold must be within 0..=100, got {}",
                self.analyzer.completion_threshold
            )));
        }
        if self.writer.max_attempts == 0 {
            return Err(ApprenticeError::Config(
                "writer.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.writer.queue_capacity == 0 {
            return Err(ApprenticeError::Config(
                "writer.queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.writer.backoff_factor < 1.0 {
            return Err(ApprenticeError::Config(format!(
                "writer.backoff_factor must be >= 1.0, got {}",
                self.writer.backoff_factor
            )));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Management console REST API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Base URL of the console API.
    pub base_url: String,
    /// Per-request timeout for gap, summary, and knowledge calls.
    pub request_timeout_secs: u64,
    /// Agent to train when none is given on the command line.
    pub agent_id: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            agent_id: None,
        }
    }
}

/// Confidence analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Upper bound on a single analysis call.
    pub timeout_secs: u64,
    /// Confidence at or above which the agent invites the trainer to finish.
    pub completion_threshold: u8,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            completion_threshold: 90,
        }
    }
}

/// Knowledge chunk writer retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Attempts per chunk, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff_ms: u64,
    /// Cap on any single retry delay.
    pub max_backoff_ms: u64,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_factor: f64,
    /// Add random jitter to retry delays.
    pub jitter: bool,
    /// Pending chunks buffered before `submit` waits.
    pub queue_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff_ms: 250,
            max_backoff_ms: 5_000,
            backoff_factor: 2.0,
            jitter: true,
            queue_capacity: 64,
        }
    }
}
