//! CLI argument definitions for the Apprentice trainer.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::path::PathBuf;

use apprentice_core::config::ApprenticeConfig;
use apprentice_core::types::AgentId;
use clap::{Parser, Subcommand};

/// Apprentice: teach an agent a topic through a question-and-answer loop.
#[derive(Parser, Debug)]
#[command(name = "apprentice", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Base URL of the management console API.
    #[arg(long = "console-url")]
    pub console_url: Option<String>,

    /// Agent to train.
    #[arg(short = 'a', long = "agent")]
    pub agent: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Teach a topic chosen by id.
    Teach {
        /// Topic identifier in the console.
        #[arg(long = "topic-id")]
        topic_id: String,
        /// Display name; defaults to the id.
        #[arg(long = "topic-name")]
        topic_name: Option<String>,
    },
    /// Teach whichever topic a knowledge gap resolves to.
    Gap {
        /// Identifier of the open gap.
        gap_id: String,
    },
    /// List the agent's open knowledge gaps.
    Gaps,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > APPRENTICE_CONFIG env var > ~/.apprentice/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("APPRENTICE_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the console base URL.
    ///
    /// Priority: --console-url flag > APPRENTICE_CONSOLE_URL env var > config file value.
    pub fn resolve_console_url(&self, config: &ApprenticeConfig) -> String {
        if let Some(ref url) = self.console_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("APPRENTICE_CONSOLE_URL") {
            if !url.trim().is_empty() {
                return url;
            }
        }
        config.console.base_url.clone()
    }

    /// Resolve the agent to train.
    ///
    /// Priority: --agent flag > config file value. `None` if neither is set.
    pub fn resolve_agent(&self, config: &ApprenticeConfig) -> Option<AgentId> {
        self.agent
            .clone()
            .or_else(|| config.console.agent_id.clone())
            .filter(|id| !id.trim().is_empty())
            .map(AgentId::from)
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &ApprenticeConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".apprentice").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".apprentice").join("config.toml");
    }
    PathBuf::from("config.toml")
}
