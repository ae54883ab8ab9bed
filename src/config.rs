// src/config.rs
//! Planner configuration with sane defaults, loadable from TOML.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tuning knobs of the planner. Every field has a default, a partial TOML
/// file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Seed table for the standard sampler. Missing or unreadable files
    /// degrade to live-only sampling.
    #[serde(default)]
    pub precomputation_file: Option<PathBuf>,

    /// When set, every planner input is appended to this capture file.
    #[serde(default)]
    pub capture_file: Option<PathBuf>,

    /// Live search iterations of the standard sampler per tick.
    #[serde(default = "default_standard_samples")]
    pub standard_samples: u32,

    /// Endpoint candidates of the end-in-obstacle sampler per tick.
    #[serde(default = "default_end_in_obstacle_samples")]
    pub end_in_obstacle_samples: u32,

    /// Escape candidates per escape stage per tick.
    #[serde(default = "default_escape_samples")]
    pub escape_samples: u32,
}

fn default_standard_samples() -> u32 {
    120
}

fn default_end_in_obstacle_samples() -> u32 {
    60
}

fn default_escape_samples() -> u32 {
    25
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            precomputation_file: None,
            capture_file: None,
            standard_samples: default_standard_samples(),
            end_in_obstacle_samples: default_end_in_obstacle_samples(),
            escape_samples: default_escape_samples(),
        }
    }
}

impl PlannerConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }
}
