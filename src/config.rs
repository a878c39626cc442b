// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Configuration persistence for k8sbackup
//!
//! All k8sbackup data is stored under ~/.k8sbackup/:
//! - ~/.k8sbackup/config.json - user configuration
//! - ~/.k8sbackup/log/ - log files
//! - ~/.k8sbackup/backups/ - default location of backups

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Get the base k8sbackup directory (~/.k8sbackup/)
pub fn base_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|p| p.join(".k8sbackup"))
        .context("Could not determine home directory")
}

fn default_excluded_resources() -> Vec<String> {
    vec!["events".to_string(), "events.events.k8s.io".to_string()]
}

fn default_action_timeout_secs() -> u64 {
    30
}

/// k8sbackup configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory backups are written under (~/.k8sbackup/backups when unset)
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Resources excluded from every backup
    #[serde(default = "default_excluded_resources")]
    pub excluded_resources: Vec<String>,

    /// Upper bound for a single item action
    #[serde(default = "default_action_timeout_secs")]
    pub action_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: None,
            excluded_resources: default_excluded_resources(),
            action_timeout_secs: default_action_timeout_secs(),
        }
    }
}

impl Config {
    /// Load config from disk, or return default if not found
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to disk
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Get the config file path (~/.k8sbackup/config.json)
    pub fn config_path() -> Result<PathBuf> {
        Ok(base_dir()?.join("config.json"))
    }

    /// Directory new backups are created in
    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(base_dir()?.join("backups")),
        }
    }

    pub fn action_timeout(&self) -> Duration {
        Duration::from_secs(self.action_timeout_secs)
    }
}
