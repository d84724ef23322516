use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::cli::CliArgs;
use crate::dialect::Dialect;
use crate::scheduler::SchedulerConfig;

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Config {
    pub version: u32,
    /// Unset means the directory vcspool is run from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_dir: Option<PathBuf>,
    #[serde(default)]
    pub vcs: VcsConfig,
    #[serde(default)]
    pub scheduler: SchedulerSettings,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VcsConfig {
    #[serde(default)]
    pub dialect: Dialect,
    #[serde(default = "default_git_path")]
    pub git_path: String,
    #[serde(default = "default_hg_path")]
    pub hg_path: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct SchedulerSettings {
    /// Defaults to the number of logical processors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Unset means commands may run forever
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_git_path() -> String {
    Dialect::Git.binary_name().to_string()
}

fn default_hg_path() -> String {
    Dialect::Hg.binary_name().to_string()
}

fn default_poll_interval_ms() -> u64 {
    10
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            repo_dir: None,
            vcs: VcsConfig::default(),
            scheduler: SchedulerSettings::default(),
        }
    }
}

impl Default for VcsConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::default(),
            git_path: default_git_path(),
            hg_path: default_hg_path(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            capacity: None,
            timeout_secs: None,
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl VcsConfig {
    pub fn binary_for(&self, dialect: Dialect) -> &str {
        match dialect {
            Dialect::Git => &self.git_path,
            Dialect::Hg => &self.hg_path,
        }
    }
}

impl SchedulerSettings {
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            capacity: self.capacity,
            timeout: self.timeout_secs.map(Duration::from_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

pub fn get_default_config_path() -> Result<PathBuf> {
    let proj_dirs = ProjectDirs::from("", "", "vcspool")
        .context("Failed to determine project directories")?;

    let config_dir = proj_dirs.config_dir();
    Ok(config_dir.join("vcspool.toml"))
}

impl Config {
    /// Repository to run commands in, falling back to the current directory
    pub fn resolved_repo_dir(&self) -> PathBuf {
        match &self.repo_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p,
            None => get_default_config_path()?,
        };

        if !path.exists() {
            let default_config = Config::default();
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .context("Failed to create config directory")?;
            }
            default_config.save(&path)?;
            return Ok(default_config);
        }

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config to TOML")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    pub fn from_cli_and_file(cli_args: &CliArgs, config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::load(config_path)?;

        // CLI args override config file
        if let Some(repo_dir) = &cli_args.repo_dir {
            config.repo_dir = Some(repo_dir.clone());
        }
        if let Some(dialect) = cli_args.dialect {
            config.vcs.dialect = dialect;
        }
        if let Some(capacity) = cli_args.capacity {
            config.scheduler.capacity = Some(capacity);
        }
        if let Some(timeout_secs) = cli_args.timeout_secs {
            config.scheduler.timeout_secs = Some(timeout_secs);
        }

        Ok(config)
    }
}
