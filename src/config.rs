// ABOUTME: Configuration loading and validation
// ABOUTME: YAML file discovery with MILLWRIGHT_* environment overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capability::RetryPolicy;
use crate::engine::pool::ResourceRequirement;
use crate::orchestrator::DispatchMode;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pool: PoolConfig,
    pub retry: RetryPolicy,
    #[serde(with = "humantime_serde")]
    pub analyzer_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub capability_timeout: Duration,
    pub dispatch_mode: DispatchMode,
    pub history_retention: usize,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub cpu: f64,
    pub memory: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            retry: RetryPolicy::default(),
            analyzer_timeout: Duration::from_secs(5),
            capability_timeout: Duration::from_secs(60),
            dispatch_mode: DispatchMode::Parallel,
            history_retention: 1000,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cpu: 4.0,
            memory: 4096.0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then an explicit or discovered YAML
    /// file, then environment overrides, in increasing precedence.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path.map(Path::to_path_buf).or_else(find_config_file) {
            Some(file) => {
                debug!(path = %file.display(), "loading config file");
                let contents = std::fs::read_to_string(&file)
                    .with_context(|| format!("reading config file {}", file.display()))?;
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("parsing config file {}", file.display()))?
            }
            None => Self::default(),
        };
        config.merge_env();
        config.validate()?;
        Ok(config)
    }

    pub fn pool_capacity(&self) -> ResourceRequirement {
        ResourceRequirement::new(self.pool.cpu, self.pool.memory)
    }

    fn merge_env(&mut self) {
        if let Some(cpu) = env_parse("MILLWRIGHT_POOL_CPU") {
            self.pool.cpu = cpu;
        }
        if let Some(memory) = env_parse("MILLWRIGHT_POOL_MEMORY") {
            self.pool.memory = memory;
        }
        if let Some(attempts) = env_parse("MILLWRIGHT_MAX_ATTEMPTS") {
            self.retry.max_attempts = attempts;
        }
        if let Some(retention) = env_parse("MILLWRIGHT_HISTORY_RETENTION") {
            self.history_retention = retention;
        }
        if let Ok(level) = std::env::var("MILLWRIGHT_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.pool.cpu > 0.0, "pool.cpu must be positive");
        anyhow::ensure!(self.pool.memory > 0.0, "pool.memory must be positive");
        anyhow::ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be at least 1"
        );
        anyhow::ensure!(
            self.history_retention >= 1,
            "history_retention must be at least 1"
        );
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn find_config_file() -> Option<PathBuf> {
    let candidates = ["millwright.yaml", "millwright.yml"];
    for name in candidates {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }
    dirs_config().filter(|p| p.exists())
}

fn dirs_config() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".config").join("millwright").join("config.yaml"))
}
