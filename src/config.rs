//! Configuration loading.
//!
//! Loaded from ~/.config/uploadr/uploadr.yml or .uploadr.yml

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::{RetryPolicy, RetryStrategy};
use crate::scheduler::SchedulerConfig;
use crate::task::DEFAULT_MAX_ATTEMPTS;

/// Top-level configuration for uploadr.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UploadrConfig {
    /// Scheduler and worker pool settings.
    pub scheduler: SchedulerSection,

    /// Retry and backoff defaults.
    pub retry: RetrySection,

    /// State persistence settings.
    pub storage: StorageSection,
}

impl UploadrConfig {
    /// Load configuration with fallback chain.
    ///
    /// Search order:
    /// 1. Explicit path if provided
    /// 2. .uploadr.yml in current directory
    /// 3. ~/.config/uploadr/uploadr.yml
    /// 4. Defaults
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // Explicit path takes precedence
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project config
        let project_config = PathBuf::from(".uploadr.yml");
        if project_config.exists() {
            match Self::load_from_file(&project_config) {
                Ok(config) => {
                    tracing::info!("Loaded config from .uploadr.yml");
                    return Ok(config);
                }
                Err(e) => {
                    tracing::warn!("Failed to load .uploadr.yml: {}", e);
                }
            }
        }

        // Try user config
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("uploadr").join("uploadr.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {}", user_config.display());
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // Use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            eyre::bail!("retry.max-attempts must be > 0");
        }
        if self.retry.base_delay_secs <= 0.0 {
            eyre::bail!("retry.base-delay-secs must be > 0");
        }
        if self.retry.max_delay_secs < self.retry.base_delay_secs {
            eyre::bail!("retry.max-delay-secs must be >= retry.base-delay-secs");
        }
        if self.retry.backoff_factor < 1.0 {
            eyre::bail!("retry.backoff-factor must be >= 1.0");
        }
        if self.scheduler.poll_interval_secs <= 0.0 {
            eyre::bail!("scheduler.poll-interval-secs must be > 0");
        }
        if self.scheduler.promotion_interval_secs <= 0.0 {
            eyre::bail!("scheduler.promotion-interval-secs must be > 0");
        }
        Ok(())
    }
}

/// Scheduler and worker pool settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerSection {
    /// Instance name used in log fields.
    pub name: String,

    /// Worker pool size.
    pub workers: usize,

    /// Idle worker poll interval in seconds.
    pub poll_interval_secs: f64,

    /// Promotion sweep interval in seconds.
    pub promotion_interval_secs: f64,

    /// Per-worker join timeout on stop, in seconds.
    pub stop_timeout_secs: f64,

    /// Optional per-attempt executor timeout in seconds.
    pub attempt_timeout_secs: Option<f64>,
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            name: "uploadr".to_string(),
            workers: 2,
            poll_interval_secs: 1.0,
            promotion_interval_secs: 30.0,
            stop_timeout_secs: 5.0,
            attempt_timeout_secs: None,
        }
    }
}

impl SchedulerSection {
    /// Convert to the scheduler's runtime configuration.
    pub fn to_scheduler_config(&self) -> SchedulerConfig {
        let mut config = SchedulerConfig::default()
            .with_name(self.name.clone())
            .with_workers(self.workers)
            .with_poll_interval(Duration::from_secs_f64(self.poll_interval_secs))
            .with_promotion_interval(Duration::from_secs_f64(self.promotion_interval_secs))
            .with_stop_timeout(Duration::from_secs_f64(self.stop_timeout_secs));
        if let Some(secs) = self.attempt_timeout_secs {
            config = config.with_attempt_timeout(Duration::from_secs_f64(secs));
        }
        config
    }
}

/// Retry and backoff defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
    pub strategy: RetryStrategy,
    pub backoff_factor: f64,
    pub jitter: bool,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_secs: 60.0,
            max_delay_secs: 300.0,
            strategy: RetryStrategy::Exponential,
            backoff_factor: 2.0,
            jitter: false,
        }
    }
}

impl RetrySection {
    /// Convert to the runtime retry policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_base_delay(Duration::from_secs_f64(self.base_delay_secs))
            .with_max_delay(Duration::from_secs_f64(self.max_delay_secs))
            .with_strategy(self.strategy)
            .with_backoff_factor(self.backoff_factor)
            .with_jitter(self.jitter)
    }
}

/// State persistence settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageSection {
    /// Override for the state directory. When absent, state lives under
    /// ~/.uploadr/<instance-hash>/.
    pub state_dir: Option<PathBuf>,
}
