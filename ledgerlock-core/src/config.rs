//! Configuration management
//!
//! Settings live in `settings.json` inside the ledgerlock directory. Every
//! field is optional; missing fields take the defaults below:
//! ```json
//! {
//!   "transfer": { "maxAttempts": 3, "firstLockTimeoutMs": 1500,
//!                 "secondLockTimeoutMs": 1500, "backoff": "uniform",
//!                 "backoffMinMs": 100, "backoffMaxMs": 500 },
//!   "naive": { "lockTimeoutMs": 1000, "processingDelayMs": 100 },
//!   "scenario": { "workers": 4 }
//! }
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::adapters::{ExponentialJitter, UniformJitter};
use crate::domain::result::Error;
use crate::ports::BackoffPolicy;
use crate::services::{LockTimeouts, NaiveTransferService, TransferPolicy};

/// Settings file name inside the ledgerlock directory
pub const SETTINGS_FILE: &str = "settings.json";

/// Which jitter strategy the transfer service sleeps with between attempts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Uniform,
    Exponential,
}

impl std::fmt::Display for BackoffStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackoffStrategy::Uniform => f.write_str("uniform"),
            BackoffStrategy::Exponential => f.write_str("exponential"),
        }
    }
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    transfer: TransferSettings,
    #[serde(default)]
    naive: NaiveSettings,
    #[serde(default)]
    scenario: ScenarioSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct TransferSettings {
    max_attempts: u32,
    first_lock_timeout_ms: u64,
    second_lock_timeout_ms: u64,
    backoff: BackoffStrategy,
    backoff_min_ms: u64,
    backoff_max_ms: u64,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            first_lock_timeout_ms: 1500,
            second_lock_timeout_ms: 1500,
            backoff: BackoffStrategy::Uniform,
            backoff_min_ms: 100,
            backoff_max_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct NaiveSettings {
    lock_timeout_ms: u64,
    processing_delay_ms: u64,
}

impl Default for NaiveSettings {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1000,
            processing_delay_ms: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ScenarioSettings {
    workers: usize,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self { workers: 4 }
    }
}

/// Ledgerlock configuration (typed view of settings)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub max_attempts: u32,
    pub first_lock_timeout: Duration,
    pub second_lock_timeout: Duration,
    pub backoff: BackoffStrategy,
    pub backoff_min: Duration,
    pub backoff_max: Duration,
    pub naive_lock_timeout: Duration,
    pub processing_delay: Duration,
    pub workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_settings(&SettingsFile::default())
    }
}

impl Config {
    /// Load config from the ledgerlock directory
    ///
    /// A missing or malformed settings file yields defaults. Overrides:
    /// 1. `LEDGERLOCK_MAX_ATTEMPTS` - transfer attempt ceiling
    /// 2. `LEDGERLOCK_WORKERS` - concurrent callers per scenario
    pub fn load(dir: &Path) -> Result<Self> {
        let settings_path = dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {:?}", settings_path))?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(&raw);

        if let Some(attempts) = env_override("LEDGERLOCK_MAX_ATTEMPTS")? {
            config.max_attempts = attempts;
        }
        if let Some(workers) = env_override("LEDGERLOCK_WORKERS")? {
            config.workers = workers;
        }

        config.validate()?;
        Ok(config)
    }

    /// Save config to the ledgerlock directory
    pub fn save(&self, dir: &Path) -> Result<()> {
        let settings_path = dir.join(SETTINGS_FILE);
        let content = serde_json::to_string_pretty(&self.to_settings())?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {:?}", settings_path))?;
        Ok(())
    }

    /// Reject settings the protocol cannot run with
    pub fn validate(&self) -> std::result::Result<(), Error> {
        if self.max_attempts == 0 {
            return Err(Error::config("maxAttempts must be at least 1"));
        }
        if self.workers == 0 {
            return Err(Error::config("workers must be at least 1"));
        }
        if self.first_lock_timeout.is_zero()
            || self.second_lock_timeout.is_zero()
            || self.naive_lock_timeout.is_zero()
        {
            return Err(Error::config("lock timeouts must be non-zero"));
        }
        if self.backoff_min > self.backoff_max {
            return Err(Error::config(format!(
                "backoffMinMs ({}) exceeds backoffMaxMs ({})",
                self.backoff_min.as_millis(),
                self.backoff_max.as_millis()
            )));
        }
        Ok(())
    }

    /// Attempt ceiling and lock timeouts for the ordered protocol
    pub fn transfer_policy(&self) -> TransferPolicy {
        TransferPolicy {
            max_attempts: self.max_attempts,
            timeouts: LockTimeouts {
                first: self.first_lock_timeout,
                subsequent: self.second_lock_timeout,
            },
        }
    }

    /// Backoff policy selected by `backoff`
    ///
    /// For the exponential strategy `backoffMinMs` is the base and
    /// `backoffMaxMs` the cap.
    pub fn backoff_policy(&self) -> Box<dyn BackoffPolicy> {
        match self.backoff {
            BackoffStrategy::Uniform => {
                Box::new(UniformJitter::new(self.backoff_min, self.backoff_max))
            }
            BackoffStrategy::Exponential => {
                Box::new(ExponentialJitter::new(self.backoff_min, self.backoff_max))
            }
        }
    }

    pub fn naive_service(&self) -> NaiveTransferService {
        NaiveTransferService::new(self.naive_lock_timeout, self.processing_delay)
    }

    fn from_settings(raw: &SettingsFile) -> Self {
        Self {
            max_attempts: raw.transfer.max_attempts,
            first_lock_timeout: Duration::from_millis(raw.transfer.first_lock_timeout_ms),
            second_lock_timeout: Duration::from_millis(raw.transfer.second_lock_timeout_ms),
            backoff: raw.transfer.backoff,
            backoff_min: Duration::from_millis(raw.transfer.backoff_min_ms),
            backoff_max: Duration::from_millis(raw.transfer.backoff_max_ms),
            naive_lock_timeout: Duration::from_millis(raw.naive.lock_timeout_ms),
            processing_delay: Duration::from_millis(raw.naive.processing_delay_ms),
            workers: raw.scenario.workers,
        }
    }

    fn to_settings(&self) -> SettingsFile {
        SettingsFile {
            transfer: TransferSettings {
                max_attempts: self.max_attempts,
                first_lock_timeout_ms: self.first_lock_timeout.as_millis() as u64,
                second_lock_timeout_ms: self.second_lock_timeout.as_millis() as u64,
                backoff: self.backoff,
                backoff_min_ms: self.backoff_min.as_millis() as u64,
                backoff_max_ms: self.backoff_max.as_millis() as u64,
            },
            naive: NaiveSettings {
                lock_timeout_ms: self.naive_lock_timeout.as_millis() as u64,
                processing_delay_ms: self.processing_delay.as_millis() as u64,
            },
            scenario: ScenarioSettings {
                workers: self.workers,
            },
        }
    }

    /// JSON view of the effective settings (same shape as settings.json)
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.to_settings()).unwrap_or_default()
    }
}

fn env_override<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::config(format!("{} is not a valid number: {:?}", name, value)).into()),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_match_protocol_calibration() {
        let config = Config::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.first_lock_timeout, Duration::from_millis(1500));
        assert_eq!(config.second_lock_timeout, Duration::from_millis(1500));
        assert_eq!(config.backoff, BackoffStrategy::Uniform);
        assert_eq!(config.naive_lock_timeout, Duration::from_secs(1));
        assert_eq!(config.processing_delay, Duration::from_millis(100));
        assert_eq!(config.workers, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_settings_keep_other_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "transfer": { "maxAttempts": 5, "backoff": "exponential" } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.backoff, BackoffStrategy::Exponential);
        assert_eq!(config.first_lock_timeout, Duration::from_millis(1500));
        assert_eq!(config.workers, 4);
        assert_eq!(config.backoff_policy().name(), "exponential");
    }

    #[test]
    fn test_malformed_settings_fall_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "{ not json").unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{ "transfer": { "backoffMinMs": 900, "backoffMaxMs": 100 } }"#,
        )
        .unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(err.to_string().contains("backoffMinMs"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let config = Config {
            max_attempts: 7,
            processing_delay: Duration::from_millis(20),
            workers: 8,
            ..Config::default()
        };
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded, config);

        let content = std::fs::read_to_string(dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(content.contains("\"maxAttempts\": 7"));
    }

    #[test]
    fn test_transfer_policy_from_config() {
        let config = Config {
            first_lock_timeout: Duration::from_millis(1000),
            ..Config::default()
        };
        let policy = config.transfer_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeouts.first, Duration::from_millis(1000));
        assert_eq!(policy.timeouts.subsequent, Duration::from_millis(1500));
    }
}
