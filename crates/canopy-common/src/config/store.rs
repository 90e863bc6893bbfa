//! Store configuration structures.
//!
//! These structures define all configurable aspects of the commit
//! coordinator. They load from and save to TOML; durations use humantime
//! strings (`"30s"`, `"250ms"`), and an optional timeout is disabled with
//! `"off"`.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_ABORT_TIMEOUT_MS, DEFAULT_MAX_ACTIVE_TRANSACTIONS, DEFAULT_PHASE_TIMEOUT_MS,
};
use crate::error::{CanopyError, CanopyResult};

/// Top-level store configuration.
///
/// # Example
///
/// ```rust
/// use canopy_common::config::StoreConfig;
///
/// let config = StoreConfig::default();
/// assert!(config.commit.short_circuit_votes);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Commit coordinator configuration.
    #[serde(default)]
    pub commit: CommitConfig,
}

/// Commit coordinator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitConfig {
    /// Bound on each participant request during canCommit, preCommit and
    /// commit. `None` (`"off"`) waits for the transport to resolve on its
    /// own.
    /// Default: 30s
    #[serde(with = "optional_timeout")]
    pub phase_timeout: Option<Duration>,

    /// Bound on each participant abort request. `None` (`"off"`) waits
    /// for the transport.
    /// Default: 5s
    #[serde(with = "optional_timeout")]
    pub abort_timeout: Option<Duration>,

    /// Cancel the remaining vote requests of a phase as soon as one
    /// participant votes no or fails.
    /// Default: true
    pub short_circuit_votes: bool,

    /// Maximum number of transactions the coordinator tracks at once.
    /// Zero disables the limit.
    /// Default: 1024
    pub max_active_transactions: usize,
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            phase_timeout: Some(Duration::from_millis(DEFAULT_PHASE_TIMEOUT_MS)),
            abort_timeout: Some(Duration::from_millis(DEFAULT_ABORT_TIMEOUT_MS)),
            short_circuit_votes: true,
            max_active_transactions: DEFAULT_MAX_ACTIVE_TRANSACTIONS,
        }
    }
}

impl CommitConfig {
    /// Creates a configuration for tests: short timeouts, no admission
    /// limit.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            phase_timeout: Some(Duration::from_millis(500)),
            abort_timeout: Some(Duration::from_millis(500)),
            short_circuit_votes: true,
            max_active_transactions: 0,
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CanopyResult<()> {
        if self.phase_timeout == Some(Duration::ZERO) {
            return Err(CanopyError::invalid_config(
                "commit.phase_timeout must be greater than zero",
            ));
        }
        if self.abort_timeout == Some(Duration::ZERO) {
            return Err(CanopyError::invalid_config(
                "commit.abort_timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Serde adapter writing `Some` as a humantime string and `None` as
/// `"off"`, so a disabled timeout survives a save and load.
mod optional_timeout {
    use std::time::Duration;

    use humantime_serde::re::humantime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    const OFF: &str = "off";

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => {
                serializer.serialize_str(&humantime::format_duration(*duration).to_string())
            }
            None => serializer.serialize_str(OFF),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.trim() == OFF {
            return Ok(None);
        }
        humantime::parse_duration(&text)
            .map(Some)
            .map_err(de::Error::custom)
    }
}

impl StoreConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads and validates configuration from a TOML file.
    pub fn from_file(path: &Path) -> CanopyResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from a TOML string.
    pub fn from_toml(content: &str) -> CanopyResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> CanopyResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to a TOML string.
    pub fn to_toml(&self) -> CanopyResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validates every section.
    pub fn validate(&self) -> CanopyResult<()> {
        self.commit.validate()
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::new()
    }
}

/// Builder for store configuration.
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    config: StoreConfig,
}

impl StoreConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the per-request phase timeout.
    #[must_use]
    pub fn phase_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.commit.phase_timeout = timeout;
        self
    }

    /// Sets the per-request abort timeout.
    #[must_use]
    pub fn abort_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.commit.abort_timeout = timeout;
        self
    }

    /// Enables or disables vote short-circuiting.
    #[must_use]
    pub fn short_circuit_votes(mut self, enabled: bool) -> Self {
        self.config.commit.short_circuit_votes = enabled;
        self
    }

    /// Sets the admission limit.
    #[must_use]
    pub fn max_active_transactions(mut self, max: usize) -> Self {
        self.config.commit.max_active_transactions = max;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> StoreConfig {
        self.config
    }
}
