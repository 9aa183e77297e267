//! Game configuration loaded from YAML.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Tunables of a single game. Every field falls back to its default when
/// missing from the document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Year shown on the first turn.
    pub start_year: u32,
    /// Years added per turn.
    pub step_size: u32,
    /// Last year of the timeline; the year never exceeds it.
    pub max_year: u32,
    /// Interest charged once on every loan (0.2 = 20%).
    pub interest_rate: Decimal,
    /// Energy value of a full bar, used for the demand marker position.
    pub max_energy_bar_value: u64,
    /// How long an advance waits for the presentation layer before it is
    /// completed anyway.
    pub advance_timeout_ms: u64,
    /// Seed for the vote RNG.
    pub rng_seed: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            start_year: 2022,
            step_size: 3,
            max_year: 2050,
            interest_rate: Decimal::new(2, 1),
            max_energy_bar_value: 300,
            advance_timeout_ms: 5_000,
            rng_seed: 42,
        }
    }
}

impl GameConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step_size == 0 {
            return Err(ConfigError::Invalid("step_size must be > 0".into()));
        }
        if self.max_year < self.start_year {
            return Err(ConfigError::Invalid(format!(
                "max_year {} is before start_year {}",
                self.max_year, self.start_year
            )));
        }
        if self.interest_rate <= Decimal::ZERO {
            return Err(ConfigError::Invalid("interest_rate must be > 0".into()));
        }
        if self.max_energy_bar_value == 0 {
            return Err(ConfigError::Invalid("max_energy_bar_value must be > 0".into()));
        }
        Ok(())
    }

    /// Number of advances until the timeline reaches `max_year`.
    pub fn total_turns(&self) -> u32 {
        let span = self.max_year.saturating_sub(self.start_year);
        span.div_ceil(self.step_size.max(1))
    }
}
