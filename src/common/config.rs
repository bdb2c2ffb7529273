//! Simulation configuration loaded from TOML.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error type for configuration loading failures.
#[derive(Debug)]
pub enum ConfigError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileReadError(msg) => write!(f, "Failed to read config file: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "Failed to parse config file: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Energy model, end-of-life and interval search parameters.
///
/// Every key is optional in the TOML file; missing keys keep the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SimulationConfig {
    /// Rounds added to both clocks by one round of consumption.
    pub harvest_interval: u64,
    /// Battery spent by a sensor to produce its data each round.
    pub harvest_cost: f64,
    /// Battery spent to send one unit of data one hop.
    pub transmit_cost: f64,
    /// Battery spent by a non-sink to receive one unit of data.
    pub receive_cost: f64,
    /// Share of disconnected sensors that ends a cycle.
    pub end_of_life_ratio: f64,
    /// Minimum relative lifetime gain for the interval search to continue.
    pub performance_threshold: f64,
    /// Interval factor applied after an even number of results.
    pub interval_growth: f64,
    /// Interval factor applied after an odd number of results.
    pub interval_shrink: f64,
    /// Harvest intervals added to the global clock between two cycles.
    pub cycle_separator: u64,
    /// Hard cap on the number of cycles of one search.
    pub max_cycles: usize,
    /// Hard cap on the number of rounds of one cycle.
    pub max_rounds_per_cycle: u64,
    /// Refuse to simulate when the dominating set of the starting network
    /// cannot be repaired into one component.
    pub strict_repair: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        SimulationConfig {
            harvest_interval: 1,
            harvest_cost: 0.005,
            transmit_cost: 0.05,
            receive_cost: 0.025,
            end_of_life_ratio: 0.8,
            performance_threshold: 0.005,
            interval_growth: 1.5,
            interval_shrink: 0.5,
            cycle_separator: 100,
            max_cycles: 32,
            max_rounds_per_cycle: 1_000_000,
            strict_repair: false,
        }
    }
}

impl SimulationConfig {
    /// Load and validate configuration from a TOML file.
    ///
    /// # Parameters
    ///
    /// * `path` - Path to the config file
    ///
    /// # Returns
    ///
    /// The validated configuration or the first failure.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("{}", path.display()))
            .map_err(|e| ConfigError::FileReadError(format!("{:#}", e)))?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("harvest-cost", self.harvest_cost),
            ("transmit-cost", self.transmit_cost),
            ("receive-cost", self.receive_cost),
            ("interval-growth", self.interval_growth),
            ("interval-shrink", self.interval_shrink),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::ValidationError(format!("{} must be positive, got {}", name, value)));
            }
        }
        if !(self.end_of_life_ratio > 0.0 && self.end_of_life_ratio <= 1.0) {
            return Err(ConfigError::ValidationError(format!(
                "end-of-life-ratio must be in (0, 1], got {}",
                self.end_of_life_ratio
            )));
        }
        if !self.performance_threshold.is_finite() || self.performance_threshold < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "performance-threshold must not be negative, got {}",
                self.performance_threshold
            )));
        }
        if self.harvest_interval == 0 {
            return Err(ConfigError::ValidationError("harvest-interval must be at least 1".to_string()));
        }
        if self.max_cycles < 2 {
            return Err(ConfigError::ValidationError(format!("max-cycles must be at least 2, got {}", self.max_cycles)));
        }
        if self.max_rounds_per_cycle == 0 {
            return Err(ConfigError::ValidationError("max-rounds-per-cycle must be at least 1".to_string()));
        }
        Ok(())
    }
}
