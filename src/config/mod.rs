//! Simulation and logging configuration carried by a scenario

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Knobs of the world clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Upper bound on simulated years a single tick may skip over.
    #[serde(default = "default_max_years_to_skip")]
    pub max_years_to_skip: i64,
}

fn default_max_years_to_skip() -> i64 {
    (i32::MAX / 100) as i64
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            max_years_to_skip: default_max_years_to_skip(),
        }
    }
}

impl SimulationConfig {
    pub fn with_max_years_to_skip(mut self, years: i64) -> Self {
        self.max_years_to_skip = years.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit a tick summary every N ticks; 0 disables.
    #[serde(default = "default_report_interval")]
    pub report_interval_ticks: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_report_interval() -> u64 {
    100
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            report_interval_ticks: default_report_interval(),
        }
    }
}

impl LoggingConfig {
    /// `RUST_LOG` wins when set; otherwise the configured level scoped to this crate.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("holocene={}", self.level)))
    }

    /// Installs the global fmt subscriber. Later calls are ignored.
    pub fn init_tracing(&self) {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_target(false)
            .try_init();
    }
}
