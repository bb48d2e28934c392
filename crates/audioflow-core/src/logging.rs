//! Tracing initialization for hosts embedding the analysis core.
//!
//! The core itself only emits `tracing` events; hosts that do not install
//! their own subscriber can call [`init`] to get a sensible default.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG` when set
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info,audioflow_core=debug".to_string(),
        }
    }
}

/// Install a formatting subscriber with the configured filter.
///
/// Safe to call more than once; later calls are no-ops if a global
/// subscriber is already installed.
pub fn init(config: &LogConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
