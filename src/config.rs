//! Configuration
//!
//! Layered configuration loading, in the manner of the teacher lineage's
//! own `Config` module: defaults, merged with an optional TOML file,
//! merged with `TIPD_`-prefixed environment variables.
//!
//! ```toml
//! # tipd.toml
//! [logging]
//! level = "info"
//!
//! [evaluator]
//! inclusion_exclusion_ceiling = 20
//! ```
//!
//! Environment overrides:
//! ```bash
//! TIPD_LOGGING__LEVEL=debug
//! TIPD_EVALUATOR__INCLUSION_EXCLUSION_CEILING=12
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub evaluator: EvaluatorConfig,
}

/// Structured-logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Tracing filter directive (e.g. "info", "tipd=trace").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of the human-readable formatter.
    #[serde(default)]
    pub json: bool,
}

/// Evaluator resource and tracing settings. The ceiling is the one place
/// configuration actually changes evaluator behavior (R6's guard); the
/// `trace` flag only controls whether rule firings are additionally
/// logged at `trace` level by default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorConfig {
    /// Maximum number of disjuncts R6 will expand via inclusion-exclusion
    /// before reporting `Intractable` instead.
    #[serde(default = "default_ie_ceiling")]
    pub inclusion_exclusion_ceiling: usize,

    /// Whether rule firings are traced by default.
    #[serde(default)]
    pub trace: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_ie_ceiling() -> usize {
    20
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            inclusion_exclusion_ceiling: default_ie_ceiling(),
            trace: false,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            logging: LoggingConfig::default(),
            evaluator: EvaluatorConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from default locations: `tipd.toml` merged
    /// with `TIPD_`-prefixed environment variables, falling back to
    /// built-in defaults for anything neither source provides.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::from(Self::default())
            .merge(Toml::file("tipd.toml"))
            .merge(Env::prefixed("TIPD_").split("__"))
            .extract()
    }

    /// Loads configuration from a specific TOML file plus environment
    /// overrides.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::from(Self::default())
            .merge(Toml::file(path))
            .merge(Env::prefixed("TIPD_").split("__"))
            .extract()
    }
}
