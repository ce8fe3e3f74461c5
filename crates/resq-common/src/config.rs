//! ---
//! resq_section: "01-core-functionality"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Shared primitives and utilities for the metrics engine."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::logging::LogFormat;

/// Number of hourly timesteps in a (non-leap) simulation year.
pub const ANNUAL_TIMESTEPS: usize = 8760;

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_flow_attribute() -> String {
    "flow".to_owned()
}

fn default_storage_patterns() -> Vec<String> {
    vec!["battery".to_owned(), "storage".to_owned()]
}

fn default_connector_patterns() -> Vec<String> {
    vec!["connector".to_owned()]
}

fn default_curtailment_patterns() -> Vec<String> {
    vec!["curtailment".to_owned(), "abregelung".to_owned()]
}

fn default_discharging_suffix() -> String {
    " (discharging)".to_owned()
}

fn default_charging_suffix() -> String {
    " (charging)".to_owned()
}

fn default_carrier() -> String {
    "electricity".to_owned()
}

fn default_consumption_category() -> String {
    "Verbrauch".to_owned()
}

fn default_generation_category() -> String {
    "Erzeugung".to_owned()
}

fn default_export_directory() -> PathBuf {
    PathBuf::from("target/reports")
}

fn default_write_csv() -> bool {
    true
}

/// Primary configuration object for the metrics engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub autarky: AutarkyConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "RESQ_CONFIG";

    /// Load configuration from disk, respecting the `RESQ_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    pub fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.logging.validate()?;
        self.resolver.validate()?;
        self.autarky.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Filter directive used when neither `RESQ_LOG` nor `RUST_LOG` is set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit a close event with busy/idle timings for every report and scenario span.
    #[serde(default)]
    pub span_timings: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            level: default_log_level(),
            span_timings: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(anyhow!("logging.level must not be empty"));
        }
        Ok(())
    }
}

/// Node-name patterns and relabeling rules applied while resolving edges.
///
/// Patterns follow SQL `LIKE` conventions (`%` and `_` wildcards) and are matched
/// case-insensitively. A pattern without wildcards matches anywhere in the name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_flow_attribute")]
    pub flow_attribute: String,
    #[serde(default = "default_storage_patterns")]
    pub storage_patterns: Vec<String>,
    #[serde(default = "default_connector_patterns")]
    pub connector_patterns: Vec<String>,
    #[serde(default = "default_curtailment_patterns")]
    pub curtailment_patterns: Vec<String>,
    #[serde(default = "default_discharging_suffix")]
    pub discharging_suffix: String,
    #[serde(default = "default_charging_suffix")]
    pub charging_suffix: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            flow_attribute: default_flow_attribute(),
            storage_patterns: default_storage_patterns(),
            connector_patterns: default_connector_patterns(),
            curtailment_patterns: default_curtailment_patterns(),
            discharging_suffix: default_discharging_suffix(),
            charging_suffix: default_charging_suffix(),
        }
    }
}

impl ResolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.flow_attribute.trim().is_empty() {
            return Err(anyhow!("resolver.flow_attribute must not be empty"));
        }
        for (name, patterns) in [
            ("storage_patterns", &self.storage_patterns),
            ("connector_patterns", &self.connector_patterns),
            ("curtailment_patterns", &self.curtailment_patterns),
        ] {
            if patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(anyhow!("resolver.{} contains an empty pattern", name));
            }
        }
        if self.discharging_suffix.is_empty() || self.charging_suffix.is_empty() {
            return Err(anyhow!("resolver storage suffixes must not be empty"));
        }
        if self.discharging_suffix == self.charging_suffix {
            return Err(anyhow!(
                "resolver charging and discharging suffixes must differ"
            ));
        }
        Ok(())
    }
}

/// Denominator used for the instantaneous ("Zeitgleich") autarky metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum ZeitgleichDenominator {
    /// Divide by a fixed number of timesteps per year.
    FixedAnnual { timesteps: usize },
    /// Divide by the number of timesteps observed in the scenario's series.
    ObservedTimesteps,
}

impl Default for ZeitgleichDenominator {
    fn default() -> Self {
        ZeitgleichDenominator::FixedAnnual {
            timesteps: ANNUAL_TIMESTEPS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutarkyConfig {
    #[serde(default = "default_carrier")]
    pub carrier: String,
    #[serde(default = "default_consumption_category")]
    pub consumption_category: String,
    #[serde(default = "default_generation_category")]
    pub generation_category: String,
    #[serde(default)]
    pub denominator: ZeitgleichDenominator,
}

impl Default for AutarkyConfig {
    fn default() -> Self {
        Self {
            carrier: default_carrier(),
            consumption_category: default_consumption_category(),
            generation_category: default_generation_category(),
            denominator: ZeitgleichDenominator::default(),
        }
    }
}

impl AutarkyConfig {
    pub fn validate(&self) -> Result<()> {
        if let ZeitgleichDenominator::FixedAnnual { timesteps: 0 } = self.denominator {
            return Err(anyhow!(
                "autarky.denominator timesteps must be greater than zero"
            ));
        }
        if self.consumption_category == self.generation_category {
            return Err(anyhow!(
                "autarky consumption and generation categories must differ"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default = "default_export_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_write_csv")]
    pub write_csv: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            directory: default_export_directory(),
            write_csv: default_write_csv(),
        }
    }
}
