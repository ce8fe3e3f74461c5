//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use thiserror::Error;

use crate::model::ScenarioId;

pub type Result<T> = std::result::Result<T, MetricsError>;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error(
        "scenario {scenario_id}: series {from_node} -> {to_node:?} has {found} samples, expected {expected}"
    )]
    InconsistentSeriesLength {
        scenario_id: ScenarioId,
        from_node: String,
        to_node: Option<String>,
        expected: usize,
        found: usize,
    },
    #[error(
        "scenario {scenario_id}: fixed autarky denominator {denominator} is smaller than the series length {series_length}"
    )]
    DenominatorTooSmall {
        scenario_id: ScenarioId,
        denominator: usize,
        series_length: usize,
    },
    #[error("cluster '{cluster}' for component '{component}' not found in dataset")]
    UnknownCluster { component: String, cluster: String },
    #[error("scenario {0} not found in dataset")]
    UnknownScenario(ScenarioId),
    #[error("invalid mapping key '{0}'; expected 'from_node|to_node'")]
    InvalidMappingKey(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    SerializationFailed(#[from] serde_json::Error),
    #[error("yaml serialization error: {0}")]
    YamlSerializationFailed(#[from] serde_yaml::Error),
    #[error("csv export error: {0}")]
    CsvExportFailed(#[from] csv::Error),
}
