//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use serde::Serialize;
use tracing::warn;

use crate::{
    errors::{MetricsError, Result},
    model::{Dataset, ScenarioId, Sequence},
};

/// Relative tolerance when comparing `total_energy` with the series sum.
pub const TOTAL_TOLERANCE: f64 = 1e-6;

/// Common series length of the given sequences.
///
/// Returns `Ok(None)` for an empty input. Every sequence must carry the same
/// number of samples, otherwise the first deviating row is reported.
pub fn expected_series_length<'a, I>(scenario_id: ScenarioId, sequences: I) -> Result<Option<usize>>
where
    I: IntoIterator<Item = &'a Sequence>,
{
    let mut expected = None;
    for sequence in sequences {
        let found = sequence.timeseries.len();
        match expected {
            None => expected = Some(found),
            Some(len) if len != found => {
                return Err(MetricsError::InconsistentSeriesLength {
                    scenario_id,
                    from_node: sequence.from_node.clone(),
                    to_node: sequence.to_node.clone(),
                    expected: len,
                    found,
                });
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

/// Expand a stored series into `(timestep, value)` pairs, 1-indexed.
pub fn expand(
    scenario_id: ScenarioId,
    sequence: &Sequence,
    expected: usize,
) -> Result<impl Iterator<Item = (usize, f64)> + '_> {
    if sequence.timeseries.len() != expected {
        return Err(MetricsError::InconsistentSeriesLength {
            scenario_id,
            from_node: sequence.from_node.clone(),
            to_node: sequence.to_node.clone(),
            expected,
            found: sequence.timeseries.len(),
        });
    }
    Ok(sequence
        .timeseries
        .iter()
        .copied()
        .enumerate()
        .map(|(idx, value)| (idx + 1, value)))
}

/// A flow whose stored total disagrees with the sum of its samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalMismatch {
    pub scenario_id: ScenarioId,
    pub from_node: String,
    pub to_node: Option<String>,
    pub total_energy: f64,
    pub series_total: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatasetDiagnostics {
    pub scenarios: usize,
    pub sequences: usize,
    pub scalars: usize,
    pub total_mismatches: Vec<TotalMismatch>,
}

impl DatasetDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.total_mismatches.is_empty()
    }
}

/// Check the structural integrity of a dataset.
///
/// Series length deviations inside a scenario are fatal; totals that do not
/// match their series are collected and logged but do not fail validation.
pub fn validate_dataset(dataset: &Dataset) -> Result<DatasetDiagnostics> {
    let mut diagnostics = DatasetDiagnostics {
        scenarios: dataset.scenarios.len(),
        sequences: dataset.sequences.len(),
        scalars: dataset.scalars.len(),
        total_mismatches: Vec::new(),
    };

    for scenario_id in dataset.scenario_ids() {
        expected_series_length(scenario_id, dataset.sequences_for(scenario_id))?;
    }

    for sequence in &dataset.sequences {
        if sequence.timeseries.is_empty() || sequence.is_total_consistent(TOTAL_TOLERANCE) {
            continue;
        }
        let series_total = sequence.series_total();
        warn!(
            scenario_id = sequence.scenario_id,
            from_node = %sequence.from_node,
            to_node = ?sequence.to_node,
            total_energy = sequence.total_energy,
            series_total,
            "total energy does not match series sum"
        );
        diagnostics.total_mismatches.push(TotalMismatch {
            scenario_id: sequence.scenario_id,
            from_node: sequence.from_node.clone(),
            to_node: sequence.to_node.clone(),
            total_energy: sequence.total_energy,
            series_total,
        });
    }

    Ok(diagnostics)
}
