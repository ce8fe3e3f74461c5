//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    errors::Result,
    model::{Dataset, ScenarioId, Sequence},
    resolver::Resolver,
    series,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeseriesQuery {
    #[serde(default)]
    pub scenarios: Option<Vec<ScenarioId>>,
    /// Only project series that were fed into the simulation.
    #[serde(default)]
    pub exogenous_only: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub carrier: Option<String>,
    pub timestep: usize,
    pub value: f64,
}

type GroupKey = (Option<String>, Option<String>, Option<String>);

pub fn project_timeseries(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    query: &TimeseriesQuery,
) -> Result<Vec<TimeseriesRow>> {
    let selection = dataset.select_scenarios(query.scenarios.as_deref())?;
    let mut rows = Vec::new();
    for (scenario_id, name) in selection {
        rows.extend(timeseries_for_scenario(
            dataset,
            resolver,
            query,
            scenario_id,
            name,
        )?);
    }
    Ok(rows)
}

/// Long-form series of one scenario, summed per label, category, carrier and
/// timestep, ordered by label then timestep.
pub fn timeseries_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    query: &TimeseriesQuery,
    scenario_id: ScenarioId,
    scenario_name: &str,
) -> Result<Vec<TimeseriesRow>> {
    let flows: Vec<&Sequence> = dataset
        .sequences_for(scenario_id)
        .filter(|seq| resolver.is_flow(&seq.attribute))
        .collect();
    let Some(length) = series::expected_series_length(scenario_id, flows.iter().copied())? else {
        return Ok(Vec::new());
    };

    let mut groups: IndexMap<GroupKey, Vec<f64>> = IndexMap::new();
    for seq in flows
        .into_iter()
        .filter(|seq| !query.exogenous_only || seq.is_exogenous)
    {
        let edge = resolver.resolve(&seq.from_node, seq.to_node.as_deref());
        let sums = groups
            .entry((edge.label, edge.category, edge.carrier))
            .or_insert_with(|| vec![0.0; length]);
        for (timestep, value) in series::expand(scenario_id, seq, length)? {
            sums[timestep - 1] += value;
        }
    }
    groups.sort_by(|a, _, b, _| a.0.cmp(&b.0));

    let mut rows = Vec::with_capacity(groups.len() * length);
    for ((label, category, carrier), sums) in groups {
        rows.extend(sums.into_iter().enumerate().map(|(idx, value)| TimeseriesRow {
            scenario_id,
            scenario_name: scenario_name.to_owned(),
            label: label.clone(),
            category: category.clone(),
            carrier: carrier.clone(),
            timestep: idx + 1,
            value,
        }));
    }
    Ok(rows)
}
