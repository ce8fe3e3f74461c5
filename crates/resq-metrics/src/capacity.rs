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
use tracing::debug;

use crate::{
    errors::Result,
    model::{Dataset, ScenarioId},
    resolver::Resolver,
};

pub const CAPACITY_ATTRIBUTE: &str = "capacity";
pub const TOTAL_ATTRIBUTE: &str = "total";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub label: String,
    pub capacity: f64,
}

#[derive(Debug, Default, Clone, Copy)]
struct CapacityGroup {
    total: Option<f64>,
    capacity: Option<f64>,
}

impl CapacityGroup {
    fn push(slot: &mut Option<f64>, value: f64) {
        *slot = Some(slot.map_or(value, |current| current.max(value)));
    }

    /// `total` wins over `capacity` whenever one is present.
    fn resolved(&self) -> Option<f64> {
        self.total.or(self.capacity)
    }
}

pub fn resolve_capacities(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    scenarios: Option<&[ScenarioId]>,
) -> Result<Vec<CapacityRow>> {
    let selection = dataset.select_scenarios(scenarios)?;
    let mut rows = Vec::new();
    for (scenario_id, name) in selection {
        rows.extend(capacities_for_scenario(dataset, resolver, scenario_id, name));
    }
    Ok(rows)
}

/// One capacity per resolved non-bus label of a scenario, in first-seen order.
pub fn capacities_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    scenario_id: ScenarioId,
    scenario_name: &str,
) -> Vec<CapacityRow> {
    let mut groups: IndexMap<String, CapacityGroup> = IndexMap::new();

    for scalar in dataset.scalars_for(scenario_id) {
        let is_total = scalar.attribute == TOTAL_ATTRIBUTE;
        if !is_total && scalar.attribute != CAPACITY_ATTRIBUTE {
            continue;
        }
        let to = scalar.to_node.as_deref();
        if resolver.touches_connector(&scalar.from_node, to) {
            continue;
        }
        let (label, is_bus) = resolver.resolve_scalar_label(&scalar.from_node, to);
        let Some(label) = label else {
            debug!(
                scenario_id,
                from_node = %scalar.from_node,
                to_node = ?scalar.to_node,
                "scalar without label skipped"
            );
            continue;
        };
        if is_bus {
            continue;
        }

        let group = groups.entry(label).or_default();
        if is_total {
            CapacityGroup::push(&mut group.total, scalar.value);
        } else {
            CapacityGroup::push(&mut group.capacity, scalar.value);
        }
    }

    groups
        .into_iter()
        .filter_map(|(label, group)| {
            group.resolved().map(|capacity| CapacityRow {
                scenario_id,
                scenario_name: scenario_name.to_owned(),
                label,
                capacity,
            })
        })
        .collect()
}
