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

/// Filter and grouping switches for the flow views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowQuery {
    /// Restrict the view to these scenarios; `None` selects all of them.
    #[serde(default)]
    pub scenarios: Option<Vec<ScenarioId>>,
    #[serde(default)]
    pub exclude_storage: bool,
    #[serde(default)]
    pub exclude_connectors: bool,
    #[serde(default)]
    pub collapse_to_label: bool,
    #[serde(default)]
    pub project_category: bool,
}

impl FlowQuery {
    pub fn detailed() -> Self {
        Self {
            exclude_connectors: true,
            project_category: true,
            ..Self::default()
        }
    }

    pub fn by_label() -> Self {
        Self {
            exclude_connectors: true,
            collapse_to_label: true,
            ..Self::default()
        }
    }

    pub fn with_scenarios(mut self, scenarios: Vec<ScenarioId>) -> Self {
        self.scenarios = Some(scenarios);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub from_node: String,
    pub to_node: Option<String>,
    pub label: Option<String>,
    pub category: Option<String>,
    pub carrier: Option<String>,
    pub total_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelFlowRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub label: Option<String>,
    pub category: Option<String>,
    pub carrier: Option<String>,
    pub total_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", content = "rows", rename_all = "snake_case")]
pub enum FlowReport {
    Detailed(Vec<FlowRow>),
    Collapsed(Vec<LabelFlowRow>),
}

impl FlowReport {
    pub fn len(&self) -> usize {
        match self {
            FlowReport::Detailed(rows) => rows.len(),
            FlowReport::Collapsed(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Run the flow view selected by `query.collapse_to_label`.
pub fn aggregate_flows(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    query: &FlowQuery,
) -> Result<FlowReport> {
    if query.collapse_to_label {
        collapsed_flows(dataset, resolver, query).map(FlowReport::Collapsed)
    } else {
        detailed_flows(dataset, resolver, query).map(FlowReport::Detailed)
    }
}

pub fn detailed_flows(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    query: &FlowQuery,
) -> Result<Vec<FlowRow>> {
    let selection = dataset.select_scenarios(query.scenarios.as_deref())?;
    let mut rows = Vec::new();
    for (scenario_id, name) in selection {
        rows.extend(detailed_flows_for_scenario(
            dataset,
            resolver,
            scenario_id,
            name,
            query,
        ));
    }
    Ok(rows)
}

pub fn collapsed_flows(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    query: &FlowQuery,
) -> Result<Vec<LabelFlowRow>> {
    let selection = dataset.select_scenarios(query.scenarios.as_deref())?;
    let mut rows = Vec::new();
    for (scenario_id, name) in selection {
        rows.extend(collapsed_flows_for_scenario(
            dataset,
            resolver,
            scenario_id,
            name,
            query,
        ));
    }
    Ok(rows)
}

/// Detailed flow rows of one scenario, ordered by label.
///
/// The sort is stable, so edges sharing a label keep their input order.
pub fn detailed_flows_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    scenario_id: ScenarioId,
    scenario_name: &str,
    query: &FlowQuery,
) -> Vec<FlowRow> {
    let mut rows: Vec<FlowRow> = dataset
        .sequences_for(scenario_id)
        .filter(|seq| resolver.is_flow(&seq.attribute))
        .filter(|seq| keep_edge(resolver, query, &seq.from_node, seq.to_node.as_deref()))
        .map(|seq| {
            let edge = resolver.resolve(&seq.from_node, seq.to_node.as_deref());
            let (category, carrier) = if query.project_category {
                (edge.category, edge.carrier)
            } else {
                (None, None)
            };
            FlowRow {
                scenario_id,
                scenario_name: scenario_name.to_owned(),
                from_node: seq.from_node.clone(),
                to_node: seq.to_node.clone(),
                label: edge.label,
                category,
                carrier,
                total_energy: seq.total_energy,
            }
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));
    debug!(scenario_id, rows = rows.len(), "detailed flows derived");
    rows
}

/// Flow energy of one scenario summed per resolved label (and category and
/// carrier when projected).
pub fn collapsed_flows_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    scenario_id: ScenarioId,
    scenario_name: &str,
    query: &FlowQuery,
) -> Vec<LabelFlowRow> {
    let mut groups: IndexMap<(Option<String>, Option<String>, Option<String>), f64> =
        IndexMap::new();
    for seq in dataset
        .sequences_for(scenario_id)
        .filter(|seq| resolver.is_flow(&seq.attribute))
        .filter(|seq| keep_edge(resolver, query, &seq.from_node, seq.to_node.as_deref()))
    {
        let edge = resolver.resolve(&seq.from_node, seq.to_node.as_deref());
        let key = if query.project_category {
            (edge.label, edge.category, edge.carrier)
        } else {
            (edge.label, None, None)
        };
        *groups.entry(key).or_insert(0.0) += seq.total_energy;
    }

    let mut rows: Vec<LabelFlowRow> = groups
        .into_iter()
        .map(|((label, category, carrier), total_energy)| LabelFlowRow {
            scenario_id,
            scenario_name: scenario_name.to_owned(),
            label,
            category,
            carrier,
            total_energy,
        })
        .collect();
    rows.sort_by(|a, b| a.label.cmp(&b.label));
    debug!(scenario_id, rows = rows.len(), "label flows derived");
    rows
}

fn keep_edge(resolver: &Resolver<'_>, query: &FlowQuery, from: &str, to: Option<&str>) -> bool {
    if query.exclude_storage && resolver.touches_storage(from, to) {
        return false;
    }
    if query.exclude_connectors && resolver.touches_connector(from, to) {
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::MetricsError;
    use crate::model::{Category, Label, Scenario, Sequence};
    use resq_common::ResolverConfig;

    fn scenario(id: ScenarioId, name: &str) -> Scenario {
        Scenario {
            id,
            name: name.into(),
            period: None,
            weather: None,
            climate: None,
            sensitivity: None,
        }
    }

    fn label(component: &str, text: &str, is_bus: bool) -> Label {
        Label {
            component: component.into(),
            from_node: None,
            to_node: None,
            label: text.into(),
            is_bus,
        }
    }

    fn flow(scenario_id: ScenarioId, from: &str, to: &str, total: f64) -> Sequence {
        Sequence {
            scenario_id,
            is_exogenous: false,
            from_node: from.into(),
            to_node: Some(to.into()),
            attribute: "flow".into(),
            total_energy: total,
            timeseries: vec![total],
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            scenarios: vec![scenario(2, "S2"), scenario(1, "S1")],
            labels: vec![
                label("bus_elec", "Electricity", true),
                label("pv_roof", "PV", false),
                label("pv_field", "PV", false),
                label("battery", "Battery", false),
                label("heat-connector", "Connector", false),
            ],
            categories: vec![Category {
                from_node: "pv_roof".into(),
                to_node: Some("bus_elec".into()),
                category: "Erzeugung".into(),
                carrier: "electricity".into(),
                is_renewable: true,
            }],
            sequences: vec![
                flow(1, "pv_roof", "bus_elec", 10.0),
                flow(1, "pv_field", "bus_elec", 5.0),
                flow(1, "battery", "bus_elec", 3.0),
                flow(1, "heat-connector", "bus_elec", 7.0),
                flow(2, "pv_roof", "bus_elec", 4.0),
                Sequence {
                    attribute: "invest".into(),
                    ..flow(1, "pv_roof", "bus_elec", 99.0)
                },
            ],
            ..Dataset::default()
        }
    }

    #[test]
    fn detailed_rows_are_ordered_by_scenario_then_label() {
        let dataset = dataset();
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let rows = detailed_flows(&dataset, &resolver, &FlowQuery::detailed()).unwrap();
        let keys: Vec<_> = rows
            .iter()
            .map(|r| (r.scenario_id, r.label.as_deref().unwrap_or(""), r.from_node.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, "Battery (discharging)", "battery"),
                (1, "PV", "pv_roof"),
                (1, "PV", "pv_field"),
                (2, "PV", "pv_roof"),
            ]
        );
        assert_eq!(rows[1].category.as_deref(), Some("Erzeugung"));
        assert_eq!(rows[2].category, None);
    }

    #[test]
    fn storage_can_be_excluded() {
        let dataset = dataset();
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let query = FlowQuery {
            exclude_storage: true,
            ..FlowQuery::detailed()
        };
        let rows = detailed_flows(&dataset, &resolver, &query).unwrap();
        assert!(rows.iter().all(|r| r.from_node != "battery"));
    }

    #[test]
    fn connector_links_are_kept_when_not_excluded() {
        let dataset = dataset();
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let default_rows = detailed_flows(&dataset, &resolver, &FlowQuery::detailed()).unwrap();
        assert!(default_rows.iter().all(|r| r.from_node != "heat-connector"));

        let query = FlowQuery {
            exclude_connectors: false,
            ..FlowQuery::detailed()
        };
        let rows = detailed_flows(&dataset, &resolver, &query).unwrap();
        let connector: Vec<_> = rows
            .iter()
            .filter(|r| r.from_node == "heat-connector")
            .map(|r| (r.scenario_id, r.label.as_deref(), r.total_energy))
            .collect();
        assert_eq!(connector, vec![(1, Some("Connector"), 7.0)]);
        assert_eq!(rows.len(), default_rows.len() + 1);
    }

    #[test]
    fn collapsed_view_sums_edges_sharing_a_label() {
        let dataset = dataset();
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let query = FlowQuery::by_label().with_scenarios(vec![1]);
        let rows = collapsed_flows(&dataset, &resolver, &query).unwrap();
        let pv = rows
            .iter()
            .find(|r| r.label.as_deref() == Some("PV"))
            .unwrap();
        assert_eq!(pv.total_energy, 15.0);
        assert!(rows.iter().all(|r| r.scenario_id == 1 && r.category.is_none()));
    }

    #[test]
    fn projected_category_splits_label_groups() {
        let dataset = dataset();
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let query = FlowQuery {
            project_category: true,
            ..FlowQuery::by_label().with_scenarios(vec![1])
        };
        let report = aggregate_flows(&dataset, &resolver, &query).unwrap();
        let FlowReport::Collapsed(rows) = report else {
            panic!("expected collapsed rows");
        };
        let pv: Vec<_> = rows
            .iter()
            .filter(|r| r.label.as_deref() == Some("PV"))
            .map(|r| (r.category.clone(), r.total_energy))
            .collect();
        assert_eq!(pv, vec![(Some("Erzeugung".to_owned()), 10.0), (None, 5.0)]);
    }

    #[test]
    fn unknown_scenario_filter_is_an_error() {
        let dataset = dataset();
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let query = FlowQuery::detailed().with_scenarios(vec![42]);
        let err = detailed_flows(&dataset, &resolver, &query).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownScenario(42)));
    }
}
