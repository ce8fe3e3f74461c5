//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::{MetricsError, Result};

pub type ScenarioId = i64;
pub type ClusterId = i64;

/// Raw result tables of one or more simulation runs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub scenarios: Vec<Scenario>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub sequences: Vec<Sequence>,
    #[serde(default)]
    pub scalars: Vec<Scalar>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub cluster_components: Vec<ClusterComponent>,
}

impl Dataset {
    pub fn find_scenario(&self, id: ScenarioId) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Scenario ids in ascending order.
    pub fn scenario_ids(&self) -> Vec<ScenarioId> {
        let mut ids: Vec<ScenarioId> = self.scenarios.iter().map(|s| s.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Resolve a scenario selection to an ordered id → name map.
    ///
    /// `None` selects every scenario. Requesting an id that is not part of the
    /// dataset is an error.
    pub fn select_scenarios(&self, ids: Option<&[ScenarioId]>) -> Result<BTreeMap<ScenarioId, &str>> {
        match ids {
            None => Ok(self
                .scenarios
                .iter()
                .map(|s| (s.id, s.name.as_str()))
                .collect()),
            Some(ids) => ids
                .iter()
                .map(|id| {
                    self.find_scenario(*id)
                        .map(|s| (s.id, s.name.as_str()))
                        .ok_or(MetricsError::UnknownScenario(*id))
                })
                .collect(),
        }
    }

    pub fn sequences_for(&self, scenario_id: ScenarioId) -> impl Iterator<Item = &Sequence> {
        self.sequences
            .iter()
            .filter(move |s| s.scenario_id == scenario_id)
    }

    pub fn scalars_for(&self, scenario_id: ScenarioId) -> impl Iterator<Item = &Scalar> {
        self.scalars
            .iter()
            .filter(move |s| s.scenario_id == scenario_id)
    }
}

/// One simulation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub id: ScenarioId,
    pub name: String,
    #[serde(default)]
    pub period: Option<String>,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub climate: Option<String>,
    #[serde(default)]
    pub sensitivity: Option<String>,
}

/// Display label for a node, or for a directed edge when `from_node` is set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Label {
    pub component: String,
    #[serde(default)]
    pub from_node: Option<String>,
    #[serde(default)]
    pub to_node: Option<String>,
    pub label: String,
    #[serde(default)]
    pub is_bus: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub from_node: String,
    #[serde(default)]
    pub to_node: Option<String>,
    pub category: String,
    pub carrier: String,
    pub is_renewable: bool,
}

/// Time-series result of one edge (flow record).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sequence {
    pub scenario_id: ScenarioId,
    #[serde(default)]
    pub is_exogenous: bool,
    pub from_node: String,
    #[serde(default)]
    pub to_node: Option<String>,
    pub attribute: String,
    pub total_energy: f64,
    #[serde(default)]
    pub timeseries: Vec<f64>,
}

impl Sequence {
    /// Sum of the stored samples, to be compared against `total_energy`.
    pub fn series_total(&self) -> f64 {
        self.timeseries.iter().sum()
    }

    pub fn is_total_consistent(&self, tolerance: f64) -> bool {
        let total = self.series_total();
        let scale = self.total_energy.abs().max(total.abs()).max(1.0);
        (total - self.total_energy).abs() <= tolerance * scale
    }
}

/// Point-valued result of one edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scalar {
    pub scenario_id: ScenarioId,
    #[serde(default)]
    pub is_exogenous: bool,
    pub from_node: String,
    #[serde(default)]
    pub to_node: Option<String>,
    pub attribute: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub name: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterComponent {
    pub from_node: String,
    pub cluster_id: ClusterId,
}

/// GeoJSON geometry in WGS84 longitude/latitude order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Point { coordinates: [f64; 2] },
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<[f64; 2]>>> },
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn select_scenarios_rejects_unknown_ids() {
        let dataset = Dataset {
            scenarios: vec![scenario(1, "S1"), scenario(2, "S2")],
            ..Dataset::default()
        };
        let all = dataset.select_scenarios(None).unwrap();
        assert_eq!(all.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let err = dataset.select_scenarios(Some(&[2, 9])).unwrap_err();
        assert!(matches!(err, MetricsError::UnknownScenario(9)));
    }

    #[test]
    fn geometry_serializes_as_geojson() {
        let geometry = Geometry::Polygon {
            coordinates: vec![vec![[8.0, 53.0], [8.1, 53.0], [8.1, 53.1], [8.0, 53.0]]],
        };
        let value = serde_json::to_value(&geometry).unwrap();
        assert_eq!(value["type"], "Polygon");
        assert_eq!(value["coordinates"][0][1][0], 8.1);
    }

    #[test]
    fn total_consistency_uses_relative_tolerance() {
        let sequence = Sequence {
            scenario_id: 1,
            is_exogenous: false,
            from_node: "pv_roof".into(),
            to_node: Some("electricity".into()),
            attribute: "flow".into(),
            total_energy: 6.0,
            timeseries: vec![1.0, 2.0, 3.0],
        };
        assert!(sequence.is_total_consistent(1e-9));
        let drifted = Sequence {
            total_energy: 6.5,
            ..sequence
        };
        assert!(!drifted.is_total_consistent(1e-6));
    }
}
