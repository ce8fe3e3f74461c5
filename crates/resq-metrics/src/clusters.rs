//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
//! Spatial aggregation of flows by the cluster membership of their source node.

use std::collections::HashMap;

use indexmap::IndexMap;
use resq_logging::{metrics_warn, LogContext};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    errors::Result,
    model::{Cluster, Dataset, Geometry, ScenarioId},
    resolver::Resolver,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterFlowRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub cluster_name: String,
    pub label: Option<String>,
    pub total_energy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMapRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    pub cluster_name: String,
    pub summed_energy: f64,
    pub geojson_feature: Value,
}

/// Node to cluster lookup built from the membership table.
#[derive(Debug)]
pub struct ClusterIndex<'a> {
    membership: HashMap<&'a str, &'a Cluster>,
    features: HashMap<&'a str, Value>,
}

impl<'a> ClusterIndex<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        let clusters: HashMap<_, _> = dataset.clusters.iter().map(|c| (c.id, c)).collect();
        let context = LogContext::new().with_view("clusters");

        let mut membership: HashMap<&'a str, &'a Cluster> = HashMap::new();
        for member in &dataset.cluster_components {
            let Some(cluster) = clusters.get(&member.cluster_id).copied() else {
                metrics_warn!(
                    context = context.clone().with_component(&member.from_node),
                    "membership references unknown cluster {}; node left unmapped",
                    member.cluster_id
                );
                continue;
            };
            match membership.get(member.from_node.as_str()) {
                Some(existing) if existing.id != cluster.id => {
                    metrics_warn!(
                        context = context.clone().with_component(&member.from_node),
                        "node already mapped to cluster '{}'; ignoring '{}'",
                        existing.name,
                        cluster.name
                    );
                }
                Some(_) => {}
                None => {
                    membership.insert(member.from_node.as_str(), cluster);
                }
            }
        }

        let mut features = HashMap::new();
        for cluster in &dataset.clusters {
            features
                .entry(cluster.name.as_str())
                .or_insert_with(|| geojson_feature(&cluster.geometry));
        }

        Self {
            membership,
            features,
        }
    }

    pub fn cluster_of(&self, node: &str) -> Option<&'a Cluster> {
        self.membership.get(node).copied()
    }

    pub fn feature(&self, cluster_name: &str) -> Option<&Value> {
        self.features.get(cluster_name)
    }

    pub fn mapped_nodes(&self) -> usize {
        self.membership.len()
    }
}

/// Wrap a geometry as a single GeoJSON feature with empty properties.
pub fn geojson_feature(geometry: &Geometry) -> Value {
    json!({
        "type": "Feature",
        "geometry": geometry,
        "properties": {},
    })
}

pub fn cluster_flows(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    index: &ClusterIndex<'_>,
    scenarios: Option<&[ScenarioId]>,
) -> Result<Vec<ClusterFlowRow>> {
    let selection = dataset.select_scenarios(scenarios)?;
    let mut rows = Vec::new();
    for (scenario_id, name) in selection {
        rows.extend(cluster_flows_for_scenario(
            dataset,
            resolver,
            index,
            scenario_id,
            name,
        ));
    }
    Ok(rows)
}

pub fn cluster_map(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    index: &ClusterIndex<'_>,
    scenarios: Option<&[ScenarioId]>,
) -> Result<Vec<ClusterMapRow>> {
    let selection = dataset.select_scenarios(scenarios)?;
    let mut rows = Vec::new();
    for (scenario_id, name) in selection {
        rows.extend(cluster_map_for_scenario(
            dataset,
            resolver,
            index,
            scenario_id,
            name,
        ));
    }
    Ok(rows)
}

/// Flow energy summed per cluster and label; flows from unmapped nodes are
/// dropped.
pub fn cluster_flows_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    index: &ClusterIndex<'_>,
    scenario_id: ScenarioId,
    scenario_name: &str,
) -> Vec<ClusterFlowRow> {
    let mut groups: IndexMap<(&str, Option<String>), f64> = IndexMap::new();
    for seq in dataset
        .sequences_for(scenario_id)
        .filter(|seq| resolver.is_flow(&seq.attribute))
    {
        let Some(cluster) = index.cluster_of(&seq.from_node) else {
            continue;
        };
        let edge = resolver.resolve(&seq.from_node, seq.to_node.as_deref());
        *groups
            .entry((cluster.name.as_str(), edge.label))
            .or_insert(0.0) += seq.total_energy;
    }

    let mut rows: Vec<ClusterFlowRow> = groups
        .into_iter()
        .map(|((cluster_name, label), total_energy)| ClusterFlowRow {
            scenario_id,
            scenario_name: scenario_name.to_owned(),
            cluster_name: cluster_name.to_owned(),
            label,
            total_energy,
        })
        .collect();
    rows.sort_by(|a, b| {
        a.cluster_name
            .cmp(&b.cluster_name)
            .then_with(|| a.label.cmp(&b.label))
    });
    rows
}

/// Energy per cluster joined with the cluster's GeoJSON feature.
pub fn cluster_map_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    index: &ClusterIndex<'_>,
    scenario_id: ScenarioId,
    scenario_name: &str,
) -> Vec<ClusterMapRow> {
    let mut sums: IndexMap<&str, f64> = IndexMap::new();
    for seq in dataset
        .sequences_for(scenario_id)
        .filter(|seq| resolver.is_flow(&seq.attribute))
    {
        if let Some(cluster) = index.cluster_of(&seq.from_node) {
            *sums.entry(cluster.name.as_str()).or_insert(0.0) += seq.total_energy;
        }
    }
    sums.sort_keys();

    sums.into_iter()
        .filter_map(|(cluster_name, summed_energy)| {
            index.feature(cluster_name).map(|feature| ClusterMapRow {
                scenario_id,
                scenario_name: scenario_name.to_owned(),
                cluster_name: cluster_name.to_owned(),
                summed_energy,
                geojson_feature: feature.clone(),
            })
        })
        .collect()
}
