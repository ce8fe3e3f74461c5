//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use std::{fs, path::Path};

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::debug;

use crate::{
    errors::{MetricsError, Result},
    model::{Category, Cluster, ClusterComponent, Dataset, Label},
};

/// Load a dataset from JSON or YAML; JSON is detected by a leading `{`.
pub fn load_dataset_from_file(path: impl AsRef<Path>) -> Result<Dataset> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)?;
    let dataset = parse_dataset(&data)?;
    debug!(
        path = %path.display(),
        scenarios = dataset.scenarios.len(),
        sequences = dataset.sequences.len(),
        "dataset loaded"
    );
    Ok(dataset)
}

pub fn parse_dataset(data: &str) -> Result<Dataset> {
    let dataset = if data.trim_start().starts_with('{') {
        serde_json::from_str(data)?
    } else {
        serde_yaml::from_str(data).map_err(MetricsError::YamlSerializationFailed)?
    };
    Ok(dataset)
}

#[derive(Debug, Deserialize)]
struct LabelEntry {
    label: String,
    #[serde(default)]
    bus: bool,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    category: String,
    carrier: String,
    #[serde(default)]
    is_renewable: bool,
}

/// Parse a `{component: {"label": .., "bus": ..}}` mapping into node labels.
pub fn parse_label_mapping(data: &str) -> Result<Vec<Label>> {
    let entries: IndexMap<String, LabelEntry> = serde_json::from_str(data)?;
    Ok(entries
        .into_iter()
        .map(|(component, entry)| Label {
            component,
            from_node: None,
            to_node: None,
            label: entry.label,
            is_bus: entry.bus,
        })
        .collect())
}

pub fn load_label_mapping(path: impl AsRef<Path>) -> Result<Vec<Label>> {
    parse_label_mapping(&fs::read_to_string(path)?)
}

/// Parse a `{"from|to": {...}}` mapping into directed edge categories.
///
/// An empty `to` part denotes an edge without target node.
pub fn parse_category_mapping(data: &str) -> Result<Vec<Category>> {
    let entries: IndexMap<String, CategoryEntry> = serde_json::from_str(data)?;
    entries
        .into_iter()
        .map(|(key, entry)| {
            let (from, to) = split_edge_key(&key)?;
            Ok(Category {
                from_node: from.to_owned(),
                to_node: to.map(str::to_owned),
                category: entry.category,
                carrier: entry.carrier,
                is_renewable: entry.is_renewable,
            })
        })
        .collect()
}

pub fn load_category_mapping(path: impl AsRef<Path>) -> Result<Vec<Category>> {
    parse_category_mapping(&fs::read_to_string(path)?)
}

/// Parse a `{component: cluster_name}` mapping, resolving names against the
/// known clusters.
pub fn parse_cluster_mapping(data: &str, clusters: &[Cluster]) -> Result<Vec<ClusterComponent>> {
    let entries: IndexMap<String, String> = serde_json::from_str(data)?;
    entries
        .into_iter()
        .map(|(component, cluster)| {
            match clusters.iter().find(|c| c.name == cluster) {
                Some(found) => Ok(ClusterComponent {
                    from_node: component,
                    cluster_id: found.id,
                }),
                None => Err(MetricsError::UnknownCluster { component, cluster }),
            }
        })
        .collect()
}

pub fn load_cluster_mapping(
    path: impl AsRef<Path>,
    clusters: &[Cluster],
) -> Result<Vec<ClusterComponent>> {
    parse_cluster_mapping(&fs::read_to_string(path)?, clusters)
}

fn split_edge_key(key: &str) -> Result<(&str, Option<&str>)> {
    let (from, to) = key
        .split_once('|')
        .ok_or_else(|| MetricsError::InvalidMappingKey(key.to_owned()))?;
    let from = from.trim();
    if from.is_empty() {
        return Err(MetricsError::InvalidMappingKey(key.to_owned()));
    }
    let to = to.trim();
    Ok((from, (!to.is_empty()).then_some(to)))
}
