//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use std::collections::{HashMap, HashSet};

use resq_common::ResolverConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    model::{Category, Dataset, Label},
    pattern::PatternSet,
};

/// Display-level view of a directed edge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEdge {
    pub label: Option<String>,
    pub is_bus: bool,
    pub category: Option<String>,
    pub carrier: Option<String>,
    pub is_renewable: Option<bool>,
}

/// Directed edge key. Derived equality treats a missing `to` node as a value
/// of its own, so `None` only ever matches `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EdgeKey<'a> {
    pub from: &'a str,
    pub to: Option<&'a str>,
}

impl<'a> EdgeKey<'a> {
    pub fn new(from: &'a str, to: Option<&'a str>) -> Self {
        Self { from, to }
    }
}

/// Maps raw node identifiers to labels, categories and carriers.
///
/// Built once per dataset; lookups borrow from the dataset tables.
#[derive(Debug)]
pub struct Resolver<'a> {
    node_labels: HashMap<&'a str, &'a Label>,
    edge_labels: HashMap<EdgeKey<'a>, &'a Label>,
    edge_sources: HashSet<&'a str>,
    categories: HashMap<EdgeKey<'a>, &'a Category>,
    storage: PatternSet,
    connectors: PatternSet,
    curtailment: PatternSet,
    discharging_suffix: String,
    charging_suffix: String,
    flow_attribute: String,
}

impl<'a> Resolver<'a> {
    pub fn new(dataset: &'a Dataset, config: &ResolverConfig) -> Self {
        let mut node_labels = HashMap::new();
        let mut edge_labels = HashMap::new();
        let mut edge_sources = HashSet::new();
        for label in &dataset.labels {
            match label.from_node.as_deref() {
                None => {
                    node_labels.entry(label.component.as_str()).or_insert(label);
                }
                Some(from) => {
                    edge_sources.insert(from);
                    edge_labels
                        .entry(EdgeKey::new(from, label.to_node.as_deref()))
                        .or_insert(label);
                }
            }
        }

        let mut categories = HashMap::new();
        for category in &dataset.categories {
            let key = EdgeKey::new(category.from_node.as_str(), category.to_node.as_deref());
            if categories.insert(key, category).is_some() {
                debug!(
                    from = %category.from_node,
                    to = ?category.to_node,
                    "duplicate category row; last one wins"
                );
            }
        }

        Self {
            node_labels,
            edge_labels,
            edge_sources,
            categories,
            storage: PatternSet::new(&config.storage_patterns),
            connectors: PatternSet::new(&config.connector_patterns),
            curtailment: PatternSet::new(&config.curtailment_patterns),
            discharging_suffix: config.discharging_suffix.clone(),
            charging_suffix: config.charging_suffix.clone(),
            flow_attribute: config.flow_attribute.clone(),
        }
    }

    pub fn is_flow(&self, attribute: &str) -> bool {
        attribute == self.flow_attribute
    }

    pub fn is_storage(&self, node: &str) -> bool {
        self.storage.matches(node)
    }

    /// True when either endpoint is a storage device.
    pub fn touches_storage(&self, from: &str, to: Option<&str>) -> bool {
        self.storage.matches(from) || self.storage.matches_opt(to)
    }

    /// True when either endpoint is an internal connector link.
    pub fn touches_connector(&self, from: &str, to: Option<&str>) -> bool {
        self.connectors.matches(from) || self.connectors.matches_opt(to)
    }

    pub fn category(&self, from: &str, to: Option<&str>) -> Option<&'a Category> {
        self.categories.get(&EdgeKey::new(from, to)).copied()
    }

    /// Resolve label and category of a directed edge.
    pub fn resolve(&self, from: &str, to: Option<&str>) -> ResolvedEdge {
        let (label, is_bus) = self.resolve_node_label(from, to);
        let category = self.category(from, to);
        ResolvedEdge {
            label,
            is_bus,
            category: category.map(|c| c.category.clone()),
            carrier: category.map(|c| c.carrier.clone()),
            is_renewable: category.map(|c| c.is_renewable),
        }
    }

    /// Label used for scalar results.
    ///
    /// A source node that carries edge-level label rows only joins through
    /// them, with `to_node` compared null-safely; other nodes fall back to the
    /// node-level resolution.
    pub fn resolve_scalar_label(&self, from: &str, to: Option<&str>) -> (Option<String>, bool) {
        if let Some(label) = self.edge_labels.get(&EdgeKey::new(from, to)) {
            return (Some(label.label.clone()), label.is_bus);
        }
        if self.edge_sources.contains(from) {
            return (None, false);
        }
        self.resolve_node_label(from, to)
    }

    fn resolve_node_label(&self, from: &str, to: Option<&str>) -> (Option<String>, bool) {
        let from_label = self.node_labels.get(from).copied();
        let to_label = to.and_then(|t| self.node_labels.get(t).copied());

        let candidates = [
            from_label.filter(|l| !l.is_bus),
            to_label.filter(|l| !l.is_bus),
            from_label.filter(|l| l.is_bus),
            to_label.filter(|l| l.is_bus),
        ];
        let Some(chosen) = candidates
            .into_iter()
            .flatten()
            .find(|l| !self.curtailment.matches(&l.label))
        else {
            return (None, false);
        };

        let mut text = chosen.label.clone();
        if self.storage.matches(from) {
            text.push_str(&self.discharging_suffix);
        } else if self.storage.matches_opt(to) {
            text.push_str(&self.charging_suffix);
        }
        (Some(text), chosen.is_bus)
    }
}
