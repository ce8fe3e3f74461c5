//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
//! Metric computation engine for energy-system simulation results.
//!
//! The engine reads an immutable [`Dataset`] and derives flat output
//! collections: detailed and label-collapsed flows, capacities, cluster flows,
//! the cluster map, autarky and the long-form input timeseries. Every scenario
//! is independent, so [`analyze_dataset_with_options`] fans the per-scenario
//! work out on the rayon pool and concatenates results in scenario order.

pub mod autarky;
pub mod capacity;
pub mod clusters;
pub mod errors;
pub mod flows;
pub mod io;
pub mod model;
pub mod pattern;
pub mod reports;
pub mod resolver;
pub mod series;
pub mod timeseries;

use std::path::Path;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use resq_common::AppConfig;
use resq_logging::{log_pipeline_event, metrics_debug, LogContext, PipelineOutcome};
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, Span};

use crate::{
    autarky::{autarky_for_scenario, AutarkyRow},
    capacity::{capacities_for_scenario, CapacityRow},
    clusters::{
        cluster_flows_for_scenario, cluster_map_for_scenario, ClusterFlowRow, ClusterIndex,
        ClusterMapRow,
    },
    flows::{
        collapsed_flows_for_scenario, detailed_flows_for_scenario, FlowQuery, FlowRow,
        LabelFlowRow,
    },
    reports::ReportExporter,
    resolver::Resolver,
    series::DatasetDiagnostics,
    timeseries::{timeseries_for_scenario, TimeseriesQuery, TimeseriesRow},
};

pub use errors::{MetricsError, Result};
pub use model::{Dataset, ScenarioId};

/// All output collections derived from one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub generated_at: DateTime<Utc>,
    pub dataset_version: Option<String>,
    pub diagnostics: DatasetDiagnostics,
    pub flows: Vec<FlowRow>,
    pub label_flows: Vec<LabelFlowRow>,
    pub capacities: Vec<CapacityRow>,
    pub cluster_flows: Vec<ClusterFlowRow>,
    pub cluster_map: Vec<ClusterMapRow>,
    pub autarky: Vec<AutarkyRow>,
    pub timeseries: Vec<TimeseriesRow>,
}

impl MetricsReport {
    pub fn exporter(&self) -> ReportExporter<'_> {
        ReportExporter::new(self)
    }
}

/// View switches for a full report run.
///
/// `scenarios` selects the scenarios of the whole report; the scenario
/// filters embedded in the individual queries are not consulted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportOptions {
    #[serde(default)]
    pub scenarios: Option<Vec<ScenarioId>>,
    pub detailed_flows: FlowQuery,
    pub collapsed_flows: FlowQuery,
    pub timeseries: TimeseriesQuery,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            scenarios: None,
            detailed_flows: FlowQuery::detailed(),
            collapsed_flows: FlowQuery::by_label(),
            timeseries: TimeseriesQuery::default(),
        }
    }
}

#[derive(Debug, Default)]
struct ScenarioMetrics {
    flows: Vec<FlowRow>,
    label_flows: Vec<LabelFlowRow>,
    capacities: Vec<CapacityRow>,
    cluster_flows: Vec<ClusterFlowRow>,
    cluster_map: Vec<ClusterMapRow>,
    autarky: Vec<AutarkyRow>,
    timeseries: Vec<TimeseriesRow>,
}

/// Derive every output collection with default view options. Nothing is
/// written to disk.
pub fn analyze_dataset(dataset: &Dataset, config: &AppConfig) -> Result<MetricsReport> {
    analyze_dataset_with_options(dataset, config, &ReportOptions::default(), None)
}

/// Derive every output collection and export it to the configured
/// `[export] directory`.
pub fn analyze_and_export(
    dataset: &Dataset,
    config: &AppConfig,
    options: &ReportOptions,
) -> Result<MetricsReport> {
    analyze_dataset_with_options(dataset, config, options, Some(&config.export.directory))
}

/// Derive every output collection and, when `output_dir` is given, export the
/// report there.
pub fn analyze_dataset_with_options(
    dataset: &Dataset,
    config: &AppConfig,
    options: &ReportOptions,
    output_dir: Option<&Path>,
) -> Result<MetricsReport> {
    let span = info_span!(
        "metrics_report",
        dataset_version = dataset.version.as_deref().unwrap_or("unversioned")
    );
    let outcome = span.in_scope(|| -> Result<MetricsReport> {
        let report = build_report(dataset, config, options, &span)?;
        if let Some(dir) = output_dir {
            info_span!("view", view = "export")
                .in_scope(|| report.exporter().export_all(dir, config.export.write_csv))?;
        }
        Ok(report)
    });

    match &outcome {
        Ok(report) => log_pipeline_event(
            None,
            "metrics.report",
            &format!(
                "report derived for {} autarky rows across the selected scenarios",
                report.autarky.len()
            ),
            PipelineOutcome::Success,
        ),
        Err(err) => log_pipeline_event(
            None,
            "metrics.report",
            &err.to_string(),
            PipelineOutcome::Fault,
        ),
    }
    outcome
}

fn build_report(
    dataset: &Dataset,
    config: &AppConfig,
    options: &ReportOptions,
    report_span: &Span,
) -> Result<MetricsReport> {
    info!("Validating dataset...");
    let diagnostics = series::validate_dataset(dataset)?;

    let selection: Vec<(ScenarioId, &str)> = dataset
        .select_scenarios(options.scenarios.as_deref())?
        .into_iter()
        .collect();

    let resolver = Resolver::new(dataset, &config.resolver);
    let clusters = ClusterIndex::new(dataset);
    info!(
        scenarios = selection.len(),
        mapped_nodes = clusters.mapped_nodes(),
        "Deriving scenario metrics..."
    );

    let per_scenario: Vec<ScenarioMetrics> = selection
        .par_iter()
        .map(|(scenario_id, name)| {
            let _scenario = info_span!(
                parent: report_span,
                "scenario",
                scenario_id = *scenario_id,
                scenario = *name
            )
            .entered();
            scenario_metrics(
                dataset,
                &resolver,
                &clusters,
                config,
                options,
                *scenario_id,
                name,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut report = MetricsReport {
        generated_at: Utc::now(),
        dataset_version: dataset.version.clone(),
        diagnostics,
        flows: Vec::new(),
        label_flows: Vec::new(),
        capacities: Vec::new(),
        cluster_flows: Vec::new(),
        cluster_map: Vec::new(),
        autarky: Vec::new(),
        timeseries: Vec::new(),
    };
    for metrics in per_scenario {
        report.flows.extend(metrics.flows);
        report.label_flows.extend(metrics.label_flows);
        report.capacities.extend(metrics.capacities);
        report.cluster_flows.extend(metrics.cluster_flows);
        report.cluster_map.extend(metrics.cluster_map);
        report.autarky.extend(metrics.autarky);
        report.timeseries.extend(metrics.timeseries);
    }
    Ok(report)
}

fn scenario_metrics(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    clusters: &ClusterIndex<'_>,
    config: &AppConfig,
    options: &ReportOptions,
    scenario_id: ScenarioId,
    name: &str,
) -> Result<ScenarioMetrics> {
    let context = LogContext::new().with_scenario(scenario_id);

    let metrics = ScenarioMetrics {
        flows: in_view("flows", || {
            detailed_flows_for_scenario(dataset, resolver, scenario_id, name, &options.detailed_flows)
        }),
        label_flows: in_view("label_flows", || {
            collapsed_flows_for_scenario(
                dataset,
                resolver,
                scenario_id,
                name,
                &options.collapsed_flows,
            )
        }),
        capacities: in_view("capacities", || {
            capacities_for_scenario(dataset, resolver, scenario_id, name)
        }),
        cluster_flows: in_view("cluster_flows", || {
            cluster_flows_for_scenario(dataset, resolver, clusters, scenario_id, name)
        }),
        cluster_map: in_view("cluster_map", || {
            cluster_map_for_scenario(dataset, resolver, clusters, scenario_id, name)
        }),
        autarky: in_view("autarky", || {
            autarky_for_scenario(dataset, resolver, &config.autarky, scenario_id, name)
        })?
        .to_vec(),
        timeseries: in_view("input_timeseries", || {
            timeseries_for_scenario(dataset, resolver, &options.timeseries, scenario_id, name)
        })?,
    };

    metrics_debug!(
        context = context,
        "flows={} capacities={} clusters={} timeseries={}",
        metrics.flows.len(),
        metrics.capacities.len(),
        metrics.cluster_map.len(),
        metrics.timeseries.len()
    );
    Ok(metrics)
}

/// Run one view derivation inside a `view` span nested in the current scenario span.
fn in_view<T>(view: &'static str, derive: impl FnOnce() -> T) -> T {
    info_span!("view", view).in_scope(derive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, Label, Scenario, Sequence};

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

    fn flow(scenario_id: ScenarioId, from: &str, to: &str, series: Vec<f64>) -> Sequence {
        Sequence {
            scenario_id,
            is_exogenous: false,
            from_node: from.into(),
            to_node: Some(to.into()),
            attribute: "flow".into(),
            total_energy: series.iter().sum(),
            timeseries: series,
        }
    }

    fn dataset() -> Dataset {
        Dataset {
            version: Some("unit".into()),
            scenarios: vec![scenario(3, "S3"), scenario(1, "S1")],
            labels: vec![
                Label {
                    component: "pv".into(),
                    from_node: None,
                    to_node: None,
                    label: "PV".into(),
                    is_bus: false,
                },
                Label {
                    component: "demand".into(),
                    from_node: None,
                    to_node: None,
                    label: "Demand".into(),
                    is_bus: false,
                },
            ],
            categories: vec![
                Category {
                    from_node: "pv".into(),
                    to_node: Some("bus_elec".into()),
                    category: "Erzeugung".into(),
                    carrier: "electricity".into(),
                    is_renewable: true,
                },
                Category {
                    from_node: "bus_elec".into(),
                    to_node: Some("demand".into()),
                    category: "Verbrauch".into(),
                    carrier: "electricity".into(),
                    is_renewable: false,
                },
            ],
            sequences: vec![
                flow(1, "pv", "bus_elec", vec![3.0, 0.0]),
                flow(1, "bus_elec", "demand", vec![1.0, 1.0]),
                flow(3, "pv", "bus_elec", vec![1.0, 1.0, 1.0]),
                flow(3, "bus_elec", "demand", vec![2.0, 2.0, 2.0]),
            ],
            ..Dataset::default()
        }
    }

    #[test]
    fn report_rows_follow_scenario_order() {
        let report = analyze_dataset(&dataset(), &AppConfig::default()).unwrap();
        let autarky: Vec<_> = report
            .autarky
            .iter()
            .map(|r| (r.scenario_id, r.kind.as_str()))
            .collect();
        assert_eq!(
            autarky,
            vec![
                (1, "Zeitgleich"),
                (1, "Bilanziell"),
                (3, "Zeitgleich"),
                (3, "Bilanziell"),
            ]
        );
        assert_eq!(report.dataset_version.as_deref(), Some("unit"));
        assert!(report.diagnostics.is_clean());
        assert_eq!(report.timeseries.len(), 4 + 6);
    }

    #[test]
    fn scenario_selection_limits_the_report() {
        let options = ReportOptions {
            scenarios: Some(vec![3]),
            ..ReportOptions::default()
        };
        let report =
            analyze_dataset_with_options(&dataset(), &AppConfig::default(), &options, None)
                .unwrap();
        assert!(report.flows.iter().all(|r| r.scenario_id == 3));
        assert_eq!(report.autarky.len(), 2);
        assert_eq!(report.autarky[1].autarky, Some(50.0));
    }

    #[test]
    fn inconsistent_series_fail_the_run() {
        let mut dataset = dataset();
        dataset.sequences.push(flow(1, "pv", "bus_elec", vec![1.0]));
        let err = analyze_dataset(&dataset, &AppConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            MetricsError::InconsistentSeriesLength { scenario_id: 1, .. }
        ));
    }
}
