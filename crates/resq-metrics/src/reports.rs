//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::Serialize;
use tracing::info;

use crate::{clusters::ClusterMapRow, errors::Result, MetricsReport};

#[derive(Debug)]
pub struct ReportExporter<'a> {
    report: &'a MetricsReport,
}

impl<'a> ReportExporter<'a> {
    pub fn new(report: &'a MetricsReport) -> Self {
        Self { report }
    }

    /// Write one JSON envelope per output collection and, when `write_csv` is
    /// set, a flat CSV next to it. Returns the written paths.
    pub fn export_all(&self, output_dir: &Path, write_csv: bool) -> Result<Vec<PathBuf>> {
        if !output_dir.exists() {
            fs::create_dir_all(output_dir)?;
        }

        let timestamp = self.report.generated_at.to_rfc3339();
        let writer = CollectionWriter {
            output_dir,
            generated_at: &timestamp,
            dataset_version: self.report.dataset_version.as_deref(),
            write_csv,
        };

        let mut written = Vec::new();
        written.extend(writer.write("flows", &self.report.flows)?);
        written.extend(writer.write("label_flows", &self.report.label_flows)?);
        written.extend(writer.write("capacities", &self.report.capacities)?);
        written.extend(writer.write("cluster_flows", &self.report.cluster_flows)?);
        written.extend(writer.write_cluster_map(&self.report.cluster_map)?);
        written.extend(writer.write("autarky", &self.report.autarky)?);
        written.extend(writer.write("input_timeseries", &self.report.timeseries)?);

        let diagnostics = output_dir.join("diagnostics.json");
        write_json(&diagnostics, &writer.envelope(&self.report.diagnostics))?;
        written.push(diagnostics);

        info!(
            files = written.len(),
            "Reports exported to {}",
            output_dir.display()
        );
        Ok(written)
    }
}

#[derive(Debug, Serialize)]
struct ReportEnvelope<'a, T: Serialize + ?Sized> {
    generated_at: &'a str,
    dataset_version: Option<&'a str>,
    data: &'a T,
}

/// Cluster map row with the feature flattened to a JSON string column.
#[derive(Debug, Serialize)]
struct ClusterMapRecord<'a> {
    scenario_id: i64,
    scenario_name: &'a str,
    cluster_name: &'a str,
    summed_energy: f64,
    geojson_feature: String,
}

struct CollectionWriter<'a> {
    output_dir: &'a Path,
    generated_at: &'a str,
    dataset_version: Option<&'a str>,
    write_csv: bool,
}

impl<'a> CollectionWriter<'a> {
    fn envelope<'d, T: Serialize + ?Sized>(&self, data: &'d T) -> ReportEnvelope<'d, T>
    where
        'a: 'd,
    {
        ReportEnvelope {
            generated_at: self.generated_at,
            dataset_version: self.dataset_version,
            data,
        }
    }

    fn write<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<Vec<PathBuf>> {
        let json_path = self.output_dir.join(format!("{name}.json"));
        write_json(&json_path, &self.envelope(rows))?;
        let mut written = vec![json_path];
        if self.write_csv {
            let csv_path = self.output_dir.join(format!("{name}.csv"));
            write_csv_rows(&csv_path, rows)?;
            written.push(csv_path);
        }
        Ok(written)
    }

    fn write_cluster_map(&self, rows: &[ClusterMapRow]) -> Result<Vec<PathBuf>> {
        let json_path = self.output_dir.join("cluster_map.json");
        write_json(&json_path, &self.envelope(rows))?;
        let mut written = vec![json_path];
        if self.write_csv {
            let records = rows
                .iter()
                .map(|row| -> Result<ClusterMapRecord<'_>> {
                    Ok(ClusterMapRecord {
                        scenario_id: row.scenario_id,
                        scenario_name: &row.scenario_name,
                        cluster_name: &row.cluster_name,
                        summed_energy: row.summed_energy,
                        geojson_feature: serde_json::to_string(&row.geojson_feature)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            let csv_path = self.output_dir.join("cluster_map.csv");
            write_csv_rows(&csv_path, &records)?;
            written.push(csv_path);
        }
        Ok(written)
    }
}

fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let serialized = serde_json::to_string_pretty(value)?;
    fs::write(path, serialized)?;
    Ok(())
}

fn write_csv_rows<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
