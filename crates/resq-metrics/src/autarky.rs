//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "module"
//! resq_type: "source"
//! resq_scope: "code"
//! resq_description: "Reporting metric derivations for simulation results."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
//! Renewable self-sufficiency per scenario.
//!
//! Two definitions are derived from the same set of qualifying electricity
//! flows:
//!
//! * **Zeitgleich** counts the timesteps in which renewable generation plus
//!   storage discharge exceeds consumption, as a share of the configured
//!   [`ZeitgleichDenominator`].
//! * **Bilanziell** compares annual renewable generation with annual
//!   consumption and ignores timing.
//!
//! Both are undefined (`None`) when a scenario has no consumption.

use resq_common::{AutarkyConfig, ZeitgleichDenominator};
use resq_logging::{metrics_debug, metrics_warn, LogContext};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{MetricsError, Result},
    model::{Dataset, ScenarioId, Sequence},
    resolver::Resolver,
    series,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutarkyKind {
    Zeitgleich,
    Bilanziell,
}

impl AutarkyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutarkyKind::Zeitgleich => "Zeitgleich",
            AutarkyKind::Bilanziell => "Bilanziell",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutarkyRow {
    pub scenario_id: ScenarioId,
    pub scenario_name: String,
    #[serde(rename = "type")]
    pub kind: AutarkyKind,
    /// Percentage; may exceed 100 for the balance metric.
    pub autarky: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Consumption,
    Supply,
}

struct Qualified<'d> {
    sequence: &'d Sequence,
    role: Role,
    renewable_generation: bool,
}

pub fn calculate_autarky(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    config: &AutarkyConfig,
    scenarios: Option<&[ScenarioId]>,
) -> Result<Vec<AutarkyRow>> {
    let selection = dataset.select_scenarios(scenarios)?;
    let mut rows = Vec::with_capacity(selection.len() * 2);
    for (scenario_id, name) in selection {
        rows.extend(autarky_for_scenario(
            dataset,
            resolver,
            config,
            scenario_id,
            name,
        )?);
    }
    Ok(rows)
}

/// Zeitgleich and Bilanziell rows of one scenario, in that order.
pub fn autarky_for_scenario(
    dataset: &Dataset,
    resolver: &Resolver<'_>,
    config: &AutarkyConfig,
    scenario_id: ScenarioId,
    scenario_name: &str,
) -> Result<[AutarkyRow; 2]> {
    let context = LogContext::new()
        .with_scenario(scenario_id)
        .with_view("autarky");

    let flows: Vec<&Sequence> = dataset
        .sequences_for(scenario_id)
        .filter(|seq| resolver.is_flow(&seq.attribute))
        .collect();
    let series_length =
        series::expected_series_length(scenario_id, flows.iter().copied())?.unwrap_or(0);
    let denominator = denominator_for(scenario_id, config.denominator, series_length, &context)?;

    let qualified: Vec<Qualified<'_>> = flows
        .iter()
        .filter_map(|seq| qualify(resolver, config, seq))
        .collect();

    let consumption: f64 = qualified
        .iter()
        .filter(|q| q.role == Role::Consumption)
        .map(|q| q.sequence.total_energy)
        .sum();
    let generation: f64 = qualified
        .iter()
        .filter(|q| q.renewable_generation)
        .map(|q| q.sequence.total_energy)
        .sum();

    let (zeitgleich, bilanziell) = if consumption == 0.0 {
        metrics_debug!(context = context, "no consumption; autarky undefined");
        (None, None)
    } else {
        let positive = self_sufficient_timesteps(scenario_id, &qualified, series_length)?;
        let zeitgleich =
            (denominator > 0).then(|| positive as f64 / denominator as f64 * 100.0);
        (zeitgleich, Some(generation / consumption * 100.0))
    };

    metrics_debug!(
        context = context,
        "zeitgleich={:?} bilanziell={:?} qualifying_flows={}",
        zeitgleich,
        bilanziell,
        qualified.len()
    );

    Ok([
        AutarkyRow {
            scenario_id,
            scenario_name: scenario_name.to_owned(),
            kind: AutarkyKind::Zeitgleich,
            autarky: zeitgleich,
        },
        AutarkyRow {
            scenario_id,
            scenario_name: scenario_name.to_owned(),
            kind: AutarkyKind::Bilanziell,
            autarky: bilanziell,
        },
    ])
}

fn qualify<'d>(
    resolver: &Resolver<'_>,
    config: &AutarkyConfig,
    sequence: &'d Sequence,
) -> Option<Qualified<'d>> {
    let category = resolver.category(&sequence.from_node, sequence.to_node.as_deref())?;
    if category.carrier != config.carrier {
        return None;
    }
    let is_consumption = category.category == config.consumption_category;
    let is_discharge = resolver.is_storage(&sequence.from_node);
    if !(category.is_renewable || is_discharge || is_consumption) {
        return None;
    }
    Some(Qualified {
        sequence,
        role: if is_consumption {
            Role::Consumption
        } else {
            Role::Supply
        },
        renewable_generation: category.is_renewable
            && category.category == config.generation_category,
    })
}

/// Full reduction over every qualifying series before any timestep is judged.
fn self_sufficient_timesteps(
    scenario_id: ScenarioId,
    qualified: &[Qualified<'_>],
    series_length: usize,
) -> Result<usize> {
    let mut balance = vec![0.0_f64; series_length];
    for flow in qualified {
        let sign = match flow.role {
            Role::Consumption => -1.0,
            Role::Supply => 1.0,
        };
        for (timestep, value) in series::expand(scenario_id, flow.sequence, series_length)? {
            balance[timestep - 1] += sign * value;
        }
    }
    Ok(balance.iter().filter(|sum| **sum > 0.0).count())
}

fn denominator_for(
    scenario_id: ScenarioId,
    denominator: ZeitgleichDenominator,
    series_length: usize,
    context: &LogContext<'_>,
) -> Result<usize> {
    match denominator {
        ZeitgleichDenominator::ObservedTimesteps => Ok(series_length),
        ZeitgleichDenominator::FixedAnnual { timesteps } => {
            if timesteps < series_length {
                return Err(MetricsError::DenominatorTooSmall {
                    scenario_id,
                    denominator: timesteps,
                    series_length,
                });
            }
            if series_length > 0 && timesteps > series_length {
                metrics_warn!(
                    context = context,
                    "series covers {} of {} annual timesteps; zeitgleich autarky is scaled to the full year",
                    series_length,
                    timesteps
                );
            }
            Ok(timesteps)
        }
    }
}
