//! ---
//! resq_section: "08-reporting-metrics"
//! resq_subsection: "tests"
//! resq_type: "test"
//! resq_scope: "code"
//! resq_description: "Property tests for the reporting metrics engine."
//! resq_version: "v0.0.0-prealpha"
//! resq_owner: "tbd"
//! ---
use proptest::prelude::*;
use resq_common::{AutarkyConfig, ResolverConfig};
use resq_metrics::{
    autarky::{calculate_autarky, AutarkyKind},
    clusters::{cluster_map, ClusterIndex},
    model::{Category, Cluster, ClusterComponent, Dataset, Geometry, Scenario, Sequence},
    resolver::Resolver,
    series::validate_dataset,
};

fn scenario() -> Scenario {
    Scenario {
        id: 1,
        name: "S1".into(),
        period: None,
        weather: None,
        climate: None,
        sensitivity: None,
    }
}

fn flow(from: &str, to: &str, series: Vec<f64>) -> Sequence {
    Sequence {
        scenario_id: 1,
        is_exogenous: false,
        from_node: from.into(),
        to_node: Some(to.into()),
        attribute: "flow".into(),
        total_energy: series.iter().sum(),
        timeseries: series,
    }
}

fn category(from: &str, to: &str, name: &str, renewable: bool) -> Category {
    Category {
        from_node: from.into(),
        to_node: Some(to.into()),
        category: name.into(),
        carrier: "electricity".into(),
        is_renewable: renewable,
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
}

proptest! {
    #[test]
    fn only_perturbed_totals_are_reported(
        series in prop::collection::vec(prop::collection::vec(0.0_f64..100.0, 24), 1..6),
        offset in 1.0_f64..50.0,
    ) {
        let mut sequences: Vec<Sequence> = series
            .into_iter()
            .enumerate()
            .map(|(idx, s)| flow(&format!("tech_{idx}"), "bus_elec", s))
            .collect();
        sequences[0].total_energy += offset;
        let dataset = Dataset {
            scenarios: vec![scenario()],
            sequences,
            ..Dataset::default()
        };

        let diagnostics = validate_dataset(&dataset).unwrap();
        prop_assert_eq!(diagnostics.total_mismatches.len(), 1);
        prop_assert_eq!(diagnostics.total_mismatches[0].from_node.as_str(), "tech_0");
        for sequence in &dataset.sequences[1..] {
            prop_assert!(close(sequence.total_energy, sequence.series_total()));
        }
    }

    #[test]
    fn zeitgleich_stays_within_percentage_bounds(
        generation in prop::collection::vec(-10.0_f64..50.0, 1..72),
        demand_level in 0.0_f64..30.0,
    ) {
        let length = generation.len();
        let dataset = Dataset {
            scenarios: vec![scenario()],
            categories: vec![
                category("pv", "bus_elec", "Erzeugung", true),
                category("bus_elec", "demand", "Verbrauch", false),
            ],
            sequences: vec![
                flow("pv", "bus_elec", generation),
                flow("bus_elec", "demand", vec![demand_level; length]),
            ],
            ..Dataset::default()
        };
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let rows = calculate_autarky(&dataset, &resolver, &AutarkyConfig::default(), None).unwrap();

        prop_assert_eq!(rows.len(), 2);
        prop_assert_eq!(rows[0].kind, AutarkyKind::Zeitgleich);
        let consumption = demand_level * length as f64;
        if consumption == 0.0 {
            prop_assert!(rows.iter().all(|r| r.autarky.is_none()));
        } else {
            let value = rows[0].autarky.unwrap();
            prop_assert!((0.0..=100.0).contains(&value));
            prop_assert!(rows[1].autarky.is_some());
        }
    }

    #[test]
    fn cluster_map_conserves_mapped_energy(
        totals in prop::collection::vec(0.0_f64..1000.0, 1..12),
        membership in prop::collection::vec(prop::option::of(0_i64..3), 12),
    ) {
        let sequences: Vec<Sequence> = totals
            .iter()
            .enumerate()
            .map(|(idx, total)| flow(&format!("tech_{idx}"), "bus_elec", vec![*total]))
            .collect();
        let cluster_components: Vec<ClusterComponent> = membership
            .iter()
            .take(totals.len())
            .enumerate()
            .filter_map(|(idx, cluster)| {
                cluster.map(|cluster_id| ClusterComponent {
                    from_node: format!("tech_{idx}"),
                    cluster_id,
                })
            })
            .collect();
        let expected: f64 = membership
            .iter()
            .zip(&totals)
            .filter(|(cluster, _)| cluster.is_some())
            .map(|(_, total)| *total)
            .sum();

        let dataset = Dataset {
            scenarios: vec![scenario()],
            sequences,
            clusters: (0..3)
                .map(|id| Cluster {
                    id,
                    name: format!("cluster_{id}"),
                    geometry: Geometry::Point { coordinates: [8.0 + id as f64, 53.0] },
                })
                .collect(),
            cluster_components,
            ..Dataset::default()
        };
        let resolver = Resolver::new(&dataset, &ResolverConfig::default());
        let index = ClusterIndex::new(&dataset);
        let rows = cluster_map(&dataset, &resolver, &index, None).unwrap();

        let summed: f64 = rows.iter().map(|r| r.summed_energy).sum();
        prop_assert!(close(summed, expected));
    }
}
