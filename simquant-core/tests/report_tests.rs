//! Integration tests for report generation

use simquant_core::config::ResolvedConfig;
use simquant_core::hierarchy::{Hierarchy, PeptideAssignment, ScanIdx};
use simquant_core::index::{AggregateRef, IdentityIndex, NodeRef};
use simquant_core::report::verify_baseline;
use simquant_core::results::load_results;
use simquant_core::session::{AggregateTable, ReviewSession};
use simquant_core::stats::Aggregate;
use simquant_core::{build_report, render_results_file, DependencyGraph, NoVisuals};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_hierarchy(name: &str) -> Hierarchy {
    let results = load_results(&fixture_path(name)).unwrap();
    Hierarchy::from_results(&results).unwrap()
}

fn config_with_charts() -> ResolvedConfig {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.visual_dir = Some(fixture_path("charts"));
    config
}

fn aggregate(ratio_mean: f64, ratio_sd: f64, snr_mean: f64, snr_sd: f64) -> Aggregate {
    Aggregate {
        ratio_mean: Some(ratio_mean),
        ratio_std_dev: Some(ratio_sd),
        snr_mean: Some(snr_mean),
        snr_std_dev: Some(snr_sd),
    }
}

#[test]
fn test_toggle_scenario_end_to_end() {
    let h = load_hierarchy("scenario.yaml");
    let index = IdentityIndex::build(&h);
    let graph = DependencyGraph::build(&h);
    let mut session = ReviewSession::new(&h, &graph);

    let scan_b = match index.resolve("scan-1") {
        Some(NodeRef::Scan(scan)) => scan,
        other => panic!("scan-1 resolved to {:?}", other),
    };
    assert_eq!(h.scan(scan_b).number, "B");

    let levels: Vec<AggregateRef> = ["spot-0", "peptide-0", "protein-0"]
        .iter()
        .map(|label| index.resolve(label).and_then(|n| n.as_aggregate()).unwrap())
        .collect();

    let initial = aggregate(2.0, 1.0, 6.0, 1.0);
    for &agg in &levels {
        assert_eq!(session.displayed(agg), initial);
    }

    session.toggle(scan_b);
    for &agg in &levels {
        assert_eq!(session.displayed(agg), aggregate(1.0, 0.0, 5.0, 0.0));
    }

    session.toggle(scan_b);
    for &agg in &levels {
        assert_eq!(session.displayed(agg), initial);
    }
}

#[test]
fn test_scenario_report_embeds_everything() {
    let path = fixture_path("scenario.yaml");
    let report = render_results_file(&path, &config_with_charts()).unwrap();
    let html = &report.html;

    // Maps and values travel inside the document
    assert!(html.contains(r#""membership":{"spot-0":["scan-0","scan-1"]"#));
    assert!(html.contains(r#""impact":{"scan-0":["spot-0","peptide-0","protein-0"]"#));
    assert!(html.contains(r#""scan-1":{"ratio":3.0,"snr":7.0}"#));
    assert!(html.contains(r#""format":{"cap":10000.0,"places":2}"#));

    // Sanitized charts, no prolog or fixed size
    assert!(html.contains("<title>scan A</title>"));
    assert!(html.contains("<title>scan B</title>"));
    assert!(!html.contains("<?xml"));
    assert!(!html.contains(r#"width="400""#));

    assert!(html.contains("S1 #A @ 12.50 minutes: charge: 2+ / FTMS + p NSI SIM ms [500.00-510.00]"));
    assert!(report.baseline_mismatches.is_empty());
}

#[test]
fn test_missing_chart_aborts_generation() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ResolvedConfig::defaults().unwrap();
    config.visual_dir = Some(dir.path().to_path_buf());

    let err = render_results_file(&fixture_path("scenario.yaml"), &config).unwrap_err();
    assert!(format!("{:#}", err).contains("scan-a.svg"));
}

#[test]
fn test_baseline_equivalence() {
    for fixture in ["scenario.yaml", "multi.json", "no_proteins.json"] {
        let h = load_hierarchy(fixture);
        let index = IdentityIndex::build(&h);
        let graph = DependencyGraph::build(&h);
        let mismatches = verify_baseline(&h, &index, &graph, 1e-9);
        assert!(mismatches.is_empty(), "{}: {:?}", fixture, mismatches);
    }
}

#[test]
fn test_recomputed_table_matches_baseline_table() {
    let h = load_hierarchy("multi.json");
    let graph = DependencyGraph::build(&h);
    let baseline = AggregateTable::baseline(&h);
    let recomputed = AggregateTable::recomputed(&h, &graph);
    for agg in graph.aggregates() {
        if graph.membership(agg).is_empty() {
            assert!(recomputed.get(agg).is_no_data());
            continue;
        }
        assert!(recomputed.get(agg).approx_eq(&baseline.get(agg), 1e-9));
    }
}

#[test]
fn test_natural_protein_order() {
    let h = load_hierarchy("multi.json");
    let names: Vec<&str> = h
        .proteins_for_display()
        .into_iter()
        .map(|p| h.protein(p).name.as_str())
        .collect();
    assert_eq!(names, vec!["protein2", "protein3", "protein10"]);

    let spots: Vec<&str> = h
        .spots_for_display(h.peptides_for_display()[2])
        .into_iter()
        .map(|s| h.spot(s).label.as_str())
        .collect();
    // PEPTIDEK is third in natural order: LIGHTK, ORPHANK, PEPTIDEK, ...
    assert_eq!(spots, vec!["spot2", "spot10"]);
}

#[test]
fn test_ambiguous_and_unassigned_peptides() {
    let h = load_hierarchy("multi.json");
    let shared = h.peptides.iter().find(|p| p.sequence == "SHAREDR").unwrap();
    assert_eq!(
        shared.assignment,
        PeptideAssignment::Ambiguous(vec!["protein2".to_string(), "protein3".to_string()])
    );
    let orphan = h.peptides.iter().find(|p| p.sequence == "ORPHANK").unwrap();
    assert_eq!(orphan.assignment, PeptideAssignment::Unassigned);

    let sequences: Vec<&str> = h.ambiguous.iter().map(|a| a.sequence.as_str()).collect();
    assert_eq!(sequences, vec!["MISSINGK", "SHAREDR"]);
    assert!(h.ambiguous[0].peptide.is_none());

    let report = build_report(
        &load_results(&fixture_path("multi.json")).unwrap(),
        &ResolvedConfig::defaults().unwrap(),
        &NoVisuals,
    )
    .unwrap();
    assert_eq!(report.summary.ambiguous, 2);
    assert_eq!(report.summary.unassigned, 1);
    assert!(report.html.contains("(unable to match to protein)"));
}

#[test]
fn test_values_above_cap() {
    let report = build_report(
        &load_results(&fixture_path("multi.json")).unwrap(),
        &ResolvedConfig::defaults().unwrap(),
        &NoVisuals,
    )
    .unwrap();
    let h = load_hierarchy("multi.json");
    let index = IdentityIndex::build(&h);
    let light = h.peptides.iter().position(|p| p.sequence == "LIGHTK").unwrap();
    let label = index.label(NodeRef::Peptide(simquant_core::hierarchy::PeptideIdx(light)));
    assert!(report.html.contains(&format!(
        r#"data-agg="{label}" data-field="ratio-mean">&gt;10000</td>"#
    )));
    assert!(report.html.contains(&format!(
        r#"data-agg="{label}" data-field="ratio-sd">500.00</td>"#
    )));
}

#[test]
fn test_empty_results_render_messages() {
    let report = render_results_file(&fixture_path("empty.yaml"), &config_with_charts()).unwrap();
    assert!(report.html.contains("No peptides were quantified."));
    assert!(!report.html.contains("data-scan="));
    assert_eq!(report.summary.scans, 0);
}

#[test]
fn test_no_proteins_still_shows_peptides() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.visuals = false;
    let report = render_results_file(&fixture_path("no_proteins.json"), &config).unwrap();
    assert!(report.html.contains("No proteins were quantified."));
    assert!(report.html.contains(r#"data-scan="scan-0">included</td>"#));
}

#[test]
fn test_rendering_is_deterministic() {
    let path = fixture_path("multi.json");
    let mut config = ResolvedConfig::defaults().unwrap();
    config.visuals = false;
    let first = render_results_file(&path, &config).unwrap();
    let second = render_results_file(&path, &config).unwrap();
    assert_eq!(first.html, second.html);
}

#[test]
fn test_rapid_toggles_stay_consistent() {
    let h = load_hierarchy("multi.json");
    let graph = DependencyGraph::build(&h);
    let mut session = ReviewSession::new(&h, &graph);
    for round in 0..25 {
        let scan = ScanIdx(round % h.scans.len());
        session.toggle(scan);
        session.toggle(scan);
        session.toggle(scan);
        for agg in graph.aggregates() {
            assert_eq!(session.displayed(agg), session.expected(agg));
        }
    }
}

mod display_rule {
    use proptest::prelude::*;
    use simquant_core::ValueFormat;

    proptest! {
        #[test]
        fn prop_values_above_cap_print_as_cap(value in 10000.0001f64..1e12) {
            prop_assert_eq!(ValueFormat::default().format(value), ">10000");
        }

        #[test]
        fn prop_values_within_cap_have_fixed_places(value in -10000.0f64..=10000.0) {
            let shown = ValueFormat::default().format(value);
            let (_, decimals) = shown.split_once('.').unwrap();
            prop_assert_eq!(decimals.len(), 2);
            let parsed: f64 = shown.parse().unwrap();
            prop_assert!((parsed - value).abs() <= 0.005 + 1e-9);
        }
    }
}
