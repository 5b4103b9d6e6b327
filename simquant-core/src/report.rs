//! Report pipeline and summary output
//!
//! results -> hierarchy -> identity index -> dependency graph -> baseline
//! verification -> HTML. Any error aborts the pass before a file is written.

use crate::config::{InitialValues, ResolvedConfig};
use crate::embed::{display_name, EmbeddedModel};
use crate::graph::DependencyGraph;
use crate::hierarchy::{Hierarchy, PeptideAssignment};
use crate::html::{render_report, summary_sentence, ReportInput};
use crate::index::IdentityIndex;
use crate::results::QuantResults;
use crate::session::AggregateTable;
use crate::stats::Aggregate;
use crate::visuals::VisualSource;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

/// Counts describing one report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSummary {
    pub title: String,
    pub proteins: usize,
    pub peptides: usize,
    pub spots: usize,
    pub scans: usize,
    pub ambiguous: usize,
    pub unassigned: usize,
    pub baseline_mismatches: usize,
}

impl ReportSummary {
    pub fn from_hierarchy(title: &str, hierarchy: &Hierarchy) -> Self {
        ReportSummary {
            title: title.to_string(),
            proteins: hierarchy.proteins.len(),
            peptides: hierarchy.peptides.len(),
            spots: hierarchy.spots.len(),
            scans: hierarchy.scans.len(),
            ambiguous: hierarchy.ambiguous.len(),
            unassigned: hierarchy
                .peptides
                .iter()
                .filter(|p| p.assignment == PeptideAssignment::Unassigned)
                .count(),
            baseline_mismatches: 0,
        }
    }
}

/// An aggregate whose recomputed all-included value disagrees with the
/// producer's `mergedResults`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaselineMismatch {
    /// Identity label, e.g. `peptide-3`
    pub node: String,
    pub name: String,
    pub baseline: Aggregate,
    pub recomputed: Aggregate,
}

#[derive(Debug, Clone)]
pub struct Report {
    pub html: String,
    pub summary: ReportSummary,
    pub baseline_mismatches: Vec<BaselineMismatch>,
}

/// Compare recomputed aggregates with producer baselines.
///
/// Aggregates with no member scans are skipped: there is nothing to
/// recompute them from.
pub fn verify_baseline(
    hierarchy: &Hierarchy,
    index: &IdentityIndex,
    graph: &DependencyGraph,
    tolerance: f64,
) -> Vec<BaselineMismatch> {
    let baseline = AggregateTable::baseline(hierarchy);
    let recomputed = AggregateTable::recomputed(hierarchy, graph);

    let mut mismatches = Vec::new();
    for agg in graph.aggregates() {
        if graph.membership(agg).is_empty() {
            tracing::debug!(node = index.aggregate_label(agg), "no member scans; baseline not verified");
            continue;
        }
        let expected = baseline.get(agg);
        let actual = recomputed.get(agg);
        if actual.approx_eq(&expected, tolerance) {
            continue;
        }
        let mismatch = BaselineMismatch {
            node: index.aggregate_label(agg).to_string(),
            name: display_name(hierarchy, agg.into()),
            baseline: expected,
            recomputed: actual,
        };
        tracing::warn!(
            node = %mismatch.node,
            name = %mismatch.name,
            baseline = ?mismatch.baseline,
            recomputed = ?mismatch.recomputed,
            "recomputed aggregate differs from producer baseline"
        );
        mismatches.push(mismatch);
    }
    mismatches
}

/// Run the whole pipeline and return the rendered document
pub fn build_report(
    results: &QuantResults,
    config: &ResolvedConfig,
    visuals: &dyn VisualSource,
) -> Result<Report> {
    let hierarchy = Hierarchy::from_results(results).context("Inconsistent result hierarchy")?;
    let index = IdentityIndex::build(&hierarchy);
    let graph = DependencyGraph::build(&hierarchy);
    graph
        .check_consistency()
        .context("Dependency maps are inconsistent")?;
    tracing::info!(
        proteins = hierarchy.proteins.len(),
        peptides = hierarchy.peptides.len(),
        spots = hierarchy.spots.len(),
        scans = hierarchy.scans.len(),
        nodes = index.len(),
        "indexed result hierarchy"
    );

    if hierarchy.is_empty() {
        tracing::warn!("no peptides were quantified");
    } else if hierarchy.proteins.is_empty() {
        tracing::warn!("no proteins were quantified");
    }

    let baseline_mismatches =
        verify_baseline(&hierarchy, &index, &graph, config.baseline_tolerance);
    if config.strict_baseline && !baseline_mismatches.is_empty() {
        let first = &baseline_mismatches[0];
        anyhow::bail!(
            "{} aggregate(s) differ from the producer baseline (first: {} {})",
            baseline_mismatches.len(),
            first.node,
            first.name
        );
    }

    let initial = match config.initial_values {
        InitialValues::Baseline => AggregateTable::baseline(&hierarchy),
        InitialValues::Recomputed => AggregateTable::recomputed(&hierarchy, &graph),
    };
    let model = EmbeddedModel::build(&hierarchy, &index, &graph, config.format);
    let html = render_report(&ReportInput {
        title: &config.title,
        hierarchy: &hierarchy,
        index: &index,
        model: &model,
        initial: &initial,
        visuals,
    })?;

    let mut summary = ReportSummary::from_hierarchy(&config.title, &hierarchy);
    summary.baseline_mismatches = baseline_mismatches.len();

    Ok(Report {
        html,
        summary,
        baseline_mismatches,
    })
}

/// Render a summary as text output
pub fn render_text(summary: &ReportSummary) -> String {
    let mut output = String::new();
    output.push_str(&format!("{}\n", summary.title));
    output.push_str(&format!(
        "{}\n",
        summary_sentence(summary.proteins, summary.peptides, summary.spots)
    ));
    for (label, value) in [
        ("proteins", summary.proteins),
        ("peptides", summary.peptides),
        ("spots", summary.spots),
        ("scans", summary.scans),
        ("ambiguous", summary.ambiguous),
        ("unassigned", summary.unassigned),
        ("baseline mismatches", summary.baseline_mismatches),
    ] {
        output.push_str(&format!("  {:<20} {}\n", label, value));
    }
    output
}

/// Render a summary as JSON output
pub fn render_json(summary: &ReportSummary) -> String {
    serde_json::to_string_pretty(summary).unwrap_or_else(|_| "{}".to_string())
}

/// Write the document atomically (temp + rename)
pub fn write_report(path: &Path, html: &str) -> Result<()> {
    use std::fs;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let temp_path = path.with_extension("html.tmp");
    fs::write(&temp_path, html)
        .with_context(|| format!("Failed to write temporary file: {}", temp_path.display()))?;
    if let Err(err) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(err)
            .with_context(|| format!("Failed to rename temporary file to: {}", path.display()));
    }

    tracing::info!(path = %path.display(), bytes = html.len(), "wrote report");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::parse_results_json;
    use crate::visuals::NoVisuals;

    fn results(spot_merged: &str) -> QuantResults {
        let merged =
            r#"{"ratioMean": 2, "ratioStdDev": 1, "snrMean": 6, "snrStdDev": 1}"#;
        let json = format!(
            r#"{{"peptideResults": {{"PEP1": {{"spots": {{"S1": {{"scanResults": [
                {{"id": 1, "charge": 2, "ratio": 1.0, "snr": 5.0, "retentionTime": 1.0}},
                {{"id": 2, "charge": 2, "ratio": 3.0, "snr": 7.0, "retentionTime": 2.0}}
            ], "mergedResults": {spot_merged}}}}}, "mergedResults": {merged}}}}},
            "proteinResults": {{"P": {{"peptides": ["PEP1"], "mergedResults": {merged}}}}}}}"#
        );
        parse_results_json(&json).unwrap()
    }

    const MATCHING: &str = r#"{"ratioMean": 2, "ratioStdDev": 1, "snrMean": 6, "snrStdDev": 1}"#;
    const OFF: &str = r#"{"ratioMean": 2.5, "ratioStdDev": 1, "snrMean": 6, "snrStdDev": 1}"#;

    #[test]
    fn test_build_report_summary() {
        let config = ResolvedConfig::defaults().unwrap();
        let report = build_report(&results(MATCHING), &config, &NoVisuals).unwrap();
        assert!(report.baseline_mismatches.is_empty());
        assert_eq!(
            report.summary,
            ReportSummary {
                title: "SimQuant Report".to_string(),
                proteins: 1,
                peptides: 1,
                spots: 1,
                scans: 2,
                ambiguous: 0,
                unassigned: 0,
                baseline_mismatches: 0,
            }
        );
        assert!(report.html.contains("Quantified 1 protein with 1 peptide in 1 spot."));
    }

    #[test]
    fn test_baseline_mismatch_is_reported() {
        let config = ResolvedConfig::defaults().unwrap();
        let report = build_report(&results(OFF), &config, &NoVisuals).unwrap();
        assert_eq!(report.baseline_mismatches.len(), 1);
        let mismatch = &report.baseline_mismatches[0];
        assert_eq!(mismatch.node, "spot-0");
        assert_eq!(mismatch.name, "PEP1 S1");
        assert_eq!(mismatch.recomputed.ratio_mean, Some(2.0));
        // Baseline values are still what the document shows initially
        assert!(report
            .html
            .contains(r#"data-agg="spot-0" data-field="ratio-mean">2.50</td>"#));
    }

    #[test]
    fn test_strict_baseline_aborts() {
        let mut config = ResolvedConfig::defaults().unwrap();
        config.strict_baseline = true;
        let err = build_report(&results(OFF), &config, &NoVisuals).unwrap_err();
        assert!(err.to_string().contains("spot-0"));
    }

    #[test]
    fn test_recomputed_initial_values() {
        let mut config = ResolvedConfig::defaults().unwrap();
        config.initial_values = InitialValues::Recomputed;
        let report = build_report(&results(OFF), &config, &NoVisuals).unwrap();
        assert!(report
            .html
            .contains(r#"data-agg="spot-0" data-field="ratio-mean">2.00</td>"#));
    }

    #[test]
    fn test_render_text_and_json() {
        let config = ResolvedConfig::defaults().unwrap();
        let report = build_report(&results(MATCHING), &config, &NoVisuals).unwrap();
        let text = render_text(&report.summary);
        assert!(text.starts_with("SimQuant Report\n"));
        assert!(text.contains("  scans                2\n"));
        let json: serde_json::Value = serde_json::from_str(&render_json(&report.summary)).unwrap();
        assert_eq!(json["peptides"], 1);
        assert_eq!(json["baseline_mismatches"], 0);
    }

    #[test]
    fn test_write_report_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.html");
        write_report(&path, "<html></html>").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<html></html>");
        assert!(!path.with_extension("html.tmp").exists());
    }
}
