//! SimQuant core library - interactive review reports for quantification results

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Every hierarchy node has exactly one identity label per report
// - Scan s is in membership(a) iff a is in impact(s)
// - Aggregates are always fully recomputed over the included scans
// - One formatting rule for every displayed ratio/SNR value
// - No global mutable state, randomness, clocks, threads, or async
// - Identical input yields byte-for-byte identical output

pub mod config;
pub mod embed;
pub mod graph;
pub mod hierarchy;
pub mod html;
pub mod index;
pub mod natural;
pub mod report;
pub mod results;
pub mod session;
pub mod stats;
pub mod visuals;

pub use config::{InitialValues, ResolvedConfig, SimquantConfig};
pub use graph::DependencyGraph;
pub use hierarchy::Hierarchy;
pub use index::{AggregateRef, IdentityIndex, NodeRef};
pub use report::{build_report, render_json, render_text, write_report, Report, ReportSummary};
pub use results::{load_results, QuantResults};
pub use session::{AggregateTable, ReviewSession};
pub use stats::{recompute, Aggregate, ValueFormat};
pub use visuals::{DirectoryVisuals, NoVisuals, VisualSource};

use anyhow::Result;
use std::path::Path;

/// Load a results file and build its report with the visual source the
/// configuration asks for
pub fn render_results_file(path: &Path, config: &ResolvedConfig) -> Result<Report> {
    let results = load_results(path)?;
    tracing::debug!(
        path = %path.display(),
        peptides = results.peptide_count(),
        proteins = results.protein_count(),
        scans = results.scan_count(),
        "loaded results"
    );

    if !config.visuals {
        return build_report(&results, config, &NoVisuals);
    }
    let root = match &config.visual_dir {
        Some(dir) => dir.clone(),
        None => path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };
    let visuals = DirectoryVisuals::new(root)?;
    build_report(&results, config, &visuals)
}

/// Load a results file and summarize it without rendering
pub fn summarize_results_file(path: &Path, config: &ResolvedConfig) -> Result<ReportSummary> {
    let results = load_results(path)?;
    let hierarchy = Hierarchy::from_results(&results)?;
    let index = IdentityIndex::build(&hierarchy);
    let graph = DependencyGraph::build(&hierarchy);
    let mut summary = ReportSummary::from_hierarchy(&config.title, &hierarchy);
    summary.baseline_mismatches =
        report::verify_baseline(&hierarchy, &index, &graph, config.baseline_tolerance).len();
    Ok(summary)
}
