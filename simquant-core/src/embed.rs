//! Data payload carried inside the rendered document
//!
//! The embedded engine is static text; everything it needs to recompute an
//! aggregate travels here as JSON: per-scan values, the membership and impact
//! maps keyed by identity labels, the display format, and the label -> name
//! table.

use crate::graph::DependencyGraph;
use crate::hierarchy::Hierarchy;
use crate::index::{IdentityIndex, NodeRef};
use crate::stats::ValueFormat;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Values the engine reads for one scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanValues {
    pub ratio: f64,
    pub snr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedModel {
    pub format: ValueFormat,
    pub scans: IndexMap<String, ScanValues>,
    pub membership: IndexMap<String, Vec<String>>,
    pub impact: IndexMap<String, Vec<String>>,
    pub nodes: IndexMap<String, String>,
}

impl EmbeddedModel {
    pub fn build(
        hierarchy: &Hierarchy,
        index: &IdentityIndex,
        graph: &DependencyGraph,
        format: ValueFormat,
    ) -> Self {
        let scans = graph
            .scans()
            .map(|scan| {
                let s = hierarchy.scan(scan);
                (
                    index.scan_label(scan).to_string(),
                    ScanValues {
                        ratio: s.ratio,
                        snr: s.snr,
                    },
                )
            })
            .collect();

        let membership = graph
            .aggregates()
            .map(|agg| {
                let members = graph
                    .membership(agg)
                    .iter()
                    .map(|&scan| index.scan_label(scan).to_string())
                    .collect();
                (index.aggregate_label(agg).to_string(), members)
            })
            .collect();

        let impact = graph
            .scans()
            .map(|scan| {
                let touched = graph
                    .impact(scan)
                    .iter()
                    .map(|&agg| index.aggregate_label(agg).to_string())
                    .collect();
                (index.scan_label(scan).to_string(), touched)
            })
            .collect();

        let nodes = index
            .nodes()
            .map(|node| (index.label(node).to_string(), display_name(hierarchy, node)))
            .collect();

        EmbeddedModel {
            format,
            scans,
            membership,
            impact,
            nodes,
        }
    }

    /// JSON text safe to place inside a `<script>` element
    pub fn to_script(&self) -> Result<String> {
        let json = serde_json::to_string(self).context("Failed to serialize report model")?;
        Ok(escape_for_script(&json))
    }
}

/// Human-readable name of a node, used in the engine's status messages
pub fn display_name(hierarchy: &Hierarchy, node: NodeRef) -> String {
    match node {
        NodeRef::Scan(i) => {
            let scan = hierarchy.scan(i);
            format!(
                "{} {} #{} ({}+)",
                hierarchy.peptide(scan.peptide).sequence,
                hierarchy.spot(scan.spot).label,
                scan.number,
                scan.charge
            )
        }
        NodeRef::Spot(i) => {
            let spot = hierarchy.spot(i);
            format!("{} {}", hierarchy.peptide(spot.peptide).sequence, spot.label)
        }
        NodeRef::Peptide(i) => hierarchy.peptide(i).sequence.clone(),
        NodeRef::Protein(i) => hierarchy.protein(i).name.clone(),
    }
}

fn escape_for_script(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            '&' => out.push_str("\\u0026"),
            '\u{2028}' => out.push_str("\\u2028"),
            '\u{2029}' => out.push_str("\\u2029"),
            c => out.push(c),
        }
    }
    out
}
