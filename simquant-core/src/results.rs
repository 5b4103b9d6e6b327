//! Producer output model
//!
//! Mirrors the hierarchical result structure written by the quantification
//! binary. Maps keep the producer's order so "first seen" is well defined
//! for the identity indexer.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level quantification result
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QuantResults {
    /// Peptide sequence -> per-peptide result
    #[serde(default)]
    pub peptide_results: IndexMap<String, PeptideResult>,

    /// Protein name -> per-protein result
    #[serde(default)]
    pub protein_results: IndexMap<String, ProteinResult>,

    /// Peptide sequence -> candidate proteins, present only for peptides that
    /// could not be assigned to exactly one protein. A null or empty list
    /// means the peptide matched no protein at all.
    #[serde(default)]
    pub ambiguous_peptides: IndexMap<String, Option<Vec<String>>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeptideResult {
    /// Spot label -> per-spot result
    #[serde(default)]
    pub spots: IndexMap<String, SpotResult>,
    pub merged_results: MergedResults,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpotResult {
    #[serde(default)]
    pub scan_results: Vec<ScanResult>,
    pub merged_results: MergedResults,
}

/// A single quantified scan (leaf measurement)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    /// Scan number within the spectra file
    #[serde(deserialize_with = "scan_number")]
    pub id: String,
    pub charge: i32,
    pub ratio: f64,
    pub snr: f64,
    pub retention_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_line: Option<String>,
    /// Reference to the auxiliary chart for this scan
    #[serde(default, alias = "svg", skip_serializing_if = "Option::is_none")]
    pub visual_ref: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProteinResult {
    #[serde(default)]
    pub peptides: Vec<String>,
    pub merged_results: MergedResults,
}

/// Producer-computed aggregate over all scans of a node
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MergedResults {
    pub ratio_mean: f64,
    pub ratio_std_dev: f64,
    pub snr_mean: f64,
    pub snr_std_dev: f64,
}

/// Scan numbers are integers in the YAML output but strings in hand-written
/// JSON; accept both.
fn scan_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Int(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Int(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

impl QuantResults {
    pub fn peptide_count(&self) -> usize {
        self.peptide_results.len()
    }

    pub fn protein_count(&self) -> usize {
        self.protein_results.len()
    }

    pub fn scan_count(&self) -> usize {
        self.peptide_results
            .values()
            .flat_map(|p| p.spots.values())
            .map(|s| s.scan_results.len())
            .sum()
    }
}

/// Input encoding of a results file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultsFormat {
    Json,
    Yaml,
}

impl ResultsFormat {
    /// Pick the format from a file extension. Anything that is not `.json`
    /// is treated as YAML, the producer's native output.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => ResultsFormat::Json,
            _ => ResultsFormat::Yaml,
        }
    }
}

pub fn parse_results_json(content: &str) -> Result<QuantResults> {
    serde_json::from_str(content).context("malformed results JSON")
}

pub fn parse_results_yaml(content: &str) -> Result<QuantResults> {
    // The producer writes an empty document when nothing was quantified
    if content.trim().is_empty() {
        return Ok(QuantResults::default());
    }
    serde_yaml::from_str(content).context("malformed results YAML")
}

/// Load producer output from disk
pub fn load_results(path: &Path) -> Result<QuantResults> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read results file: {}", path.display()))?;

    let parsed = match ResultsFormat::from_path(path) {
        ResultsFormat::Json => parse_results_json(&content),
        ResultsFormat::Yaml => parse_results_yaml(&content),
    };
    parsed.with_context(|| format!("invalid results file: {}", path.display()))
}
