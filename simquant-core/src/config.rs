//! Configuration file support for SimQuant reports
//!
//! Loads report settings from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.simquantrc.json` next to the results file
//! 3. `simquant.config.json` next to the results file
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::stats::{ValueFormat, DEFAULT_DECIMAL_PLACES, DEFAULT_VALUE_CAP};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_TITLE: &str = "SimQuant Report";
pub const DEFAULT_BASELINE_TOLERANCE: f64 = 1e-6;
/// Upper bound on displayed decimals; more only adds floating-point noise
pub const MAX_DECIMAL_PLACES: usize = 6;

/// Which aggregate values the report shows before any toggle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InitialValues {
    /// Producer `mergedResults`
    #[default]
    Baseline,
    /// Recomputed over all scans
    Recomputed,
}

/// SimQuant configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimquantConfig {
    /// Document title (default: "SimQuant Report")
    #[serde(default)]
    pub title: Option<String>,

    /// Values above the cap display as `>cap` (default: 10000)
    #[serde(default)]
    pub value_cap: Option<f64>,

    /// Decimal places for ratio and SNR values (default: 2)
    #[serde(default)]
    pub decimal_places: Option<usize>,

    /// Initial aggregate values (default: baseline)
    #[serde(default)]
    pub initial_values: Option<InitialValues>,

    /// Allowed absolute difference between recomputed and producer aggregates
    #[serde(default)]
    pub baseline_tolerance: Option<f64>,

    /// Abort when a recomputed aggregate disagrees with its baseline
    #[serde(default)]
    pub strict_baseline: Option<bool>,

    /// Embed per-scan charts (default: true)
    #[serde(default)]
    pub visuals: Option<bool>,

    /// Directory holding scan charts (default: the results file's directory)
    #[serde(default)]
    pub visual_dir: Option<PathBuf>,
}

/// Resolved configuration with defaults applied
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub title: String,
    pub format: ValueFormat,
    pub initial_values: InitialValues,
    pub baseline_tolerance: f64,
    pub strict_baseline: bool,
    pub visuals: bool,
    pub visual_dir: Option<PathBuf>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl SimquantConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(cap) = self.value_cap {
            if !cap.is_finite() || cap <= 0.0 {
                anyhow::bail!("value_cap must be a positive number (got {})", cap);
            }
        }

        if let Some(places) = self.decimal_places {
            if places > MAX_DECIMAL_PLACES {
                anyhow::bail!(
                    "decimal_places must be at most {} (got {})",
                    MAX_DECIMAL_PLACES,
                    places
                );
            }
        }

        if let Some(tolerance) = self.baseline_tolerance {
            if !tolerance.is_finite() || tolerance < 0.0 {
                anyhow::bail!(
                    "baseline_tolerance must be non-negative (got {})",
                    tolerance
                );
            }
        }

        if let Some(ref title) = self.title {
            if title.trim().is_empty() {
                anyhow::bail!("title must not be empty");
            }
        }

        Ok(())
    }

    /// Resolve config into the form the report pipeline uses
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        Ok(ResolvedConfig {
            title: self
                .title
                .clone()
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            format: ValueFormat {
                cap: self.value_cap.unwrap_or(DEFAULT_VALUE_CAP),
                places: self.decimal_places.unwrap_or(DEFAULT_DECIMAL_PLACES),
            },
            initial_values: self.initial_values.unwrap_or_default(),
            baseline_tolerance: self
                .baseline_tolerance
                .unwrap_or(DEFAULT_BASELINE_TOLERANCE),
            strict_baseline: self.strict_baseline.unwrap_or(false),
            visuals: self.visuals.unwrap_or(true),
            visual_dir: self.visual_dir.clone(),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        SimquantConfig::default().resolve()
    }
}

/// Discover and load a config file from the results directory
///
/// Search order:
/// 1. `.simquantrc.json`
/// 2. `simquant.config.json`
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(SimquantConfig, PathBuf)>> {
    for name in [".simquantrc.json", "simquant.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<SimquantConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: SimquantConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for a results file
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
/// A relative `visual_dir` is taken relative to the file that set it.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (SimquantConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    if let (Some(visual_dir), Some(source)) = (&resolved.visual_dir, &source_path) {
        if visual_dir.is_relative() {
            let base = source.parent().unwrap_or(dir);
            resolved.visual_dir = Some(base.join(visual_dir));
        }
    }
    resolved.config_path = source_path;
    tracing::debug!(config = ?resolved.config_path, "resolved report configuration");
    Ok(resolved)
}
