//! Aggregate recalculation and value formatting
//!
//! Global invariants enforced:
//! - `recompute` is pure: identical input yields identical output
//! - Standard deviation is the population form (divide by n, not n - 1)
//! - An empty input is the "no data" sentinel, never zero
//! - One formatting rule for every displayed ratio/SNR scalar

use crate::results::MergedResults;
use serde::{Deserialize, Serialize};

/// Text shown for an aggregate with no included leaves
pub const NO_DATA: &str = "-";

/// Default display cap; larger values render as `>10000`
pub const DEFAULT_VALUE_CAP: f64 = 10_000.0;

/// Default number of decimal places
pub const DEFAULT_DECIMAL_PLACES: usize = 2;

/// Mean and population standard deviation of a non-empty sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub mean: f64,
    pub std_dev: f64,
}

/// Recompute mean and population standard deviation.
///
/// Returns `None` (the "no data" sentinel) for an empty slice.
pub fn recompute(values: &[f64]) -> Option<Summary> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    Some(Summary {
        mean,
        std_dev: variance.sqrt(),
    })
}

/// The four displayed scalars of a spot, peptide or protein
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    pub ratio_mean: Option<f64>,
    pub ratio_std_dev: Option<f64>,
    pub snr_mean: Option<f64>,
    pub snr_std_dev: Option<f64>,
}

impl Aggregate {
    /// All four scalars set to the sentinel
    pub const NO_DATA: Aggregate = Aggregate {
        ratio_mean: None,
        ratio_std_dev: None,
        snr_mean: None,
        snr_std_dev: None,
    };

    /// Build from `(ratio, snr)` pairs of the included leaves
    pub fn from_measurements<I>(measurements: I) -> Self
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let (ratios, snrs): (Vec<f64>, Vec<f64>) = measurements.into_iter().unzip();
        let ratio = recompute(&ratios);
        let snr = recompute(&snrs);
        Aggregate {
            ratio_mean: ratio.map(|s| s.mean),
            ratio_std_dev: ratio.map(|s| s.std_dev),
            snr_mean: snr.map(|s| s.mean),
            snr_std_dev: snr.map(|s| s.std_dev),
        }
    }

    pub fn is_no_data(&self) -> bool {
        self.ratio_mean.is_none()
            && self.ratio_std_dev.is_none()
            && self.snr_mean.is_none()
            && self.snr_std_dev.is_none()
    }

    /// Scalars in display column order
    pub fn fields(&self) -> [(AggregateField, Option<f64>); 4] {
        [
            (AggregateField::RatioMean, self.ratio_mean),
            (AggregateField::RatioStdDev, self.ratio_std_dev),
            (AggregateField::SnrMean, self.snr_mean),
            (AggregateField::SnrStdDev, self.snr_std_dev),
        ]
    }

    /// Compare within an absolute tolerance; sentinels only equal sentinels
    pub fn approx_eq(&self, other: &Aggregate, tolerance: f64) -> bool {
        self.fields()
            .iter()
            .zip(other.fields().iter())
            .all(|((_, a), (_, b))| match (a, b) {
                (Some(x), Some(y)) => (x - y).abs() <= tolerance,
                (None, None) => true,
                _ => false,
            })
    }
}

impl From<MergedResults> for Aggregate {
    fn from(merged: MergedResults) -> Self {
        Aggregate {
            ratio_mean: Some(merged.ratio_mean),
            ratio_std_dev: Some(merged.ratio_std_dev),
            snr_mean: Some(merged.snr_mean),
            snr_std_dev: Some(merged.snr_std_dev),
        }
    }
}

/// One of the four aggregate columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateField {
    RatioMean,
    RatioStdDev,
    SnrMean,
    SnrStdDev,
}

impl AggregateField {
    /// Attribute value used to address the cell from the embedded engine
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateField::RatioMean => "ratio-mean",
            AggregateField::RatioStdDev => "ratio-sd",
            AggregateField::SnrMean => "snr-mean",
            AggregateField::SnrStdDev => "snr-sd",
        }
    }
}

/// Display rule for ratio and SNR scalars
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueFormat {
    pub cap: f64,
    pub places: usize,
}

impl Default for ValueFormat {
    fn default() -> Self {
        ValueFormat {
            cap: DEFAULT_VALUE_CAP,
            places: DEFAULT_DECIMAL_PLACES,
        }
    }
}

impl ValueFormat {
    /// `>cap` above the cap, otherwise fixed-point with `places` decimals
    pub fn format(&self, value: f64) -> String {
        if value > self.cap {
            format!(">{}", cap_label(self.cap))
        } else {
            to_fixed(value, self.places)
        }
    }

    pub fn format_opt(&self, value: Option<f64>) -> String {
        value.map_or_else(|| NO_DATA.to_string(), |v| self.format(v))
    }
}

/// Fixed-point formatting with the engine's `Number.prototype.toFixed`
/// semantics: exact ties round away from zero and negative zero prints
/// unsigned. Rust's formatter rounds exact ties to even.
fn to_fixed(value: f64, places: usize) -> String {
    if value == 0.0 {
        return format!("{:.*}", places, 0.0);
    }
    if is_exact_tie(value, places) {
        let unit = 10f64.powi(-(places as i32));
        return format!("{:.*}", places, value + value.signum() * unit / 4.0);
    }
    format!("{:.*}", places, value)
}

/// True when the exact decimal expansion of `value` ends in a single `5`
/// right after the last displayed place.
fn is_exact_tie(value: f64, places: usize) -> bool {
    if !value.is_finite() {
        return false;
    }
    let exact = format!("{:.*}", places + 40, value.abs());
    let Some(dot) = exact.find('.') else {
        return false;
    };
    let tail = &exact[dot + 1 + places..];
    tail.starts_with('5') && tail[1..].bytes().all(|b| b == b'0')
}

/// Caps are usually whole numbers; print them without a trailing `.0`
/// to match the engine's `String(cap)`.
fn cap_label(cap: f64) -> String {
    if cap.fract() == 0.0 && cap.abs() < 1e15 {
        format!("{}", cap as i64)
    } else {
        format!("{}", cap)
    }
}
