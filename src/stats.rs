//! Pure aggregation functions over metric values.
//!
//! None of these raise for data-shape reasons: absence and degeneracy come
//! back as explicit values (`0.0` for an empty geometric mean, `None` for
//! an excluded ratio) because downstream tables render `N/A` and `0.0000`
//! differently.

use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Geometric mean of the positive values in the input.
///
/// Non-positive entries are excluded, not multiplied in, so the result is
/// invariant under permutation and under interspersed zero or negative
/// entries. An empty (post-filter) input returns `0.0`, the explicit
/// "no data" value; it is never an error.
pub fn geometric_mean<I>(values: I) -> f64
where
    I: IntoIterator<Item = f64>,
{
    let logs: Vec<f64> = values
        .into_iter()
        .filter(|v| *v > 0.0)
        .map(f64::ln)
        .collect();
    if logs.is_empty() {
        return 0.0;
    }
    (logs.iter().sum::<f64>() / logs.len() as f64).exp()
}

/// [`geometric_mean`] over optional values; `None` entries are excluded.
pub fn geometric_mean_opt<I>(values: I) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    geometric_mean(values.into_iter().flatten())
}

/// Configuration IPC normalized to its baseline. Defined only when the
/// baseline is present and positive; otherwise the pairing is excluded
/// (never folded to `0` or infinity).
pub fn ratio_to_baseline(baseline: Option<f64>, value: Option<f64>) -> Option<f64> {
    match (baseline, value) {
        (Some(b), Some(m)) if b > 0.0 => Some(m / b),
        _ => None,
    }
}

/// Pinned-over-unpinned IPC for the same coordinate modulo the pinning
/// bit. Defined only when both sides are present and positive.
pub fn pin_gain(nopin: Option<f64>, pin: Option<f64>) -> Option<f64> {
    match (nopin, pin) {
        (Some(n), Some(p)) if n > 0.0 && p > 0.0 => Some(p / n),
        _ => None,
    }
}

/// A ratio expressed as a signed percentage delta.
pub fn percent_delta(ratio: f64) -> f64 {
    (ratio - 1.0) * 100.0
}

/// DRAM-locality intensity class of a workload, from its RBMPKI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MemoryIntensity {
    High,
    Medium,
    Low,
    Unknown,
}

impl MemoryIntensity {
    /// Band boundaries are inclusive on the lower side: exactly 10.0 is
    /// Medium, exactly 5.0 is Low.
    pub fn from_rbmpki(rbmpki: Option<f64>) -> Self {
        match rbmpki {
            None => MemoryIntensity::Unknown,
            Some(v) if v > 10.0 => MemoryIntensity::High,
            Some(v) if v > 5.0 => MemoryIntensity::Medium,
            Some(_) => MemoryIntensity::Low,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MemoryIntensity::High => "High",
            MemoryIntensity::Medium => "Medium",
            MemoryIntensity::Low => "Low",
            MemoryIntensity::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for MemoryIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable descending sort by `key`; ties keep the original (insertion)
/// order, which fixes the displayed order of ranked reports.
pub fn rank_descending<'a, T, F>(items: &'a [T], key: F) -> Vec<&'a T>
where
    F: Fn(&T) -> f64,
{
    let mut ranked: Vec<&T> = items.iter().collect();
    ranked.sort_by(|a, b| {
        key(b)
            .partial_cmp(&key(a))
            .unwrap_or(Ordering::Equal)
    });
    ranked
}
