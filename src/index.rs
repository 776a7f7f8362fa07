//! In-memory record collection with partial-coordinate lookup.
//!
//! Replaces the nested page -> capacity -> workload -> rate dictionaries of
//! earlier tooling with one flat collection queried through explicit
//! wildcards, so a missing dimension is a filter that matches nothing
//! instead of a lookup error.

use crate::coord::{ExperimentCoordinate, PageSize};
use crate::metrics::MetricSet;
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One parsed result file.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub coordinate: ExperimentCoordinate,
    pub metrics: MetricSet,
    pub source_path: PathBuf,
}

/// Error-rate dimension of a filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RateFilter {
    /// Match baseline and error runs alike.
    #[default]
    Any,
    /// Only baseline runs (no injected error rate).
    Baseline,
    /// Only runs with exactly this rate token.
    Exact(String),
}

/// Partial coordinate; unset fields act as wildcards.
#[derive(Debug, Clone, Default)]
pub struct CoordinateFilter {
    pub page_size: Option<PageSize>,
    pub llc_size_mb: Option<u32>,
    pub capacity: Option<String>,
    pub error_rate: RateFilter,
    pub pinning: Option<bool>,
    pub workload: Option<String>,
}

impl CoordinateFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: PageSize) -> Self {
        self.page_size = Some(page);
        self
    }

    pub fn llc(mut self, llc_size_mb: u32) -> Self {
        self.llc_size_mb = Some(llc_size_mb);
        self
    }

    pub fn capacity(mut self, capacity: &str) -> Self {
        self.capacity = Some(capacity.to_string());
        self
    }

    pub fn baseline(mut self) -> Self {
        self.error_rate = RateFilter::Baseline;
        self
    }

    pub fn rate(mut self, rate: &str) -> Self {
        self.error_rate = RateFilter::Exact(rate.to_string());
        self
    }

    pub fn pinning(mut self, pinning: bool) -> Self {
        self.pinning = Some(pinning);
        self
    }

    pub fn workload(mut self, workload: &str) -> Self {
        self.workload = Some(workload.to_string());
        self
    }

    pub fn matches(&self, coord: &ExperimentCoordinate) -> bool {
        if self.page_size.is_some_and(|p| p != coord.page_size) {
            return false;
        }
        if self.llc_size_mb.is_some_and(|l| l != coord.llc_size_mb) {
            return false;
        }
        if self.capacity.as_deref().is_some_and(|c| c != coord.capacity) {
            return false;
        }
        match &self.error_rate {
            RateFilter::Any => {}
            RateFilter::Baseline => {
                if coord.error_rate.is_some() {
                    return false;
                }
            }
            RateFilter::Exact(rate) => {
                if coord.error_rate.as_deref() != Some(rate.as_str()) {
                    return false;
                }
            }
        }
        if self.pinning.is_some_and(|p| p != coord.pinning) {
            return false;
        }
        if self.workload.as_deref().is_some_and(|w| w != coord.workload) {
            return false;
        }
        true
    }
}

/// Append-only collection of records for one pipeline run.
///
/// Iteration follows insertion order (directory listing order), which is
/// what ranking falls back to on ties.
#[derive(Debug, Default)]
pub struct RecordIndex {
    records: Vec<Record>,
}

impl RecordIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record. At most one record exists per full coordinate;
    /// a duplicate replaces the earlier one in place (last parsed wins,
    /// no merge).
    pub fn insert(&mut self, record: Record) {
        match self
            .records
            .iter_mut()
            .find(|r| r.coordinate == record.coordinate)
        {
            Some(slot) => *slot = record,
            None => self.records.push(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// All records matching the partial coordinate, in insertion order.
    pub fn by_coordinate(&self, filter: &CoordinateFilter) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|r| filter.matches(&r.coordinate))
            .collect()
    }

    /// Metrics of the baseline run for a workload/page pair, if present.
    /// With duplicates across the remaining dimensions the last inserted
    /// record wins, consistent with [`RecordIndex::insert`].
    pub fn baseline_for(&self, workload: &str, page: PageSize) -> Option<&MetricSet> {
        self.records
            .iter()
            .filter(|r| {
                r.coordinate.is_baseline()
                    && r.coordinate.page_size == page
                    && r.coordinate.workload == workload
            })
            .last()
            .map(|r| &r.metrics)
    }

    /// Distinct workload ids, sorted.
    pub fn workloads(&self) -> Vec<String> {
        self.distinct(|r| Some(r.coordinate.workload.clone()))
    }

    /// Distinct capacity tokens, sorted.
    pub fn capacities(&self) -> Vec<String> {
        self.distinct(|r| Some(r.coordinate.capacity.clone()))
    }

    /// Distinct error-rate tokens, sorted; baseline runs contribute nothing.
    pub fn error_rates(&self) -> Vec<String> {
        self.distinct(|r| r.coordinate.error_rate.clone())
    }

    /// Distinct LLC sizes in MB, sorted.
    pub fn llc_sizes(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = self
            .records
            .iter()
            .map(|r| r.coordinate.llc_size_mb)
            .collect();
        set.into_iter().collect()
    }

    fn distinct(&self, key: impl Fn(&Record) -> Option<String>) -> Vec<String> {
        let set: BTreeSet<String> = self.records.iter().filter_map(key).collect();
        set.into_iter().collect()
    }
}
