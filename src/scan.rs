//! Directory ingestion: one pass over a results tree into a [`RecordIndex`].
//!
//! Per-file failures never abort the batch. Filenames outside the grammar
//! are expected (result directories hold plots, notes, partial runs) and
//! skipped without a diagnostic; unreadable files are skipped with one.

use crate::Result;
use crate::coord::CoordinateParser;
use crate::diagnostics;
use crate::index::{Record, RecordIndex};
use crate::metrics::MetricExtractor;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Scan a results tree and accumulate every parseable run.
///
/// A missing root is not fatal: it yields an empty index (the caller
/// reports "no data found") after a single warning.
pub fn scan_results_dir(root: &Path) -> Result<RecordIndex> {
    let parser = CoordinateParser::new()?;
    let extractor = MetricExtractor::new()?;
    let mut index = RecordIndex::new();

    if !root.is_dir() {
        diagnostics::warn(format!(
            "results directory {} does not exist, no data found",
            root.display()
        ));
        return Ok(index);
    }

    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                diagnostics::warn(format!("skipping unreadable entry: {err}"));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(filename) = entry.file_name().to_str() else {
            continue;
        };
        let Some(coordinate) = parser.parse(filename) else {
            continue;
        };

        let text = match fs::read_to_string(entry.path()) {
            Ok(text) => text,
            Err(err) => {
                diagnostics::warn(format!("skipping {}: {err}", entry.path().display()));
                continue;
            }
        };

        index.insert(Record {
            coordinate,
            metrics: extractor.extract(&text),
            source_path: entry.path().to_path_buf(),
        });
    }

    Ok(index)
}
