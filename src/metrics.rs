//! Metric extraction from free-form simulator log text.
//!
//! Logs exist in several historical formats; every field is extracted
//! independently and is simply absent when its pattern does not occur.
//! Extraction never fails on content — only reading the file can error,
//! and that is handled by the scanner.

use crate::Result;
use regex::Regex;
use serde::Serialize;

/// Metrics recovered from one log body. Each field is independently
/// optional; absence means the log did not contain the section, which is
/// distinct from a reading of zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricSet {
    /// Instructions per cycle from the cumulative-IPC summary.
    pub ipc: Option<f64>,
    /// Retired instruction count from the same summary line.
    pub instructions: Option<u64>,
    /// Sum of ROW_BUFFER_MISS over all memory channels. `None` when the
    /// DRAM statistics section is missing entirely.
    pub row_buffer_misses_total: Option<u64>,
    /// Row-buffer misses per kilo-instruction; derived, defined only when
    /// both the miss total and a positive instruction count are present.
    pub rbmpki: Option<f64>,
    /// Error-correction ways allocated per cache set (pinning runs only).
    pub alloc_error_ways: Option<u32>,
    /// Percentage of allocated error-way slots actually used, in [0, 100].
    pub used_way_pct: Option<f64>,
}

// Newer logs anchor the canonical IPC on the CPU 0 summary; older ones only
// have the end-of-simulation line; the oldest have bare cumulative-IPC lines
// where the last occurrence is the final value.
const CPU0_IPC_RE: &str = r"CPU 0 cumulative IPC:\s*([\d.]+)";
const SUMMARY_IPC_RE: &str = r"Simulation (complete|finished).*?cumulative IPC:\s*([0-9.]+)";
const BARE_IPC_RE: &str = r"cumulative IPC:\s*([0-9.]+)";

const INSTRUCTIONS_RE: &str = r"CPU 0 cumulative IPC:.*?instructions:\s*(\d+)";
const ROW_BUFFER_MISS_RE: &str = r"(?m)^\s*ROW_BUFFER_MISS:\s*(\d+)";
const ALLOC_WAYS_RE: &str = r"Allocated Error Ways per Set:\s*(\d+)";
const USED_WAYS_RE: &str = r"Used Error Way Slots:\s*\d+\s*\(([\d.]+)%\)";

/// Extracts a [`MetricSet`] from one log body.
///
/// Construct once per run; the compiled patterns are reused for every file.
pub struct MetricExtractor {
    cpu0_ipc_re: Regex,
    summary_ipc_re: Regex,
    bare_ipc_re: Regex,
    instructions_re: Regex,
    row_buffer_miss_re: Regex,
    alloc_ways_re: Regex,
    used_ways_re: Regex,
}

impl MetricExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            cpu0_ipc_re: Regex::new(CPU0_IPC_RE)?,
            summary_ipc_re: Regex::new(SUMMARY_IPC_RE)?,
            bare_ipc_re: Regex::new(BARE_IPC_RE)?,
            instructions_re: Regex::new(INSTRUCTIONS_RE)?,
            row_buffer_miss_re: Regex::new(ROW_BUFFER_MISS_RE)?,
            alloc_ways_re: Regex::new(ALLOC_WAYS_RE)?,
            used_ways_re: Regex::new(USED_WAYS_RE)?,
        })
    }

    pub fn extract(&self, text: &str) -> MetricSet {
        let ipc = self.extract_ipc(text);
        let instructions = self.extract_instructions(text);
        let row_buffer_misses_total = self.extract_row_buffer_misses(text);

        // Derived only when both inputs exist; never folded to zero.
        let rbmpki = match (row_buffer_misses_total, instructions) {
            (Some(misses), Some(instructions)) if instructions > 0 => {
                Some(misses as f64 / instructions as f64 * 1000.0)
            }
            _ => None,
        };

        let alloc_error_ways = self
            .alloc_ways_re
            .captures(text)
            .and_then(|c| c[1].parse::<u32>().ok());

        let used_way_pct = self
            .used_ways_re
            .captures(text)
            .and_then(|c| c[1].parse::<f64>().ok())
            .filter(|v| (0.0..=100.0).contains(v));

        MetricSet {
            ipc,
            instructions,
            row_buffer_misses_total,
            rbmpki,
            alloc_error_ways,
            used_way_pct,
        }
    }

    /// Canonical anchored occurrence first, then the legacy terminal
    /// summary, then the last bare occurrence anywhere in the text.
    fn extract_ipc(&self, text: &str) -> Option<f64> {
        if let Some(caps) = self.cpu0_ipc_re.captures(text) {
            return parse_positive_f64(&caps[1]);
        }
        if let Some(caps) = self.summary_ipc_re.captures(text) {
            return parse_positive_f64(&caps[2]);
        }
        self.bare_ipc_re
            .captures_iter(text)
            .last()
            .and_then(|caps| parse_positive_f64(&caps[1]))
    }

    fn extract_instructions(&self, text: &str) -> Option<u64> {
        self.instructions_re
            .captures(text)
            .and_then(|c| c[1].parse::<u64>().ok())
            .filter(|n| *n > 0)
    }

    /// Sum every per-channel ROW_BUFFER_MISS line. Zero matches means the
    /// log has no DRAM statistics section, which is `None`, not zero.
    fn extract_row_buffer_misses(&self, text: &str) -> Option<u64> {
        let mut total: Option<u64> = None;
        for caps in self.row_buffer_miss_re.captures_iter(text) {
            if let Ok(v) = caps[1].parse::<u64>() {
                *total.get_or_insert(0) += v;
            }
        }
        total
    }
}

fn parse_positive_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| *v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn extractor() -> MetricExtractor {
        MetricExtractor::new().unwrap()
    }

    #[test]
    fn anchored_ipc_wins_over_legacy_lines() {
        let text = "\
Heartbeat CPU 0 instructions: 10000000 cycles: 12000000 cumulative IPC: 0.8333\n\
CPU 0 cumulative IPC: 0.9132 instructions: 50000000 cycles: 54752070\n\
Simulation complete CPU 0 cumulative IPC: 0.9132\n";
        let m = extractor().extract(text);
        assert_eq!(m.ipc, Some(0.9132));
        assert_eq!(m.instructions, Some(50000000));
    }

    #[test]
    fn legacy_summary_line_is_second_choice() {
        let text = "\
cumulative IPC: 0.7000\n\
Simulation finished after warmup, cumulative IPC: 0.6543\n";
        let m = extractor().extract(text);
        assert_eq!(m.ipc, Some(0.6543));
        // No anchored line, so no instruction count either.
        assert_eq!(m.instructions, None);
    }

    #[test]
    fn bare_fallback_takes_last_occurrence() {
        let text = "cumulative IPC: 0.5\nsome text\ncumulative IPC: 0.75\n";
        assert_eq!(extractor().extract(text).ipc, Some(0.75));
    }

    #[test]
    fn missing_ipc_is_absent() {
        let m = extractor().extract("no summary lines here\n");
        assert_eq!(m.ipc, None);
        assert_eq!(m.instructions, None);
    }

    #[test]
    fn row_buffer_misses_sum_over_channels() {
        let text = "\
DRAM Statistics\n\
 ROW_BUFFER_HIT: 400\n\
 ROW_BUFFER_MISS: 120\n\
Channel 1\n\
 ROW_BUFFER_MISS: 80\n";
        let m = extractor().extract(text);
        assert_eq!(m.row_buffer_misses_total, Some(200));
    }

    #[test]
    fn no_dram_section_means_absent_not_zero() {
        let m = extractor().extract("CPU 0 cumulative IPC: 1.1 instructions: 1000 cycles: 909\n");
        assert_eq!(m.row_buffer_misses_total, None);
        assert_eq!(m.rbmpki, None);
    }

    #[test]
    fn rbmpki_from_misses_and_instructions() {
        let text = "\
CPU 0 cumulative IPC: 1.25 instructions: 50000 cycles: 40000\n\
 ROW_BUFFER_MISS: 120\n\
 ROW_BUFFER_MISS: 80\n";
        let m = extractor().extract(text);
        assert_eq!(m.rbmpki, Some(4.0));
    }

    #[test]
    fn cache_way_stats() {
        let text = "\
Allocated Error Ways per Set: 3\n\
Used Error Way Slots: 42 (87.5%)\n";
        let m = extractor().extract(text);
        assert_eq!(m.alloc_error_ways, Some(3));
        assert_eq!(m.used_way_pct, Some(87.5));
    }

    #[test]
    fn used_way_pct_outside_range_is_dropped() {
        let over = extractor().extract("Used Error Way Slots: 42 (150.0%)\n");
        assert_eq!(over.used_way_pct, None);

        // 0 and 100 are valid readings, not sentinels.
        let full = extractor().extract("Used Error Way Slots: 48 (100.0%)\n");
        assert_eq!(full.used_way_pct, Some(100.0));
        let empty = extractor().extract("Used Error Way Slots: 0 (0.0%)\n");
        assert_eq!(empty.used_way_pct, Some(0.0));
    }

    #[test]
    fn empty_text_yields_empty_set() {
        assert_eq!(extractor().extract(""), MetricSet::default());
    }
}
