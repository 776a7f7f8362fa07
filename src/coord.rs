//! Filename grammar for simulator result files.
//!
//! Every result file encodes its experiment coordinates in the name:
//!
//! champsim_[<llc>mb_]<page>_error_<capacity>_<rate>[_cache_pinning]_<trace>.txt
//! champsim_[<llc>mb_]<page>_<capacity>_<trace>.txt            (baseline run)
//!
//! Examples:
//! champsim_4mb_2mb_error_32gb_1e-7_cache_pinning_429.mcf-s0.txt
//! champsim_4kb_32gb_401.bzip2-1.txt
//!
//! Result directories commonly hold unrelated files; a name that does not
//! match the grammar is an expected skip, not an error.

use crate::Result;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Virtual-memory page size dimension of the experiment space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PageSize {
    #[serde(rename = "4kb")]
    Kb4,
    #[serde(rename = "2mb")]
    Mb2,
}

impl PageSize {
    pub fn as_str(self) -> &'static str {
        match self {
            PageSize::Kb4 => "4kb",
            PageSize::Mb2 => "2mb",
        }
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coordinates of one simulation run, recovered from its filename.
///
/// `error_rate` is `None` for baseline runs (no injected errors); `pinning`
/// is only meaningful when an error rate is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExperimentCoordinate {
    pub page_size: PageSize,
    /// LLC size in MB. Filenames predating the LLC sweep omit the token;
    /// those runs used the default 2MB cache.
    pub llc_size_mb: u32,
    /// Opaque capacity token ("32gb", "128gb", ...), compared by equality.
    pub capacity: String,
    pub error_rate: Option<String>,
    pub pinning: bool,
    /// Normalized workload id, `<number>.<name>` where the trace follows
    /// that convention, otherwise the raw trace token.
    pub workload: String,
    /// Raw trace token, kept for display and debugging.
    pub trace: String,
}

impl ExperimentCoordinate {
    /// True for runs with no injected error rate.
    pub fn is_baseline(&self) -> bool {
        self.error_rate.is_none()
    }
}

// Filename grammar. The LLC group is optional (older runs predate the LLC
// sweep); the error_ branch must be tried before the bare-capacity branch.
const FILE_RE: &str = r"^champsim_(?:(?P<llc>[248])mb_)?(?P<page>4kb|2mb)_(?:error_(?P<ecap>[^_]+)_(?P<rate>1e-\d+)(?P<pin>_cache_pinning)?|(?P<cap>[^_]+))_(?P<trace>.+)\.txt$";

// Workload display name: leading `<digits>.<name>`, name ends at the first
// `-` or `_`. Traces that do not follow the convention keep their raw token.
const WORKLOAD_RE: &str = r"^(\d+\.[^-_]+)";

/// Parses filenames into experiment coordinates.
///
/// Construct once per run; the compiled patterns are reused for every file.
pub struct CoordinateParser {
    file_re: Regex,
    workload_re: Regex,
}

impl CoordinateParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            file_re: Regex::new(FILE_RE)?,
            workload_re: Regex::new(WORKLOAD_RE)?,
        })
    }

    /// Parse a bare filename (no directory components). Returns `None` for
    /// anything outside the grammar.
    pub fn parse(&self, filename: &str) -> Option<ExperimentCoordinate> {
        let caps = self.file_re.captures(filename)?;

        let llc_size_mb = caps
            .name("llc")
            .and_then(|m| m.as_str().parse::<u32>().ok())
            .unwrap_or(2);

        let page_size = match caps.name("page")?.as_str() {
            "4kb" => PageSize::Kb4,
            _ => PageSize::Mb2,
        };

        // The two branches bind capacity to different groups.
        let (capacity, error_rate, pinning) = match caps.name("ecap") {
            Some(cap) => (
                cap.as_str().to_string(),
                Some(caps.name("rate")?.as_str().to_string()),
                caps.name("pin").is_some(),
            ),
            None => (caps.name("cap")?.as_str().to_string(), None, false),
        };

        let trace = caps.name("trace")?.as_str().to_string();
        let workload = self
            .workload_re
            .captures(&trace)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| trace.clone());

        Some(ExperimentCoordinate {
            page_size,
            llc_size_mb,
            capacity,
            error_rate,
            pinning,
            workload,
            trace,
        })
    }
}
