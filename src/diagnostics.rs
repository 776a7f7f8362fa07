//! Stderr diagnostics with uniform prefixes.
//!
//! Parse-level absences are not diagnostics (they are represented as `None`
//! in the metric set); these helpers are for per-file skips and operator
//! errors only.

/// Print a non-fatal warning. The batch continues after every warning.
pub fn warn(msg: impl AsRef<str>) {
    eprintln!("WARN: {}", msg.as_ref());
}

/// Format an error message for bail!/Context call sites.
pub fn error_message(msg: impl AsRef<str>) -> String {
    format!("ERROR: {}", msg.as_ref())
}
