//! Environment variable configuration for migration-toolkit.
//!
//! This module provides utilities for reading configuration from environment
//! variables, allowing runtime adjustments without code changes.

/// What: Read the solver trace level from the `BRITNEY_DEBUG` environment variable.
///
/// Inputs: None
///
/// Output:
/// - `u32` trace level; `0` (tracing disabled) when the variable is unset or invalid
///
/// Details:
/// - Reads `BRITNEY_DEBUG` as an integer
/// - Invalid values are silently ignored (returns `0`)
/// - Any value greater than `0` enables the migration solver's ordering traces
#[must_use]
pub fn solver_debug() -> u32 {
    std::env::var("BRITNEY_DEBUG")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(0)
}
