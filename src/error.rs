//! Unified error type for migration-toolkit.

use thiserror::Error;

/// Unified error type for all migration-toolkit operations.
///
/// This error type covers all possible failure modes across different modules,
/// providing clear, actionable error messages.
#[derive(Error, Debug)]
pub enum MigrationToolkitError {
    /// A package tuple was referenced that is not part of the loaded universe.
    #[error("Package not in universe: {0}")]
    NotInUniverse(String),

    /// The age policy was configured with a default urgency that has no
    /// minimum-days entry.
    #[error("Missing age-requirement for default urgency: {0}")]
    MissingDefaultUrgency(String),

    /// A migration referenced a source or binary record that does not exist
    /// in the expected suite table.
    #[error("Missing {kind} record for {name} in suite {suite}")]
    MissingRecord {
        /// Kind of record that was missing ("source" or "binary").
        kind: &'static str,
        /// Name of the missing record.
        name: String,
        /// Suite that was expected to contain the record.
        suite: String,
    },

    /// Custom parsing error with message.
    #[error("Parse error: {0}")]
    Parse(String),

    /// I/O error while reading or writing a state file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for migration-toolkit operations.
pub type Result<T> = std::result::Result<T, MigrationToolkitError>;
