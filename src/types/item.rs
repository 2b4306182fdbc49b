//! Migration item parsing and formatting.
//!
//! A migration item names one unit of migration in solver input: a package,
//! optionally qualified with an architecture and a version, a suite, and a
//! migration direction (a leading `-` denotes a removal from the target
//! suite).

use crate::error::{MigrationToolkitError, Result};
use crate::types::package::{SOURCE_SUITE, SourceRecord, TARGET_SUITE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One unit of migration in solver input.
///
/// Items are parsed from strings of the form `[-]pkg[_suite][/arch][/ver]`;
/// the versioned form carries `/ver`, the unversioned form omits it.
/// Removal items are always scoped to the target suite regardless of the
/// parsed suite field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MigrationItem {
    /// Raw item string as given.
    name: String,
    /// Package name with decorations stripped.
    package: String,
    /// Parsed version, when the item is versioned.
    version: Option<String>,
    /// Architecture field; `"source"` when the item names a source migration.
    architecture: String,
    /// Suite the item migrates from.
    suite: String,
    /// Unversioned display name (`pkg` or `pkg/arch`).
    uvname: String,
    /// Whether this item was parsed in versioned form.
    versioned: bool,
}

impl MigrationItem {
    /// What: Parse an unversioned migration item string.
    ///
    /// Inputs:
    /// - `name`: Item string of the form `[-]pkg[_suite][/arch]`.
    ///
    /// Output:
    /// - Returns the parsed `MigrationItem` (never versioned).
    ///
    /// Details:
    /// - A second `/`-separated field is taken as the architecture;
    ///   otherwise the architecture is `"source"`.
    /// - A `_suite` suffix on the package field rebinds the suite
    ///   (default `"unstable"`); removals are anchored to `"testing"`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Self::parse_parts(name, false)
    }

    /// What: Parse a versioned migration item string.
    ///
    /// Inputs:
    /// - `name`: Item string of the form `[-]pkg[_suite][/arch]/ver`.
    ///
    /// Output:
    /// - Returns the parsed `MigrationItem` (versioned).
    ///
    /// Details:
    /// - With two `/`-separated fields the second is the version and the
    ///   architecture is `"source"`; with three, the second is the
    ///   architecture and the third the version.
    #[must_use]
    pub fn parse_versioned(name: &str) -> Self {
        Self::parse_parts(name, true)
    }

    /// Shared parse logic for the versioned and unversioned forms.
    fn parse_parts(name: &str, versioned: bool) -> Self {
        let value = name.strip_prefix('-').unwrap_or(name);
        let parts: Vec<&str> = value.splitn(3, '/').collect();

        let (package, mut suite) = match parts[0].split_once('_') {
            Some((pkg, suite)) => (pkg.to_string(), suite.to_string()),
            None => (parts[0].to_string(), SOURCE_SUITE.to_string()),
        };

        let (architecture, version) = if versioned && parts.len() > 1 {
            if parts.len() == 3 {
                (parts[1].to_string(), Some(parts[2].to_string()))
            } else {
                ("source".to_string(), Some(parts[1].to_string()))
            }
        } else if parts.len() >= 2 {
            (parts[1].to_string(), None)
        } else {
            ("source".to_string(), None)
        };

        // An `arch_suite` architecture field rebinds only the suite; the
        // architecture keeps its composite value.
        if let Some((_, arch_suite)) = architecture.split_once('_') {
            suite = arch_suite.to_string();
        }

        let is_removal = name.starts_with('-');
        if is_removal {
            suite = TARGET_SUITE.to_string();
        }

        // The unversioned display name keeps the removal marker.
        let uvname = if versioned {
            let raw_parts: Vec<&str> = name.splitn(3, '/').collect();
            if raw_parts.len() == 1 || architecture == "source" {
                raw_parts[0].to_string()
            } else {
                format!("{}/{}", raw_parts[0], raw_parts[1])
            }
        } else {
            name.to_string()
        };

        Self {
            name: name.to_string(),
            package,
            version,
            architecture,
            suite,
            uvname,
            versioned,
        }
    }

    /// Raw item string as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Package name with the removal marker and suite suffix stripped.
    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Parsed version, when the item is versioned.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Architecture field; `"source"` for source migrations.
    #[must_use]
    pub fn architecture(&self) -> &str {
        &self.architecture
    }

    /// Suite the item migrates from.
    #[must_use]
    pub fn suite(&self) -> &str {
        &self.suite
    }

    /// Unversioned display name.
    #[must_use]
    pub fn uvname(&self) -> &str {
        &self.uvname
    }

    /// Whether the item denotes a removal from the target suite.
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.name.starts_with('-')
    }
}

impl fmt::Display for MigrationItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.versioned && self.version.is_some() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}", self.uvname)
        }
    }
}

impl PartialEq for MigrationItem {
    fn eq(&self, other: &Self) -> bool {
        self.package == other.package
            && self.version == other.version
            && self.architecture == other.architecture
            && self.suite == other.suite
            && self.is_removal() == other.is_removal()
    }
}

impl Eq for MigrationItem {}

impl std::hash::Hash for MigrationItem {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.package.hash(state);
        self.version.hash(state);
        self.architecture.hash(state);
        self.suite.hash(state);
        self.is_removal().hash(state);
    }
}

/// What: Convert a textual package specification into a versioned migration item.
///
/// Inputs:
/// - `package`: Unversioned item string (e.g., `"foo"` or `"foo/amd64"`).
/// - `sources`: Source tables per suite, used to look up the version.
///
/// Output:
/// - Returns a versioned `MigrationItem` carrying the version found in the
///   item's suite.
///
/// Details:
/// - The item string is parsed in unversioned form first to determine the
///   package and suite, then rebuilt as `uvname/version`.
///
/// # Errors
///
/// Returns `MigrationToolkitError::MissingRecord` when the item's suite has
/// no source record for the package.
pub fn make_migration_item(
    package: &str,
    sources: &HashMap<String, HashMap<String, SourceRecord>>,
) -> Result<MigrationItem> {
    let item = MigrationItem::parse(package);
    let version = sources
        .get(item.suite())
        .and_then(|table| table.get(item.package()))
        .map(|record| record.version.clone())
        .ok_or_else(|| MigrationToolkitError::MissingRecord {
            kind: "source",
            name: item.package().to_string(),
            suite: item.suite().to_string(),
        })?;
    Ok(MigrationItem::parse_versioned(&format!(
        "{}/{version}",
        item.uvname()
    )))
}
