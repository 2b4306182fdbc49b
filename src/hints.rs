//! Administrator hint parsing and lookup.
//!
//! Hints are administrator-supplied overrides that influence the policy
//! gates and the migration solver. A hint line has the shape
//! `type pkg[/arch][/ver] [pkg...]`, or `age-days N pkg/ver ...` for the
//! aging override. Hints whose items violate the version-presence rule for
//! their type are logged and discarded, never applied.

use crate::error::{MigrationToolkitError, Result};
use crate::types::MigrationItem;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Hint types whose items must not carry a version.
pub const NO_VERSION: &[&str] = &["block", "block-all", "block-udeb"];

/// A single parsed hint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Hint {
    /// Hint type (e.g., `"urgent"`, `"block"`, `"age-days"`).
    htype: String,
    /// Items the hint applies to.
    packages: Vec<MigrationItem>,
    /// Day count for `age-days` hints.
    days: Option<u32>,
    /// Administrator who supplied the hint.
    user: String,
    /// Whether the hint is currently active.
    active: bool,
    /// Raw hint line as given.
    raw: String,
}

impl Hint {
    /// What: Parse a hint line.
    ///
    /// Inputs:
    /// - `line`: Hint line of the form `type item [item...]` or
    ///   `age-days N item [item...]`.
    /// - `user`: Administrator who supplied the hint.
    ///
    /// Output:
    /// - Returns the parsed `Hint`, active by default.
    ///
    /// Details:
    /// - Items are parsed as versioned migration items.
    /// - Types in [`NO_VERSION`] require all items to be unversioned; every
    ///   other type requires all items to carry a version.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::Parse` when the line is empty, has no
    /// items, carries a malformed day count, or violates the
    /// version-presence rule for its type.
    pub fn parse(line: &str, user: &str) -> Result<Self> {
        let mut fields = line.split_whitespace();
        let htype = fields
            .next()
            .ok_or_else(|| MigrationToolkitError::Parse(format!("empty hint: {line:?}")))?
            .to_string();

        let days = if htype == "age-days" {
            let raw_days = fields.next().ok_or_else(|| {
                MigrationToolkitError::Parse(format!("age-days hint without day count: {line:?}"))
            })?;
            let parsed = raw_days.parse::<u32>().map_err(|_| {
                MigrationToolkitError::Parse(format!("bad day count {raw_days:?} in hint {line:?}"))
            })?;
            Some(parsed)
        } else {
            None
        };

        let packages: Vec<MigrationItem> =
            fields.map(MigrationItem::parse_versioned).collect();
        if packages.is_empty() {
            return Err(MigrationToolkitError::Parse(format!(
                "hint without items: {line:?}"
            )));
        }

        let hint = Self {
            htype,
            packages,
            days,
            user: user.to_string(),
            active: true,
            raw: line.to_string(),
        };
        hint.check()?;
        Ok(hint)
    }

    /// Validate the version-presence rule for this hint's type.
    fn check(&self) -> Result<()> {
        for package in &self.packages {
            let versioned = package.version().is_some();
            if NO_VERSION.contains(&self.htype.as_str()) {
                if versioned {
                    return Err(MigrationToolkitError::Parse(format!(
                        "hint {:?} must not carry a version: {}",
                        self.htype, package
                    )));
                }
            } else if !versioned {
                return Err(MigrationToolkitError::Parse(format!(
                    "hint {:?} requires a version: {}",
                    self.htype, package
                )));
            }
        }
        Ok(())
    }

    /// Hint type.
    #[must_use]
    pub fn hint_type(&self) -> &str {
        &self.htype
    }

    /// Items the hint applies to.
    #[must_use]
    pub fn packages(&self) -> &[MigrationItem] {
        &self.packages
    }

    /// Day count for `age-days` hints.
    #[must_use]
    pub fn days(&self) -> Option<u32> {
        self.days
    }

    /// Administrator who supplied the hint.
    #[must_use]
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Whether the hint is currently active.
    #[must_use]
    pub fn active(&self) -> bool {
        self.active
    }

    /// Activate or deactivate the hint.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Package name of the first item.
    #[must_use]
    pub fn package(&self) -> Option<&str> {
        self.packages.first().map(MigrationItem::package)
    }

    /// Version of the first item.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.packages.first().and_then(MigrationItem::version)
    }
}

impl fmt::Display for Hint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl PartialEq for Hint {
    /// Two hints are equal when their type, day count (for `age-days`) and
    /// item sets match; user and raw text are not compared.
    fn eq(&self, other: &Self) -> bool {
        if self.htype != other.htype {
            return false;
        }
        if self.htype == "age-days" && self.days != other.days {
            return false;
        }
        let ours: HashSet<&MigrationItem> = self.packages.iter().collect();
        let theirs: HashSet<&MigrationItem> = other.packages.iter().collect();
        ours == theirs
    }
}

impl Eq for Hint {}

/// Store of parsed hints with a query API.
#[derive(Clone, Debug, Default)]
pub struct HintCollection {
    /// Accepted hints in insertion order.
    hints: Vec<Hint>,
}

impl HintCollection {
    /// Create an empty hint collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Parse a hint line and add it to the collection.
    ///
    /// Inputs:
    /// - `line`: Raw hint line.
    /// - `user`: Administrator who supplied the hint.
    ///
    /// Output: None
    ///
    /// Details:
    /// - Broken hints (version-presence violations, malformed day counts)
    ///   are logged and discarded; they never reach the query API.
    pub fn add_hint(&mut self, line: &str, user: &str) {
        match Hint::parse(line, user) {
            Ok(hint) => self.hints.push(hint),
            Err(e) => {
                tracing::warn!("Ignoring broken hint {:?} from {}: {}", line, user, e);
            }
        }
    }

    /// What: Search the collection for matching hints.
    ///
    /// Inputs:
    /// - `htype`: Hint type to match, or `None` for any.
    /// - `package`: Package name of the first item to match, or `None`.
    /// - `version`: Version of the first item to match, or `None`.
    /// - `removal`: Removal flag of the first item to match, or `None`.
    /// - `only_active`: Whether to restrict results to active hints.
    ///
    /// Output:
    /// - Returns all hints matching every given criterion, in insertion order.
    ///
    /// Details:
    /// - `package`, `version` and `removal` compare against the hint's first
    ///   item only, matching how hints are applied.
    #[must_use]
    pub fn search(
        &self,
        htype: Option<&str>,
        package: Option<&str>,
        version: Option<&str>,
        removal: Option<bool>,
        only_active: bool,
    ) -> Vec<&Hint> {
        self.hints
            .iter()
            .filter(|hint| {
                htype.is_none_or(|t| t == hint.htype)
                    && (hint.active || !only_active)
                    && package.is_none_or(|p| Some(p) == hint.package())
                    && version.is_none_or(|v| Some(v) == hint.version())
                    && removal.is_none_or(|r| {
                        hint.packages
                            .first()
                            .is_some_and(|item| item.is_removal() == r)
                    })
            })
            .collect()
    }

    /// Number of accepted hints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hints.len()
    }

    /// Whether the collection holds no hints.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hints.is_empty()
    }
}
