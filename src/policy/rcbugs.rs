//! Release-critical bug regression policy for source migrations.
//!
//! The policy reads the RC bug lists of the source and target suites
//! (maintained externally, one `BugsV` file per suite directory) and
//! blocks any candidate that would introduce an RC bug the target suite
//! does not already have.

use crate::archive::SuiteTables;
use crate::error::Result;
use crate::policy::{Policy, PolicyInfo, PolicyVerdict, RcBugsInfo};
use crate::types::SourceRecord;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

/// Basename of the bug list file in each suite directory.
const BUGS_FILE: &str = "BugsV";

/// RC-bug regression gate.
pub struct RcBugPolicy {
    /// Directory holding the source suite's bug file.
    source_dir: PathBuf,
    /// Directory holding the target suite's bug file.
    target_dir: PathBuf,
    /// Bugs per package in the source suite.
    bugs_source: HashMap<String, BTreeSet<String>>,
    /// Bugs per package in the target suite.
    bugs_target: HashMap<String, BTreeSet<String>>,
}

impl RcBugPolicy {
    /// Create the policy; bug files are loaded by
    /// [`initialise`](Policy::initialise).
    #[must_use]
    pub fn new(source_dir: &Path, target_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            target_dir: target_dir.to_path_buf(),
            bugs_source: HashMap::new(),
            bugs_target: HashMap::new(),
        }
    }

    /// What: Read one suite's RC bug summary.
    ///
    /// Inputs:
    /// - `basedir`: Suite directory holding the `BugsV` file.
    ///
    /// Output:
    /// - Returns the bug sets keyed by package name; empty when the file
    ///   is missing.
    ///
    /// Details:
    /// - Lines are `<package> <bug>[,<bug>...]`; lines that do not split
    ///   into exactly two fields are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::Io` when an existing file cannot be
    /// read.
    fn read_bugs(basedir: &Path) -> Result<HashMap<String, BTreeSet<String>>> {
        let mut bugs: HashMap<String, BTreeSet<String>> = HashMap::new();
        let path = basedir.join(BUGS_FILE);
        if !path.exists() {
            tracing::warn!("No RC bug data at {}, assuming no bugs", path.display());
            return Ok(bugs);
        }
        tracing::info!("Loading RC bugs data from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 2 {
                tracing::warn!("Malformed line found in line {:?}", line);
                continue;
            }
            bugs.entry(fields[0].to_string())
                .or_default()
                .extend(fields[1].split(',').map(ToString::to_string));
        }
        Ok(bugs)
    }
}

impl Policy for RcBugPolicy {
    fn initialise(&mut self, _tables: &SuiteTables) -> Result<()> {
        self.bugs_source = Self::read_bugs(&self.source_dir)?;
        self.bugs_target = Self::read_bugs(&self.target_dir)?;
        Ok(())
    }

    /// Blocks a candidate whose bug set is not covered by the target
    /// suite's: a bug only on the source side would regress the target.
    fn apply_policy(
        &mut self,
        info: &mut PolicyInfo,
        _suite: &str,
        source_name: &str,
        target_record: Option<&SourceRecord>,
        source_record: &SourceRecord,
    ) -> PolicyVerdict {
        let mut bugs_u: BTreeSet<String> = BTreeSet::new();
        let mut bugs_t: BTreeSet<String> = BTreeSet::new();

        for key in [source_name.to_string(), format!("src:{source_name}")] {
            if target_record.is_some()
                && let Some(bugs) = self.bugs_target.get(&key)
            {
                bugs_t.extend(bugs.iter().cloned());
            }
            if let Some(bugs) = self.bugs_source.get(&key) {
                bugs_u.extend(bugs.iter().cloned());
            }
        }

        for (binary, _) in &source_record.binaries {
            if let Some(bugs) = self.bugs_source.get(binary) {
                bugs_u.extend(bugs.iter().cloned());
            }
        }
        if let Some(target) = target_record {
            for (binary, _) in &target.binaries {
                if let Some(bugs) = self.bugs_target.get(binary) {
                    bugs_t.extend(bugs.iter().cloned());
                }
            }
        }

        info.rc_bugs = Some(RcBugsInfo {
            shared_bugs: bugs_u.intersection(&bugs_t).cloned().collect(),
            unique_source_bugs: bugs_u.difference(&bugs_t).cloned().collect(),
            unique_target_bugs: bugs_t.difference(&bugs_u).cloned().collect(),
        });

        if bugs_u.is_empty() || bugs_u.is_subset(&bugs_t) {
            return PolicyVerdict::Pass;
        }
        PolicyVerdict::RejectedPermanently
    }
}
