//! Configurable aging policy for source migrations.
//!
//! The age policy lets packages sit in the source suite for a number of
//! days (determined by their upload urgency) before they may migrate.
//! Urgencies are sticky: the most urgent one seen for a version wins. Two
//! state files are involved: the urgency file (maintained externally) and
//! the dates file (maintained by this policy), which records when each
//! source version was first seen.
//!
//! Days are whole "archive days", each beginning at 15:00 UTC, so a run
//! shortly after midnight does not count a fresh calendar day.

use crate::archive::SuiteTables;
use crate::error::{MigrationToolkitError, Result};
use crate::hints::HintCollection;
use crate::policy::{AgeInfo, AgeRequirementChange, Policy, PolicyInfo, PolicyVerdict, UrgencyChange};
use crate::types::{SOURCE_SUITE, SourceRecord, TARGET_SUITE};
use crate::version::compare_versions;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Basename of the dates state file in the state directory.
const DATES_FILE: &str = "age-policy-dates";

/// Basename of the legacy dates file in the target-suite directory.
const LEGACY_DATES_FILE: &str = "Dates";

/// Basename of the urgency file in the target-suite directory.
const URGENCY_FILE: &str = "Urgency";

/// Aging policy gate.
///
/// Construction fails when the default urgency has no minimum-days entry;
/// [`initialise`](Policy::initialise) loads the dates and urgency state
/// files and [`save_state`](Policy::save_state) writes the dates file
/// back.
pub struct AgePolicy {
    /// Minimum age in days per urgency.
    min_days: HashMap<String, u32>,
    /// Urgency used when a source has none recorded.
    default_urgency: String,
    /// Minimum age of the default urgency.
    min_days_default: u32,
    /// The current archive day.
    date_now: i64,
    /// First-seen day per source: `name -> (version, day)`.
    dates: HashMap<String, (String, i64)>,
    /// Sticky urgency per source.
    urgencies: HashMap<String, String>,
    /// State directory holding the dates file, when configured.
    state_dir: Option<PathBuf>,
    /// Target-suite directory holding the urgency file and the legacy
    /// dates file.
    target_dir: PathBuf,
    /// Administrator hints (`urgent`, `age-days`).
    hints: HintCollection,
}

impl AgePolicy {
    /// What: Create the aging policy.
    ///
    /// Inputs:
    /// - `min_days`: Minimum age in days per urgency name.
    /// - `default_urgency`: Urgency applied to sources without one.
    /// - `target_dir`: Directory holding the urgency file (and the legacy
    ///   dates file).
    /// - `state_dir`: Directory holding the dates file; when `None`, the
    ///   legacy location in `target_dir` is used for writes too.
    /// - `hints`: Administrator hints consulted for `age-days` and
    ///   `urgent` overrides.
    ///
    /// Output:
    /// - Returns the policy with the current archive day pinned.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::MissingDefaultUrgency` when
    /// `default_urgency` has no entry in `min_days`.
    pub fn new(
        min_days: HashMap<String, u32>,
        default_urgency: &str,
        target_dir: &Path,
        state_dir: Option<&Path>,
        hints: HintCollection,
    ) -> Result<Self> {
        let min_days_default = *min_days.get(default_urgency).ok_or_else(|| {
            MigrationToolkitError::MissingDefaultUrgency(default_urgency.to_string())
        })?;
        Ok(Self {
            min_days,
            default_urgency: default_urgency.to_string(),
            min_days_default,
            date_now: current_day(),
            dates: HashMap::new(),
            urgencies: HashMap::new(),
            state_dir: state_dir.map(Path::to_path_buf),
            target_dir: target_dir.to_path_buf(),
            hints,
        })
    }

    /// Pin the current archive day, for reproducible runs.
    pub fn set_current_day(&mut self, day: i64) {
        self.date_now = day;
    }

    /// First-seen table: `source -> (version, day)`.
    #[must_use]
    pub fn dates(&self) -> &HashMap<String, (String, i64)> {
        &self.dates
    }

    /// Sticky urgency table.
    #[must_use]
    pub fn urgencies(&self) -> &HashMap<String, String> {
        &self.urgencies
    }

    /// Path of the dates file, with the legacy fallback applied for reads.
    fn dates_path_for_read(&self) -> PathBuf {
        let legacy = self.target_dir.join(LEGACY_DATES_FILE);
        match &self.state_dir {
            Some(dir) => {
                let primary = dir.join(DATES_FILE);
                if !primary.exists() && legacy.exists() {
                    legacy
                } else {
                    primary
                }
            }
            None => legacy,
        }
    }

    /// What: Load the dates file.
    ///
    /// Inputs: None
    ///
    /// Output:
    /// - Returns `Ok(())`; a missing file (in both locations) is an empty
    ///   state, not an error.
    ///
    /// Details:
    /// - Lines are `<source> <version> <day>`; malformed or non-integer
    ///   lines are skipped silently.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::Io` when an existing file cannot be
    /// read.
    fn read_dates_file(&mut self) -> Result<()> {
        let path = self.dates_path_for_read();
        if !path.exists() {
            tracing::debug!("No dates file at {}, starting empty", path.display());
            return Ok(());
        }
        let content = std::fs::read_to_string(&path)?;
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                continue;
            }
            if let Ok(day) = fields[2].parse::<i64>() {
                self.dates
                    .insert(fields[0].to_string(), (fields[1].to_string(), day));
            }
        }
        tracing::info!(
            "Loaded {} date entries from {}",
            self.dates.len(),
            path.display()
        );
        Ok(())
    }

    /// What: Load the urgency file, keeping the most urgent value per source.
    ///
    /// Inputs:
    /// - `tables`: Suite tables, for the staleness checks.
    ///
    /// Output:
    /// - Returns `Ok(())`; a missing file leaves the table empty.
    ///
    /// Details:
    /// - Lines are `<source> <version> <urgency>`; malformed lines are
    ///   skipped silently.
    /// - Urgencies are monotone toward lower age requirements: an entry
    ///   never replaces one with a lower minimum.
    /// - Stale entries are rejected: a version not above the target
    ///   suite's, or above the source suite's, is ignored.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::Io` when an existing file cannot be
    /// read.
    fn read_urgencies_file(&mut self, tables: &SuiteTables) -> Result<()> {
        let path = self.target_dir.join(URGENCY_FILE);
        if !path.exists() {
            tracing::debug!("No urgency file at {}, using defaults", path.display());
            return Ok(());
        }
        let content = std::fs::read_to_string(&path)?;
        for line in content.lines() {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() != 3 {
                continue;
            }
            let (source, version, urgency) = (fields[0], fields[1], fields[2]);

            let old_min = self
                .urgencies
                .get(source)
                .and_then(|u| self.min_days.get(u))
                .copied()
                .unwrap_or(1000);
            let new_min = self
                .min_days
                .get(urgency)
                .copied()
                .unwrap_or(self.min_days_default);
            if old_min <= new_min {
                // The recorded urgency is already at least as urgent.
                continue;
            }

            if let Some(target) = tables
                .sources
                .get(TARGET_SUITE)
                .and_then(|table| table.get(source))
                && compare_versions(&target.version, version) != Ordering::Less
            {
                continue;
            }
            match tables
                .sources
                .get(SOURCE_SUITE)
                .and_then(|table| table.get(source))
            {
                Some(record) if compare_versions(&record.version, version) != Ordering::Less => {}
                _ => continue,
            }

            self.urgencies
                .insert(source.to_string(), urgency.to_string());
        }
        Ok(())
    }

    /// What: Write the dates file atomically.
    ///
    /// Inputs: None
    ///
    /// Output:
    /// - Returns `Ok(())` once the file has been renamed into place.
    ///
    /// Details:
    /// - Entries are written name-sorted to `<basename>_new`, which is
    ///   then renamed over the final path.
    /// - When a state directory is configured, a leftover legacy dates
    ///   file is removed after a successful write.
    ///
    /// # Errors
    ///
    /// Returns `MigrationToolkitError::Io` when the file cannot be written
    /// or renamed.
    fn write_dates_file(&self) -> Result<()> {
        let (directory, basename) = match &self.state_dir {
            Some(dir) => (dir.clone(), DATES_FILE),
            None => (self.target_dir.clone(), LEGACY_DATES_FILE),
        };
        let path = directory.join(basename);
        let tmp_path = directory.join(format!("{basename}_new"));

        let mut file = std::fs::File::create(&tmp_path)?;
        let mut names: Vec<&String> = self.dates.keys().collect();
        names.sort_unstable();
        for name in names {
            let (version, day) = &self.dates[name];
            writeln!(file, "{name} {version} {day}")?;
        }
        file.sync_all()?;
        std::fs::rename(&tmp_path, &path)?;

        if self.state_dir.is_some() {
            let legacy = self.target_dir.join(LEGACY_DATES_FILE);
            if legacy.exists() {
                tracing::info!("Removing old dates file {}", legacy.display());
                std::fs::remove_file(&legacy)?;
            }
        }
        Ok(())
    }
}

impl Policy for AgePolicy {
    fn initialise(&mut self, tables: &SuiteTables) -> Result<()> {
        self.read_dates_file()?;
        self.read_urgencies_file(tables)
    }

    fn save_state(&mut self) -> Result<()> {
        self.write_dates_file()
    }

    fn apply_policy(
        &mut self,
        info: &mut PolicyInfo,
        _suite: &str,
        source_name: &str,
        target_record: Option<&SourceRecord>,
        source_record: &SourceRecord,
    ) -> PolicyVerdict {
        let age_info = info.age.get_or_insert_with(AgeInfo::default);
        let mut urgency = self
            .urgencies
            .get(source_name)
            .unwrap_or(&self.default_urgency)
            .clone();

        if !self.min_days.contains_key(&urgency) {
            age_info.unknown_urgency = Some(urgency.clone());
            urgency = self.default_urgency.clone();
        }

        // A package new to the target suite never ages faster than the
        // default urgency allows.
        if target_record.is_none()
            && self.min_days.get(&urgency).copied().unwrap_or(self.min_days_default)
                < self.min_days_default
        {
            age_info.urgency_reduced = Some(UrgencyChange {
                from: urgency.clone(),
                to: self.default_urgency.clone(),
            });
            urgency = self.default_urgency.clone();
        }

        let reset = match self.dates.get(source_name) {
            Some((version, _)) => version != &source_record.version,
            None => true,
        };
        if reset {
            self.dates.insert(
                source_name.to_string(),
                (source_record.version.clone(), self.date_now),
            );
        }

        let days_old = self.date_now - self.dates.get(source_name).map_or(self.date_now, |d| d.1);
        let mut min_days = self
            .min_days
            .get(&urgency)
            .copied()
            .unwrap_or(self.min_days_default);
        age_info.age_requirement = min_days;
        age_info.current_age = days_old;

        for hint in self
            .hints
            .search(Some("age-days"), Some(source_name), None, None, true)
        {
            if hint.version() != Some(source_record.version.as_str()) {
                continue;
            }
            let new_requirement = hint.days().unwrap_or(0);
            age_info.age_requirement_reduced = Some(AgeRequirementChange {
                new_requirement,
                changed_by: hint.user().to_string(),
            });
            min_days = new_requirement;
        }

        if days_old < i64::from(min_days) {
            let urgent_hint = self
                .hints
                .search(Some("urgent"), Some(source_name), None, None, true)
                .into_iter()
                .find(|hint| hint.version() == Some(source_record.version.as_str()));
            if let Some(hint) = urgent_hint {
                age_info.age_requirement_reduced = Some(AgeRequirementChange {
                    new_requirement: 0,
                    changed_by: hint.user().to_string(),
                });
                return PolicyVerdict::PassHinted;
            }
            return PolicyVerdict::RejectedTemporarily;
        }

        PolicyVerdict::Pass
    }
}

/// The current archive day: whole days since the epoch, each starting at
/// 15:00 UTC.
fn current_day() -> i64 {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(0))
        .unwrap_or(0);
    (seconds / 3600 - 15).div_euclid(24)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn min_days() -> HashMap<String, u32> {
        HashMap::from([
            ("low".to_string(), 10),
            ("medium".to_string(), 5),
            ("high".to_string(), 2),
        ])
    }

    fn source(version: &str) -> SourceRecord {
        SourceRecord {
            version: version.to_string(),
            ..SourceRecord::default()
        }
    }

    fn policy_in(dir: &Path, hints: HintCollection) -> AgePolicy {
        let mut policy = AgePolicy::new(min_days(), "low", dir, Some(dir), hints)
            .expect("default urgency is configured");
        policy.set_current_day(100);
        policy
    }

    #[test]
    fn test_missing_default_urgency_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = AgePolicy::new(
            min_days(),
            "emergency",
            dir.path(),
            None,
            HintCollection::new(),
        );
        assert!(matches!(
            result,
            Err(MigrationToolkitError::MissingDefaultUrgency(_))
        ));
    }

    #[test]
    fn test_aged_candidate_passes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy.urgencies.insert("foo".to_string(), "medium".to_string());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 95));

        let mut info = PolicyInfo::default();
        let verdict = policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("1.0"),
        );
        // Age 5 meets the medium requirement of 5 days.
        assert_eq!(verdict, PolicyVerdict::Pass);
        let age = info.age.expect("age info recorded");
        assert_eq!(age.age_requirement, 5);
        assert_eq!(age.current_age, 5);
    }

    #[test]
    fn test_young_candidate_is_rejected_temporarily() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy.urgencies.insert("foo".to_string(), "medium".to_string());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 96));

        let mut info = PolicyInfo::default();
        let verdict = policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("1.0"),
        );
        assert_eq!(verdict, PolicyVerdict::RejectedTemporarily);
    }

    #[test]
    fn test_urgent_hint_overrules_age() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut hints = HintCollection::new();
        hints.add_hint("urgent foo/1.0", "alice");
        let mut policy = policy_in(dir.path(), hints);
        policy.urgencies.insert("foo".to_string(), "medium".to_string());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 96));

        let mut info = PolicyInfo::default();
        let verdict = policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("1.0"),
        );
        assert_eq!(verdict, PolicyVerdict::PassHinted);
        let age = info.age.expect("age info recorded");
        let change = age.age_requirement_reduced.expect("hint recorded");
        assert_eq!(change.new_requirement, 0);
        assert_eq!(change.changed_by, "alice");
    }

    #[test]
    fn test_urgent_hint_for_other_version_does_not_apply() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut hints = HintCollection::new();
        hints.add_hint("urgent foo/0.9", "alice");
        let mut policy = policy_in(dir.path(), hints);
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 99));

        let mut info = PolicyInfo::default();
        let verdict = policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("1.0"),
        );
        assert_eq!(verdict, PolicyVerdict::RejectedTemporarily);
    }

    #[test]
    fn test_age_days_hint_changes_requirement() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut hints = HintCollection::new();
        hints.add_hint("age-days 2 foo/1.0", "bob");
        let mut policy = policy_in(dir.path(), hints);
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 97));

        let mut info = PolicyInfo::default();
        let verdict = policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("1.0"),
        );
        // Age 3 meets the hinted requirement of 2 even though the default
        // urgency would demand 10 days.
        assert_eq!(verdict, PolicyVerdict::Pass);
    }

    #[test]
    fn test_new_version_resets_the_clock() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy.urgencies.insert("foo".to_string(), "high".to_string());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 90));

        let mut info = PolicyInfo::default();
        let verdict = policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("2.0"),
        );
        assert_eq!(verdict, PolicyVerdict::RejectedTemporarily);
        assert_eq!(policy.dates()["foo"], ("2.0".to_string(), 100));
    }

    #[test]
    fn test_new_target_entry_raises_urgency_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy.urgencies.insert("foo".to_string(), "high".to_string());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 95));

        let mut info = PolicyInfo::default();
        // No target record: the high urgency (2 days) is raised to the
        // default (10 days), so age 5 is not enough.
        let verdict =
            policy.apply_policy(&mut info, SOURCE_SUITE, "foo", None, &source("1.0"));
        assert_eq!(verdict, PolicyVerdict::RejectedTemporarily);
        let age = info.age.expect("age info recorded");
        let change = age.urgency_reduced.expect("urgency raise recorded");
        assert_eq!(change.from, "high");
        assert_eq!(change.to, "low");
    }

    #[test]
    fn test_unknown_urgency_falls_back_to_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy
            .urgencies
            .insert("foo".to_string(), "apocalyptic".to_string());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 95));

        let mut info = PolicyInfo::default();
        policy.apply_policy(
            &mut info,
            SOURCE_SUITE,
            "foo",
            Some(&source("0.9")),
            &source("1.0"),
        );
        let age = info.age.expect("age info recorded");
        assert_eq!(age.unknown_urgency.as_deref(), Some("apocalyptic"));
        assert_eq!(age.age_requirement, 10);
    }

    #[test]
    fn test_dates_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy
            .dates
            .insert("foo".to_string(), ("1.0".to_string(), 95));
        policy
            .dates
            .insert("bar".to_string(), ("2:0.5-1".to_string(), 42));
        policy.save_state().expect("dates file written");

        let mut reloaded = policy_in(dir.path(), HintCollection::new());
        reloaded
            .initialise(&SuiteTables::new())
            .expect("dates file read");
        assert_eq!(reloaded.dates(), policy.dates());
    }

    #[test]
    fn test_dates_file_skips_malformed_lines() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(DATES_FILE),
            "foo 1.0 95\nbroken-line\nbar 2.0 not-a-day\nbaz 3.0 7\n",
        )
        .expect("state file written");

        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy
            .initialise(&SuiteTables::new())
            .expect("dates file read");
        assert_eq!(policy.dates().len(), 2);
        assert_eq!(policy.dates()["baz"], ("3.0".to_string(), 7));
    }

    #[test]
    fn test_dates_file_legacy_fallback() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state_dir = dir.path().join("state");
        std::fs::create_dir(&state_dir).expect("state dir created");
        std::fs::write(dir.path().join(LEGACY_DATES_FILE), "foo 1.0 95\n")
            .expect("legacy file written");

        let mut policy = AgePolicy::new(
            min_days(),
            "low",
            dir.path(),
            Some(&state_dir),
            HintCollection::new(),
        )
        .expect("default urgency is configured");
        policy
            .initialise(&SuiteTables::new())
            .expect("dates file read");
        assert_eq!(policy.dates()["foo"], ("1.0".to_string(), 95));

        // Writing targets the primary path and cleans up the legacy file.
        policy.save_state().expect("dates file written");
        assert!(state_dir.join(DATES_FILE).exists());
        assert!(!dir.path().join(LEGACY_DATES_FILE).exists());
    }

    #[test]
    fn test_urgency_file_monotone_and_staleness() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(URGENCY_FILE),
            concat!(
                "foo 1.0 medium\n",
                "foo 1.0 low\n",    // less urgent: ignored
                "foo 1.0 high\n",   // more urgent: sticks
                "old 0.5 high\n",   // not above target version: ignored
                "ahead 9.0 high\n", // above source version: ignored
                "gone 1.0 high\n",  // not in the source suite: ignored
            ),
        )
        .expect("urgency file written");

        let mut tables = SuiteTables::new();
        tables.add_source(SOURCE_SUITE, "foo", source("1.0"));
        tables.add_source(TARGET_SUITE, "foo", source("0.9"));
        tables.add_source(SOURCE_SUITE, "old", source("0.5"));
        tables.add_source(TARGET_SUITE, "old", source("0.5"));
        tables.add_source(SOURCE_SUITE, "ahead", source("1.0"));

        let mut policy = policy_in(dir.path(), HintCollection::new());
        policy.initialise(&tables).expect("urgency file read");

        assert_eq!(policy.urgencies().get("foo").map(String::as_str), Some("high"));
        assert!(!policy.urgencies().contains_key("old"));
        assert!(!policy.urgencies().contains_key("ahead"));
        assert!(!policy.urgencies().contains_key("gone"));
    }
}
