//! Policy gates that pre-filter migration candidates.
//!
//! Each policy classifies a candidate before it reaches the migration
//! solver: it passes, passes only because a hint overruled the policy, or
//! is rejected (temporarily, when waiting can fix it, or permanently, when
//! only a hint or a new upload can). Policies record structured reason
//! data in a [`PolicyInfo`] so drivers can persist why a verdict fell.

mod age;
mod rcbugs;

pub use age::AgePolicy;
pub use rcbugs::RcBugPolicy;

use crate::archive::SuiteTables;
use crate::error::Result;
use crate::types::SourceRecord;
use serde::{Deserialize, Serialize};

/// Classification of one migration candidate by one policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyVerdict {
    /// The candidate passed the policy.
    Pass,
    /// The policy was overruled by a hint.
    PassHinted,
    /// The candidate failed, but the failure is believed to be temporary.
    RejectedTemporarily,
    /// The candidate failed and the failure will not correct itself (a
    /// hint or a new version is needed).
    RejectedPermanently,
}

impl PolicyVerdict {
    /// Whether the verdict is one of the rejected forms.
    #[must_use]
    pub const fn is_rejected(self) -> bool {
        matches!(self, Self::RejectedTemporarily | Self::RejectedPermanently)
    }
}

/// Structured reason data recorded by the age policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AgeInfo {
    /// Urgency that had no configured age requirement, when one was seen.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_urgency: Option<String>,
    /// Urgency raise applied to a package new to the target suite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency_reduced: Option<UrgencyChange>,
    /// Days the candidate must age before migrating.
    pub age_requirement: u32,
    /// Days the candidate has aged so far.
    pub current_age: i64,
    /// Hint-driven change of the age requirement, when one applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_requirement_reduced: Option<AgeRequirementChange>,
}

/// An urgency replaced by the default for a package new to the target suite.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UrgencyChange {
    /// Urgency the upload carried.
    pub from: String,
    /// Urgency actually applied.
    pub to: String,
}

/// An age requirement changed by an `age-days` or `urgent` hint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AgeRequirementChange {
    /// The requirement after the hint.
    pub new_requirement: u32,
    /// Administrator whose hint changed it.
    pub changed_by: String,
}

/// Structured reason data recorded by the RC-bug policy.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RcBugsInfo {
    /// Bugs present in both suites.
    pub shared_bugs: Vec<String>,
    /// Bugs only in the source suite (these block the migration).
    pub unique_source_bugs: Vec<String>,
    /// Bugs only in the target suite (fixed by the migration).
    pub unique_target_bugs: Vec<String>,
}

/// Per-candidate structured reason data, filled in by the policies that
/// examined the candidate.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyInfo {
    /// Age policy data, when the age policy ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<AgeInfo>,
    /// RC-bug policy data, when the RC-bug policy ran.
    #[serde(default, rename = "rc-bugs", skip_serializing_if = "Option::is_none")]
    pub rc_bugs: Option<RcBugsInfo>,
}

impl PolicyInfo {
    /// Serialize the recorded reason data for reporting.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

/// A policy gate applied to every migration candidate.
pub trait Policy {
    /// What: Load any state files the policy needs.
    ///
    /// Inputs:
    /// - `tables`: Suite tables, for policies whose state depends on suite
    ///   contents.
    ///
    /// Output:
    /// - Returns `Ok(())` once the policy is ready to classify candidates.
    ///
    /// # Errors
    ///
    /// Returns an error when a required state file cannot be read.
    fn initialise(&mut self, tables: &SuiteTables) -> Result<()> {
        let _ = tables;
        Ok(())
    }

    /// What: Persist the policy's state at the end of the run.
    ///
    /// Inputs: None
    ///
    /// Output:
    /// - Returns `Ok(())` once any state files have been written.
    ///
    /// Details:
    /// - Not called for dry runs, which must not change state.
    ///
    /// # Errors
    ///
    /// Returns an error when a state file cannot be written.
    fn save_state(&mut self) -> Result<()> {
        Ok(())
    }

    /// What: Classify one migration candidate.
    ///
    /// Inputs:
    /// - `info`: Reason data sink for this candidate.
    /// - `suite`: Suite the candidate migrates from.
    /// - `source_name`: Name of the candidate's source package.
    /// - `target_record`: Source record currently in the target suite, if
    ///   the package is present there.
    /// - `source_record`: Source record in the candidate's suite.
    ///
    /// Output:
    /// - Returns the policy's verdict for this candidate.
    fn apply_policy(
        &mut self,
        info: &mut PolicyInfo,
        suite: &str,
        source_name: &str,
        target_record: Option<&SourceRecord>,
        source_record: &SourceRecord,
    ) -> PolicyVerdict;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_rejection() {
        assert!(!PolicyVerdict::Pass.is_rejected());
        assert!(!PolicyVerdict::PassHinted.is_rejected());
        assert!(PolicyVerdict::RejectedTemporarily.is_rejected());
        assert!(PolicyVerdict::RejectedPermanently.is_rejected());
    }

    #[test]
    fn test_policy_info_serializes_only_recorded_sections() {
        let mut info = PolicyInfo::default();
        let json = info.to_json();
        assert_eq!(json, serde_json::json!({}));

        info.age = Some(AgeInfo {
            age_requirement: 5,
            current_age: 2,
            ..AgeInfo::default()
        });
        let json = info.to_json();
        assert_eq!(json["age"]["age-requirement"], serde_json::json!(5));
        assert!(json.get("rc-bugs").is_none());
    }
}
