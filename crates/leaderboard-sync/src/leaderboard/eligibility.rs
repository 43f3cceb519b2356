//! Participation rules for the ranking.
//!
//! People who evaluate performance (HR, management, administrators) never appear in the ranking
//! they influence. Departments are matched exactly against a finite list of known spellings after
//! trimming and case folding; names outside that list are always eligible.

use std::collections::BTreeSet;

use serde::Serialize;

use super::domain::{ParticipantRecord, Role};

pub const DEFAULT_EXCLUDED_DEPARTMENTS: &[&str] = &[
    "hr",
    "h.r.",
    "h r",
    "h.r",
    "h-r",
    "h r dept",
    "hr dept",
    "hr department",
    "human resources",
    "hum res",
    "hresources",
    "personnel",
    "people ops",
    "management",
    "mgmt",
    "mngt",
    "managment",
    "mgr",
    "managers",
    "the management",
    "executive",
    "executives",
    "c-suite",
    "senior management",
    "leadership",
    "admin",
    "administration",
    "administrative",
    "office admin",
    "general admin",
];

const REASON_MISSING: &str = "User information required";
const REASON_ADMIN: &str = "Administrative staff are excluded from leaderboard participation";
const REASON_DEPARTMENT: &str = "HR and Management departments are excluded to maintain fairness";
const REASON_ELIGIBLE: &str = "User meets all requirements for leaderboard participation";

/// Case-insensitive exact-match department exclusion list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    excluded_departments: BTreeSet<String>,
}

impl EligibilityPolicy {
    pub fn new<I, S>(excluded_departments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let excluded_departments = excluded_departments
            .into_iter()
            .map(|name| fold(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        Self {
            excluded_departments,
        }
    }

    pub fn excluded_departments(&self) -> impl Iterator<Item = &str> {
        self.excluded_departments.iter().map(String::as_str)
    }

    pub fn is_department_allowed(&self, department: Option<&str>) -> bool {
        match department.map(fold) {
            Some(name) if !name.is_empty() => !self.excluded_departments.contains(&name),
            _ => false,
        }
    }

    pub fn is_eligible(&self, role: &Role, department: Option<&str>) -> bool {
        !role.is_admin() && self.is_department_allowed(department)
    }

    pub fn is_record_eligible(&self, record: &ParticipantRecord) -> bool {
        self.is_eligible(&record.role, record.department.as_deref())
    }

    /// Keeps eligible records in their input order and counts the rest.
    pub fn partition(&self, records: Vec<ParticipantRecord>) -> EligibilityPartition {
        let total = records.len();
        let eligible: Vec<ParticipantRecord> = records
            .into_iter()
            .filter(|record| self.is_record_eligible(record))
            .collect();
        EligibilityPartition {
            ineligible_count: total - eligible.len(),
            eligible,
        }
    }

    pub fn filter_eligible(&self, records: Vec<ParticipantRecord>) -> Vec<ParticipantRecord> {
        self.partition(records).eligible
    }

    pub fn validate(&self, record: Option<&ParticipantRecord>) -> EligibilityVerdict {
        let Some(record) = record else {
            return EligibilityVerdict::ineligible(REASON_MISSING);
        };

        if record.role.is_admin() {
            return EligibilityVerdict::ineligible(REASON_ADMIN);
        }

        if !self.is_department_allowed(record.department.as_deref()) {
            return EligibilityVerdict::ineligible(REASON_DEPARTMENT);
        }

        EligibilityVerdict {
            eligible: true,
            reason: REASON_ELIGIBLE,
        }
    }
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_DEPARTMENTS)
    }
}

/// Output of [`EligibilityPolicy::partition`].
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityPartition {
    pub eligible: Vec<ParticipantRecord>,
    pub ineligible_count: usize,
}

/// Eligibility decision with a human readable explanation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EligibilityVerdict {
    pub eligible: bool,
    pub reason: &'static str,
}

impl EligibilityVerdict {
    fn ineligible(reason: &'static str) -> Self {
        Self {
            eligible: false,
            reason,
        }
    }
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::tests::common::participant;

    #[test]
    fn excluded_spellings_match_after_trim_and_case_fold() {
        let policy = EligibilityPolicy::default();

        assert!(!policy.is_department_allowed(Some("H.R.")));
        assert!(!policy.is_department_allowed(Some("  Human Resources ")));
        assert!(!policy.is_department_allowed(Some("C-SUITE")));
        assert!(policy.is_department_allowed(Some("Engineering")));
    }

    #[test]
    fn unlisted_management_sounding_names_stay_eligible() {
        let policy = EligibilityPolicy::default();

        assert!(policy.is_eligible(&Role::Employee, Some("Human Resources Department")));
        assert!(policy.is_eligible(&Role::Employee, Some("Management Consulting")));
    }

    #[test]
    fn blank_or_missing_department_is_ineligible() {
        let policy = EligibilityPolicy::default();

        assert!(!policy.is_eligible(&Role::Employee, None));
        assert!(!policy.is_eligible(&Role::Employee, Some("   ")));
    }

    #[test]
    fn admins_never_rank() {
        let policy = EligibilityPolicy::default();

        assert!(!policy.is_eligible(&Role::Admin, Some("Engineering")));
    }

    #[test]
    fn partition_preserves_order_and_counts_ineligible() {
        let policy = EligibilityPolicy::default();
        let mut admin = participant("admin", "Engineering", [10, 10, 10, 10]);
        admin.role = Role::Admin;
        let records = vec![
            participant("a", "Engineering", [1, 0, 0, 0]),
            participant("hr", "hr", [50, 0, 0, 0]),
            admin,
            participant("b", "Sales", [2, 0, 0, 0]),
        ];

        let partition = policy.partition(records);

        let ids: Vec<&str> = partition
            .eligible
            .iter()
            .map(|record| record.id.0.as_str())
            .collect();
        assert_eq!(ids, ["a", "b"]);
        assert_eq!(partition.ineligible_count, 2);
    }

    #[test]
    fn validate_explains_each_outcome() {
        let policy = EligibilityPolicy::default();
        let mut admin = participant("admin", "Engineering", [0; 4]);
        admin.role = Role::Admin;

        assert_eq!(policy.validate(None).reason, REASON_MISSING);
        assert_eq!(policy.validate(Some(&admin)).reason, REASON_ADMIN);
        assert_eq!(
            policy
                .validate(Some(&participant("p", "People Ops", [0; 4])))
                .reason,
            REASON_DEPARTMENT
        );
        let verdict = policy.validate(Some(&participant("e", "Engineering", [0; 4])));
        assert!(verdict.eligible);
        assert_eq!(verdict.reason, REASON_ELIGIBLE);
    }

    #[test]
    fn custom_exclusions_are_folded() {
        let policy = EligibilityPolicy::new(["  Finance Leads "]);

        assert!(!policy.is_department_allowed(Some("finance leads")));
        assert!(policy.is_department_allowed(Some("hr")));
    }
}
