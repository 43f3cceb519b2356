use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{CategoryKey, OrganizationScope, ParticipantRecord, RawParticipant};
use super::eligibility::{EligibilityPartition, EligibilityPolicy};
use super::normalizer::normalize_all;
use super::ranking::{chart_series, rank, ChartPoint, RankedEntry};

/// Narrows the published ranking to one department (exact match) or shows everyone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartmentFilter {
    #[default]
    All,
    Only(String),
}

impl DepartmentFilter {
    pub fn from_option(department: Option<String>) -> Self {
        match department {
            Some(name) if !name.trim().is_empty() && name.trim() != "all" => {
                DepartmentFilter::Only(name)
            }
            _ => DepartmentFilter::All,
        }
    }

    pub fn matches(&self, record: &ParticipantRecord) -> bool {
        match self {
            DepartmentFilter::All => true,
            DepartmentFilter::Only(name) => record.department.as_deref() == Some(name.as_str()),
        }
    }
}

/// Ranking published to consumers after every recomputation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardView {
    pub organization: OrganizationScope,
    pub category: CategoryKey,
    pub department: DepartmentFilter,
    pub entries: Vec<RankedEntry>,
    pub eligible_count: usize,
    pub ineligible_count: usize,
    /// Notification number this view was computed from.
    pub sequence: u64,
    pub computed_at: DateTime<Utc>,
    /// Set when the latest delivery and its fallback fetch both failed.
    pub stale: bool,
}

impl LeaderboardView {
    pub fn chart_series(&self, limit: usize) -> Vec<ChartPoint> {
        chart_series(&self.entries, limit)
    }

    pub fn position_of(&self, record_id: &str) -> Option<&RankedEntry> {
        self.entries.iter().find(|entry| entry.record.id.0 == record_id)
    }
}

/// Consumer notified with every published view.
pub trait LeaderboardObserver: Send + Sync {
    fn on_publish(&self, view: &LeaderboardView);
}

/// Normalize then filter; the eligible records keep their delivery order.
pub(crate) fn prepare(raw: &[RawParticipant], policy: &EligibilityPolicy) -> EligibilityPartition {
    policy.partition(normalize_all(raw))
}

pub(crate) struct ViewInputs<'a> {
    pub organization: &'a OrganizationScope,
    pub eligible: &'a [ParticipantRecord],
    pub ineligible_count: usize,
    pub category: CategoryKey,
    pub department: &'a DepartmentFilter,
    pub sequence: u64,
    pub stale: bool,
}

pub(crate) fn build_view(inputs: ViewInputs<'_>) -> LeaderboardView {
    let entries = rank(
        inputs
            .eligible
            .iter()
            .filter(|record| inputs.department.matches(record)),
        inputs.category,
    );

    LeaderboardView {
        organization: inputs.organization.clone(),
        category: inputs.category,
        department: inputs.department.clone(),
        entries,
        eligible_count: inputs.eligible.len(),
        ineligible_count: inputs.ineligible_count,
        sequence: inputs.sequence,
        computed_at: Utc::now(),
        stale: inputs.stale,
    }
}
