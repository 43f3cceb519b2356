mod applier;
mod catalog;
mod rules;

pub use applier::{apply_grants, AchievementGrant, ApplyError, ApplyReport, GrantFailure};
pub use catalog::{
    default_definitions, AchievementCatalog, AchievementCategory, AchievementDefinition,
    AchievementRule, UnknownAchievementCategory, DEFAULT_ALL_ROUNDER_FLOOR,
};

use std::collections::BTreeSet;

use super::domain::{AchievementId, ParticipantRecord};

/// Stateless evaluator that applies the catalogue to normalized records.
#[derive(Debug, Clone, Default)]
pub struct AchievementEngine {
    catalog: AchievementCatalog,
}

impl AchievementEngine {
    pub fn new(catalog: AchievementCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Achievements the record qualifies for but does not hold yet, in catalogue order.
    pub fn newly_qualified(&self, record: &ParticipantRecord) -> Vec<AchievementId> {
        let mut seen = BTreeSet::new();
        self.catalog
            .rules()
            .filter(|(definition, _)| !record.holds(&definition.id))
            .filter(|(_, rule)| rules::qualifies(&record.points, rule))
            .filter(|(definition, _)| seen.insert(definition.id.clone()))
            .map(|(definition, _)| definition.id.clone())
            .collect()
    }

    /// Pending grants for every record that qualifies for something new.
    pub fn pending_grants(&self, records: &[ParticipantRecord]) -> Vec<AchievementGrant> {
        records
            .iter()
            .filter_map(|record| {
                let achievements = self.newly_qualified(record);
                (!achievements.is_empty()).then(|| AchievementGrant {
                    record_id: record.id.clone(),
                    achievements,
                })
            })
            .collect()
    }
}
