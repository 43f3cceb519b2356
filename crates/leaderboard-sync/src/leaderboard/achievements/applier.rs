use serde::Serialize;
use tracing::{debug, warn};

use super::super::domain::{
    AchievementId, ActorContext, OrganizationScope, ParticipantId, ParticipantRecord, Role,
};
use super::super::repository::AchievementStore;
use super::AchievementEngine;

/// Identifiers to merge into one record's persisted achievement set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AchievementGrant {
    pub record_id: ParticipantId,
    pub achievements: Vec<AchievementId>,
}

/// A grant the store refused. The record qualifies again on the next pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantFailure {
    pub grant: AchievementGrant,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ApplyReport {
    pub granted: Vec<AchievementGrant>,
    pub failed: Vec<GrantFailure>,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.granted.is_empty() && self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApplyError {
    #[error("achievement grants require an admin actor (actor role: {0:?})")]
    NotPermitted(Role),
}

/// Persists every pending grant for `records`.
///
/// Only admins may run this since it writes on behalf of every record in the tenant. A failed
/// write is logged and skipped; remaining records are still processed and nothing is rolled back.
pub fn apply_grants<G>(
    actor: &ActorContext,
    scope: &OrganizationScope,
    records: &[ParticipantRecord],
    engine: &AchievementEngine,
    store: &G,
) -> Result<ApplyReport, ApplyError>
where
    G: AchievementStore + ?Sized,
{
    if !actor.is_admin() {
        return Err(ApplyError::NotPermitted(actor.role.clone()));
    }

    let mut report = ApplyReport::default();
    for grant in engine.pending_grants(records) {
        match store.grant_achievements(scope, &grant.record_id, &grant.achievements) {
            Ok(()) => {
                debug!(
                    organization = %scope,
                    record_id = %grant.record_id,
                    count = grant.achievements.len(),
                    "achievements granted"
                );
                report.granted.push(grant);
            }
            Err(error) => {
                warn!(
                    organization = %scope,
                    record_id = %grant.record_id,
                    %error,
                    "failed to persist achievement grant"
                );
                report.failed.push(GrantFailure {
                    grant,
                    error: error.to_string(),
                });
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::repository::GrantError;
    use crate::leaderboard::tests::common::{participant, RecordingStore};

    fn scope() -> OrganizationScope {
        OrganizationScope::new("acme")
    }

    #[test]
    fn non_admin_actors_cannot_apply() {
        let store = RecordingStore::default();
        let actor = ActorContext::new(Role::Employee, Some("acme".to_string()));
        let records = vec![participant("busy", "Ops", [100, 0, 0, 0])];

        let result = apply_grants(
            &actor,
            &scope(),
            &records,
            &AchievementEngine::default(),
            &store,
        );

        assert_eq!(result, Err(ApplyError::NotPermitted(Role::Employee)));
        assert!(store.calls().is_empty());
    }

    #[test]
    fn failures_do_not_block_other_records() {
        let store = RecordingStore::failing_for(["broken"]);
        let actor = ActorContext::new(Role::Admin, Some("acme".to_string()));
        let records = vec![
            participant("broken", "Ops", [100, 0, 0, 0]),
            participant("fine", "Ops", [0, 100, 0, 0]),
        ];

        let report = apply_grants(
            &actor,
            &scope(),
            &records,
            &AchievementEngine::default(),
            &store,
        )
        .expect("admin may apply");

        assert_eq!(report.granted.len(), 1);
        assert_eq!(report.granted[0].record_id.0, "fine");
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].grant.record_id.0, "broken");
        assert_eq!(
            report.failed[0].error,
            GrantError::Unavailable("injected failure".to_string()).to_string()
        );
        assert_eq!(store.calls().len(), 2);
        assert!(!report.is_empty());
    }

    #[test]
    fn nothing_pending_yields_an_empty_report() {
        let store = RecordingStore::default();
        let actor = ActorContext::new(Role::Admin, Some("acme".to_string()));
        let records = vec![participant("quiet", "Ops", [10, 10, 10, 10])];

        let report = apply_grants(
            &actor,
            &scope(),
            &records,
            &AchievementEngine::default(),
            &store,
        )
        .expect("admin may apply");

        assert!(report.is_empty());
        assert!(store.calls().is_empty());
    }
}
