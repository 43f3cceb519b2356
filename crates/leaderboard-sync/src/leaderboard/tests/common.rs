use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::leaderboard::domain::{
    AchievementId, ActorContext, OrganizationScope, ParticipantId, ParticipantRecord,
    PointBreakdown, RawParticipant, Role,
};
use crate::leaderboard::repository::{
    AchievementStore, FeedToken, GrantError, SnapshotSink, SnapshotSource, SourceError,
};
use crate::leaderboard::view::{LeaderboardObserver, LeaderboardView};

pub(crate) const ORG: &str = "acme";

pub(crate) fn participant(id: &str, department: &str, points: [i64; 4]) -> ParticipantRecord {
    let [attendance, collaboration, efficiency, innovation] = points;
    ParticipantRecord {
        id: ParticipantId(id.to_string()),
        display_name: id.to_string(),
        email: None,
        organization_id: Some(ORG.to_string()),
        department: Some(department.to_string()),
        role: Role::Employee,
        points: PointBreakdown::new(attendance, collaboration, efficiency, innovation),
        achievements: BTreeSet::new(),
        legacy_score: None,
    }
}

pub(crate) fn raw(id: &str, department: &str, role: &str, points: [i64; 4]) -> RawParticipant {
    raw_in(ORG, id, department, role, points)
}

pub(crate) fn raw_in(
    organization: &str,
    id: &str,
    department: &str,
    role: &str,
    points: [i64; 4],
) -> RawParticipant {
    let [attendance, collaboration, efficiency, innovation] = points;
    serde_json::from_value(json!({
        "id": id,
        "email": format!("{id}@{organization}.example"),
        "organizationId": organization,
        "department": department,
        "role": role,
        "points": {
            "attendance": attendance,
            "collaboration": collaboration,
            "efficiency": efficiency,
            "innovation": innovation
        }
    }))
    .expect("raw participant fixture")
}

pub(crate) fn scope() -> OrganizationScope {
    OrganizationScope::new(ORG)
}

pub(crate) fn admin() -> ActorContext {
    ActorContext::new(Role::Admin, Some(ORG.to_string()))
}

pub(crate) fn employee() -> ActorContext {
    ActorContext::new(Role::Employee, Some(ORG.to_string()))
}

pub(crate) fn entry_ids(view: &LeaderboardView) -> Vec<String> {
    view.entries
        .iter()
        .map(|entry| entry.record.id.0.clone())
        .collect()
}

/// Store that records every grant call and fails for configured record ids.
#[derive(Default)]
pub(crate) struct RecordingStore {
    calls: Mutex<Vec<(ParticipantId, Vec<AchievementId>)>>,
    failing: BTreeSet<String>,
}

impl RecordingStore {
    pub(crate) fn failing_for<const N: usize>(ids: [&str; N]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: ids.iter().map(|id| id.to_string()).collect(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<(ParticipantId, Vec<AchievementId>)> {
        self.calls.lock().expect("store mutex poisoned").clone()
    }
}

impl AchievementStore for RecordingStore {
    fn grant_achievements(
        &self,
        _scope: &OrganizationScope,
        record_id: &ParticipantId,
        achievements: &[AchievementId],
    ) -> Result<(), GrantError> {
        self.calls
            .lock()
            .expect("store mutex poisoned")
            .push((record_id.clone(), achievements.to_vec()));
        if self.failing.contains(&record_id.0) {
            return Err(GrantError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

/// Transport that keeps every sink it was ever given, so tests can fire callbacks after the
/// manager unsubscribed.
#[derive(Default)]
pub(crate) struct ScriptedSource {
    sinks: Mutex<BTreeMap<u64, Arc<dyn SnapshotSink>>>,
    active: Mutex<BTreeSet<u64>>,
    fetch: Mutex<Option<Result<Vec<RawParticipant>, SourceError>>>,
    subscribe_failure: Mutex<Option<SourceError>>,
}

impl ScriptedSource {
    pub(crate) fn sink(&self, token: u64) -> Arc<dyn SnapshotSink> {
        Arc::clone(
            self.sinks
                .lock()
                .expect("sink mutex poisoned")
                .get(&token)
                .expect("sink registered"),
        )
    }

    pub(crate) fn active_tokens(&self) -> Vec<u64> {
        self.active
            .lock()
            .expect("active mutex poisoned")
            .iter()
            .copied()
            .collect()
    }

    pub(crate) fn reject_next_subscribe(&self, error: SourceError) {
        *self
            .subscribe_failure
            .lock()
            .expect("subscribe mutex poisoned") = Some(error);
    }

    pub(crate) fn set_fetch(&self, result: Result<Vec<RawParticipant>, SourceError>) {
        *self.fetch.lock().expect("fetch mutex poisoned") = Some(result);
    }
}

impl SnapshotSource for ScriptedSource {
    fn subscribe(
        &self,
        _scope: &OrganizationScope,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<FeedToken, SourceError> {
        if let Some(error) = self
            .subscribe_failure
            .lock()
            .expect("subscribe mutex poisoned")
            .take()
        {
            return Err(error);
        }
        let mut sinks = self.sinks.lock().expect("sink mutex poisoned");
        let token = sinks.len() as u64 + 1;
        sinks.insert(token, sink);
        self.active
            .lock()
            .expect("active mutex poisoned")
            .insert(token);
        Ok(FeedToken(token))
    }

    fn unsubscribe(&self, token: FeedToken) {
        self.active
            .lock()
            .expect("active mutex poisoned")
            .remove(&token.0);
    }

    fn fetch_once(&self, _scope: &OrganizationScope) -> Result<Vec<RawParticipant>, SourceError> {
        self.fetch
            .lock()
            .expect("fetch mutex poisoned")
            .clone()
            .unwrap_or_else(|| Err(SourceError::Unavailable("no scripted fetch".to_string())))
    }
}

#[derive(Default)]
pub(crate) struct RecordingObserver {
    views: Mutex<Vec<LeaderboardView>>,
}

impl RecordingObserver {
    pub(crate) fn views(&self) -> Vec<LeaderboardView> {
        self.views.lock().expect("observer mutex poisoned").clone()
    }
}

impl LeaderboardObserver for RecordingObserver {
    fn on_publish(&self, view: &LeaderboardView) {
        self.views
            .lock()
            .expect("observer mutex poisoned")
            .push(view.clone());
    }
}
