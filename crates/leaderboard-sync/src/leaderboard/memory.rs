//! Process-local directory implementing the feed, the achievement store and the scope lookup.
//!
//! Every mutation re-broadcasts the full scoped snapshot to matching subscribers, mirroring how
//! a document store pushes query snapshots. Sinks are always invoked with the internal lock
//! released so a subscriber may call back into the directory.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use tracing::debug;

use super::domain::{AchievementId, OrganizationScope, ParticipantId, RawParticipant};
use super::repository::{
    AchievementStore, FeedToken, GrantError, ScopeDirectory, ScopeLookupError, SnapshotSink,
    SnapshotSource, SourceError,
};

const FIELD_ORGANIZATION: &str = "organizationId";
const FIELD_ACHIEVEMENTS: &str = "achievements";

type Delivery = (Arc<dyn SnapshotSink>, Vec<RawParticipant>);

struct Subscriber {
    scope: OrganizationScope,
    sink: Arc<dyn SnapshotSink>,
}

#[derive(Default)]
struct DirectoryState {
    records: Vec<RawParticipant>,
    subscribers: BTreeMap<u64, Subscriber>,
    next_token: u64,
    fetch_failures: VecDeque<SourceError>,
    failing_grants: BTreeSet<String>,
    lookup_failure: Option<ScopeLookupError>,
}

impl DirectoryState {
    fn scoped(&self, scope: &OrganizationScope) -> Vec<RawParticipant> {
        self.records
            .iter()
            .filter(|record| in_scope(record, scope))
            .cloned()
            .collect()
    }

    fn deliveries(&self, only: Option<&OrganizationScope>) -> Vec<Delivery> {
        self.subscribers
            .values()
            .filter(|subscriber| only.map_or(true, |scope| &subscriber.scope == scope))
            .map(|subscriber| (Arc::clone(&subscriber.sink), self.scoped(&subscriber.scope)))
            .collect()
    }
}

#[derive(Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<RawParticipant>) -> Self {
        let directory = Self::default();
        directory.lock().records = records;
        directory
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Inserts or replaces a record by id and pushes the new snapshot to its tenant.
    pub fn upsert(&self, record: RawParticipant) {
        let deliveries = {
            let mut state = self.lock();
            let scope = organization_of(&record).map(OrganizationScope::new);
            match state
                .records
                .iter()
                .position(|existing| existing.id == record.id)
            {
                Some(index) => state.records[index] = record,
                None => state.records.push(record),
            }
            match scope {
                Some(scope) => state.deliveries(Some(&scope)),
                None => Vec::new(),
            }
        };
        broadcast(deliveries);
    }

    /// Replaces the whole directory and pushes a snapshot to every subscriber.
    pub fn replace_all(&self, records: Vec<RawParticipant>) {
        let deliveries = {
            let mut state = self.lock();
            state.records = records;
            state.deliveries(None)
        };
        broadcast(deliveries);
    }

    pub fn remove(&self, id: &str) {
        let deliveries = {
            let mut state = self.lock();
            let scope = state
                .records
                .iter()
                .find(|record| record.id == id)
                .and_then(organization_of)
                .map(OrganizationScope::new);
            state.records.retain(|record| record.id != id);
            match scope {
                Some(scope) => state.deliveries(Some(&scope)),
                None => Vec::new(),
            }
        };
        broadcast(deliveries);
    }

    /// Reports a delivery failure to every subscriber.
    pub fn push_error(&self, error: SourceError) {
        let sinks: Vec<Arc<dyn SnapshotSink>> = self
            .lock()
            .subscribers
            .values()
            .map(|subscriber| Arc::clone(&subscriber.sink))
            .collect();
        for sink in sinks {
            sink.on_error(error.clone());
        }
    }

    /// Makes the next one-shot fetch fail with `error`.
    pub fn fail_next_fetch(&self, error: SourceError) {
        self.lock().fetch_failures.push_back(error);
    }

    pub fn fail_grants_for(&self, record_id: &str) {
        self.lock().failing_grants.insert(record_id.to_string());
    }

    pub fn allow_grants_for(&self, record_id: &str) {
        self.lock().failing_grants.remove(record_id);
    }

    pub fn fail_scope_lookup(&self, error: ScopeLookupError) {
        self.lock().lookup_failure = Some(error);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn record(&self, id: &str) -> Option<RawParticipant> {
        self.lock()
            .records
            .iter()
            .find(|record| record.id == id)
            .cloned()
    }

    pub fn stored_achievements(&self, id: &str) -> BTreeSet<AchievementId> {
        self.record(id)
            .and_then(|record| record.fields.get(FIELD_ACHIEVEMENTS).cloned())
            .map(|value| achievement_set(&value))
            .unwrap_or_default()
    }
}

impl SnapshotSource for InMemoryDirectory {
    fn subscribe(
        &self,
        scope: &OrganizationScope,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<FeedToken, SourceError> {
        let (token, initial) = {
            let mut state = self.lock();
            state.next_token += 1;
            let token = state.next_token;
            state.subscribers.insert(
                token,
                Subscriber {
                    scope: scope.clone(),
                    sink: Arc::clone(&sink),
                },
            );
            (token, state.scoped(scope))
        };

        debug!(organization = %scope, token, "in-memory feed registered");
        sink.on_snapshot(initial);
        Ok(FeedToken(token))
    }

    fn unsubscribe(&self, token: FeedToken) {
        if self.lock().subscribers.remove(&token.0).is_some() {
            debug!(token = token.0, "in-memory feed released");
        }
    }

    fn fetch_once(&self, scope: &OrganizationScope) -> Result<Vec<RawParticipant>, SourceError> {
        let mut state = self.lock();
        match state.fetch_failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(state.scoped(scope)),
        }
    }
}

impl AchievementStore for InMemoryDirectory {
    fn grant_achievements(
        &self,
        scope: &OrganizationScope,
        record_id: &ParticipantId,
        achievements: &[AchievementId],
    ) -> Result<(), GrantError> {
        let deliveries = {
            let mut state = self.lock();
            if state.failing_grants.contains(&record_id.0) {
                return Err(GrantError::Unavailable("injected failure".to_string()));
            }
            let record = state
                .records
                .iter_mut()
                .find(|record| record.id == record_id.0 && in_scope(record, scope))
                .ok_or_else(|| GrantError::NotFound(record_id.clone()))?;

            let mut merged = record
                .fields
                .get(FIELD_ACHIEVEMENTS)
                .map(achievement_set)
                .unwrap_or_default();
            let before = merged.len();
            merged.extend(achievements.iter().cloned());
            if merged.len() == before {
                return Ok(());
            }

            record.fields.insert(
                FIELD_ACHIEVEMENTS.to_string(),
                Value::Array(
                    merged
                        .into_iter()
                        .map(|id| Value::String(id.0))
                        .collect(),
                ),
            );
            state.deliveries(Some(scope))
        };
        broadcast(deliveries);
        Ok(())
    }
}

impl ScopeDirectory for InMemoryDirectory {
    fn organization_of(
        &self,
        actor_id: &ParticipantId,
    ) -> Result<Option<String>, ScopeLookupError> {
        let state = self.lock();
        if let Some(error) = &state.lookup_failure {
            return Err(error.clone());
        }
        Ok(state
            .records
            .iter()
            .find(|record| record.id == actor_id.0)
            .and_then(organization_of)
            .map(str::to_string))
    }
}

fn broadcast(deliveries: Vec<Delivery>) {
    for (sink, snapshot) in deliveries {
        sink.on_snapshot(snapshot);
    }
}

fn organization_of(record: &RawParticipant) -> Option<&str> {
    record.fields.get(FIELD_ORGANIZATION).and_then(Value::as_str)
}

fn in_scope(record: &RawParticipant, scope: &OrganizationScope) -> bool {
    organization_of(record) == Some(scope.as_str())
}

fn achievement_set(value: &Value) -> BTreeSet<AchievementId> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(AchievementId::new)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaderboard::tests::common::{raw, raw_in, scope};

    #[derive(Default)]
    struct CountingSink {
        snapshots: Mutex<Vec<usize>>,
    }

    impl SnapshotSink for CountingSink {
        fn on_snapshot(&self, records: Vec<RawParticipant>) {
            self.snapshots
                .lock()
                .expect("sink mutex poisoned")
                .push(records.len());
        }

        fn on_error(&self, _error: SourceError) {}
    }

    fn ids(values: &[&str]) -> Vec<AchievementId> {
        values.iter().map(|value| AchievementId::new(*value)).collect()
    }

    #[test]
    fn subscribe_delivers_the_scoped_snapshot_immediately() {
        let directory = InMemoryDirectory::with_records(vec![
            raw("a", "Ops", "employee", [1, 0, 0, 0]),
            raw_in("globex", "g", "Ops", "employee", [1, 0, 0, 0]),
        ]);
        let sink = Arc::new(CountingSink::default());

        let token = directory.subscribe(&scope(), sink.clone()).expect("subscribe");

        assert_eq!(*sink.snapshots.lock().expect("sink mutex poisoned"), [1]);
        directory.unsubscribe(token);
        directory.upsert(raw("b", "Ops", "employee", [1, 0, 0, 0]));
        assert_eq!(sink.snapshots.lock().expect("sink mutex poisoned").len(), 1);
    }

    #[test]
    fn grants_merge_as_a_set_union() {
        let directory = InMemoryDirectory::with_records(vec![raw("a", "Ops", "employee", [0; 4])]);
        let record_id = ParticipantId("a".to_string());

        directory
            .grant_achievements(&scope(), &record_id, &ids(&["first", "second"]))
            .expect("grant");
        directory
            .grant_achievements(&scope(), &record_id, &ids(&["second", "third"]))
            .expect("grant");

        let stored: Vec<String> = directory
            .stored_achievements("a")
            .into_iter()
            .map(|id| id.0)
            .collect();
        assert_eq!(stored, ["first", "second", "third"]);
    }

    #[test]
    fn redundant_grants_do_not_rebroadcast() {
        let directory = InMemoryDirectory::with_records(vec![raw("a", "Ops", "employee", [0; 4])]);
        let sink = Arc::new(CountingSink::default());
        let _token = directory.subscribe(&scope(), sink.clone()).expect("subscribe");
        let record_id = ParticipantId("a".to_string());

        directory
            .grant_achievements(&scope(), &record_id, &ids(&["first"]))
            .expect("grant");
        directory
            .grant_achievements(&scope(), &record_id, &ids(&["first"]))
            .expect("grant");

        assert_eq!(sink.snapshots.lock().expect("sink mutex poisoned").len(), 2);
    }

    #[test]
    fn grants_never_cross_tenants() {
        let directory =
            InMemoryDirectory::with_records(vec![raw_in("globex", "g", "Ops", "employee", [0; 4])]);

        let result =
            directory.grant_achievements(&scope(), &ParticipantId("g".to_string()), &ids(&["x"]));

        assert_eq!(
            result,
            Err(GrantError::NotFound(ParticipantId("g".to_string())))
        );
        assert!(directory.stored_achievements("g").is_empty());
    }

    #[test]
    fn queued_fetch_failures_are_consumed_in_order() {
        let directory = InMemoryDirectory::with_records(vec![raw("a", "Ops", "employee", [0; 4])]);
        directory.fail_next_fetch(SourceError::Closed);

        assert_eq!(directory.fetch_once(&scope()), Err(SourceError::Closed));
        assert_eq!(directory.fetch_once(&scope()).map(|records| records.len()), Ok(1));
    }
}
