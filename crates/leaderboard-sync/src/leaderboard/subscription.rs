//! Lifecycle of one live, organization-scoped feed.
//!
//! ```text
//! idle -> subscribing -> live -> (error -> live | idle)
//!   *  -> torn_down (terminal)
//! ```
//!
//! Every push notification re-runs normalize, filter, (admin only) achievement grants and rank
//! from scratch. Feed callbacks only hold a weak reference plus the generation they were
//! registered under, so a callback arriving after teardown or after a newer `start` is a no-op.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::achievements::{apply_grants, AchievementEngine, AchievementGrant};
use super::domain::{
    ActorContext, CategoryKey, OrganizationScope, ParticipantRecord, RawParticipant,
};
use super::eligibility::EligibilityPolicy;
use super::repository::{AchievementStore, FeedToken, SnapshotSink, SnapshotSource, SourceError};
use super::view::{
    build_view, prepare, DepartmentFilter, LeaderboardObserver, LeaderboardView, ViewInputs,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionState {
    Idle,
    Subscribing,
    Live,
    Error,
    TornDown,
}

impl SubscriptionState {
    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionState::Idle => "idle",
            SubscriptionState::Subscribing => "subscribing",
            SubscriptionState::Live => "live",
            SubscriptionState::Error => "error",
            SubscriptionState::TornDown => "torn_down",
        }
    }
}

impl fmt::Display for SubscriptionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("leaderboard subscription has been torn down")]
    TornDown,
    #[error("no live leaderboard subscription")]
    NotLive,
    #[error("failed to subscribe: {0}")]
    Subscribe(SourceError),
    #[error("one-shot fetch failed: {0}")]
    Fetch(SourceError),
}

/// Static inputs shared by every recomputation.
#[derive(Debug, Clone, Default)]
pub struct PipelineRules {
    pub policy: EligibilityPolicy,
    pub engine: AchievementEngine,
}

/// Owns the live feed for one view and publishes the derived ranking.
pub struct LeaderboardSync<S, G>
where
    S: SnapshotSource + 'static,
    G: AchievementStore + 'static,
{
    shared: Arc<Shared<S, G>>,
}

/// Owned handle for a started feed. Dropping it is the same as passing it to
/// [`LeaderboardSync::stop`].
#[must_use = "dropping the handle tears the subscription down"]
pub struct LiveSubscription {
    owner: Weak<dyn FeedOwner>,
    generation: u64,
    scope: OrganizationScope,
}

impl LiveSubscription {
    pub fn scope(&self) -> &OrganizationScope {
        &self.scope
    }
}

impl fmt::Debug for LiveSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSubscription")
            .field("generation", &self.generation)
            .field("scope", &self.scope)
            .finish()
    }
}

impl Drop for LiveSubscription {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            owner.release(self.generation);
        }
    }
}

/// Callback side of the manager, kept object safe so handles and sinks stay non-generic.
trait FeedOwner: Send + Sync {
    fn deliver(&self, generation: u64, records: Vec<RawParticipant>);
    fn fail(&self, generation: u64, error: SourceError);
    fn release(&self, generation: u64);
}

struct FeedSink {
    owner: Weak<dyn FeedOwner>,
    generation: u64,
}

impl SnapshotSink for FeedSink {
    fn on_snapshot(&self, records: Vec<RawParticipant>) {
        match self.owner.upgrade() {
            Some(owner) => owner.deliver(self.generation, records),
            None => debug!(generation = self.generation, "snapshot after manager drop ignored"),
        }
    }

    fn on_error(&self, error: SourceError) {
        match self.owner.upgrade() {
            Some(owner) => owner.fail(self.generation, error),
            None => debug!(generation = self.generation, "feed error after manager drop ignored"),
        }
    }
}

struct ActiveFeed {
    generation: u64,
    scope: OrganizationScope,
    token: Option<FeedToken>,
}

struct SyncState {
    phase: SubscriptionState,
    generation: u64,
    feed: Option<ActiveFeed>,
    category: CategoryKey,
    department: DepartmentFilter,
    eligible: Vec<ParticipantRecord>,
    ineligible_count: usize,
    last_sequence: u64,
    view: Option<Arc<LeaderboardView>>,
}

impl SyncState {
    fn current_feed(&self, generation: u64) -> Option<&ActiveFeed> {
        if self.phase == SubscriptionState::TornDown {
            return None;
        }
        self.feed
            .as_ref()
            .filter(|feed| feed.generation == generation)
    }

    fn rebuild(&mut self, stale: bool) -> Option<Arc<LeaderboardView>> {
        let sequence = self.last_sequence;
        let organization = self.view.as_ref()?.organization.clone();
        let view = Arc::new(build_view(ViewInputs {
            organization: &organization,
            eligible: &self.eligible,
            ineligible_count: self.ineligible_count,
            category: self.category,
            department: &self.department,
            sequence,
            stale,
        }));
        self.view = Some(Arc::clone(&view));
        Some(view)
    }
}

struct Shared<S, G> {
    source: Arc<S>,
    store: Arc<G>,
    actor: ActorContext,
    rules: PipelineRules,
    notifications: AtomicU64,
    applying: AtomicBool,
    observers: Mutex<Vec<Arc<dyn LeaderboardObserver>>>,
    state: Mutex<SyncState>,
}

/// Clears the single-flight flag even if a store call panics.
struct ApplyGuard<'a>(&'a AtomicBool);

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<S, G> LeaderboardSync<S, G>
where
    S: SnapshotSource + 'static,
    G: AchievementStore + 'static,
{
    pub fn new(
        source: Arc<S>,
        store: Arc<G>,
        actor: ActorContext,
        rules: PipelineRules,
        category: CategoryKey,
    ) -> Self {
        let state = SyncState {
            phase: SubscriptionState::Idle,
            generation: 0,
            feed: None,
            category,
            department: DepartmentFilter::All,
            eligible: Vec::new(),
            ineligible_count: 0,
            last_sequence: 0,
            view: None,
        };

        Self {
            shared: Arc::new(Shared {
                source,
                store,
                actor,
                rules,
                notifications: AtomicU64::new(0),
                applying: AtomicBool::new(false),
                observers: Mutex::new(Vec::new()),
                state: Mutex::new(state),
            }),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn LeaderboardObserver>) {
        self.shared
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.lock_state().phase
    }

    pub fn current(&self) -> Option<Arc<LeaderboardView>> {
        self.shared.lock_state().view.clone()
    }

    pub fn category(&self) -> CategoryKey {
        self.shared.lock_state().category
    }

    /// Opens the feed for `scope`. An already open feed is torn down first.
    pub fn start(&self, scope: OrganizationScope) -> Result<LiveSubscription, SubscriptionError> {
        let (generation, previous) = {
            let mut state = self.shared.lock_state();
            if state.phase == SubscriptionState::TornDown {
                return Err(SubscriptionError::TornDown);
            }
            state.generation += 1;
            let generation = state.generation;
            let previous = state.feed.replace(ActiveFeed {
                generation,
                scope: scope.clone(),
                token: None,
            });
            state.phase = SubscriptionState::Subscribing;
            state.eligible.clear();
            state.ineligible_count = 0;
            state.view = None;
            (generation, previous)
        };

        if let Some(previous) = previous {
            info!(
                organization = %previous.scope,
                generation = previous.generation,
                "closing previous leaderboard feed"
            );
            if let Some(token) = previous.token {
                self.shared.source.unsubscribe(token);
            }
        }

        info!(organization = %scope, generation, "subscribing to leaderboard feed");

        let owner: Weak<dyn FeedOwner> = Arc::downgrade(&self.shared) as Weak<dyn FeedOwner>;
        let sink = Arc::new(FeedSink {
            owner: owner.clone(),
            generation,
        });

        match self.shared.source.subscribe(&scope, sink) {
            Ok(token) => {
                let mut state = self.shared.lock_state();
                match state
                    .feed
                    .as_mut()
                    .filter(|feed| feed.generation == generation)
                {
                    Some(feed) => feed.token = Some(token),
                    None => {
                        // The feed closed (or was replaced) while subscribe was still running.
                        drop(state);
                        self.shared.source.unsubscribe(token);
                    }
                }
            }
            Err(error) => {
                let mut state = self.shared.lock_state();
                if state.current_feed(generation).is_some() {
                    state.feed = None;
                    state.phase = SubscriptionState::Idle;
                }
                warn!(organization = %scope, %error, "leaderboard subscription failed");
                return Err(SubscriptionError::Subscribe(error));
            }
        }

        Ok(LiveSubscription {
            owner,
            generation,
            scope,
        })
    }

    /// Releases the feed. No callback can mutate published state afterwards.
    pub fn stop(&self, subscription: LiveSubscription) {
        drop(subscription);
    }

    /// One-shot fetch and full recomputation for the open feed.
    pub fn refresh(&self) -> Result<Arc<LeaderboardView>, SubscriptionError> {
        let (generation, scope) = {
            let state = self.shared.lock_state();
            if state.phase == SubscriptionState::TornDown {
                return Err(SubscriptionError::TornDown);
            }
            let feed = state.feed.as_ref().ok_or(SubscriptionError::NotLive)?;
            (feed.generation, feed.scope.clone())
        };

        debug!(organization = %scope, "manual leaderboard refresh");
        let records = self
            .shared
            .source
            .fetch_once(&scope)
            .map_err(SubscriptionError::Fetch)?;

        let sequence = self.shared.next_sequence();
        self.shared
            .process(generation, &scope, sequence, records)
            .ok_or(SubscriptionError::NotLive)
    }

    /// Re-ranks the cached eligible set by `category` without waiting for a notification.
    /// Returns `None` before the first snapshot and after teardown.
    pub fn select_category(&self, category: CategoryKey) -> Option<Arc<LeaderboardView>> {
        self.reselect(|state| state.category = category)
    }

    pub fn select_department(&self, department: DepartmentFilter) -> Option<Arc<LeaderboardView>> {
        self.reselect(|state| state.department = department)
    }

    fn reselect(&self, update: impl FnOnce(&mut SyncState)) -> Option<Arc<LeaderboardView>> {
        let view = {
            let mut state = self.shared.lock_state();
            if state.phase == SubscriptionState::TornDown {
                debug!("view selection after teardown ignored");
                return None;
            }
            update(&mut *state);
            let stale = state.view.as_ref().map(|view| view.stale).unwrap_or(false);
            state.rebuild(stale)
        };
        if let Some(view) = &view {
            self.shared.notify(view);
        }
        view
    }
}

impl<S, G> Drop for LeaderboardSync<S, G>
where
    S: SnapshotSource + 'static,
    G: AchievementStore + 'static,
{
    fn drop(&mut self) {
        let generation = self.shared.lock_state().generation;
        self.shared.release(generation);
    }
}

impl<S, G> Shared<S, G>
where
    S: SnapshotSource + 'static,
    G: AchievementStore + 'static,
{
    fn lock_state(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_sequence(&self) -> u64 {
        self.notifications.fetch_add(1, Ordering::AcqRel) + 1
    }

    fn notify(&self, view: &LeaderboardView) {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in observers {
            observer.on_publish(view);
        }
    }

    /// Runs the full pipeline for one delivery and publishes the result if the feed is still
    /// current and no newer notification has been published meanwhile.
    fn process(
        &self,
        generation: u64,
        scope: &OrganizationScope,
        sequence: u64,
        records: Vec<RawParticipant>,
    ) -> Option<Arc<LeaderboardView>> {
        let mut partition = prepare(&records, &self.rules.policy);

        if self.actor.is_admin() {
            self.apply_achievements(scope, &mut partition.eligible);
        }

        let view = {
            let mut state = self.lock_state();
            state.current_feed(generation)?;
            if sequence < state.last_sequence {
                debug!(
                    organization = %scope,
                    sequence,
                    published = state.last_sequence,
                    "discarding leaderboard pass superseded by a newer notification"
                );
                return state.view.clone();
            }

            state.eligible = partition.eligible;
            state.ineligible_count = partition.ineligible_count;
            state.last_sequence = sequence;
            state.phase = SubscriptionState::Live;

            let view = Arc::new(build_view(ViewInputs {
                organization: scope,
                eligible: &state.eligible,
                ineligible_count: state.ineligible_count,
                category: state.category,
                department: &state.department,
                sequence,
                stale: false,
            }));
            state.view = Some(Arc::clone(&view));
            view
        };

        info!(
            organization = %scope,
            sequence,
            eligible = view.eligible_count,
            ineligible = view.ineligible_count,
            "leaderboard published"
        );
        self.notify(&view);
        Some(view)
    }

    fn apply_achievements(&self, scope: &OrganizationScope, eligible: &mut [ParticipantRecord]) {
        if self
            .applying
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!(organization = %scope, "achievement pass already in flight; skipping");
            return;
        }
        let _guard = ApplyGuard(&self.applying);

        match apply_grants(
            &self.actor,
            scope,
            eligible,
            &self.rules.engine,
            self.store.as_ref(),
        ) {
            Ok(report) if report.is_empty() => {
                debug!(organization = %scope, "no pending achievement grants")
            }
            Ok(report) => merge_grants(eligible, &report.granted),
            Err(error) => warn!(organization = %scope, %error, "achievement pass rejected"),
        }
    }
}

impl<S, G> FeedOwner for Shared<S, G>
where
    S: SnapshotSource + 'static,
    G: AchievementStore + 'static,
{
    fn deliver(&self, generation: u64, records: Vec<RawParticipant>) {
        let admitted = {
            let state = self.lock_state();
            state
                .current_feed(generation)
                .map(|feed| (feed.scope.clone(), self.next_sequence()))
        };
        let Some((scope, sequence)) = admitted else {
            debug!(generation, "snapshot for inactive feed ignored");
            return;
        };

        debug!(organization = %scope, sequence, records = records.len(), "snapshot received");
        self.process(generation, &scope, sequence, records);
    }

    fn fail(&self, generation: u64, error: SourceError) {
        let scope = {
            let mut state = self.lock_state();
            let Some(scope) = state.current_feed(generation).map(|feed| feed.scope.clone()) else {
                debug!(generation, %error, "feed error for inactive feed ignored");
                return;
            };
            state.phase = SubscriptionState::Error;
            scope
        };

        warn!(organization = %scope, %error, "leaderboard feed error; running fallback fetch");

        match self.source.fetch_once(&scope) {
            Ok(records) => {
                let sequence = self.next_sequence();
                self.process(generation, &scope, sequence, records);
            }
            Err(fetch_error) => {
                warn!(
                    organization = %scope,
                    error = %fetch_error,
                    "fallback fetch failed; keeping last known leaderboard"
                );
                let stale_view = {
                    let mut state = self.lock_state();
                    if state.current_feed(generation).is_none() {
                        return;
                    }
                    if state.view.is_none() {
                        state.phase = SubscriptionState::Subscribing;
                        None
                    } else {
                        state.phase = SubscriptionState::Live;
                        state.rebuild(true)
                    }
                };
                if let Some(view) = stale_view {
                    self.notify(&view);
                }
            }
        }

        if error == SourceError::Closed {
            let closed = {
                let mut state = self.lock_state();
                if state.current_feed(generation).is_none() {
                    return;
                }
                state.phase = SubscriptionState::Idle;
                state.feed.take()
            };
            if let Some(token) = closed.and_then(|feed| feed.token) {
                self.source.unsubscribe(token);
            }
            info!(organization = %scope, "leaderboard feed closed by source");
        }
    }

    fn release(&self, generation: u64) {
        let released = {
            let mut state = self.lock_state();
            if state.generation != generation || state.phase == SubscriptionState::TornDown {
                return;
            }
            state.phase = SubscriptionState::TornDown;
            state.eligible.clear();
            state.feed.take()
        };
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        if let Some(feed) = released {
            if let Some(token) = feed.token {
                self.source.unsubscribe(token);
            }
            info!(organization = %feed.scope, generation, "leaderboard feed torn down");
        }
    }
}

fn merge_grants(records: &mut [ParticipantRecord], granted: &[AchievementGrant]) {
    for grant in granted {
        if let Some(record) = records.iter_mut().find(|record| record.id == grant.record_id) {
            record.achievements.extend(grant.achievements.iter().cloned());
        }
    }
}
