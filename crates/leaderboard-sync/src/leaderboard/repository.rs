use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::domain::{AchievementId, OrganizationScope, ParticipantId, RawParticipant};

/// Opaque handle a [`SnapshotSource`] hands out for one registered feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedToken(pub u64);

/// Receiver of push notifications. Every snapshot is the full current set for the scope.
pub trait SnapshotSink: Send + Sync {
    fn on_snapshot(&self, records: Vec<RawParticipant>);
    fn on_error(&self, error: SourceError);
}

/// Live, organization-scoped directory feed plus the one-shot fetch used as its fallback.
pub trait SnapshotSource: Send + Sync {
    fn subscribe(
        &self,
        scope: &OrganizationScope,
        sink: Arc<dyn SnapshotSink>,
    ) -> Result<FeedToken, SourceError>;

    /// After this returns the source must drop the sink registered under `token`.
    fn unsubscribe(&self, token: FeedToken);

    fn fetch_once(&self, scope: &OrganizationScope) -> Result<Vec<RawParticipant>, SourceError>;
}

/// Transport failures reported by a [`SnapshotSource`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("data source unavailable: {0}")]
    Unavailable(String),
    #[error("data source denied access: {0}")]
    PermissionDenied(String),
    #[error("feed closed by the data source")]
    Closed,
}

/// Append-only persistence for achievement grants.
///
/// Implementations must merge `achievements` into the stored set (set union), so overlapping
/// grant passes can never drop an identifier another pass wrote.
pub trait AchievementStore: Send + Sync {
    fn grant_achievements(
        &self,
        scope: &OrganizationScope,
        record_id: &ParticipantId,
        achievements: &[AchievementId],
    ) -> Result<(), GrantError>;
}

/// Persistence failures reported by an [`AchievementStore`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GrantError {
    #[error("record {0} not found")]
    NotFound(ParticipantId),
    #[error("achievement store unavailable: {0}")]
    Unavailable(String),
}

/// Looks up the organization recorded on the actor's own directory entry.
pub trait ScopeDirectory: Send + Sync {
    fn organization_of(&self, actor_id: &ParticipantId)
        -> Result<Option<String>, ScopeLookupError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeLookupError {
    #[error("directory lookup failed: {0}")]
    Unavailable(String),
}
