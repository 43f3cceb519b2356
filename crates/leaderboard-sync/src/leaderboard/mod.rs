//! Live leaderboard engine: normalization, eligibility, achievements, ranking and the
//! subscription lifecycle that ties them to a push-updated directory feed.

pub mod achievements;
pub mod badges;
pub mod domain;
pub mod eligibility;
pub mod memory;
pub mod normalizer;
pub mod ranking;
pub mod repository;
pub mod scope;
pub mod subscription;
pub mod view;

#[cfg(test)]
pub(crate) mod tests;

pub use achievements::{
    AchievementCatalog, AchievementDefinition, AchievementEngine, AchievementGrant, ApplyReport,
};
pub use badges::{classify, BadgeKind};
pub use domain::{
    AchievementId, ActorContext, CategoryKey, OrganizationScope, ParticipantId,
    ParticipantRecord, PointBreakdown, PointCategory, RawParticipant, Role,
};
pub use eligibility::{EligibilityPolicy, EligibilityVerdict};
pub use memory::InMemoryDirectory;
pub use normalizer::normalize;
pub use ranking::{chart_series, format_rank, rank, ChartPoint, RankedEntry, CHART_LIMIT};
pub use repository::{
    AchievementStore, FeedToken, GrantError, ScopeDirectory, ScopeLookupError, SnapshotSink,
    SnapshotSource, SourceError,
};
pub use scope::{resolve_scope, DEFAULT_ORGANIZATION};
pub use subscription::{
    LeaderboardSync, LiveSubscription, PipelineRules, SubscriptionError, SubscriptionState,
};
pub use view::{DepartmentFilter, LeaderboardObserver, LeaderboardView};
