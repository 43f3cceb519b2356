use super::super::domain::{PointBreakdown, PointCategory};
use super::catalog::AchievementRule;

pub(crate) fn qualifies(points: &PointBreakdown, rule: &AchievementRule) -> bool {
    match *rule {
        AchievementRule::CategoryAtLeast {
            category,
            threshold,
        } => points.get(category) >= threshold,
        AchievementRule::EveryCategoryAtLeast { floor } => PointCategory::ordered()
            .into_iter()
            .all(|category| points.get(category) >= floor),
        AchievementRule::TotalAtLeast { threshold } => points.total() >= threshold,
    }
}
