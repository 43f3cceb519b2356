use serde::Serialize;

pub const TOP_BADGE_POSITIONS: i64 = 10;
pub const CONSISTENT_SCORE_FLOOR: i64 = 1000;

/// Cosmetic per-row badge derived from the active ordering. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeKind {
    Top10,
    Consistent,
}

impl BadgeKind {
    pub fn label(&self) -> &'static str {
        match self {
            BadgeKind::Top10 => "top10",
            BadgeKind::Consistent => "consistent",
        }
    }
}

/// Position wins over score: any index below ten is `Top10` regardless of the score.
pub fn classify(score: i64, rank_index: i64) -> Option<BadgeKind> {
    if rank_index < TOP_BADGE_POSITIONS {
        return Some(BadgeKind::Top10);
    }
    if score > CONSISTENT_SCORE_FLOOR {
        return Some(BadgeKind::Consistent);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_ten_positions_always_badge() {
        for index in -3..10 {
            assert_eq!(classify(0, index), Some(BadgeKind::Top10));
            assert_eq!(classify(5000, index), Some(BadgeKind::Top10));
        }
    }

    #[test]
    fn outside_top_ten_requires_score_above_floor() {
        assert_eq!(classify(1200, 10), Some(BadgeKind::Consistent));
        assert_eq!(classify(1001, 20), Some(BadgeKind::Consistent));
        assert_eq!(classify(1000, 15), None);
        assert_eq!(classify(800, 15), None);
    }
}
