use serde::Serialize;

use super::badges::{classify, BadgeKind};
use super::domain::{CategoryKey, ParticipantRecord};

pub const CHART_LIMIT: usize = 10;

/// One row of the published ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntry {
    pub record: ParticipantRecord,
    pub rank: usize,
    pub rank_label: String,
    pub score: i64,
    pub badge: Option<BadgeKind>,
}

/// Orders `records` by the selected category, highest first.
///
/// Sorting is stable: records with equal scores keep their relative input order.
pub fn rank<'a, I>(records: I, category: CategoryKey) -> Vec<RankedEntry>
where
    I: IntoIterator<Item = &'a ParticipantRecord>,
{
    let mut ordered: Vec<&ParticipantRecord> = records.into_iter().collect();
    ordered.sort_by(|left, right| {
        right
            .points
            .score(category)
            .cmp(&left.points.score(category))
    });

    ordered
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            let score = record.points.score(category);
            let rank = index + 1;
            RankedEntry {
                record: record.clone(),
                rank,
                rank_label: format_rank(rank),
                score,
                badge: classify(score, index as i64),
            }
        })
        .collect()
}

/// English ordinal suffix with the 11th to 13th exception.
pub fn ordinal_suffix(rank: usize) -> &'static str {
    if (11..=13).contains(&(rank % 100)) {
        return "th";
    }
    match rank % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

pub fn format_rank(rank: usize) -> String {
    format!("{rank}{}", ordinal_suffix(rank))
}

/// Bar chart input: one labelled value per leading entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: i64,
}

pub fn chart_series(entries: &[RankedEntry], limit: usize) -> Vec<ChartPoint> {
    entries
        .iter()
        .take(limit)
        .map(|entry| ChartPoint {
            label: entry.record.display_name.clone(),
            value: entry.score,
        })
        .collect()
}
