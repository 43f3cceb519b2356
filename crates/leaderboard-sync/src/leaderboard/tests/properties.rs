use proptest::prelude::*;
use serde_json::json;

use super::common::participant;
use crate::leaderboard::achievements::AchievementEngine;
use crate::leaderboard::badges::{classify, BadgeKind};
use crate::leaderboard::domain::{CategoryKey, PointCategory, RawParticipant, Role};
use crate::leaderboard::eligibility::{EligibilityPolicy, DEFAULT_EXCLUDED_DEPARTMENTS};
use crate::leaderboard::normalizer::normalize;
use crate::leaderboard::ranking::rank;

fn category_key() -> impl Strategy<Value = CategoryKey> {
    prop_oneof![
        Just(CategoryKey::Total),
        Just(CategoryKey::Category(PointCategory::Attendance)),
        Just(CategoryKey::Category(PointCategory::Collaboration)),
        Just(CategoryKey::Category(PointCategory::Efficiency)),
        Just(CategoryKey::Category(PointCategory::Innovation)),
    ]
}

fn role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Employee),
        Just(Role::Admin),
        "[a-z]{1,8}".prop_map(|value| Role::parse(&value)),
    ]
}

fn department() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        prop::sample::select(DEFAULT_EXCLUDED_DEPARTMENTS)
            .prop_map(|name| Some(format!("  {}", name.to_uppercase()))),
        "\\PC{0,24}".prop_map(Some),
    ]
}

fn scores() -> impl Strategy<Value = [i64; 4]> {
    prop::array::uniform4(-10_000_i64..10_000)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn total_is_always_recomputed(points in scores(), stored_total in any::<i64>()) {
        let [attendance, collaboration, efficiency, innovation] = points;
        let raw: RawParticipant = serde_json::from_value(json!({
            "id": "p",
            "points": {
                "attendance": attendance,
                "collaboration": collaboration,
                "efficiency": efficiency,
                "innovation": innovation,
                "total": stored_total
            }
        }))
        .expect("raw record");

        let record = normalize(&raw);

        prop_assert_eq!(
            record.points.total(),
            attendance + collaboration + efficiency + innovation
        );
    }

    #[test]
    fn eligibility_is_deterministic_and_excludes_admins(role in role(), department in department()) {
        let policy = EligibilityPolicy::default();
        let first = policy.is_eligible(&role, department.as_deref());
        let second = policy.is_eligible(&role, department.as_deref());

        prop_assert_eq!(first, second);
        if role.is_admin() {
            prop_assert!(!first);
        }
    }

    #[test]
    fn filtering_is_idempotent(rows in prop::collection::vec((role(), department(), scores()), 0..16)) {
        let policy = EligibilityPolicy::default();
        let records: Vec<_> = rows
            .into_iter()
            .enumerate()
            .map(|(index, (role, department, points))| {
                let mut record = participant(&format!("p{index}"), "", points);
                record.role = role;
                record.department = department;
                record
            })
            .collect();

        let once = policy.filter_eligible(records);
        let twice = policy.filter_eligible(once.clone());

        prop_assert_eq!(once, twice);
    }

    #[test]
    fn ranking_is_descending_and_stable(
        rows in prop::collection::vec(prop::array::uniform4(0_i64..5), 0..20),
        category in category_key(),
    ) {
        let records: Vec<_> = rows
            .iter()
            .enumerate()
            .map(|(index, points)| participant(&format!("p{index:02}"), "Ops", *points))
            .collect();

        let ranked = rank(&records, category);

        prop_assert_eq!(ranked.len(), records.len());
        for (index, pair) in ranked.windows(2).enumerate() {
            prop_assert!(pair[0].score >= pair[1].score);
            if pair[0].score == pair[1].score {
                // Ids are zero padded, so lexical order is input order.
                prop_assert!(pair[0].record.id.0 < pair[1].record.id.0);
            }
            prop_assert_eq!(pair[0].rank, index + 1);
        }
    }

    #[test]
    fn compute_is_idempotent_once_grants_are_merged(points in prop::array::uniform4(0_i64..700)) {
        let engine = AchievementEngine::default();
        let mut record = participant("p", "Ops", points);

        let first = engine.newly_qualified(&record);
        record.achievements.extend(first);

        prop_assert!(engine.newly_qualified(&record).is_empty());
    }

    #[test]
    fn badge_depends_on_position_then_score(score in any::<i64>(), index in -5_i64..40) {
        let badge = classify(score, index);
        if index < 10 {
            prop_assert_eq!(badge, Some(BadgeKind::Top10));
        } else if score > 1000 {
            prop_assert_eq!(badge, Some(BadgeKind::Consistent));
        } else {
            prop_assert_eq!(badge, None);
        }
    }
}
