//! Maps stored directory entries onto the canonical [`ParticipantRecord`] shape.
//!
//! Two `points` layouts coexist in stored data: a legacy bare integer and the four-category
//! object. Both collapse to a [`PointBreakdown`] whose total is recomputed from the categories.
//! Normalization never fails; anything missing or malformed becomes zero or `None`.

use std::collections::BTreeSet;

use serde_json::Value;

use super::domain::{
    AchievementId, ParticipantId, ParticipantRecord, PointBreakdown, PointCategory,
    RawParticipant, Role,
};

const FIELD_DISPLAY_NAME: &str = "displayName";
const FIELD_EMAIL: &str = "email";
const FIELD_ORGANIZATION: &str = "organizationId";
const FIELD_DEPARTMENT: &str = "department";
const FIELD_ROLE: &str = "role";
const FIELD_POINTS: &str = "points";
const FIELD_ACHIEVEMENTS: &str = "achievements";

pub fn normalize(raw: &RawParticipant) -> ParticipantRecord {
    let email = string_field(raw.field(FIELD_EMAIL));
    let display_name = string_field(raw.field(FIELD_DISPLAY_NAME))
        .or_else(|| email.as_deref().and_then(email_local_part))
        .unwrap_or_else(|| raw.id.clone());

    let (points, legacy_score) = normalize_points(raw.field(FIELD_POINTS));

    ParticipantRecord {
        id: ParticipantId(raw.id.clone()),
        display_name,
        email,
        organization_id: string_field(raw.field(FIELD_ORGANIZATION)),
        // Department is kept verbatim; eligibility does its own folding.
        department: raw
            .field(FIELD_DEPARTMENT)
            .and_then(Value::as_str)
            .map(str::to_string),
        role: raw
            .field(FIELD_ROLE)
            .and_then(Value::as_str)
            .map(Role::parse)
            .unwrap_or(Role::Employee),
        points,
        achievements: normalize_achievements(raw.field(FIELD_ACHIEVEMENTS)),
        legacy_score,
    }
}

pub fn normalize_all(raw: &[RawParticipant]) -> Vec<ParticipantRecord> {
    raw.iter().map(normalize).collect()
}

/// Returns the canonical breakdown plus the legacy flat score when the stored shape was legacy.
pub fn normalize_points(value: Option<&Value>) -> (PointBreakdown, Option<i64>) {
    match value {
        Some(Value::Object(fields)) => {
            let mut scores = [0_i64; 4];
            for (slot, category) in scores.iter_mut().zip(PointCategory::ordered()) {
                *slot = fields.get(category.key()).map(integer_or_zero).unwrap_or(0);
            }
            let [attendance, collaboration, efficiency, innovation] = scores;
            (
                PointBreakdown::new(attendance, collaboration, efficiency, innovation),
                None,
            )
        }
        Some(legacy @ Value::Number(_)) => {
            (PointBreakdown::default(), Some(integer_or_zero(legacy)))
        }
        _ => (PointBreakdown::default(), None),
    }
}

fn integer_or_zero(value: &Value) -> i64 {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| {
                number
                    .as_f64()
                    .filter(|float| float.is_finite())
                    .map(|float| float.trunc() as i64)
            })
            .unwrap_or(0),
        _ => 0,
    }
}

fn normalize_achievements(value: Option<&Value>) -> BTreeSet<AchievementId> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(AchievementId::new)
            .collect(),
        _ => BTreeSet::new(),
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn email_local_part(email: &str) -> Option<String> {
    email
        .split('@')
        .next()
        .map(str::trim)
        .filter(|local| !local.is_empty())
        .map(str::to_string)
}
