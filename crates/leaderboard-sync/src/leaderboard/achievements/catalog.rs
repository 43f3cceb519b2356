use std::fmt;

use serde::{Deserialize, Serialize};

use super::super::domain::{AchievementId, PointCategory};

pub const DEFAULT_ALL_ROUNDER_FLOOR: i64 = 50;

/// Category column of a catalogue entry: one of the four categories, or the `total`/`composite`
/// sentinel for rules spanning every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AchievementCategory {
    Points(PointCategory),
    Total,
    Composite,
}

impl AchievementCategory {
    pub fn key(&self) -> &'static str {
        match self {
            AchievementCategory::Points(category) => category.key(),
            AchievementCategory::Total => "total",
            AchievementCategory::Composite => "composite",
        }
    }
}

impl TryFrom<String> for AchievementCategory {
    type Error = UnknownAchievementCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let category = match value.trim().to_ascii_lowercase().as_str() {
            "total" => AchievementCategory::Total,
            "composite" => AchievementCategory::Composite,
            other => PointCategory::ordered()
                .into_iter()
                .find(|category| category.key() == other)
                .map(AchievementCategory::Points)
                .ok_or_else(|| UnknownAchievementCategory(value.clone()))?,
        };
        Ok(category)
    }
}

impl From<AchievementCategory> for String {
    fn from(value: AchievementCategory) -> Self {
        value.key().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown achievement category '{0}'")]
pub struct UnknownAchievementCategory(pub String);

/// Static catalogue entry. A `threshold` of zero marks a rule-based rather than threshold-based
/// achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: AchievementCategory,
    #[serde(default)]
    pub threshold: i64,
    #[serde(default)]
    pub icon: String,
}

impl AchievementDefinition {
    /// The unlock condition this entry encodes, if it has one.
    pub fn rule(&self, all_rounder_floor: i64) -> Option<AchievementRule> {
        match (self.category, self.threshold > 0) {
            (AchievementCategory::Points(category), true) => Some(AchievementRule::CategoryAtLeast {
                category,
                threshold: self.threshold,
            }),
            (AchievementCategory::Points(_), false) => None,
            (AchievementCategory::Total | AchievementCategory::Composite, true) => {
                Some(AchievementRule::TotalAtLeast {
                    threshold: self.threshold,
                })
            }
            (AchievementCategory::Total | AchievementCategory::Composite, false) => {
                Some(AchievementRule::EveryCategoryAtLeast {
                    floor: all_rounder_floor,
                })
            }
        }
    }
}

/// Unlock condition evaluated against a normalized point breakdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AchievementRule {
    CategoryAtLeast {
        category: PointCategory,
        threshold: i64,
    },
    EveryCategoryAtLeast {
        floor: i64,
    },
    TotalAtLeast {
        threshold: i64,
    },
}

impl fmt::Display for AchievementRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AchievementRule::CategoryAtLeast {
                category,
                threshold,
            } => write!(f, "{} >= {threshold}", category.key()),
            AchievementRule::EveryCategoryAtLeast { floor } => {
                write!(f, "every category >= {floor}")
            }
            AchievementRule::TotalAtLeast { threshold } => write!(f, "total >= {threshold}"),
        }
    }
}

/// Ordered achievement table plus the all-rounder floor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AchievementCatalog {
    definitions: Vec<AchievementDefinition>,
    all_rounder_floor: i64,
}

impl AchievementCatalog {
    pub fn new(definitions: Vec<AchievementDefinition>, all_rounder_floor: i64) -> Self {
        Self {
            definitions,
            all_rounder_floor,
        }
    }

    pub fn definitions(&self) -> &[AchievementDefinition] {
        &self.definitions
    }

    pub fn all_rounder_floor(&self) -> i64 {
        self.all_rounder_floor
    }

    pub fn find(&self, id: &AchievementId) -> Option<&AchievementDefinition> {
        self.definitions.iter().find(|definition| &definition.id == id)
    }

    pub fn rules(&self) -> impl Iterator<Item = (&AchievementDefinition, AchievementRule)> + '_ {
        self.definitions.iter().filter_map(move |definition| {
            definition
                .rule(self.all_rounder_floor)
                .map(|rule| (definition, rule))
        })
    }
}

impl Default for AchievementCatalog {
    fn default() -> Self {
        Self::new(default_definitions(), DEFAULT_ALL_ROUNDER_FLOOR)
    }
}

pub fn default_definitions() -> Vec<AchievementDefinition> {
    fn entry(
        id: &str,
        name: &str,
        description: &str,
        category: AchievementCategory,
        threshold: i64,
        icon: &str,
    ) -> AchievementDefinition {
        AchievementDefinition {
            id: AchievementId::new(id),
            name: name.to_string(),
            description: description.to_string(),
            category,
            threshold,
            icon: icon.to_string(),
        }
    }

    vec![
        entry(
            "attendance_master",
            "Attendance Master",
            "Reach 100 attendance points",
            AchievementCategory::Points(PointCategory::Attendance),
            100,
            "📅",
        ),
        entry(
            "collaboration_champion",
            "Collaboration Champion",
            "Reach 100 collaboration points",
            AchievementCategory::Points(PointCategory::Collaboration),
            100,
            "🤝",
        ),
        entry(
            "efficiency_expert",
            "Efficiency Expert",
            "Reach 100 efficiency points",
            AchievementCategory::Points(PointCategory::Efficiency),
            100,
            "⚡",
        ),
        entry(
            "innovation_leader",
            "Innovation Leader",
            "Reach 100 innovation points",
            AchievementCategory::Points(PointCategory::Innovation),
            100,
            "💡",
        ),
        entry(
            "all_rounder",
            "All-Rounder",
            "Reach 50 points in all categories",
            AchievementCategory::Total,
            0,
            "🌟",
        ),
        entry(
            "total_champion",
            "Total Champion",
            "Reach 500 total points",
            AchievementCategory::Total,
            500,
            "👑",
        ),
    ]
}
