use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier wrapper for directory entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for achievement catalogue entries.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AchievementId(pub String);

impl AchievementId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AchievementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The four scored dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointCategory {
    Attendance,
    Collaboration,
    Efficiency,
    Innovation,
}

impl PointCategory {
    pub fn ordered() -> [PointCategory; 4] {
        [
            PointCategory::Attendance,
            PointCategory::Collaboration,
            PointCategory::Efficiency,
            PointCategory::Innovation,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            PointCategory::Attendance => "attendance",
            PointCategory::Collaboration => "collaboration",
            PointCategory::Efficiency => "efficiency",
            PointCategory::Innovation => "innovation",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PointCategory::Attendance => "Attendance",
            PointCategory::Collaboration => "Collaboration",
            PointCategory::Efficiency => "Efficiency",
            PointCategory::Innovation => "Innovation",
        }
    }
}

/// Sort key selected by the ranking view: one category or the derived total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CategoryKey {
    #[default]
    Total,
    Category(PointCategory),
}

impl CategoryKey {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "total" => Some(CategoryKey::Total),
            "attendance" => Some(CategoryKey::Category(PointCategory::Attendance)),
            "collaboration" => Some(CategoryKey::Category(PointCategory::Collaboration)),
            "efficiency" => Some(CategoryKey::Category(PointCategory::Efficiency)),
            "innovation" => Some(CategoryKey::Category(PointCategory::Innovation)),
            _ => None,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            CategoryKey::Total => "total",
            CategoryKey::Category(category) => category.key(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CategoryKey::Total => "Total Points",
            CategoryKey::Category(category) => category.label(),
        }
    }
}

impl TryFrom<String> for CategoryKey {
    type Error = UnknownCategory;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CategoryKey::parse(&value).ok_or(UnknownCategory(value))
    }
}

impl From<CategoryKey> for String {
    fn from(value: CategoryKey) -> Self {
        value.key().to_string()
    }
}

/// Raised when a category name is not one of the four categories or `total`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown point category '{0}'")]
pub struct UnknownCategory(pub String);

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Directory role. Matching is exact, so `"Admin"` is carried verbatim as [`Role::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Role {
    Employee,
    Admin,
    Other(String),
}

impl Role {
    pub fn parse(value: &str) -> Self {
        match value {
            "admin" => Role::Admin,
            "employee" => Role::Employee,
            _ => Role::Other(value.to_string()),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }

    pub fn label(&self) -> &str {
        match self {
            Role::Employee => "employee",
            Role::Admin => "admin",
            Role::Other(value) => value,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        Role::parse(&value)
    }
}

impl From<Role> for String {
    fn from(value: Role) -> Self {
        value.label().to_string()
    }
}

/// Canonical point breakdown. `total` is only ever produced by [`PointBreakdown::new`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointBreakdown {
    attendance: i64,
    collaboration: i64,
    efficiency: i64,
    innovation: i64,
    total: i64,
}

impl PointBreakdown {
    pub fn new(attendance: i64, collaboration: i64, efficiency: i64, innovation: i64) -> Self {
        let total = attendance
            .saturating_add(collaboration)
            .saturating_add(efficiency)
            .saturating_add(innovation);
        Self {
            attendance,
            collaboration,
            efficiency,
            innovation,
            total,
        }
    }

    pub fn get(&self, category: PointCategory) -> i64 {
        match category {
            PointCategory::Attendance => self.attendance,
            PointCategory::Collaboration => self.collaboration,
            PointCategory::Efficiency => self.efficiency,
            PointCategory::Innovation => self.innovation,
        }
    }

    pub fn score(&self, key: CategoryKey) -> i64 {
        match key {
            CategoryKey::Total => self.total,
            CategoryKey::Category(category) => self.get(category),
        }
    }

    pub fn total(&self) -> i64 {
        self.total
    }
}

/// Directory entry exactly as delivered by the data source: an id plus loosely typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawParticipant {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl RawParticipant {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Normalized participant record consumed by every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantRecord {
    pub id: ParticipantId,
    pub display_name: String,
    pub email: Option<String>,
    pub organization_id: Option<String>,
    pub department: Option<String>,
    pub role: Role,
    pub points: PointBreakdown,
    pub achievements: BTreeSet<AchievementId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub legacy_score: Option<i64>,
}

impl ParticipantRecord {
    pub fn holds(&self, achievement: &AchievementId) -> bool {
        self.achievements.contains(achievement)
    }
}

/// Authenticated actor handed to the engine by the session boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    #[serde(default)]
    pub actor_id: Option<ParticipantId>,
    pub role: Role,
    #[serde(default)]
    pub organization_id: Option<String>,
}

impl ActorContext {
    pub fn new(role: Role, organization_id: Option<String>) -> Self {
        Self {
            actor_id: None,
            role,
            organization_id,
        }
    }

    pub fn with_actor_id(mut self, actor_id: ParticipantId) -> Self {
        self.actor_id = Some(actor_id);
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

/// Resolved tenant key; every read and write funnels through one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganizationScope(String);

impl OrganizationScope {
    pub fn new(organization_id: impl Into<String>) -> Self {
        Self(organization_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_matching_is_exact() {
        assert_eq!(Role::parse("admin"), Role::Admin);
        assert_eq!(Role::parse("employee"), Role::Employee);
        assert_eq!(Role::parse("Admin"), Role::Other("Admin".to_string()));
        assert!(!Role::parse(" admin").is_admin());
        assert_eq!(Role::parse("manager").label(), "manager");
    }
}
