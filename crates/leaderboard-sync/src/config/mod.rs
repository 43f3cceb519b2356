use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::leaderboard::achievements::{
    default_definitions, AchievementCatalog, AchievementDefinition, AchievementEngine,
    DEFAULT_ALL_ROUNDER_FLOOR,
};
use crate::leaderboard::eligibility::{EligibilityPolicy, DEFAULT_EXCLUDED_DEPARTMENTS};
use crate::leaderboard::{CategoryKey, PipelineRules, DEFAULT_ORGANIZATION};

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let default_organization = env::var("LEADERBOARD_DEFAULT_ORGANIZATION")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_ORGANIZATION.to_string());

        let default_category = match env::var("LEADERBOARD_DEFAULT_CATEGORY") {
            Ok(value) => {
                CategoryKey::parse(&value).ok_or(ConfigError::InvalidCategory(value))?
            }
            Err(_) => CategoryKey::Total,
        };

        let rules = match env::var("LEADERBOARD_RULES_PATH") {
            Ok(path) if !path.trim().is_empty() => RuleTables::from_path(path.trim())?,
            _ => RuleTables::default(),
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            engine: EngineConfig {
                default_organization,
                default_category,
                rules,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Tenant and ranking defaults plus the static rule tables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub default_organization: String,
    pub default_category: CategoryKey,
    pub rules: RuleTables,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Achievement catalogue and department exclusion list, externalizable as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub achievements: Vec<AchievementDefinition>,
    pub excluded_departments: Vec<String>,
    pub all_rounder_floor: i64,
}

impl Default for RuleTables {
    fn default() -> Self {
        Self {
            achievements: default_definitions(),
            excluded_departments: DEFAULT_EXCLUDED_DEPARTMENTS
                .iter()
                .map(|name| name.to_string())
                .collect(),
            all_rounder_floor: DEFAULT_ALL_ROUNDER_FLOOR,
        }
    }
}

impl RuleTables {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::RulesRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::RulesParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn pipeline_rules(&self) -> PipelineRules {
        PipelineRules {
            policy: EligibilityPolicy::new(&self.excluded_departments),
            engine: AchievementEngine::new(AchievementCatalog::new(
                self.achievements.clone(),
                self.all_rounder_floor,
            )),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidCategory(String),
    RulesRead {
        path: PathBuf,
        source: std::io::Error,
    },
    RulesParse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidCategory(value) => write!(
                f,
                "LEADERBOARD_DEFAULT_CATEGORY must be total, attendance, collaboration, efficiency or innovation (got '{value}')"
            ),
            ConfigError::RulesRead { path, .. } => {
                write!(f, "unable to read rule tables from {}", path.display())
            }
            ConfigError::RulesParse { path, .. } => {
                write!(f, "rule tables in {} are not valid JSON", path.display())
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidCategory(_) => None,
            ConfigError::RulesRead { source, .. } => Some(source),
            ConfigError::RulesParse { source, .. } => Some(source),
        }
    }
}
