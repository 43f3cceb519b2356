use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use leaderboard_sync::error::AppError;
use leaderboard_sync::leaderboard::achievements::AchievementCatalog;
use leaderboard_sync::leaderboard::{
    CategoryKey, LeaderboardObserver, LeaderboardView, RawParticipant, Role,
};
use serde::Deserialize;

use crate::render::render_view;

pub(crate) fn parse_category(value: &str) -> Result<CategoryKey, String> {
    CategoryKey::parse(value).ok_or_else(|| {
        format!(
            "unknown category '{value}' (expected total, attendance, collaboration, efficiency or innovation)"
        )
    })
}

pub(crate) fn parse_role(value: &str) -> Result<Role, String> {
    if value.trim().is_empty() {
        return Err("role must not be blank".to_string());
    }
    Ok(Role::parse(value))
}

/// Snapshot files hold either a bare record array or `{"records": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SnapshotFile {
    Records(Vec<RawParticipant>),
    Wrapped { records: Vec<RawParticipant> },
}

/// One step of a replay script.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum Frame {
    Records {
        records: Vec<RawParticipant>,
    },
    Error {
        error: String,
        #[serde(default)]
        fallback_fails: bool,
    },
}

pub(crate) fn load_snapshot(path: &Path) -> Result<Vec<RawParticipant>, AppError> {
    let contents = fs::read_to_string(path)?;
    let snapshot: SnapshotFile = serde_json::from_str(&contents)?;
    Ok(match snapshot {
        SnapshotFile::Records(records) | SnapshotFile::Wrapped { records } => records,
    })
}

pub(crate) fn load_frames(path: &Path) -> Result<Vec<Frame>, AppError> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

/// Prints every published view as it arrives.
pub(crate) struct ConsoleObserver {
    catalog: AchievementCatalog,
    limit: usize,
    published: AtomicUsize,
}

impl ConsoleObserver {
    pub(crate) fn new(catalog: AchievementCatalog, limit: usize) -> Self {
        Self {
            catalog,
            limit,
            published: AtomicUsize::new(0),
        }
    }

    pub(crate) fn published(&self) -> usize {
        self.published.load(Ordering::Acquire)
    }
}

impl LeaderboardObserver for ConsoleObserver {
    fn on_publish(&self, view: &LeaderboardView) {
        let count = self.published.fetch_add(1, Ordering::AcqRel) + 1;
        println!("\n== publish #{count} ==");
        render_view(view, &self.catalog, self.limit);
    }
}
