//! Organization-scoped leaderboard synchronization.
//!
//! The engine observes a live feed of participant records for one tenant, normalizes them,
//! filters out evaluators, grants achievements and publishes a deterministically ordered ranking.

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod telemetry;
