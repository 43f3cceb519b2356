mod cli;
mod commands;
mod infra;
mod render;

use leaderboard_sync::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
