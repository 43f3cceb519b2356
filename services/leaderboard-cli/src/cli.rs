use clap::{Parser, Subcommand};
use leaderboard_sync::config::AppConfig;
use leaderboard_sync::error::AppError;
use leaderboard_sync::telemetry;

use crate::commands::{
    run_achievements, run_eligibility, run_rank, run_replay, EligibilityArgs, RankArgs,
    ReplayArgs,
};

#[derive(Parser, Debug)]
#[command(
    name = "Leaderboard Sync",
    about = "Rank, replay and inspect organization-scoped leaderboards from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Rank a directory snapshot and print the published leaderboard
    Rank(RankArgs),
    /// Push a sequence of feed frames through a live subscription
    Replay(ReplayArgs),
    /// Print the active achievement catalogue
    Achievements,
    /// Explain whether a role/department pair may appear on the leaderboard
    Eligibility(EligibilityArgs),
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    match cli.command {
        Command::Rank(args) => run_rank(&config, args),
        Command::Replay(args) => run_replay(&config, args).await,
        Command::Achievements => run_achievements(&config),
        Command::Eligibility(args) => run_eligibility(&config, args),
    }
}
