use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use leaderboard_sync::config::AppConfig;
use leaderboard_sync::error::AppError;
use leaderboard_sync::leaderboard::{
    normalize, resolve_scope, ActorContext, CategoryKey, DepartmentFilter, InMemoryDirectory,
    LeaderboardSync, ParticipantId, RawParticipant, Role, SourceError, SubscriptionError,
    CHART_LIMIT,
};
use serde_json::{json, Map};
use tracing::info;

use crate::infra::{
    load_frames, load_snapshot, parse_category, parse_role, ConsoleObserver, Frame,
};
use crate::render::{render_catalog, render_verdict, render_view};

#[derive(Args, Debug)]
pub(crate) struct SessionArgs {
    /// Role of the acting session; admins also persist newly earned achievements
    #[arg(long, default_value = "admin", value_parser = parse_role)]
    pub(crate) actor_role: Role,
    /// Organization of the acting session; falls back to the actor's directory entry
    #[arg(long)]
    pub(crate) organization: Option<String>,
    /// Directory id of the acting session, used when no organization is given
    #[arg(long)]
    pub(crate) actor_id: Option<String>,
    /// Ranking category (defaults to LEADERBOARD_DEFAULT_CATEGORY)
    #[arg(long, value_parser = parse_category)]
    pub(crate) category: Option<CategoryKey>,
    /// Only rank one department (exact match)
    #[arg(long)]
    pub(crate) department: Option<String>,
    /// Number of entries in the chart series
    #[arg(long, default_value_t = CHART_LIMIT)]
    pub(crate) limit: usize,
}

#[derive(Args, Debug)]
pub(crate) struct RankArgs {
    /// JSON file holding the directory snapshot
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Print the published view as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
    #[command(flatten)]
    pub(crate) session: SessionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// JSON array of frames: {"records": [...]} or {"error": "...", "fallback_fails": bool}
    #[arg(long)]
    pub(crate) frames: PathBuf,
    /// Optional initial snapshot delivered when the feed opens
    #[arg(long)]
    pub(crate) snapshot: Option<PathBuf>,
    /// Pause between frames
    #[arg(long, default_value_t = 0)]
    pub(crate) interval_ms: u64,
    #[command(flatten)]
    pub(crate) session: SessionArgs,
}

#[derive(Args, Debug)]
pub(crate) struct EligibilityArgs {
    #[arg(long)]
    pub(crate) department: String,
    #[arg(long, default_value = "employee")]
    pub(crate) role: String,
}

type DirectorySync = LeaderboardSync<InMemoryDirectory, InMemoryDirectory>;

fn open_session(
    config: &AppConfig,
    directory: &Arc<InMemoryDirectory>,
    session: &SessionArgs,
) -> (DirectorySync, ActorContext) {
    let mut actor = ActorContext::new(session.actor_role.clone(), session.organization.clone());
    if let Some(actor_id) = &session.actor_id {
        actor = actor.with_actor_id(ParticipantId(actor_id.clone()));
    }

    let sync = LeaderboardSync::new(
        Arc::clone(directory),
        Arc::clone(directory),
        actor.clone(),
        config.engine.rules.pipeline_rules(),
        session.category.unwrap_or(config.engine.default_category),
    );
    sync.select_department(DepartmentFilter::from_option(session.department.clone()));
    (sync, actor)
}

pub(crate) fn run_rank(config: &AppConfig, args: RankArgs) -> Result<(), AppError> {
    let RankArgs {
        snapshot,
        json,
        session,
    } = args;

    let directory = Arc::new(InMemoryDirectory::with_records(load_snapshot(&snapshot)?));
    let (sync, actor) = open_session(config, &directory, &session);
    let scope = resolve_scope(
        &actor,
        directory.as_ref(),
        &config.engine.default_organization,
    );

    let live = sync.start(scope)?;
    let view = sync.current().ok_or(SubscriptionError::NotLive)?;
    sync.stop(live);

    if json {
        println!("{}", serde_json::to_string_pretty(view.as_ref())?);
    } else {
        let rules = config.engine.rules.pipeline_rules();
        render_view(&view, rules.engine.catalog(), session.limit);
    }
    Ok(())
}

pub(crate) async fn run_replay(config: &AppConfig, args: ReplayArgs) -> Result<(), AppError> {
    let ReplayArgs {
        frames,
        snapshot,
        interval_ms,
        session,
    } = args;

    let frames = load_frames(&frames)?;
    let initial = match snapshot {
        Some(path) => load_snapshot(&path)?,
        None => Vec::new(),
    };

    let directory = Arc::new(InMemoryDirectory::with_records(initial));
    let (sync, actor) = open_session(config, &directory, &session);
    let catalog = config.engine.rules.pipeline_rules().engine.catalog().clone();
    let observer = Arc::new(ConsoleObserver::new(catalog, session.limit));
    sync.add_observer(observer.clone());

    let scope = resolve_scope(
        &actor,
        directory.as_ref(),
        &config.engine.default_organization,
    );
    let live = sync.start(scope)?;

    for (index, frame) in frames.into_iter().enumerate() {
        if interval_ms > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
        info!(frame = index + 1, state = %sync.state(), "replaying frame");
        match frame {
            Frame::Records { records } => directory.replace_all(records),
            Frame::Error {
                error,
                fallback_fails,
            } => {
                if fallback_fails {
                    directory.fail_next_fetch(SourceError::Unavailable(error.clone()));
                }
                let error = if error.eq_ignore_ascii_case("closed") {
                    SourceError::Closed
                } else {
                    SourceError::Unavailable(error)
                };
                directory.push_error(error);
            }
        }
    }

    println!(
        "\nreplay finished: {} views published, manager {}",
        observer.published(),
        sync.state()
    );
    sync.stop(live);
    Ok(())
}

pub(crate) fn run_achievements(config: &AppConfig) -> Result<(), AppError> {
    let rules = config.engine.rules.pipeline_rules();
    render_catalog(rules.engine.catalog());
    Ok(())
}

pub(crate) fn run_eligibility(config: &AppConfig, args: EligibilityArgs) -> Result<(), AppError> {
    let EligibilityArgs { department, role } = args;

    let mut fields = Map::new();
    fields.insert("department".to_string(), json!(department));
    fields.insert("role".to_string(), json!(role));
    let record = normalize(&RawParticipant::new("cli", fields));

    let rules = config.engine.rules.pipeline_rules();
    let verdict = rules.policy.validate(Some(&record));
    render_verdict(&role, &department, &verdict, &rules.policy);
    Ok(())
}
