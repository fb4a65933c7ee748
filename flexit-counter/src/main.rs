//! Flexit rep counter - Main entry point
//!
//! Replays a recorded landmark stream through a workout session, counts
//! repetitions and saves the finished workout to the backend (or a local
//! JSONL file when no backend is configured).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry};

use flexit_common::{
    Clock, EventBus, MonotonicClock, ProfileRegistry, SessionEvent, SessionSummary,
    WorkoutSession,
};
use flexit_counter::{
    pump, spawn_session, Error, HttpRecordSink, JsonlRecordSink, PoseSource, ReplaySource,
    SessionDeps, TomlConfig, WorkoutRecordSink, WorkoutTotals,
};

/// Every this many reps the counter announces progress
const MILESTONE_INTERVAL: u32 = 5;

/// Command-line arguments for flexit-counter
#[derive(Parser, Debug)]
#[command(name = "flexit-counter")]
#[command(about = "Count exercise repetitions from pose landmark frames")]
#[command(version)]
struct Args {
    /// Exercise to count (see --list)
    #[arg(short, long, required_unless_present_any = ["list", "history"])]
    exercise: Option<String>,

    /// Target repetitions (defaults to the exercise's default target)
    #[arg(short, long)]
    target: Option<u32>,

    /// JSONL landmark recording to replay
    #[arg(short, long, env = "FLEXIT_FRAMES", required_unless_present_any = ["list", "history"])]
    frames: Option<PathBuf>,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Pace replayed frames by their recorded timestamps
    #[arg(long)]
    realtime: bool,

    /// Workout backend base URL (overrides the config file)
    #[arg(long, env = "FLEXIT_API_URL")]
    api_url: Option<String>,

    /// Print the known exercises and exit
    #[arg(long)]
    list: bool,

    /// Print saved workout totals and exit
    #[arg(long, conflicts_with = "list")]
    history: bool,
}

/// Log filter from `RUST_LOG`, or `info` until the config file supplies a level
fn startup_filter(
    from_env: Option<EnvFilter>,
) -> (reload::Layer<EnvFilter, Registry>, reload::Handle<EnvFilter, Registry>) {
    reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new("info")))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over the configured level
    let env_filter = EnvFilter::try_from_default_env().ok();
    let level_from_env = env_filter.is_some();
    let (filter, filter_handle) = startup_filter(env_filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (config, config_source) =
        TomlConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if !level_from_env {
        filter_handle
            .reload(EnvFilter::new(&config.logging.level))
            .context("Failed to apply configured log level")?;
    }

    info!("Configuration: {}", config_source);

    let registry = Arc::new(
        config
            .registry()
            .context("Invalid exercise configuration")?,
    );

    if args.list {
        print_registry(&registry);
        return Ok(());
    }

    let sink: Arc<dyn WorkoutRecordSink> = match args.api_url.or(config.api.base_url.clone()) {
        Some(base_url) => Arc::new(
            HttpRecordSink::new(&base_url, config.api.resolved_token(), config.api.timeout())
                .context("Failed to create backend client")?,
        ),
        None => Arc::new(JsonlRecordSink::new(config.session.records_path.clone())),
    };
    info!(sink = sink.name(), "Workout records sink ready");

    if args.history {
        let records = sink
            .history()
            .await
            .context("Failed to read workout history")?;
        print_history(&WorkoutTotals::from_records(&records));
        return Ok(());
    }

    let exercise = args.exercise.context("--exercise is required")?;
    let frames_path = args.frames.context("--frames is required")?;

    let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());

    let mut session = WorkoutSession::new(registry);
    let selected = match args.target {
        Some(target) => session.select_with_target(&exercise, target),
        None => session.select(&exercise),
    };
    selected.with_context(|| format!("Cannot select exercise '{}'", exercise))?;

    let mut source = ReplaySource::new(frames_path, clock.clone(), args.realtime);
    source
        .prepare()
        .await
        .context("Failed to prepare pose source")?;
    session
        .start(source.is_ready(), clock.now())
        .context("Failed to start session")?;

    let event_bus = EventBus::new(256);
    let progress = tokio::spawn(announce_progress(event_bus.subscribe()));

    let cancel = CancellationToken::new();
    let (frames, handle) = spawn_session(
        session,
        SessionDeps {
            sink,
            event_bus,
            clock,
            frame_queue_capacity: config.session.frame_queue_capacity,
            backpressure: config.session.on_full,
            cancel: cancel.clone(),
        },
    );
    let pump_task = tokio::spawn(async move { pump(&mut source, frames, cancel).await });

    let finished = handle.cancelled_token();
    tokio::select! {
        _ = signal::ctrl_c() => {
            info!("Interrupt received, stopping session");
            handle.stop();
        }
        _ = finished.cancelled() => {}
    }

    let outcome = handle.wait().await;

    match pump_task.await {
        Ok(Ok(stats)) => info!(
            delivered = stats.delivered,
            dropped = stats.dropped,
            "Pose pump finished"
        ),
        Ok(Err(e)) => warn!("Pose source ended with error: {}", e),
        Err(e) => warn!("Pose pump task failed: {}", e),
    }
    progress.abort();

    match outcome {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(Error::Persistence { summary, source }) => {
            print_summary(&summary);
            Err(anyhow::Error::new(source).context("Workout finished but could not be saved"))
        }
        Err(e) => Err(e).context("Session failed"),
    }
}

async fn announce_progress(mut events: broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::RepCompleted { count, target, .. }) => {
                if count == target {
                    info!(count, "Target reached");
                } else if count % MILESTONE_INTERVAL == 0 {
                    info!(count, target, "{} reps done", count);
                }
            }
            Ok(SessionEvent::SessionCompleted { .. }) => break,
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "Progress listener fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_registry(registry: &ProfileRegistry) {
    println!("{:<10} {:<16} {:>6} {:>6} {:>8}  rule", "id", "name", "down", "up", "target");
    for profile in registry.iter() {
        println!(
            "{:<10} {:<16} {:>6.1} {:>6.1} {:>8}  {}",
            profile.id,
            profile.display_name,
            profile.down_angle,
            profile.up_angle,
            profile.default_target,
            profile.rule
        );
    }
}

fn print_history(totals: &WorkoutTotals) {
    println!("{} workouts, {} reps", totals.workouts, totals.reps);
    for (exercise, t) in &totals.per_exercise {
        println!("{:<10} {:>4} workouts {:>6} reps", exercise, t.workouts, t.reps);
    }
}

fn print_summary(summary: &SessionSummary) {
    let outcome = if summary.reached_target {
        "target reached"
    } else {
        "stopped"
    };
    println!(
        "{}: {}/{} reps in {:.1}s ({})",
        summary.exercise_id,
        summary.count,
        summary.target,
        summary.elapsed.as_secs_f64(),
        outcome
    );
    println!(
        "frames: {} accepted, {} rejected, {} degenerate",
        summary.frames.accepted, summary.frames.rejected, summary.frames.degenerate
    );
}
