use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Args;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use core_game::session::spawn_training_batch;
use core_game::{
    load_rules_config_from_env, run_parallel_batch, BatchProgress, CancelToken, IngestQueue,
    RulesConfig, SimulationConfig, TrainingAggregator, TrainingRecord,
};

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Total number of games to play.
    #[arg(long, default_value_t = 1_000)]
    games: u64,
    /// Games per batch; the record is saved after each one.
    #[arg(long, default_value_t = 100)]
    batch: u64,
    /// Base seed. Defaults to the rules config.
    #[arg(long)]
    seed: Option<u64>,
    /// First game index. Defaults to the record's next unplayed index,
    /// counting discarded games.
    #[arg(long)]
    start_index: Option<u64>,
    /// Worker threads for parallel self-play. 1 plays games in order on a
    /// single blocking task.
    #[arg(long, default_value_t = 1)]
    workers: usize,
    /// Exploration rate override.
    #[arg(long)]
    exploration: Option<f64>,
    /// Training record to resume from and write back to.
    #[arg(long, default_value = "training_record.json")]
    out: PathBuf,
}

pub async fn run(args: TrainArgs) -> Result<()> {
    let rules = load_rules_config_from_env();
    let aggregator = Arc::new(restore_aggregator(&args.out, rules.clone()).await?);

    let mut config = SimulationConfig::from_rules(&rules);
    if let Some(seed) = args.seed {
        config = config.with_seed(seed);
    }
    if let Some(rate) = args.exploration {
        config = config.with_exploration_rate(rate);
    }
    let mut next_index = args
        .start_index
        .unwrap_or_else(|| aggregator.next_game_index());
    let batch_size = args.batch.max(1);
    let mut remaining = args.games;

    info!(
        target: "companion::cli",
        games = args.games,
        batch = batch_size,
        workers = args.workers,
        start_index = next_index,
        seed = config.base_seed,
        "train.started"
    );

    while remaining > 0 {
        let games = remaining.min(batch_size);
        let chunk_config = config.clone().starting_at(next_index);
        let progress = if args.workers > 1 {
            run_parallel_chunk(games, chunk_config, &rules, &aggregator, args.workers).await?
        } else {
            run_chunk(games, chunk_config, &rules, &aggregator).await?
        };

        save_record(&args.out, &aggregator).await?;
        let stats = aggregator.stats();
        println!(
            "games {:>7} | data points {:>9} | accuracy {:>5.1}% | model v{}",
            stats.games_played, stats.data_points, stats.model_accuracy, stats.model_version
        );

        next_index = progress.next_game_index;
        if progress.cancelled {
            warn!(
                target: "companion::cli",
                resume_index = next_index,
                completed = progress.games_completed,
                "train.interrupted"
            );
            println!("interrupted; resume with --start-index {next_index}");
            return Ok(());
        }
        remaining -= games;
    }

    info!(target: "companion::cli", next_index, "train.finished");
    Ok(())
}

/// One batch in game order on the blocking pool, with progress and ctrl-c.
async fn run_chunk(
    games: u64,
    config: SimulationConfig,
    rules: &Arc<RulesConfig>,
    aggregator: &Arc<TrainingAggregator>,
) -> Result<BatchProgress> {
    let handle = spawn_training_batch(games, config, rules.clone(), aggregator.clone());
    let cancel = handle.cancel_token();
    let mut progress = handle.progress();
    let join = handle.join();
    tokio::pin!(join);

    let mut watching = true;
    let mut interrupted = false;
    loop {
        tokio::select! {
            report = &mut join => {
                let report = report?;
                info!(
                    target: "companion::cli",
                    completed = report.progress.games_completed,
                    failed = report.progress.games_failed,
                    samples = report.action_samples,
                    "batch.completed"
                );
                return Ok(report.progress);
            }
            changed = progress.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                let snapshot = *progress.borrow();
                tracing::debug!(
                    target: "companion::cli",
                    completed = snapshot.games_completed,
                    remaining = snapshot.games_remaining(),
                    "batch.progress"
                );
            }
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.wrap_err("failed to listen for ctrl-c")?;
                interrupted = true;
                cancel.cancel();
            }
        }
    }
}

/// One batch spread over a dedicated rayon pool, fed to the aggregator
/// through its ingest queue.
async fn run_parallel_chunk(
    games: u64,
    config: SimulationConfig,
    rules: &Arc<RulesConfig>,
    aggregator: &Arc<TrainingAggregator>,
    workers: usize,
) -> Result<BatchProgress> {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let rules = rules.clone();
    let aggregator = aggregator.clone();
    let task: JoinHandle<Result<BatchProgress>> = tokio::task::spawn_blocking(move || {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .wrap_err("failed to build worker pool")?;
        let model = aggregator.model();
        let queue = IngestQueue::spawn(aggregator);
        let progress = pool.install(|| {
            run_parallel_batch(games, &config, &rules, &model, &token, queue.sender())
        });
        queue.finish();
        Ok(progress)
    });
    tokio::pin!(task);

    let mut interrupted = false;
    loop {
        tokio::select! {
            outcome = &mut task => return outcome?,
            signal = tokio::signal::ctrl_c(), if !interrupted => {
                signal.wrap_err("failed to listen for ctrl-c")?;
                interrupted = true;
                cancel.cancel();
            }
        }
    }
}

pub async fn load_record(path: &Path) -> Result<TrainingRecord> {
    let json = tokio::fs::read_to_string(path)
        .await
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Ok(TrainingRecord::from_json(&json)?)
}

async fn restore_aggregator(path: &Path, rules: Arc<RulesConfig>) -> Result<TrainingAggregator> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        info!(target: "companion::cli", path = %path.display(), "record.fresh");
        return Ok(TrainingAggregator::new(rules));
    }
    let record = load_record(path).await?;
    info!(
        target: "companion::cli",
        path = %path.display(),
        games_played = record.games_played,
        next_game_index = record.next_game_index,
        "record.restored"
    );
    Ok(record.into_aggregator(rules)?)
}

async fn save_record(path: &Path, aggregator: &TrainingAggregator) -> Result<()> {
    let json = TrainingRecord::capture(aggregator)?.to_json()?;
    tokio::fs::write(path, json)
        .await
        .wrap_err_with(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
