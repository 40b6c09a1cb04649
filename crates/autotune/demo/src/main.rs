#![deny(unsafe_code)]
//! Autotune demo binary.
//!
//! Wires the engine with in-memory storage, an in-memory event stream and
//! simulated cluster metrics, then:
//! 1. streams a synthetic search workload through the consumer
//! 2. lets the applied strategies run through their monitoring windows
//! 3. runs one autonomous learning cycle over the completed events
//! 4. prints the engine counters and the final search weights
//!
//! No external services are required.

mod workload;

use anyhow::Context;
use autotune_engine::{
    EngineConfig, LearningCycleReport, LearningOrchestrator, StateTracker, StreamConsumer,
    ValidationOutcome,
};
use autotune_executor::SearchWeights;
use autotune_metrics::SimulatedMetrics;
use autotune_storage::InMemoryAutotuneStorage;
use autotune_stream::{encode_event, EntryId, EventStream, InMemoryEventStream, StreamCursor};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workload::SearchWorkload;

#[derive(Parser)]
#[command(name = "autotune-demo")]
#[command(about = "Run the autotune engine against a simulated search workload", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "AUTOTUNE_CONFIG")]
    config: Option<String>,

    /// Number of workload events to publish
    #[arg(short, long, default_value_t = 200)]
    events: usize,

    /// How long the consumer runs, in milliseconds
    #[arg(long, default_value_t = 2_000)]
    run_ms: u64,

    /// Log level when RUST_LOG is not set
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Workload seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}

fn section(title: &str) {
    println!();
    println!(" == {title} ");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config =
        EngineConfig::load(cli.config.as_deref()).context("failed to load engine configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    config.logging.json |= cli.json;
    init_tracing(&config.logging.level, config.logging.json);

    // Monitoring windows must close inside the run.
    if config.validation.window_ms > cli.run_ms {
        let interval = config.validation.sample_interval_ms.min(cli.run_ms / 10).max(1);
        tracing::info!(
            configured_ms = config.validation.window_ms,
            window_ms = cli.run_ms / 2,
            "monitoring window shortened to fit the run"
        );
        config.validation = config
            .validation
            .with_window_ms(cli.run_ms / 2)
            .with_sample_interval_ms(interval);
    }

    run(cli.events, cli.run_ms, cli.seed, config).await
}

async fn run(events: usize, run_ms: u64, seed: u64, config: EngineConfig) -> anyhow::Result<()> {
    section("Wiring");
    let storage = Arc::new(InMemoryAutotuneStorage::new());
    let metrics = Arc::new(SimulatedMetrics::new(workload::untuned_metrics()));
    let tracker = Arc::new(StateTracker::load(storage.clone(), config.engine.risk_tolerance).await?);
    let orchestrator = Arc::new(LearningOrchestrator::new(
        storage.clone(),
        metrics.clone(),
        tracker.clone(),
        config.clone(),
    ));
    orchestrator
        .executor()
        .seed_weights(SearchWeights::default())
        .await?;
    println!(
        "   engine {} at risk tolerance {}, window {} ms",
        tracker.status(),
        tracker.state().risk_tolerance(),
        config.validation.window_ms
    );

    section("Streaming workload");
    let stream = Arc::new(InMemoryEventStream::new());
    let consumer = Arc::new(
        StreamConsumer::new(stream.clone(), orchestrator.clone(), config.stream.clone())
            .with_cursor(StreamCursor::After(EntryId::ZERO)),
    );
    consumer.start();

    let mut workload = SearchWorkload::new(seed);
    for event in workload.generate(events) {
        stream.publish(encode_event(&event)?).await?;
    }
    println!("   published {events} events");
    tracing::debug!(events, seed, "workload published");

    tokio::time::sleep(Duration::from_millis(run_ms / 4)).await;
    tracing::info!("switching simulated metrics to the tuned profile");
    metrics.set_current(workload::tuned_metrics());
    tokio::time::sleep(Duration::from_millis(run_ms - run_ms / 4)).await;
    consumer.stop();
    consumer.join().await;

    print_validations(&orchestrator.wait_for_validations().await);

    section("Autonomous learning cycle");
    let report = orchestrator.execute_autonomous_learning_cycle().await;
    print_report(&report);
    orchestrator.shutdown();
    print_validations(&orchestrator.wait_for_validations().await);

    section("Engine counters");
    let snapshot = orchestrator.metrics().snapshot();
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    println!(
        "   validation pass rate {:.1}%",
        snapshot.validation_pass_rate() * 100.0
    );

    section("Search weights");
    match orchestrator.executor().active_weights().await? {
        Some(weights) => println!("{}", serde_json::to_string_pretty(&weights)?),
        None => println!("   no active weights"),
    }
    println!("   engine {}", tracker.status());
    Ok(())
}

fn print_report(report: &LearningCycleReport) {
    match report {
        LearningCycleReport::Completed {
            result_id,
            pattern_count,
            strategy_count,
            executed_count,
        } => println!(
            "   [OK]  {result_id}: {pattern_count} patterns, {strategy_count} strategies, {executed_count} executed"
        ),
        LearningCycleReport::NoPatterns { events_analyzed } => {
            println!("   [--]  no patterns in {events_analyzed} events")
        }
        LearningCycleReport::Skipped => println!("   [--]  engine paused"),
        LearningCycleReport::Failed { error } => {
            tracing::error!(%error, "autonomous learning cycle failed");
            println!("   [!!]  cycle failed: {error}")
        }
    }
}

fn print_validations(outcomes: &[ValidationOutcome]) {
    let kept = outcomes
        .iter()
        .filter(|o| matches!(o, ValidationOutcome::Kept { .. }))
        .count();
    let rolled_back = outcomes.iter().filter(|o| o.rolled_back()).count();
    let cancelled = outcomes
        .iter()
        .filter(|o| matches!(o, ValidationOutcome::Cancelled { .. }))
        .count();
    println!(
        "   validations: {kept} kept, {rolled_back} rolled back, {cancelled} cancelled, {} total",
        outcomes.len()
    );
}
