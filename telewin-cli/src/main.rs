//! CLI for the telewin telemetry window engine.
//!
//! Provides commands for validating window configurations, running a
//! synthetic telemetry session that streams sync operations to stdout, and
//! benchmarking the ingestion path.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use telewin::{Consumer, JsonLinesEgress, Registry, SeriesConfig, TickDriver, WindowConfig};
use tracing_subscriber::EnvFilter;

/// telewin — Live telemetry windows with minimal-diff sync.
#[derive(Parser)]
#[command(name = "telewin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Load and validate a window configuration, then print a summary.
    Check {
        /// Path to the JSON configuration file.
        #[arg(long)]
        config: PathBuf,
    },

    /// Run a synthetic session and stream sync operations as JSON lines.
    Run {
        /// Path to the JSON configuration file.
        #[arg(long)]
        config: PathBuf,

        /// Stop after this many ticks (runs until Ctrl-C when omitted).
        #[arg(long)]
        ticks: Option<u64>,

        /// Override the configured tick period, in milliseconds.
        #[arg(long)]
        period_ms: Option<u64>,

        /// Do not emit per-round axis ranges.
        #[arg(long)]
        no_axes: bool,
    },

    /// Run an ingestion-path microbenchmark.
    Bench {
        /// Number of ticks to simulate.
        #[arg(long, default_value = "100000")]
        ticks: u64,

        /// Number of series to register.
        #[arg(long, default_value = "30")]
        series: u32,

        /// Retention span in ticks.
        #[arg(long, default_value = "1000")]
        span: i64,
    },
}

fn main() {
    // Logs go to stderr so stdout carries only the operation stream.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Check { config } => cmd_check(&config),
        Commands::Run {
            config,
            ticks,
            period_ms,
            no_axes,
        } => cmd_run(&config, ticks, period_ms, no_axes),
        Commands::Bench {
            ticks,
            series,
            span,
        } => cmd_bench(ticks, series, span),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `telewin check --config <file>`.
fn cmd_check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = WindowConfig::load(path)?;

    println!("Config: {}", path.display());
    println!("  Retention span: {} ticks", config.retention_span);
    println!("  Tick period: {:?}", config.tick_period());
    println!("  Window length: {:?}", config.tick_period() * window_ticks(config.retention_span));
    println!("  Series: {}", config.series.len());

    let mut axes: Vec<&str> = config.series.iter().map(|s| s.axis.as_str()).collect();
    axes.sort_unstable();
    axes.dedup();
    for axis in axes {
        println!();
        println!("  Axis \"{axis}\":");
        for series in config.series.iter().filter(|s| s.axis == axis) {
            let group = series
                .group
                .as_deref()
                .map(|g| format!(" group={g}"))
                .unwrap_or_default();
            let color = series
                .color
                .as_deref()
                .map(|c| format!(" color={c}"))
                .unwrap_or_default();
            println!("    - {} \"{}\"{group}{color}", series.name, series.display_title());
        }
    }
    Ok(())
}

fn window_ticks(span: i64) -> u32 {
    u32::try_from(span).unwrap_or(u32::MAX)
}

/// Implements `telewin run --config <file>`.
fn cmd_run(
    path: &Path,
    ticks: Option<u64>,
    period_ms: Option<u64>,
    no_axes: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = WindowConfig::load(path)?;
    if let Some(period_ms) = period_ms {
        config.tick_period_ms = period_ms;
    }
    let series = config.series.clone();
    let registry = Arc::new(Registry::new(config)?);

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async move {
        for (index, series) in series.into_iter().enumerate() {
            tokio::spawn(synthetic_source(Arc::clone(&registry), series, index));
        }

        let egress = JsonLinesEgress::new(std::io::stdout()).with_axes(!no_axes);
        let consumer = tokio::spawn(Consumer::attach(Arc::clone(&registry), egress).run());

        let mut driver = TickDriver::new(Arc::clone(&registry));
        if let Some(ticks) = ticks {
            driver = driver.with_max_ticks(ticks);
        }
        let stats = driver
            .run_until(async {
                if tokio::signal::ctrl_c().await.is_err() {
                    std::future::pending::<()>().await;
                }
                tracing::info!("interrupted");
            })
            .await;

        consumer.await??.into_inner().flush()?;
        tracing::debug!(ticks = stats.ticks, "session finished");
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}

/// Feeds one series with a deterministic waveform until the registry closes.
///
/// Sources run at twice the tick rate, so every tick sees a duplicate-tick
/// push that the series drops.
#[allow(clippy::cast_precision_loss)] // Waveform parameters stay small
async fn synthetic_source(registry: Arc<Registry>, series: SeriesConfig, index: usize) {
    let mut interval = tokio::time::interval(registry.tick_period() / 2);
    let phase = index as f64 * 0.7;
    let amplitude = 10.0 * (index as f64 + 1.0);
    let mut step = 0u64;

    while !registry.is_closed() {
        interval.tick().await;
        let t = step as f64 * 0.1 + phase;
        step += 1;
        let value = amplitude * t.sin() + (t * 0.37).cos();
        if let Err(e) = registry.push(&series.name, value) {
            tracing::warn!(series = %series.name, "source stopped: {e}");
            return;
        }
    }
}

/// Implements `telewin bench`.
#[allow(clippy::cast_precision_loss)] // Benchmark stats are fine with f64 precision
fn cmd_bench(ticks: u64, series_count: u32, span: i64) -> Result<(), Box<dyn std::error::Error>> {
    println!("telewin ingestion benchmark");
    println!("  Ticks: {ticks}");
    println!("  Series: {series_count}");
    println!("  Span: {span}");
    println!();

    let mut config = WindowConfig {
        retention_span: span,
        ..WindowConfig::default()
    };
    for i in 0..series_count {
        config = config.with_series(SeriesConfig::new(format!("metric_{i}"), "bench"));
    }
    let registry = Arc::new(Registry::new(config)?);
    let handles = registry.handles();
    let mut consumer = Consumer::attach(Arc::clone(&registry), JsonLinesEgress::new(std::io::sink()));

    let start = Instant::now();
    let mut sync_time = Duration::ZERO;
    let mut ops = 0;
    for _ in 0..ticks {
        let x = registry.last_x();
        for (i, handle) in handles.iter().enumerate() {
            registry.add(*handle, x, (x as f64) * (i as f64))?;
        }
        registry.tick();

        let sync_start = Instant::now();
        ops += consumer.sync_now()?.ops;
        sync_time += sync_start.elapsed();
    }

    let elapsed = start.elapsed();
    let total_adds = ticks * u64::from(series_count);
    let ns_per_add = (elapsed - sync_time).as_nanos() as f64 / total_adds as f64;
    let ns_per_sync = sync_time.as_nanos() as f64 / ticks as f64;

    println!("Results:");
    println!("  Total adds: {total_adds}");
    println!("  Sync ops: {ops}");
    println!("  Elapsed: {elapsed:.3?}");
    println!("  Avg add+tick: {ns_per_add:.1} ns/add");
    println!("  Avg sync round: {ns_per_sync:.1} ns");
    Ok(())
}
