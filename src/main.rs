//! Strategy Runtime - Replay Entry Point
//!
//! Loads configuration, reads bars as JSON lines and drives one strategy
//! against the paper executor, then reports the resulting orders.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use strategy_runtime::config::load_config;
use strategy_runtime::{
    Bar, BoxedIndicatorSuite, BoxedStrategy, CapitalRotationScheduler, DetachedSuite, Executor,
    InMemoryMetrics, MetricsRecorder, PaperExecutor, TrendFollower, TrendReversionFsm,
};

/// Strategy to replay
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// HMA crossover trend follower
    Trend,
    /// Trend-then-mean-reversion state machine
    Hybrid,
    /// Top-K capital rotation across the configured universe
    Rotation,
}

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// JSON-lines file of bars ("-" for stdin)
    #[arg(short, long, default_value = "-")]
    input: String,

    /// Strategy to run
    #[arg(short, long, value_enum, default_value_t = Mode::Trend)]
    mode: Mode,

    /// Symbol traded in single-symbol modes
    #[arg(short, long, default_value = "DEFAULT")]
    symbol: String,

    /// Starting equity (overrides settings.starting_equity)
    #[arg(long, env = "STRATEGY_EQUITY")]
    equity: Option<f64>,

    /// Log level (trace, debug, info, warn, error); overrides settings.log_level
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

enum Driver {
    Single(BoxedStrategy),
    Rotation(CapitalRotationScheduler),
}

impl Driver {
    fn process(&mut self, bar: &Bar) {
        match self {
            Driver::Single(strategy) => strategy.process_bar(bar),
            Driver::Rotation(scheduler) => match bar.symbol.as_deref() {
                Some(symbol) => {
                    if let Err(e) = scheduler.try_process_bar(symbol, bar) {
                        warn!(error = %e, "rotation bar skipped");
                    }
                }
                None => warn!("rotation bar without symbol skipped"),
            },
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(Some(args.config.as_str())).context("loading configuration")?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.settings.log_level.clone());
    init_logging(&level, args.json || config.settings.log_json)?;

    info!("Starting strategy replay");
    info!("Configuration file: {}", args.config);

    let equity = args.equity.unwrap_or(config.settings.starting_equity);
    let executor = Arc::new(PaperExecutor::new(equity));
    let metrics = Arc::new(InMemoryMetrics::new());

    let mut driver = build_driver(&args, &config, executor.clone(), metrics.clone())?;

    let reader: Box<dyn BufRead> = if args.input == "-" {
        Box::new(BufReader::new(io::stdin()))
    } else {
        let file = File::open(&args.input)
            .with_context(|| format!("opening input {}", args.input))?;
        Box::new(BufReader::new(file))
    };

    let mut bars = 0usize;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.context("reading input")?;
        if line.trim().is_empty() {
            continue;
        }
        let bar: Bar = match serde_json::from_str(&line) {
            Ok(bar) => bar,
            Err(e) => {
                warn!(line = lineno + 1, error = %e, "unparseable bar skipped");
                continue;
            }
        };
        debug!(line = lineno + 1, close = bar.close, "bar");
        driver.process(&bar);
        bars += 1;
    }

    for order in executor.orders() {
        println!("{}", serde_json::to_string(&order)?);
    }
    for (tag, count) in metrics.snapshot() {
        info!(tag = %tag, count, "orders by tag");
    }
    info!(
        bars,
        orders = executor.orders().len(),
        submitted = metrics.total_submitted(),
        dropped = executor.dropped().len(),
        open = ?executor.open_symbols(),
        equity = executor.equity(),
        "replay complete"
    );

    Ok(())
}

fn build_driver(
    args: &Args,
    config: &strategy_runtime::AppConfig,
    executor: Arc<PaperExecutor>,
    metrics: Arc<InMemoryMetrics>,
) -> Result<Driver> {
    let executor: Arc<dyn Executor> = executor;
    let metrics: Arc<dyn MetricsRecorder> = metrics;
    let strategy = config.strategy.clone();

    let driver = match args.mode {
        Mode::Trend => Driver::Single(Box::new(
            TrendFollower::new(&args.symbol, strategy, executor, Box::new(DetachedSuite::new()))?
                .with_metrics(metrics),
        )),
        Mode::Hybrid => Driver::Single(Box::new(
            TrendReversionFsm::new(&args.symbol, strategy, executor, Box::new(DetachedSuite::new()))?
                .with_metrics(metrics),
        )),
        Mode::Rotation => {
            let Some(rotation) = config.rotation.clone() else {
                bail!("rotation mode needs a [rotation] section in {}", args.config);
            };
            Driver::Rotation(CapitalRotationScheduler::with_metrics(
                strategy,
                rotation,
                executor,
                |_: &str| -> strategy_runtime::Result<BoxedIndicatorSuite> {
                    Ok(Box::new(DetachedSuite::new()))
                },
                metrics,
            )?)
        }
    };
    Ok(driver)
}

fn init_logging(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr);

    if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
    .map_err(|e| anyhow!(e))
}
