use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::task::LocalSet;
use tokio::time::Instant;
use tracing::info;

use crate::config::{EstimatorKind, RuntimeOpts};
use crate::machine::programs::Counter;
use crate::machine::{Machine, Outcome};
use crate::runtime::{init, LocalHost, Phase};

#[derive(Parser)]
#[command(name = "yieldpoint")]
#[command(about = "Yieldpoint - cooperative suspend/resume runtime", long_about = None)]
pub struct Cli {
    /// Path to a TOML file with runtime options
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a counting program under the runtime, yielding to the event loop
    Run {
        /// Number to count up to
        #[arg(long, default_value = "1000000")]
        limit: u64,

        /// Run a nested counter every N ticks
        #[arg(long)]
        nested_every: Option<u64>,

        /// Length of each nested counter
        #[arg(long, default_value = "100")]
        nested_len: u64,

        /// Yield interval in milliseconds (overrides config)
        #[arg(short = 'y', long = "yield")]
        yield_interval_ms: Option<u64>,

        /// Elapsed-time estimator (overrides config)
        #[arg(long, value_enum)]
        estimator: Option<EstimatorKind>,

        /// Stop after this many seconds (overrides config)
        #[arg(long = "stop")]
        stop_secs: Option<f64>,
    },

    /// Print the resolved runtime options as JSON
    Config,
}

/// Summary of a `run` command
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub ticks: u64,
    pub finished: bool,
    pub elapsed: Duration,
}

/// Parse process arguments and run the selected command
pub async fn run_cli() -> Result<()> {
    run_cli_with_args(Cli::parse()).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    let mut opts = RuntimeOpts::load(cli.config.as_deref()).context("Failed to load runtime options")?;

    match cli.command {
        Commands::Run {
            limit,
            nested_every,
            nested_len,
            yield_interval_ms,
            estimator,
            stop_secs,
        } => {
            if let Some(interval) = yield_interval_ms {
                opts.yield_interval_ms = interval;
            }
            if let Some(estimator) = estimator {
                opts.estimator = estimator;
            }
            if stop_secs.is_some() {
                opts.stop_secs = stop_secs;
            }

            let mut program = Counter::new(limit);
            if let Some(every) = nested_every {
                program = program.nested(every, nested_len);
            }

            let report = LocalSet::new().run_until(run_program(program, &opts)).await?;

            if report.finished {
                println!("Finished: counted to {} in {:?}", report.ticks, report.elapsed);
            } else {
                println!(
                    "Stopped: parked after {} of {} ticks ({:?})",
                    report.ticks, limit, report.elapsed
                );
            }
        }

        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&opts)?);
        }
    }

    Ok(())
}

/// Run `program` until it finishes or the forced-stop policy parks it.
///
/// Must be awaited inside a `LocalSet`.
pub async fn run_program(program: Counter, opts: &RuntimeOpts) -> Result<RunReport> {
    let ticks = Rc::new(Cell::new(0));
    let finished = Rc::new(Cell::new(false));

    let program = {
        let ticks = ticks.clone();
        program.on_tick(move |n| ticks.set(n))
    };

    let machine = Rc::new(Machine::new());
    let controller = init(machine.clone(), Rc::new(LocalHost), opts).context("Invalid runtime options")?;
    {
        let finished = finished.clone();
        controller.set_on_end(move || finished.set(true));
    }

    info!(
        yield_interval_ms = opts.yield_interval_ms,
        estimator = ?opts.estimator,
        stop_secs = ?opts.stop_secs,
        "starting program"
    );

    let started = Instant::now();
    if let Outcome::Suspended = machine.start(program, &controller) {
        // Scheduled resumptions run whenever this task yields to the LocalSet.
        while !finished.get() && controller.phase() != Phase::Parked {
            tokio::task::yield_now().await;
        }
    }

    let report = RunReport {
        ticks: ticks.get(),
        finished: finished.get(),
        elapsed: started.elapsed(),
    };
    info!(ticks = report.ticks, finished = report.finished, "program returned control");
    Ok(report)
}
