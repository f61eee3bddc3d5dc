//! `busflow-bench`: runs AXI4 master scenarios against the memory slave model.
//!
//! ```text
//! USAGE:
//!   busflow-bench run <config.toml> [--trace]   Run every scenario of a config file
//!   busflow-bench ports                         List the bus wires and their widths
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use busflow_bench::{run_scenario, BenchConfig, BenchError, WireTrace};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "busflow-bench", about = "AXI4 master scenario runner", version)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run every scenario of a config file.
    Run {
        /// TOML scenario file.
        config: PathBuf,
        /// Print the handshakes of every step.
        #[arg(long)]
        trace: bool,
    },
    /// List the bus wires and their widths.
    Ports,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .init();

    match Cli::parse().command {
        Cmd::Run { config, trace } => cmd_run(&config, trace),
        Cmd::Ports => {
            for line in WireTrace::header::<4>() {
                println!("{}", line);
            }
            Ok(())
        }
    }
}

fn cmd_run(path: &Path, trace: bool) -> Result<()> {
    let config = BenchConfig::load(path)?;
    let mut failed = 0;
    for scenario in &config.scenarios {
        let report = match run_scenario(&config, scenario, trace) {
            Err(BenchError::Axi(error)) if error.is_internal() => {
                bail!("scenario {:?}: master adapter lost track of a transaction: {}", scenario.name, error)
            }
            result => result.with_context(|| format!("scenario {:?}", scenario.name))?,
        };
        let stats = &report.stats;
        println!(
            "{:<24} {:>6} steps  {} writes  {} reads  {} error responses  {} aborted  {} unexpected  {}",
            report.name,
            report.steps,
            stats.writes_done,
            stats.reads_done,
            stats.error_responses,
            stats.aborted,
            stats.unexpected_responses,
            if report.passed() { "ok" } else { "FAILED" },
        );
        for mismatch in &report.mismatches {
            println!("    {}", mismatch);
        }
        if let Some(trace) = &report.trace {
            println!("{}", trace);
        }
        failed += usize::from(!report.passed());
    }

    if failed > 0 {
        bail!("{} of {} scenarios failed", failed, config.scenarios.len());
    }
    Ok(())
}
