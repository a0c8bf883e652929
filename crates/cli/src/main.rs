//! CVA6 pipeline timing model CLI.
//!
//! This binary drives the pipeline model from JSON files. It provides:
//! 1. **Run:** Simulate a workload under a configuration and report statistics.
//! 2. **Defaults:** Print the default configuration as JSON, as a starting point for edits.
//! 3. **Check:** Validate a configuration file without running anything.
//!
//! Log output goes to stderr and is filtered by `RUST_LOG` (default `warn`), or raised with `-v`.

use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use cva6_core::Simulator;
use cva6_core::config::Config;
use cva6_core::core::pipeline::latches::CommitRecord;
use cva6_core::sim::StopReason;
use cva6_core::soc::{FlatMemory, MemoryConfig, Program};
use cva6_core::stats::STATS_SECTIONS;
use tracing::info;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(
    name = "cva6sim",
    author,
    version,
    about = "Cycle-level timing model of a CVA6-style in-order pipeline",
    long_about = "Run JSON workloads through the Fetch1/Fetch2/Decode/Execute pipeline model.\n\nExamples:\n  cva6sim defaults > cva6.json\n  cva6sim check --config cva6.json\n  cva6sim run --config cva6.json --workload loop.json --stats summary,memory"
)]
struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). Ignored when RUST_LOG is set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Simulate a workload.
    Run {
        /// Pipeline configuration (JSON). Defaults are used when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Workload: per-thread instruction streams (JSON).
        #[arg(short, long)]
        workload: PathBuf,

        /// Memory latencies, fault ranges and initial contents (JSON).
        #[arg(short, long)]
        memory: Option<PathBuf>,

        /// Stop after this many cycles.
        #[arg(long, default_value_t = 10_000_000)]
        max_cycles: u64,

        /// Statistics sections to print, comma separated. All when omitted.
        #[arg(long, value_delimiter = ',')]
        stats: Vec<String>,

        /// Write one JSON object per committed instruction to this file.
        #[arg(long)]
        commit_log: Option<PathBuf>,

        /// Print the run summary as JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Print the default configuration as JSON.
    Defaults,

    /// Validate a configuration file.
    Check {
        /// Pipeline configuration (JSON).
        #[arg(short, long)]
        config: PathBuf,
    },
}

fn init_logging(verbose: u8) {
    let fallback = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Run {
            config,
            workload,
            memory,
            max_cycles,
            stats,
            commit_log,
            json,
        } => cmd_run(RunArgs {
            config,
            workload,
            memory,
            max_cycles,
            stats,
            commit_log,
            json,
        }),
        Commands::Defaults => cmd_defaults(),
        Commands::Check { config } => cmd_check(&config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

struct RunArgs {
    config: Option<PathBuf>,
    workload: PathBuf,
    memory: Option<PathBuf>,
    max_cycles: u64,
    stats: Vec<String>,
    commit_log: Option<PathBuf>,
    json: bool,
}

fn load_config(path: Option<&Path>) -> CliResult<Config> {
    match path {
        Some(path) => Ok(Config::from_json_file(path)?),
        None => Ok(Config::default()),
    }
}

fn load_memory(path: Option<&Path>) -> CliResult<MemoryConfig> {
    match path {
        Some(path) => Ok(MemoryConfig::from_json(&fs::read_to_string(path)?)?),
        None => Ok(MemoryConfig::default()),
    }
}

/// Runs the workload and prints the summary and statistics.
///
/// Exits with failure when the run hit the cycle limit or stopped with work still pending.
fn cmd_run(args: RunArgs) -> CliResult<ExitCode> {
    if let Some(unknown) = args
        .stats
        .iter()
        .find(|s| !STATS_SECTIONS.contains(&s.as_str()))
    {
        return Err(format!(
            "unknown stats section '{unknown}' (expected one of {})",
            STATS_SECTIONS.join(", ")
        )
        .into());
    }

    let config = load_config(args.config.as_deref())?;
    let memory = load_memory(args.memory.as_deref())?;
    let program = Program::from_json_file(&args.workload)?;
    info!(
        workload = %args.workload.display(),
        threads = program.threads.len(),
        "loaded workload"
    );

    let mut sim = Simulator::new(config, program, FlatMemory::new(memory))?;
    let summary = sim.run(args.max_cycles)?;

    if let Some(path) = &args.commit_log {
        write_commit_log(path, sim.commit_log())?;
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "[*] {:?} after {} cycles, {} instructions committed",
            summary.stop, summary.cycles, summary.committed
        );
        sim.stats().print_sections(&args.stats);
    }

    Ok(match summary.stop {
        StopReason::AllHalted => ExitCode::SUCCESS,
        StopReason::Quiesced | StopReason::MaxCycles => ExitCode::FAILURE,
    })
}

fn write_commit_log(path: &Path, records: &[CommitRecord]) -> CliResult<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for record in records {
        let line = serde_json::json!({
            "inst": record.id.to_string(),
            "thread": record.id.thread,
            "pc": format!("{:#x}", record.pc),
            "opClass": record.op_class,
            "issue": record.issue_cycle,
            "commit": record.commit_cycle,
            "traceTime": record.trace_time,
            "fu": record.fu_index,
            "loadValue": record.load_value,
            "fault": record.fault.map(|f| f.to_string()),
            "mispredicted": record.mispredicted,
        });
        writeln!(out, "{line}")?;
    }
    out.flush()?;
    Ok(())
}

fn cmd_defaults() -> CliResult<ExitCode> {
    println!("{}", serde_json::to_string_pretty(&Config::default())?);
    Ok(ExitCode::SUCCESS)
}

fn cmd_check(path: &Path) -> CliResult<ExitCode> {
    let config = Config::from_json_file(path)?;
    println!(
        "{}: ok ({} threads, {} functional units)",
        path.display(),
        config.num_threads,
        config.execute_func_units.func_units.len()
    );
    Ok(ExitCode::SUCCESS)
}
