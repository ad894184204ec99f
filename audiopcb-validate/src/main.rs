//! Audio PCB generator CLI.
//!
//! Reads a normalized netlist JSON, runs the placement → routing → zones →
//! validation pipeline, and writes the board plus a validation report.
//!
//! ```bash
//! # Generate a pedal board
//! audiopcb run circuit.json --preset pedal --output board.kicad_pcb
//!
//! # First-pass validation only, markdown report
//! audiopcb run circuit.json --preset eurorack --validate-only \
//!     --report report.md --format markdown
//!
//! # Write a default configuration to edit
//! audiopcb init-config > audiopcb.yaml
//! ```
//!
//! Exit codes: 0 finalized; 2 placement infeasible; 3 connectivity left
//! broken; 4 validation failed; 5 refinement budget exhausted.

use anyhow::{bail, Context};
use audiopcb::backend::{emit, BoardBackend, SexprBackend};
use audiopcb::board::{Preset, PresetId};
use audiopcb::config::Config;
use audiopcb::error::PipelineError;
use audiopcb::falstad;
use audiopcb_validate::report::{Category, ReportFormat, Severity};
use audiopcb_validate::runner::{Runner, StageState};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "audiopcb")]
#[command(about = "Generate fabrication-ready audio PCBs from circuit netlists")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Raise log verbosity from warnings to info
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on a netlist
    Run {
        /// Netlist JSON (elements + wires)
        netlist: PathBuf,

        /// Board preset: eurorack, eurorack_1u, pedal, pedal_mini,
        /// desktop, rack, custom
        #[arg(short, long, default_value = "pedal")]
        preset: String,

        /// Custom board width in mm (preset = custom)
        #[arg(long)]
        width: Option<f64>,

        /// Custom board height in mm (preset = custom)
        #[arg(long)]
        height: Option<f64>,

        /// Configuration YAML
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Board output path
        #[arg(short, long, default_value = "board.kicad_pcb")]
        output: PathBuf,

        /// Validation report output path
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Report format: json, csv, html, markdown
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Stop after the first validation pass, without refinement
        #[arg(long)]
        validate_only: bool,

        /// Accept netlists containing unsupported component types
        #[arg(long)]
        lenient: bool,

        /// Show the detailed issue table
        #[arg(short, long)]
        detailed: bool,
    },

    /// Print a default configuration YAML
    InitConfig,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{} {err:#}", "error:".red().bold());
            std::process::exit(1);
        }
    }
}

/// Log level comes from AUDIOPCB_LOG (then RUST_LOG); --verbose raises the
/// floor to info.
fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = std::env::var("AUDIOPCB_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::InitConfig => {
            print!("{}", serde_yaml::to_string(&Config::default())?);
            Ok(0)
        }
        Commands::Run {
            netlist,
            preset,
            width,
            height,
            config,
            output,
            report,
            format,
            validate_only,
            lenient,
            detailed,
        } => {
            let config = match config {
                Some(path) => Config::load(&path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => Config::default(),
            };
            let preset = resolve_preset(&preset, width, height)?;
            let format = ReportFormat::parse(&format)
                .with_context(|| format!("unknown report format `{format}`"))?;

            let runner = Runner::new(config);
            let json = std::fs::read_to_string(&netlist)
                .with_context(|| format!("reading netlist {}", netlist.display()))?;
            let parsed = falstad::import(&json, &runner.registry, !lenient)
                .map_err(PipelineError::Netlist)?;

            let result = if validate_only {
                runner.validate_only(parsed, preset)
            } else {
                runner.run(parsed, preset)
            };
            let outcome = match result {
                Ok(outcome) => outcome,
                Err(err) => return Ok(report_pipeline_error(&err)),
            };

            outcome.report.print_summary();
            if detailed {
                outcome.report.print_detailed();
            }
            if let Some(path) = report {
                outcome
                    .report
                    .save(&path, format)
                    .with_context(|| format!("writing report {}", path.display()))?;
            }

            // The board is only persisted once the pipeline accepts it.
            if outcome.state == StageState::Finalized {
                let mut backend = SexprBackend::new();
                emit(&outcome.board, &outcome.netlist, &mut backend)
                    .map_err(PipelineError::Backend)?;
                backend
                    .persist(&output)
                    .map_err(PipelineError::Backend)?;
                println!("board written to {}", output.display());
            }

            Ok(exit_code(&outcome))
        }
    }
}

/// Errors surface with their operation, cause, remediation, and doc tag.
fn report_pipeline_error(err: &PipelineError) -> i32 {
    eprintln!(
        "{} [{}] {err}\n  {} {}\n  {} {}",
        "error:".red().bold(),
        err.operation(),
        "fix:".yellow(),
        err.remediation(),
        "see:".dimmed(),
        err.doc_ref()
    );
    match err {
        PipelineError::Placement(_) => 2,
        PipelineError::Validation { .. } => 4,
        PipelineError::BudgetExhausted { .. } => 5,
        _ => 1,
    }
}

fn resolve_preset(name: &str, width: Option<f64>, height: Option<f64>) -> anyhow::Result<Preset> {
    let id = PresetId::parse(name)
        .with_context(|| format!("unknown board preset `{name}`"))?;
    if id == PresetId::Custom {
        let (Some(w), Some(h)) = (width, height) else {
            bail!("preset `custom` requires --width and --height");
        };
        Ok(Preset::lookup_custom(id, w, h))
    } else {
        Ok(Preset::lookup(id))
    }
}

fn exit_code(outcome: &audiopcb_validate::runner::PipelineOutcome) -> i32 {
    match outcome.state {
        StageState::Finalized | StageState::Validated => {
            if outcome.report.is_valid {
                0
            } else {
                4
            }
        }
        StageState::Failed => {
            if outcome.report.exhausted {
                5
            } else if outcome.report.issues.iter().any(|i| {
                i.category == Category::Connectivity && i.severity >= Severity::Error
            }) {
                3
            } else {
                4
            }
        }
        _ => 1,
    }
}
