//! Validation engine and pipeline driver for the audio PCB pipeline.
//!
//! - [`rules`] — the rule catalog: geometric DRC, connectivity, power
//!   distribution, ground topology, signal integrity, EMI/EMC, thermal,
//!   audio-specific, and manufacturing modules, dispatched uniformly by the
//!   [`rules::RuleEngine`]
//! - [`report`] — issues, severities, and the `ValidationReport` with its
//!   JSON / CSV / HTML / Markdown renderers
//! - [`runner`] — the pipeline state machine with bounded refinement
//!
//! The `audiopcb` binary in this crate is the CLI front end.

pub mod report;
pub mod rules;
pub mod runner;

pub use report::{Category, Issue, ReportFormat, Severity, ValidationReport};
pub use rules::{BoardView, Rule, RuleEngine};
pub use runner::{PipelineOutcome, Runner, StageState};
