//! Error taxonomy for the board generation pipeline.
//!
//! Variants carry structured context rather than strings. Per-net routing
//! failures are deliberately absent here: an unroutable net is recorded on
//! the board and surfaces as a connectivity issue in the validation report,
//! not as an error.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing configuration field `{field}`")]
    Missing { field: String },
    #[error("unknown value `{value}` for `{field}`")]
    UnknownValue { field: String, value: String },
    #[error("`{field}` = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown component kind `{kind}`")]
    UnknownKind { kind: String },
    #[error("kind `{kind}` has no package variant `{package}`")]
    UnknownPackage { kind: String, package: String },
}

#[derive(Debug, Error)]
pub enum NetlistError {
    #[error("component `{reference}` has no pin `{pin}`")]
    UnknownPin { reference: String, pin: String },
    #[error("duplicate net name `{name}`")]
    DuplicateNet { name: String },
    #[error("duplicate component id `{id}`")]
    DuplicateComponent { id: String },
    #[error("no component with id `{id}`")]
    UnknownComponent { id: String },
    #[error("unsupported component type `{name}`")]
    UnsupportedKind { name: String },
    #[error("invalid netlist document: {detail}")]
    Malformed { detail: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// No candidate position satisfied the placement constraints. Fatal: no
/// partial placement is committed.
#[derive(Debug, Clone, Error)]
#[error("cannot place `{reference}`: {reason}")]
pub struct PlacementInfeasible {
    pub reference: String,
    pub reason: String,
}

/// A net could not be routed within the search budget. Non-fatal; the
/// pipeline records it and validation reports the broken connectivity.
#[derive(Debug, Clone, Error)]
#[error("net `{net}` could not be routed within the attempt budget")]
pub struct RoutingInfeasible {
    pub net: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend rejected {operation}: {detail}")]
    Rejected { operation: String, detail: String },
    #[error("backend I/O failure: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level pipeline failure. Each variant knows its remediation hint and
/// documentation tag; the CLI prints all three parts.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration rejected: {0}")]
    Config(#[from] ConfigError),
    #[error("footprint resolution failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("netlist rejected: {0}")]
    Netlist(#[from] NetlistError),
    #[error("placement failed: {0}")]
    Placement(#[from] PlacementInfeasible),
    #[error("validation failed with {errors} error-severity issue(s)")]
    Validation { errors: usize },
    #[error("board backend failed: {0}")]
    Backend(#[from] BackendError),
    #[error("refinement budget exhausted after {iterations} iteration(s)")]
    BudgetExhausted { iterations: usize },
}

impl PipelineError {
    /// Short name of the pipeline operation that produced the error.
    pub fn operation(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "load-config",
            PipelineError::Registry(_) => "resolve-footprints",
            PipelineError::Netlist(_) => "load-netlist",
            PipelineError::Placement(_) => "place-components",
            PipelineError::Validation { .. } => "validate-board",
            PipelineError::Backend(_) => "persist-board",
            PipelineError::BudgetExhausted { .. } => "refine-board",
        }
    }

    /// Suggested remediation, surfaced alongside the cause.
    pub fn remediation(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => {
                "check the configuration file against `audiopcb init-config` output"
            }
            PipelineError::Registry(_) => {
                "register the missing footprint or pick a supported package variant"
            }
            PipelineError::Netlist(_) => {
                "fix the netlist source; every endpoint must name an existing component pin"
            }
            PipelineError::Placement(_) => {
                "use a larger board preset or reduce component count / spacing"
            }
            PipelineError::Validation { .. } => {
                "review the report; error-severity issues list per-issue suggestions"
            }
            PipelineError::Backend(_) => "verify the output path is writable",
            PipelineError::BudgetExhausted { .. } => {
                "raise refinement_budget or relax the failing rule thresholds"
            }
        }
    }

    /// Documentation reference tag (stable across releases).
    pub fn doc_ref(&self) -> &'static str {
        match self {
            PipelineError::Config(_) => "docs/configuration.md#errors",
            PipelineError::Registry(_) => "docs/registry.md#unknown-kinds",
            PipelineError::Netlist(_) => "docs/netlist.md#integrity",
            PipelineError::Placement(_) => "docs/placement.md#infeasible",
            PipelineError::Validation { .. } => "docs/validation.md#severities",
            PipelineError::Backend(_) => "docs/backend.md#errors",
            PipelineError::BudgetExhausted { .. } => "docs/pipeline.md#budget",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_error_carries_context_triplet() {
        let err = PipelineError::Placement(PlacementInfeasible {
            reference: "U7".into(),
            reason: "no free grid candidate in zone".into(),
        });
        assert_eq!(err.operation(), "place-components");
        assert!(err.to_string().contains("U7"));
        assert!(err.doc_ref().starts_with("docs/"));
        assert!(!err.remediation().is_empty());
    }
}
