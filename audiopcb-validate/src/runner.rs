//! Pipeline driver: sequences netlist → placement → routing → zones →
//! validation and runs the bounded refinement loop.
//!
//! ```text
//! Empty → NetlistLoaded → Placed → Routed → Zoned → Validated
//!                            ↑        ↑        ↑        │
//!                            └────────┴────────┴── refine (bounded)
//! Terminal: Finalized | Failed
//! ```
//!
//! Remediations apply in a fixed priority order (connectivity, then
//! clearance, then density, then audio, then manufacturing) so successive
//! iterations cannot oscillate. Identical inputs produce identical boards
//! and reports.

use crate::report::{Category, Severity, ValidationReport};
use crate::rules::{BoardView, RuleEngine};
use audiopcb::board::{Board, LayerStack, Preset};
use audiopcb::config::{Config, LayerPref};
use audiopcb::error::PipelineError;
use audiopcb::kinds::ComponentKind;
use audiopcb::netlist::{NetId, Netlist};
use audiopcb::registry::Registry;
use audiopcb_layout::{nudge, place, pour, resolve_layer, route, route_net, RerouteOptions};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pipeline state, advanced strictly in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageState {
    Empty,
    NetlistLoaded,
    Placed,
    Routed,
    Zoned,
    Validated,
    Finalized,
    Failed,
}

/// What the driver hands back: the (best) board, its netlist, the final
/// report, and how many refinement iterations ran.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub netlist: Netlist,
    pub board: Board,
    pub report: ValidationReport,
    pub state: StageState,
    pub iterations: usize,
}

/// The pipeline driver. Owns the configuration and registry; the board is
/// created here and handed to each stage exclusively in turn.
pub struct Runner {
    pub config: Config,
    pub registry: Registry,
}

impl Runner {
    pub fn new(config: Config) -> Runner {
        let registry = Registry::new(config.prefer_through_hole);
        Runner { config, registry }
    }

    /// Full run with refinement until fixed point, budget, or deadline.
    pub fn run(
        &self,
        netlist: Netlist,
        preset: Preset,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.run_inner(netlist, preset, false)
    }

    /// Stop after the first validation pass; no refinement.
    pub fn validate_only(
        &self,
        netlist: Netlist,
        preset: Preset,
    ) -> Result<PipelineOutcome, PipelineError> {
        self.run_inner(netlist, preset, true)
    }

    fn run_inner(
        &self,
        mut netlist: Netlist,
        preset: Preset,
        validate_only: bool,
    ) -> Result<PipelineOutcome, PipelineError> {
        let started = Instant::now();
        let deadline = self
            .config
            .pipeline
            .deadline_ms
            .map(|ms| started + Duration::from_millis(ms));

        let stack = LayerStack::for_layer_count(self.config.pipeline.layer_count);
        let mut board = Board::new(preset, stack);
        self.materialize_mounting_holes(&mut netlist, &board)?;
        let mut state = StageState::NetlistLoaded;
        debug!(?state, "netlist loaded");

        place(&mut netlist, &board, &self.config)?;
        state = StageState::Placed;
        info!(?state, components = netlist.component_count(), "placement complete");

        let unrouted = route(&netlist, &mut board, &self.config);
        state = StageState::Routed;
        debug!(?state, tracks = board.tracks.len(), "routing complete");
        if !unrouted.is_empty() {
            warn!(count = unrouted.len(), "nets left unrouted after routing pass");
        }

        pour(&netlist, &mut board, &self.config);
        state = StageState::Zoned;
        debug!(?state, zones = board.zones.len(), "zones poured");

        let engine = RuleEngine::with_default_rules();
        let mut report = engine.validate(&BoardView::new(&netlist, &board, &self.config));
        state = StageState::Validated;

        if validate_only {
            return Ok(PipelineOutcome {
                netlist,
                board,
                report,
                state,
                iterations: 0,
            });
        }

        let budget = self.config.pipeline.refinement_budget;
        let mut iterations = 0;
        loop {
            if report.is_valid {
                state = StageState::Finalized;
                break;
            }
            let out_of_time = deadline.map(|d| Instant::now() >= d).unwrap_or(false);
            if iterations >= budget || out_of_time {
                report.exhausted = true;
                state = StageState::Failed;
                warn!(iterations, "refinement budget exhausted");
                break;
            }

            let acted = self.remediate(&report, &mut netlist, &mut board, iterations);
            iterations += 1;
            pour(&netlist, &mut board, &self.config);
            let next = engine.validate(&BoardView::new(&netlist, &board, &self.config));

            // Fixed point without validity: no remediation changed anything,
            // or the report repeats itself.
            let same = serde_json::to_string(&next.issues).unwrap_or_default()
                == serde_json::to_string(&report.issues).unwrap_or_default();
            report = next;
            if report.is_valid {
                state = StageState::Finalized;
                break;
            }
            if !acted || same {
                state = StageState::Failed;
                debug!(iterations, "refinement reached a fixed point while invalid");
                break;
            }
        }

        info!(?state, iterations, valid = report.is_valid, "pipeline done");
        Ok(PipelineOutcome {
            netlist,
            board,
            report,
            state,
            iterations,
        })
    }

    /// Corner mounting holes become fixed components before placement, so
    /// the rest of the engine sees them as obstacles.
    fn materialize_mounting_holes(
        &self,
        netlist: &mut Netlist,
        board: &Board,
    ) -> Result<(), PipelineError> {
        for hole in board.preset.mounting_holes() {
            let id = netlist
                .add_component(&self.registry, ComponentKind::MountingHole, "M3", None)
                .map_err(PipelineError::Netlist)?;
            netlist.component_mut(id).position = Some(hole);
        }
        Ok(())
    }

    /// Apply one remediation pass over the error-and-worse issues, in the
    /// fixed priority order. Returns whether anything was changed.
    fn remediate(
        &self,
        report: &ValidationReport,
        netlist: &mut Netlist,
        board: &mut Board,
        iteration: usize,
    ) -> bool {
        let mut targets: Vec<(u8, &crate::report::Issue)> = report
            .issues
            .iter()
            .filter(|i| i.severity >= Severity::Error)
            .map(|i| (remediation_priority(i.category), i))
            .collect();
        targets.sort_by_key(|(p, _)| *p);

        let mut acted = false;
        for (_, issue) in targets {
            match issue.category {
                Category::Connectivity => {
                    for name in &issue.affected_nets {
                        if let Some(net) = netlist.find_net(name) {
                            debug!(net = %name, "remediate: re-route with raised budget");
                            let opts = RerouteOptions {
                                cost_budget_multiplier: 2.0 + iteration as f64,
                                ..Default::default()
                            };
                            acted |= route_net(netlist, board, &self.config, net, opts).is_ok();
                        }
                    }
                }
                Category::Drc => {
                    // Clearance issues name both nets; re-route the second
                    // with an extra halo. Width issues name one, which the
                    // re-route fixes at class width.
                    if let Some(name) = issue.affected_nets.last() {
                        if let Some(net) = netlist.find_net(name) {
                            debug!(net = %name, "remediate: re-route with extra halo");
                            let opts = RerouteOptions {
                                extra_clearance: 0.2,
                                cost_budget_multiplier: 2.0,
                                ..Default::default()
                            };
                            acted |= route_net(netlist, board, &self.config, net, opts).is_ok();
                        }
                    }
                }
                Category::Thermal => {
                    for reference in &issue.affected_components {
                        let Some(id) = netlist.find_component(reference) else { continue };
                        if nudge(netlist, board, &self.config, id) {
                            debug!(%reference, "remediate: nudged component");
                            acted = true;
                            // Re-route the nets touching the moved part.
                            let touched: Vec<NetId> = netlist
                                .iter_nets()
                                .filter(|(_, n)| {
                                    n.endpoints.iter().any(|ep| ep.component == id)
                                })
                                .map(|(nid, _)| nid)
                                .collect();
                            for net in touched {
                                let _ = route_net(
                                    netlist,
                                    board,
                                    &self.config,
                                    net,
                                    RerouteOptions::default(),
                                );
                            }
                        }
                    }
                }
                Category::SignalIntegrity => {
                    // Crosstalk: move the second net to the opposite layer.
                    if let Some(name) = issue.affected_nets.last() {
                        if let Some(net) = netlist.find_net(name) {
                            let class = netlist.net(net).class;
                            let preferred = self.config.routing.class_rule(class).preferred_layer;
                            let opposite =
                                if resolve_layer(board, preferred) == board.layers.front() {
                                    LayerPref::Back
                                } else {
                                    LayerPref::Front
                                };
                            debug!(net = %name, "remediate: re-route on the opposite layer");
                            let opts = RerouteOptions {
                                prefer_layer: Some(opposite),
                                cost_budget_multiplier: 2.0,
                                ..Default::default()
                            };
                            acted |= route_net(netlist, board, &self.config, net, opts).is_ok();
                        }
                    }
                }
                Category::Audio => {
                    if let Some(name) = issue.affected_nets.first() {
                        if let Some(net) = netlist.find_net(name) {
                            debug!(net = %name, "remediate: re-route audio path");
                            let opts = RerouteOptions {
                                cost_budget_multiplier: 2.0,
                                ..Default::default()
                            };
                            acted |= route_net(netlist, board, &self.config, net, opts).is_ok();
                        }
                    }
                }
                // Power, ground, EMI, and manufacturing findings have no
                // automatic remediation; they stay in the report.
                _ => {}
            }
        }
        acted
    }
}

/// Remediation order: connectivity > clearance > density > audio-specific >
/// manufacturing.
fn remediation_priority(category: Category) -> u8 {
    match category {
        Category::Connectivity => 0,
        Category::Drc => 1,
        Category::Thermal => 2,
        Category::SignalIntegrity => 3,
        Category::Audio => 4,
        Category::Manufacturing => 5,
        _ => 6,
    }
}
