//! Validation rule catalog.
//!
//! Each rule module is a value implementing [`Rule`]: an id, a category,
//! and a pure `run` over a read-only board snapshot. The engine owns the
//! catalog as data, honors the per-module enable flags, and merges issues
//! in fixed catalog order so reports are reproducible. No rule keeps state
//! across runs.

pub mod audio;
pub mod connectivity;
pub mod drc;
pub mod emi;
pub mod ground;
pub mod manufacturing;
pub mod power;
pub mod signal;
pub mod thermal;

use crate::report::{Category, Issue, ValidationReport};
use audiopcb::board::Board;
use audiopcb::config::Config;
use audiopcb::geom::Point;
use audiopcb::netlist::{NetId, Netlist};
use tracing::debug;

/// Read-only snapshot handed to every rule.
pub struct BoardView<'a> {
    pub netlist: &'a Netlist,
    pub board: &'a Board,
    pub config: &'a Config,
}

impl<'a> BoardView<'a> {
    pub fn new(netlist: &'a Netlist, board: &'a Board, config: &'a Config) -> BoardView<'a> {
        BoardView {
            netlist,
            board,
            config,
        }
    }

    /// Total routed copper length of a net, mm.
    pub fn net_length(&self, net: NetId) -> f64 {
        self.board
            .tracks
            .iter()
            .filter(|t| t.net == net)
            .map(|t| t.length())
            .sum()
    }

    /// Pad landing points of a net's endpoints.
    pub fn net_pads(&self, net: NetId) -> Vec<Point> {
        self.netlist
            .net(net)
            .endpoints
            .iter()
            .filter_map(|ep| self.netlist.component(ep.component).pin_position(ep.pin))
            .collect()
    }
}

/// A validation rule module.
pub trait Rule: Send + Sync {
    fn id(&self) -> &'static str;
    fn category(&self) -> Category;
    fn run(&self, view: &BoardView) -> Vec<Issue>;
}

/// The rule engine: a list of rule values dispatched uniformly, in fixed
/// catalog order.
pub struct RuleEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleEngine {
    pub fn new() -> RuleEngine {
        RuleEngine { rules: Vec::new() }
    }

    /// The full catalog in its canonical order.
    pub fn with_default_rules() -> RuleEngine {
        let mut engine = RuleEngine::new();
        engine.add(Box::new(drc::GeometricDrc));
        engine.add(Box::new(connectivity::Connectivity));
        engine.add(Box::new(power::PowerDistribution));
        engine.add(Box::new(ground::GroundTopology));
        engine.add(Box::new(signal::SignalIntegrity));
        engine.add(Box::new(emi::Emissions));
        engine.add(Box::new(thermal::Thermal));
        engine.add(Box::new(audio::AudioRules));
        engine.add(Box::new(manufacturing::Manufacturing));
        engine
    }

    pub fn add(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// Run every enabled rule and aggregate the report. Module results are
    /// merged in catalog order regardless of how they were computed.
    pub fn validate(&self, view: &BoardView) -> ValidationReport {
        let mut issues = Vec::new();
        for rule in &self.rules {
            if !enabled(rule.category(), view.config) {
                continue;
            }
            let found = rule.run(view);
            debug!(rule = rule.id(), count = found.len(), "rule pass");
            issues.extend(found);
        }
        ValidationReport::new(issues)
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::with_default_rules()
    }
}

fn enabled(category: Category, config: &Config) -> bool {
    let v = &config.validation;
    match category {
        Category::Drc => v.check_drc,
        Category::Connectivity => v.check_connectivity,
        Category::Power => v.check_power,
        Category::Ground => v.check_ground,
        Category::SignalIntegrity => v.check_signal_integrity,
        Category::Emi => v.check_emi,
        Category::Thermal => v.check_thermal,
        Category::Audio => v.check_audio,
        Category::Manufacturing => v.check_manufacturing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiopcb::board::{LayerStack, Preset, PresetId};

    #[test]
    fn disabled_module_produces_no_issues() {
        struct Always;
        impl Rule for Always {
            fn id(&self) -> &'static str {
                "always"
            }
            fn category(&self) -> Category {
                Category::Emi
            }
            fn run(&self, _view: &BoardView) -> Vec<Issue> {
                vec![Issue::new(
                    crate::report::Severity::Error,
                    Category::Emi,
                    "boom",
                )]
            }
        }

        let netlist = Netlist::new();
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        let mut config = Config::default();
        let mut engine = RuleEngine::new();
        engine.add(Box::new(Always));

        let view = BoardView::new(&netlist, &board, &config);
        assert!(!engine.validate(&view).is_valid);

        config.validation.check_emi = false;
        let view = BoardView::new(&netlist, &board, &config);
        assert!(engine.validate(&view).is_valid);
    }

    #[test]
    fn default_catalog_covers_all_categories() {
        let engine = RuleEngine::with_default_rules();
        let categories: Vec<Category> = engine.rules.iter().map(|r| r.category()).collect();
        for want in [
            Category::Drc,
            Category::Connectivity,
            Category::Power,
            Category::Ground,
            Category::SignalIntegrity,
            Category::Emi,
            Category::Thermal,
            Category::Audio,
            Category::Manufacturing,
        ] {
            assert!(categories.contains(&want), "{want:?} missing from catalog");
        }
    }
}
