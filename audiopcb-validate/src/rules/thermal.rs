//! Thermal checks: temperature-rise estimates for dissipating parts,
//! relief copper under their tabs, and dissipator clustering.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::kinds::{ComponentKind, TransistorKind};

/// Free-air thermal resistance assumed for through-hole power packages,
/// °C/W.
const THETA_JA: f64 = 60.0;

pub struct Thermal;

impl Rule for Thermal {
    fn id(&self) -> &'static str {
        "thermal"
    }

    fn category(&self) -> Category {
        Category::Thermal
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        temperature_rise(view, &mut issues);
        relief_copper(view, &mut issues);
        dissipator_density(view, &mut issues);
        issues
    }
}

/// Nominal dissipation per kind, watts. Zero means the part does not count
/// as a dissipator.
fn dissipation(kind: ComponentKind) -> f64 {
    match kind {
        ComponentKind::Regulator => 1.0,
        ComponentKind::Tube => 2.0,
        ComponentKind::Transistor(TransistorKind::Mosfet) => 0.5,
        ComponentKind::OpAmp(_) | ComponentKind::Vca | ComponentKind::Vcf | ComponentKind::Vco => {
            0.1
        }
        _ => 0.0,
    }
}

fn temperature_rise(view: &BoardView, issues: &mut Vec<Issue>) {
    let limit = view.config.validation.max_temperature_rise;
    for (_, comp) in view.netlist.iter_components() {
        let power = dissipation(comp.kind);
        if power == 0.0 {
            continue;
        }
        let rise = power * THETA_JA;
        if rise > limit {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Thermal,
                    format!(
                        "{} rises an estimated {rise:.0} °C above ambient (limit {limit:.0} °C)",
                        comp.reference
                    ),
                )
                .component(comp.reference.clone())
                .suggest("add a heatsink or spread dissipation across parts")
                .detail(format!("model: {power} W at {THETA_JA} °C/W free air")),
            );
        }
    }
}

fn relief_copper(view: &BoardView, issues: &mut Vec<Issue>) {
    let min_pad = view.config.validation.min_thermal_pad_size;
    for (_, comp) in view.netlist.iter_components() {
        if dissipation(comp.kind) < 0.5 {
            continue;
        }
        let (w, h) = comp.courtyard;
        if w.min(h) < min_pad {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Thermal,
                    format!(
                        "{} dissipates but its land is only {:.1} mm across",
                        comp.reference,
                        w.min(h)
                    ),
                )
                .component(comp.reference.clone())
                .suggest("use a footprint with a larger thermal land"),
            );
        }
    }
}

fn dissipator_density(view: &BoardView, issues: &mut Vec<Issue>) {
    let radius = view.config.validation.dissipating_density_radius;
    let cap = view.config.validation.max_dissipating_density;
    let hot: Vec<_> = view
        .netlist
        .iter_components()
        .filter(|(_, c)| dissipation(c.kind) > 0.0)
        .filter_map(|(_, c)| c.position.map(|p| (c.reference.clone(), p)))
        .collect();
    for (reference, at) in &hot {
        let nearby = hot
            .iter()
            .filter(|(other, p)| other != reference && p.distance(*at) <= radius)
            .count();
        if nearby >= cap {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Thermal,
                    format!(
                        "{reference} has {nearby} other dissipating parts within {radius:.0} mm"
                    ),
                )
                .component(reference.clone())
                .suggest("spread the hot components out"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiopcb::board::{Board, LayerStack, Preset, PresetId};
    use audiopcb::config::Config;
    use audiopcb::geom::Point;
    use audiopcb::netlist::Netlist;
    use audiopcb::registry::Registry;

    #[test]
    fn hot_tube_trips_temperature_estimate() {
        let registry = Registry::default();
        let mut nl = Netlist::new();
        let v1 = nl
            .add_component(&registry, ComponentKind::Tube, "12AX7", None)
            .unwrap();
        nl.component_mut(v1).position = Some(Point::new(60.0, 30.0));
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = Thermal.run(&view);
        assert!(issues.iter().any(|i| i.message.contains("above ambient")));
    }

    #[test]
    fn clustered_regulators_warn_on_density() {
        let registry = Registry::default();
        let mut nl = Netlist::new();
        for i in 0..4 {
            let reg = nl
                .add_component(&registry, ComponentKind::Regulator, "LM7812", None)
                .unwrap();
            nl.component_mut(reg).position = Some(Point::new(40.0 + 4.0 * i as f64, 30.0));
        }
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = Thermal.run(&view);
        assert!(issues.iter().any(|i| i.message.contains("dissipating parts")));
    }

    #[test]
    fn passive_board_is_quiet() {
        let registry = Registry::default();
        let mut nl = Netlist::new();
        let r1 = nl
            .add_component(&registry, ComponentKind::Resistor, "10k", None)
            .unwrap();
        nl.component_mut(r1).position = Some(Point::new(60.0, 30.0));
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        assert!(Thermal.run(&view).is_empty());
    }
}
