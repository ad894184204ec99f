//! Power distribution checks: plane coverage, voltage drop, current
//! density, and decoupling capacitor placement.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::kinds::ComponentKind;
use audiopcb::netlist::SignalClass;
use audiopcb::value::parse_eng;

/// 1 oz copper, mm.
const COPPER_THICKNESS: f64 = 0.035;
/// Copper resistivity, ohm·mm.
const COPPER_RESISTIVITY: f64 = 1.68e-5;
/// Assumed rail load for the drop and density estimates, amps.
const ASSUMED_RAIL_CURRENT: f64 = 0.25;

pub struct PowerDistribution;

impl Rule for PowerDistribution {
    fn id(&self) -> &'static str {
        "power-distribution"
    }

    fn category(&self) -> Category {
        Category::Power
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        plane_coverage(view, &mut issues);
        rail_drop_and_density(view, &mut issues);
        decoupling(view, &mut issues);
        issues
    }
}

fn plane_coverage(view: &BoardView, issues: &mut Vec<Issue>) {
    if view.board.layers.count() < 4 {
        return; // two-layer boards carry rails as tracks
    }
    let usable_area = {
        let u = view.board.usable();
        u.w * u.h
    };
    for zone in &view.board.zones {
        let net = view.netlist.net(zone.net);
        if net.class != SignalClass::Power {
            continue;
        }
        let coverage = zone.filled_area() / usable_area;
        if coverage < view.config.validation.min_plane_coverage {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Power,
                    format!(
                        "power plane `{}` covers {:.0}% of the board, want {:.0}%",
                        net.name,
                        coverage * 100.0,
                        view.config.validation.min_plane_coverage * 100.0
                    ),
                )
                .net(net.name.clone())
                .suggest("reduce foreign copper on the plane layer"),
            );
        }
    }
}

fn rail_drop_and_density(view: &BoardView, issues: &mut Vec<Issue>) {
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::Power {
            continue;
        }
        for track in view.board.tracks.iter().filter(|t| t.net == net_id) {
            let cross_section = track.width * COPPER_THICKNESS;
            let resistance = COPPER_RESISTIVITY * track.length() / cross_section;
            let drop = resistance * ASSUMED_RAIL_CURRENT;
            if drop > view.config.validation.max_voltage_drop {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        Category::Power,
                        format!(
                            "rail `{}` drops {:.0} mV over {:.0} mm at {:.2} A",
                            net.name,
                            drop * 1000.0,
                            track.length(),
                            ASSUMED_RAIL_CURRENT
                        ),
                    )
                    .net(net.name.clone())
                    .suggest("widen the rail track or shorten the run")
                    .detail(format!(
                        "model: {COPPER_THICKNESS} mm copper, assumed load {ASSUMED_RAIL_CURRENT} A"
                    )),
                );
            }
            let density = ASSUMED_RAIL_CURRENT / cross_section;
            if density > view.config.validation.max_current_density {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        Category::Power,
                        format!(
                            "rail `{}` current density {:.0} A/mm² exceeds {:.0} A/mm²",
                            net.name, density, view.config.validation.max_current_density
                        ),
                    )
                    .net(net.name.clone())
                    .suggest("widen the rail track"),
                );
            }
        }
    }
}

/// Every active IC power pin wants a decoupling capacitor (1 nF..1 µF) on
/// the same rail within `decoupling_cap_distance`.
fn decoupling(view: &BoardView, issues: &mut Vec<Issue>) {
    let target = view.config.placement.decoupling_cap_distance;
    for (_, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::Power {
            continue;
        }
        let caps: Vec<_> = net
            .endpoints
            .iter()
            .filter(|ep| {
                let c = view.netlist.component(ep.component);
                matches!(c.kind, ComponentKind::Capacitor(_))
                    && matches!(parse_eng(&c.value), Some(v) if (1e-9..=1e-6).contains(&v))
            })
            .collect();
        for ep in &net.endpoints {
            let comp = view.netlist.component(ep.component);
            if !comp.kind.is_active() {
                continue;
            }
            let Some(pin_at) = comp.pin_position(ep.pin) else { continue };
            let served = caps.iter().any(|cap_ep| {
                let cap = view.netlist.component(cap_ep.component);
                cap.pin_map
                    .keys()
                    .filter_map(|&n| cap.pin_position(n))
                    .any(|p| p.distance(pin_at) <= target + 1e-6)
            });
            if !served {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        Category::Power,
                        format!(
                            "no decoupling capacitor within {:.1} mm of {} pin {} on `{}`",
                            target, comp.reference, ep.pin, net.name
                        ),
                    )
                    .component(comp.reference.clone())
                    .net(net.name.clone())
                    .suggest("add a 100 nF capacitor next to the power pin")
                    .doc("docs/validation.md#decoupling"),
                );
            }
        }
    }
}
