//! Ground topology checks: plane coverage, loop area, per-IC ground
//! connections, analog/digital separation, and star-ground discipline.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::geom::Point;
use audiopcb::netlist::SignalClass;

pub struct GroundTopology;

impl Rule for GroundTopology {
    fn id(&self) -> &'static str {
        "ground-topology"
    }

    fn category(&self) -> Category {
        Category::Ground
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        plane_coverage(view, &mut issues);
        loop_area(view, &mut issues);
        ic_ground_connections(view, &mut issues);
        analog_digital_separation(view, &mut issues);
        star_discipline(view, &mut issues);
        issues
    }
}

fn plane_coverage(view: &BoardView, issues: &mut Vec<Issue>) {
    let usable = view.board.usable();
    let usable_area = usable.w * usable.h;
    let ground_area: f64 = view
        .board
        .zones
        .iter()
        .filter(|z| view.netlist.net(z.net).class == SignalClass::Ground)
        .map(|z| z.filled_area())
        .sum();
    let has_ground_net = view
        .netlist
        .iter_nets()
        .any(|(_, n)| n.class == SignalClass::Ground && !n.endpoints.is_empty());
    if !has_ground_net {
        return;
    }
    let coverage = ground_area / usable_area;
    if coverage < view.config.validation.min_plane_coverage {
        issues.push(
            Issue::new(
                Severity::Warning,
                Category::Ground,
                format!(
                    "ground plane coverage {:.0}%, want {:.0}%",
                    coverage * 100.0,
                    view.config.validation.min_plane_coverage * 100.0
                ),
            )
            .suggest("free up the plane layer or add a second ground pour"),
        );
    }
}

/// Loop-area proxy: the bounding box of each ground net's routed tracks.
fn loop_area(view: &BoardView, issues: &mut Vec<Issue>) {
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::Ground {
            continue;
        }
        let points: Vec<Point> = view
            .board
            .tracks
            .iter()
            .filter(|t| t.net == net_id)
            .flat_map(|t| t.points.iter().copied())
            .collect();
        if points.len() < 4 {
            continue;
        }
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let area = (max_x - min_x) * (max_y - min_y);
        if area > view.config.validation.max_ground_loop_area {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Ground,
                    format!(
                        "ground return `{}` spans {:.0} mm², loop limit is {:.0} mm²",
                        net.name, area, view.config.validation.max_ground_loop_area
                    ),
                )
                .net(net.name.clone())
                .suggest("tighten ground returns or rely on the plane")
                .detail("proxy: bounding box of the net's routed tracks"),
            );
        }
    }
}

fn ic_ground_connections(view: &BoardView, issues: &mut Vec<Issue>) {
    let minimum = view.config.validation.min_ground_connections;
    for (comp_id, comp) in view.netlist.iter_components() {
        if !comp.kind.is_active() {
            continue;
        }
        let count = view
            .netlist
            .iter_nets()
            .filter(|(_, n)| n.class == SignalClass::Ground)
            .flat_map(|(_, n)| n.endpoints.iter())
            .filter(|ep| ep.component == comp_id)
            .count();
        if count > 0 && count < minimum {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Ground,
                    format!(
                        "{} has {count} ground connection(s), want at least {minimum}",
                        comp.reference
                    ),
                )
                .component(comp.reference.clone()),
            );
        }
    }
}

/// When both AGND and DGND are declared, their copper must keep the zone
/// clearance apart (they join at a single point off-board or via a bridge).
fn analog_digital_separation(view: &BoardView, issues: &mut Vec<Issue>) {
    let agnd = view.netlist.find_net("AGND");
    let dgnd = view.netlist.find_net("DGND");
    let (Some(agnd), Some(dgnd)) = (agnd, dgnd) else { return };

    let clearance = view.config.zones.min_zone_clearance;
    let a_pads = view.net_pads(agnd);
    let d_pads = view.net_pads(dgnd);
    let worst = a_pads
        .iter()
        .flat_map(|a| d_pads.iter().map(move |d| a.distance(*d)))
        .fold(f64::INFINITY, f64::min);
    if worst < clearance * 4.0 {
        issues.push(
            Issue::new(
                Severity::Warning,
                Category::Ground,
                format!(
                    "analog and digital grounds {:.1} mm apart at the closest pads",
                    worst
                ),
            )
            .net("AGND")
            .net("DGND")
            .suggest("keep analog and digital ground regions separated"),
        );
    }
}

/// With star grounding configured, every ground pad must have a return
/// track reaching the star point.
fn star_discipline(view: &BoardView, issues: &mut Vec<Issue>) {
    if !view.config.zones.star_ground {
        return;
    }
    let Some((sx, sy)) = view.config.zones.star_point else { return };
    let star = Point::new(sx, sy);
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::Ground {
            continue;
        }
        for pad in view.net_pads(net_id) {
            let returned = view
                .board
                .tracks
                .iter()
                .filter(|t| t.net == net_id)
                .any(|t| {
                    let starts = t.points.first().map(|p| p.distance(pad) < 0.5).unwrap_or(false);
                    let ends = t.points.last().map(|p| p.distance(star) < 0.5).unwrap_or(false);
                    starts && ends
                });
            if !returned {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        Category::Ground,
                        format!(
                            "ground pad at ({:.1}, {:.1}) on `{}` has no return to the star point",
                            pad.x, pad.y, net.name
                        ),
                    )
                    .net(net.name.clone())
                    .suggest("re-pour zones with star grounding enabled"),
                );
            }
        }
    }
}
