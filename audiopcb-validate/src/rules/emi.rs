//! EMI/EMC checks: supply loop area, shielding hints, and an emissions
//! proxy driven by fast-edge copper length.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::netlist::SignalClass;

/// Track length of fast-edge copper at which the emissions proxy saturates.
const EMISSIONS_SCALE: f64 = 500.0;

pub struct Emissions;

impl Rule for Emissions {
    fn id(&self) -> &'static str {
        "emi-emc"
    }

    fn category(&self) -> Category {
        Category::Emi
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        supply_loop_area(view, &mut issues);
        shielding(view, &mut issues);
        emissions_proxy(view, &mut issues);
        issues
    }
}

/// Supply loop proxy: bounding-box area of each power net's tracks. A
/// ground plane under the rail collapses the loop, so boards with a ground
/// pour get a pass.
fn supply_loop_area(view: &BoardView, issues: &mut Vec<Issue>) {
    let has_ground_pour = view
        .board
        .zones
        .iter()
        .any(|z| view.netlist.net(z.net).class == SignalClass::Ground);
    if has_ground_pour {
        return;
    }
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::Power {
            continue;
        }
        let points: Vec<_> = view
            .board
            .tracks
            .iter()
            .filter(|t| t.net == net_id)
            .flat_map(|t| t.points.iter())
            .collect();
        if points.len() < 2 {
            continue;
        }
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let area = (max_x - min_x) * (max_y - min_y);
        if area > view.config.validation.max_loop_area {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Emi,
                    format!(
                        "supply loop on `{}` spans {:.0} mm² with no ground plane return",
                        net.name, area
                    ),
                )
                .net(net.name.clone())
                .suggest("pour a ground plane or route the rail beside its return"),
            );
        }
    }
}

fn shielding(view: &BoardView, issues: &mut Vec<Issue>) {
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::HighSpeed {
            continue;
        }
        let length = view.net_length(net_id);
        if length > 50.0 {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::Emi,
                    format!(
                        "high-speed net `{}` runs {length:.0} mm unshielded",
                        net.name
                    ),
                )
                .net(net.name.clone())
                .suggest("shorten the run or shield it with grounded copper"),
            );
        }
    }
}

/// Emissions proxy: fast-edge copper length scaled into a 0..1 score,
/// bucketed through the severity thresholds.
fn emissions_proxy(view: &BoardView, issues: &mut Vec<Issue>) {
    let fast_length: f64 = view
        .netlist
        .iter_nets()
        .filter(|(_, n)| matches!(n.class, SignalClass::Digital | SignalClass::HighSpeed))
        .map(|(id, _)| view.net_length(id))
        .sum();
    if fast_length == 0.0 {
        return;
    }
    let score = (fast_length / EMISSIONS_SCALE).min(1.0);
    let severity = Severity::from_score(score, &view.config.validation);
    if severity > Severity::Info {
        issues.push(
            Issue::new(
                severity,
                Category::Emi,
                format!(
                    "emissions proxy {score:.2} from {fast_length:.0} mm of fast-edge copper"
                ),
            )
            .suggest("shorten digital runs and keep them over the ground plane")
            .detail("proxy: digital + high-speed routed length / 500 mm"),
        );
    }
}
