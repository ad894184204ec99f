//! Manufacturing checks: drill limits, annular rings, silk and mask
//! minima, test points, and fiducials.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};

pub struct Manufacturing;

impl Rule for Manufacturing {
    fn id(&self) -> &'static str {
        "manufacturing"
    }

    fn category(&self) -> Category {
        Category::Manufacturing
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        drills_and_rings(view, &mut issues);
        silk_and_mask(view, &mut issues);
        test_points(view, &mut issues);
        fiducials(view, &mut issues);
        issues
    }
}

fn drills_and_rings(view: &BoardView, issues: &mut Vec<Issue>) {
    let limits = &view.board.preset.limits;
    let min_ring = view.config.validation.min_annular_ring;
    for via in &view.board.vias {
        let net = view.netlist.net(via.net);
        if via.drill < limits.min_hole {
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Manufacturing,
                    format!(
                        "via drill {:.2} mm on `{}` is below the fab minimum {:.2} mm",
                        via.drill, net.name, limits.min_hole
                    ),
                )
                .net(net.name.clone())
                .suggest("use a larger drill"),
            );
        }
        if via.drill > limits.max_hole {
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Manufacturing,
                    format!(
                        "via drill {:.2} mm on `{}` exceeds the fab maximum {:.2} mm",
                        via.drill, net.name, limits.max_hole
                    ),
                )
                .net(net.name.clone()),
            );
        }
        let ring = (via.diameter - via.drill) / 2.0;
        if ring < min_ring {
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Manufacturing,
                    format!(
                        "annular ring {:.2} mm on `{}` is below {:.2} mm",
                        ring, net.name, min_ring
                    ),
                )
                .net(net.name.clone())
                .suggest("increase via diameter or reduce drill"),
            );
        }
    }
}

fn silk_and_mask(view: &BoardView, issues: &mut Vec<Issue>) {
    let v = &view.config.validation;
    if view.board.preset.limits.silkscreen && v.min_silk_width < 0.12 {
        issues.push(
            Issue::new(
                Severity::Warning,
                Category::Manufacturing,
                format!(
                    "configured silk width {:.2} mm is below common fab capability",
                    v.min_silk_width
                ),
            )
            .suggest("use at least 0.12 mm silk strokes"),
        );
    }
    if view.board.preset.limits.solder_mask && v.min_mask_width < 0.08 {
        issues.push(
            Issue::new(
                Severity::Warning,
                Category::Manufacturing,
                format!(
                    "configured mask sliver {:.2} mm is below common fab capability",
                    v.min_mask_width
                ),
            )
            .suggest("use at least 0.08 mm mask slivers"),
        );
    }
}

/// Test-point presence is an opt-in requirement; the model carries no
/// dedicated test-pad kind, so vias double as probe points.
fn test_points(view: &BoardView, issues: &mut Vec<Issue>) {
    if !view.config.validation.require_test_points {
        return;
    }
    if view.board.vias.is_empty() {
        issues.push(
            Issue::new(
                Severity::Warning,
                Category::Manufacturing,
                "test points required but the board exposes no probe-able vias",
            )
            .suggest("add test points on the power and audio nets"),
        );
    }
}

fn fiducials(view: &BoardView, issues: &mut Vec<Issue>) {
    if !view.board.preset.limits.requires_fiducials {
        return;
    }
    let want = view.config.validation.min_fiducials;
    // Mounting holes double as alignment references on these presets.
    let have = view
        .netlist
        .iter_components()
        .filter(|(_, c)| matches!(c.kind, audiopcb::kinds::ComponentKind::MountingHole))
        .count();
    if have < want {
        issues.push(
            Issue::new(
                Severity::Warning,
                Category::Manufacturing,
                format!("preset requires {want} fiducials, found {have} alignment references"),
            )
            .suggest("add fiducial marks for automated assembly"),
        );
    }
}
