//! Geometric design-rule checks: widths, clearances, containment, overlap,
//! via geometry.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::geom::segment_distance;

pub struct GeometricDrc;

impl Rule for GeometricDrc {
    fn id(&self) -> &'static str {
        "geometric-drc"
    }

    fn category(&self) -> Category {
        Category::Drc
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        track_widths(view, &mut issues);
        copper_clearance(view, &mut issues);
        component_containment(view, &mut issues);
        component_overlap(view, &mut issues);
        via_geometry(view, &mut issues);
        issues
    }
}

fn track_widths(view: &BoardView, issues: &mut Vec<Issue>) {
    let preset_min = view.board.preset.min_track_width;
    for track in &view.board.tracks {
        let net = view.netlist.net(track.net);
        let class_min = view.config.routing.class_rule(net.class).min_width;
        let min = class_min.max(preset_min);
        if track.width + 1e-9 < min {
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Drc,
                    format!(
                        "track on `{}` is {:.2} mm wide, class `{}` requires {:.2} mm",
                        net.name,
                        track.width,
                        net.class.as_str(),
                        min
                    ),
                )
                .net(net.name.clone())
                .suggest("re-route the net at its class width")
                .doc("docs/validation.md#track-width"),
            );
        }
    }
}

fn copper_clearance(view: &BoardView, issues: &mut Vec<Issue>) {
    let tracks = &view.board.tracks;
    for (i, a) in tracks.iter().enumerate() {
        for b in tracks.iter().skip(i + 1) {
            if a.net == b.net || a.layer != b.layer {
                continue;
            }
            let net_a = view.netlist.net(a.net);
            let net_b = view.netlist.net(b.net);
            // The stricter of the two classes governs.
            let required = view
                .config
                .routing
                .class_rule(net_a.class)
                .min_clearance
                .max(view.config.routing.class_rule(net_b.class).min_clearance)
                + a.width / 2.0
                + b.width / 2.0;
            let mut worst = f64::INFINITY;
            for sa in a.points.windows(2) {
                for sb in b.points.windows(2) {
                    worst = worst.min(segment_distance(sa[0], sa[1], sb[0], sb[1]));
                }
            }
            if worst < required - 1e-9 {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        Category::Drc,
                        format!(
                            "clearance between `{}` and `{}` is {:.3} mm, need {:.3} mm",
                            net_a.name, net_b.name, worst, required
                        ),
                    )
                    .net(net_a.name.clone())
                    .net(net_b.name.clone())
                    .suggest("rip one net and re-route with a wider halo")
                    .doc("docs/validation.md#clearance"),
                );
            }
        }
    }
}

fn component_containment(view: &BoardView, issues: &mut Vec<Issue>) {
    let usable = view.board.usable();
    for (_, comp) in view.netlist.iter_components() {
        // Edge clearance binds copper; mounting hardware lives in the
        // clearance band.
        if matches!(comp.kind, audiopcb::kinds::ComponentKind::MountingHole) {
            continue;
        }
        let Some(bb) = comp.bounding_box() else { continue };
        if !usable.contains_rect(&bb) {
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Drc,
                    format!("`{}` breaches the board edge clearance", comp.reference),
                )
                .component(comp.reference.clone())
                .suggest("move the component inside the edge clearance inset"),
            );
        }
    }
}

fn component_overlap(view: &BoardView, issues: &mut Vec<Issue>) {
    let spacing = view.config.placement.min_component_spacing;
    let placed: Vec<_> = view
        .netlist
        .iter_components()
        .filter_map(|(_, c)| c.bounding_box().map(|bb| (c.reference.clone(), bb)))
        .collect();
    for (i, (ra, a)) in placed.iter().enumerate() {
        for (rb, b) in placed.iter().skip(i + 1) {
            if a.inflate(spacing).overlaps(b) {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        Category::Drc,
                        format!("`{ra}` and `{rb}` closer than {spacing} mm"),
                    )
                    .component(ra.clone())
                    .component(rb.clone())
                    .suggest("nudge one of the components apart"),
                );
            }
        }
    }
}

fn via_geometry(view: &BoardView, issues: &mut Vec<Issue>) {
    let min_dia = view.board.preset.min_via_diameter;
    for via in &view.board.vias {
        let net = view.netlist.net(via.net);
        if via.diameter < min_dia {
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Drc,
                    format!(
                        "via on `{}` is {:.2} mm, preset minimum is {:.2} mm",
                        net.name, via.diameter, min_dia
                    ),
                )
                .net(net.name.clone()),
            );
        }
        // Via-in-pad: flags a via landing inside any component pad.
        for (_, comp) in view.netlist.iter_components() {
            for &pin in comp.pin_map.keys() {
                if let Some(pad) = comp.pin_position(pin) {
                    if pad.distance(via.at) < 0.8 {
                        issues.push(
                            Issue::new(
                                Severity::Warning,
                                Category::Drc,
                                format!(
                                    "via on `{}` lands in pad {}.{}",
                                    net.name, comp.reference, pin
                                ),
                            )
                            .component(comp.reference.clone())
                            .suggest("move the layer transition off the pad"),
                        );
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiopcb::board::{Board, LayerId, LayerStack, Preset, PresetId, Track};
    use audiopcb::config::Config;
    use audiopcb::geom::Point;
    use audiopcb::kinds::ComponentKind;
    use audiopcb::netlist::Netlist;
    use audiopcb::registry::Registry;

    fn two_net_board() -> (Netlist, Board) {
        let registry = Registry::default();
        let mut nl = Netlist::new();
        let r1 = nl
            .add_component(&registry, ComponentKind::Resistor, "10k", None)
            .unwrap();
        let r2 = nl
            .add_component(&registry, ComponentKind::Resistor, "10k", None)
            .unwrap();
        nl.component_mut(r1).position = Some(Point::new(30.0, 30.0));
        nl.component_mut(r2).position = Some(Point::new(80.0, 30.0));
        let a = nl.add_net("A", None).unwrap();
        nl.connect(a, r1, "1").unwrap();
        let b = nl.add_net("B", None).unwrap();
        nl.connect(b, r2, "1").unwrap();
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        (nl, board)
    }

    #[test]
    fn undersized_track_is_an_error() {
        let (nl, mut board) = two_net_board();
        let a = nl.find_net("A").unwrap();
        board.tracks.push(Track {
            net: a,
            layer: LayerId(0),
            width: 0.05,
            points: vec![Point::new(10.0, 10.0), Point::new(20.0, 10.0)],
        });
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = GeometricDrc.run(&view);
        assert!(issues
            .iter()
            .any(|i| i.severity == Severity::Error && i.message.contains("wide")));
    }

    #[test]
    fn clearance_violation_names_both_nets() {
        let (nl, mut board) = two_net_board();
        let a = nl.find_net("A").unwrap();
        let b = nl.find_net("B").unwrap();
        for (net, y) in [(a, 10.0), (b, 10.3)] {
            board.tracks.push(Track {
                net,
                layer: LayerId(0),
                width: 0.3,
                points: vec![Point::new(10.0, y), Point::new(60.0, y)],
            });
        }
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = GeometricDrc.run(&view);
        let hit = issues
            .iter()
            .find(|i| i.message.contains("clearance"))
            .expect("clearance violation expected");
        assert_eq!(hit.affected_nets, vec!["A", "B"]);
    }

    #[test]
    fn well_separated_tracks_pass() {
        let (nl, mut board) = two_net_board();
        let a = nl.find_net("A").unwrap();
        let b = nl.find_net("B").unwrap();
        for (net, y) in [(a, 10.0), (b, 20.0)] {
            board.tracks.push(Track {
                net,
                layer: LayerId(0),
                width: 0.3,
                points: vec![Point::new(10.0, y), Point::new(60.0, y)],
            });
        }
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = GeometricDrc.run(&view);
        assert!(issues.iter().all(|i| !i.message.contains("clearance")));
    }
}
