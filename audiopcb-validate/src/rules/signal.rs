//! Signal integrity: trace impedance on controlled nets, crosstalk between
//! same-layer neighbors, and reflection risk on high-speed nets.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::board::Track;
use audiopcb::geom::span_overlap;
use audiopcb::netlist::SignalClass;

/// FR-4 relative permittivity.
const ER: f64 = 4.5;
/// 1 oz copper thickness, mm.
const COPPER_THICKNESS: f64 = 0.035;
/// Edge-to-edge spacing beyond which two tracks stop counting as
/// neighbors for the crosstalk proxy.
const NEIGHBOR_WINDOW: f64 = 2.0;

pub struct SignalIntegrity;

impl Rule for SignalIntegrity {
    fn id(&self) -> &'static str {
        "signal-integrity"
    }

    fn category(&self) -> Category {
        Category::SignalIntegrity
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();
        impedance(view, &mut issues);
        crosstalk(view, &mut issues);
        reflections(view, &mut issues);
        issues
    }
}

/// Microstrip estimate for high-speed nets. Audio nets carry a circuit
/// impedance target (600 Ω), not a trace geometry target, so they are
/// exempt here.
fn impedance(view: &BoardView, issues: &mut Vec<Issue>) {
    let height = 1.6 / (view.board.layers.count().max(2) as f64 - 1.0);
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::HighSpeed {
            continue;
        }
        let Some(target) = net.target_impedance else { continue };
        for track in view.board.tracks.iter().filter(|t| t.net == net_id) {
            let z0 = 87.0 / (ER + 1.41).sqrt()
                * (5.98 * height / (0.8 * track.width + COPPER_THICKNESS)).ln();
            let deviation = (z0 - target).abs() / target;
            if deviation > view.config.validation.impedance_tolerance {
                issues.push(
                    Issue::new(
                        Severity::Warning,
                        Category::SignalIntegrity,
                        format!(
                            "`{}` trace impedance ≈{:.0} Ω, target {:.0} Ω (±{:.0}%)",
                            net.name,
                            z0,
                            target,
                            view.config.validation.impedance_tolerance * 100.0
                        ),
                    )
                    .net(net.name.clone())
                    .suggest("adjust trace width for the target impedance")
                    .detail("microstrip estimate, FR-4, 1 oz copper"),
                );
                break;
            }
        }
    }
}

/// Crosstalk proxy: parallel-run length divided by edge-to-edge spacing,
/// summed over same-layer segment pairs. Victims are audio and high-speed
/// nets.
fn crosstalk(view: &BoardView, issues: &mut Vec<Issue>) {
    let limit = view.config.validation.max_crosstalk;
    let is_victim = |class: SignalClass| {
        matches!(class, SignalClass::Audio | SignalClass::HighSpeed)
    };
    let nets: Vec<_> = view.netlist.iter_nets().collect();
    for (i, (va, na)) in nets.iter().enumerate() {
        if !is_victim(na.class) {
            continue;
        }
        for (j, (vb, nb)) in nets.iter().enumerate() {
            if i == j {
                continue;
            }
            // A victim pair reports once, from the lower index.
            if is_victim(nb.class) && j < i {
                continue;
            }
            let ratio = coupling_ratio(view, *va, *vb);
            if ratio > limit {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        Category::SignalIntegrity,
                        format!(
                            "crosstalk between `{}` and `{}`: parallel-run ratio {:.0} exceeds {:.0}",
                            na.name, nb.name, ratio, limit
                        ),
                    )
                    .net(na.name.clone())
                    .net(nb.name.clone())
                    .suggest("re-route one net on the opposite layer or add spacing")
                    .doc("docs/validation.md#crosstalk"),
                );
            }
        }
    }
}

/// Sum of overlap/spacing over parallel same-layer segment pairs.
fn coupling_ratio(
    view: &BoardView,
    a: audiopcb::netlist::NetId,
    b: audiopcb::netlist::NetId,
) -> f64 {
    let mut ratio = 0.0f64;
    let tracks_a: Vec<&Track> = view.board.tracks.iter().filter(|t| t.net == a).collect();
    let tracks_b: Vec<&Track> = view.board.tracks.iter().filter(|t| t.net == b).collect();
    for ta in &tracks_a {
        for tb in &tracks_b {
            if ta.layer != tb.layer {
                continue;
            }
            for sa in ta.points.windows(2) {
                for sb in tb.points.windows(2) {
                    let a_horizontal = (sa[0].y - sa[1].y).abs() < 1e-9;
                    let b_horizontal = (sb[0].y - sb[1].y).abs() < 1e-9;
                    if a_horizontal != b_horizontal {
                        continue;
                    }
                    let (overlap, center_gap) = if a_horizontal {
                        (
                            span_overlap(
                                sa[0].x.min(sa[1].x),
                                sa[0].x.max(sa[1].x),
                                sb[0].x.min(sb[1].x),
                                sb[0].x.max(sb[1].x),
                            ),
                            (sa[0].y - sb[0].y).abs(),
                        )
                    } else {
                        (
                            span_overlap(
                                sa[0].y.min(sa[1].y),
                                sa[0].y.max(sa[1].y),
                                sb[0].y.min(sb[1].y),
                                sb[0].y.max(sb[1].y),
                            ),
                            (sa[0].x - sb[0].x).abs(),
                        )
                    };
                    let spacing = center_gap - ta.width / 2.0 - tb.width / 2.0;
                    if overlap > 0.0 && spacing > 0.0 && spacing <= NEIGHBOR_WINDOW {
                        ratio += overlap / spacing;
                    }
                }
            }
        }
    }
    ratio
}

/// Reflection proxy: every layer change on a high-speed net is an
/// impedance discontinuity.
fn reflections(view: &BoardView, issues: &mut Vec<Issue>) {
    for (net_id, net) in view.netlist.iter_nets() {
        if net.class != SignalClass::HighSpeed {
            continue;
        }
        let via_count = view.board.vias.iter().filter(|v| v.net == net_id).count();
        if via_count > 2 {
            issues.push(
                Issue::new(
                    Severity::Warning,
                    Category::SignalIntegrity,
                    format!(
                        "high-speed net `{}` changes layer {via_count} times",
                        net.name
                    ),
                )
                .net(net.name.clone())
                .suggest("keep high-speed nets on a single layer"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiopcb::board::{Board, LayerId, LayerStack, Preset, PresetId};
    use audiopcb::config::Config;
    use audiopcb::geom::Point;
    use audiopcb::kinds::{ComponentKind, JackSize};
    use audiopcb::netlist::Netlist;
    use audiopcb::registry::Registry;

    fn two_audio_nets() -> (Netlist, Board) {
        let registry = Registry::default();
        let mut nl = Netlist::new();
        let ja = nl
            .add_component(&registry, ComponentKind::Jack(JackSize::Mm35), "", None)
            .unwrap();
        let jb = nl
            .add_component(&registry, ComponentKind::Jack(JackSize::Mm35), "", None)
            .unwrap();
        nl.component_mut(ja).position = Some(Point::new(10.0, 20.0));
        nl.component_mut(jb).position = Some(Point::new(10.0, 40.0));
        let a = nl.add_net("IN_A", None).unwrap();
        nl.connect(a, ja, "TIP").unwrap();
        let b = nl.add_net("IN_B", None).unwrap();
        nl.connect(b, jb, "TIP").unwrap();
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        (nl, board)
    }

    #[test]
    fn parallel_audio_pair_trips_crosstalk() {
        let (nl, mut board) = two_audio_nets();
        let a = nl.find_net("IN_A").unwrap();
        let b = nl.find_net("IN_B").unwrap();
        // 15 mm side by side at 0.3 mm edge spacing: ratio 50.
        for (net, y) in [(a, 30.0), (b, 30.9)] {
            board.tracks.push(audiopcb::board::Track {
                net,
                layer: LayerId(0),
                width: 0.3,
                points: vec![Point::new(20.0, y), Point::new(35.0, y)],
            });
        }
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = SignalIntegrity.run(&view);
        let hit = issues
            .iter()
            .find(|i| i.message.contains("crosstalk"))
            .expect("crosstalk issue expected");
        assert_eq!(hit.severity, Severity::Error);
        assert!(hit.affected_nets.contains(&"IN_A".to_string()));
        assert!(hit.affected_nets.contains(&"IN_B".to_string()));
    }

    #[test]
    fn opposite_layers_do_not_couple() {
        let (nl, mut board) = two_audio_nets();
        let a = nl.find_net("IN_A").unwrap();
        let b = nl.find_net("IN_B").unwrap();
        for (net, layer, y) in [(a, 0u8, 30.0), (b, 1u8, 30.9)] {
            board.tracks.push(audiopcb::board::Track {
                net,
                layer: LayerId(layer),
                width: 0.3,
                points: vec![Point::new(20.0, y), Point::new(35.0, y)],
            });
        }
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        let issues = SignalIntegrity.run(&view);
        assert!(!issues.iter().any(|i| i.message.contains("crosstalk")));
    }

    #[test]
    fn distant_parallel_runs_are_ignored() {
        let (nl, mut board) = two_audio_nets();
        let a = nl.find_net("IN_A").unwrap();
        let b = nl.find_net("IN_B").unwrap();
        for (net, y) in [(a, 20.0), (b, 40.0)] {
            board.tracks.push(audiopcb::board::Track {
                net,
                layer: LayerId(0),
                width: 0.3,
                points: vec![Point::new(20.0, y), Point::new(100.0, y)],
            });
        }
        let config = Config::default();
        let view = BoardView::new(&nl, &board, &config);
        assert!(SignalIntegrity.run(&view).is_empty());
    }
}
