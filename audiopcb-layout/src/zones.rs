//! Copper zone synthesis.
//!
//! Ground (and, on four-layer stacks, power) nets get a pour: the board
//! outline inset by the edge clearance, minus clearance halos around every
//! piece of foreign copper. The fill is decomposed into horizontal strips,
//! which satisfies the zone invariants without a polygon kernel. Same-net
//! pads connect through thermal-relief spokes, or through routed returns to
//! a single star point when star grounding is configured.

use audiopcb::board::{Board, LayerId, LayerRole, ThermalSpoke, Track, Zone};
use audiopcb::config::Config;
use audiopcb::geom::{Point, Rect};
use audiopcb::kinds::ComponentKind;
use audiopcb::netlist::{NetId, Netlist, SignalClass};
use tracing::debug;

/// Height of the scanline strips the fill is decomposed into.
const FILL_STRIP_HEIGHT: f64 = 2.0;
/// Slivers narrower than this are dropped from the fill.
const MIN_FILL_WIDTH: f64 = 0.5;
/// Pad copper radius used for zone clearance halos.
const PAD_RADIUS: f64 = 0.8;

/// Synthesize all plane zones. Existing zones are replaced (the pour is
/// rerun whenever routing changes).
pub fn pour(netlist: &Netlist, board: &mut Board, config: &Config) {
    board.zones.clear();
    let four_layer = board.layers.count() >= 4;

    let plane_nets: Vec<(NetId, SignalClass)> = netlist
        .iter_nets()
        .filter(|(_, net)| !net.endpoints.is_empty())
        .filter(|(_, net)| match net.class {
            SignalClass::Ground => true,
            SignalClass::Power => four_layer,
            _ => false,
        })
        .map(|(id, net)| (id, net.class))
        .collect();

    for (net_id, class) in plane_nets {
        let layer = plane_layer(board, class);
        let zone = synthesize_zone(netlist, board, config, net_id, layer);
        debug!(
            net = %netlist.net(net_id).name,
            layer = layer.0,
            fills = zone.fills.len(),
            "poured zone"
        );
        board.zones.push(zone);

        if config.zones.star_ground && class == SignalClass::Ground {
            if let Some((x, y)) = config.zones.star_point {
                pour_star_returns(netlist, board, config, net_id, layer, Point::new(x, y));
            }
            // Without a nominated star point the pour falls back to the
            // nearest-pad thermal relief already emitted above.
        }
    }
}

/// Layer carrying the pour for a class: the role-matching inner layer when
/// the stack has one, otherwise back copper.
fn plane_layer(board: &Board, class: SignalClass) -> LayerId {
    let role = match class {
        SignalClass::Ground => LayerRole::Ground,
        _ => LayerRole::Power,
    };
    board.layers.find_role(role).unwrap_or(board.layers.back())
}

fn synthesize_zone(
    netlist: &Netlist,
    board: &Board,
    config: &Config,
    net_id: NetId,
    layer: LayerId,
) -> Zone {
    let outline = board.usable();
    let clearance = config.zones.min_zone_clearance;

    // Everything the pour must stay clear of, as rectangles.
    let mut cutouts: Vec<Rect> = Vec::new();
    for track in &board.tracks {
        if track.net == net_id || track.layer != layer {
            continue;
        }
        for seg in track.points.windows(2) {
            cutouts.push(segment_box(seg[0], seg[1], track.width / 2.0 + clearance));
        }
    }
    for via in &board.vias {
        if via.net == net_id {
            continue;
        }
        let r = via.diameter / 2.0 + clearance;
        cutouts.push(Rect::centered(via.at, 2.0 * r, 2.0 * r));
    }
    let own: Vec<(audiopcb::netlist::ComponentId, u8)> = netlist
        .net(net_id)
        .endpoints
        .iter()
        .map(|ep| (ep.component, ep.pin))
        .collect();
    for (comp_id, comp) in netlist.iter_components() {
        if comp.position.is_none() {
            continue;
        }
        let radius = match comp.kind {
            ComponentKind::MountingHole => 3.25,
            _ => PAD_RADIUS,
        } + clearance;
        for &pin in comp.pin_map.keys() {
            if own.contains(&(comp_id, pin)) {
                continue;
            }
            if let Some(at) = comp.pin_position(pin) {
                cutouts.push(Rect::centered(at, 2.0 * radius, 2.0 * radius));
            }
        }
    }
    cutouts.extend(board.keepouts.iter().map(|k| k.inflate(clearance)));

    let fills = strip_fill(outline, &cutouts);

    // Thermal relief on every same-net pad: four spokes, bridge and gap at
    // the middle of their configured ranges.
    let bridge = (config.zones.min_thermal_bridge + config.zones.max_thermal_bridge) / 2.0;
    let gap = (config.zones.min_thermal_gap + config.zones.max_thermal_gap) / 2.0;
    let spokes = own
        .iter()
        .filter_map(|(comp_id, pin)| netlist.component(*comp_id).pin_position(*pin))
        .map(|pad| ThermalSpoke {
            pad,
            width: bridge,
            gap,
        })
        .collect();

    Zone {
        net: net_id,
        layer,
        outline,
        clearance,
        fills,
        spokes,
    }
}

/// Axis-aligned box around a segment, inflated by `halo`. Routed tracks are
/// orthogonal, so this is exact for them.
fn segment_box(a: Point, b: Point, halo: f64) -> Rect {
    Rect::new(
        a.x.min(b.x),
        a.y.min(b.y),
        (a.x - b.x).abs(),
        (a.y - b.y).abs(),
    )
    .inflate(halo)
}

/// Decompose `outline − cutouts` into horizontal strips.
fn strip_fill(outline: Rect, cutouts: &[Rect]) -> Vec<Rect> {
    let mut fills = Vec::new();
    let mut y = outline.y;
    while y < outline.bottom() {
        let h = FILL_STRIP_HEIGHT.min(outline.bottom() - y);
        let strip = Rect::new(outline.x, y, outline.w, h);

        // Merge the x-spans of every cutout crossing this strip.
        let mut spans: Vec<(f64, f64)> = cutouts
            .iter()
            .filter(|c| c.overlaps(&strip))
            .map(|c| (c.x.max(outline.x), c.right().min(outline.right())))
            .collect();
        spans.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        let mut merged: Vec<(f64, f64)> = Vec::new();
        for span in spans {
            match merged.last_mut() {
                Some(last) if span.0 <= last.1 => last.1 = last.1.max(span.1),
                _ => merged.push(span),
            }
        }

        // Complement within the strip.
        let mut x = outline.x;
        for (lo, hi) in &merged {
            if lo - x >= MIN_FILL_WIDTH {
                fills.push(Rect::new(x, y, lo - x, h));
            }
            x = x.max(*hi);
        }
        if outline.right() - x >= MIN_FILL_WIDTH {
            fills.push(Rect::new(x, y, outline.right() - x, h));
        }
        y += h;
    }
    fills
}

/// Star grounding: every ground pad gets a routed L-return converging on the
/// star point instead of relying on the plane.
fn pour_star_returns(
    netlist: &Netlist,
    board: &mut Board,
    config: &Config,
    net_id: NetId,
    layer: LayerId,
    star: Point,
) {
    let width = config
        .routing
        .class_rule(SignalClass::Ground)
        .min_width;
    let pads: Vec<Point> = netlist
        .net(net_id)
        .endpoints
        .iter()
        .filter_map(|ep| netlist.component(ep.component).pin_position(ep.pin))
        .collect();
    for pad in pads {
        let elbow = Point::new(star.x, pad.y);
        let points = if (pad.x - star.x).abs() < f64::EPSILON
            || (pad.y - star.y).abs() < f64::EPSILON
        {
            vec![pad, star]
        } else {
            vec![pad, elbow, star]
        };
        board.tracks.push(Track {
            net: net_id,
            layer,
            width,
            points,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{placement, routing};
    use audiopcb::board::{LayerStack, Preset, PresetId};
    use audiopcb::kinds::JackSize;
    use audiopcb::registry::Registry;

    fn fixture() -> (Netlist, Board, Config) {
        let registry = Registry::default();
        let mut nl = Netlist::new();
        let r1 = nl
            .add_component(&registry, ComponentKind::Resistor, "10k", None)
            .unwrap();
        let j1 = nl
            .add_component(&registry, ComponentKind::Jack(JackSize::Mm35), "", None)
            .unwrap();
        let input = nl.add_net("IN", None).unwrap();
        nl.connect(input, j1, "TIP").unwrap();
        nl.connect(input, r1, "1").unwrap();
        let gnd = nl.add_net("GND", None).unwrap();
        nl.connect(gnd, j1, "SLEEVE").unwrap();
        nl.connect(gnd, r1, "2").unwrap();
        let board = Board::new(Preset::lookup(PresetId::Pedal), LayerStack::two_layer());
        (nl, board, Config::default())
    }

    #[test]
    fn ground_zone_poured_on_back_of_two_layer() {
        let (mut nl, mut board, config) = fixture();
        placement::place(&mut nl, &board, &config).unwrap();
        routing::route(&nl, &mut board, &config);
        pour(&nl, &mut board, &config);

        assert_eq!(board.zones.len(), 1);
        let zone = &board.zones[0];
        assert_eq!(zone.layer, board.layers.back());
        assert!(zone.filled_area() > 0.0);
        assert!(!zone.spokes.is_empty(), "ground pads need thermal relief");
    }

    #[test]
    fn fills_stay_clear_of_foreign_pads() {
        let (mut nl, mut board, config) = fixture();
        placement::place(&mut nl, &board, &config).unwrap();
        routing::route(&nl, &mut board, &config);
        pour(&nl, &mut board, &config);

        let zone = &board.zones[0];
        let clearance = config.zones.min_zone_clearance;
        let gnd = nl.find_net("GND").unwrap();
        for (comp_id, comp) in nl.iter_components() {
            for &pin in comp.pin_map.keys() {
                let on_gnd = nl
                    .net(gnd)
                    .endpoints
                    .iter()
                    .any(|ep| ep.component == comp_id && ep.pin == pin);
                if on_gnd {
                    continue;
                }
                let Some(at) = comp.pin_position(pin) else { continue };
                for fill in &zone.fills {
                    let pad = Rect::centered(at, 2.0 * PAD_RADIUS, 2.0 * PAD_RADIUS);
                    assert!(
                        fill.gap_to(&pad) >= clearance - 1e-6,
                        "fill {fill:?} encroaches on pad at {at:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn star_ground_emits_returns_to_star_point() {
        let (mut nl, mut board, mut config) = fixture();
        config.zones.star_ground = true;
        config.zones.star_point = Some((60.0, 30.0));
        placement::place(&mut nl, &board, &config).unwrap();
        routing::route(&nl, &mut board, &config);
        let before = board.tracks.len();
        pour(&nl, &mut board, &config);
        let gnd = nl.find_net("GND").unwrap();
        let star_tracks: Vec<_> = board.tracks[before..]
            .iter()
            .filter(|t| t.net == gnd)
            .collect();
        assert_eq!(star_tracks.len(), 2, "one return per ground pad");
        for t in star_tracks {
            let end = *t.points.last().unwrap();
            assert!((end.x - 60.0).abs() < 1e-9 && (end.y - 30.0).abs() < 1e-9);
        }
    }

    #[test]
    fn strip_fill_subtracts_cutouts() {
        let outline = Rect::new(0.0, 0.0, 20.0, 2.0);
        let cutout = Rect::new(8.0, 0.0, 4.0, 2.0);
        let fills = strip_fill(outline, &[cutout]);
        assert_eq!(fills.len(), 2);
        assert!((fills[0].w - 8.0).abs() < 1e-9);
        assert!((fills[1].x - 12.0).abs() < 1e-9);
        assert!((fills[1].w - 8.0).abs() < 1e-9);
    }

    #[test]
    fn pour_is_replayable() {
        let (mut nl, mut board, config) = fixture();
        placement::place(&mut nl, &board, &config).unwrap();
        routing::route(&nl, &mut board, &config);
        pour(&nl, &mut board, &config);
        let first = board.zones.len();
        pour(&nl, &mut board, &config);
        assert_eq!(board.zones.len(), first, "re-pour must replace, not stack");
    }
}
