//! Net routing over the multi-layer grid.
//!
//! Nets route in class-priority order (power first, control last), longest
//! Manhattan estimate first within a class. Each net's endpoint set is
//! connected pair-by-pair in minimum-spanning-tree order. When a net cannot
//! be routed, a sliding window of lower-priority nets is ripped up and the
//! net retried; after `max_reroute_attempts` the net is recorded on
//! `board.unrouted` and surfaces as a connectivity issue downstream.

use crate::grid::{simplify, shortest_path, Cell, Occupancy, RouteGrid, SearchParams};
use audiopcb::board::{Board, LayerId, Track, Via};
use audiopcb::config::{ClassRule, Config, LayerPref};
use audiopcb::error::RoutingInfeasible;
use audiopcb::geom::Point;
use audiopcb::netlist::{NetId, Netlist};
use tracing::{debug, warn};

/// Options for targeted re-routing during refinement.
#[derive(Debug, Clone, Copy)]
pub struct RerouteOptions {
    /// Extra halo added around foreign copper.
    pub extra_clearance: f64,
    /// Multiplier on the search cost budget.
    pub cost_budget_multiplier: f64,
    /// Override the class's preferred layer (crosstalk remediation moves a
    /// net to the opposite side).
    pub prefer_layer: Option<LayerPref>,
}

impl Default for RerouteOptions {
    fn default() -> Self {
        Self {
            extra_clearance: 0.0,
            cost_budget_multiplier: 1.0,
            prefer_layer: None,
        }
    }
}

/// Route every multi-endpoint net. Failed nets are recorded on the board.
pub fn route(netlist: &Netlist, board: &mut Board, config: &Config) -> Vec<RoutingInfeasible> {
    board.unrouted.clear();
    let mut order: Vec<(NetId, u8, i64, String)> = netlist
        .iter_nets()
        .filter(|(_, net)| net.endpoints.len() >= 2)
        .map(|(id, net)| {
            let estimate = (net_span(netlist, id) * 1000.0) as i64;
            (id, net.class.priority(), -estimate, net.name.clone())
        })
        .collect();
    order.sort_by(|a, b| (a.1, a.2, &a.3).cmp(&(b.1, b.2, &b.3)));

    let mut routed: Vec<NetId> = Vec::new();
    let mut failed: Vec<RoutingInfeasible> = Vec::new();

    for (net_id, priority, _, name) in order {
        match route_net(netlist, board, config, net_id, RerouteOptions::default()) {
            Ok(()) => routed.push(net_id),
            Err(_) => {
                // Rip-up and retry: tear out the most recent lower-priority
                // net, retry, repeat within the attempt budget.
                let mut ripped: Vec<NetId> = Vec::new();
                let mut succeeded = false;
                for _ in 0..config.routing.max_reroute_attempts {
                    let victim = routed
                        .iter()
                        .rposition(|r| netlist.net(*r).class.priority() >= priority);
                    let Some(pos) = victim else { break };
                    let victim_id = routed.remove(pos);
                    debug!(net = %name, victim = %netlist.net(victim_id).name, "rip-up retry");
                    board.rip_net(victim_id);
                    ripped.push(victim_id);
                    if route_net(netlist, board, config, net_id, RerouteOptions::default())
                        .is_ok()
                    {
                        succeeded = true;
                        break;
                    }
                }
                if succeeded {
                    routed.push(net_id);
                } else {
                    warn!(net = %name, "unroutable within attempt budget");
                    failed.push(RoutingInfeasible { net: name.clone() });
                    board.unrouted.push(net_id);
                }
                // Put the ripped victims back; any that no longer fit are
                // reported like any other failure.
                for victim_id in ripped {
                    if route_net(netlist, board, config, victim_id, RerouteOptions::default())
                        .is_ok()
                    {
                        routed.push(victim_id);
                    } else {
                        let victim_name = netlist.net(victim_id).name.clone();
                        warn!(net = %victim_name, "victim could not be restored");
                        failed.push(RoutingInfeasible { net: victim_name });
                        board.unrouted.push(victim_id);
                    }
                }
            }
        }
    }
    failed
}

/// Route a single net, replacing any copper it already has.
pub fn route_net(
    netlist: &Netlist,
    board: &mut Board,
    config: &Config,
    net_id: NetId,
    opts: RerouteOptions,
) -> Result<(), RoutingInfeasible> {
    board.rip_net(net_id);
    board.unrouted.retain(|n| *n != net_id);

    let net = netlist.net(net_id);
    let rule = config.routing.class_rule(net.class);
    let grid = RouteGrid::new(
        board.usable(),
        config.routing.grid_step,
        board.layers.count(),
    );
    let preferred = opts
        .prefer_layer
        .unwrap_or(rule.preferred_layer);
    let preferred_idx = resolve_layer(board, preferred).0 as usize;
    let params = search_params(board, config, rule, preferred, &grid, opts.cost_budget_multiplier);
    let occupancy = build_occupancy(netlist, board, config, net_id, rule, &grid, opts.extra_clearance);

    // Pin landing points, in endpoint order.
    let pins: Vec<Point> = net
        .endpoints
        .iter()
        .filter_map(|ep| netlist.component(ep.component).pin_position(ep.pin))
        .collect();
    if pins.len() < 2 {
        return Ok(());
    }

    let mut new_tracks: Vec<Track> = Vec::new();
    let mut new_vias: Vec<Via> = Vec::new();

    for (a, b) in mst_pairs(&pins) {
        let start = grid.snap(pins[a], preferred_idx);
        let goal = grid.snap(pins[b], preferred_idx);
        let Some(path) = shortest_path(&grid, &occupancy, &params, start, goal) else {
            return Err(RoutingInfeasible {
                net: net.name.clone(),
            });
        };
        emit_path(
            &grid,
            &simplify(&path),
            net_id,
            rule.min_width,
            config,
            &mut new_tracks,
            &mut new_vias,
        );
    }

    board.tracks.append(&mut new_tracks);
    board.vias.append(&mut new_vias);
    Ok(())
}

/// Resolve a layer preference against the actual stack. Inner preferences
/// degrade to back copper on two-layer boards.
pub fn resolve_layer(board: &Board, pref: LayerPref) -> LayerId {
    let count = board.layers.count();
    match pref {
        LayerPref::Front => board.layers.front(),
        LayerPref::Back => board.layers.back(),
        LayerPref::Inner1 => {
            if count >= 4 {
                LayerId(1)
            } else {
                board.layers.back()
            }
        }
        LayerPref::Inner2 => {
            if count >= 4 {
                LayerId(2)
            } else {
                board.layers.back()
            }
        }
    }
}

fn search_params(
    board: &Board,
    config: &Config,
    rule: &ClassRule,
    preferred: LayerPref,
    grid: &RouteGrid,
    budget_multiplier: f64,
) -> SearchParams {
    let preferred_idx = resolve_layer(board, preferred).0 as usize;
    let avoid: Vec<usize> = rule
        .avoid_layers
        .iter()
        .map(|p| resolve_layer(board, *p).0 as usize)
        .collect();
    let off = (config.routing.off_layer_penalty * 1000.0) as u32;
    let layer_factor = (0..grid.layers)
        .map(|l| {
            if l == preferred_idx {
                1000
            } else if avoid.contains(&l) {
                off * 2
            } else {
                off
            }
        })
        .collect();

    // Guard against runaway searches: no simple path costs more than every
    // cell traversed at the worst layer factor.
    let step_milli = (grid.step * 1000.0) as u64;
    let worst = (config.routing.off_layer_penalty * 2.0).max(1.0);
    let budget =
        (grid.cell_count() as u64 * step_milli * worst as u64).max(1) as f64 * budget_multiplier;

    SearchParams {
        layer_factor,
        via_cost: (config.routing.via_preference * 1000.0) as u64,
        cost_budget: budget as u64,
    }
}

/// Rasterize everything the net must stay clear of.
fn build_occupancy(
    netlist: &Netlist,
    board: &Board,
    config: &Config,
    net_id: NetId,
    rule: &ClassRule,
    grid: &RouteGrid,
    extra_clearance: f64,
) -> Occupancy {
    let mut occ = Occupancy::open(grid);
    let half_width = rule.min_width / 2.0;

    // Obstacles are copper, not plastic: tracks may pass under component
    // bodies, but every pad that is not part of this net blocks all layers
    // (through-hole stack) with a clearance halo.
    let own_pads: Vec<(audiopcb::netlist::ComponentId, u8)> = netlist
        .net(net_id)
        .endpoints
        .iter()
        .map(|ep| (ep.component, ep.pin))
        .collect();
    for (comp_id, comp) in netlist.iter_components() {
        if comp.position.is_none() {
            continue;
        }
        let pad_radius = match comp.kind {
            audiopcb::kinds::ComponentKind::MountingHole => 3.25,
            _ => 0.8,
        };
        for &pin in comp.pin_map.keys() {
            if own_pads.contains(&(comp_id, pin)) {
                continue;
            }
            if let Some(at) = comp.pin_position(pin) {
                let halo = pad_radius + half_width + rule.min_clearance + extra_clearance;
                for layer in 0..grid.layers {
                    occ.block_segment(grid, layer, at, at, halo);
                }
            }
        }
    }
    for keepout in &board.keepouts {
        for layer in 0..grid.layers {
            occ.block_rect(grid, layer, *keepout);
        }
    }

    // Foreign tracks: hard halo at the clearance distance, soft cost in the
    // band beyond it so long parallel runs price themselves out.
    for track in &board.tracks {
        if track.net == net_id {
            continue;
        }
        let other_rule = config.routing.class_rule(netlist.net(track.net).class);
        let clearance = rule.min_clearance.max(other_rule.min_clearance) + extra_clearance;
        let halo = track.width / 2.0 + half_width + clearance;
        let layer = track.layer.0 as usize;
        let penalty = (config.routing.parallel_penalty * grid.step * 1000.0) as u32;
        for seg in track.points.windows(2) {
            occ.block_segment(grid, layer, seg[0], seg[1], halo);
            occ.penalize_segment(
                grid,
                layer,
                seg[0],
                seg[1],
                halo,
                2.0 * rule.min_clearance,
                penalty,
            );
        }
    }
    for via in &board.vias {
        if via.net == net_id {
            continue;
        }
        let halo = via.diameter / 2.0 + half_width + rule.min_clearance + extra_clearance;
        for layer in 0..grid.layers {
            occ.block_segment(grid, layer, via.at, via.at, halo);
        }
    }
    occ
}

/// Turn a simplified cell path into track polylines and vias.
fn emit_path(
    grid: &RouteGrid,
    path: &[Cell],
    net: NetId,
    width: f64,
    config: &Config,
    tracks: &mut Vec<Track>,
    vias: &mut Vec<Via>,
) {
    let mut run: Vec<Point> = Vec::new();
    let mut layer = path.first().map(|c| c.layer).unwrap_or(0);
    for cell in path {
        if cell.layer != layer {
            let at = *run.last().expect("layer change mid-path");
            if run.len() >= 2 {
                tracks.push(Track {
                    net,
                    layer: LayerId(layer as u8),
                    width,
                    points: std::mem::take(&mut run),
                });
            } else {
                run.clear();
            }
            vias.push(Via {
                net,
                at,
                drill: config.routing.via_drill,
                diameter: config.routing.via_diameter,
                layers: (LayerId(layer as u8), LayerId(cell.layer as u8)),
            });
            run.push(at);
            layer = cell.layer;
        }
        let p = grid.position(*cell);
        if run.last() != Some(&p) {
            run.push(p);
        }
    }
    if run.len() >= 2 {
        tracks.push(Track {
            net,
            layer: LayerId(layer as u8),
            width,
            points: run,
        });
    }
}

/// Total pairwise span of a net's pins, the ordering estimate.
fn net_span(netlist: &Netlist, net_id: NetId) -> f64 {
    let net = netlist.net(net_id);
    let pins: Vec<Point> = net
        .endpoints
        .iter()
        .filter_map(|ep| netlist.component(ep.component).pin_position(ep.pin))
        .collect();
    let mut span = 0.0f64;
    for (i, a) in pins.iter().enumerate() {
        for b in pins.iter().skip(i + 1) {
            span = span.max(a.manhattan(*b));
        }
    }
    span
}

/// Prim's order over the pin set: each result pair joins an unvisited pin to
/// the nearest visited one.
fn mst_pairs(pins: &[Point]) -> Vec<(usize, usize)> {
    let n = pins.len();
    let mut visited = vec![false; n];
    visited[0] = true;
    let mut pairs = Vec::with_capacity(n - 1);
    for _ in 1..n {
        let mut best: Option<(usize, usize, f64)> = None;
        for from in 0..n {
            if !visited[from] {
                continue;
            }
            for to in 0..n {
                if visited[to] {
                    continue;
                }
                let d = pins[from].manhattan(pins[to]);
                let better = match best {
                    None => true,
                    Some((bf, bt, bd)) => {
                        d < bd || (d == bd && (to, from) < (bt, bf))
                    }
                };
                if better {
                    best = Some((from, to, d));
                }
            }
        }
        let (from, to, _) = best.expect("unvisited pin remains");
        visited[to] = true;
        pairs.push((from, to));
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use audiopcb::board::{LayerStack, Preset, PresetId};
    use audiopcb::kinds::{ComponentKind, JackSize};
    use audiopcb::registry::Registry;
    use crate::placement;

    fn routed_fixture() -> (Netlist, Board, Config) {
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
        let config = Config::default();
        (nl, board, config)
    }

    #[test]
    fn routes_simple_two_net_board() {
        let (mut nl, mut board, config) = routed_fixture();
        placement::place(&mut nl, &board, &config).unwrap();
        let failed = route(&nl, &mut board, &config);
        assert!(failed.is_empty(), "failed: {failed:?}");
        assert!(board.unrouted.is_empty());
        assert!(!board.tracks.is_empty());
        // Audio net routes at audio width on front copper.
        let in_net = nl.find_net("IN").unwrap();
        let audio_tracks: Vec<_> = board.tracks.iter().filter(|t| t.net == in_net).collect();
        assert!(!audio_tracks.is_empty());
        for t in &audio_tracks {
            assert_eq!(t.width, 0.3);
            assert_eq!(t.layer, LayerId(0));
        }
    }

    #[test]
    fn ground_degrades_to_back_copper_on_two_layers() {
        let (mut nl, mut board, config) = routed_fixture();
        placement::place(&mut nl, &board, &config).unwrap();
        route(&nl, &mut board, &config);
        let gnd = nl.find_net("GND").unwrap();
        let back = board.layers.back();
        assert!(board
            .tracks
            .iter()
            .filter(|t| t.net == gnd)
            .all(|t| t.layer == back || t.layer == LayerId(0)));
        // Preferred layer resolution itself.
        assert_eq!(resolve_layer(&board, LayerPref::Inner2), back);
    }

    #[test]
    fn routing_is_deterministic() {
        let run = || {
            let (mut nl, mut board, config) = routed_fixture();
            placement::place(&mut nl, &board, &config).unwrap();
            route(&nl, &mut board, &config);
            serde_json::to_string(&board.tracks).unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn mst_covers_every_pin() {
        let pins = vec![
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
        ];
        let pairs = mst_pairs(&pins);
        assert_eq!(pairs.len(), 3);
        let mut seen = vec![false; 4];
        seen[0] = true;
        for (a, b) in pairs {
            assert!(seen[a], "pair source must already be connected");
            seen[b] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn reroute_with_layer_override_moves_net() {
        let (mut nl, mut board, config) = routed_fixture();
        placement::place(&mut nl, &board, &config).unwrap();
        route(&nl, &mut board, &config);
        let in_net = nl.find_net("IN").unwrap();
        route_net(
            &nl,
            &mut board,
            &config,
            in_net,
            RerouteOptions {
                prefer_layer: Some(LayerPref::Back),
                ..Default::default()
            },
        )
        .unwrap();
        let back = board.layers.back();
        assert!(board
            .tracks
            .iter()
            .filter(|t| t.net == in_net)
            .all(|t| t.layer == back));
    }
}
