//! Electrical connectivity: every net's endpoints must form one connected
//! component over its tracks, vias, and zone fills.

use crate::report::{Category, Issue, Severity};
use crate::rules::{BoardView, Rule};
use audiopcb::geom::{point_segment_distance, Point, Rect};
use audiopcb::netlist::NetId;

pub struct Connectivity;

impl Rule for Connectivity {
    fn id(&self) -> &'static str {
        "connectivity"
    }

    fn category(&self) -> Category {
        Category::Connectivity
    }

    fn run(&self, view: &BoardView) -> Vec<Issue> {
        let mut issues = Vec::new();

        // Nets the router abandoned are broken by definition.
        for &net_id in &view.board.unrouted {
            let net = view.netlist.net(net_id);
            issues.push(
                Issue::new(
                    Severity::Error,
                    Category::Connectivity,
                    format!("net `{}` was not routed", net.name),
                )
                .net(net.name.clone())
                .suggest("retry with a higher routing cost budget or relax clearances")
                .doc("docs/routing.md#infeasible"),
            );
        }

        for (net_id, net) in view.netlist.iter_nets() {
            if net.endpoints.len() < 2 || view.board.unrouted.contains(&net_id) {
                continue;
            }
            if !net_is_connected(view, net_id) {
                issues.push(
                    Issue::new(
                        Severity::Error,
                        Category::Connectivity,
                        format!(
                            "net `{}` does not connect all {} endpoints",
                            net.name,
                            net.endpoints.len()
                        ),
                    )
                    .net(net.name.clone())
                    .suggest("rip the net and re-route")
                    .doc("docs/validation.md#connectivity"),
                );
            }
        }
        issues
    }
}

/// Union-find over the net's conductors: one node per pad, track, via, and
/// zone. Through-hole pads span all layers.
fn net_is_connected(view: &BoardView, net_id: NetId) -> bool {
    let pads = view.net_pads(net_id);
    if pads.len() < 2 {
        return true;
    }
    let tracks: Vec<_> = view
        .board
        .tracks
        .iter()
        .filter(|t| t.net == net_id)
        .collect();
    let vias: Vec<_> = view.board.vias.iter().filter(|v| v.net == net_id).collect();
    let zones: Vec<_> = view.board.zones.iter().filter(|z| z.net == net_id).collect();

    // Pads snap to the routing grid, so allow that much slop when matching
    // copper to pads.
    let tol = view.config.routing.grid_step * 0.75;

    let n = pads.len() + tracks.len() + vias.len() + zones.len();
    let mut uf = UnionFind::new(n);
    let track_base = pads.len();
    let via_base = track_base + tracks.len();
    let zone_base = via_base + vias.len();

    let touches_track = |p: Point, track: &audiopcb::board::Track, slop: f64| {
        track
            .points
            .windows(2)
            .any(|seg| point_segment_distance(p, seg[0], seg[1]) <= slop + track.width / 2.0)
    };

    for (pi, pad) in pads.iter().enumerate() {
        for (ti, track) in tracks.iter().enumerate() {
            if touches_track(*pad, track, tol) {
                uf.union(pi, track_base + ti);
            }
        }
        for (zi, zone) in zones.iter().enumerate() {
            // Thermal spokes reach at most a thermal gap past the fill edge.
            let reach = view.config.zones.max_thermal_gap + 0.8;
            let pad_rect = Rect::centered(*pad, 0.1, 0.1);
            if zone.fills.iter().any(|f| f.gap_to(&pad_rect) <= reach) {
                uf.union(pi, zone_base + zi);
            }
        }
    }

    for (ti, a) in tracks.iter().enumerate() {
        for (tj, b) in tracks.iter().enumerate().skip(ti + 1) {
            if a.layer != b.layer {
                continue;
            }
            let touching = a.points.iter().any(|p| touches_track(*p, b, tol))
                || b.points.iter().any(|p| touches_track(*p, a, tol));
            if touching {
                uf.union(track_base + ti, track_base + tj);
            }
        }
        for (vi, via) in vias.iter().enumerate() {
            let spans = |layer: audiopcb::board::LayerId| {
                let (lo, hi) = (via.layers.0 .0.min(via.layers.1 .0), via.layers.0 .0.max(via.layers.1 .0));
                (lo..=hi).contains(&layer.0)
            };
            if spans(a.layer) && touches_track(via.at, a, tol) {
                uf.union(via_base + vi, track_base + ti);
            }
        }
    }

    for (vi, via) in vias.iter().enumerate() {
        for (zi, zone) in zones.iter().enumerate() {
            if zone.fills.iter().any(|f| f.contains_point(via.at)) {
                uf.union(via_base + vi, zone_base + zi);
            }
        }
    }

    let root = uf.find(0);
    (1..pads.len()).all(|pi| uf.find(pi) == root)
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> UnionFind {
        UnionFind {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }
}
