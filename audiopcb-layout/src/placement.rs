//! Constraint-driven component placement.
//!
//! Deterministic for a given input: groups place in priority order, members
//! in reference order, each taking the first grid candidate in its zone that
//! satisfies containment, spacing, keep-out, and thermal-density
//! constraints. Orthogonal rotations are preferred (0/180 before 90/270).
//!
//! Nothing is committed until every component has a position; an unplaceable
//! component aborts the pass with `PlacementInfeasible`.

use crate::groups::{self, GroupSpec, ZoneKind};
use audiopcb::board::Board;
use audiopcb::config::Config;
use audiopcb::error::PlacementInfeasible;
use audiopcb::geom::{Point, Rect};
use audiopcb::kinds::ComponentKind;
use audiopcb::netlist::{ComponentId, Netlist};
use audiopcb::value::parse_eng;
use tracing::{debug, warn};

/// Candidate grid floor, mm. Boards small enough to push the percentage
/// grid under this gain nothing from a finer scan.
const MIN_GRID_STEP: f64 = 0.5;

/// Fine pitch used when pulling decoupling capacitors toward IC power pins.
const DECOUPLING_SCAN_STEP: f64 = 0.5;

#[derive(Debug, Clone, Copy)]
struct Planned {
    id: ComponentId,
    at: Point,
    rotation: u16,
    group: GroupSpec,
}

/// Zone rectangles derived from the board outline inset by the placement
/// margin.
#[derive(Debug, Clone, Copy)]
struct ZoneRects {
    inner: Rect,
    center: Rect,
    top: Rect,
    strips: [Rect; 4],
}

impl ZoneRects {
    fn compute(outline: Rect, margin: f64) -> ZoneRects {
        let inner = outline.inset(margin);
        let center = Rect::new(
            inner.x + inner.w / 3.0,
            inner.y + inner.h / 3.0,
            inner.w / 3.0,
            inner.h / 3.0,
        );
        let top = Rect::new(inner.x, inner.y, inner.w, inner.h * 0.2);
        let t = (outline.w.min(outline.h)) * 0.15;
        let strips = [
            Rect::new(inner.x, inner.y, t, inner.h),                      // left
            Rect::new(inner.right() - t, inner.y, t, inner.h),            // right
            Rect::new(inner.x, inner.y, inner.w, t),                      // top
            Rect::new(inner.x, inner.bottom() - t, inner.w, t),           // bottom
        ];
        ZoneRects {
            inner,
            center,
            top,
            strips,
        }
    }
}

/// Assign a position, rotation, and side to every unplaced component.
pub fn place(
    netlist: &mut Netlist,
    board: &Board,
    config: &Config,
) -> Result<(), PlacementInfeasible> {
    let outline = board.outline();
    let usable = board.usable();
    let min_dim = outline.w.min(outline.h);
    let grid = (config.placement.grid_spacing_percentage * min_dim).max(MIN_GRID_STEP);
    let zones = ZoneRects::compute(outline, config.placement.margin_percentage * min_dim);
    let spacing = config.placement.min_component_spacing;

    let mut planned: Vec<Planned> = Vec::new();
    let mut fixed: Vec<(Rect, Point)> = Vec::new();

    // Components already carrying a position (mounting holes, anything the
    // caller pinned) are obstacles, never re-placed.
    for (_, comp) in netlist.iter_components() {
        if let (Some(bb), Some(at)) = (comp.bounding_box(), comp.position) {
            fixed.push((bb, at));
        }
    }

    // Stability components land first, at fixed percentage coordinates, so
    // everything else routes around them.
    for stab in &config.placement.stability_components {
        let Some(id) = netlist.find_component(&stab.reference) else {
            warn!(reference = %stab.reference, "stability component not in netlist");
            continue;
        };
        if netlist.component(id).position.is_some() {
            continue;
        }
        let at = Point::new(
            outline.w * stab.x_percentage,
            outline.h * stab.y_percentage,
        );
        let group = groups::group_of(netlist.component(id).kind);
        planned.push(Planned {
            id,
            at,
            rotation: 0,
            group,
        });
    }

    // Panel-mount components are pinned to the preset's front edge.
    if let Some(panel) = board.preset.panel {
        let panel_planned = plan_panel_components(netlist, board, &planned, &fixed, panel, spacing)?;
        planned.extend(panel_planned);
    }

    // Everything else: groups by priority, members by reference, first fit.
    let mut remaining: Vec<(ComponentId, GroupSpec, String)> = netlist
        .iter_components()
        .filter(|(id, comp)| {
            comp.position.is_none() && !planned.iter().any(|p| p.id == *id)
        })
        .map(|(id, comp)| (id, groups::group_of(comp.kind), comp.reference.clone()))
        .collect();
    remaining.sort_by(|a, b| {
        (a.1.priority, a.1.name, reference_key(&a.2)).cmp(&(
            b.1.priority,
            b.1.name,
            reference_key(&b.2),
        ))
    });

    for (id, group, reference) in remaining {
        let courtyard = netlist.component(id).courtyard;
        let candidates = zone_candidates(&zones, group.zone, grid, &planned);
        let found = first_fit(
            &candidates,
            courtyard,
            usable,
            spacing,
            &planned,
            &fixed,
            board,
            group.thermal,
            config,
            netlist,
        )
        .or_else(|| {
            // The zone is a preference; fall back to anywhere on the board
            // before declaring the run infeasible.
            let fallback = grid_points(zones.inner, grid);
            first_fit(
                &fallback, courtyard, usable, spacing, &planned, &fixed, board, group.thermal,
                config, netlist,
            )
        });

        match found {
            Some((at, rotation)) => {
                debug!(%reference, x = at.x, y = at.y, rotation, "placed");
                planned.push(Planned {
                    id,
                    at,
                    rotation,
                    group,
                });
            }
            None => {
                return Err(PlacementInfeasible {
                    reference,
                    reason: format!(
                        "no grid candidate in `{}` zone or board fallback satisfies spacing {spacing} mm",
                        group.name
                    ),
                });
            }
        }
    }

    pull_in_decoupling(netlist, board, config, &mut planned, &fixed);

    // Commit only now that every component has a home.
    for p in &planned {
        let comp = netlist.component_mut(p.id);
        comp.position = Some(p.at);
        comp.rotation = p.rotation;
    }
    Ok(())
}

/// Re-place a single component away from its current position (density
/// remediation). Returns true when it moved.
pub fn nudge(
    netlist: &mut Netlist,
    board: &Board,
    config: &Config,
    id: ComponentId,
) -> bool {
    let outline = board.outline();
    let min_dim = outline.w.min(outline.h);
    let grid = (config.placement.grid_spacing_percentage * min_dim).max(MIN_GRID_STEP);
    let zones = ZoneRects::compute(outline, config.placement.margin_percentage * min_dim);
    let spacing = config.placement.min_component_spacing;

    let current = match netlist.component(id).position {
        Some(p) => p,
        None => return false,
    };
    let courtyard = netlist.component(id).courtyard;
    let group = groups::group_of(netlist.component(id).kind);

    let fixed: Vec<(Rect, Point)> = netlist
        .iter_components()
        .filter(|(other, _)| *other != id)
        .filter_map(|(_, c)| c.bounding_box().map(|bb| (bb, c.position.expect("placed"))))
        .collect();

    let candidates = grid_points(zones.inner, grid);
    for at in candidates {
        if at.distance(current) < grid {
            continue;
        }
        for rotation in [0u16, 180, 90, 270] {
            let (w, h) = oriented(courtyard, rotation);
            let bb = Rect::centered(at, w, h);
            if !board.usable().contains_rect(&bb) {
                continue;
            }
            if collides(&bb, spacing, &fixed, &board.keepouts) {
                continue;
            }
            if group.thermal && too_dense(at, config, &fixed) {
                continue;
            }
            let comp = netlist.component_mut(id);
            comp.position = Some(at);
            comp.rotation = rotation;
            return true;
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Candidate generation
// ---------------------------------------------------------------------------

fn grid_points(area: Rect, step: f64) -> Vec<Point> {
    let mut points = Vec::new();
    let cols = (area.w / step).floor() as usize;
    let rows = (area.h / step).floor() as usize;
    for row in 0..=rows {
        for col in 0..=cols {
            points.push(Point::new(
                area.x + col as f64 * step,
                area.y + row as f64 * step,
            ));
        }
    }
    points
}

fn zone_candidates(
    zones: &ZoneRects,
    zone: ZoneKind,
    grid: f64,
    planned: &[Planned],
) -> Vec<Point> {
    match zone {
        ZoneKind::Center => grid_points(zones.center, grid),
        ZoneKind::Top => grid_points(zones.top, grid),
        ZoneKind::Edges => zones
            .strips
            .iter()
            .flat_map(|s| grid_points(*s, grid))
            .collect(),
        ZoneKind::NearOpamps => {
            // Disks around every placed op-amp; falls back to the center zone
            // when the board has none.
            let anchors: Vec<Point> = planned
                .iter()
                .filter(|p| p.group.name == "opamps")
                .map(|p| p.at)
                .collect();
            if anchors.is_empty() {
                return grid_points(zones.center, grid);
            }
            let radius = (zones.inner.w.min(zones.inner.h)) * 0.25;
            grid_points(zones.inner, grid)
                .into_iter()
                .filter(|pt| anchors.iter().any(|a| a.distance(*pt) <= radius))
                .collect()
        }
    }
}

fn oriented(courtyard: (f64, f64), rotation: u16) -> (f64, f64) {
    if rotation % 180 == 90 {
        (courtyard.1, courtyard.0)
    } else {
        courtyard
    }
}

#[allow(clippy::too_many_arguments)]
fn first_fit(
    candidates: &[Point],
    courtyard: (f64, f64),
    usable: Rect,
    spacing: f64,
    planned: &[Planned],
    fixed: &[(Rect, Point)],
    board: &Board,
    thermal: bool,
    config: &Config,
    netlist: &Netlist,
) -> Option<(Point, u16)> {
    let mut obstacles: Vec<(Rect, Point)> = fixed.to_vec();
    for p in planned {
        let (w, h) = oriented(netlist.component(p.id).courtyard, p.rotation);
        obstacles.push((Rect::centered(p.at, w, h), p.at));
    }

    for &at in candidates {
        for rotation in [0u16, 180, 90, 270] {
            let (w, h) = oriented(courtyard, rotation);
            let bb = Rect::centered(at, w, h);
            if !usable.contains_rect(&bb) {
                continue;
            }
            if collides(&bb, spacing, &obstacles, &board.keepouts) {
                continue;
            }
            if thermal && too_dense(at, config, &obstacles) {
                continue;
            }
            return Some((at, rotation));
        }
    }
    None
}

fn collides(bb: &Rect, spacing: f64, obstacles: &[(Rect, Point)], keepouts: &[Rect]) -> bool {
    let inflated = bb.inflate(spacing);
    obstacles.iter().any(|(o, _)| inflated.overlaps(o))
        || keepouts.iter().any(|k| inflated.overlaps(k))
}

fn too_dense(at: Point, config: &Config, obstacles: &[(Rect, Point)]) -> bool {
    let radius = config.placement.max_component_density_radius;
    let nearby = obstacles
        .iter()
        .filter(|(_, center)| center.distance(at) <= radius)
        .count();
    nearby > config.placement.max_nearby_components
}

/// Sort key turning `R10` into `("R", 10)` so references order naturally.
fn reference_key(reference: &str) -> (String, u32) {
    let split = reference
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(reference.len());
    let (prefix, digits) = reference.split_at(split);
    (prefix.to_string(), digits.parse().unwrap_or(0))
}

// ---------------------------------------------------------------------------
// Front panel
// ---------------------------------------------------------------------------

/// Pin jacks, pots, switches, and LEDs along the preset's panel edge at the
/// preset pitch (edge-to-edge gap between successive courtyards).
fn plan_panel_components(
    netlist: &Netlist,
    board: &Board,
    planned: &[Planned],
    fixed: &[(Rect, Point)],
    panel: audiopcb::board::PanelRules,
    spacing: f64,
) -> Result<Vec<Planned>, PlacementInfeasible> {
    use audiopcb::board::Edge;

    let usable = board.usable();
    let mut result = Vec::new();

    let mut members: Vec<(ComponentId, String)> = netlist
        .iter_components()
        .filter(|(id, comp)| {
            comp.kind.is_panel_mount()
                && comp.position.is_none()
                && !planned.iter().any(|p| p.id == *id)
        })
        .map(|(id, comp)| (id, comp.reference.clone()))
        .collect();
    // Jacks first, then pots, switches, LEDs; reference order within a kind.
    members.sort_by_key(|(id, reference)| {
        let rank = match netlist.component(*id).kind {
            ComponentKind::Jack(_) => 0,
            ComponentKind::Potentiometer => 1,
            ComponentKind::Switch => 2,
            _ => 3,
        };
        (rank, reference_key(reference))
    });

    let mut cursor = match panel.edge {
        Edge::Left | Edge::Right => usable.y,
        Edge::Top | Edge::Bottom => usable.x,
    };

    for (id, reference) in members {
        let comp = netlist.component(id);
        let pitch = match comp.kind {
            ComponentKind::Jack(_) => panel.jack_pitch,
            ComponentKind::Potentiometer => panel.pot_pitch,
            _ => panel.led_pitch,
        };
        let gap = pitch.max(spacing);
        let (w, h) = comp.courtyard;
        let group = groups::group_of(comp.kind);

        // Advance along the edge until clear of fixed obstacles (mounting
        // holes sit in the corners).
        let mut tries = 0;
        loop {
            let at = match panel.edge {
                Edge::Left => Point::new(usable.x + w / 2.0, cursor + h / 2.0),
                Edge::Right => Point::new(usable.right() - w / 2.0, cursor + h / 2.0),
                Edge::Top => Point::new(cursor + w / 2.0, usable.y + h / 2.0),
                Edge::Bottom => Point::new(cursor + w / 2.0, usable.bottom() - h / 2.0),
            };
            let bb = Rect::centered(at, w, h);
            let extent = match panel.edge {
                Edge::Left | Edge::Right => h,
                Edge::Top | Edge::Bottom => w,
            };
            let limit = match panel.edge {
                Edge::Left | Edge::Right => usable.bottom(),
                Edge::Top | Edge::Bottom => usable.right(),
            };
            if cursor + extent > limit {
                return Err(PlacementInfeasible {
                    reference,
                    reason: format!("panel edge full at {:.1} mm", cursor),
                });
            }
            let clear = !fixed.iter().any(|(o, _)| bb.inflate(spacing).overlaps(o))
                && !result.iter().any(|p: &Planned| {
                    let (pw, ph) = netlist.component(p.id).courtyard;
                    bb.inflate(gap).overlaps(&Rect::centered(p.at, pw, ph))
                });
            if clear {
                result.push(Planned {
                    id,
                    at,
                    rotation: 0,
                    group,
                });
                cursor += extent + gap;
                break;
            }
            cursor += 1.0;
            tries += 1;
            if tries > 1000 {
                return Err(PlacementInfeasible {
                    reference,
                    reason: "panel edge scan exhausted".into(),
                });
            }
        }
    }
    Ok(result)
}

// ---------------------------------------------------------------------------
// Decoupling
// ---------------------------------------------------------------------------

/// True for capacitor values in the decoupling range (1 nF ..= 1 µF).
fn is_decoupling_value(value: &str) -> bool {
    matches!(parse_eng(value), Some(v) if (1e-9..=1e-6).contains(&v))
}

/// After general placement, pull each decoupling capacitor next to the IC
/// power pin it serves: nearest cap pin within `decoupling_cap_distance` of
/// the IC pin.
fn pull_in_decoupling(
    netlist: &Netlist,
    board: &Board,
    config: &Config,
    planned: &mut Vec<Planned>,
    fixed: &[(Rect, Point)],
) {
    let target = config.placement.decoupling_cap_distance;
    let spacing = config.placement.min_component_spacing;

    // (cap component, IC power-pin position) pairs sharing a power net.
    let mut jobs: Vec<(ComponentId, Point)> = Vec::new();
    for (_, net) in netlist.iter_nets() {
        if net.class != audiopcb::netlist::SignalClass::Power {
            continue;
        }
        let pin_positions: Vec<Point> = net
            .endpoints
            .iter()
            .filter(|ep| netlist.component(ep.component).kind.is_active())
            .filter_map(|ep| {
                let comp = netlist.component(ep.component);
                let at = planned.iter().find(|p| p.id == ep.component).map(|p| p.at)?;
                let mut probe = comp.clone();
                probe.position = Some(at);
                probe.pin_position(ep.pin)
            })
            .collect();
        if pin_positions.is_empty() {
            continue;
        }
        for ep in &net.endpoints {
            let comp = netlist.component(ep.component);
            if !matches!(comp.kind, ComponentKind::Capacitor(_))
                || !is_decoupling_value(&comp.value)
            {
                continue;
            }
            // Serve the nearest placed IC power pin.
            let Some(current) = planned.iter().find(|p| p.id == ep.component).map(|p| p.at)
            else {
                continue;
            };
            let Some(pin) = pin_positions
                .iter()
                .min_by(|a, b| {
                    a.distance(current)
                        .partial_cmp(&b.distance(current))
                        .unwrap_or(std::cmp::Ordering::Equal)
                })
                .copied()
            else {
                continue;
            };
            jobs.push((ep.component, pin));
        }
    }

    for (cap_id, pin) in jobs {
        let Some(slot) = planned.iter().position(|p| p.id == cap_id) else {
            continue;
        };
        let comp = netlist.component(cap_id);
        let scan = Rect::centered(pin, 2.0 * (target + comp.courtyard.0), 2.0 * (target + comp.courtyard.0));

        let mut obstacles: Vec<(Rect, Point)> = fixed.to_vec();
        for (i, p) in planned.iter().enumerate() {
            if i == slot {
                continue;
            }
            let (w, h) = oriented(netlist.component(p.id).courtyard, p.rotation);
            obstacles.push((Rect::centered(p.at, w, h), p.at));
        }

        let mut candidates = grid_points(scan, DECOUPLING_SCAN_STEP);
        candidates.sort_by(|a, b| {
            a.distance(pin)
                .partial_cmp(&b.distance(pin))
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal))
        });

        'candidates: for at in candidates {
            for rotation in [0u16, 180, 90, 270] {
                let (w, h) = oriented(comp.courtyard, rotation);
                let bb = Rect::centered(at, w, h);
                if !board.usable().contains_rect(&bb) {
                    continue;
                }
                if collides(&bb, spacing, &obstacles, &board.keepouts) {
                    continue;
                }
                let mut probe = comp.clone();
                probe.position = Some(at);
                probe.rotation = rotation;
                let near = comp
                    .pin_map
                    .keys()
                    .filter_map(|&n| probe.pin_position(n))
                    .any(|p| p.distance(pin) <= target + 1e-6);
                if near {
                    planned[slot].at = at;
                    planned[slot].rotation = rotation;
                    break 'candidates;
                }
            }
        }
    }
}
