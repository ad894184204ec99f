//! Multi-layer routing lattice and deterministic shortest-path search.
//!
//! The board's usable area is discretized at the routing grid step. Nodes
//! are (layer, row, col) cells; moves are the four orthogonal neighbors on
//! a layer (cost = step, scaled by the layer's preference factor) or a via
//! to another layer (fixed cost). All costs are integer milli-millimeters
//! so tie-breaking is exact and runs are reproducible.

use audiopcb::geom::{point_segment_distance, Point, Rect};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell {
    pub layer: usize,
    pub row: usize,
    pub col: usize,
}

/// The lattice geometry (no occupancy).
#[derive(Debug, Clone)]
pub struct RouteGrid {
    pub origin: Point,
    pub step: f64,
    pub cols: usize,
    pub rows: usize,
    pub layers: usize,
}

impl RouteGrid {
    pub fn new(area: Rect, step: f64, layers: usize) -> RouteGrid {
        let cols = (area.w / step).floor() as usize + 1;
        let rows = (area.h / step).floor() as usize + 1;
        RouteGrid {
            origin: Point::new(area.x, area.y),
            step,
            cols,
            rows,
            layers,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.layers * self.rows * self.cols
    }

    pub fn index(&self, cell: Cell) -> usize {
        (cell.layer * self.rows + cell.row) * self.cols + cell.col
    }

    pub fn cell_at(&self, index: usize) -> Cell {
        let per_layer = self.rows * self.cols;
        Cell {
            layer: index / per_layer,
            row: (index % per_layer) / self.cols,
            col: index % self.cols,
        }
    }

    /// Snap a board point to the nearest cell on a layer.
    pub fn snap(&self, p: Point, layer: usize) -> Cell {
        let col = ((p.x - self.origin.x) / self.step).round().max(0.0) as usize;
        let row = ((p.y - self.origin.y) / self.step).round().max(0.0) as usize;
        Cell {
            layer,
            row: row.min(self.rows - 1),
            col: col.min(self.cols - 1),
        }
    }

    pub fn position(&self, cell: Cell) -> Point {
        Point::new(
            self.origin.x + cell.col as f64 * self.step,
            self.origin.y + cell.row as f64 * self.step,
        )
    }
}

/// Per-net occupancy view: hard blocks plus soft (crosstalk-shaping) costs.
#[derive(Debug, Clone)]
pub struct Occupancy {
    blocked: Vec<bool>,
    extra: Vec<u32>,
}

impl Occupancy {
    pub fn open(grid: &RouteGrid) -> Occupancy {
        Occupancy {
            blocked: vec![false; grid.cell_count()],
            extra: vec![0; grid.cell_count()],
        }
    }

    pub fn block(&mut self, grid: &RouteGrid, cell: Cell) {
        self.blocked[grid.index(cell)] = true;
    }

    pub fn unblock(&mut self, grid: &RouteGrid, cell: Cell) {
        self.blocked[grid.index(cell)] = false;
    }

    pub fn is_blocked(&self, grid: &RouteGrid, cell: Cell) -> bool {
        self.blocked[grid.index(cell)]
    }

    pub fn add_cost(&mut self, grid: &RouteGrid, cell: Cell, milli_mm: u32) {
        let i = grid.index(cell);
        self.extra[i] = self.extra[i].saturating_add(milli_mm);
    }

    /// Block every cell on `layer` whose center lies within `halo` of the
    /// segment `a`–`b`.
    pub fn block_segment(&mut self, grid: &RouteGrid, layer: usize, a: Point, b: Point, halo: f64) {
        self.for_cells_near(grid, layer, a, b, halo, |occ, idx| occ.blocked[idx] = true);
    }

    /// Add soft cost to cells in the band `halo..halo + band` around the
    /// segment (discourages long parallel runs without forbidding them).
    pub fn penalize_segment(
        &mut self,
        grid: &RouteGrid,
        layer: usize,
        a: Point,
        b: Point,
        halo: f64,
        band: f64,
        milli_mm: u32,
    ) {
        let mut marked: Vec<usize> = Vec::new();
        self.for_cells_near(grid, layer, a, b, halo + band, |_, idx| marked.push(idx));
        for idx in marked {
            let cell = grid.cell_at(idx);
            let d = point_segment_distance(grid.position(cell), a, b);
            if d > halo {
                self.extra[idx] = self.extra[idx].saturating_add(milli_mm);
            }
        }
    }

    /// Block cells whose center falls inside `rect` on `layer`.
    pub fn block_rect(&mut self, grid: &RouteGrid, layer: usize, rect: Rect) {
        let lo = grid.snap(Point::new(rect.x, rect.y), layer);
        let hi = grid.snap(Point::new(rect.right(), rect.bottom()), layer);
        for row in lo.row..=hi.row {
            for col in lo.col..=hi.col {
                let cell = Cell { layer, row, col };
                if rect.contains_point(grid.position(cell)) {
                    self.blocked[grid.index(cell)] = true;
                }
            }
        }
    }

    fn for_cells_near(
        &mut self,
        grid: &RouteGrid,
        layer: usize,
        a: Point,
        b: Point,
        halo: f64,
        mut apply: impl FnMut(&mut Self, usize),
    ) {
        let bb = Rect::new(a.x.min(b.x), a.y.min(b.y), (a.x - b.x).abs(), (a.y - b.y).abs())
            .inflate(halo);
        let lo = grid.snap(Point::new(bb.x, bb.y), layer);
        let hi = grid.snap(Point::new(bb.right(), bb.bottom()), layer);
        for row in lo.row..=hi.row {
            for col in lo.col..=hi.col {
                let cell = Cell { layer, row, col };
                if point_segment_distance(grid.position(cell), a, b) <= halo {
                    let idx = grid.index(cell);
                    apply(self, idx);
                }
            }
        }
    }
}

/// Layer cost factors and via pricing for one net's search.
#[derive(Debug, Clone)]
pub struct SearchParams {
    /// Per-layer step multiplier ×1000 (1000 = neutral, preferred layer).
    pub layer_factor: Vec<u32>,
    /// Via insertion cost, milli-mm.
    pub via_cost: u64,
    /// Abandon the search once the best frontier cost exceeds this budget.
    pub cost_budget: u64,
}

/// Deterministic Dijkstra from `start` to `goal` over the open cells.
/// Start and goal are treated as open regardless of occupancy (they sit on
/// pads).
pub fn shortest_path(
    grid: &RouteGrid,
    occupancy: &Occupancy,
    params: &SearchParams,
    start: Cell,
    goal: Cell,
) -> Option<Vec<Cell>> {
    const UNSEEN: u64 = u64::MAX;
    let n = grid.cell_count();
    let mut dist = vec![UNSEEN; n];
    let mut prev = vec![u32::MAX; n];
    let mut heap: BinaryHeap<Reverse<(u64, u32)>> = BinaryHeap::new();

    let start_idx = grid.index(start);
    let goal_idx = grid.index(goal);
    dist[start_idx] = 0;
    heap.push(Reverse((0, start_idx as u32)));

    let step_milli = (grid.step * 1000.0).round() as u64;

    while let Some(Reverse((cost, idx))) = heap.pop() {
        let idx = idx as usize;
        if cost > dist[idx] {
            continue;
        }
        if idx == goal_idx {
            break;
        }
        if cost > params.cost_budget {
            return None;
        }
        let cell = grid.cell_at(idx);

        // Orthogonal moves in a fixed order keeps ties reproducible.
        let mut push = |next: Cell, move_cost: u64, heap: &mut BinaryHeap<Reverse<(u64, u32)>>,
                        dist: &mut Vec<u64>, prev: &mut Vec<u32>| {
            let nidx = grid.index(next);
            if occupancy.blocked[nidx] && nidx != goal_idx && nidx != start_idx {
                return;
            }
            let total = cost + move_cost + occupancy.extra[nidx] as u64;
            if total < dist[nidx] {
                dist[nidx] = total;
                prev[nidx] = idx as u32;
                heap.push(Reverse((total, nidx as u32)));
            }
        };

        let lateral = step_milli * params.layer_factor[cell.layer] as u64 / 1000;
        if cell.col + 1 < grid.cols {
            push(Cell { col: cell.col + 1, ..cell }, lateral, &mut heap, &mut dist, &mut prev);
        }
        if cell.col > 0 {
            push(Cell { col: cell.col - 1, ..cell }, lateral, &mut heap, &mut dist, &mut prev);
        }
        if cell.row + 1 < grid.rows {
            push(Cell { row: cell.row + 1, ..cell }, lateral, &mut heap, &mut dist, &mut prev);
        }
        if cell.row > 0 {
            push(Cell { row: cell.row - 1, ..cell }, lateral, &mut heap, &mut dist, &mut prev);
        }
        for layer in 0..grid.layers {
            if layer != cell.layer {
                push(Cell { layer, ..cell }, params.via_cost, &mut heap, &mut dist, &mut prev);
            }
        }
    }

    if dist[goal_idx] == UNSEEN {
        return None;
    }
    let mut path = vec![grid.cell_at(goal_idx)];
    let mut at = goal_idx;
    while at != start_idx {
        at = prev[at] as usize;
        path.push(grid.cell_at(at));
    }
    path.reverse();
    Some(path)
}

/// Drop interior collinear cells, keeping corners and layer changes.
pub fn simplify(path: &[Cell]) -> Vec<Cell> {
    if path.len() <= 2 {
        return path.to_vec();
    }
    let mut out = vec![path[0]];
    for i in 1..path.len() - 1 {
        let (a, b, c) = (path[i - 1], path[i], path[i + 1]);
        let straight = a.layer == b.layer
            && b.layer == c.layer
            && ((a.row == b.row && b.row == c.row) || (a.col == b.col && b.col == c.col));
        if !straight {
            out.push(b);
        }
    }
    out.push(path[path.len() - 1]);
    out
}
