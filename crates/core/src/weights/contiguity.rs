//! Queen/rook contiguity weights from polygon topology.
//!
//! Two polygons are queen-contiguous when they share at least one vertex and
//! rook-contiguous when they share at least one edge. Shared vertices are
//! detected by coordinate hashing (exact bits, or a tolerance-cell probe when
//! `precision_threshold` is set), so construction is O(total vertices) rather
//! than O(n²) pairwise polygon comparison.

use std::collections::HashMap;

use crate::geometry::GeometrySet;
use crate::{Error, Result};

use super::{WeightsGraph, WeightsKind};

/// Options for queen/rook contiguity construction.
#[derive(Debug, Clone, Copy)]
pub struct ContiguityParams {
    /// Contiguity order (1 = direct neighbors).
    pub order: usize,
    /// With `order > 1`, whether to union orders 1..=order instead of
    /// keeping exactly order-k neighbors.
    pub include_lower_order: bool,
    /// Tolerance for near-coincident vertices; 0.0 means exact matching.
    pub precision_threshold: f64,
}

impl Default for ContiguityParams {
    fn default() -> Self {
        Self {
            order: 1,
            include_lower_order: false,
            precision_threshold: 0.0,
        }
    }
}

/// Queen contiguity: shared vertex (within `precision_threshold`).
pub fn queen_weights(geoms: &GeometrySet, params: &ContiguityParams) -> Result<WeightsGraph> {
    contiguity(geoms, true, params)
}

/// Rook contiguity: shared edge (within `precision_threshold`).
pub fn rook_weights(geoms: &GeometrySet, params: &ContiguityParams) -> Result<WeightsGraph> {
    contiguity(geoms, false, params)
}

fn contiguity(geoms: &GeometrySet, queen: bool, params: &ContiguityParams) -> Result<WeightsGraph> {
    geoms.ensure_non_empty()?;
    if !geoms.is_polygonal() {
        return Err(Error::invalid_parameter(
            "geometry",
            "points",
            "contiguity weights require polygon geometries; use distance or knn weights for points",
        ));
    }
    if params.order == 0 {
        return Err(Error::invalid_parameter("order", 0, "must be >= 1"));
    }
    if params.precision_threshold < 0.0 {
        return Err(Error::invalid_parameter(
            "precision_threshold",
            params.precision_threshold,
            "must be >= 0",
        ));
    }

    let mut first_order = if params.precision_threshold > 0.0 {
        fuzzy_first_order(geoms, queen, params.precision_threshold)?
    } else {
        exact_first_order(geoms, queen)?
    };
    for list in &mut first_order {
        list.sort_unstable();
        list.dedup();
    }

    let neighbors = if params.order == 1 {
        first_order
    } else {
        higher_order(&first_order, params.order, params.include_lower_order)
    };

    Ok(WeightsGraph::from_parts(neighbors, None, WeightsKind::Contiguity))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum ContiguityKey {
    Vertex((u64, u64)),
    Edge(((u64, u64), (u64, u64))),
}

fn push_unique(list: &mut Vec<usize>, i: usize) {
    if list.last() != Some(&i) {
        list.push(i);
    }
}

/// Bucket features by bit-identical shared vertex (queen) or shared edge
/// (rook) and link every pair sharing a bucket.
fn exact_first_order(geoms: &GeometrySet, queen: bool) -> Result<Vec<Vec<usize>>> {
    let n = geoms.len();
    let key = |x: f64, y: f64| -> (u64, u64) { (x.to_bits(), y.to_bits()) };

    let mut buckets: HashMap<ContiguityKey, Vec<usize>> = HashMap::new();
    for i in 0..n {
        let mp = geoms.polygon(i).ok_or(Error::EmptyInput("polygon"))?;
        for poly in &mp.0 {
            for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
                let coords = &ring.0;
                if queen {
                    for c in coords {
                        push_unique(buckets.entry(ContiguityKey::Vertex(key(c.x, c.y))).or_default(), i);
                    }
                } else {
                    for pair in coords.windows(2) {
                        let a = key(pair[0].x, pair[0].y);
                        let b = key(pair[1].x, pair[1].y);
                        if a == b {
                            continue;
                        }
                        let edge = if a <= b { (a, b) } else { (b, a) };
                        push_unique(buckets.entry(ContiguityKey::Edge(edge)).or_default(), i);
                    }
                }
            }
        }
    }

    let mut first_order: Vec<Vec<usize>> = vec![Vec::new(); n];
    for members in buckets.into_values() {
        for (a, &i) in members.iter().enumerate() {
            for &j in &members[a + 1..] {
                if i != j {
                    first_order[i].push(j);
                    first_order[j].push(i);
                }
            }
        }
    }
    Ok(first_order)
}

/// Tolerance matching with cell size `t`. Candidates are bucketed by floor
/// cell; two coordinates within `t` land at most one cell apart on each axis,
/// so probing the 3x3 cell neighborhood and checking the actual Euclidean
/// distance finds every match, including pairs straddling a cell boundary.
fn fuzzy_first_order(geoms: &GeometrySet, queen: bool, t: f64) -> Result<Vec<Vec<usize>>> {
    let n = geoms.len();
    let cell = |v: f64| -> i64 { (v / t).floor() as i64 };
    let close = |ax: f64, ay: f64, bx: f64, by: f64| -> bool {
        let (dx, dy) = (ax - bx, ay - by);
        dx * dx + dy * dy <= t * t
    };

    let mut first_order: Vec<Vec<usize>> = vec![Vec::new(); n];

    if queen {
        let mut cells: HashMap<(i64, i64), Vec<(usize, f64, f64)>> = HashMap::new();
        for i in 0..n {
            let mp = geoms.polygon(i).ok_or(Error::EmptyInput("polygon"))?;
            for poly in &mp.0 {
                for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
                    for c in &ring.0 {
                        cells.entry((cell(c.x), cell(c.y))).or_default().push((i, c.x, c.y));
                    }
                }
            }
        }
        for (&(cx, cy), members) in &cells {
            for &(i, ax, ay) in members {
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        if let Some(others) = cells.get(&(cx + dx, cy + dy)) {
                            for &(j, bx, by) in others {
                                if i != j && close(ax, ay, bx, by) {
                                    first_order[i].push(j);
                                }
                            }
                        }
                    }
                }
            }
        }
    } else {
        // Segments are keyed by midpoint cell: endpoint-wise t-close edges
        // have midpoints within t, so the same 3x3 probe applies. Endpoints
        // match in either orientation.
        let mut cells: HashMap<(i64, i64), Vec<(usize, [f64; 4])>> = HashMap::new();
        for i in 0..n {
            let mp = geoms.polygon(i).ok_or(Error::EmptyInput("polygon"))?;
            for poly in &mp.0 {
                for ring in std::iter::once(poly.exterior()).chain(poly.interiors().iter()) {
                    for pair in ring.0.windows(2) {
                        let (a, b) = (pair[0], pair[1]);
                        if close(a.x, a.y, b.x, b.y) {
                            // Sub-tolerance edge, treat as degenerate.
                            continue;
                        }
                        let (mx, my) = ((a.x + b.x) / 2.0, (a.y + b.y) / 2.0);
                        cells
                            .entry((cell(mx), cell(my)))
                            .or_default()
                            .push((i, [a.x, a.y, b.x, b.y]));
                    }
                }
            }
        }
        for (&(cx, cy), members) in &cells {
            for &(i, sa) in members {
                for dx in -1..=1 {
                    for dy in -1..=1 {
                        if let Some(others) = cells.get(&(cx + dx, cy + dy)) {
                            for &(j, sb) in others {
                                if i == j {
                                    continue;
                                }
                                let fwd = close(sa[0], sa[1], sb[0], sb[1])
                                    && close(sa[2], sa[3], sb[2], sb[3]);
                                let rev = close(sa[0], sa[1], sb[2], sb[3])
                                    && close(sa[2], sa[3], sb[0], sb[1]);
                                if fwd || rev {
                                    first_order[i].push(j);
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    Ok(first_order)
}

/// BFS expansion of a first-order adjacency to order `k`.
fn higher_order(first: &[Vec<usize>], order: usize, include_lower: bool) -> Vec<Vec<usize>> {
    let n = first.len();
    let mut result = vec![Vec::new(); n];
    let mut dist = vec![usize::MAX; n];

    for (start, out) in result.iter_mut().enumerate() {
        for d in dist.iter_mut() {
            *d = usize::MAX;
        }
        dist[start] = 0;
        let mut frontier = vec![start];
        for level in 1..=order {
            let mut next = Vec::new();
            for &u in &frontier {
                for &v in &first[u] {
                    if dist[v] == usize::MAX {
                        dist[v] = level;
                        next.push(v);
                        if level == order || include_lower {
                            out.push(v);
                        }
                    }
                }
            }
            frontier = next;
        }
    }
    result
}
