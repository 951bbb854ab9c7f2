//! 2D k-d tree over observation locations.
//!
//! Backs the distance-band, k-nearest-neighbor and adaptive-kernel weights
//! constructors, and the `min_threshold` query, replacing O(n²) brute-force
//! scans. Planar coordinates only; arc-distance queries fall back to brute
//! force in the weights constructors.
//!
//! Reference:
//! Bentley, J.L. (1975). Multidimensional binary search trees used
//! for associative searching. CACM, 18(9).

use geo_types::Point;

/// A k-d tree over a fixed set of observation points.
///
/// Node arena indexed by `usize`; observation indices are preserved so query
/// results map directly onto the weights graph index space.
#[derive(Debug)]
pub struct KdTree {
    nodes: Vec<KdNode>,
    coords: Vec<(f64, f64)>,
}

#[derive(Debug)]
struct KdNode {
    /// Observation index
    obs: usize,
    /// Split dimension: 0 = x, 1 = y
    dim: u8,
    left: Option<usize>,
    right: Option<usize>,
}

/// A neighbor returned by a query: observation index and squared distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub distance_sq: f64,
}

impl KdTree {
    /// Build a tree from observation locations, O(n log² n).
    pub fn build(points: &[Point<f64>]) -> Self {
        let coords: Vec<(f64, f64)> = points.iter().map(|p| (p.x(), p.y())).collect();
        let mut nodes = Vec::with_capacity(coords.len());
        if !coords.is_empty() {
            let mut order: Vec<usize> = (0..coords.len()).collect();
            build_recursive(&coords, &mut order, 0, &mut nodes);
        }
        Self { nodes, coords }
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// The `k` nearest observations to the location of observation `query`,
    /// excluding `query` itself, sorted by ascending distance.
    pub fn k_nearest_others(&self, query: usize, k: usize) -> Vec<Neighbor> {
        if self.nodes.is_empty() || k == 0 {
            return Vec::new();
        }
        let (qx, qy) = self.coords[query];
        // Farthest-first sorted vec standing in for a max-heap; k is small.
        let mut heap: Vec<(f64, usize)> = Vec::with_capacity(k + 1);
        self.knn_recursive(0, qx, qy, k, Some(query), &mut heap);

        heap.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        heap.into_iter()
            .map(|(distance_sq, index)| Neighbor { index, distance_sq })
            .collect()
    }

    /// The nearest other observation to observation `query`.
    pub fn nearest_other(&self, query: usize) -> Option<Neighbor> {
        self.k_nearest_others(query, 1).into_iter().next()
    }

    /// All observations within `radius` of observation `query`'s location,
    /// excluding `query` itself. No ordering guarantee.
    pub fn others_within_radius(&self, query: usize, radius: f64) -> Vec<Neighbor> {
        if self.nodes.is_empty() || radius <= 0.0 {
            return Vec::new();
        }
        let (qx, qy) = self.coords[query];
        let mut out = Vec::new();
        self.radius_recursive(0, qx, qy, radius * radius, Some(query), &mut out);
        out
    }

    fn knn_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        k: usize,
        exclude: Option<usize>,
        heap: &mut Vec<(f64, usize)>,
    ) {
        let node = &self.nodes[node_idx];
        let (px, py) = self.coords[node.obs];
        let dx = qx - px;
        let dy = qy - py;
        let dist_sq = dx * dx + dy * dy;

        if Some(node.obs) != exclude {
            let worst = if heap.len() >= k { heap[0].0 } else { f64::MAX };
            if dist_sq < worst || heap.len() < k {
                if heap.len() >= k {
                    heap.remove(0);
                }
                let pos = heap
                    .binary_search_by(|probe| {
                        probe
                            .0
                            .partial_cmp(&dist_sq)
                            .unwrap_or(std::cmp::Ordering::Equal)
                            .reverse()
                    })
                    .unwrap_or_else(|e| e);
                heap.insert(pos, (dist_sq, node.obs));
            }
        }

        let diff = if node.dim == 0 { dx } else { dy };
        let (first, second) = if diff < 0.0 {
            (node.left, node.right)
        } else {
            (node.right, node.left)
        };

        if let Some(child) = first {
            self.knn_recursive(child, qx, qy, k, exclude, heap);
        }
        let threshold = if heap.len() >= k { heap[0].0 } else { f64::MAX };
        if diff * diff < threshold {
            if let Some(child) = second {
                self.knn_recursive(child, qx, qy, k, exclude, heap);
            }
        }
    }

    fn radius_recursive(
        &self,
        node_idx: usize,
        qx: f64,
        qy: f64,
        radius_sq: f64,
        exclude: Option<usize>,
        out: &mut Vec<Neighbor>,
    ) {
        let node = &self.nodes[node_idx];
        let (px, py) = self.coords[node.obs];
        let dx = qx - px;
        let dy = qy - py;
        let dist_sq = dx * dx + dy * dy;

        if dist_sq <= radius_sq && Some(node.obs) != exclude {
            out.push(Neighbor {
                index: node.obs,
                distance_sq: dist_sq,
            });
        }

        let diff = if node.dim == 0 { dx } else { dy };
        if let Some(left) = node.left {
            if diff > 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(left, qx, qy, radius_sq, exclude, out);
            }
        }
        if let Some(right) = node.right {
            if diff < 0.0 || diff * diff <= radius_sq {
                self.radius_recursive(right, qx, qy, radius_sq, exclude, out);
            }
        }
    }
}

fn build_recursive(
    coords: &[(f64, f64)],
    order: &mut [usize],
    depth: usize,
    nodes: &mut Vec<KdNode>,
) -> usize {
    let dim = (depth % 2) as u8;

    order.sort_by(|&a, &b| {
        let va = if dim == 0 { coords[a].0 } else { coords[a].1 };
        let vb = if dim == 0 { coords[b].0 } else { coords[b].1 };
        va.partial_cmp(&vb).unwrap_or(std::cmp::Ordering::Equal)
    });

    let median = order.len() / 2;
    let obs = order[median];
    let node_idx = nodes.len();
    nodes.push(KdNode {
        obs,
        dim,
        left: None,
        right: None,
    });

    if median > 0 {
        let mut left = order[..median].to_vec();
        let child = build_recursive(coords, &mut left, depth + 1, nodes);
        nodes[node_idx].left = Some(child);
    }
    if median + 1 < order.len() {
        let mut right = order[median + 1..].to_vec();
        let child = build_recursive(coords, &mut right, depth + 1, nodes);
        nodes[node_idx].right = Some(child);
    }
    node_idx
}
