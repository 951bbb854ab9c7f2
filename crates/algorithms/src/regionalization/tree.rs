//! Spanning-tree machinery shared by SKATER and REDCAP: contiguity edges
//! weighted in attribute space, Kruskal's MST, and the greedy tree-cut
//! partition. Trees are plain edge lists plus adjacency arrays over
//! observation indices.

use ndarray::Array2;

use esda_core::{DistanceMetric, Error, Result, WeightsGraph};

use super::{subset_ss, MinBound};

/// Array-based union-find with path halving.
pub(crate) struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Returns false when both were already in the same set.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
        true
    }
}

/// One undirected contiguity edge with its attribute-space cost.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Edge {
    pub u: usize,
    pub v: usize,
    pub cost: f64,
}

/// All first-order edges (u < v) of the weights graph, weighted by the
/// attribute distance between their endpoints.
pub(crate) fn attribute_edges(
    w: &WeightsGraph,
    matrix: &Array2<f64>,
    metric: DistanceMetric,
) -> Vec<Edge> {
    let mut edges = Vec::new();
    for u in 0..w.num_obs() {
        let row_u: Vec<f64> = matrix.row(u).to_vec();
        for &v in w.neighbors(u) {
            if v > u {
                let row_v: Vec<f64> = matrix.row(v).to_vec();
                edges.push(Edge {
                    u,
                    v,
                    cost: metric.distance(&row_u, &row_v),
                });
            }
        }
    }
    edges
}

/// A spanning tree as an explicit edge list plus adjacency arrays.
pub(crate) struct SpanningTree {
    pub n: usize,
    pub edges: Vec<(usize, usize)>,
    pub adj: Vec<Vec<usize>>,
}

impl SpanningTree {
    pub fn from_edges(n: usize, edges: Vec<(usize, usize)>) -> Result<Self> {
        if edges.len() + 1 != n {
            return Err(Error::Algorithm(format!(
                "spanning tree over {n} observations needs {} edges, got {}",
                n - 1,
                edges.len()
            )));
        }
        let mut adj = vec![Vec::new(); n];
        for &(u, v) in &edges {
            adj[u].push(v);
            adj[v].push(u);
        }
        Ok(Self { n, edges, adj })
    }
}

/// Kruskal's minimum spanning tree. Fails when the contiguity graph is not
/// fully connected (islands cannot be regionalized).
pub(crate) fn minimum_spanning_tree(
    n: usize,
    mut edges: Vec<Edge>,
) -> Result<SpanningTree> {
    edges.sort_by(|a, b| a.cost.partial_cmp(&b.cost).unwrap_or(std::cmp::Ordering::Equal));
    let mut uf = UnionFind::new(n);
    let mut kept = Vec::with_capacity(n.saturating_sub(1));
    for e in edges {
        if uf.union(e.u, e.v) {
            kept.push((e.u, e.v));
            if kept.len() == n - 1 {
                break;
            }
        }
    }
    if kept.len() + 1 != n {
        return Err(Error::Algorithm(
            "weights graph is not fully connected".into(),
        ));
    }
    SpanningTree::from_edges(n, kept)
}

/// One current region during tree partitioning.
struct Region {
    nodes: Vec<usize>,
    edges: Vec<(usize, usize)>,
    ss: f64,
}

/// The best edge removal found for a region.
struct Cut {
    edge_idx: usize,
    reduction: f64,
    part1: Vec<usize>,
    part2: Vec<usize>,
}

/// Cut `k - 1` edges out of the spanning tree, each time choosing the cut
/// with the largest within-SS reduction. With a bound constraint, only cuts
/// leaving both parts above the bound are eligible.
pub(crate) fn tree_partition(
    tree: &SpanningTree,
    matrix: &Array2<f64>,
    k: usize,
    bound: Option<&MinBound>,
) -> Result<Vec<usize>> {
    let all: Vec<usize> = (0..tree.n).collect();
    let ss = subset_ss(&all, matrix);
    let mut regions = vec![Region {
        nodes: all,
        edges: tree.edges.clone(),
        ss,
    }];

    while regions.len() < k {
        let mut best: Option<(usize, Cut)> = None;
        for (ri, region) in regions.iter().enumerate() {
            if let Some(cut) = best_cut(region, matrix, bound) {
                let better = match &best {
                    None => true,
                    Some((_, b)) => cut.reduction > b.reduction,
                };
                if better {
                    best = Some((ri, cut));
                }
            }
        }
        let Some((ri, cut)) = best else {
            return Err(Error::Algorithm(format!(
                "cannot split into {k} regions under the given constraints"
            )));
        };

        let old = regions.swap_remove(ri);
        let (r1, r2) = split_region(&old, cut, matrix);
        regions.push(r1);
        regions.push(r2);
    }

    let mut clusters = vec![0usize; tree.n];
    // Label regions largest-first so cluster 0 is the biggest, a stable
    // convention for downstream comparisons.
    regions.sort_by(|a, b| b.nodes.len().cmp(&a.nodes.len()));
    for (c, region) in regions.iter().enumerate() {
        for &i in &region.nodes {
            clusters[i] = c;
        }
    }
    Ok(clusters)
}

fn best_cut(region: &Region, matrix: &Array2<f64>, bound: Option<&MinBound>) -> Option<Cut> {
    if region.nodes.len() < 2 {
        return None;
    }
    let mut best: Option<Cut> = None;
    for (ei, &edge) in region.edges.iter().enumerate() {
        let part1 = component_without(region, edge, edge.0);
        if part1.len() == region.nodes.len() {
            continue; // edge was not a bridge within this region (cannot happen in a tree)
        }
        let in_part1: std::collections::HashSet<usize> = part1.iter().copied().collect();
        let part2: Vec<usize> = region
            .nodes
            .iter()
            .copied()
            .filter(|i| !in_part1.contains(i))
            .collect();

        if let Some(b) = bound {
            if !b.satisfied(b.sum(part1.iter().copied()))
                || !b.satisfied(b.sum(part2.iter().copied()))
            {
                continue;
            }
        }

        let reduction = region.ss - subset_ss(&part1, matrix) - subset_ss(&part2, matrix);
        let better = match &best {
            None => true,
            Some(b) => reduction > b.reduction,
        };
        if better {
            best = Some(Cut {
                edge_idx: ei,
                reduction,
                part1,
                part2,
            });
        }
    }
    best
}

/// BFS over the region's edges from `start`, skipping the removed edge.
fn component_without(region: &Region, removed: (usize, usize), start: usize) -> Vec<usize> {
    use std::collections::{HashMap, HashSet, VecDeque};
    let mut adj: HashMap<usize, Vec<usize>> = HashMap::new();
    for &(u, v) in &region.edges {
        if (u, v) == removed {
            continue;
        }
        adj.entry(u).or_default().push(v);
        adj.entry(v).or_default().push(u);
    }
    let mut seen = HashSet::new();
    seen.insert(start);
    let mut queue = VecDeque::from([start]);
    let mut out = vec![start];
    while let Some(u) = queue.pop_front() {
        if let Some(nbrs) = adj.get(&u) {
            for &v in nbrs {
                if seen.insert(v) {
                    out.push(v);
                    queue.push_back(v);
                }
            }
        }
    }
    out
}

fn split_region(old: &Region, cut: Cut, matrix: &Array2<f64>) -> (Region, Region) {
    use std::collections::HashSet;
    let in_part1: HashSet<usize> = cut.part1.iter().copied().collect();
    let mut edges1 = Vec::new();
    let mut edges2 = Vec::new();
    for (ei, &(u, v)) in old.edges.iter().enumerate() {
        if ei == cut.edge_idx {
            continue;
        }
        if in_part1.contains(&u) {
            edges1.push((u, v));
        } else {
            edges2.push((u, v));
        }
    }
    let ss1 = subset_ss(&cut.part1, matrix);
    let ss2 = subset_ss(&cut.part2, matrix);
    (
        Region {
            nodes: cut.part1,
            edges: edges1,
            ss: ss1,
        },
        Region {
            nodes: cut.part2,
            edges: edges2,
            ss: ss2,
        },
    )
}

/// Connected components of the subgraph induced by one cluster label.
pub(crate) fn label_components(w: &WeightsGraph, clusters: &[usize], label: usize) -> Vec<Vec<usize>> {
    use std::collections::VecDeque;
    let n = w.num_obs();
    let mut seen = vec![false; n];
    let mut comps = Vec::new();
    for s in 0..n {
        if clusters[s] != label || seen[s] {
            continue;
        }
        seen[s] = true;
        let mut comp = vec![s];
        let mut queue = VecDeque::from([s]);
        while let Some(u) = queue.pop_front() {
            for &v in w.neighbors(u) {
                if clusters[v] == label && !seen[v] {
                    seen[v] = true;
                    comp.push(v);
                    queue.push_back(v);
                }
            }
        }
        comps.push(comp);
    }
    comps
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::geometry::unit_lattice;
    use esda_core::weights::rook_weights;
    use ndarray::Array2;

    fn lattice(rows: usize, cols: usize) -> WeightsGraph {
        rook_weights(&unit_lattice(rows, cols), &Default::default()).unwrap()
    }

    fn column_matrix(values: &[f64]) -> Array2<f64> {
        Array2::from_shape_vec((values.len(), 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_union_find() {
        let mut uf = UnionFind::new(4);
        assert!(uf.union(0, 1));
        assert!(!uf.union(1, 0));
        assert!(uf.union(2, 3));
        assert_ne!(uf.find(0), uf.find(2));
        uf.union(1, 3);
        assert_eq!(uf.find(0), uf.find(2));
    }

    #[test]
    fn test_mst_size_and_connectivity_error() {
        let w = lattice(3, 3);
        let m = column_matrix(&[0.0; 9]);
        let edges = attribute_edges(&w, &m, DistanceMetric::Euclidean);
        let tree = minimum_spanning_tree(9, edges).unwrap();
        assert_eq!(tree.edges.len(), 8);

        // Remove all edges touching node 0: disconnected.
        let w2_edges: Vec<Edge> = attribute_edges(&w, &m, DistanceMetric::Euclidean)
            .into_iter()
            .filter(|e| e.u != 0 && e.v != 0)
            .collect();
        assert!(minimum_spanning_tree(9, w2_edges).is_err());
    }

    #[test]
    fn test_tree_partition_separates_step_function() {
        // Two homogeneous halves on a 2x4 lattice.
        let w = lattice(2, 4);
        let vals = [0.0, 0.0, 10.0, 10.0, 0.0, 0.0, 10.0, 10.0];
        let m = column_matrix(&vals);
        let edges = attribute_edges(&w, &m, DistanceMetric::Euclidean);
        let tree = minimum_spanning_tree(8, edges).unwrap();
        let clusters = tree_partition(&tree, &m, 2, None).unwrap();
        assert_eq!(clusters[0], clusters[1]);
        assert_eq!(clusters[0], clusters[4]);
        assert_eq!(clusters[2], clusters[3]);
        assert_ne!(clusters[0], clusters[2]);
    }

    #[test]
    fn test_tree_partition_respects_bound() {
        let w = lattice(1, 4);
        let vals = [0.0, 1.0, 10.0, 11.0];
        let m = column_matrix(&vals);
        let edges = attribute_edges(&w, &m, DistanceMetric::Euclidean);
        let tree = minimum_spanning_tree(4, edges).unwrap();
        // Each region must contain at least 2 observations.
        let bound = MinBound::new(vec![1.0; 4], 2.0);
        let clusters = tree_partition(&tree, &m, 2, Some(&bound)).unwrap();
        for c in 0..2 {
            assert!(clusters.iter().filter(|&&x| x == c).count() >= 2);
        }
        // A 4-way split cannot satisfy the bound.
        assert!(tree_partition(&tree, &m, 4, Some(&bound)).is_err());
    }

    #[test]
    fn test_label_components() {
        let w = lattice(1, 5);
        // Label 0 split across two ends.
        let clusters = vec![0, 1, 1, 0, 0];
        let comps = label_components(&w, &clusters, 0);
        assert_eq!(comps.len(), 2);
        let comps1 = label_components(&w, &clusters, 1);
        assert_eq!(comps1.len(), 1);
    }
}
