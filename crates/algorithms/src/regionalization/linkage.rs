//! Contiguity-constrained hierarchical agglomeration.
//!
//! Cluster-pair dissimilarities follow the chosen linkage via Lance-Williams
//! updates over all active pairs (full-order), while merges are restricted
//! to cluster pairs connected by at least one first-order contiguity edge.
//! Each merge records the cheapest first-order edge realizing it, so a full
//! agglomeration run doubles as a spanning-tree construction for REDCAP.

use std::collections::HashMap;
use std::str::FromStr;

use ndarray::Array2;

use esda_core::{DistanceMetric, Error, Result, WeightsGraph};

use super::tree::{SpanningTree, UnionFind};

/// Linkage rule for cluster-pair dissimilarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linkage {
    Single,
    Complete,
    Average,
    /// Ward's criterion; initial dissimilarities are squared distances.
    Ward,
}

impl FromStr for Linkage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "single" => Ok(Linkage::Single),
            "complete" => Ok(Linkage::Complete),
            "average" => Ok(Linkage::Average),
            "ward" => Ok(Linkage::Ward),
            other => Err(Error::invalid_parameter(
                "linkage_method",
                other,
                "expected one of single, complete, average, ward",
            )),
        }
    }
}

impl Linkage {
    /// Lance-Williams update: dissimilarity of the merged cluster A∪B to C.
    fn update(&self, d_ac: f64, d_bc: f64, d_ab: f64, na: f64, nb: f64, nc: f64) -> f64 {
        match self {
            Linkage::Single => d_ac.min(d_bc),
            Linkage::Complete => d_ac.max(d_bc),
            Linkage::Average => (na * d_ac + nb * d_bc) / (na + nb),
            Linkage::Ward => {
                ((na + nc) * d_ac + (nb + nc) * d_bc - nc * d_ab) / (na + nb + nc)
            }
        }
    }
}

/// A completed agglomeration: the first-order spanning edges in merge order.
pub(crate) struct Agglomeration {
    n: usize,
    /// `(u, v)` observation pairs, one per merge, cheapest cross edge first.
    merge_edges: Vec<(usize, usize)>,
}

impl Agglomeration {
    /// Cluster labels after all but `k - 1` merges, labels ordered by
    /// component size descending.
    pub fn labels(&self, k: usize) -> Vec<usize> {
        let mut uf = UnionFind::new(self.n);
        for &(u, v) in self.merge_edges.iter().take(self.n - k) {
            uf.union(u, v);
        }
        compact_labels(&mut uf, self.n)
    }

    /// The n-1 merge edges as a spanning tree.
    pub fn spanning_tree(&self) -> Result<SpanningTree> {
        SpanningTree::from_edges(self.n, self.merge_edges.clone())
    }
}

/// Map union-find roots to dense labels, largest component first.
pub(crate) fn compact_labels(uf: &mut UnionFind, n: usize) -> Vec<usize> {
    let roots: Vec<usize> = (0..n).map(|i| uf.find(i)).collect();
    let mut sizes: HashMap<usize, usize> = HashMap::new();
    for &r in &roots {
        *sizes.entry(r).or_insert(0) += 1;
    }
    let mut ordered: Vec<(usize, usize)> = sizes.into_iter().collect();
    ordered.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let label_of: HashMap<usize, usize> = ordered
        .iter()
        .enumerate()
        .map(|(c, &(r, _))| (r, c))
        .collect();
    roots.into_iter().map(|r| label_of[&r]).collect()
}

/// Run the constrained agglomeration down to a single cluster.
pub(crate) fn constrained_agglomeration(
    w: &WeightsGraph,
    matrix: &Array2<f64>,
    metric: DistanceMetric,
    linkage: Linkage,
) -> Result<Agglomeration> {
    let n = w.num_obs();
    if n == 0 {
        return Err(Error::EmptyInput("weights graph"));
    }

    // Dense pairwise dissimilarities between active clusters, indexed by the
    // surviving cluster's original singleton index.
    let mut dist = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        let ri: Vec<f64> = matrix.row(i).to_vec();
        for j in (i + 1)..n {
            let rj: Vec<f64> = matrix.row(j).to_vec();
            let mut d = metric.distance(&ri, &rj);
            if linkage == Linkage::Ward {
                d *= d;
            }
            dist[i][j] = d;
            dist[j][i] = d;
        }
    }

    let mut active = vec![true; n];
    let mut size = vec![1.0f64; n];
    // Cheapest first-order edge between each contiguous cluster pair.
    let mut cross: HashMap<(usize, usize), (usize, usize, f64)> = HashMap::new();
    for u in 0..n {
        for &v in w.neighbors(u) {
            if v > u {
                let ru: Vec<f64> = matrix.row(u).to_vec();
                let rv: Vec<f64> = matrix.row(v).to_vec();
                cross.insert((u, v), (u, v, metric.distance(&ru, &rv)));
            }
        }
    }
    let mut merge_edges = Vec::with_capacity(n - 1);
    for _ in 0..n.saturating_sub(1) {
        // Cheapest contiguous active pair under the current linkage; ties
        // break on the pair key so results do not depend on hash order.
        let mut best: Option<(usize, usize, f64)> = None;
        for (&(a, b), _) in &cross {
            let d = dist[a][b];
            let better = match best {
                None => true,
                Some((ba, bb, bd)) => d < bd || (d == bd && (a, b) < (ba, bb)),
            };
            if better {
                best = Some((a, b, d));
            }
        }
        let Some((a, b, d_ab)) = best else {
            return Err(Error::Algorithm(
                "weights graph is not fully connected".into(),
            ));
        };

        let &(eu, ev, _) = cross
            .get(&(a, b))
            .ok_or_else(|| Error::Algorithm("missing cross edge".into()))?;
        merge_edges.push((eu, ev));

        // Merge b into a.
        for c in 0..n {
            if active[c] && c != a && c != b {
                dist[a][c] = linkage.update(dist[a][c], dist[b][c], d_ab, size[a], size[b], size[c]);
                dist[c][a] = dist[a][c];
            }
        }
        size[a] += size[b];
        active[b] = false;

        // Rekey b's cross edges onto a, keeping the cheaper edge per pair.
        let mut rekeyed: Vec<((usize, usize), (usize, usize, f64))> = Vec::new();
        cross.retain(|&(x, y), &mut edge| {
            if x == b || y == b {
                let other = if x == b { y } else { x };
                if other != a {
                    rekeyed.push((pair_key(a, other), edge));
                }
                false
            } else {
                true
            }
        });
        for (key, edge) in rekeyed {
            cross
                .entry(key)
                .and_modify(|e| {
                    if edge.2 < e.2 {
                        *e = edge;
                    }
                })
                .or_insert(edge);
        }
    }

    if merge_edges.len() + 1 != n {
        return Err(Error::Algorithm(
            "weights graph is not fully connected".into(),
        ));
    }
    Ok(Agglomeration { n, merge_edges })
}

fn pair_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
