//! Diagnostics for cluster assignments: fragmentation, join-count ratio,
//! compactness and diameter, plus `make_spatial` to repair non-contiguous
//! labelings.
//!
//! Compactness and diameter only make sense when every label's induced
//! subgraph is connected, so they are reported for spatially constrained
//! clusterings only; per-cluster fragmentation is the complementary
//! diagnostic for non-constrained ones.

use geo::{Area, ConvexHull, Euclidean, Length};
use geo_types::MultiPoint;

use esda_core::{Error, GeometrySet, Result, WeightsGraph};

use crate::regionalization::tree::label_components;

/// Entropy/Simpson diversity of a size distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragmentation {
    /// Number of groups (clusters overall, components per cluster).
    pub n: usize,
    pub entropy: f64,
    /// Entropy divided by `ln(n)`; 0 when a single group.
    pub std_entropy: f64,
    pub simpson: f64,
    /// Simpson index multiplied by `n`; 1 for a uniform distribution.
    pub std_simpson: f64,
}

impl Fragmentation {
    fn from_sizes(sizes: &[usize]) -> Self {
        let total: usize = sizes.iter().sum();
        let k = sizes.len();
        let mut entropy = 0.0;
        let mut simpson = 0.0;
        for &s in sizes {
            if s == 0 {
                continue;
            }
            let f = s as f64 / total as f64;
            entropy -= f * f.ln();
            simpson += f * f;
        }
        let std_entropy = if k > 1 { entropy / (k as f64).ln() } else { 0.0 };
        let std_simpson = simpson * k as f64;
        Self {
            n: k,
            entropy,
            std_entropy,
            simpson,
            std_simpson,
        }
    }
}

/// Joins within one cluster versus all joins touching it.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinCountRatio {
    /// Cluster size (observations).
    pub n: usize,
    /// Total neighbor links of the cluster's members.
    pub neighbors: usize,
    /// Links staying inside the cluster.
    pub join_count: usize,
    pub ratio: f64,
}

/// Shape compactness of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct Compactness {
    pub area: f64,
    pub perimeter: f64,
    /// Isoperimetric quotient `4πA / P²`; 1 for a circle.
    pub isoperimeter_quotient: f64,
}

/// Graph diameter of one cluster's induced subgraph.
#[derive(Debug, Clone, PartialEq)]
pub struct Diameter {
    /// Longest shortest path, in steps.
    pub steps: usize,
    /// Steps divided by the cluster size.
    pub ratio: f64,
}

/// The full diagnostic bundle from [`spatial_validation`].
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether every cluster's induced subgraph is connected.
    pub spatially_constrained: bool,
    /// Diversity of the cluster-size distribution.
    pub fragmentation: Fragmentation,
    /// Per-cluster component fragmentation; only for non-constrained input.
    pub cluster_fragmentation: Option<Vec<Fragmentation>>,
    /// Per-cluster join-count ratios, cluster label order.
    pub joincount_ratio: Vec<JoinCountRatio>,
    /// Combined join-count ratio over all clusters.
    pub all_joincount_ratio: JoinCountRatio,
    /// Per-cluster compactness; only for spatially constrained input with
    /// geometries supplied.
    pub compactness: Option<Vec<Compactness>>,
    /// Per-cluster diameters; only for spatially constrained input.
    pub diameter: Option<Vec<Diameter>>,
}

/// Compute the validation diagnostics for a cluster assignment.
///
/// `geoms` is optional; without it compactness is skipped (the graph-based
/// diagnostics do not need coordinates).
pub fn spatial_validation(
    clusters: &[usize],
    w: &WeightsGraph,
    geoms: Option<&GeometrySet>,
) -> Result<ValidationResult> {
    w.check_len("clusters", clusters.len())?;
    if clusters.is_empty() {
        return Err(Error::EmptyInput("cluster assignment"));
    }
    if let Some(g) = geoms {
        w.check_len("geometries", g.len())?;
    }
    let k = clusters.iter().max().map_or(0, |&m| m + 1);

    let mut sizes = vec![0usize; k];
    for &c in clusters {
        sizes[c] += 1;
    }
    if sizes.iter().any(|&s| s == 0) {
        return Err(Error::invalid_parameter(
            "clusters",
            k,
            "labels must be contiguous 0..k-1 with no empty cluster",
        ));
    }

    let components: Vec<Vec<Vec<usize>>> = (0..k)
        .map(|c| label_components(w, clusters, c))
        .collect();
    let spatially_constrained = components.iter().all(|comps| comps.len() == 1);

    let fragmentation = Fragmentation::from_sizes(&sizes);
    let cluster_fragmentation = if spatially_constrained {
        None
    } else {
        Some(
            components
                .iter()
                .map(|comps| {
                    let comp_sizes: Vec<usize> = comps.iter().map(|c| c.len()).collect();
                    Fragmentation::from_sizes(&comp_sizes)
                })
                .collect(),
        )
    };

    let joincount_ratio: Vec<JoinCountRatio> = (0..k)
        .map(|c| join_count_ratio(clusters, w, c, sizes[c]))
        .collect();
    let total_neighbors: usize = joincount_ratio.iter().map(|j| j.neighbors).sum();
    let total_joins: usize = joincount_ratio.iter().map(|j| j.join_count).sum();
    let all_joincount_ratio = JoinCountRatio {
        n: clusters.len(),
        neighbors: total_neighbors,
        join_count: total_joins,
        ratio: if total_neighbors > 0 {
            total_joins as f64 / total_neighbors as f64
        } else {
            0.0
        },
    };

    let compactness = match (spatially_constrained, geoms) {
        (true, Some(g)) => Some(
            components
                .iter()
                .map(|comps| cluster_compactness(&comps[0], g))
                .collect(),
        ),
        _ => None,
    };

    let diameter = if spatially_constrained {
        Some(
            components
                .iter()
                .map(|comps| cluster_diameter(&comps[0], w, clusters))
                .collect(),
        )
    } else {
        None
    };

    Ok(ValidationResult {
        spatially_constrained,
        fragmentation,
        cluster_fragmentation,
        joincount_ratio,
        all_joincount_ratio,
        compactness,
        diameter,
    })
}

fn join_count_ratio(
    clusters: &[usize],
    w: &WeightsGraph,
    label: usize,
    size: usize,
) -> JoinCountRatio {
    let mut neighbors = 0usize;
    let mut joins = 0usize;
    for (i, &c) in clusters.iter().enumerate() {
        if c != label {
            continue;
        }
        neighbors += w.neighbors(i).len();
        joins += w.neighbors(i).iter().filter(|&&j| clusters[j] == label).count();
    }
    JoinCountRatio {
        n: size,
        neighbors,
        join_count: joins,
        ratio: if neighbors > 0 {
            joins as f64 / neighbors as f64
        } else {
            0.0
        },
    }
}

/// Summed area/perimeter for polygon members; convex hull of the member
/// points otherwise.
fn cluster_compactness(members: &[usize], geoms: &GeometrySet) -> Compactness {
    let (area, perimeter) = if geoms.is_polygonal() {
        members.iter().fold((0.0, 0.0), |(a, p), &i| {
            (a + geoms.area(i), p + geoms.perimeter(i))
        })
    } else {
        let pts: Vec<geo_types::Point<f64>> = members.iter().map(|&i| geoms.centroid(i)).collect();
        let hull = MultiPoint::new(pts).convex_hull();
        let area = hull.unsigned_area();
        let perimeter = hull.exterior().length::<Euclidean>();
        (area, perimeter)
    };
    let ipq = if perimeter > 0.0 {
        4.0 * std::f64::consts::PI * area / (perimeter * perimeter)
    } else {
        0.0
    };
    Compactness {
        area,
        perimeter,
        isoperimeter_quotient: ipq,
    }
}

/// Longest shortest path within the cluster's induced subgraph.
fn cluster_diameter(members: &[usize], w: &WeightsGraph, clusters: &[usize]) -> Diameter {
    use std::collections::VecDeque;
    let label = clusters[members[0]];
    let mut steps = 0usize;
    for &start in members {
        // BFS eccentricity of `start` within the cluster.
        let mut dist = vec![usize::MAX; clusters.len()];
        dist[start] = 0;
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            for &v in w.neighbors(u) {
                if clusters[v] == label && dist[v] == usize::MAX {
                    dist[v] = dist[u] + 1;
                    queue.push_back(v);
                }
            }
        }
        let ecc = members
            .iter()
            .map(|&m| dist[m])
            .filter(|&d| d != usize::MAX)
            .max()
            .unwrap_or(0);
        steps = steps.max(ecc);
    }
    Diameter {
        steps,
        ratio: steps as f64 / members.len() as f64,
    }
}

/// Repair a non-contiguous labeling: each label keeps its largest connected
/// component; members of the smaller components are reassigned to the most
/// common adjacent label until every label's subgraph is connected.
pub fn make_spatial(clusters: &[usize], w: &WeightsGraph) -> Result<Vec<usize>> {
    w.check_len("clusters", clusters.len())?;
    if clusters.is_empty() {
        return Err(Error::EmptyInput("cluster assignment"));
    }
    let n = clusters.len();
    let k = clusters.iter().max().map_or(0, |&m| m + 1);
    let mut out = clusters.to_vec();

    let mut unassigned = vec![false; n];
    for label in 0..k {
        let mut comps = label_components(w, &out, label);
        if comps.len() <= 1 {
            continue;
        }
        comps.sort_by(|a, b| b.len().cmp(&a.len()).then(a[0].cmp(&b[0])));
        for comp in comps.iter().skip(1) {
            for &i in comp {
                unassigned[i] = true;
            }
        }
    }

    // Absorb detached members into adjacent kept labels, most frequent
    // adjacent label first (smallest label wins ties).
    loop {
        let mut progressed = false;
        let mut remaining = false;
        for i in 0..n {
            if !unassigned[i] {
                continue;
            }
            let mut votes = vec![0usize; k];
            let mut any = false;
            for &j in w.neighbors(i) {
                if !unassigned[j] {
                    votes[out[j]] += 1;
                    any = true;
                }
            }
            if any {
                let (label, _) = votes
                    .iter()
                    .enumerate()
                    .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))
                    .unwrap_or((0, &0));
                out[i] = label;
                unassigned[i] = false;
                progressed = true;
            } else {
                remaining = true;
            }
        }
        if !remaining {
            break;
        }
        if !progressed {
            return Err(Error::Algorithm(
                "weights graph is not fully connected".into(),
            ));
        }
    }
    Ok(out)
}
