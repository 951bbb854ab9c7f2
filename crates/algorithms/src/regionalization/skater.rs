//! SKATER: spanning-tree clustering by greedy edge removal.

use esda_core::{AttributeVector, Result, WeightsGraph};

use super::tree::{attribute_edges, minimum_spanning_tree, tree_partition};
use super::{build_matrix, check_k, ClusteringResult, MinBound, RegionalizationConfig};

/// Partition the observations into `k` contiguous regions by building the
/// minimum spanning tree of the contiguity graph (attribute-space edge
/// costs) and cutting the `k - 1` edges with the largest within-SS
/// reduction.
pub fn skater(
    w: &WeightsGraph,
    data: &[AttributeVector],
    k: usize,
    bound: Option<&MinBound>,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    let n = w.num_obs();
    check_k(k, n)?;
    if let Some(b) = bound {
        b.validate(n)?;
    }
    let matrix = build_matrix(data, cfg.scale_method)?;

    let edges = attribute_edges(w, &matrix, cfg.distance_metric);
    let tree = minimum_spanning_tree(n, edges)?;
    let clusters = tree_partition(&tree, &matrix, k, bound)?;
    Ok(ClusteringResult::evaluate(clusters, &matrix))
}
