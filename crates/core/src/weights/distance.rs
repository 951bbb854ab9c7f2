//! Distance-band and k-nearest-neighbor weights.
//!
//! Both operate on observation centroids (points pass through unchanged).
//! Euclidean queries go through the k-d tree index; arc-distance queries fall
//! back to pairwise scans since the index is planar.

use geo_types::Point;

use crate::distance::GeoDistance;
use crate::geometry::GeometrySet;
use crate::kdtree::KdTree;
use crate::{Error, Result};

use super::{WeightsGraph, WeightsKind};

/// Options for distance-band weights.
#[derive(Debug, Clone, Copy)]
pub struct DistanceBandParams {
    /// Exponent applied to the distance when deriving edge weights.
    pub power: f64,
    /// Use inverse-distance weights (1 / d^power) instead of d^power.
    pub is_inverse: bool,
    /// Great-circle distance over lon/lat instead of Euclidean.
    pub is_arc: bool,
    /// Miles rather than kilometers for arc distance.
    pub is_mile: bool,
}

impl Default for DistanceBandParams {
    fn default() -> Self {
        Self {
            power: 1.0,
            is_inverse: false,
            is_arc: false,
            is_mile: true,
        }
    }
}

/// Options for kNN weights; same distance/weighting knobs as the band form.
pub type KnnParams = DistanceBandParams;

/// Distance-band weights: connect i, j when `d(i, j) <= dist_thres`.
pub fn distance_weights(
    geoms: &GeometrySet,
    dist_thres: f64,
    params: &DistanceBandParams,
) -> Result<WeightsGraph> {
    geoms.ensure_non_empty()?;
    if !(dist_thres > 0.0) {
        return Err(Error::invalid_parameter(
            "dist_thres",
            dist_thres,
            "must be a positive distance threshold",
        ));
    }

    let centroids = geoms.centroids();
    let metric = GeoDistance::from_flags(params.is_arc, params.is_mile);
    let n = centroids.len();

    let mut neighbors = vec![Vec::new(); n];
    let mut weights = vec![Vec::new(); n];

    if metric.is_planar() {
        let tree = KdTree::build(&centroids);
        for i in 0..n {
            for nb in tree.others_within_radius(i, dist_thres) {
                neighbors[i].push(nb.index);
                weights[i].push(edge_weight(nb.distance_sq.sqrt(), params));
            }
        }
    } else {
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = metric.distance(centroids[i], centroids[j]);
                if d <= dist_thres {
                    neighbors[i].push(j);
                    weights[i].push(edge_weight(d, params));
                }
            }
        }
    }

    Ok(WeightsGraph::from_parts(
        neighbors,
        Some(weights),
        WeightsKind::DistanceBand,
    ))
}

/// k-nearest-neighbor weights. Inherently asymmetric.
pub fn knn_weights(geoms: &GeometrySet, k: usize, params: &KnnParams) -> Result<WeightsGraph> {
    geoms.ensure_non_empty()?;
    let n = geoms.len();
    if k == 0 || k >= n {
        return Err(Error::invalid_parameter(
            "k",
            k,
            format!("must be in 1..{n} for {n} observations"),
        ));
    }

    let centroids = geoms.centroids();
    let metric = GeoDistance::from_flags(params.is_arc, params.is_mile);

    let mut neighbors = vec![Vec::new(); n];
    let mut weights = vec![Vec::new(); n];

    if metric.is_planar() {
        let tree = KdTree::build(&centroids);
        for i in 0..n {
            for nb in tree.k_nearest_others(i, k) {
                neighbors[i].push(nb.index);
                weights[i].push(edge_weight(nb.distance_sq.sqrt(), params));
            }
        }
    } else {
        for i in 0..n {
            let mut dists = all_other_distances(&centroids, i, metric);
            dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            for &(d, j) in dists.iter().take(k) {
                neighbors[i].push(j);
                weights[i].push(edge_weight(d, params));
            }
        }
    }

    Ok(WeightsGraph::from_parts(
        neighbors,
        Some(weights),
        WeightsKind::Knn,
    ))
}

/// The smallest distance threshold such that no observation is isolated:
/// the maximum over observations of the distance to their nearest other.
pub fn min_threshold(geoms: &GeometrySet, is_arc: bool, is_mile: bool) -> Result<f64> {
    geoms.ensure_non_empty()?;
    if geoms.len() < 2 {
        return Err(Error::invalid_parameter(
            "geometry",
            geoms.len(),
            "at least two observations required",
        ));
    }

    let centroids = geoms.centroids();
    let metric = GeoDistance::from_flags(is_arc, is_mile);
    let n = centroids.len();
    let mut thres: f64 = 0.0;

    if metric.is_planar() {
        let tree = KdTree::build(&centroids);
        for i in 0..n {
            if let Some(nb) = tree.nearest_other(i) {
                thres = thres.max(nb.distance_sq.sqrt());
            }
        }
    } else {
        for i in 0..n {
            let nearest = all_other_distances(&centroids, i, metric)
                .into_iter()
                .map(|(d, _)| d)
                .fold(f64::INFINITY, f64::min);
            thres = thres.max(nearest);
        }
    }

    Ok(thres)
}

fn edge_weight(d: f64, params: &DistanceBandParams) -> f64 {
    if params.is_inverse {
        if d > 0.0 {
            d.powf(params.power).recip()
        } else {
            0.0
        }
    } else {
        d.powf(params.power)
    }
}

fn all_other_distances(
    centroids: &[Point<f64>],
    i: usize,
    metric: GeoDistance,
) -> Vec<(f64, usize)> {
    centroids
        .iter()
        .enumerate()
        .filter(|&(j, _)| j != i)
        .map(|(j, &p)| (metric.distance(centroids[i], p), j))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::unit_lattice;

    #[test]
    fn test_distance_band_lattice() {
        let g = unit_lattice(3, 3);
        let w = distance_weights(&g, 1.0, &DistanceBandParams::default()).unwrap();
        // Unit centroids: threshold 1.0 gives rook adjacency.
        assert_eq!(w.neighbors(4), &[1, 3, 5, 7]);
        assert!(w.is_symmetric());
    }

    #[test]
    fn test_min_threshold_removes_isolates() {
        // Irregular points with one far-flung outlier.
        let g = GeometrySet::from_coords(&[
            (0.0, 0.0),
            (1.0, 0.2),
            (1.4, 1.1),
            (0.3, 1.9),
            (8.0, 8.0),
        ]);
        let thres = min_threshold(&g, false, true).unwrap();
        let w = distance_weights(&g, thres, &DistanceBandParams::default()).unwrap();
        assert!(!w.has_isolates());

        // Just below the threshold the outlier is isolated again.
        let w2 = distance_weights(&g, thres * 0.999, &DistanceBandParams::default()).unwrap();
        assert!(w2.has_isolates());
    }

    #[test]
    fn test_knn_counts() {
        let g = unit_lattice(4, 4);
        let w = knn_weights(&g, 4, &KnnParams::default()).unwrap();
        for i in 0..w.num_obs() {
            assert_eq!(w.neighbors(i).len(), 4);
        }
        assert_eq!(w.min_neighbors(), 4);
        assert_eq!(w.max_neighbors(), 4);
        assert_eq!(w.mean_neighbors(), 4.0);
    }

    #[test]
    fn test_knn_k_out_of_range() {
        let g = unit_lattice(2, 2);
        assert!(knn_weights(&g, 0, &KnnParams::default()).is_err());
        assert!(knn_weights(&g, 4, &KnnParams::default()).is_err());
    }

    #[test]
    fn test_inverse_distance_weights() {
        let g = GeometrySet::from_coords(&[(0.0, 0.0), (2.0, 0.0)]);
        let params = DistanceBandParams {
            is_inverse: true,
            power: 2.0,
            ..Default::default()
        };
        let w = distance_weights(&g, 3.0, &params).unwrap();
        assert!((w.neighbor_weights(0).unwrap()[0] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_bad_threshold() {
        let g = unit_lattice(2, 2);
        assert!(distance_weights(&g, 0.0, &DistanceBandParams::default()).is_err());
        assert!(distance_weights(&g, -1.0, &DistanceBandParams::default()).is_err());
    }

    #[test]
    fn test_arc_fallback_matches_euclidean_shape() {
        // Small lon/lat grid: arc kNN graph has the same degree structure.
        let g = GeometrySet::from_coords(&[
            (-88.0, 41.0),
            (-87.9, 41.0),
            (-88.0, 41.1),
            (-87.9, 41.1),
        ]);
        let params = KnnParams {
            is_arc: true,
            is_mile: false,
            ..Default::default()
        };
        let w = knn_weights(&g, 2, &params).unwrap();
        for i in 0..4 {
            assert_eq!(w.neighbors(i).len(), 2);
        }
    }
}
