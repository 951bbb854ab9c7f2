//! Kernel-weighted graphs: edge weights are a kernel function of the
//! normalized distance, with either a fixed bandwidth (distance band) or an
//! adaptive bandwidth (distance to the k-th nearest neighbor).

use std::str::FromStr;

use crate::distance::GeoDistance;
use crate::geometry::GeometrySet;
use crate::kdtree::KdTree;
use crate::{Error, Result};

use super::{WeightsGraph, WeightsKind};

/// Kernel function applied to `z = d / bandwidth`, `z ∈ [0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelType {
    Triangular,
    Uniform,
    Epanechnikov,
    Quartic,
    Gaussian,
}

impl FromStr for KernelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "triangular" => Ok(KernelType::Triangular),
            "uniform" => Ok(KernelType::Uniform),
            "epanechnikov" => Ok(KernelType::Epanechnikov),
            "quartic" => Ok(KernelType::Quartic),
            "gaussian" => Ok(KernelType::Gaussian),
            other => Err(Error::invalid_parameter(
                "kernel",
                other,
                "expected one of triangular, uniform, epanechnikov, quartic, gaussian",
            )),
        }
    }
}

impl KernelType {
    /// Evaluate the kernel at normalized distance `z` (clamped to [0, 1]).
    pub fn eval(&self, z: f64) -> f64 {
        let z = z.clamp(0.0, 1.0);
        match self {
            KernelType::Triangular => 1.0 - z,
            KernelType::Uniform => 0.5,
            KernelType::Epanechnikov => 0.75 * (1.0 - z * z),
            KernelType::Quartic => (15.0 / 16.0) * (1.0 - z * z) * (1.0 - z * z),
            KernelType::Gaussian => (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt(),
        }
    }
}

/// Options for fixed-bandwidth kernel weights.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelBandwidthParams {
    /// Include each observation as its own neighbor with weight kernel(0).
    pub use_kernel_diagonals: bool,
    pub is_arc: bool,
    pub is_mile: bool,
}

/// Options for adaptive (k-th neighbor) kernel weights.
#[derive(Debug, Clone, Copy)]
pub struct KernelKnnParams {
    /// Per-observation bandwidth (distance to own k-th neighbor) instead of
    /// the maximum k-th-neighbor distance over all observations.
    pub adaptive_bandwidth: bool,
    pub use_kernel_diagonals: bool,
    pub is_arc: bool,
    pub is_mile: bool,
}

impl Default for KernelKnnParams {
    fn default() -> Self {
        Self {
            adaptive_bandwidth: true,
            use_kernel_diagonals: false,
            is_arc: false,
            is_mile: true,
        }
    }
}

/// Fixed-bandwidth kernel weights over a distance band.
pub fn kernel_bandwidth_weights(
    geoms: &GeometrySet,
    bandwidth: f64,
    kernel: KernelType,
    params: &KernelBandwidthParams,
) -> Result<WeightsGraph> {
    geoms.ensure_non_empty()?;
    if !(bandwidth > 0.0) {
        return Err(Error::invalid_parameter(
            "bandwidth",
            bandwidth,
            "must be a positive distance",
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
            for nb in tree.others_within_radius(i, bandwidth) {
                neighbors[i].push(nb.index);
                weights[i].push(kernel.eval(nb.distance_sq.sqrt() / bandwidth));
            }
        }
    } else {
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let d = metric.distance(centroids[i], centroids[j]);
                if d <= bandwidth {
                    neighbors[i].push(j);
                    weights[i].push(kernel.eval(d / bandwidth));
                }
            }
        }
    }

    if params.use_kernel_diagonals {
        for i in 0..n {
            neighbors[i].push(i);
            weights[i].push(kernel.eval(0.0));
        }
    }

    Ok(WeightsGraph::from_parts(
        neighbors,
        Some(weights),
        WeightsKind::Kernel,
    ))
}

/// Adaptive-bandwidth kernel weights over each observation's k nearest
/// neighbors.
pub fn kernel_knn_weights(
    geoms: &GeometrySet,
    k: usize,
    kernel: KernelType,
    params: &KernelKnnParams,
) -> Result<WeightsGraph> {
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

    // Gather k-nearest lists with raw distances first.
    let mut knn: Vec<Vec<(usize, f64)>> = Vec::with_capacity(n);
    if metric.is_planar() {
        let tree = KdTree::build(&centroids);
        for i in 0..n {
            knn.push(
                tree.k_nearest_others(i, k)
                    .into_iter()
                    .map(|nb| (nb.index, nb.distance_sq.sqrt()))
                    .collect(),
            );
        }
    } else {
        for i in 0..n {
            let mut dists: Vec<(f64, usize)> = centroids
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(j, &p)| (metric.distance(centroids[i], p), j))
                .collect();
            dists.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
            knn.push(dists.into_iter().take(k).map(|(d, j)| (j, d)).collect());
        }
    }

    let max_kth = knn
        .iter()
        .filter_map(|l| l.last().map(|&(_, d)| d))
        .fold(0.0_f64, f64::max);

    let mut neighbors = vec![Vec::new(); n];
    let mut weights = vec![Vec::new(); n];
    for i in 0..n {
        let bw = if params.adaptive_bandwidth {
            knn[i].last().map(|&(_, d)| d).unwrap_or(0.0)
        } else {
            max_kth
        };
        for &(j, d) in &knn[i] {
            neighbors[i].push(j);
            weights[i].push(if bw > 0.0 { kernel.eval(d / bw) } else { 1.0 });
        }
        if params.use_kernel_diagonals {
            neighbors[i].push(i);
            weights[i].push(kernel.eval(0.0));
        }
    }

    Ok(WeightsGraph::from_parts(
        neighbors,
        Some(weights),
        WeightsKind::Kernel,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::unit_lattice;

    #[test]
    fn test_kernel_parse() {
        assert_eq!("quartic".parse::<KernelType>().unwrap(), KernelType::Quartic);
        assert!("box".parse::<KernelType>().is_err());
    }

    #[test]
    fn test_kernel_shapes() {
        assert!((KernelType::Triangular.eval(0.0) - 1.0).abs() < 1e-12);
        assert!(KernelType::Triangular.eval(1.0).abs() < 1e-12);
        assert!((KernelType::Epanechnikov.eval(0.0) - 0.75).abs() < 1e-12);
        assert!((KernelType::Uniform.eval(0.7) - 0.5).abs() < 1e-12);
        // Gaussian at 0 is the normal density peak.
        assert!((KernelType::Gaussian.eval(0.0) - 0.3989422804014327).abs() < 1e-12);
    }

    #[test]
    fn test_bandwidth_weights_decay() {
        let g = unit_lattice(1, 3);
        let w = kernel_bandwidth_weights(
            &g,
            2.5,
            KernelType::Triangular,
            &KernelBandwidthParams::default(),
        )
        .unwrap();
        // Cell 0: neighbor 1 at d=1, neighbor 2 at d=2; closer neighbor heavier.
        let wt = w.neighbor_weights(0).unwrap();
        assert_eq!(w.neighbors(0), &[1, 2]);
        assert!(wt[0] > wt[1]);
    }

    #[test]
    fn test_kernel_diagonal() {
        let g = unit_lattice(1, 3);
        let w = kernel_bandwidth_weights(
            &g,
            1.5,
            KernelType::Triangular,
            &KernelBandwidthParams {
                use_kernel_diagonals: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert!(w.is_neighbor(1, 1));
        // Self weight is kernel(0) = 1 for the triangular kernel.
        let pos = w.neighbors(1).iter().position(|&j| j == 1).unwrap();
        assert!((w.neighbor_weights(1).unwrap()[pos] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_adaptive_knn_counts() {
        let g = unit_lattice(4, 4);
        let w =
            kernel_knn_weights(&g, 5, KernelType::Gaussian, &KernelKnnParams::default()).unwrap();
        for i in 0..w.num_obs() {
            assert_eq!(w.neighbors(i).len(), 5);
        }
        assert_eq!(w.mean_neighbors(), 5.0);
    }

    #[test]
    fn test_bad_bandwidth() {
        let g = unit_lattice(2, 2);
        let r = kernel_bandwidth_weights(
            &g,
            0.0,
            KernelType::Uniform,
            &KernelBandwidthParams::default(),
        );
        assert!(r.is_err());
    }
}
