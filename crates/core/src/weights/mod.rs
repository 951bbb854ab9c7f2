//! Spatial weights graphs.
//!
//! A weights graph records, for each observation `0..n-1`, an ordered list of
//! neighbor indices and (for non-binary variants) a parallel weight per
//! neighbor. Graphs are built once by a constructor in this module tree
//! (contiguity, distance band, kNN, kernel, or file load), are immutable
//! afterwards, and are shared read-only by every statistic computation.

mod contiguity;
mod distance;
mod io;
mod kernel;

pub use contiguity::{queen_weights, rook_weights, ContiguityParams};
pub use distance::{
    distance_weights, knn_weights, min_threshold, DistanceBandParams, KnnParams,
};
pub use io::{read_gal, read_gal_records, read_gwt, read_gwt_records};
pub use kernel::{
    kernel_bandwidth_weights, kernel_knn_weights, KernelBandwidthParams, KernelKnnParams,
    KernelType,
};

use std::fmt;

use crate::{Error, Result};

/// How a weights graph was constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightsKind {
    Contiguity,
    DistanceBand,
    Knn,
    Kernel,
    File,
}

/// An immutable spatial weights graph over `n` observations.
///
/// Summary statistics are computed eagerly at construction, O(n + edges),
/// since they are queried frequently afterwards.
#[derive(Debug, Clone)]
pub struct WeightsGraph {
    neighbors: Vec<Vec<usize>>,
    /// Parallel per-neighbor weights; `None` for binary graphs.
    weights: Option<Vec<Vec<f64>>>,
    kind: WeightsKind,
    symmetric: bool,
    sparsity: f64,
    min_nbrs: usize,
    max_nbrs: usize,
    mean_nbrs: f64,
    median_nbrs: f64,
    has_isolates: bool,
}

impl WeightsGraph {
    /// Assemble a graph from neighbor lists, sorting and deduplicating each
    /// list and caching the summary statistics.
    pub(crate) fn from_parts(
        mut neighbors: Vec<Vec<usize>>,
        weights: Option<Vec<Vec<f64>>>,
        kind: WeightsKind,
    ) -> Self {
        let n = neighbors.len();

        let mut weights = weights;
        if let Some(w) = &mut weights {
            debug_assert_eq!(w.len(), n);
            // Keep weights aligned while sorting neighbor ids.
            for i in 0..n {
                let mut paired: Vec<(usize, f64)> =
                    neighbors[i].iter().copied().zip(w[i].iter().copied()).collect();
                paired.sort_by_key(|&(j, _)| j);
                paired.dedup_by_key(|&mut (j, _)| j);
                neighbors[i] = paired.iter().map(|&(j, _)| j).collect();
                w[i] = paired.iter().map(|&(_, v)| v).collect();
            }
        } else {
            for list in &mut neighbors {
                list.sort_unstable();
                list.dedup();
            }
        }

        let mut counts: Vec<usize> = neighbors.iter().map(|l| l.len()).collect();
        let edges: usize = counts.iter().sum();
        let min_nbrs = counts.iter().copied().min().unwrap_or(0);
        let max_nbrs = counts.iter().copied().max().unwrap_or(0);
        let mean_nbrs = if n > 0 { edges as f64 / n as f64 } else { 0.0 };
        counts.sort_unstable();
        let median_nbrs = if n == 0 {
            0.0
        } else if n % 2 == 1 {
            counts[n / 2] as f64
        } else {
            (counts[n / 2 - 1] + counts[n / 2]) as f64 / 2.0
        };
        let sparsity = if n > 0 {
            edges as f64 / (n as f64 * n as f64)
        } else {
            0.0
        };
        let has_isolates = min_nbrs == 0 && n > 0;

        // Sorted lists make the symmetry scan a binary search per edge.
        let symmetric = neighbors.iter().enumerate().all(|(i, list)| {
            list.iter().all(|&j| neighbors[j].binary_search(&i).is_ok())
        });

        Self {
            neighbors,
            weights,
            kind,
            symmetric,
            sparsity,
            min_nbrs,
            max_nbrs,
            mean_nbrs,
            median_nbrs,
            has_isolates,
        }
    }

    /// Number of observations.
    pub fn num_obs(&self) -> usize {
        self.neighbors.len()
    }

    /// Neighbor indices of observation `i`, ascending.
    pub fn neighbors(&self, i: usize) -> &[usize] {
        &self.neighbors[i]
    }

    /// Per-neighbor weights of observation `i`, parallel to
    /// [`neighbors`](Self::neighbors); `None` for binary graphs.
    pub fn neighbor_weights(&self, i: usize) -> Option<&[f64]> {
        self.weights.as_ref().map(|w| w[i].as_slice())
    }

    /// Whether `j` is a neighbor of `i`.
    pub fn is_neighbor(&self, i: usize, j: usize) -> bool {
        self.neighbors[i].binary_search(&j).is_ok()
    }

    pub fn kind(&self) -> WeightsKind {
        self.kind
    }

    /// `j ∈ neighbors(i) ⟺ i ∈ neighbors(j)` for all pairs.
    pub fn is_symmetric(&self) -> bool {
        self.symmetric
    }

    /// Σ|neighbors| / n².
    pub fn sparsity(&self) -> f64 {
        self.sparsity
    }

    pub fn min_neighbors(&self) -> usize {
        self.min_nbrs
    }

    pub fn max_neighbors(&self) -> usize {
        self.max_nbrs
    }

    pub fn mean_neighbors(&self) -> f64 {
        self.mean_nbrs
    }

    pub fn median_neighbors(&self) -> f64 {
        self.median_nbrs
    }

    /// Whether any observation has zero neighbors.
    pub fn has_isolates(&self) -> bool {
        self.has_isolates
    }

    /// Fail unless `values` matches the observation count.
    pub fn check_len(&self, what: &'static str, len: usize) -> Result<()> {
        if len != self.num_obs() {
            return Err(Error::SizeMismatch {
                what,
                expected: self.num_obs(),
                actual: len,
            });
        }
        Ok(())
    }

    /// Row-standardized spatial lag of `values`: the weighted neighbor
    /// average using the stored per-neighbor weights, or the plain neighbor
    /// mean for binary graphs (NaN for isolates).
    pub fn spatial_lag(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.check_len("values", values.len())?;
        Ok((0..self.num_obs())
            .map(|i| {
                let nbrs = &self.neighbors[i];
                if nbrs.is_empty() {
                    return f64::NAN;
                }
                match &self.weights {
                    Some(w) => {
                        let total: f64 = w[i].iter().sum();
                        if total == 0.0 {
                            f64::NAN
                        } else {
                            nbrs.iter()
                                .zip(&w[i])
                                .map(|(&j, &wij)| wij * values[j])
                                .sum::<f64>()
                                / total
                        }
                    }
                    None => nbrs.iter().map(|&j| values[j]).sum::<f64>() / nbrs.len() as f64,
                }
            })
            .collect())
    }
}

impl fmt::Display for WeightsGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Weights Meta-data:")?;
        writeln!(f, "{:>24} {:>20}", "number of observations:", self.num_obs())?;
        writeln!(f, "{:>24} {:>20}", "is symmetric:", self.symmetric)?;
        writeln!(f, "{:>24} {:>20}", "sparsity:", self.sparsity)?;
        writeln!(f, "{:>24} {:>20}", "# min neighbors:", self.min_nbrs)?;
        writeln!(f, "{:>24} {:>20}", "# max neighbors:", self.max_nbrs)?;
        writeln!(f, "{:>24} {:>20}", "# mean neighbors:", self.mean_nbrs)?;
        writeln!(f, "{:>24} {:>20}", "# median neighbors:", self.median_nbrs)?;
        writeln!(f, "{:>24} {:>20}", "has isolates:", self.has_isolates)
    }
}
