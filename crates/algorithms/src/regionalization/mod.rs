//! Spatially constrained regionalization.
//!
//! All algorithms share one contract: a weights graph supplies the
//! contiguity constraint, attribute columns are scaled and stacked into an
//! observations × variables matrix, and the result assigns every
//! observation a cluster id in `0..k-1` together with the sum-of-squares
//! decomposition of the partition.

mod azp;
mod linkage;
mod maxp;
mod redcap;
mod schc;
mod skater;
pub(crate) mod tree;

pub use azp::{azp_greedy, azp_sa, azp_tabu, AzpParams};
pub use linkage::Linkage;
pub use maxp::{maxp_greedy, maxp_sa, maxp_tabu, MaxpParams};
pub use redcap::{redcap, RedcapMethod};
pub use schc::schc;
pub use skater::skater;

use ndarray::Array2;

use esda_core::{AttributeVector, DistanceMetric, Error, Result, ScaleMethod};

/// Shared knobs for every regionalization call.
#[derive(Debug, Clone)]
pub struct RegionalizationConfig {
    /// Per-variable transform applied before distances (default standardize).
    pub scale_method: ScaleMethod,
    /// Attribute-space metric (default euclidean).
    pub distance_metric: DistanceMetric,
    /// Seed for every stochastic choice (default 123456789).
    pub random_seed: u64,
    /// Worker threads where an algorithm re-runs constructions in parallel.
    pub cpu_threads: usize,
}

impl Default for RegionalizationConfig {
    fn default() -> Self {
        Self {
            scale_method: ScaleMethod::default(),
            distance_metric: DistanceMetric::default(),
            random_seed: crate::lisa::DEFAULT_SEED,
            cpu_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// A minimum-bound constraint: each region's summed bound values must reach
/// `min_bound`.
#[derive(Debug, Clone)]
pub struct MinBound {
    pub values: Vec<f64>,
    pub min_bound: f64,
}

impl MinBound {
    pub fn new(values: Vec<f64>, min_bound: f64) -> Self {
        Self { values, min_bound }
    }

    pub(crate) fn validate(&self, n: usize) -> Result<()> {
        if self.values.len() != n {
            return Err(Error::SizeMismatch {
                what: "bound variable",
                expected: n,
                actual: self.values.len(),
            });
        }
        if !(self.min_bound > 0.0) {
            return Err(Error::invalid_parameter(
                "min_bound",
                self.min_bound,
                "must be positive",
            ));
        }
        if self.values.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(Error::invalid_parameter(
                "bound_variable",
                "non-finite or negative entry",
                "bound values must be finite and non-negative",
            ));
        }
        Ok(())
    }

    pub(crate) fn sum(&self, members: impl IntoIterator<Item = usize>) -> f64 {
        members.into_iter().map(|i| self.values[i]).sum()
    }

    pub(crate) fn satisfied(&self, total: f64) -> bool {
        total >= self.min_bound
    }
}

/// A hard partition of the observations plus its SS decomposition.
#[derive(Debug, Clone)]
pub struct ClusteringResult {
    clusters: Vec<usize>,
    total_ss: f64,
    within_ss: Vec<f64>,
    between_ss: f64,
    ratio: f64,
}

impl ClusteringResult {
    pub(crate) fn evaluate(clusters: Vec<usize>, matrix: &Array2<f64>) -> Self {
        let k = clusters.iter().copied().max().map_or(0, |m| m + 1);
        let total = total_ss(matrix);
        let within = within_ss(&clusters, matrix, k);
        let within_total: f64 = within.iter().sum();
        let between = total - within_total;
        let ratio = if total > 0.0 { between / total } else { 0.0 };
        Self {
            clusters,
            total_ss: total,
            within_ss: within,
            between_ss: between,
            ratio,
        }
    }

    /// Cluster id per observation, `0..k-1`.
    pub fn clusters(&self) -> &[usize] {
        &self.clusters
    }

    pub fn num_clusters(&self) -> usize {
        self.within_ss.len()
    }

    pub fn total_ss(&self) -> f64 {
        self.total_ss
    }

    /// Within-cluster sum of squares, one entry per cluster.
    pub fn within_ss(&self) -> &[f64] {
        &self.within_ss
    }

    pub fn between_ss(&self) -> f64 {
        self.between_ss
    }

    /// Between-to-total SS ratio: the usual quality-of-partition score.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

/// Total sum of squared deviations from the column means.
pub fn total_ss(matrix: &Array2<f64>) -> f64 {
    let n = matrix.nrows();
    if n == 0 {
        return 0.0;
    }
    let mut ss = 0.0;
    for col in matrix.columns() {
        let mean = col.sum() / n as f64;
        ss += col.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    }
    ss
}

/// Per-cluster within sum of squares.
pub fn within_ss(clusters: &[usize], matrix: &Array2<f64>, k: usize) -> Vec<f64> {
    let v = matrix.ncols();
    let mut counts = vec![0usize; k];
    let mut sums = vec![vec![0.0; v]; k];
    for (i, &c) in clusters.iter().enumerate() {
        counts[c] += 1;
        for j in 0..v {
            sums[c][j] += matrix[(i, j)];
        }
    }
    let mut ss = vec![0.0; k];
    for (i, &c) in clusters.iter().enumerate() {
        for j in 0..v {
            let mean = sums[c][j] / counts[c] as f64;
            let d = matrix[(i, j)] - mean;
            ss[c] += d * d;
        }
    }
    ss
}

/// Between-cluster sum of squares (total minus within).
pub fn between_ss(clusters: &[usize], matrix: &Array2<f64>, k: usize) -> f64 {
    total_ss(matrix) - within_ss(clusters, matrix, k).iter().sum::<f64>()
}

/// Sum of squared deviations of one member set around its own means.
pub(crate) fn subset_ss(members: &[usize], matrix: &Array2<f64>) -> f64 {
    if members.is_empty() {
        return 0.0;
    }
    let v = matrix.ncols();
    let mut ss = 0.0;
    for j in 0..v {
        let mean: f64 =
            members.iter().map(|&i| matrix[(i, j)]).sum::<f64>() / members.len() as f64;
        ss += members
            .iter()
            .map(|&i| {
                let d = matrix[(i, j)] - mean;
                d * d
            })
            .sum::<f64>();
    }
    ss
}

/// Stack attribute columns into an n × v matrix, applying the scale method
/// per column. Clustering needs complete data: undefined entries are
/// rejected.
pub(crate) fn build_matrix(
    data: &[AttributeVector],
    scale: ScaleMethod,
) -> Result<Array2<f64>> {
    if data.is_empty() {
        return Err(Error::EmptyInput("clustering variable list"));
    }
    let n = data[0].len();
    if n == 0 {
        return Err(Error::EmptyInput("clustering variables"));
    }
    let mut matrix = Array2::zeros((n, data.len()));
    for (j, col) in data.iter().enumerate() {
        if col.len() != n {
            return Err(Error::SizeMismatch {
                what: "clustering variable",
                expected: n,
                actual: col.len(),
            });
        }
        for i in 0..n {
            if !col.is_defined(i) {
                return Err(Error::invalid_parameter(
                    "data",
                    i,
                    "clustering requires fully defined variables",
                ));
            }
        }
        let mut column = col.values().to_vec();
        scale.apply(&mut column);
        for (i, v) in column.into_iter().enumerate() {
            matrix[(i, j)] = v;
        }
    }
    Ok(matrix)
}

/// Common validation for algorithms that take a target cluster count.
pub(crate) fn check_k(k: usize, n: usize) -> Result<()> {
    if k == 0 || k > n {
        return Err(Error::invalid_parameter(
            "k",
            k,
            format!("cluster count must be in 1..={n}"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_ss_decomposition() {
        let matrix = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let clusters = vec![0, 0, 0, 1, 1, 1];
        let r = ClusteringResult::evaluate(clusters.clone(), &matrix);
        let within: f64 = r.within_ss().iter().sum();
        assert!((within + r.between_ss() - r.total_ss()).abs() < 1e-9);
        // Tight clusters far apart: most variance is between.
        assert!(r.ratio() > 0.9);
        assert_eq!(r.num_clusters(), 2);
        assert!((between_ss(&clusters, &matrix, 2) - r.between_ss()).abs() < 1e-12);
    }

    #[test]
    fn test_build_matrix_rejects_undefined() {
        let col = AttributeVector::new(vec![1.0, f64::NAN, 3.0]);
        assert!(build_matrix(&[col], ScaleMethod::Raw).is_err());
    }

    #[test]
    fn test_build_matrix_scales_columns() {
        let col = AttributeVector::new(vec![2.0, 4.0, 6.0]);
        let m = build_matrix(&[col], ScaleMethod::Standardize).unwrap();
        let mean = m.column(0).sum() / 3.0;
        assert!(mean.abs() < 1e-12);
    }

    #[test]
    fn test_min_bound_validation() {
        assert!(MinBound::new(vec![1.0; 3], 2.0).validate(3).is_ok());
        assert!(MinBound::new(vec![1.0; 2], 2.0).validate(3).is_err());
        assert!(MinBound::new(vec![1.0; 3], 0.0).validate(3).is_err());
        assert!(MinBound::new(vec![1.0, -1.0, 1.0], 2.0).validate(3).is_err());
    }

    #[test]
    fn test_subset_ss_matches_within() {
        let matrix = array![[1.0, 0.0], [2.0, 1.0], [4.0, -1.0], [8.0, 2.0]];
        let clusters = vec![0, 0, 1, 1];
        let within = within_ss(&clusters, &matrix, 2);
        assert!((subset_ss(&[0, 1], &matrix) - within[0]).abs() < 1e-12);
        assert!((subset_ss(&[2, 3], &matrix) - within[1]).abs() < 1e-12);
    }
}
