//! Local indicators of spatial association (LISA).
//!
//! Every statistic in this family shares the same inferential machinery:
//! compute a local statistic per observation from its neighbor set, then
//! derive a pseudo-p-value by conditional permutation (`permutation`
//! module). The variants differ only in the statistic formula, the p-value
//! tail rule and the cluster-category scheme.

mod geary;
mod getisord;
mod joincount;
mod moran;
pub(crate) mod permutation;
mod quantile;

pub use geary::{local_geary, local_multigeary};
pub use getisord::{local_g, local_gstar};
pub use joincount::{local_bijoincount, local_joincount, local_multijoincount};
pub use moran::{
    batch_local_moran, local_bimoran, local_moran, local_moran_eb, BatchLisaResult,
};
pub use quantile::{local_multiquantilelisa, local_quantilelisa};

use esda_core::{Error, Result};

/// Default seed, matching the GeoDa software constant.
pub const DEFAULT_SEED: u64 = 123_456_789;

/// Largest accepted permutation count.
pub const MAX_PERMUTATIONS: usize = 999_999;

/// Per-call configuration shared by every LISA statistic.
///
/// There is no ambient/global configuration: defaults are resolved here,
/// once, when the struct is built.
#[derive(Debug, Clone)]
pub struct LisaConfig {
    /// Number of conditional permutations (default 999).
    pub permutations: usize,
    /// Cutoff applied to pseudo-p-values for cluster categories (default 0.05).
    pub significance_cutoff: f64,
    /// Worker threads for the permutation loop (default: host core count).
    pub cpu_threads: usize,
    /// Seed for the deterministic permutation streams.
    pub seed: u64,
}

impl Default for LisaConfig {
    fn default() -> Self {
        Self {
            permutations: 999,
            significance_cutoff: 0.05,
            cpu_threads: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            seed: DEFAULT_SEED,
        }
    }
}

impl LisaConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.permutations == 0 || self.permutations > MAX_PERMUTATIONS {
            return Err(Error::invalid_parameter(
                "permutations",
                self.permutations,
                format!("must be in 1..={MAX_PERMUTATIONS}"),
            ));
        }
        if !(self.significance_cutoff > 0.0 && self.significance_cutoff < 1.0) {
            return Err(Error::invalid_parameter(
                "significance_cutoff",
                self.significance_cutoff,
                "must be in (0, 1)",
            ));
        }
        if self.cpu_threads == 0 {
            return Err(Error::invalid_parameter(
                "cpu_threads",
                self.cpu_threads,
                "must be >= 1",
            ));
        }
        Ok(())
    }
}

/// The result of one LISA run: per-observation statistic values,
/// pseudo-p-values, cluster categories and valid-neighbor counts, plus the
/// statistic's fixed category labels and display colors.
///
/// Undefined observations (masked input, isolates, all neighbors undefined)
/// carry NaN for both statistic and p-value; a pseudo-p is never negative.
#[derive(Debug, Clone)]
pub struct LisaResult {
    values: Vec<f64>,
    pvalues: Vec<f64>,
    clusters: Vec<usize>,
    num_neighbors: Vec<usize>,
    labels: &'static [&'static str],
    colors: &'static [&'static str],
    significance_cutoff: f64,
}

impl LisaResult {
    pub(crate) fn new(
        values: Vec<f64>,
        pvalues: Vec<f64>,
        clusters: Vec<usize>,
        num_neighbors: Vec<usize>,
        labels: &'static [&'static str],
        colors: &'static [&'static str],
        significance_cutoff: f64,
    ) -> Self {
        debug_assert!(pvalues.iter().all(|p| p.is_nan() || (*p > 0.0 && *p <= 1.0)));
        Self {
            values,
            pvalues,
            clusters,
            num_neighbors,
            labels,
            colors,
            significance_cutoff,
        }
    }

    /// Number of observations.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Local statistic values (NaN where undefined).
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Pseudo-p-values (NaN where undefined).
    pub fn pvalues(&self) -> &[f64] {
        &self.pvalues
    }

    /// Cluster-indicator categories; indices into [`labels`](Self::labels).
    pub fn clusters(&self) -> &[usize] {
        &self.clusters
    }

    /// Count of valid neighbors used per observation.
    pub fn num_neighbors(&self) -> &[usize] {
        &self.num_neighbors
    }

    /// Category labels for this statistic.
    pub fn labels(&self) -> &'static [&'static str] {
        self.labels
    }

    /// Display colors parallel to [`labels`](Self::labels).
    pub fn colors(&self) -> &'static [&'static str] {
        self.colors
    }

    /// Cutoff used for the cluster categories.
    pub fn significance_cutoff(&self) -> f64 {
        self.significance_cutoff
    }

    /// False-Discovery-Rate adjustment of a significance threshold.
    ///
    /// Sorts the defined p-values ascending and returns the largest
    /// Benjamini-Hochberg bound `(i/m)·alpha` met by the i-th smallest
    /// p-value (m = number of defined p-values), or 0.0 when none is met.
    pub fn fdr(&self, alpha: f64) -> f64 {
        let mut pvals: Vec<f64> = self.pvalues.iter().copied().filter(|p| !p.is_nan()).collect();
        if pvals.is_empty() {
            return 0.0;
        }
        pvals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let m = pvals.len() as f64;
        let mut bound = 0.0;
        for (i, p) in pvals.iter().enumerate() {
            let b = (i + 1) as f64 * alpha / m;
            if *p <= b {
                bound = b;
            }
        }
        bound
    }

    /// Bonferroni bound: `alpha / m` over the defined p-values.
    pub fn bonferroni(&self, alpha: f64) -> f64 {
        let m = self.pvalues.iter().filter(|p| !p.is_nan()).count();
        if m == 0 {
            0.0
        } else {
            alpha / m as f64
        }
    }
}

/// Fixed category enumerations per statistic type.
pub(crate) mod categories {
    pub const MORAN_LABELS: &[&str] = &[
        "Not significant",
        "High-High",
        "Low-Low",
        "Low-High",
        "High-Low",
        "Undefined",
        "Isolated",
    ];
    pub const MORAN_COLORS: &[&str] = &[
        "#eeeeee", "#FF0000", "#0000FF", "#a7adf9", "#f4ada8", "#464646", "#999999",
    ];

    pub const GEARY_LABELS: &[&str] = &[
        "Not significant",
        "High-High",
        "Low-Low",
        "Other Positive",
        "Negative",
        "Undefined",
        "Isolated",
    ];
    pub const GEARY_COLORS: &[&str] = &[
        "#eeeeee", "#b2182b", "#ef8a62", "#fddbc7", "#67adc7", "#464646", "#999999",
    ];

    pub const MULTIGEARY_LABELS: &[&str] = &[
        "Not significant",
        "Positive",
        "Negative",
        "Undefined",
        "Isolated",
    ];
    pub const MULTIGEARY_COLORS: &[&str] =
        &["#eeeeee", "#51b364", "#8c510a", "#464646", "#999999"];

    pub const JOINCOUNT_LABELS: &[&str] =
        &["Not significant", "Significant", "Undefined", "Isolated"];
    pub const JOINCOUNT_COLORS: &[&str] = &["#eeeeee", "#348124", "#464646", "#999999"];

    pub const G_LABELS: &[&str] = &["Not significant", "High", "Low", "Undefined", "Isolated"];
    pub const G_COLORS: &[&str] = &["#eeeeee", "#FF0000", "#0000FF", "#464646", "#999999"];
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_with_pvalues(pvalues: Vec<f64>) -> LisaResult {
        let n = pvalues.len();
        LisaResult::new(
            vec![0.0; n],
            pvalues,
            vec![0; n],
            vec![1; n],
            categories::MORAN_LABELS,
            categories::MORAN_COLORS,
            0.05,
        )
    }

    #[test]
    fn test_config_validation() {
        assert!(LisaConfig::default().validate().is_ok());
        let bad = LisaConfig {
            permutations: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = LisaConfig {
            permutations: MAX_PERMUTATIONS + 1,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
        let bad = LisaConfig {
            significance_cutoff: 1.5,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_fdr_monotone_bound() {
        let r = result_with_pvalues(vec![0.001, 0.002, 0.2, 0.4, 0.9]);
        let fdr = r.fdr(0.05);
        // p_(2) = 0.002 <= 2/5 * 0.05 = 0.02, p_(3) = 0.2 > 0.03.
        assert!((fdr - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_fdr_ignores_undefined() {
        let r = result_with_pvalues(vec![f64::NAN, 0.001, f64::NAN, 0.5]);
        // m = 2 defined p-values; p_(1) = 0.001 <= 0.025.
        assert!((r.fdr(0.05) - 0.025).abs() < 1e-12);
        assert!((r.bonferroni(0.05) - 0.025).abs() < 1e-12);
    }

    #[test]
    fn test_fdr_none_met() {
        let r = result_with_pvalues(vec![0.5, 0.6, 0.7]);
        assert_eq!(r.fdr(0.05), 0.0);
    }
}
