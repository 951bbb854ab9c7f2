//! Local Geary statistics (univariate and multivariate).
//!
//! The local Geary is a squared-difference statistic: small values mean an
//! observation resembles its neighbors. Cluster direction is therefore
//! judged against the permutation mean rather than against zero.

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use super::categories::{GEARY_COLORS, GEARY_LABELS, MULTIGEARY_COLORS, MULTIGEARY_LABELS};
use super::moran::standardize;
use super::permutation::{conditional_permutation, Tail};
use super::{LisaConfig, LisaResult};

const NOT_SIGNIFICANT: usize = 0;
const HIGH_HIGH: usize = 1;
const LOW_LOW: usize = 2;
const OTHER_POSITIVE: usize = 3;
const NEGATIVE: usize = 4;
const UNDEFINED: usize = 5;
const ISOLATED: usize = 6;

const MULTI_POSITIVE: usize = 1;
const MULTI_NEGATIVE: usize = 2;
const MULTI_UNDEFINED: usize = 3;
const MULTI_ISOLATED: usize = 4;

/// Univariate local Geary: `c_i = mean((z_i - z_j)²)` over i's defined
/// neighbors.
pub fn local_geary(
    w: &WeightsGraph,
    data: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data", data.len())?;
    let defined = data.defined_mask();
    let z = standardize(data.values(), &defined);

    let n = w.num_obs();
    let mut observed = vec![f64::NAN; n];
    let mut lags = vec![f64::NAN; n];
    let mut draw_sizes = vec![0usize; n];
    let mut num_neighbors = vec![0usize; n];

    for i in 0..n {
        let valid: Vec<usize> = w
            .neighbors(i)
            .iter()
            .copied()
            .filter(|&j| defined[j])
            .collect();
        num_neighbors[i] = valid.len();
        if !defined[i] || valid.is_empty() {
            continue;
        }
        observed[i] = sq_diff_mean(z[i], &z, &valid);
        lags[i] = valid.iter().map(|&j| z[j]).sum::<f64>() / valid.len() as f64;
        draw_sizes[i] = valid.len();
    }

    let outcome = conditional_permutation(w, cfg, &defined, &observed, &draw_sizes, Tail::Folded, |i, draw| {
        sq_diff_mean(z[i], &z, draw)
    });

    let clusters = (0..n)
        .map(|i| {
            if w.neighbors(i).is_empty() {
                ISOLATED
            } else if observed[i].is_nan() || outcome.pvalues[i].is_nan() {
                UNDEFINED
            } else if outcome.pvalues[i] > cfg.significance_cutoff {
                NOT_SIGNIFICANT
            } else if observed[i] < outcome.means[i] {
                // Smaller than expected squared difference: positive
                // association, subtyped by Moran quadrant.
                match (z[i] > 0.0, lags[i] > 0.0) {
                    (true, true) => HIGH_HIGH,
                    (false, false) => LOW_LOW,
                    _ => OTHER_POSITIVE,
                }
            } else {
                NEGATIVE
            }
        })
        .collect();

    Ok(LisaResult::new(
        observed,
        outcome.pvalues,
        clusters,
        num_neighbors,
        GEARY_LABELS,
        GEARY_COLORS,
        cfg.significance_cutoff,
    ))
}

/// Multivariate local Geary: the average of the per-variable statistics,
/// evaluated on one shared neighbor draw per permutation.
pub fn local_multigeary(
    w: &WeightsGraph,
    data: &[AttributeVector],
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    if data.is_empty() {
        return Err(Error::EmptyInput("multivariate variable list"));
    }
    for col in data {
        w.check_len("data", col.len())?;
    }

    let n = w.num_obs();
    // Jointly defined: every variable must be usable.
    let defined: Vec<bool> = (0..n)
        .map(|i| data.iter().all(|col| col.is_defined(i)))
        .collect();
    let z_cols: Vec<Vec<f64>> = data
        .iter()
        .map(|col| standardize(col.values(), &defined))
        .collect();

    let mut observed = vec![f64::NAN; n];
    let mut draw_sizes = vec![0usize; n];
    let mut num_neighbors = vec![0usize; n];

    let multi_stat = |i: usize, nbrs: &[usize]| {
        z_cols
            .iter()
            .map(|z| sq_diff_mean(z[i], z, nbrs))
            .sum::<f64>()
            / z_cols.len() as f64
    };

    for i in 0..n {
        let valid: Vec<usize> = w
            .neighbors(i)
            .iter()
            .copied()
            .filter(|&j| defined[j])
            .collect();
        num_neighbors[i] = valid.len();
        if !defined[i] || valid.is_empty() {
            continue;
        }
        observed[i] = multi_stat(i, &valid);
        draw_sizes[i] = valid.len();
    }

    let outcome =
        conditional_permutation(w, cfg, &defined, &observed, &draw_sizes, Tail::Folded, multi_stat);

    let clusters = (0..n)
        .map(|i| {
            if w.neighbors(i).is_empty() {
                MULTI_ISOLATED
            } else if observed[i].is_nan() || outcome.pvalues[i].is_nan() {
                MULTI_UNDEFINED
            } else if outcome.pvalues[i] > cfg.significance_cutoff {
                NOT_SIGNIFICANT
            } else if observed[i] < outcome.means[i] {
                MULTI_POSITIVE
            } else {
                MULTI_NEGATIVE
            }
        })
        .collect();

    Ok(LisaResult::new(
        observed,
        outcome.pvalues,
        clusters,
        num_neighbors,
        MULTIGEARY_LABELS,
        MULTIGEARY_COLORS,
        cfg.significance_cutoff,
    ))
}

fn sq_diff_mean(zi: f64, z: &[f64], nbrs: &[usize]) -> f64 {
    nbrs.iter()
        .map(|&j| (zi - z[j]) * (zi - z[j]))
        .sum::<f64>()
        / nbrs.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::geometry::unit_lattice;
    use esda_core::weights::{queen_weights, rook_weights};

    #[test]
    fn test_smooth_gradient_positive_association() {
        let w = queen_weights(&unit_lattice(5, 5), &Default::default()).unwrap();
        // Values increase smoothly along rows: neighbors are similar.
        let data = AttributeVector::new((0..25).map(|i| (i / 5) as f64).collect());
        let r = local_geary(&w, &data, &LisaConfig::default()).unwrap();
        assert!(r.values().iter().all(|v| v.is_finite()));
        // A corner of the gradient extreme should read as positive association.
        assert!(r.values()[0] >= 0.0);
        assert_eq!(r.labels()[4], "Negative");
    }

    #[test]
    fn test_checkerboard_negative_association() {
        let w = rook_weights(&unit_lattice(6, 6), &Default::default()).unwrap();
        let mut vals = Vec::with_capacity(36);
        for r in 0..6 {
            for c in 0..6 {
                vals.push(((r + c) % 2) as f64);
            }
        }
        let data = AttributeVector::new(vals);
        let r = local_geary(&w, &data, &LisaConfig::default()).unwrap();
        // Squared differences are maximal everywhere; significant cells are
        // categorized Negative.
        for (i, &c) in r.clusters().iter().enumerate() {
            if r.pvalues()[i] <= 0.05 {
                assert_eq!(c, 4, "cell {i}");
            }
        }
    }

    #[test]
    fn test_multigeary_combines_variables() {
        let w = queen_weights(&unit_lattice(4, 4), &Default::default()).unwrap();
        let a = AttributeVector::new((0..16).map(|i| i as f64).collect());
        let b = AttributeVector::new((0..16).map(|i| (i * i) as f64).collect());
        let cfg = LisaConfig {
            permutations: 199,
            ..Default::default()
        };
        let multi = local_multigeary(&w, &[a.clone(), b.clone()], &cfg).unwrap();
        let single = local_geary(&w, &a, &cfg).unwrap();
        assert_eq!(multi.len(), single.len());
        assert_eq!(multi.labels().len(), 5);
        // Both variables are smooth gradients: the combined statistic stays
        // below the permutation expectation where significant.
        assert!(multi.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_multigeary_empty_rejected() {
        let w = queen_weights(&unit_lattice(2, 2), &Default::default()).unwrap();
        assert!(local_multigeary(&w, &[], &LisaConfig::default()).is_err());
    }

    #[test]
    fn test_single_variable_multigeary_matches_geary_values() {
        let w = queen_weights(&unit_lattice(4, 4), &Default::default()).unwrap();
        let a = AttributeVector::new((0..16).map(|i| ((i * 13) % 7) as f64).collect());
        let cfg = LisaConfig {
            permutations: 99,
            ..Default::default()
        };
        let multi = local_multigeary(&w, &[a.clone()], &cfg).unwrap();
        let single = local_geary(&w, &a, &cfg).unwrap();
        for (m, s) in multi.values().iter().zip(single.values()) {
            assert!((m - s).abs() < 1e-12);
        }
        assert_eq!(multi.pvalues(), single.pvalues());
    }
}
