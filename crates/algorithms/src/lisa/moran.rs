//! Local Moran statistics: univariate, bivariate, Empirical-Bayes rate
//! smoothed, and batch over several variables.

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use super::categories::{MORAN_COLORS, MORAN_LABELS};
use super::permutation::{conditional_permutation, Tail};
use super::{LisaConfig, LisaResult};

const NOT_SIGNIFICANT: usize = 0;
const HIGH_HIGH: usize = 1;
const LOW_LOW: usize = 2;
const LOW_HIGH: usize = 3;
const HIGH_LOW: usize = 4;
const UNDEFINED: usize = 5;
const ISOLATED: usize = 6;

/// Univariate local Moran: `I_i = z_i · mean(z_j)` over i's defined
/// neighbors, with z the standardized variable.
pub fn local_moran(
    w: &WeightsGraph,
    data: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data", data.len())?;
    let defined = data.defined_mask();
    let z = standardize(data.values(), &defined);
    moran_impl(w, &z, &z, &defined, cfg)
}

/// Bivariate local Moran: `z1_i · mean(z2_j)` over i's neighbors. The
/// permutation redraws the second variable's neighbor values.
pub fn local_bimoran(
    w: &WeightsGraph,
    data1: &AttributeVector,
    data2: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data1", data1.len())?;
    w.check_len("data2", data2.len())?;
    let defined: Vec<bool> = (0..data1.len())
        .map(|i| data1.is_defined(i) && data2.is_defined(i))
        .collect();
    let z1 = standardize(data1.values(), &defined);
    let z2 = standardize(data2.values(), &defined);
    moran_impl(w, &z1, &z2, &defined, cfg)
}

/// Local Moran on Empirical-Bayes smoothed rates (Assunção-Reis).
///
/// Raw rates `event/base` are shrunk toward the overall rate in proportion
/// to the instability of each base population, then analyzed like any other
/// variable.
pub fn local_moran_eb(
    w: &WeightsGraph,
    event: &AttributeVector,
    base: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("event", event.len())?;
    w.check_len("base", base.len())?;

    let n = event.len();
    let defined: Vec<bool> = (0..n)
        .map(|i| event.is_defined(i) && base.is_defined(i) && base.value(i) > 0.0)
        .collect();
    let m = defined.iter().filter(|&&d| d).count();
    if m == 0 {
        return Err(Error::EmptyInput("no observation has a positive base value"));
    }

    let mut sum_e = 0.0;
    let mut sum_b = 0.0;
    for i in 0..n {
        if defined[i] {
            sum_e += event.value(i);
            sum_b += base.value(i);
        }
    }
    if sum_b <= 0.0 {
        return Err(Error::EmptyInput("total base population is zero"));
    }
    let b_hat = sum_e / sum_b;
    let mean_b = sum_b / m as f64;

    let mut s2 = 0.0;
    for i in 0..n {
        if defined[i] {
            let r = event.value(i) / base.value(i);
            s2 += base.value(i) * (r - b_hat) * (r - b_hat);
        }
    }
    s2 /= sum_b;
    let a = (s2 - b_hat / mean_b).max(0.0);

    let eb: Vec<f64> = (0..n)
        .map(|i| {
            if defined[i] {
                let r = event.value(i) / base.value(i);
                (r - b_hat) / (a + b_hat / base.value(i)).sqrt()
            } else {
                f64::NAN
            }
        })
        .collect();

    let z = standardize(&eb, &defined);
    moran_impl(w, &z, &z, &defined, cfg)
}

/// A batch of per-variable LISA results sharing one weights graph and one
/// configuration.
#[derive(Debug, Clone)]
pub struct BatchLisaResult {
    results: Vec<LisaResult>,
}

impl BatchLisaResult {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Result for the `v`-th input variable.
    pub fn get(&self, v: usize) -> &LisaResult {
        &self.results[v]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LisaResult> {
        self.results.iter()
    }
}

/// Univariate local Moran over several variables at once.
///
/// Permutation draws are keyed by (seed, observation) only, so every
/// variable sees the same neighbor redraws and results match running
/// [`local_moran`] per variable.
pub fn batch_local_moran(
    w: &WeightsGraph,
    data: &[AttributeVector],
    cfg: &LisaConfig,
) -> Result<BatchLisaResult> {
    if data.is_empty() {
        return Err(Error::EmptyInput("batch variable list"));
    }
    let results = data
        .iter()
        .map(|col| local_moran(w, col, cfg))
        .collect::<Result<Vec<_>>>()?;
    Ok(BatchLisaResult { results })
}

/// Shared machinery: `z_self` supplies i's own value, `z_lag` the neighbor
/// values (identical for the univariate case).
fn moran_impl(
    w: &WeightsGraph,
    z_self: &[f64],
    z_lag: &[f64],
    defined: &[bool],
    cfg: &LisaConfig,
) -> Result<LisaResult> {
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
        let lag = valid.iter().map(|&j| z_lag[j]).sum::<f64>() / valid.len() as f64;
        lags[i] = lag;
        observed[i] = z_self[i] * lag;
        draw_sizes[i] = valid.len();
    }

    let outcome = conditional_permutation(w, cfg, defined, &observed, &draw_sizes, Tail::Folded, |i, draw| {
        z_self[i] * draw.iter().map(|&j| z_lag[j]).sum::<f64>() / draw.len() as f64
    });

    let clusters = (0..n)
        .map(|i| {
            if w.neighbors(i).is_empty() {
                ISOLATED
            } else if observed[i].is_nan() || outcome.pvalues[i].is_nan() {
                UNDEFINED
            } else if outcome.pvalues[i] > cfg.significance_cutoff {
                NOT_SIGNIFICANT
            } else {
                match (z_self[i] > 0.0, lags[i] > 0.0) {
                    (true, true) => HIGH_HIGH,
                    (false, false) => LOW_LOW,
                    (false, true) => LOW_HIGH,
                    (true, false) => HIGH_LOW,
                }
            }
        })
        .collect();

    Ok(LisaResult::new(
        observed,
        outcome.pvalues,
        clusters,
        num_neighbors,
        MORAN_LABELS,
        MORAN_COLORS,
        cfg.significance_cutoff,
    ))
}

/// Standardize to zero mean / unit sample variance over defined entries;
/// undefined entries become NaN.
pub(crate) fn standardize(values: &[f64], defined: &[bool]) -> Vec<f64> {
    let kept: Vec<f64> = values
        .iter()
        .zip(defined)
        .filter_map(|(v, &d)| d.then_some(*v))
        .collect();
    if kept.is_empty() {
        return vec![f64::NAN; values.len()];
    }
    let m = kept.iter().sum::<f64>() / kept.len() as f64;
    let sd = if kept.len() > 1 {
        (kept.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (kept.len() - 1) as f64).sqrt()
    } else {
        0.0
    };
    values
        .iter()
        .zip(defined)
        .map(|(v, &d)| {
            if !d {
                f64::NAN
            } else if sd > 0.0 {
                (v - m) / sd
            } else {
                0.0
            }
        })
        .collect()
}
