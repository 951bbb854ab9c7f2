//! Getis-Ord local G and G* hot/cold spot statistics.
//!
//! Both are ratios of the neighborhood sum to the overall sum; G excludes
//! the observation's own value, G* includes it. Hot (High) versus cold
//! (Low) is decided against the permutation mean.

use esda_core::{AttributeVector, Result, WeightsGraph};

use super::categories::{G_COLORS, G_LABELS};
use super::permutation::{conditional_permutation, Tail};
use super::{LisaConfig, LisaResult};

const NOT_SIGNIFICANT: usize = 0;
const HIGH: usize = 1;
const LOW: usize = 2;
const UNDEFINED: usize = 3;
const ISOLATED: usize = 4;

/// Local G: `Σ x_j over neighbors / Σ x_j over all j ≠ i`.
pub fn local_g(w: &WeightsGraph, data: &AttributeVector, cfg: &LisaConfig) -> Result<LisaResult> {
    getis_ord(w, data, cfg, false)
}

/// Local G*: `(x_i + Σ x_j over neighbors) / Σ x_j over all`.
pub fn local_gstar(
    w: &WeightsGraph,
    data: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    getis_ord(w, data, cfg, true)
}

fn getis_ord(
    w: &WeightsGraph,
    data: &AttributeVector,
    cfg: &LisaConfig,
    include_self: bool,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data", data.len())?;

    let defined = data.defined_mask();
    let x = data.values();
    let n = w.num_obs();

    let total: f64 = (0..n).filter(|&i| defined[i]).map(|i| x[i]).sum();

    let mut observed = vec![f64::NAN; n];
    let mut draw_sizes = vec![0usize; n];
    let mut num_neighbors = vec![0usize; n];
    // Per-observation denominator, fixed across permutations.
    let mut denom = vec![f64::NAN; n];

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
        let d = if include_self { total } else { total - x[i] };
        if d == 0.0 {
            continue;
        }
        denom[i] = d;
        let nbr_sum: f64 = valid.iter().map(|&j| x[j]).sum();
        observed[i] = if include_self {
            (x[i] + nbr_sum) / d
        } else {
            nbr_sum / d
        };
        draw_sizes[i] = valid.len();
    }

    let outcome = conditional_permutation(w, cfg, &defined, &observed, &draw_sizes, Tail::Folded, |i, draw| {
        let nbr_sum: f64 = draw.iter().map(|&j| x[j]).sum();
        if include_self {
            (x[i] + nbr_sum) / denom[i]
        } else {
            nbr_sum / denom[i]
        }
    });

    let clusters = (0..n)
        .map(|i| {
            if w.neighbors(i).is_empty() {
                ISOLATED
            } else if observed[i].is_nan() || outcome.pvalues[i].is_nan() {
                UNDEFINED
            } else if outcome.pvalues[i] > cfg.significance_cutoff {
                NOT_SIGNIFICANT
            } else if observed[i] > outcome.means[i] {
                HIGH
            } else {
                LOW
            }
        })
        .collect();

    Ok(LisaResult::new(
        observed,
        outcome.pvalues,
        clusters,
        num_neighbors,
        G_LABELS,
        G_COLORS,
        cfg.significance_cutoff,
    ))
}
