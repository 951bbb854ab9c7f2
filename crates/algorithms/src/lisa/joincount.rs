//! Local join count statistics for binary (0/1) variables.
//!
//! All three variants count event neighbors around event observations and
//! use the one-sided (greater) permutation rule: only an excess of joins is
//! meaningful.

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use super::categories::{JOINCOUNT_COLORS, JOINCOUNT_LABELS};
use super::permutation::{conditional_permutation, Tail};
use super::{LisaConfig, LisaResult};

const NOT_SIGNIFICANT: usize = 0;
const SIGNIFICANT: usize = 1;
const UNDEFINED: usize = 2;
const ISOLATED: usize = 3;

/// Univariate local join count: for each observation with `x_i = 1`, the
/// number of neighbors that are also 1. Observations with `x_i = 0` get no
/// p-value.
pub fn local_joincount(
    w: &WeightsGraph,
    data: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data", data.len())?;
    data.ensure_binary("data")?;

    let defined = data.defined_mask();
    let x = data.values();
    joincount_impl(w, cfg, &defined, x, x)
}

/// Bivariate local join count for two variables that never co-locate: for
/// each observation with `x_i = 1`, the number of neighbors with `z_j = 1`.
///
/// Any observation carrying 1 in both variables is rejected, since the
/// statistic assumes the two events are mutually exclusive in space.
pub fn local_bijoincount(
    w: &WeightsGraph,
    data1: &AttributeVector,
    data2: &AttributeVector,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data1", data1.len())?;
    w.check_len("data2", data2.len())?;
    data1.ensure_binary("data1")?;
    data2.ensure_binary("data2")?;

    for i in 0..data1.len() {
        if data1.is_defined(i)
            && data2.is_defined(i)
            && data1.value(i) == 1.0
            && data2.value(i) == 1.0
        {
            return Err(Error::invalid_parameter(
                "data2",
                i,
                "variables co-locate; use local_multijoincount for co-located events",
            ));
        }
    }

    let defined: Vec<bool> = (0..data1.len())
        .map(|i| data1.is_defined(i) && data2.is_defined(i))
        .collect();
    joincount_impl(w, cfg, &defined, data1.values(), data2.values())
}

/// Multivariate (co-location) local join count: for each observation where
/// every variable is 1, the number of neighbors where every variable is 1.
pub fn local_multijoincount(
    w: &WeightsGraph,
    data: &[AttributeVector],
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    if data.len() < 2 {
        return Err(Error::invalid_parameter(
            "data",
            data.len(),
            "co-location join count needs at least two variables",
        ));
    }
    for col in data {
        w.check_len("data", col.len())?;
        col.ensure_binary("data")?;
    }

    let n = w.num_obs();
    let defined: Vec<bool> = (0..n)
        .map(|i| data.iter().all(|col| col.is_defined(i)))
        .collect();
    // Co-location indicator: 1 where every variable is 1.
    let coloc: Vec<f64> = (0..n)
        .map(|i| {
            if defined[i] && data.iter().all(|col| col.value(i) == 1.0) {
                1.0
            } else {
                0.0
            }
        })
        .collect();

    if !coloc.iter().any(|&v| v == 1.0) {
        return Err(Error::invalid_parameter(
            "data",
            data.len(),
            if data.len() == 2 {
                "no observation co-locates; use local_bijoincount for exclusive events"
            } else {
                "no observation has all variables equal to 1"
            },
        ));
    }

    joincount_impl(w, cfg, &defined, &coloc, &coloc)
}

/// Shared core: `mark` selects which observations get a statistic (those
/// with value 1), `event` supplies the neighbor values being counted.
fn joincount_impl(
    w: &WeightsGraph,
    cfg: &LisaConfig,
    defined: &[bool],
    mark: &[f64],
    event: &[f64],
) -> Result<LisaResult> {
    let n = w.num_obs();
    let mut observed = vec![f64::NAN; n];
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
        if !defined[i] || valid.is_empty() || mark[i] != 1.0 {
            continue;
        }
        observed[i] = valid.iter().map(|&j| event[j]).sum();
        draw_sizes[i] = valid.len();
    }

    let outcome = conditional_permutation(w, cfg, defined, &observed, &draw_sizes, Tail::Greater, |_, draw| {
        draw.iter().map(|&j| event[j]).sum()
    });

    let clusters = (0..n)
        .map(|i| {
            if w.neighbors(i).is_empty() {
                ISOLATED
            } else if !defined[i] {
                UNDEFINED
            } else if observed[i].is_nan() {
                NOT_SIGNIFICANT
            } else if outcome.pvalues[i] <= cfg.significance_cutoff {
                SIGNIFICANT
            } else {
                NOT_SIGNIFICANT
            }
        })
        .collect();

    Ok(LisaResult::new(
        observed,
        outcome.pvalues,
        clusters,
        num_neighbors,
        JOINCOUNT_LABELS,
        JOINCOUNT_COLORS,
        cfg.significance_cutoff,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::geometry::unit_lattice;
    use esda_core::weights::queen_weights;

    fn lattice_weights(rows: usize, cols: usize) -> WeightsGraph {
        queen_weights(&unit_lattice(rows, cols), &Default::default()).unwrap()
    }

    #[test]
    fn test_event_block_detected() {
        let w = lattice_weights(6, 6);
        // A 2x2 block of events in one corner of a quiet lattice.
        let mut vals = vec![0.0; 36];
        for &i in &[0, 1, 6, 7] {
            vals[i] = 1.0;
        }
        let data = AttributeVector::new(vals);
        let r = local_joincount(&w, &data, &LisaConfig::default()).unwrap();
        // Corner cell: all 3 queen neighbors are events.
        assert_eq!(r.values()[0], 3.0);
        assert!(r.pvalues()[0] < 0.05);
        assert_eq!(r.clusters()[0], 1);
        // Non-event cells carry no statistic.
        assert!(r.values()[35].is_nan());
        assert!(r.pvalues()[35].is_nan());
        assert_eq!(r.clusters()[35], 0);
    }

    #[test]
    fn test_non_binary_rejected() {
        let w = lattice_weights(3, 3);
        let data = AttributeVector::new(vec![0.0, 1.0, 2.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        assert!(local_joincount(&w, &data, &LisaConfig::default()).is_err());
    }

    #[test]
    fn test_bivariate_rejects_colocation() {
        let w = lattice_weights(3, 3);
        let a = AttributeVector::new(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = AttributeVector::new(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        let err = local_bijoincount(&w, &a, &b, &LisaConfig::default()).unwrap_err();
        assert!(err.to_string().contains("co-locate"), "got {err}");
    }

    #[test]
    fn test_bivariate_counts_other_variable() {
        let w = lattice_weights(3, 3);
        // Center is an `a` event; all its neighbors are `b` events.
        let mut a = vec![0.0; 9];
        a[4] = 1.0;
        let mut b = vec![1.0; 9];
        b[4] = 0.0;
        let r = local_bijoincount(
            &w,
            &AttributeVector::new(a),
            &AttributeVector::new(b),
            &LisaConfig::default(),
        )
        .unwrap();
        assert_eq!(r.values()[4], 8.0);
        assert!(r.values()[0].is_nan());
    }

    #[test]
    fn test_multivariate_requires_colocation() {
        let w = lattice_weights(3, 3);
        let a = AttributeVector::new(vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let b = AttributeVector::new(vec![0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        let err = local_multijoincount(&w, &[a, b], &LisaConfig::default()).unwrap_err();
        assert!(err.to_string().contains("co-locates"), "got {err}");
    }

    #[test]
    fn test_multivariate_counts_colocated_neighbors() {
        let w = lattice_weights(3, 3);
        // Cells 0 and 1 carry both events.
        let mut a = vec![0.0; 9];
        let mut b = vec![0.0; 9];
        for &i in &[0, 1] {
            a[i] = 1.0;
            b[i] = 1.0;
        }
        // An extra a-only event elsewhere must not count.
        a[8] = 1.0;
        let r = local_multijoincount(
            &w,
            &[AttributeVector::new(a), AttributeVector::new(b)],
            &LisaConfig::default(),
        )
        .unwrap();
        assert_eq!(r.values()[0], 1.0);
        assert_eq!(r.values()[1], 1.0);
        assert!(r.values()[8].is_nan());
    }

    #[test]
    fn test_multivariate_needs_two_variables() {
        let w = lattice_weights(2, 2);
        let a = AttributeVector::new(vec![1.0; 4]);
        assert!(local_multijoincount(&w, &[a], &LisaConfig::default()).is_err());
    }
}
