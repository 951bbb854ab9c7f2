//! Quantile LISA: recode a continuous variable into membership of one
//! quantile bin, then run a local join count on the indicator.

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use super::joincount::{local_joincount, local_multijoincount};
use super::{LisaConfig, LisaResult};

/// Univariate quantile LISA. `k` is the number of quantile bins, `quantile`
/// selects the bin of interest (1-based, `1..=k`).
pub fn local_quantilelisa(
    w: &WeightsGraph,
    data: &AttributeVector,
    k: usize,
    quantile: usize,
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    w.check_len("data", data.len())?;
    let indicator = quantile_indicator(data, k, quantile)?;
    local_joincount(w, &indicator, cfg)
}

/// Multivariate quantile LISA: per-variable quantile indicators feed the
/// co-location join count, so the statistic counts neighbors falling in the
/// selected quantile of every variable at once.
pub fn local_multiquantilelisa(
    w: &WeightsGraph,
    data: &[AttributeVector],
    ks: &[usize],
    quantiles: &[usize],
    cfg: &LisaConfig,
) -> Result<LisaResult> {
    cfg.validate()?;
    if data.is_empty() {
        return Err(Error::EmptyInput("quantile variable list"));
    }
    if ks.len() != data.len() || quantiles.len() != data.len() {
        return Err(Error::SizeMismatch {
            what: "quantile parameter lists",
            expected: data.len(),
            actual: ks.len().min(quantiles.len()),
        });
    }
    let indicators = data
        .iter()
        .zip(ks.iter().zip(quantiles))
        .map(|(col, (&k, &q))| {
            w.check_len("data", col.len())?;
            quantile_indicator(col, k, q)
        })
        .collect::<Result<Vec<_>>>()?;
    local_multijoincount(w, &indicators, cfg)
}

/// 0/1 membership of the `quantile`-th of `k` rank-based bins. Undefined
/// entries stay undefined.
fn quantile_indicator(data: &AttributeVector, k: usize, quantile: usize) -> Result<AttributeVector> {
    if k < 2 {
        return Err(Error::invalid_parameter(
            "k",
            k,
            "at least two quantile bins required",
        ));
    }
    if quantile == 0 || quantile > k {
        return Err(Error::invalid_parameter(
            "quantile",
            quantile,
            format!("must be in 1..={k}"),
        ));
    }

    let n = data.len();
    let defined = data.defined_mask();
    let mut order: Vec<usize> = (0..n).filter(|&i| defined[i]).collect();
    if order.len() < k {
        return Err(Error::invalid_parameter(
            "k",
            k,
            "more quantile bins than defined observations",
        ));
    }
    order.sort_by(|&a, &b| {
        data.value(a)
            .partial_cmp(&data.value(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let m = order.len();
    let mut values = vec![0.0; n];
    let mut undefs = vec![false; n];
    for i in 0..n {
        undefs[i] = !defined[i];
        if undefs[i] {
            values[i] = f64::NAN;
        }
    }
    for (rank, &i) in order.iter().enumerate() {
        let bin = (rank * k / m).min(k - 1);
        if bin == quantile - 1 {
            values[i] = 1.0;
        }
    }
    AttributeVector::with_undefs(values, undefs)
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
    fn test_top_quantile_cluster() {
        let w = lattice_weights(6, 6);
        // Highest values grouped in the last row.
        let vals: Vec<f64> = (0..36).map(|i| i as f64).collect();
        let r = local_quantilelisa(
            &w,
            &AttributeVector::new(vals),
            6,
            6,
            &LisaConfig::default(),
        )
        .unwrap();
        // 36/6 = 6 cells per bin: the top bin is the last row, spatially
        // contiguous, so its members see top-bin neighbors.
        assert!(r.values()[35] >= 1.0);
        assert!(r.values()[0].is_nan()); // bottom-bin cell carries no statistic
    }

    #[test]
    fn test_quantile_bounds_validated() {
        let w = lattice_weights(3, 3);
        let data = AttributeVector::new((0..9).map(|i| i as f64).collect());
        assert!(local_quantilelisa(&w, &data, 1, 1, &LisaConfig::default()).is_err());
        assert!(local_quantilelisa(&w, &data, 4, 0, &LisaConfig::default()).is_err());
        assert!(local_quantilelisa(&w, &data, 4, 5, &LisaConfig::default()).is_err());
        assert!(local_quantilelisa(&w, &data, 20, 1, &LisaConfig::default()).is_err());
    }

    #[test]
    fn test_multiquantile_parameter_lengths() {
        let w = lattice_weights(3, 3);
        let a = AttributeVector::new((0..9).map(|i| i as f64).collect());
        let b = AttributeVector::new((0..9).map(|i| (i * 2) as f64).collect());
        let err = local_multiquantilelisa(
            &w,
            &[a, b],
            &[4],
            &[1, 1],
            &LisaConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }), "got {err:?}");
    }

    #[test]
    fn test_multiquantile_colocated_top_bins() {
        let w = lattice_weights(4, 4);
        // Two variables peaking on the same cells.
        let a: Vec<f64> = (0..16).map(|i| i as f64).collect();
        let b: Vec<f64> = (0..16).map(|i| (i as f64) * 3.0).collect();
        let r = local_multiquantilelisa(
            &w,
            &[AttributeVector::new(a), AttributeVector::new(b)],
            &[4, 4],
            &[4, 4],
            &LisaConfig::default(),
        )
        .unwrap();
        // Top-quartile cells 12..16 co-locate for both variables.
        assert!(r.values()[15] >= 1.0);
    }
}
