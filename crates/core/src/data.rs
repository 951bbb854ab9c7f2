//! Attribute data: numeric columns with undefined masks, scaling transforms
//! and attribute-space distance metrics.

use std::str::FromStr;

use crate::{Error, Result};

/// A numeric attribute column of length n with an optional undefined mask.
///
/// Undefined entries are excluded from neighbor-based computations per
/// observation; they are never silently treated as zero.
#[derive(Debug, Clone)]
pub struct AttributeVector {
    values: Vec<f64>,
    undefs: Vec<bool>,
}

impl AttributeVector {
    /// A fully defined column.
    pub fn new(values: Vec<f64>) -> Self {
        let undefs = vec![false; values.len()];
        Self { values, undefs }
    }

    /// A column with an explicit undefined mask; lengths must agree.
    pub fn with_undefs(values: Vec<f64>, undefs: Vec<bool>) -> Result<Self> {
        if values.len() != undefs.len() {
            return Err(Error::SizeMismatch {
                what: "undefined mask",
                expected: values.len(),
                actual: undefs.len(),
            });
        }
        Ok(Self { values, undefs })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn value(&self, i: usize) -> f64 {
        self.values[i]
    }

    /// Whether observation `i` carries a usable value. NaN values are
    /// treated as undefined even without a mask entry.
    pub fn is_defined(&self, i: usize) -> bool {
        !self.undefs[i] && self.values[i].is_finite()
    }

    /// Defined-mask over all observations.
    pub fn defined_mask(&self) -> Vec<bool> {
        (0..self.len()).map(|i| self.is_defined(i)).collect()
    }

    /// Number of defined observations.
    pub fn defined_count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_defined(i)).count()
    }

    /// Fail unless every defined value is 0 or 1 (join-count statistics).
    pub fn ensure_binary(&self, name: &'static str) -> Result<()> {
        for i in 0..self.len() {
            if self.is_defined(i) && self.values[i] != 0.0 && self.values[i] != 1.0 {
                return Err(Error::invalid_parameter(
                    name,
                    self.values[i],
                    format!("binary (0/1) data required, observation {i} is not"),
                ));
            }
        }
        Ok(())
    }
}

impl From<Vec<f64>> for AttributeVector {
    fn from(values: Vec<f64>) -> Self {
        AttributeVector::new(values)
    }
}

/// Standardization applied to each variable before clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleMethod {
    /// Use values as-is.
    Raw,
    /// Zero mean, unit (sample) variance.
    #[default]
    Standardize,
    /// Subtract the mean only.
    Demean,
    /// Center on the median, scale by 1.4826 × median absolute deviation.
    Mad,
    /// Map onto [0, 1]: (x - min) / range.
    RangeStandardize,
    /// Divide by the range, keeping location.
    RangeAdjust,
}

impl FromStr for ScaleMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(ScaleMethod::Raw),
            "standardize" => Ok(ScaleMethod::Standardize),
            "demean" => Ok(ScaleMethod::Demean),
            "mad" => Ok(ScaleMethod::Mad),
            "range_standardize" => Ok(ScaleMethod::RangeStandardize),
            "range_adjust" => Ok(ScaleMethod::RangeAdjust),
            other => Err(Error::invalid_parameter(
                "scale_method",
                other,
                "expected one of raw, standardize, demean, mad, range_standardize, range_adjust",
            )),
        }
    }
}

impl ScaleMethod {
    /// Transform one variable in place.
    pub fn apply(&self, column: &mut [f64]) {
        if column.is_empty() {
            return;
        }
        match self {
            ScaleMethod::Raw => {}
            ScaleMethod::Demean => {
                let m = mean(column);
                for v in column.iter_mut() {
                    *v -= m;
                }
            }
            ScaleMethod::Standardize => {
                let m = mean(column);
                let sd = sample_sd(column, m);
                for v in column.iter_mut() {
                    *v = if sd > 0.0 { (*v - m) / sd } else { 0.0 };
                }
            }
            ScaleMethod::Mad => {
                let med = median(column);
                let mut dev: Vec<f64> = column.iter().map(|v| (v - med).abs()).collect();
                let mad = median(&mut dev) * 1.4826;
                for v in column.iter_mut() {
                    *v = if mad > 0.0 { (*v - med) / mad } else { 0.0 };
                }
            }
            ScaleMethod::RangeStandardize => {
                let (lo, hi) = min_max(column);
                let range = hi - lo;
                for v in column.iter_mut() {
                    *v = if range > 0.0 { (*v - lo) / range } else { 0.0 };
                }
            }
            ScaleMethod::RangeAdjust => {
                let (lo, hi) = min_max(column);
                let range = hi - lo;
                if range > 0.0 {
                    for v in column.iter_mut() {
                        *v /= range;
                    }
                }
            }
        }
    }
}

/// Attribute-space distance between observation rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Euclidean,
    Manhattan,
}

impl FromStr for DistanceMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "euclidean" => Ok(DistanceMetric::Euclidean),
            "manhattan" => Ok(DistanceMetric::Manhattan),
            other => Err(Error::invalid_parameter(
                "distance_method",
                other,
                "expected one of euclidean, manhattan",
            )),
        }
    }
}

impl DistanceMetric {
    /// Distance between two equal-length attribute rows.
    pub fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match self {
            DistanceMetric::Euclidean => a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            DistanceMetric::Manhattan => a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum(),
        }
    }
}

fn mean(v: &[f64]) -> f64 {
    v.iter().sum::<f64>() / v.len() as f64
}

fn sample_sd(v: &[f64], m: f64) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let ss: f64 = v.iter().map(|x| (x - m) * (x - m)).sum();
    (ss / (v.len() - 1) as f64).sqrt()
}

fn median(v: &mut [f64]) -> f64 {
    v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let n = v.len();
    if n % 2 == 1 {
        v[n / 2]
    } else {
        (v[n / 2 - 1] + v[n / 2]) / 2.0
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for &x in v {
        lo = lo.min(x);
        hi = hi.max(x);
    }
    (lo, hi)
}
