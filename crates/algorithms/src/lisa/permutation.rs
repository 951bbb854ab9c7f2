//! Conditional permutation inference.
//!
//! For each observation `i`, the observed statistic is compared against a
//! reference distribution obtained by redrawing `i`'s neighbor values from
//! the other defined observations, holding `i`'s own value fixed. Each
//! observation gets its own RNG stream derived from the run seed, so results
//! are identical regardless of thread count or scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use esda_core::WeightsGraph;

use super::LisaConfig;

use crate::maybe_rayon::*;

/// Which side(s) of the reference distribution feed the pseudo-p-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tail {
    /// Two-sided rule: count permuted values >= observed, fold onto the
    /// smaller tail, then `p = (count + 1) / (permutations + 1)`.
    Folded,
    /// One-sided rule for statistics only meaningful on the high side.
    Greater,
}

/// Per-observation permutation results.
pub(crate) struct PermutationOutcome {
    /// Pseudo-p-values; NaN where the observation was skipped.
    pub pvalues: Vec<f64>,
    /// Mean of the permuted statistics, used by statistics whose cluster
    /// direction is judged against the reference mean.
    pub means: Vec<f64>,
}

/// Golden-ratio increment decorrelates per-observation seeds.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

pub(crate) fn observation_rng(seed: u64, i: usize) -> StdRng {
    StdRng::seed_from_u64(seed ^ (i as u64).wrapping_mul(SEED_MIX))
}

/// Run the conditional permutation test.
///
/// `observed[i]` is the real statistic (NaN skips the observation),
/// `draw_sizes[i]` the number of stand-in neighbors to draw, and
/// `eval(i, draw)` recomputes the statistic for `i` with `draw` in place of
/// its neighbors. `defined` marks observations eligible to be drawn.
pub(crate) fn conditional_permutation<F>(
    w: &WeightsGraph,
    cfg: &LisaConfig,
    defined: &[bool],
    observed: &[f64],
    draw_sizes: &[usize],
    tail: Tail,
    eval: F,
) -> PermutationOutcome
where
    F: Fn(usize, &[usize]) -> f64 + Sync + Send,
{
    let n = w.num_obs();
    debug_assert_eq!(observed.len(), n);
    debug_assert_eq!(draw_sizes.len(), n);

    let results = run_indexed(cfg.cpu_threads, n, |i| {
        if observed[i].is_nan() || draw_sizes[i] == 0 {
            return (f64::NAN, f64::NAN);
        }

        let mut pool: Vec<usize> = (0..n).filter(|&j| j != i && defined[j]).collect();
        let k = draw_sizes[i];
        if pool.len() < k {
            return (f64::NAN, f64::NAN);
        }

        let mut rng = observation_rng(cfg.seed, i);
        let mut larger = 0usize;
        let mut sum = 0.0;
        for _ in 0..cfg.permutations {
            // Partial Fisher-Yates: the first k slots become the draw.
            for t in 0..k {
                let r = rng.gen_range(t..pool.len());
                pool.swap(t, r);
            }
            let sim = eval(i, &pool[..k]);
            if sim >= observed[i] {
                larger += 1;
            }
            sum += sim;
        }

        let count = match tail {
            Tail::Folded => {
                if cfg.permutations - larger < larger {
                    cfg.permutations - larger
                } else {
                    larger
                }
            }
            Tail::Greater => larger,
        };
        let p = (count + 1) as f64 / (cfg.permutations + 1) as f64;
        (p, sum / cfg.permutations as f64)
    });

    let (pvalues, means) = results.into_iter().unzip();
    PermutationOutcome { pvalues, means }
}

/// Map `f` over `0..n`, on a dedicated pool of `threads` workers when the
/// `parallel` feature is enabled. `threads == 1` (or a pool that fails to
/// build) runs sequentially on the calling thread, never on the global pool.
pub(crate) fn run_indexed<T, F>(threads: usize, n: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    #[cfg(feature = "parallel")]
    {
        if threads > 1 {
            if let Ok(pool) = rayon::ThreadPoolBuilder::new().num_threads(threads).build() {
                return pool.install(|| (0..n).into_par_iter().map(&f).collect());
            }
        }
        (0..n).map(f).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        let _ = threads;
        (0..n).into_par_iter().map(f).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::weights::knn_weights;
    use esda_core::GeometrySet;

    fn grid_points(rows: usize, cols: usize) -> GeometrySet {
        let mut coords = Vec::new();
        for r in 0..rows {
            for c in 0..cols {
                coords.push((c as f64, r as f64));
            }
        }
        GeometrySet::from_coords(&coords)
    }

    #[test]
    fn test_deterministic_across_thread_counts() {
        let geoms = grid_points(4, 4);
        let w = knn_weights(&geoms, 3, &Default::default()).unwrap();
        let n = w.num_obs();
        let values: Vec<f64> = (0..n).map(|i| (i as f64).sin()).collect();
        let defined = vec![true; n];
        let observed: Vec<f64> = (0..n).map(|i| values[i] * 2.0).collect();
        let sizes: Vec<usize> = (0..n).map(|i| w.neighbors(i).len()).collect();

        let eval = |i: usize, draw: &[usize]| {
            values[i] * draw.iter().map(|&j| values[j]).sum::<f64>() / draw.len() as f64
        };

        let single = conditional_permutation(
            &w,
            &LisaConfig {
                cpu_threads: 1,
                ..Default::default()
            },
            &defined,
            &observed,
            &sizes,
            Tail::Folded,
            eval,
        );
        let multi = conditional_permutation(
            &w,
            &LisaConfig {
                cpu_threads: 4,
                ..Default::default()
            },
            &defined,
            &observed,
            &sizes,
            Tail::Folded,
            eval,
        );
        assert_eq!(single.pvalues, multi.pvalues);
        assert_eq!(single.means, multi.means);
    }

    #[test]
    fn test_single_thread_stays_on_caller() {
        // cpu_threads = 1 must not fan out onto rayon's global pool.
        let caller = std::thread::current().id();
        let ids = run_indexed(1, 64, |_| std::thread::current().id());
        assert!(ids.iter().all(|&id| id == caller));
    }

    #[test]
    fn test_pvalue_bounds() {
        let geoms = grid_points(3, 3);
        let w = knn_weights(&geoms, 2, &Default::default()).unwrap();
        let n = w.num_obs();
        let defined = vec![true; n];
        let observed = vec![0.0; n];
        let sizes = vec![2usize; n];
        let cfg = LisaConfig {
            permutations: 99,
            ..Default::default()
        };
        let out = conditional_permutation(&w, &cfg, &defined, &observed, &sizes, Tail::Greater, |_, _| {
            1.0
        });
        // Every permuted value beats the observed 0.0: p = (99+1)/(99+1).
        for p in &out.pvalues {
            assert!((p - 1.0).abs() < 1e-12);
        }

        let out = conditional_permutation(&w, &cfg, &defined, &observed, &sizes, Tail::Greater, |_, _| {
            -1.0
        });
        for p in &out.pvalues {
            assert!((p - 0.01).abs() < 1e-12);
        }
    }

    #[test]
    fn test_undefined_observation_skipped() {
        let geoms = grid_points(3, 3);
        let w = knn_weights(&geoms, 2, &Default::default()).unwrap();
        let n = w.num_obs();
        let mut defined = vec![true; n];
        defined[4] = false;
        let mut observed = vec![0.5; n];
        observed[4] = f64::NAN;
        let sizes = vec![2usize; n];
        let out = conditional_permutation(
            &w,
            &LisaConfig::default(),
            &defined,
            &observed,
            &sizes,
            Tail::Folded,
            |_, draw| draw.len() as f64,
        );
        assert!(out.pvalues[4].is_nan());
        assert!(!out.pvalues[0].is_nan());
        // The undefined observation never enters a draw pool.
        assert!(out.pvalues.iter().enumerate().all(|(i, p)| i == 4 || !p.is_nan()));
    }

    #[test]
    fn test_folded_never_exceeds_half_plus() {
        let geoms = grid_points(4, 4);
        let w = knn_weights(&geoms, 3, &Default::default()).unwrap();
        let n = w.num_obs();
        let values: Vec<f64> = (0..n).map(|i| ((i * 7) % 5) as f64).collect();
        let defined = vec![true; n];
        let observed: Vec<f64> = (0..n).map(|i| values[i]).collect();
        let sizes: Vec<usize> = (0..n).map(|i| w.neighbors(i).len()).collect();
        let cfg = LisaConfig {
            permutations: 999,
            ..Default::default()
        };
        let out = conditional_permutation(&w, &cfg, &defined, &observed, &sizes, Tail::Folded, |_, draw| {
            draw.iter().map(|&j| values[j]).sum::<f64>() / draw.len() as f64
        });
        for p in &out.pvalues {
            assert!(*p > 0.0 && *p <= 0.5 + 1.0 / 1000.0);
        }
    }
}
