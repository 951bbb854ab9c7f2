//! max-p regionalization: find as many contiguous regions as possible while
//! every region's bound total reaches `min_bound`, then locally improve the
//! within-SS without losing feasibility.
//!
//! The region count comes out of the stochastic construction phase, which is
//! re-run `initial` times (each with its own seeded RNG stream, so re-runs
//! parallelize deterministically). A run that finds fewer regions than hoped
//! is still returned; degradation is not an error.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use crate::lisa::permutation::{observation_rng, run_indexed};

use super::azp::RegionSearch;
use super::{build_matrix, within_ss, ClusteringResult, MinBound, RegionalizationConfig};

/// Tuning knobs for the max-p family.
#[derive(Debug, Clone)]
pub struct MaxpParams {
    /// Construction re-runs; the best feasible partition wins (default 99).
    pub initial: usize,
    /// Simulated annealing: temperature multiplier per sweep, in (0, 1).
    pub cooling_rate: f64,
    /// Simulated annealing: number of annealing sweeps.
    pub sa_maxit: usize,
    /// Tabu: iterations a reversed move stays forbidden.
    pub tabu_length: usize,
    /// Tabu: consecutive non-improving iterations before stopping.
    pub conv_tabu: usize,
}

impl Default for MaxpParams {
    fn default() -> Self {
        Self {
            initial: 99,
            cooling_rate: 0.85,
            sa_maxit: 1,
            tabu_length: 10,
            conv_tabu: 10,
        }
    }
}

/// max-p with greedy local improvement.
pub fn maxp_greedy(
    w: &WeightsGraph,
    data: &[AttributeVector],
    bound: &MinBound,
    params: &MaxpParams,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    let (matrix, assign, p) = maxp_setup(w, data, bound, params, cfg)?;
    let mut search = RegionSearch::new(w, &matrix, Some(bound), assign, p);
    search.greedy();
    Ok(ClusteringResult::evaluate(search.into_assign(), &matrix))
}

/// max-p with simulated annealing before the greedy polish.
pub fn maxp_sa(
    w: &WeightsGraph,
    data: &[AttributeVector],
    bound: &MinBound,
    params: &MaxpParams,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    if !(params.cooling_rate > 0.0 && params.cooling_rate < 1.0) {
        return Err(Error::invalid_parameter(
            "cooling_rate",
            params.cooling_rate,
            "must be in (0, 1)",
        ));
    }
    let (matrix, assign, p) = maxp_setup(w, data, bound, params, cfg)?;
    let mut search = RegionSearch::new(w, &matrix, Some(bound), assign, p);
    let mut rng = observation_rng(cfg.random_seed, params.initial);
    search.annealing(params.cooling_rate, params.sa_maxit.max(1), &mut rng);
    search.greedy();
    Ok(ClusteringResult::evaluate(search.into_assign(), &matrix))
}

/// max-p with tabu local search.
pub fn maxp_tabu(
    w: &WeightsGraph,
    data: &[AttributeVector],
    bound: &MinBound,
    params: &MaxpParams,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    if params.tabu_length == 0 {
        return Err(Error::invalid_parameter(
            "tabu_length",
            params.tabu_length,
            "must be >= 1",
        ));
    }
    let (matrix, assign, p) = maxp_setup(w, data, bound, params, cfg)?;
    let mut search = RegionSearch::new(w, &matrix, Some(bound), assign, p);
    let best = search.tabu(params.tabu_length, params.conv_tabu.max(1));
    Ok(ClusteringResult::evaluate(best, &matrix))
}

/// Validation plus the multi-run construction phase.
fn maxp_setup(
    w: &WeightsGraph,
    data: &[AttributeVector],
    bound: &MinBound,
    params: &MaxpParams,
    cfg: &RegionalizationConfig,
) -> Result<(Array2<f64>, Vec<usize>, usize)> {
    let n = w.num_obs();
    if n == 0 {
        return Err(Error::EmptyInput("weights graph"));
    }
    bound.validate(n)?;
    if params.initial == 0 {
        return Err(Error::invalid_parameter(
            "initial",
            params.initial,
            "must be >= 1",
        ));
    }
    let grand_total: f64 = bound.values.iter().sum();
    if !bound.satisfied(grand_total) {
        return Err(Error::invalid_parameter(
            "min_bound",
            bound.min_bound,
            "exceeds the total of the bound variable",
        ));
    }
    let matrix = build_matrix(data, cfg.scale_method)?;

    // Each construction run draws from its own (seed, run) stream, so the
    // winner is the same regardless of thread count.
    let runs = run_indexed(cfg.cpu_threads, params.initial, |run| {
        let mut rng = observation_rng(cfg.random_seed, run);
        construct(w, bound, &mut rng)
    });

    let mut best: Option<(usize, f64, Vec<usize>)> = None;
    for outcome in runs {
        let Ok((assign, p)) = outcome else { continue };
        let ss: f64 = within_ss(&assign, &matrix, p).iter().sum();
        let better = match &best {
            None => true,
            Some((bp, bss, _)) => p > *bp || (p == *bp && ss < *bss),
        };
        if better {
            best = Some((p, ss, assign));
        }
    }
    let Some((p, _, assign)) = best else {
        return Err(Error::Algorithm(
            "max-p construction failed on every run".into(),
        ));
    };
    Ok((matrix, assign, p))
}

/// One stochastic construction: grow regions to the bound from random
/// seeds, then absorb enclaves into adjacent regions.
fn construct(w: &WeightsGraph, bound: &MinBound, rng: &mut StdRng) -> Result<(Vec<usize>, usize)> {
    let n = w.num_obs();
    let mut assign = vec![usize::MAX; n];
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut p = 0usize;
    for &seed in &order {
        if assign[seed] != usize::MAX {
            continue;
        }
        let region = p;
        let mut members = vec![seed];
        assign[seed] = region;
        let mut total = bound.values[seed];

        while !bound.satisfied(total) {
            let frontier: Vec<usize> = members
                .iter()
                .flat_map(|&m| w.neighbors(m).iter().copied())
                .filter(|&j| assign[j] == usize::MAX)
                .collect();
            let Some(&pick) = frontier.as_slice().choose(rng) else {
                break;
            };
            assign[pick] = region;
            members.push(pick);
            total += bound.values[pick];
        }

        if bound.satisfied(total) {
            p += 1;
        } else {
            // Could not reach the bound: release the members as enclaves.
            for &m in &members {
                assign[m] = usize::MAX;
            }
        }
    }

    if p == 0 {
        return Err(Error::Algorithm(
            "no region reached min_bound during construction".into(),
        ));
    }

    // Enclave phase: every leftover joins a random adjacent region.
    loop {
        let mut progressed = false;
        let mut remaining = false;
        for i in 0..n {
            if assign[i] != usize::MAX {
                continue;
            }
            let adjacent: Vec<usize> = w
                .neighbors(i)
                .iter()
                .copied()
                .filter(|&j| assign[j] != usize::MAX)
                .collect();
            if let Some(&j) = adjacent.as_slice().choose(rng) {
                assign[i] = assign[j];
                progressed = true;
            } else {
                remaining = true;
            }
        }
        if !remaining {
            break;
        }
        if !progressed {
            return Err(Error::Algorithm(
                "weights graph is not fully connected".into(),
            ));
        }
    }

    Ok((assign, p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use esda_core::geometry::unit_lattice;
    use esda_core::weights::queen_weights;

    use crate::regionalization::tree::label_components;

    fn lattice_weights(side: usize) -> WeightsGraph {
        queen_weights(&unit_lattice(side, side), &Default::default()).unwrap()
    }

    #[test]
    fn test_regions_meet_bound() {
        let w = lattice_weights(6);
        let data = vec![AttributeVector::new(
            (0..36).map(|i| (i as f64).sin()).collect(),
        )];
        let bound = MinBound::new(vec![1.0; 36], 6.0);
        let r = maxp_greedy(&w, &data, &bound, &MaxpParams::default(), &RegionalizationConfig::default())
            .unwrap();
        let p = r.num_clusters();
        assert!(p >= 2, "expected multiple regions, got {p}");
        assert!(p <= 6); // 36 / 6 is the feasibility ceiling
        for c in 0..p {
            let size = r.clusters().iter().filter(|&&x| x == c).count();
            assert!(size >= 6, "region {c} has {size} members");
            assert_eq!(label_components(&w, r.clusters(), c).len(), 1, "region {c}");
        }
    }

    #[test]
    fn test_deterministic() {
        let w = lattice_weights(5);
        let data = vec![AttributeVector::new((0..25).map(|i| (i % 7) as f64).collect())];
        let bound = MinBound::new(vec![1.0; 25], 5.0);
        let params = MaxpParams {
            initial: 20,
            ..Default::default()
        };
        let cfg1 = RegionalizationConfig {
            cpu_threads: 1,
            ..Default::default()
        };
        let cfg4 = RegionalizationConfig {
            cpu_threads: 4,
            ..Default::default()
        };
        let a = maxp_greedy(&w, &data, &bound, &params, &cfg1).unwrap();
        let b = maxp_greedy(&w, &data, &bound, &params, &cfg4).unwrap();
        assert_eq!(a.clusters(), b.clusters());
    }

    #[test]
    fn test_unsatisfiable_bound_rejected() {
        let w = lattice_weights(3);
        let data = vec![AttributeVector::new(vec![1.0; 9])];
        let bound = MinBound::new(vec![1.0; 9], 100.0);
        assert!(maxp_greedy(&w, &data, &bound, &MaxpParams::default(), &RegionalizationConfig::default())
            .is_err());
    }

    #[test]
    fn test_whole_graph_bound_gives_single_region() {
        let w = lattice_weights(3);
        let data = vec![AttributeVector::new((0..9).map(|i| i as f64).collect())];
        // Bound equals the grand total: only one region is feasible.
        let bound = MinBound::new(vec![1.0; 9], 9.0);
        let r = maxp_greedy(&w, &data, &bound, &MaxpParams::default(), &RegionalizationConfig::default())
            .unwrap();
        assert_eq!(r.num_clusters(), 1);
        assert!(r.clusters().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_sa_and_tabu_stay_feasible() {
        let w = lattice_weights(5);
        let data = vec![AttributeVector::new((0..25).map(|i| (i / 5) as f64).collect())];
        let bound = MinBound::new(vec![1.0; 25], 5.0);
        let params = MaxpParams {
            initial: 10,
            ..Default::default()
        };
        let cfg = RegionalizationConfig::default();
        for r in [
            maxp_sa(&w, &data, &bound, &params, &cfg).unwrap(),
            maxp_tabu(&w, &data, &bound, &params, &cfg).unwrap(),
        ] {
            for c in 0..r.num_clusters() {
                let size = r.clusters().iter().filter(|&&x| x == c).count();
                assert!(size >= 5, "region {c} has {size} members");
            }
        }
    }
}
