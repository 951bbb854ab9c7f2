//! AZP: automatic zoning by iterative reassignment of border observations,
//! in greedy, simulated-annealing and tabu flavors.
//!
//! The move machinery (`RegionSearch`) keeps per-region running sums so a
//! candidate move is scored in O(variables), and re-checks donor-region
//! connectivity before any reassignment. max-p reuses the same machinery for
//! its local-search phase.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use esda_core::{AttributeVector, Error, Result, WeightsGraph};

use super::{build_matrix, check_k, ClusteringResult, MinBound, RegionalizationConfig};

/// Tuning knobs specific to the AZP family.
#[derive(Debug, Clone)]
pub struct AzpParams {
    /// Simulated annealing: temperature multiplier per sweep, in (0, 1).
    pub cooling_rate: f64,
    /// Simulated annealing: number of annealing sweeps.
    pub sa_maxit: usize,
    /// Tabu: iterations a reversed move stays forbidden.
    pub tabu_length: usize,
    /// Tabu: consecutive non-improving iterations before stopping.
    pub conv_tabu: usize,
    /// Optional starting assignment (region id per observation, `0..p-1`).
    pub init_regions: Option<Vec<usize>>,
}

impl Default for AzpParams {
    fn default() -> Self {
        Self {
            cooling_rate: 0.85,
            sa_maxit: 1,
            tabu_length: 10,
            conv_tabu: 10,
            init_regions: None,
        }
    }
}

/// AZP with strictly improving moves.
pub fn azp_greedy(
    w: &WeightsGraph,
    data: &[AttributeVector],
    p: usize,
    bound: Option<&MinBound>,
    params: &AzpParams,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    let (matrix, assign, _) = azp_setup(w, data, p, bound, params, cfg)?;
    let mut search = RegionSearch::new(w, &matrix, bound, assign, p);
    search.greedy();
    Ok(ClusteringResult::evaluate(search.into_assign(), &matrix))
}

/// AZP with simulated annealing before the final greedy polish.
pub fn azp_sa(
    w: &WeightsGraph,
    data: &[AttributeVector],
    p: usize,
    bound: Option<&MinBound>,
    params: &AzpParams,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    if !(params.cooling_rate > 0.0 && params.cooling_rate < 1.0) {
        return Err(Error::invalid_parameter(
            "cooling_rate",
            params.cooling_rate,
            "must be in (0, 1)",
        ));
    }
    if params.sa_maxit == 0 {
        return Err(Error::invalid_parameter(
            "sa_maxit",
            params.sa_maxit,
            "must be >= 1",
        ));
    }
    let (matrix, assign, mut rng) = azp_setup(w, data, p, bound, params, cfg)?;
    let mut search = RegionSearch::new(w, &matrix, bound, assign, p);
    search.annealing(params.cooling_rate, params.sa_maxit, &mut rng);
    search.greedy();
    Ok(ClusteringResult::evaluate(search.into_assign(), &matrix))
}

/// AZP with a tabu search over best (possibly worsening) moves.
pub fn azp_tabu(
    w: &WeightsGraph,
    data: &[AttributeVector],
    p: usize,
    bound: Option<&MinBound>,
    params: &AzpParams,
    cfg: &RegionalizationConfig,
) -> Result<ClusteringResult> {
    if params.tabu_length == 0 {
        return Err(Error::invalid_parameter(
            "tabu_length",
            params.tabu_length,
            "must be >= 1",
        ));
    }
    let (matrix, assign, _) = azp_setup(w, data, p, bound, params, cfg)?;
    let mut search = RegionSearch::new(w, &matrix, bound, assign, p);
    let best = search.tabu(params.tabu_length, params.conv_tabu.max(1));
    Ok(ClusteringResult::evaluate(best, &matrix))
}

/// Shared validation and initial assignment for the three AZP variants.
fn azp_setup(
    w: &WeightsGraph,
    data: &[AttributeVector],
    p: usize,
    bound: Option<&MinBound>,
    params: &AzpParams,
    cfg: &RegionalizationConfig,
) -> Result<(Array2<f64>, Vec<usize>, StdRng)> {
    let n = w.num_obs();
    check_k(p, n)?;
    if let Some(b) = bound {
        b.validate(n)?;
    }
    let matrix = build_matrix(data, cfg.scale_method)?;
    let mut rng = StdRng::seed_from_u64(cfg.random_seed);

    let assign = match &params.init_regions {
        Some(init) => {
            validate_init_regions(init, n, p)?;
            init.clone()
        }
        None => grow_initial_regions(w, p, bound, &mut rng)?,
    };
    Ok((matrix, assign, rng))
}

fn validate_init_regions(init: &[usize], n: usize, p: usize) -> Result<()> {
    if init.len() != n {
        return Err(Error::SizeMismatch {
            what: "init_regions",
            expected: n,
            actual: init.len(),
        });
    }
    let mut seen = vec![false; p];
    for &r in init {
        if r >= p {
            return Err(Error::invalid_parameter(
                "init_regions",
                r,
                format!("region ids must be in 0..{p}"),
            ));
        }
        seen[r] = true;
    }
    if !seen.iter().all(|&s| s) {
        return Err(Error::invalid_parameter(
            "init_regions",
            p,
            "every region id must appear at least once",
        ));
    }
    Ok(())
}

/// Seed `p` random observations and grow regions contiguously until every
/// observation is assigned. With a bound constraint, unsatisfied regions
/// grow first so the starting partition is feasible.
pub(crate) fn grow_initial_regions(
    w: &WeightsGraph,
    p: usize,
    bound: Option<&MinBound>,
    rng: &mut StdRng,
) -> Result<Vec<usize>> {
    let n = w.num_obs();
    let mut assign = vec![usize::MAX; n];
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);

    let mut totals = vec![0.0f64; p];
    for (r, &seed) in order.iter().take(p).enumerate() {
        assign[seed] = r;
        if let Some(b) = bound {
            totals[r] = b.values[seed];
        }
    }

    if let Some(b) = bound {
        loop {
            let Some(r) = (0..p).find(|&r| !b.satisfied(totals[r])) else {
                break;
            };
            let frontier: Vec<usize> = (0..n)
                .filter(|&i| {
                    assign[i] == usize::MAX
                        && w.neighbors(i).iter().any(|&j| assign[j] == r)
                })
                .collect();
            let Some(&pick) = frontier.as_slice().choose(rng) else {
                return Err(Error::Algorithm(format!(
                    "cannot grow {p} regions satisfying min_bound {}",
                    b.min_bound
                )));
            };
            assign[pick] = r;
            totals[r] += b.values[pick];
        }
    }

    let mut remaining = assign.iter().filter(|&&a| a == usize::MAX).count();
    while remaining > 0 {
        let mut progressed = false;
        for i in 0..n {
            if assign[i] != usize::MAX {
                continue;
            }
            // Attach to a random already-assigned neighbor's region.
            let assigned: Vec<usize> = w
                .neighbors(i)
                .iter()
                .copied()
                .filter(|&j| assign[j] != usize::MAX)
                .collect();
            if let Some(&j) = assigned.as_slice().choose(rng) {
                assign[i] = assign[j];
                remaining -= 1;
                progressed = true;
            }
        }
        if !progressed {
            return Err(Error::Algorithm(
                "weights graph is not fully connected".into(),
            ));
        }
    }
    Ok(assign)
}

/// Mutable partition state with O(variables) move scoring.
pub(crate) struct RegionSearch<'a> {
    w: &'a WeightsGraph,
    matrix: &'a Array2<f64>,
    bound: Option<&'a MinBound>,
    assign: Vec<usize>,
    sums: Vec<Vec<f64>>,
    sumsq: Vec<Vec<f64>>,
    counts: Vec<usize>,
    bound_totals: Vec<f64>,
}

impl<'a> RegionSearch<'a> {
    pub fn new(
        w: &'a WeightsGraph,
        matrix: &'a Array2<f64>,
        bound: Option<&'a MinBound>,
        assign: Vec<usize>,
        p: usize,
    ) -> Self {
        let v = matrix.ncols();
        let mut sums = vec![vec![0.0; v]; p];
        let mut sumsq = vec![vec![0.0; v]; p];
        let mut counts = vec![0usize; p];
        let mut bound_totals = vec![0.0; p];
        for (i, &r) in assign.iter().enumerate() {
            counts[r] += 1;
            if let Some(b) = bound {
                bound_totals[r] += b.values[i];
            }
            for j in 0..v {
                let x = matrix[(i, j)];
                sums[r][j] += x;
                sumsq[r][j] += x * x;
            }
        }
        Self {
            w,
            matrix,
            bound,
            assign,
            sums,
            sumsq,
            counts,
            bound_totals,
        }
    }

    pub fn into_assign(self) -> Vec<usize> {
        self.assign
    }

    fn region_within(&self, r: usize) -> f64 {
        if self.counts[r] == 0 {
            return 0.0;
        }
        let c = self.counts[r] as f64;
        self.sums[r]
            .iter()
            .zip(&self.sumsq[r])
            .map(|(s, sq)| sq - s * s / c)
            .sum()
    }

    pub fn within_total(&self) -> f64 {
        (0..self.counts.len()).map(|r| self.region_within(r)).sum()
    }

    /// SS change if observation `i` moved to region `to`; `None` when the
    /// move is structurally invalid.
    fn move_delta(&self, i: usize, to: usize) -> Option<f64> {
        let from = self.assign[i];
        if from == to || self.counts[from] <= 1 {
            return None;
        }
        // Receiver must be adjacent to keep it contiguous.
        if !self.w.neighbors(i).iter().any(|&j| self.assign[j] == to) {
            return None;
        }
        if let Some(b) = self.bound {
            if !b.satisfied(self.bound_totals[from] - b.values[i]) {
                return None;
            }
        }
        if !self.donor_stays_connected(i) {
            return None;
        }

        let v = self.matrix.ncols();
        let mut delta = 0.0;
        for r in [from, to] {
            let (c_old, c_new) = if r == from {
                (self.counts[r] as f64, (self.counts[r] - 1) as f64)
            } else {
                (self.counts[r] as f64, (self.counts[r] + 1) as f64)
            };
            let sign = if r == from { -1.0 } else { 1.0 };
            let mut old_w = 0.0;
            let mut new_w = 0.0;
            for j in 0..v {
                let x = self.matrix[(i, j)];
                let s = self.sums[r][j];
                let sq = self.sumsq[r][j];
                if c_old > 0.0 {
                    old_w += sq - s * s / c_old;
                }
                let s2 = s + sign * x;
                let sq2 = sq + sign * x * x;
                if c_new > 0.0 {
                    new_w += sq2 - s2 * s2 / c_new;
                }
            }
            delta += new_w - old_w;
        }
        Some(delta)
    }

    fn donor_stays_connected(&self, i: usize) -> bool {
        use std::collections::VecDeque;
        let from = self.assign[i];
        let members: Vec<usize> = (0..self.assign.len())
            .filter(|&j| j != i && self.assign[j] == from)
            .collect();
        let Some(&start) = members.first() else {
            return false;
        };
        let mut seen = vec![false; self.assign.len()];
        seen[start] = true;
        let mut reached = 1;
        let mut queue = VecDeque::from([start]);
        while let Some(u) = queue.pop_front() {
            for &x in self.w.neighbors(u) {
                if x != i && self.assign[x] == from && !seen[x] {
                    seen[x] = true;
                    reached += 1;
                    queue.push_back(x);
                }
            }
        }
        reached == members.len()
    }

    fn apply_move(&mut self, i: usize, to: usize) {
        let from = self.assign[i];
        let v = self.matrix.ncols();
        for j in 0..v {
            let x = self.matrix[(i, j)];
            self.sums[from][j] -= x;
            self.sumsq[from][j] -= x * x;
            self.sums[to][j] += x;
            self.sumsq[to][j] += x * x;
        }
        self.counts[from] -= 1;
        self.counts[to] += 1;
        if let Some(b) = self.bound {
            self.bound_totals[from] -= b.values[i];
            self.bound_totals[to] += b.values[i];
        }
        self.assign[i] = to;
    }

    /// All structurally plausible `(observation, target region)` pairs:
    /// border observations with a neighbor in another region.
    fn candidates(&self) -> Vec<(usize, usize)> {
        let mut moves = Vec::new();
        for i in 0..self.assign.len() {
            let mut targets: Vec<usize> = self
                .w
                .neighbors(i)
                .iter()
                .map(|&j| self.assign[j])
                .filter(|&r| r != self.assign[i])
                .collect();
            targets.sort_unstable();
            targets.dedup();
            for t in targets {
                moves.push((i, t));
            }
        }
        moves
    }

    /// Apply strictly improving moves until a local optimum.
    pub fn greedy(&mut self) {
        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for (i, t) in self.candidates() {
                if let Some(d) = self.move_delta(i, t) {
                    let better = match best {
                        None => d < -1e-12,
                        Some((_, _, bd)) => d < bd,
                    };
                    if better && d < -1e-12 {
                        best = Some((i, t, d));
                    }
                }
            }
            match best {
                Some((i, t, _)) => self.apply_move(i, t),
                None => break,
            }
        }
    }

    /// Annealing sweeps: visit candidates in random order, always accept
    /// improvements, accept worsenings with probability `exp(-delta / T)`.
    pub fn annealing(&mut self, cooling_rate: f64, sweeps: usize, rng: &mut StdRng) {
        // Scale the temperature to the data so acceptance rates are sane.
        let scale = (self.within_total() / self.assign.len() as f64).max(1e-9);
        let mut temp = scale;
        for _ in 0..sweeps {
            let mut moves = self.candidates();
            moves.shuffle(rng);
            for (i, t) in moves {
                let Some(d) = self.move_delta(i, t) else {
                    continue;
                };
                if d < 0.0 || rng.gen::<f64>() < (-d / temp).exp() {
                    self.apply_move(i, t);
                }
            }
            temp *= cooling_rate;
        }
    }

    /// Tabu search; returns the best assignment seen.
    pub fn tabu(&mut self, tabu_length: usize, conv_tabu: usize) -> Vec<usize> {
        use std::collections::HashMap;
        let mut tabu_until: HashMap<(usize, usize), usize> = HashMap::new();
        let mut best_assign = self.assign.clone();
        let mut best_ss = self.within_total();
        let mut current_ss = best_ss;
        let mut non_improving = 0;
        let mut iter = 0;

        while non_improving < conv_tabu {
            iter += 1;
            let mut best_move: Option<(usize, usize, f64)> = None;
            for (i, t) in self.candidates() {
                let Some(d) = self.move_delta(i, t) else {
                    continue;
                };
                let is_tabu = tabu_until.get(&(i, t)).is_some_and(|&until| until > iter);
                // Aspiration: a tabu move that beats the global best is allowed.
                if is_tabu && current_ss + d >= best_ss {
                    continue;
                }
                let better = match best_move {
                    None => true,
                    Some((_, _, bd)) => d < bd,
                };
                if better {
                    best_move = Some((i, t, d));
                }
            }
            let Some((i, t, d)) = best_move else {
                break;
            };
            let from = self.assign[i];
            self.apply_move(i, t);
            current_ss += d;
            // Forbid the immediate reversal.
            tabu_until.insert((i, from), iter + tabu_length);

            if current_ss < best_ss - 1e-12 {
                best_ss = current_ss;
                best_assign = self.assign.clone();
                non_improving = 0;
            } else {
                non_improving += 1;
            }
        }
        best_assign
    }
}
