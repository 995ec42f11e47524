//! Convergence diagnostics and posterior summaries for scalar draws.
//!
//! - split R-hat (Gelman et al.)
//! - bulk ESS with Geyer's initial monotone sequence
//! - highest density interval

/// Probability mass of the reported highest density interval.
pub const HDI_PROB: f64 = 0.94;

/// R-hat above this value means the chains did not mix.
pub const R_HAT_WARN: f64 = 1.05;

/// Bulk ESS below this fraction of the total draws is reported.
pub const MIN_ESS_FRACTION: f64 = 0.1;

/// Split R-hat of one scalar across chains.
///
/// Each chain is cut in two halves, and
/// `R-hat = sqrt(var_plus / W)` with `var_plus = (n - 1) / n * W + B / n`.
/// Returns NaN when the chains are too short or constant.
pub fn r_hat(chains: &[&[f64]]) -> f64 {
    let halves = match split_chains(chains, 2) {
        Some(h) => h,
        None => return f64::NAN,
    };
    let (var_plus, w) = variance_components(&halves);
    if w < 1e-30 {
        return f64::NAN;
    }
    (var_plus / w).sqrt()
}

/// Bulk effective sample size of one scalar across chains.
///
/// Autocorrelations are estimated from the variogram of the split chains,
/// `rho_t = 1 - V_t / (2 var_plus)`, and truncated with Geyer's initial
/// monotone sequence. The result is within `[1, total draws]`, or 0 when
/// the chains are too short.
pub fn ess_bulk(chains: &[&[f64]]) -> f64 {
    let split = match split_chains(chains, 4) {
        Some(s) => s,
        None => return 0.0,
    };
    let m = split.len();
    let n = split[0].len();
    let total_draws = (m * n) as f64;

    let (var_plus, _) = variance_components(&split);
    if !var_plus.is_finite() || var_plus < 1e-30 {
        return total_draws;
    }

    let mut rho: Vec<f64> = Vec::new();
    for lag in 1..n {
        let mut sum = 0.0;
        let mut count = 0usize;
        for c in &split {
            for i in 0..(n - lag) {
                let d = c[i] - c[i + lag];
                sum += d * d;
                count += 1;
            }
        }
        let v = sum / count as f64;
        rho.push((1.0 - v / (2.0 * var_plus)).clamp(-1.0, 1.0));

        let k = rho.len();
        if k % 2 == 0 && rho[k - 2] + rho[k - 1] < 0.0 {
            break;
        }
    }

    let mut gammas: Vec<f64> = Vec::new();
    for pair in rho.chunks_exact(2) {
        let g = pair[0] + pair[1];
        if g < 0.0 {
            break;
        }
        gammas.push(g);
    }
    for k in 1..gammas.len() {
        if gammas[k] > gammas[k - 1] {
            gammas[k] = gammas[k - 1];
        }
    }

    let tau = 1.0 + 2.0 * gammas.iter().sum::<f64>();
    if !tau.is_finite() || tau <= 0.0 {
        return total_draws;
    }
    (total_draws / tau).clamp(1.0, total_draws)
}

/// Narrowest interval containing a fraction `prob` of the draws.
///
/// Returns `(NaN, NaN)` for empty input.
pub fn hdi(draws: &[f64], prob: f64) -> (f64, f64) {
    if draws.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let mut sorted = draws.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let n = sorted.len();
    let width = ((prob.clamp(0.0, 1.0) * n as f64).floor() as usize).clamp(1, n);

    let mut best = (sorted[0], sorted[width - 1]);
    for start in 1..=(n - width) {
        let lo = sorted[start];
        let hi = sorted[start + width - 1];
        if hi - lo < best.1 - best.0 {
            best = (lo, hi);
        }
    }
    best
}

/// Mean and sample standard deviation.
pub fn mean_sd(draws: &[f64]) -> (f64, f64) {
    if draws.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = draws.len() as f64;
    let mean = draws.iter().sum::<f64>() / n;
    if draws.len() < 2 {
        return (mean, 0.0);
    }
    let var = draws.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Halves of every chain, truncated to a common length of at least `min_len`.
fn split_chains<'a>(chains: &[&'a [f64]], min_len: usize) -> Option<Vec<&'a [f64]>> {
    if chains.is_empty() {
        return None;
    }
    let mut halves: Vec<&[f64]> = Vec::with_capacity(chains.len() * 2);
    for c in chains {
        let mid = c.len() / 2;
        halves.push(&c[..mid]);
        halves.push(&c[mid..]);
    }
    let len = halves.iter().map(|c| c.len()).min().unwrap_or(0);
    if len < min_len.max(2) {
        return None;
    }
    Some(halves.into_iter().map(|c| &c[..len]).collect())
}

/// `(var_plus, W)` for equally long chains.
fn variance_components(chains: &[&[f64]]) -> (f64, f64) {
    let m = chains.len() as f64;
    let n = chains[0].len() as f64;
    let stats: Vec<(f64, f64)> = chains.iter().map(|c| mean_sd(c)).collect();
    let grand_mean = stats.iter().map(|s| s.0).sum::<f64>() / m;
    let b = stats
        .iter()
        .map(|s| (s.0 - grand_mean).powi(2))
        .sum::<f64>()
        * n
        / (m - 1.0);
    let w = stats.iter().map(|s| s.1 * s.1).sum::<f64>() / m;
    ((n - 1.0) / n * w + b / n, w)
}
