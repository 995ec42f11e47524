//! Named posterior draws.

use log::{info, warn};

use crate::chain::{Chain, SamplerResult};
use crate::diagnostics::{ess_bulk, hdi, mean_sd, r_hat, HDI_PROB, MIN_ESS_FRACTION, R_HAT_WARN};
use crate::model::{est_voting_one, EcologicalModel};

/// Draws of one model variable.
///
/// `draws[d][j]` is element `j` (for instance the precinct) of draw `d`.
/// The draws of all chains are concatenated in chain order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDraws {
    pub name: String,
    pub width: usize,
    pub draws: Vec<Vec<f64>>,
    pub(crate) draws_per_chain: usize,
}

impl VariableDraws {
    pub fn len(&self) -> usize {
        self.draws.len()
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    /// Draws of chain `c`, or `None` past the last chain.
    pub fn chain(&self, c: usize) -> Option<&[Vec<f64>]> {
        let start = c.checked_mul(self.draws_per_chain)?;
        let end = start.checked_add(self.draws_per_chain)?;
        self.draws.get(start..end)
    }

    /// All draws of element `j`, chains concatenated.
    pub fn element(&self, j: usize) -> Vec<f64> {
        self.draws.iter().map(|d| d[j]).collect()
    }

    /// Draws of element `j`, split per chain.
    pub fn element_by_chain(&self, j: usize) -> Vec<Vec<f64>> {
        if self.draws_per_chain == 0 {
            return Vec::new();
        }
        self.draws
            .chunks(self.draws_per_chain)
            .map(|chunk| chunk.iter().map(|d| d[j]).collect())
            .collect()
    }

    /// Posterior mean of every element.
    pub fn mean(&self) -> Vec<f64> {
        (0..self.width).map(|j| mean_sd(&self.element(j)).0).collect()
    }
}

/// Sampler statistics of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainStats {
    pub step_size: f64,
    pub divergences: Vec<bool>,
}

impl From<&Chain> for ChainStats {
    fn from(chain: &Chain) -> ChainStats {
        ChainStats {
            step_size: chain.step_size,
            divergences: chain.divergences.clone(),
        }
    }
}

impl ChainStats {
    pub fn n_divergent(&self) -> usize {
        self.divergences.iter().filter(|&&d| d).count()
    }
}

/// Posterior summary of one scalar element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementSummary {
    pub variable: String,
    pub index: usize,
    pub mean: f64,
    pub sd: f64,
    /// Bounds of the 94% highest density interval.
    pub hdi_low: f64,
    pub hdi_high: f64,
    pub r_hat: f64,
    pub ess_bulk: f64,
}

impl ElementSummary {
    /// `name[index]`
    pub fn label(&self) -> String {
        format!("{}[{}]", self.variable, self.index)
    }
}

/// Posterior draws of all the variables of a model, including the deterministic ones.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace {
    variables: Vec<VariableDraws>,
    chain_stats: Vec<ChainStats>,
    draws_per_chain: usize,
    seed: u64,
}

impl Trace {
    /// Splits the flat draws of the sampler into the named variables of the model,
    /// and recomputes the deterministic estimate for every draw.
    pub fn from_sampler_result(model: &EcologicalModel, result: &SamplerResult) -> Trace {
        let n = model.n_precincts();
        let names = model.names();
        let fractions = &model.observations().minority_fraction;
        let draws_per_chain = result.chains.first().map(|c| c.n_draws()).unwrap_or(0);

        let mut alpha = Vec::with_capacity(result.total_draws());
        let mut beta = Vec::with_capacity(result.total_draws());
        let mut pmin = Vec::with_capacity(result.total_draws());
        let mut pmaj = Vec::with_capacity(result.total_draws());
        let mut est: Vec<Vec<f64>> = Vec::with_capacity(result.total_draws());
        for draw in result.chains.iter().flat_map(|c| c.draws_constrained.iter()) {
            let pct_minority = &draw[4..4 + n];
            let pct_majority = &draw[4 + n..4 + 2 * n];
            alpha.push(vec![draw[0], draw[1]]);
            beta.push(vec![draw[2], draw[3]]);
            est.push(
                fractions
                    .iter()
                    .zip(pct_minority.iter().zip(pct_majority.iter()))
                    .map(|(&f, (&a, &b))| est_voting_one(f, a, b))
                    .collect(),
            );
            pmin.push(pct_minority.to_vec());
            pmaj.push(pct_majority.to_vec());
        }

        let variable = |name: &str, width: usize, draws: Vec<Vec<f64>>| VariableDraws {
            name: name.to_string(),
            width,
            draws,
            draws_per_chain,
        };
        Trace {
            variables: vec![
                variable(&names.alpha, 2, alpha),
                variable(&names.beta, 2, beta),
                variable(&names.pct_minority, n, pmin),
                variable(&names.pct_majority, n, pmaj),
                variable(&names.est, n, est),
            ],
            chain_stats: result.chains.iter().map(ChainStats::from).collect(),
            draws_per_chain,
            seed: result.seed,
        }
    }

    pub fn get(&self, name: &str) -> Option<&VariableDraws> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variables(&self) -> &[VariableDraws] {
        &self.variables
    }

    pub fn variable_names(&self) -> Vec<&str> {
        self.variables.iter().map(|v| v.name.as_str()).collect()
    }

    /// Posterior mean of every element of a variable.
    pub fn mean(&self, name: &str) -> Option<Vec<f64>> {
        self.get(name).map(|v| v.mean())
    }

    pub fn n_chains(&self) -> usize {
        self.chain_stats.len()
    }

    pub fn draws_per_chain(&self) -> usize {
        self.draws_per_chain
    }

    pub fn total_draws(&self) -> usize {
        self.n_chains() * self.draws_per_chain
    }

    /// Seed of the first chain.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn chain_stats(&self) -> &[ChainStats] {
        &self.chain_stats
    }

    /// Number of divergent transitions after tuning, over all chains.
    pub fn divergences(&self) -> usize {
        self.chain_stats.iter().map(|c| c.n_divergent()).sum()
    }

    pub fn summarize(&self, name: &str) -> Option<Vec<ElementSummary>> {
        self.get(name).map(summarize_variable)
    }

    /// Summary of every element of every variable.
    pub fn summary(&self) -> Vec<ElementSummary> {
        self.variables.iter().flat_map(summarize_variable).collect()
    }

    /// Logs the sampler problems that call the results into question.
    pub fn log_warnings(&self) {
        let n_div = self.divergences();
        if n_div > 0 {
            warn!(
                "There were {} divergences after tuning. Increase `target_accept` or reparameterize.",
                n_div
            );
        }

        let summary = self.summary();
        let bad_r_hat: Vec<String> = summary
            .iter()
            .filter(|s| s.r_hat > R_HAT_WARN)
            .map(|s| s.label())
            .collect();
        if !bad_r_hat.is_empty() {
            warn!(
                "The rhat statistic is larger than {} for {} parameters ({:?}). The chains did not converge.",
                R_HAT_WARN,
                bad_r_hat.len(),
                bad_r_hat
            );
        }

        let min_ess = MIN_ESS_FRACTION * self.total_draws() as f64;
        let low_ess: Vec<String> = summary
            .iter()
            .filter(|s| s.ess_bulk < min_ess)
            .map(|s| s.label())
            .collect();
        if !low_ess.is_empty() {
            warn!(
                "The effective sample size is smaller than {}% of the draws for {} parameters ({:?}).",
                MIN_ESS_FRACTION * 100.0,
                low_ess.len(),
                low_ess
            );
        }

        if bad_r_hat.is_empty() && low_ess.is_empty() && n_div == 0 {
            info!(
                "Sampling finished: {} chains x {} draws, no convergence warnings",
                self.n_chains(),
                self.draws_per_chain
            );
        }
    }
}

fn summarize_variable(v: &VariableDraws) -> Vec<ElementSummary> {
    (0..v.width)
        .map(|j| {
            let all = v.element(j);
            let by_chain = v.element_by_chain(j);
            let refs: Vec<&[f64]> = by_chain.iter().map(|c| c.as_slice()).collect();
            let (mean, sd) = mean_sd(&all);
            let (hdi_low, hdi_high) = hdi(&all, HDI_PROB);
            ElementSummary {
                variable: v.name.clone(),
                index: j,
                mean,
                sd,
                hdi_low,
                hdi_high,
                r_hat: r_hat(&refs),
                ess_bulk: ess_bulk(&refs),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;
    use crate::config::ModelConfig;

    fn fake_chain(draws: Vec<Vec<f64>>) -> Chain {
        let n = draws.len();
        Chain {
            draws_constrained: draws,
            divergences: vec![false; n],
            step_size: 0.1,
        }
    }

    #[test]
    fn splits_flat_draws_into_named_variables() {
        let model = ModelBuilder::new(ModelConfig::default())
            .group_name("rep")
            .precincts(&[1, 2], &[4, 4], &[0.25, 1.0])
            .unwrap()
            .build()
            .unwrap();
        let draw = |x: f64| vec![1.0, 2.0, 3.0, 4.0, 0.1 + x, 0.2, 0.5, 0.6];
        let result = SamplerResult {
            chains: vec![
                fake_chain(vec![draw(0.0), draw(0.1)]),
                fake_chain(vec![draw(0.2), draw(0.3)]),
            ],
            param_names: vec![],
            n_warmup: 0,
            n_samples: 2,
            seed: 9,
        };
        let trace = Trace::from_sampler_result(&model, &result);

        assert_eq!(
            trace.variable_names(),
            vec![
                "alpha_rep",
                "beta_rep",
                "pct_minority_voting_rep",
                "pct_majority_voting_rep",
                "est_voting_rep"
            ]
        );
        assert_eq!(trace.n_chains(), 2);
        assert_eq!(trace.total_draws(), 4);
        assert_eq!(trace.seed(), 9);

        let alpha = trace.get("alpha_rep").unwrap();
        assert_eq!(alpha.draws[3], vec![1.0, 2.0]);
        let pmin = trace.get("pct_minority_voting_rep").unwrap();
        assert_eq!(pmin.chain(1).unwrap()[0], vec![0.1 + 0.2, 0.2]);
        assert!(pmin.chain(2).is_none());
        assert!(pmin.chain(usize::MAX).is_none());
        assert_eq!(pmin.element_by_chain(1), vec![vec![0.2, 0.2], vec![0.2, 0.2]]);

        let est = trace.get("est_voting_rep").unwrap();
        assert_eq!(est.draws[0][0], 0.25 * 0.1 + 0.75 * 0.5);
        // Fraction 1: the estimate is the minority rate.
        assert_eq!(est.draws[2][1], 0.2);

        assert_eq!(trace.mean("beta_rep"), Some(vec![3.0, 4.0]));
        assert!(trace.get("votes_for_rep").is_none());
        assert_eq!(trace.divergences(), 0);
    }

    #[test]
    fn summary_covers_every_element() {
        let model = ModelBuilder::new(ModelConfig::default())
            .precincts(&[1], &[4], &[0.5])
            .unwrap()
            .build()
            .unwrap();
        let draws: Vec<Vec<f64>> = (0..20)
            .map(|i| vec![1.0 + i as f64, 2.0, 3.0, 4.0, 0.3, 0.6])
            .collect();
        let mut chain = fake_chain(draws);
        chain.divergences[3] = true;
        let result = SamplerResult {
            chains: vec![chain],
            param_names: vec![],
            n_warmup: 0,
            n_samples: 20,
            seed: 0,
        };
        let trace = Trace::from_sampler_result(&model, &result);
        let summary = trace.summary();
        // 2 + 2 + 1 + 1 + 1 elements
        assert_eq!(summary.len(), 7);
        assert_eq!(summary[0].label(), "alpha_dem[0]");
        assert_eq!(summary[0].mean, 10.5);
        assert!(summary[0].hdi_low >= 1.0 && summary[0].hdi_high <= 20.0);
        assert_eq!(summary[1].sd, 0.0);
        assert_eq!(trace.divergences(), 1);
        assert_eq!(trace.chain_stats()[0].n_divergent(), 1);
        let est = &trace.summarize("est_voting_dem").unwrap()[0];
        assert!((est.mean - 0.45).abs() < 1e-12);
        trace.log_warnings();
    }
}
