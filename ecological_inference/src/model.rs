use log::debug;
use statrs::function::factorial::ln_binomial;
use statrs::function::gamma::{digamma, ln_gamma};

use crate::chain::Sampler;
use crate::config::*;
use crate::posterior::{LogDensityModel, Posterior};
use crate::trace::Trace;

// ********* Node graph ***********

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Prior over the shapes of other priors.
    Hyperprior,
    /// Free latent variable, sampled.
    Latent,
    /// Function of other nodes, recomputed for every draw.
    Deterministic,
    /// Likelihood, attached to the observed data.
    Observed,
}

/// One named node of the model graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    /// Human readable description of the distribution, for instance `Beta(alpha_dem[0], beta_dem[0])`.
    pub distribution: String,
    /// Number of scalar elements.
    pub width: usize,
}

/// Names of the nodes of a model for one target group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeNames {
    pub alpha: String,
    pub beta: String,
    pub pct_minority: String,
    pub pct_majority: String,
    pub est: String,
    pub observed: String,
}

impl NodeNames {
    pub fn for_group(group_name: &str) -> NodeNames {
        NodeNames {
            alpha: format!("alpha_{}", group_name),
            beta: format!("beta_{}", group_name),
            pct_minority: format!("pct_minority_voting_{}", group_name),
            pct_majority: format!("pct_majority_voting_{}", group_name),
            est: format!("est_voting_{}", group_name),
            observed: format!("votes_for_{}", group_name),
        }
    }
}

/// Expected share of the votes going to the group in a precinct where a
/// fraction `f` of the population belongs to the minority.
///
/// `f = 0` gives exactly `pct_majority` and `f = 1` gives exactly `pct_minority`.
#[inline]
pub fn est_voting_one(f: f64, pct_minority: f64, pct_majority: f64) -> f64 {
    f * pct_minority + (1.0 - f) * pct_majority
}

/// `x * ln(y)`, taken as 0 when `x` is 0.
#[inline]
fn xlny(x: f64, y: f64) -> f64 {
    if x == 0.0 {
        0.0
    } else {
        x * y.ln()
    }
}

// ********* Model ***********

/// The 2x2 ecological inference model of King (1997), for one target group.
///
/// ```text
/// alpha[g], beta[g]     ~ Exponential(lam)                 g in {minority, majority}
/// pct_minority[i]       ~ Beta(alpha[0], beta[0])
/// pct_majority[i]       ~ Beta(alpha[1], beta[1])
/// est[i]                = f[i] * pct_minority[i] + (1 - f[i]) * pct_majority[i]
/// votes_for_group[i]    ~ Binomial(voting_population[i], est[i])
/// ```
///
/// The flat parameter vector is
/// `[alpha0, alpha1, beta0, beta1, pct_minority.., pct_majority..]`.
///
/// Build it with [`crate::builder::ModelBuilder`].
#[derive(Debug, Clone, PartialEq)]
pub struct EcologicalModel {
    pub(crate) config: ModelConfig,
    pub(crate) observations: PrecinctObservations,
    pub(crate) names: NodeNames,
    pub(crate) nodes: Vec<Node>,
    /// Sum of the log binomial coefficients, which do not depend on the parameters.
    pub(crate) log_binomial_const: f64,
}

impl EcologicalModel {
    pub(crate) fn new(config: ModelConfig, observations: PrecinctObservations, nodes: Vec<Node>) -> Self {
        let log_binomial_const = observations
            .voting_population
            .iter()
            .zip(observations.votes_for_group.iter())
            .map(|(&n, &k)| ln_binomial(n, k))
            .sum();
        let names = NodeNames::for_group(&config.group_name);
        EcologicalModel {
            config,
            observations,
            names,
            nodes,
            log_binomial_const,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn group_name(&self) -> &str {
        &self.config.group_name
    }

    pub fn lam(&self) -> f64 {
        self.config.lam
    }

    pub fn observations(&self) -> &PrecinctObservations {
        &self.observations
    }

    pub fn n_precincts(&self) -> usize {
        self.observations.n_precincts()
    }

    pub fn names(&self) -> &NodeNames {
        &self.names
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Name of the likelihood node.
    pub fn observed_name(&self) -> &str {
        &self.names.observed
    }

    /// Name of the deterministic estimate node.
    pub fn deterministic_name(&self) -> &str {
        &self.names.est
    }

    /// The deterministic node evaluated on given latent rates, one value per precinct.
    pub fn est_voting(&self, pct_minority: &[f64], pct_majority: &[f64]) -> Vec<f64> {
        self.observations
            .minority_fraction
            .iter()
            .zip(pct_minority.iter().zip(pct_majority.iter()))
            .map(|(&f, (&pmin, &pmaj))| est_voting_one(f, pmin, pmaj))
            .collect()
    }

    /// Log density over the unconstrained parameter vector, Jacobian included.
    pub fn log_density(&self, z: &[f64]) -> f64 {
        Posterior::new(self).logpdf_unconstrained(z)
    }

    /// Gradient of [`EcologicalModel::log_density`].
    pub fn grad_log_density(&self, z: &[f64]) -> Vec<f64> {
        Posterior::new(self).grad_unconstrained(z)
    }

    /// Draws from the posterior with the given sampler, and assembles the named trace.
    ///
    /// Convergence problems are logged as warnings and do not fail the call.
    pub fn sample<S: Sampler>(&self, sampler: &S) -> EcoResult<Trace> {
        debug!(
            "sample: model {:?} with {} precincts",
            self.group_name(),
            self.n_precincts()
        );
        let result = sampler.sample(self)?;
        let trace = Trace::from_sampler_result(self, &result);
        trace.log_warnings();
        Ok(trace)
    }

    fn split<'t>(&self, theta: &'t [f64]) -> ([f64; 4], &'t [f64], &'t [f64]) {
        let n = self.n_precincts();
        let shapes = [theta[0], theta[1], theta[2], theta[3]];
        (shapes, &theta[4..4 + n], &theta[4 + n..4 + 2 * n])
    }
}

/// `sum_i ln Beta(p_i | a, b)`
fn beta_log_density(a: f64, b: f64, ps: &[f64]) -> f64 {
    let sum_ln_p: f64 = ps.iter().map(|p| p.ln()).sum();
    let sum_ln_q: f64 = ps.iter().map(|p| (1.0 - p).ln()).sum();
    (a - 1.0) * sum_ln_p + (b - 1.0) * sum_ln_q
        - ps.len() as f64 * (ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b))
}

impl LogDensityModel for EcologicalModel {
    fn dim(&self) -> usize {
        4 + 2 * self.n_precincts()
    }

    fn parameter_names(&self) -> Vec<String> {
        let n = self.n_precincts();
        let mut names = Vec::with_capacity(self.dim());
        names.push(format!("{}[0]", self.names.alpha));
        names.push(format!("{}[1]", self.names.alpha));
        names.push(format!("{}[0]", self.names.beta));
        names.push(format!("{}[1]", self.names.beta));
        names.extend((0..n).map(|i| format!("{}[{}]", self.names.pct_minority, i)));
        names.extend((0..n).map(|i| format!("{}[{}]", self.names.pct_majority, i)));
        names
    }

    fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        let mut bounds = vec![(0.0, f64::INFINITY); 4];
        bounds.extend(vec![(0.0, 1.0); 2 * self.n_precincts()]);
        bounds
    }

    /// Mean of the hyperpriors for the shapes, and 0.5 for every rate.
    fn parameter_init(&self) -> Vec<f64> {
        let mut init = vec![1.0 / self.config.lam; 4];
        init.extend(vec![0.5; 2 * self.n_precincts()]);
        init
    }

    fn logpdf(&self, theta: &[f64]) -> f64 {
        let lam = self.config.lam;
        let (shapes, pmin, pmaj) = self.split(theta);
        if shapes.iter().any(|&h| !(h.is_finite() && h > 0.0)) {
            return f64::NEG_INFINITY;
        }
        let [a0, a1, b0, b1] = shapes;

        let mut lp: f64 = shapes.iter().map(|&h| lam.ln() - lam * h).sum();
        lp += beta_log_density(a0, b0, pmin);
        lp += beta_log_density(a1, b1, pmaj);

        let obs = &self.observations;
        for i in 0..self.n_precincts() {
            let est = est_voting_one(obs.minority_fraction[i], pmin[i], pmaj[i]);
            let k = obs.votes_for_group[i] as f64;
            let n = obs.voting_population[i] as f64;
            lp += xlny(k, est) + xlny(n - k, 1.0 - est);
        }
        lp + self.log_binomial_const
    }

    fn grad_logpdf(&self, theta: &[f64]) -> Vec<f64> {
        let lam = self.config.lam;
        let n_prec = self.n_precincts();
        let (shapes, pmin, pmaj) = self.split(theta);
        let [a0, a1, b0, b1] = shapes;
        let m = n_prec as f64;

        let sum_ln = |ps: &[f64]| -> (f64, f64) {
            (
                ps.iter().map(|p| p.ln()).sum(),
                ps.iter().map(|p| (1.0 - p).ln()).sum(),
            )
        };
        let (ln_pmin, ln_qmin) = sum_ln(pmin);
        let (ln_pmaj, ln_qmaj) = sum_ln(pmaj);
        let psi_ab0 = digamma(a0 + b0);
        let psi_ab1 = digamma(a1 + b1);

        let mut grad = vec![0.0; self.dim()];
        grad[0] = -lam + ln_pmin - m * (digamma(a0) - psi_ab0);
        grad[1] = -lam + ln_pmaj - m * (digamma(a1) - psi_ab1);
        grad[2] = -lam + ln_qmin - m * (digamma(b0) - psi_ab0);
        grad[3] = -lam + ln_qmaj - m * (digamma(b1) - psi_ab1);

        let obs = &self.observations;
        for i in 0..n_prec {
            let f = obs.minority_fraction[i];
            let est = est_voting_one(f, pmin[i], pmaj[i]);
            let k = obs.votes_for_group[i] as f64;
            let n = obs.voting_population[i] as f64;
            // d/dest of the binomial log likelihood
            let mut g = 0.0;
            if k > 0.0 {
                g += k / est;
            }
            if n - k > 0.0 {
                g -= (n - k) / (1.0 - est);
            }

            let (p, q) = (pmin[i], pmaj[i]);
            grad[4 + i] = (a0 - 1.0) / p - (b0 - 1.0) / (1.0 - p) + f * g;
            grad[4 + n_prec + i] = (a1 - 1.0) / q - (b1 - 1.0) / (1.0 - q) + (1.0 - f) * g;
        }
        grad
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ModelBuilder;

    fn model() -> EcologicalModel {
        ModelBuilder::new(ModelConfig::default())
            .precincts(&[30, 70, 0], &[100, 120, 40], &[0.2, 0.9, 0.5])
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn layout_and_names() {
        let m = model();
        assert_eq!(m.dim(), 10);
        let names = m.parameter_names();
        assert_eq!(names[0], "alpha_dem[0]");
        assert_eq!(names[3], "beta_dem[1]");
        assert_eq!(names[4], "pct_minority_voting_dem[0]");
        assert_eq!(names[9], "pct_majority_voting_dem[2]");
        assert_eq!(m.parameter_init()[0], 2.0);
        assert_eq!(m.parameter_bounds()[5], (0.0, 1.0));
    }

    #[test]
    fn logpdf_is_finite_at_init_and_rejects_bad_shapes() {
        let m = model();
        let mut theta = m.parameter_init();
        assert!(m.logpdf(&theta).is_finite());
        theta[2] = 0.0;
        assert_eq!(m.logpdf(&theta), f64::NEG_INFINITY);
        theta[2] = f64::NAN;
        assert_eq!(m.logpdf(&theta), f64::NEG_INFINITY);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let m = model();
        let theta = vec![1.3, 0.7, 2.1, 0.9, 0.2, 0.6, 0.45, 0.35, 0.55, 0.8];
        let grad = m.grad_logpdf(&theta);
        let h = 1e-6;
        for j in 0..theta.len() {
            let mut up = theta.clone();
            let mut down = theta.clone();
            up[j] += h;
            down[j] -= h;
            let fd = (m.logpdf(&up) - m.logpdf(&down)) / (2.0 * h);
            assert!(
                (fd - grad[j]).abs() < 1e-4 * (1.0 + fd.abs()),
                "parameter {}: fd={} analytic={}",
                j,
                fd,
                grad[j]
            );
        }
    }

    #[test]
    fn deterministic_node_is_exact_at_the_edges() {
        let m = ModelBuilder::new(ModelConfig::default())
            .precincts(&[1, 1], &[2, 2], &[0.0, 1.0])
            .unwrap()
            .build()
            .unwrap();
        let est = m.est_voting(&[0.123, 0.456], &[0.789, 0.321]);
        assert_eq!(est, vec![0.789, 0.456]);
    }
}
