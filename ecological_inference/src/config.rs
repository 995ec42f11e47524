// ********* Input data structures ***********

use snafu::prelude::*;

/// Observed data for one run of the model, one entry per precinct.
///
/// The three vectors are index-aligned: entry `i` of each vector describes the
/// same precinct. In most cases, it is enough to go through the
/// [`crate::builder::ModelBuilder`], which checks the alignment.
#[derive(PartialEq, Debug, Clone)]
pub struct PrecinctObservations {
    /// Votes cast for the target group (for instance the Democratic candidate).
    pub votes_for_group: Vec<u64>,
    /// Total votes cast in the precinct.
    pub voting_population: Vec<u64>,
    /// Fraction of the voting-age population that belongs to the minority group.
    pub minority_fraction: Vec<f64>,
}

impl PrecinctObservations {
    pub fn n_precincts(&self) -> usize {
        self.voting_population.len()
    }

    /// Fraction of the votes that went to the target group, per precinct.
    pub fn observed_rates(&self) -> Vec<f64> {
        self.votes_for_group
            .iter()
            .zip(self.voting_population.iter())
            .map(|(&k, &n)| k as f64 / n as f64)
            .collect()
    }
}

// ******** Errors *********

/// Errors that prevent a model from being built or sampled.
#[derive(Debug, Snafu, PartialEq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum EcoError {
    #[snafu(display(
        "votes_for_group, voting_population and minority_fraction must have the same length \
         (the number of precincts), got {votes}, {population} and {fraction}"
    ))]
    LengthMismatch {
        votes: usize,
        population: usize,
        fraction: usize,
    },

    #[snafu(display("at least one precinct is required"))]
    NoPrecincts {},

    #[snafu(display(
        "precinct {precinct}: {votes} votes for the group exceed the {population} votes cast"
    ))]
    VotesExceedPopulation {
        precinct: usize,
        votes: u64,
        population: u64,
    },

    #[snafu(display("precinct {precinct}: no votes were cast"))]
    EmptyPrecinct { precinct: usize },

    #[snafu(display("precinct {precinct}: minority fraction must be within [0, 1], got {value}"))]
    InvalidFraction { precinct: usize, value: f64 },

    #[snafu(display("lam must be finite and > 0, got {lam}"))]
    InvalidHyperparameter { lam: f64 },

    #[snafu(display("the group name may not be empty"))]
    EmptyGroupName {},

    #[snafu(display("invalid sampler configuration: {reason}"))]
    InvalidSamplerConfig { reason: String },

    #[snafu(display(
        "chain {chain}: could not find a starting point with a finite log density after {attempts} attempts"
    ))]
    Initialization { chain: usize, attempts: usize },

    #[snafu(display("chain {chain}: sampling failed: {message}"))]
    Sampling { chain: usize, message: String },

    #[snafu(display("invalid precinct table: {reason}"))]
    InvalidTable { reason: String },
}

pub type EcoResult<T> = Result<T, EcoError>;

// ********* Configuration **********

/// Options of the model itself.
#[derive(PartialEq, Debug, Clone)]
pub struct ModelConfig {
    /// Rate of the exponential hyperpriors on the Beta shapes.
    /// Set to 0.5 in King's book.
    pub lam: f64,
    /// Label embedded in the name of every node of the model, so that models for
    /// several target groups ("dem", "rep") can live side by side.
    pub group_name: String,
}

impl ModelConfig {
    pub const DEFAULT_LAM: f64 = 0.5;
    pub const DEFAULT_GROUP_NAME: &'static str = "dem";
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            lam: ModelConfig::DEFAULT_LAM,
            group_name: ModelConfig::DEFAULT_GROUP_NAME.to_string(),
        }
    }
}

/// Options forwarded to the sampling engine.
#[derive(PartialEq, Debug, Clone)]
pub struct SamplerConfig {
    /// Number of kept draws per chain.
    pub draws: usize,
    /// Number of warmup (tuning) iterations per chain. They are discarded.
    pub tune: usize,
    pub chains: usize,
    /// Target acceptance probability of the step size adaptation.
    pub target_accept: f64,
    /// Maximum depth of the trajectory tree.
    pub max_treedepth: usize,
    /// Seed of the first chain. Chain `c` uses `seed + c`.
    /// If not provided, a seed is drawn at random and logged.
    pub random_seed: Option<u64>,
    /// Half-width of the uniform jitter applied to the starting point
    /// in unconstrained space.
    pub init_jitter: f64,
}

impl SamplerConfig {
    /// 5000 draws and a target acceptance of 0.98: the posterior of the hierarchical
    /// model is strongly correlated and lower targets diverge often.
    pub const DEFAULT: SamplerConfig = SamplerConfig {
        draws: 5000,
        tune: 1000,
        chains: 2,
        target_accept: 0.98,
        max_treedepth: 10,
        random_seed: None,
        init_jitter: 1.0,
    };

    pub fn validate(&self) -> EcoResult<()> {
        ensure!(
            self.draws >= 1,
            InvalidSamplerConfigSnafu {
                reason: "draws must be at least 1"
            }
        );
        ensure!(
            self.chains >= 1,
            InvalidSamplerConfigSnafu {
                reason: "chains must be at least 1"
            }
        );
        ensure!(
            self.target_accept > 0.0 && self.target_accept < 1.0,
            InvalidSamplerConfigSnafu {
                reason: format!(
                    "target_accept must be within (0, 1), got {}",
                    self.target_accept
                )
            }
        );
        ensure!(
            self.max_treedepth >= 1,
            InvalidSamplerConfigSnafu {
                reason: "max_treedepth must be at least 1"
            }
        );
        ensure!(
            self.init_jitter.is_finite() && self.init_jitter >= 0.0,
            InvalidSamplerConfigSnafu {
                reason: format!("init_jitter must be >= 0, got {}", self.init_jitter)
            }
        );
        Ok(())
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        SamplerConfig::DEFAULT
    }
}
