//! Chain storage, the sampler interface and the multi-chain NUTS runner.
//!
//! Transitions and warmup adaptation are done by `nuts-rs`: each chain is a
//! diagonal-mass NUTS chain of that crate, driven one draw at a time.

use log::{debug, info, warn};
use nuts_rs::{Chain as _, CpuMath, DiagGradNutsSettings, Settings};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use snafu::prelude::*;

use crate::config::*;
use crate::posterior::{LogDensityModel, Posterior};

/// Number of random starting points tried before giving up on a chain.
pub const MAX_INIT_ATTEMPTS: usize = 10;

/// Post-warmup draws of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    /// Draws in the constrained (model) space, one vector per draw.
    pub draws_constrained: Vec<Vec<f64>>,
    pub divergences: Vec<bool>,
    /// Step size after adaptation.
    pub step_size: f64,
}

impl Chain {
    pub(crate) fn with_capacity(draws: usize) -> Chain {
        Chain {
            draws_constrained: Vec::with_capacity(draws),
            divergences: Vec::with_capacity(draws),
            step_size: 0.0,
        }
    }

    pub fn n_draws(&self) -> usize {
        self.draws_constrained.len()
    }

    pub fn n_divergent(&self) -> usize {
        self.divergences.iter().filter(|&&d| d).count()
    }
}

/// Output of a sampler: one [`Chain`] per chain, in chain order.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerResult {
    pub chains: Vec<Chain>,
    /// Names of the flat parameters, as reported by the model.
    pub param_names: Vec<String>,
    pub n_warmup: usize,
    pub n_samples: usize,
    /// Seed of the first chain.
    pub seed: u64,
}

impl SamplerResult {
    pub fn total_draws(&self) -> usize {
        self.chains.iter().map(|c| c.n_draws()).sum()
    }

    pub fn total_divergences(&self) -> usize {
        self.chains.iter().map(|c| c.n_divergent()).sum()
    }

    /// Draws of one flat parameter, split per chain.
    pub fn param_draws(&self, param_idx: usize) -> Vec<Vec<f64>> {
        self.chains
            .iter()
            .map(|c| c.draws_constrained.iter().map(|d| d[param_idx]).collect())
            .collect()
    }
}

/// A sampling engine that can draw from any [`LogDensityModel`].
pub trait Sampler {
    fn sample<M: LogDensityModel + Sync>(&self, model: &M) -> EcoResult<SamplerResult>;
}

/// No-U-Turn sampler of `nuts-rs`, with its windowed adaptation of the step
/// size and of a diagonal mass matrix. Chains run in parallel on the rayon
/// thread pool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NutsSampler {
    pub config: SamplerConfig,
}

impl NutsSampler {
    pub fn new(config: SamplerConfig) -> NutsSampler {
        NutsSampler { config }
    }

    fn engine_settings(&self, seed: u64) -> DiagGradNutsSettings {
        let mut settings = DiagGradNutsSettings::default();
        settings.num_tune = self.config.tune as u64;
        settings.num_draws = self.config.draws as u64;
        settings.maxdepth = self.config.max_treedepth as u64;
        settings.seed = seed;
        settings.adapt_options.dual_average_options.target_accept = self.config.target_accept;
        settings
    }
}

impl Sampler for NutsSampler {
    fn sample<M: LogDensityModel + Sync>(&self, model: &M) -> EcoResult<SamplerResult> {
        let config = &self.config;
        config.validate()?;

        let seed = match config.random_seed {
            Some(seed) => seed,
            None => {
                let seed: u64 = rand::thread_rng().gen();
                info!("No random seed provided, using {}", seed);
                seed
            }
        };
        info!(
            "Sampling {} chains: {} tuning and {} draws each (target_accept {}, seed {})",
            config.chains, config.tune, config.draws, config.target_accept, seed
        );

        let settings = self.engine_settings(seed);
        let chains: Vec<EcoResult<Chain>> = (0..config.chains)
            .into_par_iter()
            .map(|chain_id| -> EcoResult<Chain> {
                let chain_seed = seed.wrapping_add(chain_id as u64);
                let chain = sample_chain(model, config, &settings, chain_id, chain_seed)?;
                info!(
                    "chain {} finished: step size {:.4}, {} divergences",
                    chain_id,
                    chain.step_size,
                    chain.n_divergent()
                );
                Ok(chain)
            })
            .collect();
        let chains = chains.into_iter().collect::<EcoResult<Vec<Chain>>>()?;

        Ok(SamplerResult {
            chains,
            param_names: model.parameter_names(),
            n_warmup: config.tune,
            n_samples: config.draws,
            seed,
        })
    }
}

/// Starting point around the model's initial values.
///
/// The jitter is uniform in `[-init_jitter, init_jitter]` on each unconstrained
/// coordinate.
fn jittered_start<M: LogDensityModel + ?Sized>(
    posterior: &Posterior<'_, M>,
    init_jitter: f64,
    rng: &mut impl Rng,
) -> Vec<f64> {
    let z_init = posterior.to_unconstrained(&posterior.model().parameter_init());
    if init_jitter > 0.0 {
        z_init
            .iter()
            .map(|&z| z + rng.gen_range(-init_jitter..=init_jitter))
            .collect()
    } else {
        z_init
    }
}

/// Runs a single chain: initialization, then `tune + draws` engine iterations
/// of which the tuning ones are dropped.
fn sample_chain<M: LogDensityModel + ?Sized>(
    model: &M,
    config: &SamplerConfig,
    settings: &DiagGradNutsSettings,
    chain_id: usize,
    seed: u64,
) -> EcoResult<Chain> {
    let posterior = Posterior::new(model);
    let mut rng = StdRng::seed_from_u64(seed);

    // Starting points are drawn before the engine takes its own generator
    // from `rng`, so that both only depend on the seed.
    let starts: Vec<Vec<f64>> = (0..MAX_INIT_ATTEMPTS)
        .map(|_| jittered_start(&posterior, config.init_jitter, &mut rng))
        .collect();
    let math = CpuMath::new(Posterior::new(model));
    let mut engine = settings.new_chain(chain_id as u64, math, &mut rng);

    let mut initialized = false;
    for (attempt, z) in starts.iter().enumerate() {
        match engine.set_position(z) {
            Ok(()) => {
                initialized = true;
                break;
            }
            Err(e) => debug!(
                "chain {}: rejected starting point (attempt {}): {}",
                chain_id,
                attempt + 1,
                e
            ),
        }
    }
    ensure!(
        initialized,
        InitializationSnafu {
            chain: chain_id,
            attempts: MAX_INIT_ATTEMPTS,
        }
    );

    let mut chain = Chain::with_capacity(config.draws);
    for i in 0..(config.tune + config.draws) {
        let (position, progress) = engine.draw().map_err(|e| EcoError::Sampling {
            chain: chain_id,
            message: e.to_string(),
        })?;
        if i < config.tune {
            continue;
        }
        chain.draws_constrained.push(posterior.to_constrained(&position));
        chain.divergences.push(progress.divergence_info.is_some());
        chain.step_size = progress.potential_stats.step_size;
    }
    debug!("chain {}: adapted step size {}", chain_id, chain.step_size);

    let n_div = chain.n_divergent();
    if n_div > 0 {
        warn!(
            "chain {}: {} divergent transitions after tuning. Increase target_accept or reparameterize.",
            chain_id, n_div
        );
    }
    Ok(chain)
}
