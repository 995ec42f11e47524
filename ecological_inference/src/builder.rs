use log::debug;
use snafu::prelude::*;

pub use crate::config::*;
use crate::model::{EcologicalModel, Node, NodeKind, NodeNames};

/// Builds an [`EcologicalModel`] step by step.
///
/// The builder is consumed by every step, so a model is always built from a
/// complete and validated set of observations.
///
/// ```
/// use ecological_inference::builder::ModelBuilder;
/// use ecological_inference::{EcoError, ModelConfig};
///
/// let model = ModelBuilder::new(ModelConfig::default())
///     .group_name("rep")
///     .lam(0.5)
///     .precincts(&[40, 55], &[100, 90], &[0.25, 0.6])?
///     .build()?;
///
/// assert_eq!(model.observed_name(), "votes_for_rep");
/// # Ok::<(), EcoError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ModelBuilder {
    pub(crate) _config: ModelConfig,
    pub(crate) _observations: Option<PrecinctObservations>,
}

impl ModelBuilder {
    pub fn new(config: ModelConfig) -> ModelBuilder {
        ModelBuilder {
            _config: config,
            _observations: None,
        }
    }

    pub fn group_name(self, group_name: &str) -> ModelBuilder {
        ModelBuilder {
            _config: ModelConfig {
                group_name: group_name.to_string(),
                ..self._config
            },
            ..self
        }
    }

    pub fn lam(self, lam: f64) -> ModelBuilder {
        ModelBuilder {
            _config: ModelConfig { lam, ..self._config },
            ..self
        }
    }

    /// Sets the observed data, one entry per precinct in each slice.
    ///
    /// Fails when the three slices do not have the same length.
    pub fn precincts(
        self,
        votes_for_group: &[u64],
        voting_population: &[u64],
        minority_fraction: &[f64],
    ) -> Result<ModelBuilder, EcoError> {
        self.observations(PrecinctObservations {
            votes_for_group: votes_for_group.to_vec(),
            voting_population: voting_population.to_vec(),
            minority_fraction: minority_fraction.to_vec(),
        })
    }

    pub fn observations(self, observations: PrecinctObservations) -> Result<ModelBuilder, EcoError> {
        let (votes, population, fraction) = (
            observations.votes_for_group.len(),
            observations.voting_population.len(),
            observations.minority_fraction.len(),
        );
        ensure!(
            votes == population && population == fraction,
            LengthMismatchSnafu {
                votes,
                population,
                fraction
            }
        );
        Ok(ModelBuilder {
            _observations: Some(observations),
            ..self
        })
    }

    /// Validates the data and declares the nodes: hyperpriors, latent rates,
    /// the deterministic estimate and the likelihood.
    pub fn build(self) -> Result<EcologicalModel, EcoError> {
        let config = self._config;
        ensure!(!config.group_name.is_empty(), EmptyGroupNameSnafu {});
        ensure!(
            config.lam.is_finite() && config.lam > 0.0,
            InvalidHyperparameterSnafu { lam: config.lam }
        );
        let observations = match self._observations {
            Some(obs) => obs,
            None => return NoPrecinctsSnafu {}.fail(),
        };
        validate_observations(&observations)?;

        let n = observations.n_precincts();
        let names = NodeNames::for_group(&config.group_name);
        let mut nodes: Vec<Node> = Vec::new();

        // 1. Hyperpriors
        for name in [&names.alpha, &names.beta] {
            nodes.push(Node {
                name: name.clone(),
                kind: NodeKind::Hyperprior,
                distribution: format!("Exponential({})", config.lam),
                width: 2,
            });
        }

        // 2. Latent rates
        for (name, g) in [(&names.pct_minority, 0), (&names.pct_majority, 1)] {
            nodes.push(Node {
                name: name.clone(),
                kind: NodeKind::Latent,
                distribution: format!("Beta({}[{}], {}[{}])", names.alpha, g, names.beta, g),
                width: n,
            });
        }

        // 3. Deterministic estimate
        nodes.push(Node {
            name: names.est.clone(),
            kind: NodeKind::Deterministic,
            distribution: format!(
                "minority_fraction * {} + (1 - minority_fraction) * {}",
                names.pct_minority, names.pct_majority
            ),
            width: n,
        });

        // 4. Likelihood
        nodes.push(Node {
            name: names.observed.clone(),
            kind: NodeKind::Observed,
            distribution: format!("Binomial(voting_population, {})", names.est),
            width: n,
        });

        debug!(
            "build: group {:?}, lam {}, {} precincts, nodes {:?}",
            config.group_name,
            config.lam,
            n,
            nodes.iter().map(|n| n.name.as_str()).collect::<Vec<&str>>()
        );
        Ok(EcologicalModel::new(config, observations, nodes))
    }
}

fn validate_observations(obs: &PrecinctObservations) -> Result<(), EcoError> {
    ensure!(obs.n_precincts() > 0, NoPrecinctsSnafu {});
    for (precinct, ((&votes, &population), &fraction)) in obs
        .votes_for_group
        .iter()
        .zip(obs.voting_population.iter())
        .zip(obs.minority_fraction.iter())
        .enumerate()
    {
        ensure!(population > 0, EmptyPrecinctSnafu { precinct });
        ensure!(
            votes <= population,
            VotesExceedPopulationSnafu {
                precinct,
                votes,
                population
            }
        );
        ensure!(
            fraction.is_finite() && (0.0..=1.0).contains(&fraction),
            InvalidFractionSnafu {
                precinct,
                value: fraction
            }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_are_declared_in_order() {
        let model = ModelBuilder::new(ModelConfig::default())
            .precincts(&[50], &[100], &[0.3])
            .unwrap()
            .build()
            .unwrap();
        let kinds: Vec<NodeKind> = model.nodes().iter().map(|n| n.kind).collect();
        assert_eq!(
            kinds,
            vec![
                NodeKind::Hyperprior,
                NodeKind::Hyperprior,
                NodeKind::Latent,
                NodeKind::Latent,
                NodeKind::Deterministic,
                NodeKind::Observed
            ]
        );
        let alpha = model.node("alpha_dem").unwrap();
        assert_eq!(alpha.width, 2);
        assert_eq!(alpha.distribution, "Exponential(0.5)");
        assert_eq!(model.node("est_voting_dem").unwrap().width, 1);
        assert!(model.node("alpha_rep").is_none());
    }

    #[test]
    fn length_mismatch_is_reported_with_all_lengths() {
        let err = ModelBuilder::new(ModelConfig::default())
            .precincts(&[1, 2], &[10, 10, 10], &[0.5])
            .unwrap_err();
        assert_eq!(
            err,
            EcoError::LengthMismatch {
                votes: 2,
                population: 3,
                fraction: 1
            }
        );
    }

    #[test]
    fn invalid_data_is_rejected() {
        let build = |votes: &[u64], pop: &[u64], frac: &[f64]| {
            ModelBuilder::new(ModelConfig::default())
                .precincts(votes, pop, frac)
                .and_then(|b| b.build())
        };
        assert_eq!(build(&[], &[], &[]).unwrap_err(), EcoError::NoPrecincts {});
        assert_eq!(
            build(&[5, 11], &[10, 10], &[0.1, 0.2]).unwrap_err(),
            EcoError::VotesExceedPopulation {
                precinct: 1,
                votes: 11,
                population: 10
            }
        );
        assert_eq!(
            build(&[0], &[0], &[0.1]).unwrap_err(),
            EcoError::EmptyPrecinct { precinct: 0 }
        );
        assert!(matches!(
            build(&[1], &[2], &[1.5]).unwrap_err(),
            EcoError::InvalidFraction { precinct: 0, .. }
        ));
        assert!(matches!(
            build(&[1], &[2], &[f64::NAN]).unwrap_err(),
            EcoError::InvalidFraction { .. }
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let err = ModelBuilder::new(ModelConfig::default())
            .lam(-1.0)
            .precincts(&[1], &[2], &[0.5])
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err, EcoError::InvalidHyperparameter { lam: -1.0 });

        let err = ModelBuilder::new(ModelConfig::default())
            .group_name("")
            .precincts(&[1], &[2], &[0.5])
            .unwrap()
            .build()
            .unwrap_err();
        assert_eq!(err, EcoError::EmptyGroupName {});

        let err = ModelBuilder::new(ModelConfig::default()).build().unwrap_err();
        assert_eq!(err, EcoError::NoPrecincts {});
    }
}
