//! From a table of precincts (census counts and election results) to posterior draws.

use std::fmt;
use std::str::FromStr;

use log::{info, warn};
use snafu::prelude::*;

use crate::builder::ModelBuilder;
use crate::chain::{NutsSampler, Sampler};
use crate::config::*;
use crate::model::EcologicalModel;
use crate::trace::Trace;

/// Party whose votes are the target group of the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Party {
    #[default]
    Democratic,
    Republican,
}

impl Party {
    /// Group name used for the nodes of the model.
    pub fn group_name(&self) -> &'static str {
        match self {
            Party::Democratic => "dem",
            Party::Republican => "rep",
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.group_name())
    }
}

impl FromStr for Party {
    type Err = EcoError;

    fn from_str(s: &str) -> Result<Party, EcoError> {
        match s.to_ascii_lowercase().as_str() {
            "dem" | "democratic" | "d" => Ok(Party::Democratic),
            "rep" | "republican" | "r" => Ok(Party::Republican),
            _ => InvalidTableSnafu {
                reason: format!("unknown party {:?}, expected dem or rep", s),
            }
            .fail(),
        }
    }
}

/// One row of the precinct table: the `Total` and `White Alone` census counts and
/// the `DEM` and `REP` vote counts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PrecinctRow {
    pub label: Option<String>,
    pub total: f64,
    pub white_alone: f64,
    pub dem: u64,
    pub rep: u64,
}

impl PrecinctRow {
    pub fn minority_fraction(&self) -> f64 {
        (self.total - self.white_alone) / self.total
    }

    pub fn voting_population(&self) -> u64 {
        self.dem + self.rep
    }

    pub fn votes_for(&self, party: Party) -> u64 {
        match party {
            Party::Democratic => self.dem,
            Party::Republican => self.rep,
        }
    }

    fn display_name(&self, index: usize) -> String {
        match &self.label {
            Some(label) => format!("{:?} (row {})", label, index),
            None => format!("row {}", index),
        }
    }
}

/// Options of an inference run that starts from a precinct table.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceConfig {
    pub party: Party,
    /// Label embedded in the names of the nodes. Defaults to the group name of the party.
    pub group_name: Option<String>,
    pub lam: f64,
    /// Drop the rows without population or without votes instead of failing on them.
    pub skip_empty_precincts: bool,
}

impl InferenceConfig {
    pub fn for_party(party: Party) -> InferenceConfig {
        InferenceConfig {
            party,
            ..InferenceConfig::default()
        }
    }

    pub fn group_name(&self) -> &str {
        self.group_name
            .as_deref()
            .unwrap_or_else(|| self.party.group_name())
    }

    pub fn model_config(&self) -> ModelConfig {
        ModelConfig {
            lam: self.lam,
            group_name: self.group_name().to_string(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        InferenceConfig {
            party: Party::default(),
            group_name: None,
            lam: ModelConfig::DEFAULT_LAM,
            skip_empty_precincts: false,
        }
    }
}

/// Model inputs derived from a precinct table.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedPrecincts {
    pub observations: PrecinctObservations,
    /// Index in the input table of each modeled precinct.
    pub kept_rows: Vec<usize>,
}

/// Derives the model inputs from the rows of a precinct table:
///
/// - `minority_fraction = (Total - White Alone) / Total`
/// - `voting_population = DEM + REP`
/// - `votes_for_group = DEM` (or `REP`)
///
/// Every row is kept, so that the builder rejects the rows without population
/// or without votes. With `skip_empty_precincts`, such rows are dropped with a
/// warning instead.
pub fn prepare_observations(
    rows: &[PrecinctRow],
    config: &InferenceConfig,
) -> EcoResult<PreparedPrecincts> {
    let mut observations = PrecinctObservations {
        votes_for_group: Vec::with_capacity(rows.len()),
        voting_population: Vec::with_capacity(rows.len()),
        minority_fraction: Vec::with_capacity(rows.len()),
    };
    let mut kept_rows = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        if config.skip_empty_precincts {
            if !(row.total > 0.0) {
                warn!(
                    "Skipping precinct {}: total population is {}",
                    row.display_name(idx),
                    row.total
                );
                continue;
            }
            if row.voting_population() == 0 {
                warn!("Skipping precinct {}: no votes cast", row.display_name(idx));
                continue;
            }
        }
        observations.votes_for_group.push(row.votes_for(config.party));
        observations.voting_population.push(row.voting_population());
        observations.minority_fraction.push(row.minority_fraction());
        kept_rows.push(idx);
    }

    let skipped = rows.len() - kept_rows.len();
    if skipped > 0 {
        info!("Skipped {} of {} precincts", skipped, rows.len());
        ensure!(
            !kept_rows.is_empty(),
            InvalidTableSnafu {
                reason: format!("none of the {} precincts can be modeled", rows.len())
            }
        );
    }
    Ok(PreparedPrecincts {
        observations,
        kept_rows,
    })
}

/// Everything produced by one inference run.
#[derive(Debug, Clone)]
pub struct InferenceRun {
    pub model: EcologicalModel,
    pub kept_rows: Vec<usize>,
    pub trace: Trace,
}

/// Builds the model from a precinct table and samples it with the given sampler.
pub fn run_inference<S: Sampler>(
    rows: &[PrecinctRow],
    config: &InferenceConfig,
    sampler: &S,
) -> EcoResult<InferenceRun> {
    let prepared = prepare_observations(rows, config)?;
    let model = ModelBuilder::new(config.model_config())
        .observations(prepared.observations)?
        .build()?;
    info!(
        "Running ecological inference on {} precincts for {} votes (group {:?})",
        model.n_precincts(),
        config.party,
        model.group_name()
    );
    let trace = model.sample(sampler)?;
    Ok(InferenceRun {
        model,
        kept_rows: prepared.kept_rows,
        trace,
    })
}

/// Samples the ecological inference model of a precinct table with the NUTS sampler.
///
/// [`SamplerConfig::DEFAULT`] draws 5000 samples per chain with a target acceptance of 0.98.
pub fn run_ecological_inference(
    rows: &[PrecinctRow],
    config: &InferenceConfig,
    sampler_config: SamplerConfig,
) -> EcoResult<Trace> {
    let sampler = NutsSampler::new(sampler_config);
    run_inference(rows, config, &sampler).map(|run| run.trace)
}
