/*!
Bayesian ecological inference for precinct-level bloc voting.

The crate implements the 2x2 hierarchical model of King (1997): from the share
of the vote a party got in each precinct and the demographic makeup of the
precinct, it estimates how the minority and the majority groups voted.

```no_run
use ecological_inference::*;

let rows = vec![
    PrecinctRow { label: None, total: 1200.0, white_alone: 700.0, dem: 420, rep: 310 },
    PrecinctRow { label: None, total: 800.0, white_alone: 650.0, dem: 180, rep: 340 },
];
let trace = run_ecological_inference(
    &rows,
    &InferenceConfig::for_party(Party::Democratic),
    SamplerConfig::DEFAULT,
)?;
let minority = trace.mean("pct_minority_voting_dem").unwrap();
println!("{:?}", minority);
# Ok::<(), EcoError>(())
```

See the [manual] for the model and the sampler settings.
*/

mod config;

pub mod builder;
pub mod chain;
pub mod diagnostics;
pub mod inference;
pub mod manual;
pub mod model;
pub mod posterior;
pub mod trace;
pub mod transforms;

pub use crate::builder::ModelBuilder;
pub use crate::chain::{Chain, NutsSampler, Sampler, SamplerResult};
pub use crate::config::*;
pub use crate::inference::{
    prepare_observations, run_ecological_inference, run_inference, InferenceConfig, InferenceRun,
    Party,
    PrecinctRow, PreparedPrecincts,
};
pub use crate::model::{EcologicalModel, Node, NodeKind, NodeNames};
pub use crate::posterior::{DensityError, LogDensityModel};
pub use crate::trace::{ChainStats, ElementSummary, Trace, VariableDraws};
