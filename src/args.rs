use clap::Parser;

/// Ecological inference of bloc voting from precinct-level election results and census data.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON file describing the input data, the model and the sampler.
    /// For more information about the file format, read the manual of the ecological_inference crate.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (file path) The precinct table. It needs the columns 'Total', 'White Alone', 'DEM' and 'REP'.
    /// Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub input: Option<String>,

    /// (csv or excel, default from the file extension) The type of the input.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// When using an Excel file, indicates the name of the worksheet to use (default: the first one).
    #[clap(long, value_parser)]
    pub excel_worksheet_name: Option<String>,

    /// (optional) Only use the precincts of this district. Requires a district column.
    #[clap(short, long, value_parser)]
    pub district: Option<String>,

    /// If passed as an argument, precincts without population or without votes are dropped
    /// with a warning instead of stopping the program.
    #[clap(long, takes_value = false)]
    pub skip_empty_precincts: bool,

    /// (dem or rep, default dem) The party whose votes are modeled.
    #[clap(short, long, value_parser)]
    pub party: Option<String>,

    /// (default: the party) Label added to the names of the variables of the model.
    #[clap(long, value_parser)]
    pub group_name: Option<String>,

    /// (default 0.5) Rate of the exponential priors on the shapes of the Beta distributions.
    #[clap(long, value_parser)]
    pub lam: Option<f64>,

    /// (default 5000) Number of draws per chain.
    #[clap(long, value_parser)]
    pub draws: Option<usize>,

    /// (default 1000) Number of tuning iterations per chain.
    #[clap(long, value_parser)]
    pub tune: Option<usize>,

    /// (default 2) Number of chains.
    #[clap(long, value_parser)]
    pub chains: Option<usize>,

    /// (default 0.98) Target acceptance probability of the sampler.
    #[clap(long, value_parser)]
    pub target_accept: Option<f64>,

    /// (optional) Random seed, for reproducible results.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    /// (file path, 'stdout' or empty) If specified, the summary of the posterior will be written in JSON format to the given
    /// location. Setting this option overrides the path that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path or empty) If specified, all the draws will be written in CSV format to the given location.
    #[clap(long, value_parser)]
    pub trace_out: Option<String>,

    // Other arguments
    /// If passed as an argument, will turn on debug logging.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
