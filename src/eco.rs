use log::{debug, info};

use ecological_inference::*;
use snafu::{prelude::*, Snafu};

use std::path::Path;

use crate::args::Args;
use crate::eco::config_reader::*;
use crate::eco::io_common::{rows_from_table, ColumnNames, RawTable};

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod summary;

/// Output path that sends the summary to the standard output.
pub const STDOUT: &str = "stdout";

#[derive(Debug, Snafu)]
pub enum EcoCliError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the JSON configuration"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("The workbook has no worksheet"))]
    EmptyExcel {},
    #[snafu(display("The workbook has no worksheet named {name:?}"))]
    MissingWorksheet { name: String },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Column {column:?} not found in {path}"))]
    MissingColumn { column: String, path: String },
    #[snafu(display("Line {lineno}: column {column:?} holds {value:?}, expected a non-negative count"))]
    InvalidCell {
        column: String,
        lineno: usize,
        value: String,
    },
    #[snafu(display("No precinct found in district {district}"))]
    EmptyDistrict { district: String },
    #[snafu(display("No input file: use --input or provide a configuration file"))]
    MissingInput {},
    #[snafu(display("Inference failed: {source}"))]
    Inference { source: EcoError },
    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing the trace"))]
    CsvWrite { source: csv::Error },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type EcoCliResult<T> = Result<T, EcoCliError>;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum InputProvider {
    Csv,
    Excel,
}

impl InputProvider {
    fn parse(provider: &str) -> EcoCliResult<InputProvider> {
        match provider.to_ascii_lowercase().as_str() {
            "csv" => Ok(InputProvider::Csv),
            "excel" | "xlsx" => Ok(InputProvider::Excel),
            _ => whatever!("unknown input provider: {}", provider),
        }
    }

    fn from_extension(path: &str) -> InputProvider {
        match Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
        {
            Some(e) if e == "xlsx" || e == "xlsm" => InputProvider::Excel,
            _ => InputProvider::Csv,
        }
    }
}

/// Everything needed for one run, once the configuration file and the
/// command line have been merged.
#[derive(PartialEq, Debug, Clone)]
pub struct RunSettings {
    pub input_path: String,
    pub provider: InputProvider,
    pub excel_worksheet_name: Option<String>,
    pub columns: ColumnNames,
    pub district: Option<String>,
    pub inference: InferenceConfig,
    pub sampler: SamplerConfig,
    /// `stdout`, a file path, or nothing.
    pub summary_path: Option<String>,
    pub trace_path: Option<String>,
}

// Empty strings disable an output.
fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|x| !x.trim().is_empty())
}

pub fn resolve_settings(args: &Args) -> EcoCliResult<RunSettings> {
    let config_o = match &args.config {
        Some(p) => Some(read_config(p)?),
        None => None,
    };
    let config_path = args.config.clone().unwrap_or_default();
    let in_config_dir = |p: &String| {
        if p == STDOUT {
            p.clone()
        } else {
            resolve_path(&config_path, p)
        }
    };

    let input = config_o.as_ref().map(|c| &c.input);
    let model_settings = config_o
        .as_ref()
        .and_then(|c| c.model.clone())
        .unwrap_or_default();
    let sampler_settings = config_o
        .as_ref()
        .and_then(|c| c.sampler.clone())
        .unwrap_or_default();
    let output_settings = config_o
        .as_ref()
        .and_then(|c| c.output_settings.clone())
        .unwrap_or_default();

    let input_path = match (&args.input, input) {
        (Some(p), _) => p.clone(),
        (None, Some(source)) => in_config_dir(&source.file_path),
        (None, None) => return MissingInputSnafu {}.fail(),
    };
    let provider = match args
        .input_type
        .clone()
        .or_else(|| input.and_then(|s| s.provider.clone()))
    {
        Some(p) => InputProvider::parse(&p)?,
        None => InputProvider::from_extension(&input_path),
    };
    let columns = input.map(|s| s.column_names()).unwrap_or_default();

    let party: Party = match args.party.clone().or(model_settings.party) {
        Some(p) => p.parse::<Party>().context(InferenceSnafu {})?,
        None => Party::default(),
    };
    let inference = InferenceConfig {
        party,
        group_name: args.group_name.clone().or(model_settings.group_name),
        lam: args
            .lam
            .or(model_settings.lam)
            .unwrap_or(ModelConfig::DEFAULT_LAM),
        skip_empty_precincts: args.skip_empty_precincts
            || input
                .and_then(|s| s.skip_empty_precincts)
                .unwrap_or(false),
    };

    let base = sampler_settings.apply(SamplerConfig::DEFAULT);
    let sampler = SamplerConfig {
        draws: args.draws.unwrap_or(base.draws),
        tune: args.tune.unwrap_or(base.tune),
        chains: args.chains.unwrap_or(base.chains),
        target_accept: args.target_accept.unwrap_or(base.target_accept),
        random_seed: args.seed.or(base.random_seed),
        ..base
    };

    let summary_path = match &args.out {
        Some(p) => non_empty(Some(p.clone())),
        None => match output_settings.summary_path {
            Some(p) => non_empty(Some(p)).map(|p| in_config_dir(&p)),
            None => Some(STDOUT.to_string()),
        },
    };
    let trace_path = match &args.trace_out {
        Some(p) => non_empty(Some(p.clone())),
        None => non_empty(output_settings.trace_path).map(|p| in_config_dir(&p)),
    };

    Ok(RunSettings {
        input_path,
        provider,
        excel_worksheet_name: args
            .excel_worksheet_name
            .clone()
            .or_else(|| input.and_then(|s| s.excel_worksheet_name.clone())),
        columns,
        district: non_empty(
            args.district
                .clone()
                .or_else(|| input.and_then(|s| s.district.clone())),
        ),
        inference,
        sampler,
        summary_path,
        trace_path,
    })
}

pub fn read_precinct_rows(settings: &RunSettings) -> EcoCliResult<Vec<PrecinctRow>> {
    info!(
        "Attempting to read precinct file {:?} ({:?})",
        settings.input_path, settings.provider
    );
    let table: RawTable = match settings.provider {
        InputProvider::Csv => io_csv::read_csv_table(&settings.input_path)?,
        InputProvider::Excel => io_excel::read_excel_table(
            &settings.input_path,
            settings.excel_worksheet_name.as_deref(),
        )?,
    };
    rows_from_table(
        &table,
        &settings.columns,
        settings.district.as_deref(),
        &settings.input_path,
    )
}

pub fn run(args: &Args) -> EcoCliResult<()> {
    let settings = resolve_settings(args)?;
    info!("settings: {:?}", settings);

    let rows = read_precinct_rows(&settings)?;
    debug!("rows: {:?}", rows);

    let sampler = NutsSampler::new(settings.sampler.clone());
    let run = run_inference(&rows, &settings.inference, &sampler).context(InferenceSnafu {})?;

    if let Some(path) = &settings.summary_path {
        let js = summary::build_summary_js(&settings, &rows, &run);
        summary::write_summary(&js, path)?;
    }
    if let Some(path) = &settings.trace_path {
        summary::write_trace_csv(&run.trace, path)?;
    }
    Ok(())
}
