use std::fs;
use std::path::Path;

use crate::eco::*;

use serde::{Deserialize, Serialize};

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InputSource {
    pub provider: Option<String>,
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "excelWorksheetName")]
    pub excel_worksheet_name: Option<String>,
    #[serde(rename = "totalColumn")]
    pub total_column: Option<String>,
    #[serde(rename = "whiteAloneColumn")]
    pub white_alone_column: Option<String>,
    #[serde(rename = "demColumn")]
    pub dem_column: Option<String>,
    #[serde(rename = "repColumn")]
    pub rep_column: Option<String>,
    #[serde(rename = "labelColumn")]
    pub label_column: Option<String>,
    #[serde(rename = "districtColumn")]
    pub district_column: Option<String>,
    /// Value of the district column to keep.
    pub district: Option<String>,
    #[serde(rename = "skipEmptyPrecincts")]
    pub skip_empty_precincts: Option<bool>,
}

impl InputSource {
    /// The column names, falling back to the usual census and election headers.
    pub fn column_names(&self) -> ColumnNames {
        let default = ColumnNames::default();
        ColumnNames {
            total: self.total_column.clone().unwrap_or(default.total),
            white_alone: self.white_alone_column.clone().unwrap_or(default.white_alone),
            dem: self.dem_column.clone().unwrap_or(default.dem),
            rep: self.rep_column.clone().unwrap_or(default.rep),
            label: self.label_column.clone().or(default.label),
            district: self.district_column.clone().or(default.district),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    pub lam: Option<f64>,
    #[serde(rename = "groupName")]
    pub group_name: Option<String>,
    pub party: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct SamplerSettings {
    pub draws: Option<usize>,
    pub tune: Option<usize>,
    pub chains: Option<usize>,
    #[serde(rename = "targetAccept")]
    pub target_accept: Option<f64>,
    #[serde(rename = "maxTreedepth")]
    pub max_treedepth: Option<usize>,
    #[serde(rename = "randomSeed")]
    pub random_seed: Option<u64>,
    #[serde(rename = "initJitter")]
    pub init_jitter: Option<f64>,
}

impl SamplerSettings {
    /// Overlays the values set in the file on top of the given configuration.
    pub fn apply(&self, base: SamplerConfig) -> SamplerConfig {
        SamplerConfig {
            draws: self.draws.unwrap_or(base.draws),
            tune: self.tune.unwrap_or(base.tune),
            chains: self.chains.unwrap_or(base.chains),
            target_accept: self.target_accept.unwrap_or(base.target_accept),
            max_treedepth: self.max_treedepth.unwrap_or(base.max_treedepth),
            random_seed: self.random_seed.or(base.random_seed),
            init_jitter: self.init_jitter.unwrap_or(base.init_jitter),
        }
    }
}

#[derive(PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
    #[serde(rename = "tracePath")]
    pub trace_path: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct EcoConfig {
    pub input: InputSource,
    pub model: Option<ModelSettings>,
    pub sampler: Option<SamplerSettings>,
    #[serde(rename = "outputSettings")]
    pub output_settings: Option<OutputSettings>,
}

pub fn read_config(path: &str) -> EcoCliResult<EcoConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: EcoConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
    debug!("read_config: {:?}", config);
    Ok(config)
}

/// Paths in the configuration file are relative to the directory of the file.
pub fn resolve_path(config_path: &str, file_path: &str) -> String {
    let p = Path::new(file_path);
    if p.is_absolute() {
        return file_path.to_string();
    }
    match Path::new(config_path).parent() {
        Some(root) => root.join(p).to_string_lossy().to_string(),
        None => file_path.to_string(),
    }
}
