// Primitives shared by the CSV and Excel readers.

use crate::eco::*;

/// Names of the columns of the precinct table.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ColumnNames {
    pub total: String,
    pub white_alone: String,
    pub dem: String,
    pub rep: String,
    pub label: Option<String>,
    pub district: Option<String>,
}

impl Default for ColumnNames {
    fn default() -> Self {
        ColumnNames {
            total: "Total".to_string(),
            white_alone: "White Alone".to_string(),
            dem: "DEM".to_string(),
            rep: "REP".to_string(),
            label: None,
            district: None,
        }
    }
}

/// A table read from a file, all the cells as strings.
/// Each row carries its line number in the file (the header is line 1).
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RawTable {
    pub header: Vec<String>,
    pub rows: Vec<(usize, Vec<String>)>,
}

pub fn find_column(header: &[String], name: &str, path: &str) -> EcoCliResult<usize> {
    header
        .iter()
        .position(|h| h.trim() == name)
        .context(MissingColumnSnafu {
            column: name,
            path,
        })
}

fn cell(row: &[String], idx: usize) -> &str {
    row.get(idx).map(|s| s.trim()).unwrap_or("")
}

/// A vote count. Spreadsheets often store counts as floats: `123.0` is accepted.
/// An empty cell counts as zero votes.
pub fn parse_count(s: &str, column: &str, lineno: usize) -> EcoCliResult<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0);
    }
    if let Ok(x) = s.parse::<u64>() {
        return Ok(x);
    }
    match s.parse::<f64>() {
        Ok(x) if x >= 0.0 && x.fract() == 0.0 && x <= u64::MAX as f64 => Ok(x as u64),
        _ => InvalidCellSnafu {
            column,
            lineno,
            value: s,
        }
        .fail(),
    }
}

/// A population count. Census estimates may be fractional.
/// An empty cell counts as an empty precinct.
pub fn parse_population(s: &str, column: &str, lineno: usize) -> EcoCliResult<f64> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(0.0);
    }
    match s.parse::<f64>() {
        Ok(x) if x.is_finite() && x >= 0.0 => Ok(x),
        _ => InvalidCellSnafu {
            column,
            lineno,
            value: s,
        }
        .fail(),
    }
}

/// Turns the rows of the table into precincts, keeping only the rows of the
/// selected district, if any.
pub fn rows_from_table(
    table: &RawTable,
    columns: &ColumnNames,
    district: Option<&str>,
    path: &str,
) -> EcoCliResult<Vec<PrecinctRow>> {
    let total_idx = find_column(&table.header, &columns.total, path)?;
    let white_idx = find_column(&table.header, &columns.white_alone, path)?;
    let dem_idx = find_column(&table.header, &columns.dem, path)?;
    let rep_idx = find_column(&table.header, &columns.rep, path)?;
    let label_idx = match &columns.label {
        Some(name) => Some(find_column(&table.header, name, path)?),
        None => None,
    };
    let district_idx = match (district, &columns.district) {
        (Some(_), Some(name)) => Some(find_column(&table.header, name, path)?),
        (Some(d), None) => whatever!(
            "district {} was selected but no district column is configured",
            d
        ),
        (None, _) => None,
    };
    debug!(
        "rows_from_table: total: {} white: {} dem: {} rep: {} label: {:?} district: {:?}",
        total_idx, white_idx, dem_idx, rep_idx, label_idx, district_idx
    );

    let mut res: Vec<PrecinctRow> = Vec::new();
    for (lineno, row) in table.rows.iter() {
        if let (Some(d), Some(idx)) = (district, district_idx) {
            if cell(row, idx) != d.trim() {
                continue;
            }
        }
        let lineno = *lineno;
        let precinct = PrecinctRow {
            label: label_idx.map(|idx| cell(row, idx).to_string()),
            total: parse_population(cell(row, total_idx), &columns.total, lineno)?,
            white_alone: parse_population(cell(row, white_idx), &columns.white_alone, lineno)?,
            dem: parse_count(cell(row, dem_idx), &columns.dem, lineno)?,
            rep: parse_count(cell(row, rep_idx), &columns.rep, lineno)?,
        };
        debug!("rows_from_table: lineno: {} precinct: {:?}", lineno, precinct);
        res.push(precinct);
    }

    if let Some(d) = district {
        ensure!(!res.is_empty(), EmptyDistrictSnafu { district: d });
        info!("Selected {} precincts in district {}", res.len(), d);
    }
    Ok(res)
}
