// Primitives for reading CSV files.

use crate::eco::{io_common::RawTable, *};

pub fn read_csv_table(path: &str) -> EcoCliResult<RawTable> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    read_records(rdr, path)
}

fn read_records<R: std::io::Read>(mut rdr: csv::Reader<R>, path: &str) -> EcoCliResult<RawTable> {
    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.to_string())
        .collect();
    debug!("read_csv_table: header: {:?}", header);

    let mut rows = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is on the first line.
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        // Blank lines are not records.
        let lineno = line.position().map(|p| p.line() as usize).unwrap_or(lineno);
        let row: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        if row.iter().all(|s| s.trim().is_empty()) {
            debug!("read_csv_table: skipping empty line {}", lineno);
            continue;
        }
        rows.push((lineno, row));
    }
    info!("Read {} rows from {:?}", rows.len(), path);
    Ok(RawTable { header, rows })
}
