// Primitives for reading Excel workbooks.

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::eco::{io_common::RawTable, *};

pub fn read_excel_table(path: &str, worksheet_name_o: Option<&str>) -> EcoCliResult<RawTable> {
    let wrange = get_range(path, worksheet_name_o)?;

    // Rows of the worksheet, numbered as in the spreadsheet.
    let first_lineno = wrange.start().map(|(r, _)| r as usize + 1).unwrap_or(1);
    let mut iter = wrange.rows();
    let header: Vec<String> = iter
        .next()
        .context(EmptyExcelSnafu {})?
        .iter()
        .map(read_cell)
        .collect();
    debug!("read_excel_table: header: {:?}", header);

    let mut rows = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = first_lineno + idx + 1;
        let cells: Vec<String> = row.iter().map(read_cell).collect();
        if cells.iter().all(|s| s.is_empty()) {
            continue;
        }
        rows.push((lineno, cells));
    }
    info!("Read {} rows from {:?}", rows.len(), path);
    Ok(RawTable { header, rows })
}

fn read_cell(cell: &DataType) -> String {
    match cell {
        DataType::Empty => String::new(),
        DataType::String(s) => s.trim().to_string(),
        DataType::Int(i) => i.to_string(),
        DataType::Float(f) => f.to_string(),
        DataType::Bool(b) => b.to_string(),
        // Left for the column parsers to reject.
        x => format!("{:?}", x),
    }
}

fn get_range(path: &str, worksheet_name_o: Option<&str>) -> EcoCliResult<calamine::Range<DataType>> {
    debug!(
        "read_excel_table: path: {:?} worksheet: {:?}",
        path, worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    match worksheet_name_o {
        // A worksheet name was provided, use it.
        Some(worksheet_name) => workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                name: worksheet_name,
            })?
            .context(OpeningExcelSnafu { path }),
        None => workbook
            .worksheet_range_at(0)
            .context(EmptyExcelSnafu {})?
            .context(OpeningExcelSnafu { path }),
    }
}
