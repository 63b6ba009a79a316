use std::path::Path;

use calamine::{open_workbook, DataType, Reader, Xlsx};

use crate::survey::{io_common::header_names, *};

/// Reads an .xlsx export: the named worksheet, or the first one.
pub fn read_excel_table(path: &Path, worksheet: Option<&str>) -> IngestResult<RawTable> {
    let p = path.display().to_string();
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path: p.clone() })?;
    let wrange = match worksheet {
        Some(name) => workbook.worksheet_range(name),
        None => workbook.worksheet_range_at(0),
    }
    .context(MissingWorksheetSnafu {
        path: p.clone(),
        sheet: worksheet.unwrap_or("#1"),
    })?
    .context(OpeningExcelSnafu { path: p.clone() })?;

    let mut iter = wrange.rows();
    let header = iter.next().context(MissingHeaderSnafu { path: p.clone() })?;
    let headers = header_names(header.iter().map(read_cell).collect());
    debug!("read_excel_table: {}: header: {:?}", p, headers);

    let rows: Vec<Vec<Cell>> = iter
        .map(|row| row.iter().map(read_cell).collect())
        .collect();
    Ok(RawTable::from_source(&p, headers, rows))
}

fn read_cell(cell: &DataType) -> Cell {
    match cell {
        DataType::Empty => None,
        DataType::String(s) if s.is_empty() => None,
        DataType::String(s) => Some(s.clone()),
        // Whole numbers print without a fractional part.
        DataType::Float(f) => Some(f.to_string()),
        DataType::Int(i) => Some(i.to_string()),
        DataType::Bool(b) => Some(b.to_string()),
        DataType::DateTime(d) => Some(d.to_string()),
        DataType::Error(e) => {
            debug!("read_cell: cell error {:?}", e);
            None
        }
        #[allow(unreachable_patterns)]
        _ => None,
    }
}
