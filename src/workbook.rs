use calamine::{open_workbook_auto_from_rs, Data, ExcelDateTime, Reader};
use chrono::NaiveTime;
use rust_xlsxwriter::{Format, Workbook};
use std::fs;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

use crate::constants::CATEGORY_SHEET_HEADER;
use crate::error::{CallSheetsError, Result};
use crate::pipeline::call_log::CategoryTables;
use crate::table::{Cell, Sheet, Table};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Decode every worksheet of an `.xlsx`/`.xls`/`.ods` workbook.
///
/// The first row of each sheet is the header row.
pub fn read_workbook(bytes: Vec<u8>) -> Result<Vec<Sheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();

        let mut table = match rows.next() {
            Some(header) => Table::new(header.iter().map(|c| cell_from_data(c).to_text().trim().to_string()).collect()),
            None => Table::default(),
        };
        for row in rows {
            table.push_row(row.iter().map(cell_from_data).collect());
        }

        debug!(sheet = %name, rows = table.len(), "Worksheet decoded");
        sheets.push(Sheet::new(name, table));
    }

    Ok(sheets)
}

/// Decode a delimited text table; the first record is the header row.
pub fn read_csv(bytes: &[u8], delimiter: u8) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').to_string())
        .collect();
    let mut table = Table::new(headers);

    for record in reader.records() {
        let record = record?;
        table.push_row(record.iter().map(Cell::from).collect());
    }

    Ok(table)
}

/// Read a flat table from disk: delimited text, or the first sheet of a workbook.
///
/// `.tsv` files are always tab separated; `delimiter` applies to `.csv` and `.txt`.
pub fn read_table_file(path: &Path, delimiter: u8) -> Result<Sheet> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());

    match extension_of(path).as_deref() {
        Some("csv") | Some("txt") => {
            let bytes = fs::read(path)?;
            Ok(Sheet::new(name, read_csv(&bytes, delimiter)?))
        }
        Some("tsv") => {
            let bytes = fs::read(path)?;
            Ok(Sheet::new(name, read_csv(&bytes, b'\t')?))
        }
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => {
            let sheets = read_workbook(fs::read(path)?)?;
            let first = sheets
                .into_iter()
                .next()
                .ok_or_else(|| CallSheetsError::UnsupportedInput(format!("{} has no worksheets", name)))?;
            Ok(Sheet::new(name, first.table))
        }
        _ => Err(CallSheetsError::UnsupportedInput(format!(
            "{} (expected .csv, .tsv, .xlsx, .xls or .ods)",
            path.display()
        ))),
    }
}

pub fn read_workbook_file(path: &Path) -> Result<Vec<Sheet>> {
    match extension_of(path).as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("ods") => read_workbook(fs::read(path)?),
        _ => Err(CallSheetsError::UnsupportedInput(format!(
            "{} (expected .xlsx, .xls or .ods)",
            path.display()
        ))),
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

/// Encode one worksheet per category with a bold `From, PraFecha, Action Result` header.
pub fn write_category_workbook(tables: &CategoryTables) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for (category, rows) in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(category)?;

        for (col, title) in CATEGORY_SHEET_HEADER.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, *title, &header_format)?;
        }
        for (i, row) in rows.iter().enumerate() {
            let r = (i + 1) as u32;
            worksheet.write_string(r, 0, row.from.as_str())?;
            worksheet.write_string(r, 1, row.normalized_timestamp.as_str())?;
            worksheet.write_string(r, 2, row.action_result.as_str())?;
        }
    }

    // An xlsx package needs at least one sheet
    if tables.is_empty() {
        workbook.add_worksheet();
    }

    Ok(workbook.save_to_buffer()?)
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if s.is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => cell_from_excel_datetime(dt),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

fn cell_from_excel_datetime(dt: &ExcelDateTime) -> Cell {
    let serial = dt.as_f64();
    // Serials below one day carry no date: Excel's way of storing a time of day
    if dt.is_duration() || (0.0..1.0).contains(&serial) {
        let secs = (serial.fract() * SECONDS_PER_DAY).round() as u32 % 86_400;
        return NaiveTime::from_num_seconds_from_midnight_opt(secs, 0)
            .map(Cell::Time)
            .unwrap_or(Cell::Float(serial));
    }
    dt.as_datetime().map(Cell::DateTime).unwrap_or(Cell::Float(serial))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::call_log::CategoryRow;

    fn category_row(from: &str) -> CategoryRow {
        CategoryRow {
            from: from.to_string(),
            normalized_timestamp: "2024-01-02 10:00:00".to_string(),
            action_result: "Answered".to_string(),
        }
    }

    #[test]
    fn csv_headers_are_trimmed_and_bom_stripped() {
        let bytes = "\u{feff}From, Date ,Time,Action Result,Extension\n5551111,01/02/2024,10:00,ok,Latino\n";
        let table = read_csv(bytes.as_bytes(), b',').unwrap();
        assert_eq!(table.headers, vec!["From", "Date", "Time", "Action Result", "Extension"]);
        assert_eq!(table.rows[0][0], Cell::text("5551111"));
    }

    #[test]
    fn csv_ragged_rows_are_accepted() {
        let table = read_csv(b"From;Date\n123456;\n7890\n", b';').unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0][1], Cell::Empty);
        assert_eq!(Table::cell(&table.rows[1], 1), &Cell::Empty);
    }

    #[test]
    fn category_workbook_has_one_sheet_per_category() {
        let mut tables = CategoryTables::new();
        tables.insert("Latino".to_string(), vec![category_row("5550001"), category_row("5550002")]);
        tables.insert("Agape".to_string(), vec![category_row("5550003")]);

        let bytes = write_category_workbook(&tables).unwrap();
        let sheets = read_workbook(bytes).unwrap();

        let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Agape", "Latino"]);
        assert_eq!(sheets[0].table.headers, vec!["From", "PraFecha", "Action Result"]);
        assert_eq!(sheets[0].table.len(), 1);
        assert_eq!(sheets[1].table.len(), 2);
        assert_eq!(sheets[1].table.rows[1][0], Cell::text("5550002"));
    }

    #[test]
    fn unknown_extensions_are_rejected() {
        let result = read_table_file(Path::new("calls.pdf"), b',');
        assert!(matches!(result, Err(CallSheetsError::UnsupportedInput(_))));
    }

    #[test]
    fn table_file_reads_csv_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.csv");
        fs::write(&path, "From,Date,Time,Action Result,Extension\n5551111,,,ok,Agape\n").unwrap();

        let sheet = read_table_file(&path, b',').unwrap();
        assert_eq!(sheet.name, "calls.csv");
        assert_eq!(sheet.table.len(), 1);
    }

    #[test]
    fn tsv_files_split_on_tabs_whatever_the_delimiter() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calls.tsv");
        fs::write(
            &path,
            "From\tDate\tTime\tAction Result\tExtension\n5551111\t01/02/2024\t10:00\tok, left message\tAgape\n",
        )
        .unwrap();

        let sheet = read_table_file(&path, b',').unwrap();
        assert_eq!(sheet.table.headers, vec!["From", "Date", "Time", "Action Result", "Extension"]);
        assert_eq!(sheet.table.rows[0][3], Cell::text("ok, left message"));
    }
}
