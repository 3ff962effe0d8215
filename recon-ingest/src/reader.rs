use std::io::Cursor;

use calamine::open_workbook_from_rs;
use calamine::Data;
use calamine::Reader as _;
use calamine::Xls;
use calamine::Xlsx;
use recon_config::FileFormat;

use crate::error::IngestError;
use crate::error::IngestResult;
use crate::table::RawTable;

/// Detects format from a filename extension and parses its first sheet into a
/// [`RawTable`], skipping `header_rows_to_skip` leading rows before the header row
/// itself (spec.md §4.2). Never returns a partially-populated table: any parse
/// failure is surfaced whole as [`IngestError::Read`].
pub fn read_table(bytes: &[u8], filename: &str, header_rows_to_skip: usize) -> IngestResult<RawTable> {
    let format = detect_format(filename)?;
    match format {
        FileFormat::Xlsx => read_xlsx(bytes, filename, header_rows_to_skip),
        FileFormat::Xls => read_xls_with_xlsx_fallback(bytes, filename, header_rows_to_skip),
        FileFormat::Csv => read_csv(bytes, filename, header_rows_to_skip),
    }
}

fn detect_format(filename: &str) -> IngestResult<FileFormat> {
    let extension = filename.rsplit('.').next().unwrap_or_default();
    FileFormat::from_extension(extension).ok_or_else(|| IngestError::UnknownFormat(filename.to_string()))
}

fn read_xlsx(bytes: &[u8], filename: &str, header_rows_to_skip: usize) -> IngestResult<RawTable> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook: Xlsx<_> = open_workbook_from_rs(cursor).map_err(|error| IngestError::Read {
        filename: filename.to_string(),
        source: error.to_string(),
    })?;
    let range = first_sheet_range(&mut workbook, filename)?;
    Ok(table_from_rows(range_rows(&range), header_rows_to_skip))
}

/// Some `.xls` uploads are in fact xlsx payloads with the legacy extension
/// (spec.md §4.2); try the xls decoder first and fall back to xlsx on failure.
fn read_xls_with_xlsx_fallback(bytes: &[u8], filename: &str, header_rows_to_skip: usize) -> IngestResult<RawTable> {
    let cursor = Cursor::new(bytes.to_vec());
    match open_workbook_from_rs::<Xls<_>, _>(cursor) {
        Ok(mut workbook) => {
            let range = first_sheet_range(&mut workbook, filename)?;
            Ok(table_from_rows(range_rows(&range), header_rows_to_skip))
        }
        Err(_) => read_xlsx(bytes, filename, header_rows_to_skip),
    }
}

fn first_sheet_range<R>(workbook: &mut R, filename: &str) -> IngestResult<calamine::Range<Data>>
where
    R: calamine::Reader<Cursor<Vec<u8>>>,
{
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| IngestError::Read {
            filename: filename.to_string(),
            source: "workbook has no sheets".to_string(),
        })?;
    workbook
        .worksheet_range(&sheet_name)
        .map_err(|error| IngestError::Read {
            filename: filename.to_string(),
            source: error.to_string(),
        })
}

fn range_rows(range: &calamine::Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect()
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.clone(),
        Data::Float(value) => value.to_string(),
        Data::Int(value) => value.to_string(),
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => value.to_string(),
        Data::DateTimeIso(value) | Data::DurationIso(value) => value.clone(),
        Data::Error(error) => format!("{error:?}"),
    }
}

fn read_csv(bytes: &[u8], filename: &str, header_rows_to_skip: usize) -> IngestResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);
    let mut records = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|error| IngestError::Read {
            filename: filename.to_string(),
            source: error.to_string(),
        })?;
        records.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }
    Ok(table_from_rows(records, header_rows_to_skip))
}

fn table_from_rows(rows: Vec<Vec<String>>, header_rows_to_skip: usize) -> RawTable {
    let mut rows = rows;
    if header_rows_to_skip >= rows.len() {
        return RawTable::default();
    }
    let body = rows.split_off(header_rows_to_skip);
    let Some((headers, body)) = body.split_first() else {
        return RawTable::default();
    };
    RawTable::new(headers.clone(), body.to_vec())
}
