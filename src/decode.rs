//! Raw decoding of uploaded files into per-sheet grids.
//!
//! Delimited text becomes a single sheet of string cells. Workbooks keep
//! their native number and date cells, one grid per sheet in workbook order.

use std::{io::Cursor, path::Path};

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use encoding_rs::{Encoding, UTF_8};
use log::debug;
use rust_decimal::{Decimal, prelude::FromPrimitive};

use crate::{
    data::{Value, parse_datetime},
    dataset::Row,
    error::{DealError, DealResult},
    io_utils,
};

/// Name given to the only sheet of a delimited source.
pub const DELIMITED_SHEET_NAME: &str = "data";

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "xla", "ods"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Delimited,
    Workbook,
}

impl SourceFormat {
    /// Workbook extensions select [`SourceFormat::Workbook`]; anything else is delimited text.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext)
                if WORKBOOK_EXTENSIONS
                    .iter()
                    .any(|known| ext.eq_ignore_ascii_case(known)) =>
            {
                SourceFormat::Workbook
            }
            _ => SourceFormat::Delimited,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DecodeOptions {
    /// Sniffed from the first line when unset.
    pub delimiter: Option<u8>,
    pub encoding: &'static Encoding,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            delimiter: None,
            encoding: UTF_8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Row>,
}

pub fn decode_bytes(
    bytes: &[u8],
    format: SourceFormat,
    options: &DecodeOptions,
) -> DealResult<Vec<Sheet>> {
    match format {
        SourceFormat::Delimited => decode_delimited(bytes, options).map(|sheet| vec![sheet]),
        SourceFormat::Workbook => decode_workbook(bytes),
    }
}

pub fn decode_path(path: &Path, options: &DecodeOptions) -> DealResult<Vec<Sheet>> {
    let bytes = io_utils::read_input(path).map_err(|err| DealError::Decode(format!("{err:#}")))?;
    decode_bytes(&bytes, SourceFormat::from_path(path), options)
}

fn text_cell(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(Value::String(trimmed.to_string()))
    }
}

/// Delimited text drops the residual escape backslashes.
fn delimited_cell(raw: &str) -> Option<Value> {
    text_cell(&raw.replace('\\', ""))
}

fn decode_delimited(bytes: &[u8], options: &DecodeOptions) -> DealResult<Sheet> {
    let delimiter = io_utils::resolve_input_delimiter(bytes, options.delimiter);
    let mut reader = io_utils::open_csv_reader(bytes, delimiter);
    let mut rows = Vec::new();
    for (idx, record) in reader.byte_records().enumerate() {
        let record = record
            .map_err(|err| DealError::Decode(format!("Reading record {}: {err}", idx + 1)))?;
        let fields = io_utils::decode_record(&record, options.encoding)
            .map_err(|err| DealError::Decode(format!("Record {}: {err}", idx + 1)))?;
        rows.push(fields.iter().map(|field| delimited_cell(field)).collect::<Row>());
    }
    debug!(
        "Decoded {} delimited row(s) using delimiter '{}'",
        rows.len(),
        char::from(delimiter).escape_default()
    );
    Ok(Sheet {
        name: DELIMITED_SHEET_NAME.to_string(),
        rows,
    })
}

/// Converts a spreadsheet serial day number (1900 date system) to a date-time.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

fn workbook_cell(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => text_cell(s),
        Data::Float(f) => Decimal::from_f64(*f).map(Value::Number),
        Data::Int(i) => Some(Value::Number(Decimal::from(*i))),
        Data::Bool(b) => Some(Value::String(if *b { "TRUE" } else { "FALSE" }.to_string())),
        Data::DateTime(dt) => excel_serial_to_datetime(dt.as_f64()).map(Value::Date),
        Data::DateTimeIso(s) => parse_datetime(s)
            .ok()
            .map(Value::Date)
            .or_else(|| text_cell(s)),
        Data::DurationIso(s) => text_cell(s),
    }
}

fn decode_workbook(bytes: &[u8]) -> DealResult<Vec<Sheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| DealError::Decode(format!("Opening workbook: {err}")))?;
    let names = workbook.sheet_names().to_owned();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| DealError::Decode(format!("Reading sheet '{name}': {err}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(workbook_cell).collect::<Row>())
            .collect::<Vec<_>>();
        debug!("Decoded sheet '{name}' with {} row(s)", rows.len());
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}
