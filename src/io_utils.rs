//! Delimiter, encoding and CSV reader/writer plumbing for delimited exports.
//!
//! Deal exports arrive as `;`-separated text more often than not, so the
//! delimiter is sniffed from the first line when the caller does not give
//! one. The `-` path routes through standard input/output.

use std::{
    fs::File,
    io::{BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use csv::QuoteStyle;
use encoding_rs::{Encoding, UTF_8};

pub const DEFAULT_DELIMITER: u8 = b';';
const SNIFF_CANDIDATES: [u8; 3] = [b';', b',', b'\t'];

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

/// Picks the most frequent candidate separator on the first line, `;` on ties or none.
pub fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|b| *b == b'\n').next().unwrap_or_default();
    let mut best = (DEFAULT_DELIMITER, 0usize);
    for candidate in SNIFF_CANDIDATES {
        let count = first_line.iter().filter(|b| **b == candidate).count();
        if count > best.1 {
            best = (candidate, count);
        }
    }
    best.0
}

pub fn resolve_input_delimiter(bytes: &[u8], provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| sniff_delimiter(bytes))
}

/// Reader for raw grids: no header handling, ragged rows allowed, `\` escapes.
pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .escape(Some(b'\\'))
        .flexible(true);
    builder.from_reader(reader)
}

pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    if is_dash(path) {
        std::io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Reading standard input")?;
    } else {
        File::open(path)
            .with_context(|| format!("Opening input file {path:?}"))?
            .read_to_end(&mut bytes)
            .with_context(|| format!("Reading input file {path:?}"))?;
    }
    Ok(bytes)
}

pub fn open_csv_writer(path: Option<&Path>, delimiter: u8) -> Result<csv::Writer<Box<dyn Write>>> {
    let writer: Box<dyn Write> = match path {
        Some(p) if !is_dash(p) => Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        )),
        _ => Box::new(std::io::stdout()),
    };
    let mut builder = csv::WriterBuilder::new();
    builder
        .delimiter(delimiter)
        .quote_style(QuoteStyle::Necessary)
        .double_quote(true);
    Ok(builder.from_writer(writer))
}

pub fn decode_text(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    // A UTF-8 byte-order mark is common in spreadsheet exports.
    let bytes = if encoding == UTF_8 {
        bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
    } else {
        bytes
    };
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ))
    } else {
        Ok(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_text(field, encoding))
        .collect()
}
