//! I/O utilities for delimited input, encoding, and file discovery.
//!
//! All file access in the crate flows through this module:
//!
//! - **Delimiter resolution**: extension-based detection (`.csv` → comma,
//!   `.tsv` → tab) with a configured override.
//! - **Encoding**: input decoding via `encoding_rs`, defaulting to UTF-8.
//! - **Reader/writer construction**: `open_csv_reader_from_path` and
//!   `open_csv_writer`.
//! - **Discovery**: non-recursive glob matching for directory loads.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read},
    path::{Path, PathBuf},
};

use encoding_rs::{Encoding, UTF_8};
use globset::{GlobBuilder, GlobMatcher};

use crate::error::{AnalyticsError, Result};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: &str) -> Result<&'static Encoding> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Ok(UTF_8);
    }
    Encoding::for_label(trimmed.as_bytes())
        .ok_or_else(|| AnalyticsError::InvalidArgument(format!("Unknown encoding '{label}'")))
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path).map_err(|err| AnalyticsError::load(path, err))?;
    Ok(open_csv_reader(BufReader::new(file), delimiter))
}

pub fn open_csv_writer(path: &Path, delimiter: u8) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(|err| AnalyticsError::write(path, err))?;
    let mut builder = csv::WriterBuilder::new();
    builder.delimiter(delimiter).double_quote(true);
    Ok(builder.from_writer(BufWriter::new(file)))
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    (!had_errors).then(|| text.into_owned())
}

pub fn decode_record(
    record: &csv::ByteRecord,
    encoding: &'static Encoding,
) -> std::result::Result<Vec<String>, String> {
    record
        .iter()
        .map(|field| {
            decode_bytes(field, encoding).ok_or_else(|| {
                format!("Failed to decode text with encoding {}", encoding.name())
            })
        })
        .collect()
}

/// Lists regular files directly under `dir` whose names match the glob
/// `pattern` (`*`, `?`, `[...]` classes and `{a,b}` alternates), sorted by
/// path.
pub fn list_matching_files(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(AnalyticsError::NotFound {
            path: dir.to_path_buf(),
        });
    }
    let matcher = file_name_matcher(pattern)?;
    let entries = std::fs::read_dir(dir).map_err(|err| AnalyticsError::load(dir, err))?;
    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| AnalyticsError::load(dir, err))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && matcher.is_match(name)
        {
            matches.push(path);
        }
    }
    matches.sort();
    Ok(matches)
}

fn file_name_matcher(pattern: &str) -> Result<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|err| {
            AnalyticsError::InvalidArgument(format!("Invalid file pattern '{pattern}': {err}"))
        })
}
