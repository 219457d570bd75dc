//! CSV to record-set parser with encoding and delimiter auto-detection.
//!
//! Every cell is read as text; blank cells and the usual missing-value
//! placeholders (`N/A`, `NULL`, `nan`, ...) become `Null`. Typing happens in
//! the cleaning stage, where the expected column types are known.

use std::path::Path;

use crate::error::{CsvError, CsvResult};
use crate::record::{RecordSet, Value};

/// Cell contents read as a missing value. Matched exactly, after trimming.
pub const NA_TOKENS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Result of parsing with metadata
#[derive(Debug, Clone)]
pub struct ParseResult {
    /// Parsed rows
    pub records: RecordSet,
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "utf-8-sig" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "utf-8" | "utf8" | "ascii" => String::from_utf8_lossy(bytes).to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::ISO_8859_15.decode(bytes).0.to_string(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.to_string(),
        other => match encoding_rs::Encoding::for_label(other.as_bytes()) {
            Some(label) => label.decode(bytes).0.to_string(),
            // Fallback: UTF-8 with lossy conversion
            None => String::from_utf8_lossy(bytes).to_string(),
        },
    };
    // Strip a UTF-8 byte order mark so the first header is not polluted.
    decoded.trim_start_matches('\u{feff}').to_string()
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse CSV text with an explicit delimiter.
///
/// # Example
/// ```ignore
/// let set = parse_str("email,phone\na@x.com,\n", ',')?;
/// assert!(set.rows()[0][1].is_null());
/// ```
pub fn parse_str(content: &str, delimiter: char) -> CsvResult<RecordSet> {
    if content.trim().is_empty() {
        return Err(CsvError::EmptyFile);
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| parse_error(&e))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(CsvError::NoHeaders);
    }

    let mut records = RecordSet::new(headers.iter().cloned())
        .map_err(|e| CsvError::Parse { line: 1, message: e.to_string() })?;

    for result in reader.records() {
        let record = result.map_err(|e| parse_error(&e))?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        // Short rows are padded with nulls, extra fields are ignored.
        let row: Vec<Value> = (0..headers.len())
            .map(|i| record.get(i).map(cell).unwrap_or(Value::Null))
            .collect();
        records.push_row(row).map_err(|e| CsvError::Parse {
            line: record.position().map(|p| p.line()).unwrap_or(0),
            message: e.to_string(),
        })?;
    }

    Ok(records)
}

fn cell(field: &str) -> Value {
    if NA_TOKENS.contains(&field.trim()) {
        Value::Null
    } else {
        Value::text(field)
    }
}

fn parse_error(err: &csv::Error) -> CsvError {
    CsvError::Parse {
        line: err.position().map(|p| p.line()).unwrap_or(0),
        message: err.to_string(),
    }
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_bytes_auto(bytes: &[u8]) -> CsvResult<ParseResult> {
    if bytes.is_empty() {
        return Err(CsvError::EmptyFile);
    }
    let (encoding, content) = match bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        Some(rest) => ("utf-8".to_string(), decode_content(rest, "utf-8")),
        None => {
            let encoding = detect_encoding(bytes);
            let content = decode_content(bytes, &encoding);
            (encoding, content)
        }
    };
    let delimiter = detect_delimiter(&content);
    let records = parse_str(&content, delimiter)?;

    Ok(ParseResult {
        records,
        encoding,
        delimiter,
    })
}

/// Parse a CSV file with auto-detection of encoding and delimiter.
pub fn parse_csv_file_auto<P: AsRef<Path>>(path: P) -> CsvResult<ParseResult> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| CsvError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse_bytes_auto(&bytes)
}
