//! CSV parsing with quote-aware field splitting

use super::{CellValue, Row};
use crate::error::ParseError;
use tracing::warn;

/// Parse CSV text into rows and an ordered column list.
///
/// Line endings (CRLF, LF, CR) are normalized first. The first line is the
/// header; its field count defines row validity for all subsequent lines.
/// Data lines whose field count differs from the header are skipped without
/// failing the parse. Header names are used as given, even when duplicated.
pub fn parse(text: &str) -> Result<(Vec<Row>, Vec<String>), ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ParseError::EmptyInput);
    }

    let normalized = trimmed.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = normalized.split('\n').collect();
    if lines.len() < 2 {
        return Err(ParseError::NoHeaderOrRows);
    }

    let columns = split_line(lines[0]);
    let mut rows = Vec::new();

    for (i, raw_line) in lines.iter().enumerate().skip(1) {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        let fields = split_line(line);
        if fields.len() != columns.len() {
            warn!(
                line = i + 1,
                expected = columns.len(),
                got = fields.len(),
                "skipping malformed row"
            );
            continue;
        }

        let row: Row = columns
            .iter()
            .cloned()
            .zip(fields.into_iter().map(|f| infer_cell(&f)))
            .collect();
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(ParseError::NoValidRows);
    }

    Ok((rows, columns))
}

/// Split a line on commas that are not inside an open pair of double quotes,
/// then clean each field.
fn split_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ',' if !in_quotes => {
                fields.push(clean_field(&current));
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    fields.push(clean_field(&current));

    fields
}

/// Trim surrounding whitespace, strip one layer of enclosing double quotes,
/// and un-escape doubled quotes to a single literal quote.
fn clean_field(raw: &str) -> String {
    let trimmed = raw.trim();
    let stripped = trimmed.strip_prefix('"').unwrap_or(trimmed);
    let stripped = stripped.strip_suffix('"').unwrap_or(stripped);
    stripped.replace("\"\"", "\"")
}

/// A cell is numeric iff the cleaned field is non-empty and parses entirely
/// as a finite number.
fn infer_cell(value: &str) -> CellValue {
    if !value.is_empty() {
        if let Ok(num) = value.parse::<f64>() {
            if num.is_finite() {
                return CellValue::Numeric(num);
            }
        }
    }
    CellValue::Text(value.to_string())
}
