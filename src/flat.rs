//! Line-oriented flat text ingestion.
//!
//! Each verse line is `<n> <abbr> <book> <chapter:verse> <text>`, split on
//! whitespace into at most five fields. Lines starting with `=` or `END` are
//! section markers. Malformed lines are logged and skipped.

use crate::loader::IngestionError;
use crate::models::{VerseLocation, VerseRecord};
use std::io::BufRead;

/// Prefix marking a verse whose content is printed with the previous verse.
pub const MERGED_VERSE_MARKER: &str = "見上節";

/// Historical book spellings remapped to their canonical form.
const BOOK_CORRECTIONS: &[(&str, &str)] = &[
    ("列王記上", "列王紀上"),
    ("列王記下", "列王紀下"),
    ("創世紀", "創世記"),
];

const FIELD_COUNT: usize = 5;

/// Canonical spelling for a book name.
pub fn canonical_book(book: &str) -> &str {
    BOOK_CORRECTIONS
        .iter()
        .find(|(from, _)| *from == book)
        .map(|(_, to)| *to)
        .unwrap_or(book)
}

/// Split on whitespace runs into at most `max` fields; the last keeps the remainder.
fn split_fields(line: &str, max: usize) -> Vec<&str> {
    let mut fields = Vec::with_capacity(max);
    let mut rest = line.trim_start();
    while !rest.is_empty() {
        if fields.len() + 1 == max {
            fields.push(rest);
            break;
        }
        match rest.find(char::is_whitespace) {
            Some(end) => {
                fields.push(&rest[..end]);
                rest = rest[end..].trim_start();
            }
            None => {
                fields.push(rest);
                break;
            }
        }
    }
    fields
}

/// Parse one verse line.
pub fn parse_line(line: &str) -> Result<VerseRecord, IngestionError> {
    let fields = split_fields(line, FIELD_COUNT);
    if fields.len() != FIELD_COUNT {
        return Err(IngestionError::FieldCount {
            expected: FIELD_COUNT,
            found: fields.len(),
        });
    }

    let location = fields[3];
    let (chapter, verse) = location
        .split_once(':')
        .and_then(|(c, v)| VerseLocation::checked(c.parse().ok()?, v.parse().ok()?))
        .map(|loc| (loc.chapter, loc.verse))
        .ok_or_else(|| IngestionError::BadLocation(location.to_string()))?;

    let text = fields[4].trim();
    let text = if text.starts_with(MERGED_VERSE_MARKER) {
        ""
    } else {
        text
    };

    Ok(VerseRecord::new(
        canonical_book(fields[2]),
        chapter,
        verse,
        text,
    ))
}

/// Parse a whole flat text stream. Unreadable or malformed lines are skipped.
pub fn parse_flat_text<R: BufRead>(reader: R) -> Vec<VerseRecord> {
    let mut records = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(line_no, error = %e, "skipping unreadable line");
                continue;
            }
        };
        let line = line.trim_start_matches('\u{feff}');
        if line.starts_with('=') || line.starts_with("END") || line.trim().is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(line_no, %error, line, "skipping malformed line");
            }
        }
    }

    tracing::debug!(verses = records.len(), "parsed flat text");
    records
}
