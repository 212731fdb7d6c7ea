//! Tab-separated side-file cache for ingested corpora.
//!
//! Parsing an archive source is slow, so the assembled verse table is
//! written next to the source as `<source file name>.tsv` and read back on
//! later loads instead of re-parsing.
//!
//! # Format
//!
//! A header row `book\tchapter\tverse\ttext`, then one verse per row. The
//! text column escapes `\\`, `\t`, `\n` and `\r` so the round trip is
//! byte-exact. Any malformed row makes the whole file unusable; callers
//! treat that the same as a missing cache.

use crate::models::{VerseLocation, VerseRecord};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const HEADER: &str = "book\tchapter\tverse\ttext";

/// Extension appended to the source file name.
pub const SIDE_FILE_EXTENSION: &str = "tsv";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("missing or unexpected header row")]
    BadHeader,
    #[error("malformed row {row}: {reason}")]
    BadRow { row: usize, reason: String },
}

/// Side-file path for a source: `books.txt` → `books.txt.tsv` in the same directory.
pub fn side_file_path(source: &Path) -> PathBuf {
    let mut name = source
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(SIDE_FILE_EXTENSION);
    source.with_file_name(name)
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            _ => return None,
        }
    }
    Some(out)
}

/// Write verse records as TSV.
pub fn write_tsv<W: Write>(records: &[VerseRecord], writer: &mut W) -> Result<(), CacheError> {
    writeln!(writer, "{}", HEADER)?;
    for r in records {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}",
            escape(&r.book),
            r.chapter,
            r.verse,
            escape(&r.text)
        )?;
    }
    Ok(())
}

/// Read verse records from TSV.
pub fn read_tsv<R: BufRead>(reader: R) -> Result<Vec<VerseRecord>, CacheError> {
    let mut lines = reader.lines();
    match lines.next() {
        Some(Ok(header)) if header == HEADER => {}
        Some(Err(e)) => return Err(e.into()),
        _ => return Err(CacheError::BadHeader),
    }

    let mut records = Vec::new();
    for (idx, line) in lines.enumerate() {
        let row = idx + 2;
        let line = line?;
        let bad = |reason: &str| CacheError::BadRow {
            row,
            reason: reason.to_string(),
        };

        let fields: Vec<&str> = line.split('\t').collect();
        let [book, chapter, verse, text] = fields.as_slice() else {
            return Err(bad("expected 4 columns"));
        };
        let book = unescape(book).filter(|b| !b.is_empty()).ok_or_else(|| bad("book"))?;
        let chapter = chapter.parse::<u32>().map_err(|_| bad("chapter"))?;
        let verse = verse.parse::<u32>().map_err(|_| bad("verse"))?;
        let location =
            VerseLocation::checked(chapter, verse).ok_or_else(|| bad("location out of range"))?;
        let text = unescape(text).ok_or_else(|| bad("text"))?;

        records.push(VerseRecord::new(book, location.chapter, location.verse, text));
    }

    Ok(records)
}

/// Load the cached table for `source`, if a usable side file exists.
///
/// Returns `None` when the file is absent or corrupt.
pub fn load(source: &Path) -> Option<Vec<VerseRecord>> {
    let path = side_file_path(source);
    let file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "side-file cache unreadable");
            return None;
        }
    };
    match read_tsv(BufReader::new(file)) {
        Ok(records) => {
            tracing::info!(path = %path.display(), verses = records.len(), "loaded side-file cache");
            Some(records)
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring corrupt side-file cache");
            None
        }
    }
}

/// Write the side file for `source`.
pub fn save(source: &Path, records: &[VerseRecord]) -> Result<PathBuf, CacheError> {
    let path = side_file_path(source);
    let mut writer = BufWriter::new(std::fs::File::create(&path)?);
    write_tsv(records, &mut writer)?;
    writer.flush()?;
    Ok(path)
}
