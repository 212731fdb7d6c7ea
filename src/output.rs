//! Output formatting for lookup results, corpus stats and diffs (JSON, text).

use crate::compare::{DiffSummary, Side, VerseDiff};
use crate::lookup::coalesce_merged;
use crate::models::{CitationVerses, CorpusStats, ParsedCitations};
use std::io::{self, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write lookup results as JSON.
pub fn write_json<W: Write>(results: &[CitationVerses], writer: &mut W) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(results)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Write lookup results as JSON to a file.
pub fn write_json_file(results: &[CitationVerses], path: &Path) -> Result<(), OutputError> {
    let mut file = std::fs::File::create(path)?;
    write_json(results, &mut file)
}

/// Write parsed citations as JSON.
pub fn write_parsed_json<W: Write>(
    parsed: &ParsedCitations,
    writer: &mut W,
) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(parsed)?;
    writer.write_all(json.as_bytes())?;
    Ok(())
}

/// Format one citation's verses as display text, merged verses folded.
///
/// ```text
/// 路加福音21:29-31
///   29-30　比喻
///   31　天國近了
/// ```
pub fn format_citation(result: &CitationVerses) -> String {
    let mut out = String::new();
    out.push_str(&result.citation);
    out.push('\n');
    for verse in coalesce_merged(&result.verses) {
        out.push_str(&format!("  {}\u{3000}{}\n", verse.label(), verse.text));
    }
    out
}

/// Print lookup results to stdout.
pub fn print_results(results: &[CitationVerses]) {
    for result in results {
        println!("{}", format_citation(result));
    }
}

/// Print parsed citations to stdout.
pub fn print_parsed(parsed: &ParsedCitations) {
    for entry in parsed {
        let citations: Vec<String> = entry
            .citations
            .citations
            .iter()
            .map(|c| c.to_string())
            .collect();
        println!(
            "{}\t{}\t{}",
            entry.key,
            entry.citations.book,
            citations.join(", ")
        );
    }
}

/// Print corpus statistics to stdout.
pub fn print_stats(stats: &CorpusStats) {
    println!("=== Corpus Statistics ===");
    println!("Theonym: {:?}", stats.theonym);
    println!("Books: {}", stats.books);
    println!("Verses: {}", stats.verses);
    println!("Merged verses: {}", stats.merged_verses);
}

pub fn format_diff(diff: &VerseDiff) -> String {
    let marker = match diff.present_in {
        Side::Left => "<",
        Side::Right => ">",
    };
    format!("{} {}{} {}", marker, diff.book, diff.location, diff.text)
}

/// Print a corpus diff to stdout, optionally limited to the first `limit` entries.
pub fn print_diff(diffs: &[VerseDiff], summary: &DiffSummary, limit: Option<usize>) {
    println!("=== Corpus Diff ===");
    println!("Books: {} / {}", summary.books_left, summary.books_right);
    println!("Shared verses: {}", summary.shared_verses);
    println!("Only in left: {}", summary.left_only);
    println!("Only in right: {}", summary.right_only);

    let limit = limit.unwrap_or(diffs.len());
    for diff in diffs.iter().take(limit) {
        println!("{}", format_diff(diff));
    }
    if diffs.len() > limit {
        println!("... and {} more", diffs.len() - limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{VerseLocation, VerseRecord};

    fn sample() -> CitationVerses {
        CitationVerses {
            citation: "路加福音21:29-31".to_string(),
            book: "路加福音".to_string(),
            verses: vec![
                VerseRecord::new("路加福音", 21, 29, "比喻"),
                VerseRecord::new("路加福音", 21, 30, ""),
                VerseRecord::new("路加福音", 21, 31, "天國近了"),
            ],
        }
    }

    #[test]
    fn test_format_citation_folds_merged() {
        let text = format_citation(&sample());
        assert_eq!(
            text,
            "路加福音21:29-31\n  29-30\u{3000}比喻\n  31\u{3000}天國近了\n"
        );
    }

    #[test]
    fn test_write_json() {
        let mut output = Vec::new();
        write_json(&[sample()], &mut output).unwrap();

        let json = String::from_utf8(output).unwrap();
        assert!(json.contains("\"citation\": \"路加福音21:29-31\""));
        assert!(json.contains("\"verse\": 30"));
    }

    #[test]
    fn test_write_json_empty() {
        let mut output = Vec::new();
        write_json(&[], &mut output).unwrap();
        assert_eq!(String::from_utf8(output).unwrap(), "[]");
    }

    #[test]
    fn test_format_diff() {
        let diff = VerseDiff {
            book: "約伯記".to_string(),
            location: VerseLocation::new(3, 3),
            present_in: Side::Right,
            text: "願我生的那日".to_string(),
        };
        assert_eq!(format_diff(&diff), "> 約伯記3:3 願我生的那日");
    }
}
