//! Resolve parsed citations against a corpus.

use crate::index::BibleCorpus;
use crate::models::{BookCitations, CitationVerses, ParsedCitations, VerseRecord};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("book '{book}' has no verses in this corpus")]
    UnknownBook { book: String },
    #[error("no verses found for {book} {citation}")]
    EmptyRange { book: String, citation: String },
}

/// Replace every occurrence of `native` with `replacement`.
pub fn replace_theonym(text: &str, native: &str, replacement: &str) -> String {
    if native.is_empty() || native == replacement {
        return text.to_string();
    }
    text.replace(native, replacement)
}

/// Verses for every citation of one book, concatenated in citation order.
pub fn lookup_book(
    corpus: &BibleCorpus,
    book_citations: &BookCitations,
    theonym: Option<&str>,
) -> Result<Vec<VerseRecord>, LookupError> {
    let book = &book_citations.book;
    let native = corpus.theonym();
    let replacement = theonym.filter(|t| *t != native);

    let mut verses = Vec::new();
    for citation in &book_citations.citations {
        let (lo, hi) = citation.key_range();
        let found = corpus
            .index()
            .range(book, lo, hi)
            .ok_or_else(|| LookupError::UnknownBook { book: book.clone() })?;
        if found.is_empty() {
            return Err(LookupError::EmptyRange {
                book: book.clone(),
                citation: citation.to_string(),
            });
        }

        verses.extend(found.iter().map(|r| match replacement {
            Some(replacement) => VerseRecord {
                text: replace_theonym(&r.text, native, replacement),
                ..r.clone()
            },
            None => r.clone(),
        }));
    }

    Ok(verses)
}

/// Resolve all parsed citations, preserving input order.
pub fn search(
    corpus: &BibleCorpus,
    parsed: &ParsedCitations,
    theonym: Option<&str>,
) -> Result<Vec<CitationVerses>, LookupError> {
    parsed
        .iter()
        .map(|entry| -> Result<CitationVerses, LookupError> {
            let verses = lookup_book(corpus, &entry.citations, theonym)?;
            tracing::debug!(citation = %entry.key, verses = verses.len(), "resolved citation");
            Ok(CitationVerses {
                citation: entry.key.clone(),
                book: entry.citations.book.clone(),
                verses,
            })
        })
        .collect()
}

/// A verse as displayed, possibly standing for several merged verses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisplayVerse {
    pub chapter: u32,
    pub first_verse: u32,
    pub last_verse: u32,
    pub text: String,
}

impl DisplayVerse {
    /// `16`, or `21-22` for merged verses.
    pub fn label(&self) -> String {
        if self.first_verse == self.last_verse {
            self.first_verse.to_string()
        } else {
            format!("{}-{}", self.first_verse, self.last_verse)
        }
    }
}

/// Fold merged (empty) verses into the preceding verse of the same chapter.
pub fn coalesce_merged(verses: &[VerseRecord]) -> Vec<DisplayVerse> {
    let mut out: Vec<DisplayVerse> = Vec::with_capacity(verses.len());
    for v in verses {
        if v.is_merged() {
            if let Some(prev) = out.last_mut() {
                if prev.chapter == v.chapter && prev.last_verse + 1 == v.verse {
                    prev.last_verse = v.verse;
                    continue;
                }
            }
        }
        out.push(DisplayVerse {
            chapter: v.chapter,
            first_verse: v.verse,
            last_verse: v.verse,
            text: v.text.clone(),
        });
    }
    out
}
