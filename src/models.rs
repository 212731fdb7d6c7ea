//! Data structures shared by the citation parser, corpus loaders and lookup engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Theonym used by the line-oriented flat text source (full-width space + 神).
pub const FLAT_THEONYM: &str = "\u{3000}神";

/// Theonym used by the structured-markup archive source.
pub const ARCHIVE_THEONYM: &str = "上帝";

/// Multiplier turning (chapter, verse) into a single monotonic integer key.
pub const CHAPTER_STRIDE: u32 = 1000;

/// Largest chapter whose composite key still fits in a `u32`.
pub const MAX_CHAPTER: u32 = u32::MAX / CHAPTER_STRIDE - 1;

/// Location of a verse within a book. Ordered by chapter, then verse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VerseLocation {
    pub chapter: u32,
    pub verse: u32,
}

impl VerseLocation {
    pub fn new(chapter: u32, verse: u32) -> Self {
        Self { chapter, verse }
    }

    /// A location only if its composite key is exact: chapter in
    /// `1..=MAX_CHAPTER`, verse in `1..CHAPTER_STRIDE`.
    pub fn checked(chapter: u32, verse: u32) -> Option<Self> {
        let loc = Self::new(chapter, verse);
        loc.is_valid().then_some(loc)
    }

    pub fn is_valid(&self) -> bool {
        (1..=MAX_CHAPTER).contains(&self.chapter) && (1..CHAPTER_STRIDE).contains(&self.verse)
    }

    /// Composite key `chapter * 1000 + verse`. Saturates for invalid locations.
    pub fn key(&self) -> u32 {
        self.chapter
            .saturating_mul(CHAPTER_STRIDE)
            .saturating_add(self.verse)
    }

    /// The next verse in the same chapter.
    pub fn next(&self) -> Self {
        Self::new(self.chapter, self.verse.saturating_add(1))
    }
}

impl fmt::Display for VerseLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chapter, self.verse)
    }
}

/// Uninterrupted passage of scripture; may cross a chapter boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub start: VerseLocation,
    pub end: VerseLocation,
}

impl Citation {
    pub fn new(start: VerseLocation, end: VerseLocation) -> Self {
        Self { start, end }
    }

    pub fn single(loc: VerseLocation) -> Self {
        Self::new(loc, loc)
    }

    /// Inclusive composite-key bounds of this passage.
    pub fn key_range(&self) -> (u32, u32) {
        (self.start.key(), self.end.key())
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// All passages cited from a single book, in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookCitations {
    pub book: String,
    pub citations: Vec<Citation>,
}

/// One parsed citation group keyed by its normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationEntry {
    pub key: String,
    pub citations: BookCitations,
}

/// Ordered mapping from normalized citation string to its book citations.
///
/// Inserting an existing key replaces the value in place, keeping the
/// position of the first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedCitations {
    entries: Vec<CitationEntry>,
}

impl ParsedCitations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns the replaced value if the key was present.
    pub fn insert(&mut self, key: String, citations: BookCitations) -> Option<BookCitations> {
        match self.entries.iter_mut().find(|e| e.key == key) {
            Some(entry) => Some(std::mem::replace(&mut entry.citations, citations)),
            None => {
                self.entries.push(CitationEntry { key, citations });
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&BookCitations> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| &e.citations)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CitationEntry> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<'a> IntoIterator for &'a ParsedCitations {
    type Item = &'a CitationEntry;
    type IntoIter = std::slice::Iter<'a, CitationEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A single verse of scripture text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerseRecord {
    pub book: String,
    pub chapter: u32,
    pub verse: u32,
    pub text: String,
}

impl VerseRecord {
    pub fn new(book: impl Into<String>, chapter: u32, verse: u32, text: impl Into<String>) -> Self {
        Self {
            book: book.into(),
            chapter,
            verse,
            text: text.into(),
        }
    }

    pub fn location(&self) -> VerseLocation {
        VerseLocation::new(self.chapter, self.verse)
    }

    pub fn key(&self) -> u32 {
        self.location().key()
    }

    /// Empty text marks a verse whose content was merged into the previous one.
    pub fn is_merged(&self) -> bool {
        self.text.is_empty()
    }
}

/// Verses resolved for one citation key, in citation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationVerses {
    pub citation: String,
    pub book: String,
    pub verses: Vec<VerseRecord>,
}

/// Raw corpus format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceFormat {
    /// Line-oriented flat text (`<n> <abbr> <book> <chapter:verse> <text>`).
    FlatText,
    /// Compressed structured-markup archive (EPUB-style zip).
    Archive,
}

impl SourceFormat {
    /// The word this source uses for "God".
    pub fn theonym(&self) -> &'static str {
        match self {
            SourceFormat::FlatText => FLAT_THEONYM,
            SourceFormat::Archive => ARCHIVE_THEONYM,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::FlatText => f.write_str("flat"),
            SourceFormat::Archive => f.write_str("archive"),
        }
    }
}

/// Corpus loading options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Read the TSV side-file cache next to the source when present.
    pub use_cache: bool,
    /// Write the side-file cache after a fresh parse.
    pub write_cache: bool,
    /// Show a progress bar while walking archive documents.
    pub show_progress: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            use_cache: true,
            write_cache: true,
            show_progress: false,
        }
    }
}

/// Corpus summary
#[derive(Debug, Clone, Serialize)]
pub struct CorpusStats {
    pub theonym: String,
    pub books: usize,
    pub verses: usize,
    pub merged_verses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_ordering_matches_key() {
        let a = VerseLocation::new(4, 32);
        let b = VerseLocation::new(5, 12);
        assert!(a < b);
        assert!(a.key() < b.key());
        assert_eq!(a.key(), 4032);
    }

    #[test]
    fn test_location_bounds() {
        assert!(VerseLocation::checked(1, 999).is_some());
        assert!(VerseLocation::checked(1, 1000).is_none());
        assert!(VerseLocation::checked(0, 1).is_none());
        assert!(VerseLocation::checked(1, 0).is_none());

        let last = VerseLocation::checked(MAX_CHAPTER, 999).unwrap();
        assert_eq!(last.key(), MAX_CHAPTER * 1000 + 999);
        assert!(VerseLocation::checked(MAX_CHAPTER + 1, 1).is_none());

        // Out-of-range locations never overflow.
        assert_eq!(VerseLocation::new(5_000_000, 1).key(), u32::MAX);
        assert_eq!(VerseLocation::new(1, u32::MAX).next().verse, u32::MAX);
    }

    #[test]
    fn test_citation_display() {
        let c = Citation::new(VerseLocation::new(4, 32), VerseLocation::new(5, 12));
        assert_eq!(c.to_string(), "4:32-5:12");
        assert_eq!(Citation::single(VerseLocation::new(2, 20)).to_string(), "2:20");
    }

    #[test]
    fn test_parsed_citations_overwrite_keeps_position() {
        let mut parsed = ParsedCitations::new();
        let one = BookCitations {
            book: "a".into(),
            citations: vec![],
        };
        let two = BookCitations {
            book: "b".into(),
            citations: vec![],
        };
        assert!(parsed.insert("x".into(), one.clone()).is_none());
        parsed.insert("y".into(), two.clone());
        let replaced = parsed.insert("x".into(), two.clone());

        assert_eq!(replaced, Some(one));
        assert_eq!(parsed.keys().collect::<Vec<_>>(), vec!["x", "y"]);
        assert_eq!(parsed.get("x"), Some(&two));
    }
}
