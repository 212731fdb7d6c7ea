//! Verse index keyed by (book, chapter * 1000 + verse).
//!
//! Records are held in one vector sorted by book, then composite key, so
//! every book is a contiguous slice and a multi-chapter citation is a single
//! binary-searched range within that slice.

use crate::models::{CorpusStats, VerseRecord};
use std::collections::HashMap;
use std::ops::Range;

#[derive(Debug, Clone, Default)]
pub struct VerseIndex {
    records: Vec<VerseRecord>,
    books: HashMap<String, Range<usize>>,
}

impl VerseIndex {
    /// Build the index. Rows with an empty book or an out-of-range location
    /// are dropped; for duplicate keys the first row in input order wins.
    pub fn new(mut records: Vec<VerseRecord>) -> Self {
        records.retain(|r| !r.book.is_empty() && r.location().is_valid());
        // Stable, so input order decides between duplicates.
        records.sort_by(|a, b| a.book.cmp(&b.book).then(a.key().cmp(&b.key())));
        records.dedup_by(|later, earlier| {
            let duplicate = later.book == earlier.book && later.key() == earlier.key();
            if duplicate {
                tracing::warn!(
                    book = %later.book,
                    location = %later.location(),
                    "dropping duplicate verse"
                );
            }
            duplicate
        });

        let mut books: HashMap<String, Range<usize>> = HashMap::new();
        let mut start = 0;
        for i in 1..=records.len() {
            if i == records.len() || records[i].book != records[start].book {
                books.insert(records[start].book.clone(), start..i);
                start = i;
            }
        }

        Self { records, books }
    }

    /// All rows in index order.
    pub fn records(&self) -> &[VerseRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn book_count(&self) -> usize {
        self.books.len()
    }

    /// Book names in index order.
    pub fn books(&self) -> Vec<&str> {
        let mut ranges: Vec<(&str, usize)> = self
            .books
            .iter()
            .map(|(name, range)| (name.as_str(), range.start))
            .collect();
        ranges.sort_by_key(|&(_, start)| start);
        ranges.into_iter().map(|(name, _)| name).collect()
    }

    /// All verses of a book, or `None` if the book has no rows.
    pub fn book(&self, book: &str) -> Option<&[VerseRecord]> {
        self.books.get(book).map(|r| &self.records[r.clone()])
    }

    /// Verses of `book` whose composite key lies in `[lo, hi]`.
    /// `None` if the book has no rows; possibly empty otherwise.
    pub fn range(&self, book: &str, lo: u32, hi: u32) -> Option<&[VerseRecord]> {
        let verses = self.book(book)?;
        let start = verses.partition_point(|r| r.key() < lo);
        let end = verses.partition_point(|r| r.key() <= hi);
        Some(&verses[start..end.max(start)])
    }
}

/// An immutable, indexed corpus and the theonym its text uses.
#[derive(Debug, Clone)]
pub struct BibleCorpus {
    theonym: String,
    index: VerseIndex,
}

impl BibleCorpus {
    pub fn new(theonym: impl Into<String>, records: Vec<VerseRecord>) -> Self {
        Self {
            theonym: theonym.into(),
            index: VerseIndex::new(records),
        }
    }

    pub fn theonym(&self) -> &str {
        &self.theonym
    }

    pub fn index(&self) -> &VerseIndex {
        &self.index
    }

    pub fn records(&self) -> &[VerseRecord] {
        self.index.records()
    }

    pub fn stats(&self) -> CorpusStats {
        CorpusStats {
            theonym: self.theonym.clone(),
            books: self.index.book_count(),
            verses: self.index.len(),
            merged_verses: self.records().iter().filter(|r| r.is_merged()).count(),
        }
    }
}
