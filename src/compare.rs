//! Cross-corpus consistency check.
//!
//! Two sources of the same translation rarely agree on every verse: one may
//! merge verses the other keeps separate, or misplace a verse entirely. This
//! module walks both sorted tables in step and reports the keys that only one
//! side has.

use crate::index::BibleCorpus;
use crate::models::{VerseLocation, VerseRecord};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Left,
    Right,
}

/// A verse present in only one of the compared corpora.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerseDiff {
    pub book: String,
    pub location: VerseLocation,
    pub present_in: Side,
    pub text: String,
}

impl VerseDiff {
    fn from_record(record: &VerseRecord, present_in: Side) -> Self {
        Self {
            book: record.book.clone(),
            location: record.location(),
            present_in,
            text: record.text.clone(),
        }
    }
}

/// Summary of a corpus comparison.
#[derive(Debug, Clone, Serialize)]
pub struct DiffSummary {
    pub shared_verses: usize,
    pub left_only: usize,
    pub right_only: usize,
    pub books_left: usize,
    pub books_right: usize,
}

fn order(a: &VerseRecord, b: &VerseRecord) -> Ordering {
    a.book.cmp(&b.book).then(a.key().cmp(&b.key()))
}

/// Verses whose (book, key) exists in exactly one corpus, in index order.
pub fn diff_corpora(left: &BibleCorpus, right: &BibleCorpus) -> Vec<VerseDiff> {
    let (a, b) = (left.records(), right.records());
    let (mut i, mut j) = (0, 0);
    let mut diffs = Vec::new();

    while i < a.len() && j < b.len() {
        match order(&a[i], &b[j]) {
            Ordering::Less => {
                diffs.push(VerseDiff::from_record(&a[i], Side::Left));
                i += 1;
            }
            Ordering::Greater => {
                diffs.push(VerseDiff::from_record(&b[j], Side::Right));
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    diffs.extend(a[i..].iter().map(|r| VerseDiff::from_record(r, Side::Left)));
    diffs.extend(b[j..].iter().map(|r| VerseDiff::from_record(r, Side::Right)));
    diffs
}

pub fn summarize(left: &BibleCorpus, right: &BibleCorpus, diffs: &[VerseDiff]) -> DiffSummary {
    let left_only = diffs.iter().filter(|d| d.present_in == Side::Left).count();
    let right_only = diffs.len() - left_only;
    DiffSummary {
        shared_verses: left.records().len() - left_only,
        left_only,
        right_only,
        books_left: left.index().book_count(),
        books_right: right.index().book_count(),
    }
}
