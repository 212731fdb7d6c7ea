//! Scripture Index Library
//!
//! Parses free-form Chinese scripture citations and resolves them against a
//! verse corpus ingested from either a flat text file or an EPUB archive.
//!
//! # Example
//!
//! ```no_run
//! use scripture_index::prelude::*;
//! use std::path::Path;
//!
//! let config = LoaderConfig::default();
//! let corpus = load_corpus(Path::new("books.txt"), SourceFormat::FlatText, &config).unwrap();
//!
//! let parsed = parse_citations("利未記 23:10-11，15-17；使徒行傳 4:32-5:12").unwrap();
//! let results = search(&corpus, &parsed, Some("上帝")).unwrap();
//!
//! for result in &results {
//!     println!("{}: {} verses", result.citation, result.verses.len());
//! }
//! ```
//!
//! # Shared Corpora
//!
//! ```no_run
//! use scripture_index::prelude::*;
//! use std::path::Path;
//!
//! // Each (path, format) pair is parsed at most once per registry.
//! let registry = CorpusRegistry::new(LoaderConfig::default());
//! let corpus = registry
//!     .get_or_load(Path::new("CMNUNV.epub"), SourceFormat::Archive)
//!     .unwrap();
//!
//! println!("{} books", corpus.index().book_count());
//! ```

pub mod archive;
pub mod cache;
pub mod citation;
pub mod compare;
pub mod flat;
pub mod index;
pub mod loader;
pub mod lookup;
pub mod markup;
pub mod models;
pub mod output;
pub mod registry;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::archive::{parse_archive, parse_book_document, parse_verse_id, splice_notes};
    pub use crate::cache::{read_tsv, side_file_path, write_tsv, CacheError};
    pub use crate::citation::{normalize, parse_citations, parse_group, ParseError, ParserState};
    pub use crate::compare::{diff_corpora, summarize, DiffSummary, Side, VerseDiff};
    pub use crate::flat::{canonical_book, parse_flat_text, parse_line, MERGED_VERSE_MARKER};
    pub use crate::index::{BibleCorpus, VerseIndex};
    pub use crate::loader::{load_corpus, parse_source, IngestionError, LoadError};
    pub use crate::lookup::{
        coalesce_merged, lookup_book, replace_theonym, search, DisplayVerse, LookupError,
    };
    pub use crate::markup::{parse_document, Element, MarkupError, Node};
    pub use crate::models::{
        BookCitations, Citation, CitationEntry, CitationVerses, CorpusStats, LoaderConfig,
        ParsedCitations, SourceFormat, VerseLocation, VerseRecord, ARCHIVE_THEONYM,
        CHAPTER_STRIDE, FLAT_THEONYM, MAX_CHAPTER,
    };
    pub use crate::output::{
        format_citation, format_diff, print_diff, print_parsed, print_results, print_stats,
        write_json, write_json_file, write_parsed_json, OutputError,
    };
    pub use crate::registry::CorpusRegistry;
}

// Re-export commonly used types at the crate root
pub use citation::parse_citations;
pub use index::BibleCorpus;
pub use loader::load_corpus;
pub use lookup::search;
pub use models::{LoaderConfig, ParsedCitations, SourceFormat, VerseRecord};
