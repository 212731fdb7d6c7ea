//! Corpus loading: side-file cache probe, format-specific parse, cache write.

use crate::archive::parse_archive;
use crate::cache;
use crate::flat::parse_flat_text;
use crate::index::BibleCorpus;
use crate::markup::MarkupError;
use crate::models::{LoaderConfig, SourceFormat, VerseRecord};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single source record that could not be ingested. Logged and skipped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IngestionError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },
    #[error("unparseable chapter:verse '{0}'")]
    BadLocation(String),
    #[error("markup error: {0}")]
    Markup(String),
    #[error("encoding error: {0}")]
    Encoding(String),
    #[error("document has verses but no book name")]
    MissingBookName,
}

/// Failure to produce a corpus at all.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("markup error in index document: {0}")]
    Markup(#[from] MarkupError),
    #[error("archive has no index document")]
    MissingIndex,
    #[error("archive is missing document '{0}'")]
    MissingDocument(String),
    #[error("no verses found in {0}")]
    EmptyCorpus(PathBuf),
}

/// Parse a source file from scratch, ignoring any side-file cache.
pub fn parse_source(
    path: &Path,
    format: SourceFormat,
    config: &LoaderConfig,
) -> Result<Vec<VerseRecord>, LoadError> {
    let file = File::open(path)?;
    let records = match format {
        SourceFormat::FlatText => parse_flat_text(BufReader::new(file)),
        SourceFormat::Archive => parse_archive(BufReader::new(file), config.show_progress)?,
    };
    Ok(records)
}

/// Load a corpus, preferring the side-file cache when it is present and usable.
pub fn load_corpus(
    path: &Path,
    format: SourceFormat,
    config: &LoaderConfig,
) -> Result<BibleCorpus, LoadError> {
    if config.use_cache {
        if let Some(records) = cache::load(path).filter(|r| !r.is_empty()) {
            return Ok(BibleCorpus::new(format.theonym(), records));
        }
    }

    tracing::info!(path = %path.display(), %format, "parsing corpus source");
    let records = parse_source(path, format, config)?;
    if records.is_empty() {
        return Err(LoadError::EmptyCorpus(path.to_path_buf()));
    }

    let corpus = BibleCorpus::new(format.theonym(), records);
    tracing::info!(
        books = corpus.index().book_count(),
        verses = corpus.index().len(),
        "corpus built"
    );

    if config.write_cache {
        match cache::save(path, corpus.records()) {
            Ok(side_file) => {
                tracing::info!(path = %side_file.display(), "wrote side-file cache");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "could not write side-file cache");
            }
        }
    }

    Ok(corpus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::side_file_path;

    const FLAT: &str = "Chinese Union Version\n\
                        1 Gen 創世記 1:2 地是空虛混沌。\n\
                        1 Gen 創世記 1:1 起初，　神創造天地。\n\
                        43 Jn 約翰福音 3:16 　神愛世人。\n";

    #[test]
    fn test_fresh_parse_writes_cache_and_cache_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("books.txt");
        std::fs::write(&source, FLAT).unwrap();

        let config = LoaderConfig::default();
        let fresh = load_corpus(&source, SourceFormat::FlatText, &config).unwrap();
        assert!(side_file_path(&source).exists());
        assert_eq!(fresh.theonym(), "\u{3000}神");

        // Remove the source so only the cache can satisfy the load.
        std::fs::remove_file(&source).unwrap();
        let cached = load_corpus(&source, SourceFormat::FlatText, &config).unwrap();
        assert_eq!(cached.records(), fresh.records());
    }

    #[test]
    fn test_corrupt_cache_triggers_reparse() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("books.txt");
        std::fs::write(&source, FLAT).unwrap();
        std::fs::write(side_file_path(&source), "not a cache").unwrap();

        let corpus = load_corpus(&source, SourceFormat::FlatText, &LoaderConfig::default()).unwrap();
        assert_eq!(corpus.index().len(), 3);
        let rewritten = std::fs::read_to_string(side_file_path(&source)).unwrap();
        assert!(rewritten.starts_with("book\tchapter\tverse\ttext"));
    }

    #[test]
    fn test_cache_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("books.txt");
        std::fs::write(&source, FLAT).unwrap();

        let config = LoaderConfig {
            use_cache: false,
            write_cache: false,
            ..Default::default()
        };
        load_corpus(&source, SourceFormat::FlatText, &config).unwrap();
        assert!(!side_file_path(&source).exists());
    }

    #[test]
    fn test_empty_source_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("empty.txt");
        std::fs::write(&source, "=== nothing ===\n").unwrap();

        let result = load_corpus(&source, SourceFormat::FlatText, &LoaderConfig::default());
        assert!(matches!(result, Err(LoadError::EmptyCorpus(_))));
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_corpus(
            &dir.path().join("absent.txt"),
            SourceFormat::FlatText,
            &LoaderConfig::default(),
        );
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
