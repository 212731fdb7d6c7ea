//! Scripture Index CLI
//!
//! Parses Chinese scripture citations and prints the cited verses from a
//! flat text or EPUB corpus.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use scripture_index::citation::parse_citations;
use scripture_index::compare::{diff_corpora, summarize};
use scripture_index::loader::load_corpus;
use scripture_index::lookup::search;
use scripture_index::models::{LoaderConfig, SourceFormat};
use scripture_index::output::{
    print_diff, print_parsed, print_results, print_stats, write_json_file, write_parsed_json,
};
use scripture_index::registry::CorpusRegistry;

#[derive(Parser)]
#[command(name = "scripture-index")]
#[command(about = "Scripture citation parser and verse lookup")]
#[command(version)]
struct Cli {
    /// Only log warnings and errors (RUST_LOG overrides)
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Corpus source format (CLI version, mirrors models::SourceFormat)
#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliSourceFormat {
    /// Flat text, one verse per line
    Flat,
    /// EPUB archive with one document per book
    Archive,
}

impl From<CliSourceFormat> for SourceFormat {
    fn from(format: CliSourceFormat) -> Self {
        match format {
            CliSourceFormat::Flat => SourceFormat::FlatText,
            CliSourceFormat::Archive => SourceFormat::Archive,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Parse citations and print the structured result
    Parse {
        /// Citation string, e.g. "利未記 23:10-11，15-17；使徒行傳 4:32-5:12"
        citations: String,

        /// Print JSON instead of one line per citation
        #[arg(long)]
        json: bool,
    },

    /// Look up the verses for a citation string
    Lookup {
        /// Citation string
        citations: String,

        /// Path to the corpus source
        #[arg(long)]
        source: PathBuf,

        /// Source format
        #[arg(long, value_enum, default_value = "flat")]
        format: CliSourceFormat,

        /// Replace the corpus's native divine name with this string
        #[arg(long)]
        theonym: Option<String>,

        /// Write results as JSON to this path instead of printing
        #[arg(long)]
        json: Option<PathBuf>,

        /// Ignore and do not write the side-file cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Show corpus statistics
    Stats {
        /// Path to the corpus source
        #[arg(long)]
        source: PathBuf,

        /// Source format
        #[arg(long, value_enum, default_value = "flat")]
        format: CliSourceFormat,

        /// Ignore and do not write the side-file cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Report verses present in only one of two corpora
    Diff {
        /// Left corpus source
        #[arg(long)]
        left: PathBuf,

        /// Left corpus format
        #[arg(long, value_enum, default_value = "flat")]
        left_format: CliSourceFormat,

        /// Right corpus source
        #[arg(long)]
        right: PathBuf,

        /// Right corpus format
        #[arg(long, value_enum, default_value = "archive")]
        right_format: CliSourceFormat,

        /// Maximum number of differing verses to print
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Parse a source from scratch and write its side-file cache
    BuildCache {
        /// Path to the corpus source
        #[arg(long)]
        source: PathBuf,

        /// Source format
        #[arg(long, value_enum, default_value = "flat")]
        format: CliSourceFormat,
    },
}

fn init_logging(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn loader_config(no_cache: bool, quiet: bool) -> LoaderConfig {
    LoaderConfig {
        use_cache: !no_cache,
        write_cache: !no_cache,
        show_progress: !quiet,
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.quiet);
    let quiet = cli.quiet;

    match cli.command {
        Commands::Parse { citations, json } => {
            let parsed = parse_citations(&citations)?;
            if json {
                let mut stdout = std::io::stdout();
                write_parsed_json(&parsed, &mut stdout)?;
                println!();
            } else {
                print_parsed(&parsed);
            }
        }

        Commands::Lookup {
            citations,
            source,
            format,
            theonym,
            json,
            no_cache,
        } => {
            let parsed = parse_citations(&citations)?;
            let corpus = load_corpus(&source, format.into(), &loader_config(no_cache, quiet))?;
            let results = search(&corpus, &parsed, theonym.as_deref())?;

            match json {
                Some(path) => {
                    write_json_file(&results, &path)?;
                    eprintln!("Output: {}", path.display());
                }
                None => print_results(&results),
            }
        }

        Commands::Stats {
            source,
            format,
            no_cache,
        } => {
            let corpus = load_corpus(&source, format.into(), &loader_config(no_cache, quiet))?;
            print_stats(&corpus.stats());
        }

        Commands::Diff {
            left,
            left_format,
            right,
            right_format,
            limit,
        } => {
            let registry = CorpusRegistry::new(loader_config(false, quiet));
            let (left_corpus, right_corpus) = std::thread::scope(|s| {
                let l = s.spawn(|| registry.get_or_load(&left, left_format.into()));
                let r = s.spawn(|| registry.get_or_load(&right, right_format.into()));
                (l.join(), r.join())
            });
            let left_corpus = left_corpus.map_err(|_| "left corpus loader panicked")??;
            let right_corpus = right_corpus.map_err(|_| "right corpus loader panicked")??;

            let diffs = diff_corpora(&left_corpus, &right_corpus);
            let summary = summarize(&left_corpus, &right_corpus, &diffs);
            print_diff(&diffs, &summary, Some(limit));
        }

        Commands::BuildCache { source, format } => {
            let config = LoaderConfig {
                use_cache: false,
                write_cache: true,
                show_progress: !quiet,
            };
            let corpus = load_corpus(&source, format.into(), &config)?;
            eprintln!(
                "Cached {} verses from {} books",
                corpus.index().len(),
                corpus.index().book_count()
            );
        }
    }

    Ok(())
}
