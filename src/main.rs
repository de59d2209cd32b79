use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use locus::index::loader::parse_flat_records;
use locus::index::stats::DatabaseStats;
use locus::index::{Database, Schema};
use locus::indexer::{Indexer, IndexingQueue, RecordOutcome};
use locus::output;
use locus::query::{QueryOperator, SearchQuery, SearchRequest, SortOrder, SpellCorrection};
use locus::thesaurus::Thesaurus;
use locus::utils::{EngineConfig, Language};
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "locus")]
#[command(about = "Embedded full-text search engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log progress (same as RUST_LOG=info)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Engine config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add or replace records from flat `field=value` files
    Index {
        /// Database directory
        db: PathBuf,
        /// Schema file (JSON)
        schema: PathBuf,
        /// Record files; blank lines separate records
        #[arg(required = true)]
        data: Vec<PathBuf>,
        /// Create the database first
        #[arg(short, long)]
        create: bool,
        /// Stemming language, or "none"
        #[arg(short, long)]
        language: Option<String>,
        /// Records per transaction
        #[arg(long, default_value_t = 1000)]
        batch_size: usize,
    },
    /// Manage the synonyms of a database
    Thesaurus {
        /// Database directory
        db: PathBuf,
        /// CSV file, one `word,synonym,...` row per word
        csv: Option<PathBuf>,
        /// Remove every synonym before adding
        #[arg(long)]
        clear: bool,
        /// Print the synonym table
        #[arg(short, long)]
        display: bool,
    },
    /// Search a database
    Search {
        /// Database directory
        db: PathBuf,
        /// Query words
        query: Vec<String>,
        /// How words combine: or, and, phrase
        #[arg(short, long, default_value = "or")]
        operator: String,
        /// Boolean filter `key=value` (repeatable)
        #[arg(short, long)]
        filter: Vec<String>,
        /// Sort keys: +N / -N for slot N, or "relevance" (repeatable)
        #[arg(short, long)]
        sort: Vec<String>,
        /// Spelling correction: none, suggest, auto
        #[arg(long, default_value = "none")]
        spell: String,
        /// Index of the first result to show
        #[arg(short, long, default_value_t = 0)]
        top: i64,
        /// Results per page
        #[arg(short = 'n', long)]
        count: Option<i64>,
        /// Stemming language, or "none"
        #[arg(short, long)]
        language: Option<String>,
        /// Colored output
        #[arg(long, value_enum, default_value_t = ColorMode::Auto)]
        color: ColorMode,
    },
    /// Show database statistics
    Stats {
        /// Database directory
        db: PathBuf,
    },
    /// Merge segments and drop deleted documents
    Compact {
        /// Database directory
        db: PathBuf,
    },
    /// Complete a partially typed word
    Suggest {
        /// Database directory
        db: PathBuf,
        fragment: String,
        /// Maximum suggestions
        #[arg(short, long, default_value_t = 10)]
        max: usize,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ColorMode {
    Auto,
    Never,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::load().context("Failed to load config")?,
    };

    match cli.command {
        Commands::Index {
            db,
            schema,
            data,
            create,
            language,
            batch_size,
        } => {
            let config = with_language(config, language.as_deref())?;
            run_index(&db, &schema, &data, create, batch_size, config)?;
        }
        Commands::Thesaurus {
            db,
            csv,
            clear,
            display,
        } => {
            run_thesaurus(&db, csv.as_deref(), clear, display)?;
        }
        Commands::Search {
            db,
            query,
            operator,
            filter,
            sort,
            spell,
            top,
            count,
            language,
            color,
        } => {
            let config = with_language(config, language.as_deref())?;
            let count = count.unwrap_or(config.default_page_size as i64);

            let mut search = SearchQuery::new(query.join(" "))
                .with_operator(operator.parse::<QueryOperator>()?);
            for spec in &filter {
                let Some((key, value)) = spec.split_once('=') else {
                    bail!("Filter '{}' is not of the form key=value", spec);
                };
                search = search.with_filter(key.trim(), value.trim());
            }

            let analyzer = config.analyzer();
            let mut request = SearchRequest::new(&db).with_config(config);
            request.set_spell_correction(spell.parse::<SpellCorrection>()?);
            request.set_sort_order(SortOrder::parse(&sort)?);

            let result = request
                .execute_blocking(&search, top, count)
                .with_context(|| format!("Search failed in {}", db.display()))?;
            let first = usize::try_from(top).unwrap_or(0);
            let color = color == ColorMode::Auto && std::io::stdout().is_terminal();
            output::print_results(&result, first, &analyzer, color)?;
        }
        Commands::Stats { db } => {
            let stats = DatabaseStats::collect(&db)
                .with_context(|| format!("Failed to read {}", db.display()))?;
            println!("{}", stats);
        }
        Commands::Compact { db } => {
            let mut database = Database::open(&db)
                .with_context(|| format!("Failed to open {}", db.display()))?;
            if database.compact()? {
                println!(
                    "Compacted {}: {} documents in 1 segment",
                    db.display(),
                    database.document_count()
                );
            } else {
                println!("{} is already compact", db.display());
            }
        }
        Commands::Suggest { db, fragment, max } => {
            let request = SearchRequest::new(&db).with_config(config);
            let words = request.suggestions_for_word_fragment(&fragment, max)?;
            output::print_suggestions(&words)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn with_language(mut config: EngineConfig, language: Option<&str>) -> Result<EngineConfig> {
    match language {
        None => {}
        Some(name) if name.eq_ignore_ascii_case("none") => config.stemming_language = None,
        Some(name) => match Language::from_name(name) {
            Some(lang) => config.stemming_language = Some(lang),
            None => bail!("Unknown stemming language '{}'", name),
        },
    }
    Ok(config)
}

fn run_index(
    db: &Path,
    schema_path: &Path,
    data: &[PathBuf],
    create: bool,
    batch_size: usize,
    config: EngineConfig,
) -> Result<()> {
    let schema = Arc::new(
        Schema::from_file(schema_path)
            .with_context(|| format!("Invalid schema {}", schema_path.display()))?,
    );

    if create {
        Indexer::create_database(db)
            .with_context(|| format!("Failed to create database {}", db.display()))?;
        info!(path = %db.display(), "database created");
    }
    let indexer = Indexer::open(db, Arc::clone(&schema), config)
        .with_context(|| format!("Failed to open database {}", db.display()))?;

    // Parse everything up front so record numbers in errors refer to files
    let mut records = Vec::new();
    let mut rejected = 0usize;
    for path in data {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let flat = parse_flat_records(&text)
            .with_context(|| format!("Malformed record file {}", path.display()))?;
        for record in flat {
            let line = record.line;
            match record.into_record(&schema) {
                Ok(record) => records.push((path.clone(), line, record)),
                Err(err) => {
                    rejected += 1;
                    eprintln!("{}:{}: {}", path.display(), line, err);
                }
            }
        }
    }

    let pb = ProgressBar::new(records.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    let queue = IndexingQueue::new(indexer)?;
    let mut origins = Vec::new();
    let mut tickets = Vec::new();
    let mut pending = records.into_iter().peekable();
    while pending.peek().is_some() {
        let mut batch = Vec::with_capacity(batch_size.max(1));
        let mut batch_origins = Vec::with_capacity(batch_size.max(1));
        for (path, line, record) in pending.by_ref().take(batch_size.max(1)) {
            batch_origins.push((path, line));
            batch.push(record);
        }
        origins.push(batch_origins);
        tickets.push(queue.submit(batch));
    }

    let (mut added, mut replaced, mut deleted) = (0usize, 0usize, 0usize);
    for (ticket, batch_origins) in tickets.into_iter().zip(origins) {
        let outcome = ticket.wait().context("Indexing batch failed")?;
        for (outcome, (path, line)) in outcome.records.iter().zip(&batch_origins) {
            match outcome {
                RecordOutcome::Added(_) => added += 1,
                RecordOutcome::Replaced { .. } => replaced += 1,
                RecordOutcome::Deleted(_) => deleted += 1,
                RecordOutcome::Failed(err) => {
                    rejected += 1;
                    pb.suspend(|| eprintln!("{}:{}: {}", path.display(), line, err));
                }
            }
        }
        pb.inc(batch_origins.len() as u64);
    }
    pb.finish_with_message("done");

    println!(
        "Indexed {}: {} added, {} replaced, {} deleted, {} rejected",
        db.display(),
        added,
        replaced,
        deleted,
        rejected
    );
    Ok(())
}

fn run_thesaurus(db: &Path, csv_path: Option<&Path>, clear: bool, display: bool) -> Result<()> {
    let mut thesaurus =
        Thesaurus::open(db).with_context(|| format!("Failed to open database {}", db.display()))?;

    if clear {
        thesaurus.clear_synonyms()?;
        println!("Cleared synonyms of {}", db.display());
    }

    if let Some(path) = csv_path {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("Failed to open {}", path.display()))?;

        let mut rows = Vec::new();
        for row in reader.records() {
            let row = row.with_context(|| format!("Malformed CSV in {}", path.display()))?;
            let words: Vec<String> = row
                .iter()
                .filter(|word| !word.is_empty())
                .map(str::to_string)
                .collect();
            rows.push(words);
        }
        thesaurus.add_synonyms_from_array(&rows)?;
        println!("Added {} synonym rows to {}", rows.len(), db.display());
    }

    if display || (csv_path.is_none() && !clear) {
        output::print_synonyms(thesaurus.get_synonyms(), std::io::stdout().is_terminal())?;
    }
    Ok(())
}
