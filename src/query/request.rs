//! Search requests against a database path.
//!
//! A [`SearchRequest`] opens a fresh snapshot for every search, so it sees
//! everything committed (synonyms included) before the search started.
//! Searches run on a background thread and deliver exactly one result
//! through a [`SearchHandle`]. One request runs one search at a time:
//!
//! ```text
//! Idle -> Executing -> Completed | Failed | Cancelled
//! ```

use crate::error::{Result, SearchError};
use crate::index::reader::IndexReader;
use crate::index::types::DocId;
use crate::query::executor::{QueryExecutor, ResultSet, SortOrder, SpellCorrection};
use crate::query::highlight::{self, CharRange};
use crate::query::parser::{parse_query, SearchQuery};
use crate::query::spelling::SpellingCorrector;
use crate::utils::{CancellationProbe, CancellationToken, EngineConfig, Language};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Instant;
use tracing::debug;

/// Lifecycle of the most recent search of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Executing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Default)]
struct Current {
    state: RequestState,
    token: Option<CancellationToken>,
}

/// Pending result of one search
#[derive(Debug)]
pub struct SearchHandle {
    receiver: Receiver<Result<ResultSet>>,
    token: CancellationToken,
}

impl SearchHandle {
    /// Block until the search completes, fails or is cancelled
    pub fn wait(self) -> Result<ResultSet> {
        self.receiver
            .recv()
            .unwrap_or_else(|_| Err(SearchError::Engine("search worker stopped".into())))
    }

    /// The result, if it is already available
    pub fn try_result(&self) -> Option<Result<ResultSet>> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(SearchError::Engine("search worker stopped".into())))
            }
        }
    }

    /// Stop the search. Has no effect once it has finished.
    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Searches one database
pub struct SearchRequest {
    path: PathBuf,
    config: EngineConfig,
    spell_correction: SpellCorrection,
    sort_order: SortOrder,
    current: Arc<Mutex<Current>>,
}

impl SearchRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            config: EngineConfig::default(),
            spell_correction: SpellCorrection::None,
            sort_order: SortOrder::relevance(),
            current: Arc::new(Mutex::new(Current::default())),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn spell_correction(&self) -> SpellCorrection {
        self.spell_correction
    }

    pub fn set_spell_correction(&mut self, method: SpellCorrection) {
        self.spell_correction = method;
    }

    pub fn sort_order(&self) -> &SortOrder {
        &self.sort_order
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        self.sort_order = order;
    }

    /// Must match the language the database was indexed with
    pub fn set_stemming_language(&mut self, language: Option<Language>) {
        self.config.stemming_language = language;
    }

    pub fn state(&self) -> RequestState {
        self.current.lock().state
    }

    pub fn is_in_progress(&self) -> bool {
        self.state() == RequestState::Executing
    }

    /// Search for the first page of results
    pub fn search(&self, query: SearchQuery) -> Result<SearchHandle> {
        self.search_with_range(query, 0, self.config.default_page_size as i64)
    }

    /// Search on a background thread for results
    /// `top_doc_index..top_doc_index + docs_per_page`
    pub fn search_with_range(
        &self,
        query: SearchQuery,
        top_doc_index: i64,
        docs_per_page: i64,
    ) -> Result<SearchHandle> {
        let (top, count) = validate_range(top_doc_index, docs_per_page)?;
        let token = self.begin()?;

        let job = SearchJob {
            path: self.path.clone(),
            config: self.config.clone(),
            spell_correction: self.spell_correction,
            sort_order: self.sort_order.clone(),
        };
        let (sender, receiver) = mpsc::channel();
        let current = Arc::clone(&self.current);
        let worker_token = token.clone();

        let spawned = thread::Builder::new()
            .name("locus-search".into())
            .spawn(move || {
                let result = job.run(&query, top, count, &worker_token);
                finish(&current, &result);
                // The caller may have dropped its handle
                let _ = sender.send(result);
            });

        if let Err(err) = spawned {
            let result = Err(SearchError::Io(err));
            finish(&self.current, &result);
            return result;
        }

        Ok(SearchHandle { receiver, token })
    }

    /// Run a search on the calling thread
    pub fn execute_blocking(
        &self,
        query: &SearchQuery,
        top_doc_index: i64,
        docs_per_page: i64,
    ) -> Result<ResultSet> {
        let (top, count) = validate_range(top_doc_index, docs_per_page)?;
        let token = self.begin()?;

        let job = SearchJob {
            path: self.path.clone(),
            config: self.config.clone(),
            spell_correction: self.spell_correction,
            sort_order: self.sort_order.clone(),
        };
        let result = job.run(query, top, count, &token);
        finish(&self.current, &result);
        result
    }

    /// Cancel the search in progress, if any
    pub fn cancel(&self) {
        if let Some(token) = &self.current.lock().token {
            token.cancel();
        }
    }

    /// Live documents in the database right now
    pub fn document_count(&self) -> Result<u64> {
        Ok(IndexReader::open(&self.path)?.document_count())
    }

    /// Character ranges of the result's query terms inside a stored field
    pub fn fetch_char_ranges(
        &self,
        result: &ResultSet,
        field: &str,
        doc_id: DocId,
        probe: &dyn CancellationProbe,
    ) -> Result<Vec<CharRange>> {
        let reader = IndexReader::open(&self.path)?;
        highlight::fetch_char_ranges(
            &reader,
            &self.config.analyzer(),
            &result.query_terms,
            field,
            doc_id,
            probe,
        )
    }

    /// Completions for a partially typed word, most frequent first
    pub fn suggestions_for_word_fragment(&self, fragment: &str, max: usize) -> Result<Vec<String>> {
        let reader = IndexReader::open(&self.path)?;
        SpellingCorrector::new(&reader, &self.config.spelling)
            .suggestions_for_word_fragment(fragment, max)
    }

    /// Move to `Executing`, refusing if a search is already running
    fn begin(&self) -> Result<CancellationToken> {
        let mut current = self.current.lock();
        if current.state == RequestState::Executing {
            return Err(SearchError::RequestInProgress);
        }
        let token = CancellationToken::new();
        current.state = RequestState::Executing;
        current.token = Some(token.clone());
        Ok(token)
    }
}

/// Everything a search needs, detached from the request
struct SearchJob {
    path: PathBuf,
    config: EngineConfig,
    spell_correction: SpellCorrection,
    sort_order: SortOrder,
}

impl SearchJob {
    fn run(
        &self,
        query: &SearchQuery,
        top: usize,
        count: usize,
        probe: &dyn CancellationProbe,
    ) -> Result<ResultSet> {
        let start = Instant::now();
        let reader = IndexReader::open(&self.path)?;
        probe.checkpoint()?;

        let tree = parse_query(query, &self.config.analyzer(), reader.synonyms())?;
        let result = QueryExecutor::new(&reader, &self.config).execute(
            &tree,
            top,
            count,
            &self.sort_order,
            self.spell_correction,
            probe,
        )?;

        debug!(
            query = %query.query_string,
            matches = result.match_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "search finished"
        );
        Ok(result)
    }
}

fn validate_range(top_doc_index: i64, docs_per_page: i64) -> Result<(usize, usize)> {
    if top_doc_index < 0 {
        return Err(SearchError::InvalidRange(format!(
            "top document index {} is negative",
            top_doc_index
        )));
    }
    if docs_per_page <= 0 {
        return Err(SearchError::InvalidRange(format!(
            "docs per page must be positive, got {}",
            docs_per_page
        )));
    }
    let top = usize::try_from(top_doc_index)
        .map_err(|_| SearchError::InvalidRange("top document index too large".into()))?;
    let count = usize::try_from(docs_per_page)
        .map_err(|_| SearchError::InvalidRange("docs per page too large".into()))?;
    Ok((top, count))
}

fn finish<T>(current: &Mutex<Current>, result: &Result<T>) {
    let mut current = current.lock();
    current.state = match result {
        Ok(_) => RequestState::Completed,
        Err(SearchError::Cancelled) => RequestState::Cancelled,
        Err(_) => RequestState::Failed,
    };
    current.token = None;
}
