//! Turns schema-checked records into documents and applies them to a
//! database in batches.
//!
//! A batch runs in one transaction. Records are analyzed in parallel, then
//! applied in order: a record that fails validation or names a missing
//! document is reported in [`BatchOutcome`] and the rest of the batch
//! still commits. Storage failures and cancellation abort the whole batch.

pub mod queue;

pub use queue::{IndexingQueue, IndexingTicket};

use crate::error::{Result, SearchError};
use crate::index::database::Database;
use crate::index::record::IndexableRecord;
use crate::index::schema::Schema;
use crate::index::types::*;
use crate::utils::{fold, Analyzer, CancellationProbe, EngineConfig};
use rayon::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// A record after validation, ready for a transaction
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedRecord {
    /// Remove the document with this external id
    Delete { id: String },
    /// Add the document, replacing any live document with the same id
    Upsert(AnalyzedDocument),
}

/// What happened to one record of a batch
#[derive(Debug)]
pub enum RecordOutcome {
    Added(DocId),
    Replaced { previous: DocId, doc_id: DocId },
    Deleted(DocId),
    Failed(SearchError),
}

impl RecordOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RecordOutcome::Failed(_))
    }
}

/// Result of one committed batch, one outcome per submitted record
#[derive(Debug)]
pub struct BatchOutcome {
    /// Database generation after the commit
    pub generation: u64,
    pub records: Vec<RecordOutcome>,
}

impl BatchOutcome {
    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.is_success()).count()
    }

    /// Failed records with their position in the batch
    pub fn failures(&self) -> impl Iterator<Item = (usize, &SearchError)> {
        self.records.iter().enumerate().filter_map(|(i, r)| match r {
            RecordOutcome::Failed(err) => Some((i, err)),
            _ => None,
        })
    }

    pub fn is_complete_success(&self) -> bool {
        self.records.iter().all(RecordOutcome::is_success)
    }
}

/// Single writer for one database path
#[derive(Debug)]
pub struct Indexer {
    db: Database,
    schema: Arc<Schema>,
    config: EngineConfig,
    analyzer: Analyzer,
}

impl Indexer {
    /// Attach to an existing database
    pub fn open(path: &Path, schema: Arc<Schema>, config: EngineConfig) -> Result<Self> {
        let db = Database::open(path)?.with_compaction_policy(config.compaction.clone());
        let analyzer = config.analyzer();
        Ok(Self {
            db,
            schema,
            config,
            analyzer,
        })
    }

    /// True if a valid database exists at `path`
    pub fn database_exists(path: &Path) -> bool {
        Database::exists(path)
    }

    /// Create an empty database. Fails if `path` already exists.
    pub fn create_database(path: &Path) -> Result<()> {
        Database::create(path).map(|_| ())
    }

    pub fn path(&self) -> &Path {
        self.db.path()
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&mut self) -> &mut Database {
        &mut self.db
    }

    pub fn document_count(&self) -> u64 {
        self.db.document_count()
    }

    pub fn is_delete_only(&self, record: &IndexableRecord) -> bool {
        record.is_delete_only()
    }

    /// Check a record against this indexer's schema and analyze it
    pub fn validate_and_convert(&self, record: &IndexableRecord) -> Result<ValidatedRecord> {
        for name in record.field_names() {
            if self.schema.field(name).is_none() {
                return Err(SearchError::schema(name, "field is not defined in the schema"));
            }
        }

        if record.is_delete_only() {
            if let Some(id) = record.external_id() {
                return Ok(ValidatedRecord::Delete { id: id.to_string() });
            }
        }

        let mut doc = AnalyzedDocument {
            external_id: record.external_id().map(str::to_string),
            ..AnalyzedDocument::default()
        };

        // Positions run across every field of the document, with a gap
        // after each value so phrases never span two values.
        let mut base = 0u32;

        for (name, values) in record.fields() {
            let Some(options) = self.schema.field(name) else {
                continue;
            };
            if options.is_inert() {
                continue;
            }

            for value in values {
                if options.stored {
                    doc.stored
                        .entry(name.to_string())
                        .or_default()
                        .push(value.clone());
                }

                if options.index || options.spell {
                    let tokens = self.analyzer.tokenize(value);
                    for token in &tokens {
                        if options.index {
                            doc.terms
                                .entry(token.term.clone())
                                .or_default()
                                .record(base.saturating_add(token.position), options.weight);
                        }
                        if options.spell {
                            *doc.spelling.entry(token.word.clone()).or_default() += 1;
                        }
                    }
                    if let Some(last) = tokens.last() {
                        base = base
                            .saturating_add(last.position + 1)
                            .saturating_add(self.config.position_gap);
                    }
                }

                if let Some(key) = &options.boolean_key {
                    doc.booleans.insert((key.clone(), value.clone()));
                }

                // Several values for one slot: the last one wins
                if let Some(slot) = options.text_slot {
                    doc.slots.insert(slot, SlotValue::Text(fold(value)));
                }
                if let Some(slot) = options.numeric_slot {
                    let number = value.trim().parse::<f64>().map_err(|_| {
                        SearchError::validation(name, format!("'{}' is not a number", value))
                    })?;
                    doc.slots.insert(slot, SlotValue::Numeric(number));
                }
            }
        }

        Ok(ValidatedRecord::Upsert(doc))
    }

    /// Apply a batch of records in one transaction.
    ///
    /// `probe` is polled before each record; when it fires nothing from the
    /// batch is committed and the call returns [`SearchError::Cancelled`].
    pub fn apply_batch(
        &mut self,
        records: &[IndexableRecord],
        probe: &dyn CancellationProbe,
    ) -> Result<BatchOutcome> {
        probe.checkpoint()?;

        let analyzed: Vec<Result<ValidatedRecord>> = records
            .par_iter()
            .map(|record| self.validate_and_convert(record))
            .collect();

        let mut txn = self.db.begin_mutation()?;
        let mut outcomes = Vec::with_capacity(analyzed.len());

        for validated in analyzed {
            if probe.should_stop() {
                txn.abort();
                info!(records = records.len(), "indexing batch cancelled");
                return Err(SearchError::Cancelled);
            }

            let outcome = match validated {
                Err(err) => RecordOutcome::Failed(err),
                Ok(ValidatedRecord::Delete { id }) => match txn.lookup_by_external_id(&id) {
                    Ok(doc_id) => match txn.delete_document(doc_id) {
                        Ok(()) => RecordOutcome::Deleted(doc_id),
                        Err(err) => RecordOutcome::Failed(err),
                    },
                    Err(err) => RecordOutcome::Failed(err),
                },
                Ok(ValidatedRecord::Upsert(doc)) => {
                    let previous = doc
                        .external_id
                        .as_deref()
                        .and_then(|id| txn.lookup_by_external_id(id).ok());
                    if let Some(old) = previous {
                        txn.delete_document(old)?;
                    }
                    match txn.add_document(doc) {
                        Ok(doc_id) => match previous {
                            Some(previous) => RecordOutcome::Replaced { previous, doc_id },
                            None => RecordOutcome::Added(doc_id),
                        },
                        Err(err) if err.is_storage_failure() => return Err(err),
                        Err(err) => RecordOutcome::Failed(err),
                    }
                }
            };

            if let RecordOutcome::Failed(err) = &outcome {
                debug!(error = %err, "record rejected");
            }
            outcomes.push(outcome);
        }

        let generation = txn.commit()?;
        let outcome = BatchOutcome {
            generation,
            records: outcomes,
        };
        info!(
            generation,
            succeeded = outcome.succeeded(),
            failed = outcome.records.len() - outcome.succeeded(),
            "indexing batch committed"
        );
        Ok(outcome)
    }
}
