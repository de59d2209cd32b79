//! # Locus - Embedded Full-Text Search Engine
//!
//! Locus indexes schema-described records into an on-disk database and
//! answers ranked keyword queries with stemming, spelling correction,
//! synonyms, boolean filters and slot-based sorting.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`index`] - Schema, records and the segment storage engine
//! - [`indexer`] - Record validation, batch transactions and the indexing queue
//! - [`query`] - Query parsing, BM25 execution, spelling and search requests
//! - [`thesaurus`] - Per-database synonym table
//! - [`output`] - Coloured result printing for the CLI
//! - [`utils`] - Tokenizer, trigrams, encoding, configuration and cancellation
//!
//! ## Quick Start
//!
//! ```ignore
//! use locus::index::{IndexableRecord, Schema};
//! use locus::indexer::Indexer;
//! use locus::query::{SearchQuery, SearchRequest};
//! use locus::utils::{EngineConfig, NeverCancel};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let path = Path::new("/tmp/recipes.db");
//! Indexer::create_database(path)?;
//!
//! let schema = Arc::new(Schema::from_json(r#"{
//!     "id":    {"id": true, "field": true},
//!     "title": {"field": true, "index": true, "spell": true, "weight": 5}
//! }"#)?);
//! let mut indexer = Indexer::open(path, Arc::clone(&schema), EngineConfig::default())?;
//!
//! let mut record = IndexableRecord::new(schema);
//! record.add_value("id", "r1")?;
//! record.add_value("title", "Chilled water melon soup")?;
//! indexer.apply_batch(&[record], &NeverCancel)?;
//!
//! let request = SearchRequest::new(path);
//! let results = request.search(SearchQuery::new("melon"))?.wait()?;
//! for hit in &results.results {
//!     println!("{:.2} {:?}", hit.weight, hit.fields["title"]);
//! }
//! ```
//!
//! ## Storage
//!
//! Every commit writes one immutable segment and then swaps `meta.json`,
//! so readers always see a complete generation. Deletions are tombstones
//! until compaction merges the segments back into one.

pub mod error;
pub mod index;
pub mod indexer;
pub mod output;
pub mod query;
pub mod thesaurus;
pub mod utils;

pub use error::{Result, SearchError};
