pub mod compact;
pub mod database;
pub mod loader;
pub mod reader;
pub mod record;
pub mod schema;
pub mod stats;
pub mod types;
pub mod writer;

pub use database::{Database, Transaction};
pub use reader::IndexReader;
pub use record::IndexableRecord;
pub use schema::{FieldOptions, Schema};
pub use types::*;
pub use writer::SegmentWriter;
