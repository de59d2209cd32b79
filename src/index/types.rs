use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for a document in the database.
/// Assigned sequentially, never reused, preserved by compaction.
pub type DocId = u32;

/// Segment identifier
pub type SegmentId = u32;

/// Sort slot number (1-based)
pub type SlotNumber = u32;

/// Field name -> raw values, as stored with `field: true`
pub type StoredFields = BTreeMap<String, Vec<String>>;

/// On-disk format version recorded in meta.json
pub const FORMAT_VERSION: u32 = 1;

/// Database metadata stored in meta.json. Replacing this file is the
/// commit point of every transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    /// Incremented on every commit; names the current tombstone file
    pub generation: u64,
    pub next_doc_id: DocId,
    pub next_segment_id: SegmentId,
    /// Live segments, oldest first
    pub segments: Vec<SegmentId>,
    /// Live (not deleted) documents
    pub doc_count: u64,
    /// Documents physically present in live segments, deleted ones included
    pub stored_count: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Default for IndexMeta {
    fn default() -> Self {
        let now = now_secs();
        Self {
            version: FORMAT_VERSION,
            generation: 0,
            next_doc_id: 1,
            next_segment_id: 1,
            segments: Vec::new(),
            doc_count: 0,
            stored_count: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl IndexMeta {
    pub fn deleted_count(&self) -> u64 {
        self.stored_count.saturating_sub(self.doc_count)
    }
}

/// Per-document entry in docs.bin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocEntry {
    pub doc_id: DocId,
    pub external_id: Option<String>,
    /// Weighted number of indexed terms, used for length normalization
    pub length: u32,
}

/// A value in a sort slot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotValue {
    Text(String),
    Numeric(f64),
}

impl SlotValue {
    /// Total order used for sorting: numbers before text, NaN last among numbers
    pub fn compare(&self, other: &SlotValue) -> Ordering {
        match (self, other) {
            (SlotValue::Numeric(a), SlotValue::Numeric(b)) => a.total_cmp(b),
            (SlotValue::Text(a), SlotValue::Text(b)) => a.cmp(b),
            (SlotValue::Numeric(_), SlotValue::Text(_)) => Ordering::Less,
            (SlotValue::Text(_), SlotValue::Numeric(_)) => Ordering::Greater,
        }
    }
}

impl std::fmt::Display for SlotValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SlotValue::Text(s) => f.write_str(s),
            SlotValue::Numeric(n) => write!(f, "{}", n),
        }
    }
}

/// Occurrences of one term inside one document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TermOccurrences {
    /// Within-document frequency, each occurrence counted with its field weight
    pub wdf: u32,
    /// Sorted, deduplicated word positions
    pub positions: Vec<u32>,
}

impl TermOccurrences {
    pub fn record(&mut self, position: u32, weight: u32) {
        self.wdf = self.wdf.saturating_add(weight);
        if let Err(idx) = self.positions.binary_search(&position) {
            self.positions.insert(idx, position);
        }
    }
}

/// Posting entry - one document containing a term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub wdf: u32,
    pub positions: Vec<u32>,
}

/// Everything the storage engine keeps about one document, produced by
/// analysis before the document is handed to a transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalyzedDocument {
    pub external_id: Option<String>,
    pub terms: BTreeMap<String, TermOccurrences>,
    /// Folded, unstemmed words from spell-enabled fields with their counts
    pub spelling: BTreeMap<String, u32>,
    pub stored: StoredFields,
    pub slots: BTreeMap<SlotNumber, SlotValue>,
    /// (boolean key, value) pairs
    pub booleans: BTreeSet<(String, String)>,
}

impl AnalyzedDocument {
    /// Weighted document length
    pub fn length(&self) -> u32 {
        self.terms
            .values()
            .fold(0u32, |acc, occ| acc.saturating_add(occ.wdf))
    }
}

/// Current unix time in seconds
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
