//! Database handle and write transactions.
//!
//! A database is a directory:
//!
//! ```text
//! <db>/meta.json                    current generation, live segments, counters
//! <db>/segments/seg_NNNNNN/         immutable segment files
//! <db>/tombstones/del_<gen>.bin     deleted doc ids as of generation <gen>
//! <db>/synonyms.json                thesaurus
//! ```
//!
//! A commit writes a new segment under a temporary name and renames it
//! into place, writes the next generation's tombstone file, then replaces
//! `meta.json` through a rename. Nothing is visible to readers until that
//! last rename.

use crate::error::{Result, SearchError};
use crate::index::compact;
use crate::index::reader::{
    read_meta, segment_dir, tombstone_path, IndexReader, META_FILE, TOMBSTONE_MAGIC,
};
use crate::index::types::*;
use crate::index::writer::SegmentWriter;
use crate::utils::{write_checked_file, CompactionPolicy};
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Handle to an on-disk database
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    meta: IndexMeta,
    policy: CompactionPolicy,
}

impl Database {
    /// Create a new, empty database. Fails if anything exists at `path`.
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            return Err(SearchError::AlreadyExists(path.to_path_buf()));
        }

        fs::create_dir_all(path.join("segments"))?;
        fs::create_dir_all(path.join("tombstones"))?;

        let meta = IndexMeta::default();
        write_tombstones(path, meta.generation, &RoaringBitmap::new())?;
        write_meta(path, &meta)?;

        info!(path = %path.display(), "created database");
        Ok(Self {
            path: path.to_path_buf(),
            meta,
            policy: CompactionPolicy::default(),
        })
    }

    pub fn open(path: &Path) -> Result<Self> {
        if !path.join(META_FILE).exists() {
            return Err(SearchError::NotFound(format!(
                "no database at {}",
                path.display()
            )));
        }
        let meta = read_meta(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            meta,
            policy: CompactionPolicy::default(),
        })
    }

    /// True when `path` holds a database this version can open
    pub fn exists(path: &Path) -> bool {
        read_meta(path).is_ok()
    }

    pub fn with_compaction_policy(mut self, policy: CompactionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata as of the last commit made or observed by this handle
    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn document_count(&self) -> u64 {
        self.meta.doc_count
    }

    /// Open a read-only snapshot of the current committed state
    pub fn reader(&self) -> Result<IndexReader> {
        IndexReader::open(&self.path)
    }

    /// Start a write transaction against the current committed state
    pub fn begin_mutation(&mut self) -> Result<Transaction<'_>> {
        let snapshot = IndexReader::open(&self.path)?;
        self.meta = snapshot.meta().clone();
        let next_doc_id = self.meta.next_doc_id;
        debug!(generation = self.meta.generation, "transaction started");

        Ok(Transaction {
            db: self,
            snapshot,
            writer: SegmentWriter::new(),
            deletes: RoaringBitmap::new(),
            added_ids: FxHashMap::default(),
            next_doc_id,
            finished: false,
        })
    }

    /// Merge all live documents into a single segment and drop tombstones.
    /// Returns false when the database was already compact.
    pub fn compact(&mut self) -> Result<bool> {
        match compact::compact_database(&self.path)? {
            Some(meta) => {
                self.meta = meta;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// An all-or-nothing batch of adds and deletes.
///
/// Dropping a transaction without calling [`Transaction::commit`] discards it.
pub struct Transaction<'a> {
    db: &'a mut Database,
    snapshot: IndexReader,
    writer: SegmentWriter,
    /// Committed documents deleted by this transaction
    deletes: RoaringBitmap,
    /// External ids of documents added by this transaction
    added_ids: FxHashMap<String, DocId>,
    next_doc_id: DocId,
    finished: bool,
}

impl Transaction<'_> {
    /// Snapshot the transaction started from
    pub fn snapshot(&self) -> &IndexReader {
        &self.snapshot
    }

    /// Add a document and return its new doc id.
    ///
    /// The external id must not belong to a live document; replacing is
    /// done by deleting the old document first.
    pub fn add_document(&mut self, doc: AnalyzedDocument) -> Result<DocId> {
        if let Some(id) = &doc.external_id {
            if self.lookup_by_external_id(id).is_ok() {
                return Err(SearchError::validation(
                    "id",
                    format!("a document with id '{}' already exists", id),
                ));
            }
        }

        let doc_id = self.next_doc_id;
        self.next_doc_id = doc_id
            .checked_add(1)
            .ok_or_else(|| SearchError::Engine("document id space exhausted".into()))?;

        if let Some(id) = &doc.external_id {
            self.added_ids.insert(id.clone(), doc_id);
        }
        self.writer.add_document(doc_id, doc);
        Ok(doc_id)
    }

    /// Delete a committed document or one added earlier in this transaction
    pub fn delete_document(&mut self, doc_id: DocId) -> Result<()> {
        if let Some(doc) = self.writer.remove_document(doc_id) {
            if let Some(id) = doc.external_id {
                self.added_ids.remove(&id);
            }
            return Ok(());
        }

        if self.snapshot.is_live(doc_id) && !self.deletes.contains(doc_id) {
            self.deletes.insert(doc_id);
            return Ok(());
        }

        Err(SearchError::NotFound(format!("document {}", doc_id)))
    }

    /// Doc id of a live document, including uncommitted changes
    pub fn lookup_by_external_id(&self, id: &str) -> Result<DocId> {
        if let Some(&doc_id) = self.added_ids.get(id) {
            return Ok(doc_id);
        }
        match self.snapshot.lookup_by_external_id(id) {
            Ok(doc_id) if !self.deletes.contains(doc_id) => Ok(doc_id),
            _ => Err(SearchError::NotFound(format!("document with id '{}'", id))),
        }
    }

    /// Live documents as they would be after commit
    pub fn document_count(&self) -> u64 {
        self.snapshot.document_count() - self.deletes.len() + self.writer.doc_count() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.writer.is_empty() && self.deletes.is_empty()
    }

    /// Apply the transaction. Returns the new generation.
    pub fn commit(mut self) -> Result<u64> {
        self.finished = true;
        if self.is_empty() {
            return Ok(self.snapshot.generation());
        }

        let path = self.db.path.clone();
        let base = read_meta(&path)?;
        if base.generation != self.snapshot.generation() {
            return Err(SearchError::Conflict(format!(
                "database moved from generation {} to {} during the transaction",
                self.snapshot.generation(),
                base.generation
            )));
        }

        let mut meta = base.clone();
        meta.generation += 1;
        meta.next_doc_id = self.next_doc_id;
        meta.doc_count = self.document_count();
        meta.updated_at = now_secs();

        let mut new_segment = None;
        if !self.writer.is_empty() {
            let seg_id = meta.next_segment_id;
            meta.next_segment_id += 1;
            meta.segments.push(seg_id);
            meta.stored_count += self.writer.doc_count() as u64;
            new_segment = Some(segment_dir(&path, seg_id));
        }

        let mut deleted = self.snapshot.deleted_doc_ids().clone();
        deleted |= &self.deletes;

        if let Err(err) = self.write_generation(&path, new_segment.as_deref(), &deleted, &meta) {
            // Nothing is visible before meta.json is replaced; remove the leftovers
            if let Some(dir) = &new_segment {
                let _ = fs::remove_dir_all(dir);
            }
            let _ = fs::remove_file(tombstone_path(&path, meta.generation));
            return Err(err);
        }

        let old_tombstones = tombstone_path(&path, base.generation);
        if let Err(err) = fs::remove_file(&old_tombstones) {
            warn!(path = %old_tombstones.display(), error = %err, "failed to remove old tombstones");
        }

        info!(
            generation = meta.generation,
            added = self.writer.doc_count(),
            deleted = self.deletes.len(),
            live = meta.doc_count,
            "committed transaction"
        );

        let generation = meta.generation;
        let should_compact = self.db.policy.should_compact(
            meta.segments.len(),
            meta.deleted_count(),
            meta.stored_count,
        );
        self.db.meta = meta;

        if should_compact {
            match self.db.compact() {
                Ok(_) => return Ok(self.db.meta.generation),
                Err(err) => warn!(error = %err, "automatic compaction failed"),
            }
        }

        Ok(generation)
    }

    fn write_generation(
        &self,
        path: &Path,
        new_segment: Option<&Path>,
        deleted: &RoaringBitmap,
        meta: &IndexMeta,
    ) -> Result<()> {
        if let Some(final_dir) = new_segment {
            let tmp_dir = final_dir.with_extension("tmp");
            if tmp_dir.exists() {
                fs::remove_dir_all(&tmp_dir)?;
            }
            if let Err(err) = self.writer.write(&tmp_dir) {
                let _ = fs::remove_dir_all(&tmp_dir);
                return Err(err.into());
            }
            fs::rename(&tmp_dir, final_dir)?;
        }

        write_tombstones(path, meta.generation, deleted)?;
        write_meta(path, meta)
    }

    /// Discard all changes
    pub fn abort(mut self) {
        self.finished = true;
        debug!(
            pending = self.writer.doc_count(),
            deletes = self.deletes.len(),
            "transaction aborted"
        );
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.finished && !self.is_empty() {
            debug!("uncommitted transaction dropped, changes discarded");
        }
    }
}

/// Atomically replace meta.json
pub(crate) fn write_meta(db_path: &Path, meta: &IndexMeta) -> Result<()> {
    let tmp = db_path.join(format!("{}.tmp", META_FILE));
    let json = serde_json::to_vec_pretty(meta).map_err(|e| SearchError::Engine(e.to_string()))?;

    let mut file = File::create(&tmp)?;
    file.write_all(&json)?;
    file.sync_all()?;
    fs::rename(&tmp, db_path.join(META_FILE))?;
    Ok(())
}

/// Write the deleted-doc bitmap of a generation
pub(crate) fn write_tombstones(
    db_path: &Path,
    generation: u64,
    deleted: &RoaringBitmap,
) -> Result<()> {
    let path = tombstone_path(db_path, generation);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut payload = Vec::with_capacity(deleted.serialized_size());
    deleted.serialize_into(&mut payload)?;
    write_checked_file(&path, TOMBSTONE_MAGIC, &payload)?;
    Ok(())
}
