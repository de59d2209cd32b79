use crate::error::{Result, SearchError};
use crate::index::database::{write_meta, write_tombstones};
use crate::index::reader::{read_meta, segment_dir, tombstone_path, IndexReader};
use crate::index::types::*;
use crate::index::writer::SegmentWriter;
use roaring::RoaringBitmap;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Merge every live document into one new base segment.
///
/// Doc ids are preserved and the tombstone set becomes empty. Returns the
/// new metadata, or `None` when there was nothing to do (one segment and no
/// deletions), which makes repeated compaction a no-op.
pub fn compact_database(db_path: &Path) -> Result<Option<IndexMeta>> {
    let reader = IndexReader::open(db_path)?;
    let old = reader.meta().clone();

    if old.segments.len() <= 1 && reader.deleted_doc_ids().is_empty() {
        return Ok(None);
    }

    info!(
        segments = old.segments.len(),
        deleted = reader.deleted_doc_ids().len(),
        "compacting database"
    );

    let writer = rebuild_documents(&reader)?;

    let mut meta = old.clone();
    meta.generation += 1;
    meta.doc_count = reader.document_count();
    meta.stored_count = reader.document_count();
    meta.segments.clear();
    meta.updated_at = now_secs();

    let new_segment = if writer.is_empty() {
        None
    } else {
        let seg_id = meta.next_segment_id;
        meta.next_segment_id += 1;
        meta.segments.push(seg_id);
        Some(segment_dir(db_path, seg_id))
    };

    if let Some(dir) = &new_segment {
        let tmp_dir = dir.with_extension("tmp");
        if tmp_dir.exists() {
            fs::remove_dir_all(&tmp_dir)?;
        }
        writer.write(&tmp_dir)?;
        fs::rename(&tmp_dir, dir)?;
    }

    let result = (|| -> Result<()> {
        if read_meta(db_path)?.generation != old.generation {
            return Err(SearchError::Conflict(
                "database changed during compaction".into(),
            ));
        }
        write_tombstones(db_path, meta.generation, &RoaringBitmap::new())?;
        write_meta(db_path, &meta)
    })();

    if let Err(err) = result {
        if let Some(dir) = &new_segment {
            let _ = fs::remove_dir_all(dir);
        }
        let _ = fs::remove_file(tombstone_path(db_path, meta.generation));
        return Err(err);
    }

    for seg_id in &old.segments {
        let dir = segment_dir(db_path, *seg_id);
        if let Err(err) = fs::remove_dir_all(&dir) {
            warn!(path = %dir.display(), error = %err, "failed to remove compacted segment");
        }
    }
    let _ = fs::remove_file(tombstone_path(db_path, old.generation));

    info!(
        generation = meta.generation,
        live = meta.doc_count,
        "compaction finished"
    );
    Ok(Some(meta))
}

/// Invert the live postings of a snapshot back into per-document form
fn rebuild_documents(reader: &IndexReader) -> Result<SegmentWriter> {
    let mut docs: BTreeMap<DocId, AnalyzedDocument> = BTreeMap::new();

    for doc_id in reader.live_doc_ids() {
        let doc = AnalyzedDocument {
            external_id: reader.external_id(doc_id).map(str::to_string),
            stored: reader.fetch_stored_fields(doc_id)?,
            slots: reader.slot_values(doc_id),
            ..AnalyzedDocument::default()
        };
        docs.insert(doc_id, doc);
    }

    for term in reader.terms() {
        for posting in reader.postings_for(term) {
            if let Some(doc) = docs.get_mut(&posting.doc_id) {
                doc.terms.insert(
                    term.to_string(),
                    TermOccurrences {
                        wdf: posting.wdf,
                        positions: posting.positions,
                    },
                );
            }
        }
    }

    for word in reader.spelling_words()? {
        for (doc_id, count) in reader.spelling_postings(&word)? {
            if let Some(doc) = docs.get_mut(&doc_id) {
                doc.spelling.insert(word.clone(), count);
            }
        }
    }

    for (key, value, doc_ids) in reader.boolean_entries() {
        for doc_id in doc_ids {
            if let Some(doc) = docs.get_mut(&doc_id) {
                doc.booleans.insert((key.to_string(), value.to_string()));
            }
        }
    }

    let mut writer = SegmentWriter::new();
    for (doc_id, doc) in docs {
        writer.add_document(doc_id, doc);
    }
    Ok(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::database::Database;
    use crate::utils::CompactionPolicy;

    fn doc(id: &str, words: &[&str], tag: &str) -> AnalyzedDocument {
        let mut doc = AnalyzedDocument {
            external_id: Some(id.to_string()),
            ..AnalyzedDocument::default()
        };
        for (pos, word) in words.iter().enumerate() {
            doc.terms
                .entry(word.to_string())
                .or_default()
                .record(pos as u32, 2);
            *doc.spelling.entry(word.to_string()).or_default() += 1;
        }
        doc.stored.insert("id".into(), vec![id.to_string()]);
        doc.slots.insert(1, SlotValue::Text(id.to_string()));
        doc.booleans.insert(("tag".into(), tag.into()));
        doc
    }

    #[test]
    fn test_compaction_preserves_live_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut db = Database::create(&path).unwrap();

        let mut txn = db.begin_mutation().unwrap();
        let a = txn.add_document(doc("a", &["red", "apple"], "fruit")).unwrap();
        txn.add_document(doc("b", &["green", "apple"], "fruit")).unwrap();
        txn.commit().unwrap();

        let mut txn = db.begin_mutation().unwrap();
        let c = txn.add_document(doc("c", &["red", "car"], "vehicle")).unwrap();
        txn.delete_document(a).unwrap();
        txn.commit().unwrap();

        let before = db.reader().unwrap();
        let apple_before: Vec<_> = before.postings_for("apple").collect();

        assert!(db.compact().unwrap());
        let after = db.reader().unwrap();

        assert_eq!(after.meta().segments.len(), 1);
        assert!(after.deleted_doc_ids().is_empty());
        assert_eq!(after.document_count(), 2);
        assert_eq!(after.postings_for("apple").collect::<Vec<_>>(), apple_before);
        assert_eq!(after.term_frequency("red"), 1);
        assert_eq!(after.lookup_by_external_id("c").unwrap(), c);
        assert_eq!(after.doc_length(c), Some(4));
        assert_eq!(after.slot_value(1, c), Some(&SlotValue::Text("c".into())));
        assert!(after.boolean_docs("tag", "vehicle").contains(c));
        assert_eq!(after.spelling_frequency("red").unwrap(), 1);
        assert_eq!(after.fetch_stored_fields(c).unwrap()["id"], vec!["c"]);
    }

    #[test]
    fn test_open_snapshot_survives_compaction() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut db = Database::create(&path).unwrap();

        let mut ids = Vec::new();
        for (id, words) in [("a", ["water", "lily"]), ("b", ["waterfall", "rock"])] {
            let mut txn = db.begin_mutation().unwrap();
            ids.push(txn.add_document(doc(id, &words, "x")).unwrap());
            txn.commit().unwrap();
        }

        let snapshot = IndexReader::open(&path).unwrap();
        let old_dirs: Vec<_> = snapshot
            .segment_ids()
            .into_iter()
            .map(|seg_id| segment_dir(&path, seg_id))
            .collect();
        assert!(db.compact().unwrap());
        assert!(old_dirs.iter().all(|dir| !dir.exists()));

        let words: Vec<_> = snapshot
            .words_with_prefix("wa")
            .unwrap()
            .into_iter()
            .map(|(word, _)| word)
            .collect();
        assert_eq!(words, vec!["water", "waterfall"]);
        assert_eq!(snapshot.spelling_frequency("lily").unwrap(), 1);
        let grams = crate::utils::trigramize("rock");
        assert!(snapshot.words_sharing_trigrams(&grams).unwrap().contains_key("rock"));
        assert_eq!(snapshot.postings_for("rock").count(), 1);
        assert_eq!(snapshot.fetch_stored_fields(ids[1]).unwrap()["id"], vec!["b"]);
        assert_eq!(snapshot.generation() + 1, db.meta().generation);
    }

    #[test]
    fn test_compaction_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut db = Database::create(&path).unwrap();
        assert!(!db.compact().unwrap());

        for id in ["a", "b"] {
            let mut txn = db.begin_mutation().unwrap();
            txn.add_document(doc(id, &["word"], "x")).unwrap();
            txn.commit().unwrap();
        }

        assert!(db.compact().unwrap());
        let generation = db.meta().generation;
        assert!(!db.compact().unwrap());
        assert_eq!(db.meta().generation, generation);
        assert_eq!(db.reader().unwrap().document_count(), 2);
    }

    #[test]
    fn test_compacting_everything_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::create(&dir.path().join("db"))
            .unwrap()
            .with_compaction_policy(CompactionPolicy {
                max_segments: 100,
                max_deleted_ratio: 1.0,
            });

        let mut txn = db.begin_mutation().unwrap();
        let a = txn.add_document(doc("a", &["word"], "x")).unwrap();
        txn.commit().unwrap();
        let mut txn = db.begin_mutation().unwrap();
        txn.delete_document(a).unwrap();
        txn.commit().unwrap();

        assert!(db.compact().unwrap());
        let reader = db.reader().unwrap();
        assert!(reader.meta().segments.is_empty());
        assert_eq!(reader.document_count(), 0);

        // Doc ids are never reused
        let mut txn = db.begin_mutation().unwrap();
        let b = txn.add_document(doc("b", &["word"], "x")).unwrap();
        assert!(b > a);
    }
}
