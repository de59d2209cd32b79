use crate::index::types::*;
use crate::utils::{
    delta_encode, encode_varint, trigramize, write_checked_file, write_str, write_u32_le,
    write_u64_le, write_u8, write_varint, Trigram,
};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

pub const TERMS_DICT_MAGIC: &[u8; 4] = b"LTDI";
pub const TERMS_POSTINGS_MAGIC: &[u8; 4] = b"LTPO";
pub const SPELL_DICT_MAGIC: &[u8; 4] = b"LSDI";
pub const SPELL_POSTINGS_MAGIC: &[u8; 4] = b"LSPO";
pub const SPELL_GRAMS_MAGIC: &[u8; 4] = b"LSGR";
pub const DOCS_MAGIC: &[u8; 4] = b"LDOC";
pub const STORED_MAGIC: &[u8; 4] = b"LSTO";
pub const SLOTS_MAGIC: &[u8; 4] = b"LSLO";
pub const BOOLEANS_MAGIC: &[u8; 4] = b"LBOO";

pub const SLOT_KIND_TEXT: u8 = 0;
pub const SLOT_KIND_NUMERIC: u8 = 1;

/// Accumulates documents for one immutable segment.
///
/// Documents are kept sorted by doc id so every postings list comes out
/// ascending without a separate sort pass.
#[derive(Debug, Default)]
pub struct SegmentWriter {
    documents: BTreeMap<DocId, AnalyzedDocument>,
}

impl SegmentWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, doc_id: DocId, doc: AnalyzedDocument) {
        self.documents.insert(doc_id, doc);
    }

    /// Drop a document added earlier to this writer
    pub fn remove_document(&mut self, doc_id: DocId) -> Option<AnalyzedDocument> {
        self.documents.remove(&doc_id)
    }

    #[cfg(test)]
    fn contains(&self, doc_id: DocId) -> bool {
        self.documents.contains_key(&doc_id)
    }

    pub fn doc_count(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Write the segment files into `segment_path`, which must exist
    pub fn write(&self, segment_path: &Path) -> io::Result<()> {
        fs::create_dir_all(segment_path)?;

        self.write_term_index(segment_path)?;
        self.write_spelling_index(segment_path)?;
        self.write_documents(segment_path)?;
        self.write_stored_fields(segment_path)?;
        self.write_slots(segment_path)?;
        self.write_booleans(segment_path)?;

        Ok(())
    }

    /// Write term dictionary + postings.
    ///
    /// Postings per document: doc delta, wdf, position count, delta positions.
    /// Dictionary entry: term, offset, length, doc_freq, coll_freq.
    fn write_term_index(&self, segment_path: &Path) -> io::Result<()> {
        let mut postings: BTreeMap<&str, Vec<(DocId, &TermOccurrences)>> = BTreeMap::new();
        for (&doc_id, doc) in &self.documents {
            for (term, occ) in &doc.terms {
                postings.entry(term.as_str()).or_default().push((doc_id, occ));
            }
        }

        let mut dict = Vec::new();
        let mut data = Vec::new();
        write_varint(&mut dict, postings.len() as u32)?;

        for (term, entries) in &postings {
            let offset = data.len() as u64;
            let mut prev = 0;
            let mut coll_freq = 0u64;
            for (doc_id, occ) in entries {
                encode_varint(doc_id - prev, &mut data);
                encode_varint(occ.wdf, &mut data);
                encode_varint(occ.positions.len() as u32, &mut data);
                delta_encode(&occ.positions, &mut data);
                coll_freq += occ.wdf as u64;
                prev = *doc_id;
            }

            write_str(&mut dict, term)?;
            write_u64_le(&mut dict, offset)?;
            write_u32_le(&mut dict, (data.len() as u64 - offset) as u32)?;
            write_u32_le(&mut dict, entries.len() as u32)?;
            write_u64_le(&mut dict, coll_freq)?;
        }

        write_checked_file(&segment_path.join("terms.dict"), TERMS_DICT_MAGIC, &dict)?;
        write_checked_file(
            &segment_path.join("terms.postings"),
            TERMS_POSTINGS_MAGIC,
            &data,
        )?;
        Ok(())
    }

    /// Write spelling words, their per-document counts and the trigram map.
    ///
    /// Words are numbered in sorted order; spell.grams maps each trigram to
    /// the delta-encoded word numbers containing it.
    fn write_spelling_index(&self, segment_path: &Path) -> io::Result<()> {
        let mut words: BTreeMap<&str, Vec<(DocId, u32)>> = BTreeMap::new();
        for (&doc_id, doc) in &self.documents {
            for (word, &count) in &doc.spelling {
                words.entry(word.as_str()).or_default().push((doc_id, count));
            }
        }

        let mut grams: BTreeMap<Trigram, Vec<u32>> = BTreeMap::new();
        let mut dict = Vec::new();
        let mut data = Vec::new();
        write_varint(&mut dict, words.len() as u32)?;

        for (word_no, (word, docs)) in words.iter().enumerate() {
            let offset = data.len() as u64;
            let mut prev = 0;
            let mut freq = 0u64;
            for &(doc_id, count) in docs {
                encode_varint(doc_id - prev, &mut data);
                encode_varint(count, &mut data);
                freq += count as u64;
                prev = doc_id;
            }

            write_str(&mut dict, word)?;
            write_u64_le(&mut dict, offset)?;
            write_u32_le(&mut dict, (data.len() as u64 - offset) as u32)?;
            write_u64_le(&mut dict, freq)?;

            for gram in trigramize(word) {
                grams.entry(gram).or_default().push(word_no as u32);
            }
        }

        let mut gram_data = Vec::new();
        write_varint(&mut gram_data, grams.len() as u32)?;
        for (gram, word_nos) in &grams {
            write_u32_le(&mut gram_data, *gram)?;
            write_varint(&mut gram_data, word_nos.len() as u32)?;
            delta_encode(word_nos, &mut gram_data);
        }

        write_checked_file(&segment_path.join("spell.dict"), SPELL_DICT_MAGIC, &dict)?;
        write_checked_file(
            &segment_path.join("spell.postings"),
            SPELL_POSTINGS_MAGIC,
            &data,
        )?;
        write_checked_file(
            &segment_path.join("spell.grams"),
            SPELL_GRAMS_MAGIC,
            &gram_data,
        )?;
        Ok(())
    }

    /// Write document table: doc_id, length, optional external id
    fn write_documents(&self, segment_path: &Path) -> io::Result<()> {
        let mut buf = Vec::new();
        write_varint(&mut buf, self.documents.len() as u32)?;

        for (&doc_id, doc) in &self.documents {
            write_u32_le(&mut buf, doc_id)?;
            write_u32_le(&mut buf, doc.length())?;
            match &doc.external_id {
                Some(id) => {
                    write_u8(&mut buf, 1)?;
                    write_str(&mut buf, id)?;
                }
                None => write_u8(&mut buf, 0)?,
            }
        }

        write_checked_file(&segment_path.join("docs.bin"), DOCS_MAGIC, &buf)
    }

    /// Write stored fields. Each document is a length-prefixed blob so the
    /// reader can index it without decoding.
    fn write_stored_fields(&self, segment_path: &Path) -> io::Result<()> {
        let mut buf = Vec::new();
        let stored: Vec<_> = self
            .documents
            .iter()
            .filter(|(_, doc)| !doc.stored.is_empty())
            .collect();
        write_varint(&mut buf, stored.len() as u32)?;

        let mut blob = Vec::new();
        for (&doc_id, doc) in stored {
            blob.clear();
            write_varint(&mut blob, doc.stored.len() as u32)?;
            for (field, values) in &doc.stored {
                write_str(&mut blob, field)?;
                write_varint(&mut blob, values.len() as u32)?;
                for value in values {
                    write_str(&mut blob, value)?;
                }
            }
            write_u32_le(&mut buf, doc_id)?;
            write_u32_le(&mut buf, blob.len() as u32)?;
            buf.extend_from_slice(&blob);
        }

        write_checked_file(&segment_path.join("stored.bin"), STORED_MAGIC, &buf)
    }

    /// Write slot values: slot, doc_id, kind, value
    fn write_slots(&self, segment_path: &Path) -> io::Result<()> {
        let mut buf = Vec::new();
        let count: usize = self.documents.values().map(|d| d.slots.len()).sum();
        write_varint(&mut buf, count as u32)?;

        for (&doc_id, doc) in &self.documents {
            for (&slot, value) in &doc.slots {
                write_u32_le(&mut buf, slot)?;
                write_u32_le(&mut buf, doc_id)?;
                match value {
                    SlotValue::Text(text) => {
                        write_u8(&mut buf, SLOT_KIND_TEXT)?;
                        write_str(&mut buf, text)?;
                    }
                    SlotValue::Numeric(n) => {
                        write_u8(&mut buf, SLOT_KIND_NUMERIC)?;
                        write_u64_le(&mut buf, n.to_bits())?;
                    }
                }
            }
        }

        write_checked_file(&segment_path.join("slots.bin"), SLOTS_MAGIC, &buf)
    }

    /// Write boolean postings: key, value, delta-encoded doc ids
    fn write_booleans(&self, segment_path: &Path) -> io::Result<()> {
        let mut postings: BTreeMap<(&str, &str), Vec<DocId>> = BTreeMap::new();
        for (&doc_id, doc) in &self.documents {
            for (key, value) in &doc.booleans {
                postings
                    .entry((key.as_str(), value.as_str()))
                    .or_default()
                    .push(doc_id);
            }
        }

        let mut buf = Vec::new();
        write_varint(&mut buf, postings.len() as u32)?;
        for ((key, value), doc_ids) in &postings {
            write_str(&mut buf, key)?;
            write_str(&mut buf, value)?;
            write_varint(&mut buf, doc_ids.len() as u32)?;
            delta_encode(doc_ids, &mut buf);
        }

        write_checked_file(&segment_path.join("booleans.bin"), BOOLEANS_MAGIC, &buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_all_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = SegmentWriter::new();

        let mut doc = AnalyzedDocument::default();
        doc.terms.entry("fox".into()).or_default().record(0, 1);
        doc.spelling.insert("fox".into(), 1);
        writer.add_document(1, doc);

        let seg = dir.path().join("seg_000001");
        writer.write(&seg).unwrap();

        for name in [
            "terms.dict",
            "terms.postings",
            "spell.dict",
            "spell.postings",
            "spell.grams",
            "docs.bin",
            "stored.bin",
            "slots.bin",
            "booleans.bin",
        ] {
            assert!(seg.join(name).exists(), "missing {}", name);
        }
    }

    #[test]
    fn test_remove_pending_document() {
        let mut writer = SegmentWriter::new();
        writer.add_document(3, AnalyzedDocument::default());
        writer.add_document(5, AnalyzedDocument::default());
        assert!(writer.remove_document(3).is_some());
        assert!(!writer.contains(3));
        assert_eq!(writer.doc_count(), 1);
        assert!(writer.remove_document(3).is_none());
    }
}
