use crate::error::{Result, SearchError};
use crate::index::types::*;
use crate::index::writer::*;
use crate::thesaurus::SynonymTable;
use crate::utils::{
    corrupt_payload, decode_varint, map_checked_file, read_checked_file, read_delta_list,
    read_str, read_u32_le, read_u64_le, read_u8, read_varint, Trigram,
};
use memmap2::Mmap;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Cursor};
use std::ops::Range;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub(crate) const META_FILE: &str = "meta.json";
pub(crate) const TOMBSTONE_MAGIC: &[u8; 4] = b"LDEL";
const MAX_OPEN_ATTEMPTS: usize = 5;

/// Term dictionary entry
struct TermDictEntry {
    term: String,
    offset: u64,
    length: u32,
    doc_freq: u32,
}

/// Spelling dictionary entry
struct SpellWord {
    word: String,
    offset: u64,
    length: u32,
}

/// Spelling data of one segment
struct SpellIndex {
    words: Vec<SpellWord>,
    postings: Vec<u8>,
    grams: FxHashMap<Trigram, Vec<u32>>,
}

impl SpellIndex {
    fn lookup(&self, word: &str) -> Option<&SpellWord> {
        self.words
            .binary_search_by(|w| w.word.as_str().cmp(word))
            .ok()
            .map(|i| &self.words[i])
    }

    /// (doc_id, count) pairs for one word
    fn postings(&self, entry: &SpellWord) -> Vec<(DocId, u32)> {
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        let Some(mut buf) = self.postings.get(start..end) else {
            return Vec::new();
        };

        let mut out = Vec::new();
        let mut prev = 0u32;
        while !buf.is_empty() {
            let Some((delta, a)) = decode_varint(buf) else { break };
            let Some((count, b)) = decode_varint(&buf[a..]) else { break };
            prev = prev.saturating_add(delta);
            out.push((prev, count));
            buf = &buf[a + b..];
        }
        out
    }
}

/// Reader for a single immutable segment
struct SegmentReader {
    segment_id: SegmentId,
    path: PathBuf,
    term_dict: Vec<TermDictEntry>,
    postings: Mmap,
    postings_range: Range<usize>,
    docs: Vec<DocEntry>,
    stored: Vec<u8>,
    stored_index: FxHashMap<DocId, Range<usize>>,
    slots: Vec<(SlotNumber, DocId, SlotValue)>,
    booleans: Vec<(String, String, Vec<DocId>)>,
    /// Loaded at open: compaction may remove the directory under a live snapshot
    spelling: SpellIndex,
}

impl SegmentReader {
    fn open(path: &Path, segment_id: SegmentId) -> Result<Self> {
        let term_dict = read_term_dict(path)?;
        let (postings, postings_range) =
            map_checked_file(&path.join("terms.postings"), TERMS_POSTINGS_MAGIC)?;
        let docs = read_docs(path)?;
        let (stored, stored_index) = read_stored_index(path)?;
        let slots = read_slots(path)?;
        let booleans = read_booleans(path)?;
        let spelling = read_spell_index(path)?;

        Ok(Self {
            segment_id,
            path: path.to_path_buf(),
            term_dict,
            postings,
            postings_range,
            docs,
            stored,
            stored_index,
            slots,
            booleans,
            spelling,
        })
    }

    fn lookup_term(&self, term: &str) -> Option<&TermDictEntry> {
        self.term_dict
            .binary_search_by(|e| e.term.as_str().cmp(term))
            .ok()
            .map(|i| &self.term_dict[i])
    }

    /// Encoded postings for a term in this segment
    fn postings_slice(&self, term: &str) -> Option<&[u8]> {
        let entry = self.lookup_term(term)?;
        let data = &self.postings[self.postings_range.clone()];
        let start = entry.offset as usize;
        data.get(start..start + entry.length as usize)
    }

    fn stored_fields(&self, doc_id: DocId) -> Result<Option<StoredFields>> {
        let Some(range) = self.stored_index.get(&doc_id) else {
            return Ok(None);
        };
        let path = self.path.join("stored.bin");
        let mut cursor = Cursor::new(&self.stored[range.clone()]);
        decode_stored(&mut cursor)
            .map(Some)
            .map_err(corrupt_payload(&path))
    }

}

/// Lazy, finite sequence of live postings for one term across all segments.
///
/// Cloning an iterator (or calling [`PostingIter::restart`]) starts the
/// sequence over without touching the dictionary again.
#[derive(Clone)]
pub struct PostingIter<'a> {
    lists: Vec<&'a [u8]>,
    list_idx: usize,
    pos: usize,
    prev: DocId,
    deleted: &'a RoaringBitmap,
}

impl<'a> PostingIter<'a> {
    pub fn restart(&mut self) {
        self.list_idx = 0;
        self.pos = 0;
        self.prev = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    fn decode_next(&mut self, list: &'a [u8]) -> Option<Posting> {
        let buf = &list[self.pos..];
        let (delta, a) = decode_varint(buf)?;
        let (wdf, b) = decode_varint(&buf[a..])?;
        let (npos, c) = decode_varint(&buf[a + b..])?;
        let mut offset = a + b + c;

        let mut positions = Vec::with_capacity(npos as usize);
        let mut prev_pos = 0u32;
        for _ in 0..npos {
            let (d, n) = decode_varint(&buf[offset..])?;
            prev_pos = prev_pos.saturating_add(d);
            positions.push(prev_pos);
            offset += n;
        }

        self.pos += offset;
        self.prev = self.prev.saturating_add(delta);
        Some(Posting {
            doc_id: self.prev,
            wdf,
            positions,
        })
    }
}

impl Iterator for PostingIter<'_> {
    type Item = Posting;

    fn next(&mut self) -> Option<Posting> {
        loop {
            let list = *self.lists.get(self.list_idx)?;
            if self.pos >= list.len() {
                self.list_idx += 1;
                self.pos = 0;
                self.prev = 0;
                continue;
            }

            match self.decode_next(list) {
                Some(posting) if self.deleted.contains(posting.doc_id) => continue,
                Some(posting) => return Some(posting),
                None => {
                    // Checksums are verified at open, so this is a writer bug
                    warn!(list = self.list_idx, pos = self.pos, "truncated postings list");
                    self.list_idx += 1;
                    self.pos = 0;
                    self.prev = 0;
                }
            }
        }
    }
}

/// Immutable snapshot of a database at one committed generation
pub struct IndexReader {
    path: PathBuf,
    meta: IndexMeta,
    segments: Vec<SegmentReader>,
    deleted: RoaringBitmap,
    live: RoaringBitmap,
    /// doc_id -> (segment index, entry)
    docs: FxHashMap<DocId, (usize, DocEntry)>,
    external_ids: FxHashMap<String, DocId>,
    slots: FxHashMap<SlotNumber, FxHashMap<DocId, SlotValue>>,
    booleans: FxHashMap<String, FxHashMap<String, RoaringBitmap>>,
    total_length: u64,
    synonyms: SynonymTable,
}

impl IndexReader {
    /// Open the current committed state of the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if !path.join(META_FILE).exists() {
            return Err(SearchError::NotFound(format!(
                "no database at {}",
                path.display()
            )));
        }

        // A commit or compaction running concurrently may remove the tombstone
        // file or segment directories named by the meta.json just read. When
        // the generation moved on, re-read and retry.
        let mut attempts = 0;
        loop {
            let meta = read_meta(path)?;
            let generation = meta.generation;
            let outcome = match read_tombstones(path, generation) {
                Ok(Some(deleted)) => Self::open_snapshot(path, meta, deleted).map(Some),
                Ok(None) => Ok(None),
                Err(err) => Err(err),
            };

            match outcome {
                Ok(Some(reader)) => return Ok(reader),
                outcome => {
                    attempts += 1;
                    let moved_on = read_meta(path)?.generation != generation;
                    if !moved_on || attempts >= MAX_OPEN_ATTEMPTS {
                        return match outcome {
                            Err(err) => Err(err),
                            _ => Err(SearchError::Corrupt(format!(
                                "tombstone file for generation {} is missing",
                                generation
                            ))),
                        };
                    }
                    debug!(generation, "database changed while opening, retrying");
                }
            }
        }
    }

    fn open_snapshot(path: &Path, meta: IndexMeta, deleted: RoaringBitmap) -> Result<Self> {
        // Load all segments in parallel
        let segments = meta
            .segments
            .par_iter()
            .map(|&seg_id| SegmentReader::open(&segment_dir(path, seg_id), seg_id))
            .collect::<Result<Vec<_>>>()?;

        let mut docs = FxHashMap::default();
        let mut external_ids = FxHashMap::default();
        let mut live = RoaringBitmap::new();
        let mut total_length = 0u64;
        let mut slots: FxHashMap<SlotNumber, FxHashMap<DocId, SlotValue>> = FxHashMap::default();
        let mut booleans: FxHashMap<String, FxHashMap<String, RoaringBitmap>> =
            FxHashMap::default();

        for (seg_idx, segment) in segments.iter().enumerate() {
            for entry in &segment.docs {
                if deleted.contains(entry.doc_id) {
                    continue;
                }
                live.insert(entry.doc_id);
                total_length += entry.length as u64;
                if let Some(id) = &entry.external_id {
                    external_ids.insert(id.clone(), entry.doc_id);
                }
                docs.insert(entry.doc_id, (seg_idx, entry.clone()));
            }

            for (slot, doc_id, value) in &segment.slots {
                if !deleted.contains(*doc_id) {
                    slots.entry(*slot).or_default().insert(*doc_id, value.clone());
                }
            }

            for (key, value, doc_ids) in &segment.booleans {
                let bitmap = booleans
                    .entry(key.clone())
                    .or_default()
                    .entry(value.clone())
                    .or_default();
                bitmap.extend(doc_ids.iter().copied().filter(|d| !deleted.contains(*d)));
            }
        }

        let synonyms = SynonymTable::load(path)?;

        debug!(
            path = %path.display(),
            generation = meta.generation,
            segments = segments.len(),
            live = live.len(),
            "opened index snapshot"
        );

        Ok(Self {
            path: path.to_path_buf(),
            meta,
            segments,
            deleted,
            live,
            docs,
            external_ids,
            slots,
            booleans,
            total_length,
            synonyms,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &IndexMeta {
        &self.meta
    }

    pub fn generation(&self) -> u64 {
        self.meta.generation
    }

    /// Number of live documents
    pub fn document_count(&self) -> u64 {
        self.live.len()
    }

    pub fn live_doc_ids(&self) -> &RoaringBitmap {
        &self.live
    }

    pub fn deleted_doc_ids(&self) -> &RoaringBitmap {
        &self.deleted
    }

    pub fn is_live(&self, doc_id: DocId) -> bool {
        self.live.contains(doc_id)
    }

    /// Live postings for a term, across all segments, in doc id order
    pub fn postings_for(&self, term: &str) -> PostingIter<'_> {
        let lists = self
            .segments
            .iter()
            .filter_map(|segment| segment.postings_slice(term))
            .collect();
        PostingIter {
            lists,
            list_idx: 0,
            pos: 0,
            prev: 0,
            deleted: &self.deleted,
        }
    }

    /// Number of live documents containing `term`
    pub fn term_frequency(&self, term: &str) -> u32 {
        self.postings_for(term).count() as u32
    }

    /// Document frequency from the dictionaries, deleted documents included
    pub fn raw_doc_freq(&self, term: &str) -> u32 {
        self.segments
            .iter()
            .filter_map(|s| s.lookup_term(term))
            .map(|e| e.doc_freq)
            .sum()
    }

    /// Every distinct term in the dictionaries, sorted
    pub fn terms(&self) -> BTreeSet<&str> {
        self.segments
            .iter()
            .flat_map(|s| s.term_dict.iter().map(|e| e.term.as_str()))
            .collect()
    }

    pub fn fetch_stored_fields(&self, doc_id: DocId) -> Result<StoredFields> {
        let (seg_idx, _) = self
            .docs
            .get(&doc_id)
            .ok_or_else(|| SearchError::NotFound(format!("document {}", doc_id)))?;
        Ok(self.segments[*seg_idx]
            .stored_fields(doc_id)?
            .unwrap_or_default())
    }

    pub fn lookup_by_external_id(&self, id: &str) -> Result<DocId> {
        self.external_ids
            .get(id)
            .copied()
            .ok_or_else(|| SearchError::NotFound(format!("document with id '{}'", id)))
    }

    pub fn external_id(&self, doc_id: DocId) -> Option<&str> {
        self.docs
            .get(&doc_id)
            .and_then(|(_, entry)| entry.external_id.as_deref())
    }

    pub fn doc_length(&self, doc_id: DocId) -> Option<u32> {
        self.docs.get(&doc_id).map(|(_, entry)| entry.length)
    }

    pub fn average_doc_length(&self) -> f64 {
        if self.live.is_empty() {
            0.0
        } else {
            self.total_length as f64 / self.live.len() as f64
        }
    }

    pub fn slot_value(&self, slot: SlotNumber, doc_id: DocId) -> Option<&SlotValue> {
        self.slots.get(&slot)?.get(&doc_id)
    }

    /// All slot values of a live document
    pub fn slot_values(&self, doc_id: DocId) -> BTreeMap<SlotNumber, SlotValue> {
        self.slots
            .iter()
            .filter_map(|(&slot, values)| values.get(&doc_id).map(|v| (slot, v.clone())))
            .collect()
    }

    /// Live documents carrying the boolean `key=value`
    pub fn boolean_docs(&self, key: &str, value: &str) -> RoaringBitmap {
        self.booleans
            .get(key)
            .and_then(|values| values.get(value))
            .cloned()
            .unwrap_or_default()
    }

    /// Every boolean (key, value) with its live documents
    pub fn boolean_entries(&self) -> impl Iterator<Item = (&str, &str, &RoaringBitmap)> {
        self.booleans.iter().flat_map(|(key, values)| {
            values
                .iter()
                .map(move |(value, docs)| (key.as_str(), value.as_str(), docs))
        })
    }

    /// Boolean (key, value) pairs of a live document
    pub fn boolean_pairs(&self, doc_id: DocId) -> Vec<(String, String)> {
        let mut pairs: Vec<_> = self
            .booleans
            .iter()
            .flat_map(|(key, values)| {
                values
                    .iter()
                    .filter(move |(_, docs)| docs.contains(doc_id))
                    .map(move |(value, _)| (key.clone(), value.clone()))
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Live occurrences of a spelling word: (doc_id, count)
    pub fn spelling_postings(&self, word: &str) -> Result<Vec<(DocId, u32)>> {
        let mut out = Vec::new();
        for segment in &self.segments {
            let spelling = &segment.spelling;
            if let Some(entry) = spelling.lookup(word) {
                out.extend(
                    spelling
                        .postings(entry)
                        .into_iter()
                        .filter(|(doc_id, _)| !self.deleted.contains(*doc_id)),
                );
            }
        }
        Ok(out)
    }

    /// Occurrences of a spelling word in live documents
    pub fn spelling_frequency(&self, word: &str) -> Result<u64> {
        Ok(self
            .spelling_postings(word)?
            .iter()
            .map(|&(_, count)| count as u64)
            .sum())
    }

    /// Spelling words sharing at least one trigram with `grams`, with the
    /// number of trigrams they share
    pub fn words_sharing_trigrams(
        &self,
        grams: &BTreeSet<Trigram>,
    ) -> Result<BTreeMap<String, usize>> {
        let mut overlap = BTreeMap::new();
        for segment in &self.segments {
            let spelling = &segment.spelling;
            let mut counts: FxHashMap<u32, usize> = FxHashMap::default();
            for gram in grams {
                for &word_no in spelling.grams.get(gram).into_iter().flatten() {
                    *counts.entry(word_no).or_default() += 1;
                }
            }
            for (word_no, count) in counts {
                if let Some(word) = spelling.words.get(word_no as usize) {
                    let slot = overlap.entry(word.word.clone()).or_insert(0);
                    *slot = (*slot).max(count);
                }
            }
        }
        Ok(overlap)
    }

    /// Every spelling word in the dictionaries, sorted
    pub fn spelling_words(&self) -> Result<BTreeSet<String>> {
        let mut words = BTreeSet::new();
        for segment in &self.segments {
            words.extend(segment.spelling.words.iter().map(|w| w.word.clone()));
        }
        Ok(words)
    }

    /// Spelling words starting with `prefix` that occur in live documents,
    /// with their live frequency
    pub fn words_with_prefix(&self, prefix: &str) -> Result<Vec<(String, u64)>> {
        let mut candidates = BTreeSet::new();
        for segment in &self.segments {
            let spelling = &segment.spelling;
            let start = spelling.words.partition_point(|w| w.word.as_str() < prefix);
            candidates.extend(
                spelling.words[start..]
                    .iter()
                    .take_while(|w| w.word.starts_with(prefix))
                    .map(|w| w.word.clone()),
            );
        }

        let mut out = Vec::new();
        for word in candidates {
            let freq = self.spelling_frequency(&word)?;
            if freq > 0 {
                out.push((word, freq));
            }
        }
        Ok(out)
    }

    pub fn synonyms(&self) -> &SynonymTable {
        &self.synonyms
    }

    pub fn segment_ids(&self) -> Vec<SegmentId> {
        self.segments.iter().map(|s| s.segment_id).collect()
    }
}

/// Directory of a segment inside a database
pub(crate) fn segment_dir(db_path: &Path, segment_id: SegmentId) -> PathBuf {
    db_path.join("segments").join(format!("seg_{:06}", segment_id))
}

/// Tombstone file of a generation
pub(crate) fn tombstone_path(db_path: &Path, generation: u64) -> PathBuf {
    db_path
        .join("tombstones")
        .join(format!("del_{}.bin", generation))
}

/// Read and version-check meta.json
pub(crate) fn read_meta(db_path: &Path) -> Result<IndexMeta> {
    let content = fs::read_to_string(db_path.join(META_FILE))?;
    let meta: IndexMeta = serde_json::from_str(&content)?;
    if meta.version != FORMAT_VERSION {
        return Err(SearchError::VersionMismatch {
            found: meta.version,
            expected: FORMAT_VERSION,
        });
    }
    Ok(meta)
}

/// `None` when the file does not exist (yet, or any more)
pub(crate) fn read_tombstones(db_path: &Path, generation: u64) -> Result<Option<RoaringBitmap>> {
    let path = tombstone_path(db_path, generation);
    if !path.exists() {
        return Ok(None);
    }
    let payload = read_checked_file(&path, TOMBSTONE_MAGIC)?;
    RoaringBitmap::deserialize_from(payload.as_slice())
        .map(Some)
        .map_err(corrupt_payload(&path))
}

fn read_term_dict(segment_path: &Path) -> Result<Vec<TermDictEntry>> {
    let path = segment_path.join("terms.dict");
    let payload = read_checked_file(&path, TERMS_DICT_MAGIC)?;
    let mut cursor = Cursor::new(payload.as_slice());

    let parse = |cursor: &mut Cursor<&[u8]>| -> io::Result<Vec<TermDictEntry>> {
        let count = read_varint(cursor)? as usize;
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            entries.push(TermDictEntry {
                term: read_str(cursor)?,
                offset: read_u64_le(cursor)?,
                length: read_u32_le(cursor)?,
                doc_freq: read_u32_le(cursor)?,
            });
            // Collection frequency, unused by BM25
            read_u64_le(cursor)?;
        }
        Ok(entries)
    };

    // Data is already sorted from BTreeMap write - no sort needed
    parse(&mut cursor).map_err(corrupt_payload(&path))
}

fn read_docs(segment_path: &Path) -> Result<Vec<DocEntry>> {
    let path = segment_path.join("docs.bin");
    let payload = read_checked_file(&path, DOCS_MAGIC)?;
    let mut cursor = Cursor::new(payload.as_slice());

    let parse = |cursor: &mut Cursor<&[u8]>| -> io::Result<Vec<DocEntry>> {
        let count = read_varint(cursor)? as usize;
        let mut docs = Vec::with_capacity(count);
        for _ in 0..count {
            let doc_id = read_u32_le(cursor)?;
            let length = read_u32_le(cursor)?;
            let external_id = match read_u8(cursor)? {
                0 => None,
                _ => Some(read_str(cursor)?),
            };
            docs.push(DocEntry {
                doc_id,
                external_id,
                length,
            });
        }
        Ok(docs)
    };

    parse(&mut cursor).map_err(corrupt_payload(&path))
}

fn read_stored_index(segment_path: &Path) -> Result<(Vec<u8>, FxHashMap<DocId, Range<usize>>)> {
    let path = segment_path.join("stored.bin");
    let payload = read_checked_file(&path, STORED_MAGIC)?;
    let mut cursor = Cursor::new(payload.as_slice());

    let mut parse = || -> io::Result<FxHashMap<DocId, Range<usize>>> {
        let count = read_varint(&mut cursor)? as usize;
        let mut index = FxHashMap::default();
        for _ in 0..count {
            let doc_id = read_u32_le(&mut cursor)?;
            let len = read_u32_le(&mut cursor)? as usize;
            let start = cursor.position() as usize;
            if start + len > payload.len() {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stored blob"));
            }
            index.insert(doc_id, start..start + len);
            cursor.set_position((start + len) as u64);
        }
        Ok(index)
    };

    let index = parse().map_err(corrupt_payload(&path))?;
    Ok((payload, index))
}

fn decode_stored(cursor: &mut Cursor<&[u8]>) -> io::Result<StoredFields> {
    let nfields = read_varint(cursor)? as usize;
    let mut fields = StoredFields::new();
    for _ in 0..nfields {
        let name = read_str(cursor)?;
        let nvalues = read_varint(cursor)? as usize;
        let mut values = Vec::with_capacity(nvalues);
        for _ in 0..nvalues {
            values.push(read_str(cursor)?);
        }
        fields.insert(name, values);
    }
    Ok(fields)
}

fn read_slots(segment_path: &Path) -> Result<Vec<(SlotNumber, DocId, SlotValue)>> {
    let path = segment_path.join("slots.bin");
    let payload = read_checked_file(&path, SLOTS_MAGIC)?;
    let mut cursor = Cursor::new(payload.as_slice());

    let parse = |cursor: &mut Cursor<&[u8]>| -> io::Result<Vec<(SlotNumber, DocId, SlotValue)>> {
        let count = read_varint(cursor)? as usize;
        let mut slots = Vec::with_capacity(count);
        for _ in 0..count {
            let slot = read_u32_le(cursor)?;
            let doc_id = read_u32_le(cursor)?;
            let value = match read_u8(cursor)? {
                SLOT_KIND_TEXT => SlotValue::Text(read_str(cursor)?),
                SLOT_KIND_NUMERIC => SlotValue::Numeric(f64::from_bits(read_u64_le(cursor)?)),
                kind => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("unknown slot kind {}", kind),
                    ));
                }
            };
            slots.push((slot, doc_id, value));
        }
        Ok(slots)
    };

    parse(&mut cursor).map_err(corrupt_payload(&path))
}

fn read_booleans(segment_path: &Path) -> Result<Vec<(String, String, Vec<DocId>)>> {
    let path = segment_path.join("booleans.bin");
    let payload = read_checked_file(&path, BOOLEANS_MAGIC)?;
    let mut cursor = Cursor::new(payload.as_slice());

    let parse = |cursor: &mut Cursor<&[u8]>| -> io::Result<Vec<(String, String, Vec<DocId>)>> {
        let count = read_varint(cursor)? as usize;
        let mut booleans = Vec::with_capacity(count);
        for _ in 0..count {
            let key = read_str(cursor)?;
            let value = read_str(cursor)?;
            let n = read_varint(cursor)? as usize;
            booleans.push((key, value, read_delta_list(cursor, n)?));
        }
        Ok(booleans)
    };

    parse(&mut cursor).map_err(corrupt_payload(&path))
}

fn read_spell_index(segment_path: &Path) -> Result<SpellIndex> {
    let dict_path = segment_path.join("spell.dict");
    let dict = read_checked_file(&dict_path, SPELL_DICT_MAGIC)?;
    let postings = read_checked_file(&segment_path.join("spell.postings"), SPELL_POSTINGS_MAGIC)?;
    let grams_path = segment_path.join("spell.grams");
    let gram_data = read_checked_file(&grams_path, SPELL_GRAMS_MAGIC)?;

    let parse_words = |cursor: &mut Cursor<&[u8]>| -> io::Result<Vec<SpellWord>> {
        let count = read_varint(cursor)? as usize;
        let mut words = Vec::with_capacity(count);
        for _ in 0..count {
            words.push(SpellWord {
                word: read_str(cursor)?,
                offset: read_u64_le(cursor)?,
                length: read_u32_le(cursor)?,
            });
            // Raw frequency includes deleted documents; live counts come from postings
            read_u64_le(cursor)?;
        }
        Ok(words)
    };
    let words = parse_words(&mut Cursor::new(dict.as_slice())).map_err(corrupt_payload(&dict_path))?;

    let parse_grams = |cursor: &mut Cursor<&[u8]>| -> io::Result<FxHashMap<Trigram, Vec<u32>>> {
        let count = read_varint(cursor)? as usize;
        let mut grams = FxHashMap::default();
        for _ in 0..count {
            let gram = read_u32_le(cursor)?;
            let n = read_varint(cursor)? as usize;
            grams.insert(gram, read_delta_list(cursor, n)?);
        }
        Ok(grams)
    };
    let grams = parse_grams(&mut Cursor::new(gram_data.as_slice()))
        .map_err(corrupt_payload(&grams_path))?;

    Ok(SpellIndex {
        words,
        postings,
        grams,
    })
}
