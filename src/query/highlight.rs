//! Locating matched query terms inside stored field values.
//!
//! Stored values are re-analyzed with the query's analyzer, so a stemmed
//! query term highlights every surface form that indexes to it.

use crate::error::Result;
use crate::index::reader::IndexReader;
use crate::index::types::DocId;
use crate::utils::{Analyzer, CancellationProbe};
use std::collections::BTreeSet;

/// A matched word inside one value of a stored field, in characters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharRange {
    /// Which value of the field
    pub value_index: usize,
    /// Char offset of the word within the value
    pub start: usize,
    /// Length in chars
    pub length: usize,
    /// Query term the word indexes to
    pub term: String,
}

/// Byte spans `(start, end, term)` of the words of `text` whose analyzed
/// term is one of `terms`
pub fn matched_spans<'t>(
    analyzer: &Analyzer,
    terms: &'t BTreeSet<String>,
    text: &str,
) -> Vec<(usize, usize, &'t str)> {
    if terms.is_empty() {
        return Vec::new();
    }
    analyzer
        .tokenize(text)
        .into_iter()
        .filter_map(|token| {
            terms
                .get(&token.term)
                .map(|term| (token.start, token.end, term.as_str()))
        })
        .collect()
}

/// Character ranges of `terms` in the stored values of `field` for `doc_id`.
///
/// Returns an empty list when the field is not stored or nothing matches.
pub fn fetch_char_ranges(
    reader: &IndexReader,
    analyzer: &Analyzer,
    terms: &BTreeSet<String>,
    field: &str,
    doc_id: DocId,
    probe: &dyn CancellationProbe,
) -> Result<Vec<CharRange>> {
    probe.checkpoint()?;
    let stored = reader.fetch_stored_fields(doc_id)?;
    let Some(values) = stored.get(field) else {
        return Ok(Vec::new());
    };

    let mut ranges = Vec::new();
    for (value_index, value) in values.iter().enumerate() {
        probe.checkpoint()?;

        // Spans come in text order, so char offsets can be counted incrementally
        let mut chars_before = 0;
        let mut cursor = 0;
        for (start, end, term) in matched_spans(analyzer, terms, value) {
            chars_before += value[cursor..start].chars().count();
            let length = value[start..end].chars().count();
            ranges.push(CharRange {
                value_index,
                start: chars_before,
                length,
                term: term.to_string(),
            });
            chars_before += length;
            cursor = end;
        }
    }
    Ok(ranges)
}
