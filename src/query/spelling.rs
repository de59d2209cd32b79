//! Spelling correction over the per-database spelling index.
//!
//! Candidates are the indexed words sharing the most trigrams with the
//! misspelled word. They are filtered by edit distance and ranked by
//! distance, then by how many live documents use them.

use crate::error::Result;
use crate::index::reader::IndexReader;
use crate::utils::{fold, trigramize, SpellingConfig};
use std::cmp::Reverse;

/// Suggests replacements for words missing from the index
pub struct SpellingCorrector<'a> {
    reader: &'a IndexReader,
    config: &'a SpellingConfig,
}

impl<'a> SpellingCorrector<'a> {
    pub fn new(reader: &'a IndexReader, config: &'a SpellingConfig) -> Self {
        Self { reader, config }
    }

    /// Best replacement for a folded word, or `None` when the word is
    /// already known or nothing is close enough
    pub fn correct_word(&self, word: &str) -> Result<Option<String>> {
        if word.is_empty() || self.reader.spelling_frequency(word)? > 0 {
            return Ok(None);
        }

        let grams = trigramize(word);
        let mut candidates: Vec<(String, usize)> = self
            .reader
            .words_sharing_trigrams(&grams)?
            .into_iter()
            .collect();
        // Most shared trigrams first; BTreeMap order keeps ties deterministic
        candidates.sort_by_key(|(_, overlap)| Reverse(*overlap));
        candidates.truncate(self.config.max_candidates);

        let mut best: Option<(usize, Reverse<u64>, Reverse<usize>, String)> = None;
        for (candidate, overlap) in candidates {
            let distance = levenshtein_distance(word, &candidate);
            if distance == 0 || distance > self.config.max_edit_distance {
                continue;
            }
            let frequency = self.reader.spelling_frequency(&candidate)?;
            if frequency == 0 {
                continue;
            }
            let key = (distance, Reverse(frequency), Reverse(overlap), candidate);
            if best.as_ref().is_none_or(|current| key < *current) {
                best = Some(key);
            }
        }

        Ok(best.map(|(_, _, _, word)| word))
    }

    /// Indexed words starting with `fragment`, most frequent first
    pub fn suggestions_for_word_fragment(&self, fragment: &str, max: usize) -> Result<Vec<String>> {
        let prefix = fold(fragment.trim());
        if prefix.is_empty() || max == 0 {
            return Ok(Vec::new());
        }

        let mut words = self.reader.words_with_prefix(&prefix)?;
        words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(words.into_iter().take(max).map(|(word, _)| word).collect())
    }
}

/// Levenshtein distance over chars (two-row dynamic programming)
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let a: Vec<char> = s1.chars().collect();
    let b: Vec<char> = s2.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let (shorter, longer) = if a.len() <= b.len() { (&a, &b) } else { (&b, &a) };

    let mut prev_row: Vec<usize> = (0..=shorter.len()).collect();
    let mut curr_row = vec![0; shorter.len() + 1];

    for i in 1..=longer.len() {
        curr_row[0] = i;
        for j in 1..=shorter.len() {
            let cost = usize::from(longer[i - 1] != shorter[j - 1]);
            curr_row[j] = (prev_row[j] + 1)
                .min(curr_row[j - 1] + 1)
                .min(prev_row[j - 1] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[shorter.len()]
}
