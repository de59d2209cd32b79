//! Bounded top-k selection for relevance-ordered pages.
//!
//! Keeps a min-heap of the best `k` entries seen so far; the root is the
//! weakest kept entry and is the threshold a new entry has to beat. Equal
//! scores are ordered by ascending doc id, so the selection is identical to
//! a full sort truncated to `k`.

use crate::index::types::DocId;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored document
#[derive(Debug, Clone, Copy)]
pub struct TopKEntry {
    pub score: f64,
    pub doc_id: DocId,
}

impl TopKEntry {
    /// Result-list order: higher score first, then lower doc id
    pub fn rank_cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| self.doc_id.cmp(&other.doc_id))
    }
}

impl PartialEq for TopKEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TopKEntry {}

impl PartialOrd for TopKEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TopKEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; the entry ranked last must be the greatest
        self.rank_cmp(other)
    }
}

/// Top-k heap
pub struct TopKHeap {
    heap: BinaryHeap<TopKEntry>,
    capacity: usize,
}

impl TopKHeap {
    pub fn new(k: usize) -> Self {
        Self {
            heap: BinaryHeap::with_capacity(k.saturating_add(1).min(4096)),
            capacity: k,
        }
    }

    /// Weakest entry currently kept, once the heap is full
    #[cfg(test)]
    fn threshold(&self) -> Option<&TopKEntry> {
        if self.is_full() {
            self.heap.peek()
        } else {
            None
        }
    }

    /// Returns true if the entry was kept
    pub fn try_insert(&mut self, entry: TopKEntry) -> bool {
        if self.capacity == 0 {
            return false;
        }
        if !self.is_full() {
            self.heap.push(entry);
            return true;
        }
        match self.heap.peek() {
            Some(weakest) if entry.rank_cmp(weakest) == Ordering::Less => {
                self.heap.pop();
                self.heap.push(entry);
                true
            }
            _ => false,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Consume the heap, best entry first
    pub fn into_sorted_vec(self) -> Vec<TopKEntry> {
        // into_sorted_vec is ascending by Ord, which is already rank order
        self.heap.into_sorted_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(score: f64, doc_id: DocId) -> TopKEntry {
        TopKEntry { score, doc_id }
    }

    #[test]
    fn test_top_k_heap_basic() {
        let mut heap = TopKHeap::new(3);
        assert!(heap.is_empty());
        for (score, doc) in [(0.5, 1), (0.9, 2), (0.1, 3), (0.7, 4), (0.3, 5)] {
            heap.try_insert(entry(score, doc));
        }
        assert_eq!(heap.len(), 3);
        assert_eq!(heap.threshold().unwrap().doc_id, 1);

        let docs: Vec<_> = heap.into_sorted_vec().iter().map(|e| e.doc_id).collect();
        assert_eq!(docs, vec![2, 4, 1]);
    }

    #[test]
    fn test_ties_prefer_lower_doc_ids() {
        let mut heap = TopKHeap::new(2);
        for doc in [7, 3, 9, 1] {
            heap.try_insert(entry(1.0, doc));
        }
        let docs: Vec<_> = heap.into_sorted_vec().iter().map(|e| e.doc_id).collect();
        assert_eq!(docs, vec![1, 3]);
    }

    #[test]
    fn test_zero_capacity() {
        let mut heap = TopKHeap::new(0);
        assert!(!heap.try_insert(entry(1.0, 1)));
        assert!(heap.into_sorted_vec().is_empty());
    }

    #[test]
    fn test_matches_full_sort() {
        let entries: Vec<_> = (0..50u32)
            .map(|i| entry(f64::from((i * 37) % 11), i))
            .collect();
        let mut heap = TopKHeap::new(10);
        for e in &entries {
            heap.try_insert(*e);
        }
        let mut sorted = entries.clone();
        sorted.sort_by(|a, b| a.rank_cmp(b));
        let expected: Vec<_> = sorted.iter().take(10).map(|e| e.doc_id).collect();
        let actual: Vec<_> = heap.into_sorted_vec().iter().map(|e| e.doc_id).collect();
        assert_eq!(actual, expected);
    }
}
