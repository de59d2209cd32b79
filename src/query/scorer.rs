//! Relevance scoring
//!
//! Implements BM25 over weighted within-document frequencies:
//! - `wdf` counts every occurrence multiplied by its field weight
//! - document length is the sum of a document's wdfs
//! - idf is the non-negative BM25 variant `ln(1 + (N - n + 0.5) / (n + 0.5))`
//!
//! Also computes the per-term upper bound `idf * (k1 + 1)`, which no
//! document can exceed. Reported weights are scores divided by the sum of
//! these bounds over the query terms, so they always fall in `[0, 1]`.

use crate::utils::ScoringWeights;

/// Per-query scoring state
#[derive(Debug, Clone)]
pub struct Scorer {
    weights: ScoringWeights,
    doc_count: f64,
    avg_doc_length: f64,
}

impl Scorer {
    pub fn new(weights: ScoringWeights, doc_count: u64, avg_doc_length: f64) -> Self {
        Self {
            weights,
            doc_count: doc_count as f64,
            avg_doc_length: if avg_doc_length > 0.0 { avg_doc_length } else { 1.0 },
        }
    }

    /// Create a scorer with default weights
    #[cfg(test)]
    fn with_defaults(doc_count: u64, avg_doc_length: f64) -> Self {
        Self::new(ScoringWeights::default(), doc_count, avg_doc_length)
    }

    /// Inverse document frequency of a term found in `doc_freq` documents
    pub fn idf(&self, doc_freq: u32) -> f64 {
        let n = f64::from(doc_freq);
        (1.0 + (self.doc_count - n + 0.5) / (n + 0.5)).ln().max(0.0)
    }

    /// BM25 contribution of one term to one document
    pub fn term_score(&self, idf: f64, wdf: u32, doc_length: u32) -> f64 {
        if wdf == 0 {
            return 0.0;
        }
        let k1 = self.weights.k1;
        let b = self.weights.b;
        let tf = f64::from(wdf);
        let norm = 1.0 - b + b * f64::from(doc_length) / self.avg_doc_length;
        idf * tf * (k1 + 1.0) / (tf + k1 * norm)
    }

    /// Highest score a single term can contribute (as tf grows without bound)
    pub fn upper_bound(&self, idf: f64) -> f64 {
        idf * (self.weights.k1 + 1.0)
    }

    /// Map a raw score into `[0, 1]` given the query's summed upper bounds
    pub fn normalize(score: f64, max_score: f64) -> f64 {
        if max_score <= 0.0 {
            return if score > 0.0 { 1.0 } else { 0.0 };
        }
        (score / max_score).clamp(0.0, 1.0)
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }
}
