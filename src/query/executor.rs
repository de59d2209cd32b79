//! Query evaluation against an index snapshot.
//!
//! A query tree is evaluated bottom-up into sets of matching documents with
//! BM25 scores. Phrase nodes additionally keep word positions so adjacency
//! can be checked. Filters are evaluated on roaring bitmaps and only
//! restrict the scored set. The matches are then ordered (bounded top-k
//! for relevance order, a full sort for slot orders) and the requested
//! page is materialized with stored fields.

use crate::error::{Result, SearchError};
use crate::index::reader::IndexReader;
use crate::index::types::*;
use crate::query::parser::{parse_query, QueryNode, QueryTree};
use crate::query::scorer::Scorer;
use crate::query::spelling::SpellingCorrector;
use crate::query::topk::{TopKEntry, TopKHeap};
use crate::utils::{CancellationProbe, EngineConfig};
use ahash::AHashMap;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;
use tracing::debug;

/// Postings decoded between two cancellation checks
const CHECK_INTERVAL: usize = 1024;

/// What to do about query words missing from the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpellCorrection {
    #[default]
    None,
    /// Report a corrected query string next to the results
    Suggest,
    /// Run the corrected query instead of the requested one
    Auto,
}

impl FromStr for SpellCorrection {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(SpellCorrection::None),
            "suggest" => Ok(SpellCorrection::Suggest),
            "auto" => Ok(SpellCorrection::Auto),
            _ => Err(SearchError::validation(
                "spell",
                format!("unknown spelling mode '{}' (expected none, suggest, auto)", s),
            )),
        }
    }
}

/// One level of a sort order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    Slot { slot: SlotNumber, ascending: bool },
    Relevance,
}

/// Result ordering; empty means by relevance
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl SortOrder {
    pub fn relevance() -> Self {
        Self::default()
    }

    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Parse specifiers such as `["+1", "-5", "relevance"]`. `+N` sorts slot
    /// N ascending, `-N` descending, and `relevance` (or an empty string)
    /// sorts by score.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let mut keys = Vec::with_capacity(specs.len());
        for spec in specs {
            let spec = spec.as_ref().trim();
            if spec.is_empty() || spec.eq_ignore_ascii_case("relevance") {
                keys.push(SortKey::Relevance);
                continue;
            }
            let (ascending, digits) = match spec.as_bytes()[0] {
                b'+' => (true, &spec[1..]),
                b'-' => (false, &spec[1..]),
                _ => (true, spec),
            };
            let slot: SlotNumber = digits
                .parse()
                .ok()
                .filter(|&n| n >= 1)
                .ok_or_else(|| {
                    SearchError::validation("sort", format!("invalid sort specifier '{}'", spec))
                })?;
            keys.push(SortKey::Slot { slot, ascending });
        }
        Ok(Self { keys })
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// True when no slot takes part in the ordering
    pub fn is_relevance(&self) -> bool {
        self.keys.iter().all(|k| *k == SortKey::Relevance)
    }
}

/// One matching document
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Internal doc id (not the external id)
    pub doc_id: DocId,
    /// Relevance in `[0, 1]`
    pub weight: f64,
    /// Stored fields of the document
    pub fields: StoredFields,
}

/// A page of results with information about the query that produced it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub requested_query_string: String,
    /// Set when the query was automatically corrected
    pub corrected_query_string: Option<String>,
    /// Set when a correction was asked for and found
    pub suggested_query_string: Option<String>,
    /// Every term the executed query could match on
    pub query_terms: BTreeSet<String>,
    pub was_auto_spell_corrected: bool,
    pub match_count: u64,
    pub match_count_exact: bool,
    pub item_count: usize,
    pub results: Vec<SearchHit>,
}

/// Per-document state during evaluation
#[derive(Debug, Clone, Default)]
struct Scored {
    score: f64,
    /// Word positions; only kept for nodes a phrase can consume
    positions: Vec<u32>,
}

type Matches = AHashMap<DocId, Scored>;

/// Evaluation state shared across one tree
struct Evaluation<'p> {
    probe: &'p dyn CancellationProbe,
    scorer: Scorer,
    /// idf of every scored leaf, repeats included, for the normalization bound
    idfs: Vec<f64>,
    decoded: usize,
}

impl Evaluation<'_> {
    fn tick(&mut self) -> Result<()> {
        self.decoded += 1;
        if self.decoded % CHECK_INTERVAL == 0 {
            self.probe.checkpoint()?;
        }
        Ok(())
    }
}

/// Evaluates query trees against one snapshot
pub struct QueryExecutor<'a> {
    reader: &'a IndexReader,
    config: &'a EngineConfig,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(reader: &'a IndexReader, config: &'a EngineConfig) -> Self {
        Self { reader, config }
    }

    pub fn reader(&self) -> &IndexReader {
        self.reader
    }

    /// Run `tree` and return results `top_index..top_index + count`.
    ///
    /// With [`SpellCorrection::Suggest`] or [`SpellCorrection::Auto`], words
    /// whose terms are missing from the index are looked up in the spelling
    /// index first. Cancellation yields `Err(Cancelled)`, never a partial page.
    pub fn execute(
        &self,
        tree: &QueryTree,
        top_index: usize,
        count: usize,
        sort: &SortOrder,
        spelling: SpellCorrection,
        probe: &dyn CancellationProbe,
    ) -> Result<ResultSet> {
        if count == 0 {
            return Err(SearchError::InvalidRange(
                "docs per page must be at least 1".into(),
            ));
        }
        probe.checkpoint()?;

        let mut result = ResultSet {
            requested_query_string: tree.query.query_string.clone(),
            match_count_exact: true,
            ..ResultSet::default()
        };

        let mut executed = Cow::Borrowed(tree);
        if spelling != SpellCorrection::None {
            if let Some(fixed) = self.correct_query_string(tree)? {
                match spelling {
                    SpellCorrection::Suggest => result.suggested_query_string = Some(fixed),
                    SpellCorrection::Auto => {
                        let mut query = tree.query.clone();
                        query.query_string = fixed.clone();
                        executed = Cow::Owned(parse_query(
                            &query,
                            &tree.analyzer,
                            self.reader.synonyms(),
                        )?);
                        result.corrected_query_string = Some(fixed);
                        result.was_auto_spell_corrected = true;
                    }
                    SpellCorrection::None => {}
                }
            }
            probe.checkpoint()?;
        }

        result.query_terms = executed.terms().into_iter().map(str::to_string).collect();

        let mut eval = Evaluation {
            probe,
            scorer: Scorer::new(
                self.config.scoring,
                self.reader.document_count(),
                self.reader.average_doc_length(),
            ),
            idfs: Vec::new(),
            decoded: 0,
        };

        let matches = self.evaluate(&executed.root, &mut eval)?;
        probe.checkpoint()?;

        let filter_only = executed.is_filter_only();
        let max_score: f64 = eval
            .idfs
            .iter()
            .map(|&idf| eval.scorer.upper_bound(idf))
            .sum();

        result.match_count = matches.len() as u64;
        let page = self.order_page(&matches, top_index, count, sort);

        for entry in page {
            probe.checkpoint()?;
            let weight = if filter_only {
                1.0
            } else {
                Scorer::normalize(entry.score, max_score)
            };
            result.results.push(SearchHit {
                doc_id: entry.doc_id,
                weight,
                fields: self.reader.fetch_stored_fields(entry.doc_id)?,
            });
        }
        result.item_count = result.results.len();

        debug!(
            query = %executed.description(),
            matches = result.match_count,
            returned = result.item_count,
            "query executed"
        );
        Ok(result)
    }

    /// The query string with every unknown word replaced by its best
    /// spelling, or `None` if nothing was replaced
    pub fn correct_query_string(&self, tree: &QueryTree) -> Result<Option<String>> {
        let corrector = SpellingCorrector::new(self.reader, &self.config.spelling);
        let source = &tree.query.query_string;

        let mut out = String::with_capacity(source.len());
        let mut last = 0;
        let mut changed = false;

        for word in &tree.words {
            if self.reader.term_frequency(&word.term) > 0 {
                continue;
            }
            if let Some(replacement) = corrector.correct_word(&word.word)? {
                out.push_str(&source[last..word.start]);
                out.push_str(&replacement);
                last = word.end;
                changed = true;
            }
        }

        if !changed {
            return Ok(None);
        }
        out.push_str(&source[last..]);
        Ok(Some(out))
    }

    fn evaluate(&self, node: &QueryNode, eval: &mut Evaluation<'_>) -> Result<Matches> {
        eval.probe.checkpoint()?;

        match node {
            QueryNode::Term(term) => self.evaluate_term(term, eval),
            QueryNode::Or(children) => {
                let mut out = Matches::new();
                for child in children {
                    for (doc_id, scored) in self.evaluate(child, eval)? {
                        let entry = out.entry(doc_id).or_default();
                        entry.score += scored.score;
                        merge_positions(&mut entry.positions, &scored.positions);
                    }
                }
                Ok(out)
            }
            QueryNode::And(children) => {
                let mut out: Option<Matches> = None;
                for child in children {
                    let matches = self.evaluate(child, eval)?;
                    // Every child is evaluated so its terms count toward the bound
                    out = Some(match out {
                        None => matches,
                        Some(acc) => intersect(acc, &matches),
                    });
                }
                Ok(out
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(doc_id, s)| (doc_id, Scored { score: s.score, positions: Vec::new() }))
                    .collect())
            }
            QueryNode::Phrase(children) => self.evaluate_phrase(children, eval),
            QueryNode::Filter { .. } => {
                let docs = self.filter_docs(node);
                Ok(docs.iter().map(|doc_id| (doc_id, Scored::default())).collect())
            }
            QueryNode::FilterAnd(children) => {
                let mut allowed: Option<RoaringBitmap> = None;
                let mut scoring = Vec::new();
                for child in children {
                    if let QueryNode::Filter { .. } = child {
                        let docs = self.filter_docs(child);
                        allowed = Some(match allowed {
                            None => docs,
                            Some(acc) => acc & docs,
                        });
                    } else {
                        scoring.push(child);
                    }
                }

                let mut out: Option<Matches> = None;
                for child in scoring {
                    let matches = self.evaluate(child, eval)?;
                    out = Some(match out {
                        None => matches,
                        Some(acc) => intersect(acc, &matches),
                    });
                }

                Ok(match (out, allowed) {
                    (Some(matches), Some(allowed)) => matches
                        .into_iter()
                        .filter(|(doc_id, _)| allowed.contains(*doc_id))
                        .collect(),
                    (Some(matches), None) => matches,
                    (None, Some(allowed)) => allowed
                        .iter()
                        .map(|doc_id| (doc_id, Scored::default()))
                        .collect(),
                    (None, None) => Matches::new(),
                })
            }
        }
    }

    fn evaluate_term(&self, term: &str, eval: &mut Evaluation<'_>) -> Result<Matches> {
        let mut postings = Vec::new();
        for posting in self.reader.postings_for(term) {
            eval.tick()?;
            postings.push(posting);
        }

        let idf = eval.scorer.idf(postings.len() as u32);
        if !postings.is_empty() {
            eval.idfs.push(idf);
        }

        Ok(postings
            .into_iter()
            .map(|p| {
                let length = self.reader.doc_length(p.doc_id).unwrap_or(0);
                let score = eval.scorer.term_score(idf, p.wdf, length);
                (
                    p.doc_id,
                    Scored {
                        score,
                        positions: p.positions,
                    },
                )
            })
            .collect())
    }

    /// Documents where child `i` occurs at position `p + i` for some `p`.
    /// The result keeps the phrase start positions.
    fn evaluate_phrase(&self, children: &[QueryNode], eval: &mut Evaluation<'_>) -> Result<Matches> {
        let mut parts = Vec::with_capacity(children.len());
        for child in children {
            parts.push(self.evaluate(child, eval)?);
        }
        let Some((first, rest)) = parts.split_first() else {
            return Ok(Matches::new());
        };

        let mut out = Matches::new();
        'docs: for (doc_id, head) in first {
            let mut tails = Vec::with_capacity(rest.len());
            for part in rest {
                match part.get(doc_id) {
                    Some(scored) => tails.push(scored),
                    None => continue 'docs,
                }
            }

            let starts: Vec<u32> = head
                .positions
                .iter()
                .copied()
                .filter(|&start| {
                    tails.iter().enumerate().all(|(i, tail)| {
                        start
                            .checked_add(i as u32 + 1)
                            .is_some_and(|p| tail.positions.binary_search(&p).is_ok())
                    })
                })
                .collect();

            if !starts.is_empty() {
                let score = head.score + tails.iter().map(|t| t.score).sum::<f64>();
                out.insert(
                    *doc_id,
                    Scored {
                        score,
                        positions: starts,
                    },
                );
            }
        }
        Ok(out)
    }

    fn filter_docs(&self, node: &QueryNode) -> RoaringBitmap {
        let mut docs = RoaringBitmap::new();
        if let QueryNode::Filter { key, values } = node {
            for value in values {
                docs |= self.reader.boolean_docs(key, value);
            }
        }
        docs
    }

    /// Select the requested page in final order
    fn order_page(
        &self,
        matches: &Matches,
        top_index: usize,
        count: usize,
        sort: &SortOrder,
    ) -> Vec<TopKEntry> {
        if top_index >= matches.len() {
            return Vec::new();
        }
        let entries = matches.iter().map(|(&doc_id, scored)| TopKEntry {
            score: scored.score,
            doc_id,
        });

        let ordered: Vec<TopKEntry> = if sort.is_relevance() {
            let mut heap = TopKHeap::new(top_index.saturating_add(count));
            for entry in entries {
                heap.try_insert(entry);
            }
            heap.into_sorted_vec()
        } else {
            let mut all: Vec<TopKEntry> = entries.collect();
            all.sort_by(|a, b| self.compare(a, b, sort));
            all
        };

        ordered.into_iter().skip(top_index).take(count).collect()
    }

    fn compare(&self, a: &TopKEntry, b: &TopKEntry, sort: &SortOrder) -> Ordering {
        for key in sort.keys() {
            let ord = match *key {
                SortKey::Relevance => b.score.total_cmp(&a.score),
                SortKey::Slot { slot, ascending } => {
                    let va = self.reader.slot_value(slot, a.doc_id);
                    let vb = self.reader.slot_value(slot, b.doc_id);
                    match (va, vb) {
                        (Some(x), Some(y)) if ascending => x.compare(y),
                        (Some(x), Some(y)) => y.compare(x),
                        // Documents without a value go last either way
                        (Some(_), None) => Ordering::Less,
                        (None, Some(_)) => Ordering::Greater,
                        (None, None) => Ordering::Equal,
                    }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        a.doc_id.cmp(&b.doc_id)
    }
}

fn intersect(acc: Matches, other: &Matches) -> Matches {
    acc.into_iter()
        .filter_map(|(doc_id, mut scored)| {
            other.get(&doc_id).map(|o| {
                scored.score += o.score;
                (doc_id, scored)
            })
        })
        .collect()
}

fn merge_positions(into: &mut Vec<u32>, from: &[u32]) {
    if from.is_empty() {
        return;
    }
    into.extend_from_slice(from);
    into.sort_unstable();
    into.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::database::Database;
    use crate::query::parser::{QueryOperator, SearchQuery};
    use crate::utils::{Analyzer, CancellationToken, NeverCancel};

    /// (external id, text, category, rank)
    const DOCS: &[(&str, &str, &str, f64)] = &[
        ("d1", "the quick brown fox jumps", "animal", 3.0),
        ("d2", "a quick test of water quality", "science", 1.0),
        ("d3", "brown water and brown mud", "science", 2.0),
        ("d4", "fox hunting is banned", "animal", 5.0),
    ];

    fn build() -> (tempfile::TempDir, IndexReader) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        let mut db = Database::create(&path).unwrap();
        let analyzer = Analyzer::default();

        let mut txn = db.begin_mutation().unwrap();
        for (id, text, category, rank) in DOCS {
            let mut doc = AnalyzedDocument {
                external_id: Some(id.to_string()),
                ..AnalyzedDocument::default()
            };
            for token in analyzer.tokenize(text) {
                doc.terms.entry(token.term).or_default().record(token.position, 1);
                *doc.spelling.entry(token.word).or_default() += 1;
            }
            doc.stored.insert("id".into(), vec![id.to_string()]);
            doc.booleans.insert(("category".into(), category.to_string()));
            doc.slots.insert(1, SlotValue::Numeric(*rank));
            txn.add_document(doc).unwrap();
        }
        txn.commit().unwrap();
        let reader = IndexReader::open(&path).unwrap();
        (dir, reader)
    }

    fn run(reader: &IndexReader, query: SearchQuery, sort: &SortOrder) -> ResultSet {
        let config = EngineConfig::default();
        let tree = parse_query(&query, &Analyzer::default(), reader.synonyms()).unwrap();
        QueryExecutor::new(reader, &config)
            .execute(&tree, 0, 10, sort, SpellCorrection::None, &NeverCancel)
            .unwrap()
    }

    fn ids(result: &ResultSet) -> Vec<&str> {
        result
            .results
            .iter()
            .map(|hit| hit.fields["id"][0].as_str())
            .collect()
    }

    #[test]
    fn test_or_and_phrase() {
        let (_dir, reader) = build();
        let sort = SortOrder::relevance();

        let or = run(&reader, SearchQuery::new("quick fox"), &sort);
        assert_eq!(or.match_count, 3);
        assert!(or.match_count_exact);

        let and = run(
            &reader,
            SearchQuery::new("quick fox").with_operator(QueryOperator::And),
            &sort,
        );
        assert_eq!(ids(&and), vec!["d1"]);

        let phrase = run(
            &reader,
            SearchQuery::new("brown water").with_operator(QueryOperator::Phrase),
            &sort,
        );
        assert_eq!(ids(&phrase), vec!["d3"]);

        let reversed = run(
            &reader,
            SearchQuery::new("fox brown").with_operator(QueryOperator::Phrase),
            &sort,
        );
        assert_eq!(reversed.match_count, 0);
        assert_eq!(reversed.item_count, 0);
    }

    #[test]
    fn test_weights_are_normalized_and_ranked() {
        let (_dir, reader) = build();
        let result = run(&reader, SearchQuery::new("brown"), &SortOrder::relevance());
        assert_eq!(ids(&result), vec!["d3", "d1"]);
        for hit in &result.results {
            assert!(hit.weight > 0.0 && hit.weight <= 1.0);
        }
        assert!(result.results[0].weight > result.results[1].weight);
    }

    #[test]
    fn test_repeated_terms_keep_weights_below_one() {
        let (_dir, reader) = build();
        let once = run(&reader, SearchQuery::new("fox"), &SortOrder::relevance());
        let twice = run(&reader, SearchQuery::new("fox fox"), &SortOrder::relevance());

        assert_eq!(ids(&twice), ids(&once));
        assert!(twice.results[0].weight > twice.results[1].weight);
        for (a, b) in once.results.iter().zip(&twice.results) {
            assert!(b.weight < 1.0);
            assert!((a.weight - b.weight).abs() < 1e-9);
        }
    }

    #[test]
    fn test_filters() {
        let (_dir, reader) = build();
        let sort = SortOrder::relevance();

        let filtered = run(&reader, SearchQuery::new("quick").with_filter("category", "animal"), &sort);
        assert_eq!(ids(&filtered), vec!["d1"]);

        let only = run(&reader, SearchQuery::new("").with_filter("category", "science"), &sort);
        assert_eq!(ids(&only), vec!["d2", "d3"]);
        assert!(only.results.iter().all(|hit| hit.weight == 1.0));

        let either = run(
            &reader,
            SearchQuery::new("")
                .with_filter("category", "science")
                .with_filter("category", "animal"),
            &sort,
        );
        assert_eq!(either.match_count, 4);

        let none = run(&reader, SearchQuery::new("").with_filter("category", "rare"), &sort);
        assert_eq!(none.match_count, 0);
    }

    #[test]
    fn test_slot_sort_and_pagination() {
        let (_dir, reader) = build();
        let config = EngineConfig::default();
        let query = SearchQuery::new("").with_filter("category", "animal").with_filter("category", "science");
        let tree = parse_query(&query, &Analyzer::default(), reader.synonyms()).unwrap();
        let executor = QueryExecutor::new(&reader, &config);

        let desc = SortOrder::parse(&["-1"]).unwrap();
        let page1 = executor
            .execute(&tree, 0, 2, &desc, SpellCorrection::None, &NeverCancel)
            .unwrap();
        let page2 = executor
            .execute(&tree, 2, 2, &desc, SpellCorrection::None, &NeverCancel)
            .unwrap();
        assert_eq!(ids(&page1), vec!["d4", "d1"]);
        assert_eq!(ids(&page2), vec!["d3", "d2"]);
        assert_eq!(page1.match_count, 4);
        assert_eq!(page1.item_count, 2);

        let past_end = executor
            .execute(&tree, 10, 2, &desc, SpellCorrection::None, &NeverCancel)
            .unwrap();
        assert_eq!(past_end.item_count, 0);
        assert_eq!(past_end.match_count, 4);

        assert!(matches!(
            executor.execute(&tree, 0, 0, &desc, SpellCorrection::None, &NeverCancel),
            Err(SearchError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_relevance_pages_do_not_overlap() {
        let (_dir, reader) = build();
        let config = EngineConfig::default();
        let tree = parse_query(&SearchQuery::new("quick brown fox water"), &Analyzer::default(), reader.synonyms()).unwrap();
        let executor = QueryExecutor::new(&reader, &config);
        let sort = SortOrder::relevance();

        let all = executor.execute(&tree, 0, 10, &sort, SpellCorrection::None, &NeverCancel).unwrap();
        let first = executor.execute(&tree, 0, 2, &sort, SpellCorrection::None, &NeverCancel).unwrap();
        let second = executor.execute(&tree, 2, 2, &sort, SpellCorrection::None, &NeverCancel).unwrap();

        let mut paged: Vec<DocId> = first.results.iter().map(|h| h.doc_id).collect();
        paged.extend(second.results.iter().map(|h| h.doc_id));
        let full: Vec<DocId> = all.results.iter().map(|h| h.doc_id).collect();
        assert_eq!(paged, full);
    }

    #[test]
    fn test_sort_order_parse() {
        let order = SortOrder::parse(&["+1", "-5", "relevance"]).unwrap();
        assert_eq!(
            order.keys(),
            &[
                SortKey::Slot { slot: 1, ascending: true },
                SortKey::Slot { slot: 5, ascending: false },
                SortKey::Relevance,
            ]
        );
        assert!(!order.is_relevance());
        assert!(SortOrder::parse(&[""]).unwrap().is_relevance());
        assert!(SortOrder::parse(&["+0"]).is_err());
        assert!(SortOrder::parse(&["-x"]).is_err());
    }

    #[test]
    fn test_spelling_modes() {
        let (_dir, reader) = build();
        let config = EngineConfig::default();
        let tree = parse_query(&SearchQuery::new("Watar quality"), &Analyzer::default(), reader.synonyms()).unwrap();
        let executor = QueryExecutor::new(&reader, &config);
        let sort = SortOrder::relevance();

        let suggest = executor.execute(&tree, 0, 10, &sort, SpellCorrection::Suggest, &NeverCancel).unwrap();
        assert_eq!(suggest.suggested_query_string.as_deref(), Some("water quality"));
        assert!(!suggest.was_auto_spell_corrected);
        assert_eq!(ids(&suggest), vec!["d2"]);

        let auto = executor.execute(&tree, 0, 10, &sort, SpellCorrection::Auto, &NeverCancel).unwrap();
        assert!(auto.was_auto_spell_corrected);
        assert_eq!(auto.corrected_query_string.as_deref(), Some("water quality"));
        assert_eq!(auto.requested_query_string, "Watar quality");
        assert!(auto.query_terms.contains("water"));
        assert_eq!(auto.match_count, 2);

        let none = executor.execute(&tree, 0, 10, &sort, SpellCorrection::None, &NeverCancel).unwrap();
        assert!(none.suggested_query_string.is_none());
        assert!(none.corrected_query_string.is_none());
    }

    #[test]
    fn test_cancelled_execution() {
        let (_dir, reader) = build();
        let config = EngineConfig::default();
        let tree = parse_query(&SearchQuery::new("quick"), &Analyzer::default(), reader.synonyms()).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let result = QueryExecutor::new(&reader, &config).execute(
            &tree,
            0,
            10,
            &SortOrder::relevance(),
            SpellCorrection::None,
            &token,
        );
        assert!(matches!(result, Err(SearchError::Cancelled)));
    }
}
