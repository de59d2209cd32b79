//! End-to-end tests of the public API: index records through the indexer,
//! then query them through search requests.

use locus::index::{Database, IndexableRecord, Schema};
use locus::indexer::{Indexer, IndexingQueue, RecordOutcome};
use locus::query::{QueryOperator, ResultSet, SearchQuery, SearchRequest, SortOrder, SpellCorrection};
use locus::thesaurus::Thesaurus;
use locus::utils::{EngineConfig, NeverCancel};
use locus::SearchError;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

const SCHEMA: &str = r#"{
    "id":       {"id": true, "field": true},
    "title":    {"field": true, "index": true, "weight": 5, "spell": true},
    "content":  {"field": true, "index": true, "spell": true},
    "category": {"field": true, "boolean": true},
    "rank":     {"numericslot": 1}
}"#;

struct Fixture {
    _dir: TempDir,
    path: PathBuf,
    schema: Arc<Schema>,
    indexer: Indexer,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        Indexer::create_database(&path).unwrap();
        let schema = Arc::new(Schema::from_json(SCHEMA).unwrap());
        let indexer = Indexer::open(&path, Arc::clone(&schema), EngineConfig::default()).unwrap();
        Self {
            _dir: dir,
            path,
            schema,
            indexer,
        }
    }

    fn record(&self, fields: &[(&str, &str)]) -> IndexableRecord {
        let mut record = IndexableRecord::new(Arc::clone(&self.schema));
        for (field, value) in fields {
            record.add_value(field, *value).unwrap();
        }
        record
    }

    fn add(&mut self, docs: &[&[(&str, &str)]]) -> Vec<RecordOutcome> {
        let records: Vec<_> = docs.iter().map(|fields| self.record(fields)).collect();
        self.indexer.apply_batch(&records, &NeverCancel).unwrap().records
    }

    fn delete(&mut self, id: &str) -> Vec<RecordOutcome> {
        let record = IndexableRecord::delete(Arc::clone(&self.schema), id).unwrap();
        self.indexer.apply_batch(&[record], &NeverCancel).unwrap().records
    }

    fn request(&self) -> SearchRequest {
        SearchRequest::new(&self.path)
    }

    fn search(&self, query: SearchQuery) -> ResultSet {
        self.request().execute_blocking(&query, 0, 100).unwrap()
    }
}

fn ids(result: &ResultSet) -> Vec<String> {
    result
        .results
        .iter()
        .map(|hit| hit.fields["id"][0].clone())
        .collect()
}

fn id_set(result: &ResultSet) -> BTreeSet<String> {
    ids(result).into_iter().collect()
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_quick_fox() {
    let mut fx = Fixture::new();
    fx.add(&[&[
        ("id", "d1"),
        ("title", "quick fox"),
        ("content", "the quick brown fox jumps"),
    ]]);

    let result = fx.search(SearchQuery::new("quick").with_operator(QueryOperator::Or));
    assert_eq!(result.item_count, 1);
    assert_eq!(ids(&result), vec!["d1"]);
    assert!(result.results[0].weight > 0.0);
}

#[test]
fn test_auto_spelling_correction() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "d1"), ("content", "fresh water from the spring")],
        &[("id", "d2"), ("content", "dry desert sand")],
    ]);

    let mut request = fx.request();
    request.set_spell_correction(SpellCorrection::Auto);
    let result = request
        .execute_blocking(&SearchQuery::new("watar"), 0, 10)
        .unwrap();

    assert!(result.was_auto_spell_corrected);
    assert!(result.corrected_query_string.as_deref().unwrap().contains("water"));
    assert_eq!(ids(&result), vec!["d1"]);
}

#[test]
fn test_boolean_filter() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "p"), ("title", "first"), ("category", "popular")],
        &[("id", "r"), ("title", "second"), ("category", "rare")],
    ]);

    let result = fx.search(SearchQuery::new("").with_filter("category", "popular"));
    assert_eq!(ids(&result), vec!["p"]);

    let none = fx.search(SearchQuery::new("first").with_filter("category", "rare"));
    assert_eq!(none.match_count, 0);
}

// ============================================================================
// Document lifecycle
// ============================================================================

#[test]
fn test_stored_fields_round_trip() {
    let mut fx = Fixture::new();
    fx.add(&[&[
        ("id", "d1"),
        ("title", "Crème brûlée"),
        ("content", "first paragraph"),
        ("content", "second paragraph"),
        ("category", "dessert"),
        ("rank", "4.5"),
    ]]);

    let result = fx.search(SearchQuery::new("paragraph"));
    let fields = &result.results[0].fields;
    assert_eq!(fields["title"], vec!["Crème brûlée"]);
    assert_eq!(fields["content"], vec!["first paragraph", "second paragraph"]);
    assert_eq!(fields["category"], vec!["dessert"]);
    assert!(!fields.contains_key("rank"));

    let filtered = fx.search(SearchQuery::new("").with_filter("category", "dessert"));
    assert_eq!(ids(&filtered), vec!["d1"]);
}

#[test]
fn test_add_then_delete() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "d1"), ("title", "zebra"), ("category", "animal")],
        &[("id", "d2"), ("title", "giraffe"), ("category", "animal")],
    ]);
    let request = fx.request();
    assert_eq!(request.document_count().unwrap(), 2);

    let outcomes = fx.delete("d1");
    assert!(matches!(outcomes[0], RecordOutcome::Deleted(_)));

    assert_eq!(request.document_count().unwrap(), 1);
    assert_eq!(fx.search(SearchQuery::new("zebra")).match_count, 0);
    let animals = fx.search(SearchQuery::new("").with_filter("category", "animal"));
    assert_eq!(ids(&animals), vec!["d2"]);

    let reader = Database::open(&fx.path).unwrap().reader().unwrap();
    assert!(matches!(reader.lookup_by_external_id("d1"), Err(SearchError::NotFound(_))));

    // Deleting again reports the missing document and commits nothing else
    let again = fx.delete("d1");
    assert!(matches!(again[0], RecordOutcome::Failed(SearchError::NotFound(_))));
    assert_eq!(request.document_count().unwrap(), 1);
}

#[test]
fn test_replace_keeps_one_live_document() {
    let mut fx = Fixture::new();
    fx.add(&[&[("id", "d1"), ("title", "alpha version")]]);
    let outcomes = fx.add(&[&[("id", "d1"), ("title", "beta version")]]);
    assert!(matches!(outcomes[0], RecordOutcome::Replaced { .. }));

    assert_eq!(fx.request().document_count().unwrap(), 1);
    assert_eq!(fx.search(SearchQuery::new("alpha")).match_count, 0);
    assert_eq!(ids(&fx.search(SearchQuery::new("beta"))), vec!["d1"]);
    assert_eq!(fx.search(SearchQuery::new("version")).match_count, 1);
}

#[test]
fn test_invalid_records_do_not_abort_the_batch() {
    let mut fx = Fixture::new();
    let good = fx.record(&[("id", "ok"), ("title", "fine")]);
    let foreign = {
        let other = Arc::new(Schema::from_json(r#"{"colour": {"index": true}}"#).unwrap());
        let mut record = IndexableRecord::new(other);
        record.add_value("colour", "red").unwrap();
        record
    };
    let outcome = fx.indexer.apply_batch(&[good, foreign], &NeverCancel).unwrap();

    assert_eq!(outcome.succeeded(), 1);
    assert!(matches!(outcome.records[1], RecordOutcome::Failed(SearchError::SchemaViolation { .. })));
    assert_eq!(ids(&fx.search(SearchQuery::new("fine"))), vec!["ok"]);
}

// ============================================================================
// Query semantics
// ============================================================================

#[test]
fn test_operators() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "a"), ("content", "red apple pie")],
        &[("id", "b"), ("content", "apple red wine")],
        &[("id", "c"), ("content", "green pear")],
    ]);

    let or = fx.search(SearchQuery::new("red pear"));
    assert_eq!(id_set(&or), set(&["a", "b", "c"]));

    let and = fx.search(SearchQuery::new("red apple").with_operator(QueryOperator::And));
    assert_eq!(id_set(&and), set(&["a", "b"]));

    let phrase = fx.search(SearchQuery::new("red apple").with_operator(QueryOperator::Phrase));
    assert_eq!(ids(&phrase), vec!["a"]);

    let reversed = fx.search(SearchQuery::new("apple red").with_operator(QueryOperator::Phrase));
    assert_eq!(ids(&reversed), vec!["b"]);
}

#[test]
fn test_phrase_never_spans_two_values() {
    let mut fx = Fixture::new();
    fx.add(&[&[("id", "a"), ("content", "ends with red"), ("content", "apple starts")]]);

    let phrase = fx.search(SearchQuery::new("red apple").with_operator(QueryOperator::Phrase));
    assert_eq!(phrase.match_count, 0);
    let and = fx.search(SearchQuery::new("red apple").with_operator(QueryOperator::And));
    assert_eq!(and.match_count, 1);
}

#[test]
fn test_synonyms_are_one_way() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "auto"), ("content", "automobile repair shop")],
        &[("id", "car"), ("content", "car wash")],
    ]);

    let mut thesaurus = Thesaurus::open(&fx.path).unwrap();
    thesaurus
        .add_synonyms_from_array(&[vec!["car", "automobile"]])
        .unwrap();

    assert_eq!(id_set(&fx.search(SearchQuery::new("car"))), set(&["auto", "car"]));
    assert_eq!(ids(&fx.search(SearchQuery::new("automobile"))), vec!["auto"]);

    thesaurus.clear_synonyms().unwrap();
    assert_eq!(ids(&fx.search(SearchQuery::new("car"))), vec!["car"]);
}

#[test]
fn test_title_weight_ranks_higher() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "body"), ("content", "notes about kites")],
        &[("id", "head"), ("title", "kites"), ("content", "notes")],
    ]);
    let result = fx.search(SearchQuery::new("kites"));
    assert_eq!(ids(&result), vec!["head", "body"]);
    assert!(result.results.iter().all(|hit| hit.weight > 0.0 && hit.weight <= 1.0));
}

#[test]
fn test_sort_by_numeric_slot() {
    let mut fx = Fixture::new();
    fx.add(&[
        &[("id", "mid"), ("title", "item"), ("rank", "5")],
        &[("id", "none"), ("title", "item")],
        &[("id", "low"), ("title", "item"), ("rank", "-2")],
        &[("id", "high"), ("title", "item"), ("rank", "40")],
    ]);

    let mut request = fx.request();
    request.set_sort_order(SortOrder::parse(&["-1"]).unwrap());
    let desc = request.execute_blocking(&SearchQuery::new("item"), 0, 10).unwrap();
    assert_eq!(ids(&desc), vec!["high", "mid", "low", "none"]);

    request.set_sort_order(SortOrder::parse(&["+1"]).unwrap());
    let asc = request.execute_blocking(&SearchQuery::new("item"), 0, 10).unwrap();
    assert_eq!(ids(&asc), vec!["low", "mid", "high", "none"]);
}

#[test]
fn test_pagination_is_stable_and_disjoint() {
    let mut fx = Fixture::new();
    let contents: Vec<(String, String)> = (0..25)
        .map(|i| (format!("d{:02}", i), "common ".repeat(i % 4 + 1)))
        .collect();
    let docs: Vec<Vec<(&str, &str)>> = contents
        .iter()
        .map(|(id, content)| vec![("id", id.as_str()), ("content", content.as_str())])
        .collect();
    let refs: Vec<&[(&str, &str)]> = docs.iter().map(Vec::as_slice).collect();
    fx.add(&refs);

    let request = fx.request();
    let query = SearchQuery::new("common");
    let full = request.execute_blocking(&query, 0, 25).unwrap();
    assert_eq!(full.item_count, 25);

    let mut paged = Vec::new();
    for top in [0, 10, 20] {
        let page = request.execute_blocking(&query, top, 10).unwrap();
        assert_eq!(page.match_count, 25);
        paged.extend(ids(&page));
    }
    assert_eq!(paged, ids(&full));
    assert_eq!(paged.iter().collect::<BTreeSet<_>>().len(), 25);

    let past_end = request.execute_blocking(&query, 30, 10).unwrap();
    assert_eq!(past_end.item_count, 0);
    assert!(matches!(
        request.execute_blocking(&query, -1, 10),
        Err(SearchError::InvalidRange(_))
    ));
}

#[test]
fn test_match_count_is_exact() {
    let mut fx = Fixture::new();
    let texts = ["blue sky", "blue sea", "grey sky", "blue whale", "green field"];
    let contents: Vec<(String, &str)> = texts
        .iter()
        .enumerate()
        .map(|(i, text)| (format!("d{}", i), *text))
        .collect();
    let docs: Vec<Vec<(&str, &str)>> = contents
        .iter()
        .map(|(id, text)| vec![("id", id.as_str()), ("content", *text)])
        .collect();
    let refs: Vec<&[(&str, &str)]> = docs.iter().map(Vec::as_slice).collect();
    fx.add(&refs);

    for word in ["blue", "sky", "green", "purple"] {
        let expected = texts.iter().filter(|t| t.split(' ').any(|w| w == word)).count();
        let result = fx.search(SearchQuery::new(word));
        assert!(result.match_count_exact);
        assert_eq!(result.match_count, expected as u64, "word {}", word);
    }
}

// ============================================================================
// Background work
// ============================================================================

#[test]
fn test_queue_and_background_search() {
    let fx = Fixture::new();
    let path = fx.path.clone();
    let schema = Arc::clone(&fx.schema);
    let Fixture { _dir, indexer, .. } = fx;

    let queue = IndexingQueue::new(indexer).unwrap();
    let mut tickets = Vec::new();
    for i in 0..5 {
        let mut record = IndexableRecord::new(Arc::clone(&schema));
        record.add_value("id", format!("q{}", i)).unwrap();
        record.add_value("title", "queued document").unwrap();
        tickets.push(queue.add_or_replace_record(record));
    }
    tickets.push(queue.delete_record("q0").unwrap());
    queue.wait_until_indexing_is_finished();
    assert_eq!(queue.queued_operation_count(), 0);
    for ticket in tickets {
        assert!(ticket.wait().unwrap().is_complete_success());
    }

    let request = SearchRequest::new(&path);
    let handle = request.search(SearchQuery::new("queued")).unwrap();
    let result = handle.wait().unwrap();
    assert_eq!(result.match_count, 4);
    assert!(!request.is_in_progress());
}

#[test]
fn test_compaction_preserves_results() {
    let mut fx = Fixture::new();
    for i in 0..6 {
        let id = format!("c{}", i);
        fx.add(&[&[("id", id.as_str()), ("title", "compact me")]]);
    }
    fx.delete("c2");
    let before = fx.search(SearchQuery::new("compact"));

    let mut db = Database::open(&fx.path).unwrap();
    assert!(db.compact().unwrap());
    assert_eq!(db.meta().segments.len(), 1);
    assert!(!db.compact().unwrap());

    let after = fx.search(SearchQuery::new("compact"));
    assert_eq!(after.match_count, 5);
    let doc_ids = |r: &ResultSet| r.results.iter().map(|h| h.doc_id).collect::<Vec<_>>();
    assert_eq!(doc_ids(&before), doc_ids(&after));
}

#[test]
fn test_missing_database() {
    let dir = tempfile::tempdir().unwrap();
    let path: &Path = &dir.path().join("missing");
    let request = SearchRequest::new(path);
    assert!(request.execute_blocking(&SearchQuery::new("x"), 0, 10).is_err());
    assert!(Thesaurus::open(path).is_err());
    assert!(!Indexer::database_exists(path));
}
