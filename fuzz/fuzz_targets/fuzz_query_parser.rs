#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use locus::query::{parse_query, QueryOperator, SearchQuery};
use locus::thesaurus::SynonymTable;
use locus::utils::Analyzer;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    query: &'a str,
    operator: u8,
    filters: Vec<(&'a str, &'a str)>,
    synonyms: Vec<(&'a str, &'a str)>,
}

fuzz_target!(|input: Input<'_>| {
    let operator = match input.operator % 3 {
        0 => QueryOperator::Or,
        1 => QueryOperator::And,
        _ => QueryOperator::Phrase,
    };
    let mut query = SearchQuery::new(input.query).with_operator(operator);
    for (key, value) in input.filters {
        query = query.with_filter(key, value);
    }

    let mut table = SynonymTable::new();
    for (word, synonym) in input.synonyms {
        table.insert(word, [synonym]);
    }

    // Either a tree or EmptyQuery; never a panic
    if let Ok(tree) = parse_query(&query, &Analyzer::default(), &table) {
        for word in &tree.words {
            assert!(word.start <= word.end && word.end <= input.query.len());
        }
        let _ = tree.description();
    }
});
