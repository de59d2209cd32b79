//! Query parsing: query string + boolean filters -> query tree.
//!
//! The query string is analyzed with the same [`Analyzer`] used at index
//! time. Every word becomes a term leaf, widened into an OR of alternatives
//! when the thesaurus lists synonyms for it. The leaves are combined with
//! the query's default operator. Filters become an AND of per-key ORs
//! wrapped around the text query.

use crate::error::{Result, SearchError};
use crate::thesaurus::SynonymTable;
use crate::utils::Analyzer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How the words of a query string are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryOperator {
    /// Any word may match
    #[default]
    Or,
    /// Every word must match
    And,
    /// Every word must match, adjacent and in order
    Phrase,
}

impl FromStr for QueryOperator {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "or" => Ok(QueryOperator::Or),
            "and" => Ok(QueryOperator::And),
            "phrase" => Ok(QueryOperator::Phrase),
            _ => Err(SearchError::validation(
                "operator",
                format!("unknown operator '{}' (expected or, and, phrase)", s),
            )),
        }
    }
}

/// A text query with optional boolean filters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub query_string: String,
    /// Filter key -> accepted values. Values under one key are OR'd, keys
    /// are AND'd.
    pub filters: BTreeMap<String, Vec<String>>,
    pub default_operator: QueryOperator,
}

impl SearchQuery {
    pub fn new(query_string: impl Into<String>) -> Self {
        Self {
            query_string: query_string.into(),
            ..Self::default()
        }
    }

    pub fn with_operator(mut self, operator: QueryOperator) -> Self {
        self.default_operator = operator;
        self
    }

    pub fn with_filters(mut self, filters: BTreeMap<String, Vec<String>>) -> Self {
        self.filters = filters;
        self
    }

    /// Accept documents whose `key` filter has `value`
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.entry(key.into()).or_default().push(value.into());
        self
    }

    /// True when there is neither query text nor any filter value
    pub fn is_empty(&self) -> bool {
        self.query_string.trim().is_empty() && self.filters.values().all(Vec::is_empty)
    }
}

/// Query tree node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryNode {
    /// Documents indexing this term
    Term(String),
    /// Any child matches
    Or(Vec<QueryNode>),
    /// Every child matches
    And(Vec<QueryNode>),
    /// Every child matches at consecutive positions. Children are terms or
    /// ORs of terms.
    Phrase(Vec<QueryNode>),
    /// Documents whose boolean `key` has one of `values`
    Filter { key: String, values: Vec<String> },
    /// Every child matches; filter children restrict without scoring
    FilterAnd(Vec<QueryNode>),
}

impl QueryNode {
    /// Distinct terms in the subtree, in first-seen order
    pub fn terms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_terms(&mut out);
        out
    }

    fn collect_terms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            QueryNode::Term(term) => {
                if !out.contains(&term.as_str()) {
                    out.push(term);
                }
            }
            QueryNode::Or(children)
            | QueryNode::And(children)
            | QueryNode::Phrase(children)
            | QueryNode::FilterAnd(children) => {
                for child in children {
                    child.collect_terms(out);
                }
            }
            QueryNode::Filter { .. } => {}
        }
    }

    /// True if the node contributes relevance (contains any term)
    pub fn is_scoring(&self) -> bool {
        !self.terms().is_empty()
    }
}

impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, children: &[QueryNode], op: &str) -> fmt::Result {
            if children.len() == 1 {
                return write!(f, "{}", children[0]);
            }
            f.write_str("(")?;
            for (i, child) in children.iter().enumerate() {
                if i > 0 {
                    write!(f, " {} ", op)?;
                }
                write!(f, "{}", child)?;
            }
            f.write_str(")")
        }

        match self {
            QueryNode::Term(term) => f.write_str(term),
            QueryNode::Or(children) => join(f, children, "OR"),
            QueryNode::And(children) => join(f, children, "AND"),
            QueryNode::Phrase(children) => join(f, children, "PHRASE"),
            QueryNode::Filter { key, values } => {
                let leaves: Vec<_> = values
                    .iter()
                    .map(|v| QueryNode::Term(format!("{}:{}", key, v)))
                    .collect();
                join(f, &leaves, "OR")
            }
            QueryNode::FilterAnd(children) => join(f, children, "FILTER"),
        }
    }
}

/// One word of the query string as analyzed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryWord {
    /// Case-folded word, the form kept in the spelling index
    pub word: String,
    /// Indexed (stemmed) term
    pub term: String,
    /// Byte span in the query string
    pub start: usize,
    pub end: usize,
}

/// A parsed query ready for execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTree {
    pub root: QueryNode,
    /// Words of the query string, in order
    pub words: Vec<QueryWord>,
    /// The query this tree was parsed from
    pub query: SearchQuery,
    /// Analyzer used for the words, reused when the query is re-parsed
    pub analyzer: Analyzer,
}

impl QueryTree {
    /// Human readable form of the parsed query
    pub fn description(&self) -> String {
        format!("Query({})", self.root)
    }

    /// Distinct terms the query can match on, synonyms included
    pub fn terms(&self) -> Vec<&str> {
        self.root.terms()
    }

    /// True when only filters restrict the result
    pub fn is_filter_only(&self) -> bool {
        !self.root.is_scoring()
    }
}

/// Parse a query into a tree.
///
/// Fails with [`SearchError::EmptyQuery`] when the query string yields no
/// terms and no filter has a value.
pub fn parse_query(
    query: &SearchQuery,
    analyzer: &Analyzer,
    synonyms: &SynonymTable,
) -> Result<QueryTree> {
    let tokens = analyzer.tokenize(&query.query_string);
    let phrase = query.default_operator == QueryOperator::Phrase;

    let words: Vec<QueryWord> = tokens
        .iter()
        .map(|t| QueryWord {
            word: t.word.clone(),
            term: t.term.clone(),
            start: t.start,
            end: t.end,
        })
        .collect();

    let leaves: Vec<QueryNode> = tokens
        .iter()
        .map(|token| expand_synonyms(&token.word, &token.term, analyzer, synonyms, phrase))
        .collect();

    let text = match leaves.len() {
        0 => None,
        1 => leaves.into_iter().next(),
        _ => Some(match query.default_operator {
            QueryOperator::Or => QueryNode::Or(leaves),
            QueryOperator::And => QueryNode::And(leaves),
            QueryOperator::Phrase => QueryNode::Phrase(leaves),
        }),
    };

    let filters: Vec<QueryNode> = query
        .filters
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(key, values)| {
            let mut values = values.clone();
            values.sort();
            values.dedup();
            QueryNode::Filter {
                key: key.clone(),
                values,
            }
        })
        .collect();

    let root = match (text, filters.is_empty()) {
        (None, true) => return Err(SearchError::EmptyQuery),
        (Some(text), true) => text,
        (text, false) => {
            let mut children: Vec<QueryNode> = text.into_iter().collect();
            children.extend(filters);
            QueryNode::FilterAnd(children)
        }
    };

    Ok(QueryTree {
        root,
        words,
        query: query.clone(),
        analyzer: *analyzer,
    })
}

/// Term leaf for one word, OR'd with its synonyms when it has any.
/// Synonyms only go one way: from the thesaurus key to its expansions.
fn expand_synonyms(
    word: &str,
    term: &str,
    analyzer: &Analyzer,
    synonyms: &SynonymTable,
    in_phrase: bool,
) -> QueryNode {
    let original = QueryNode::Term(term.to_string());
    let Some(expansions) = synonyms.get(word) else {
        return original;
    };

    let mut alternatives = vec![original];
    for expansion in expansions {
        let terms: Vec<QueryNode> = analyzer
            .tokenize(expansion)
            .into_iter()
            .map(|t| QueryNode::Term(t.term))
            .collect();
        let node = match terms.len() {
            0 => continue,
            1 => terms.into_iter().next(),
            // Phrase slots hold single terms only
            _ if in_phrase => continue,
            _ => Some(QueryNode::Phrase(terms)),
        };
        if let Some(node) = node {
            if !alternatives.contains(&node) {
                alternatives.push(node);
            }
        }
    }

    if alternatives.len() == 1 {
        alternatives.pop().unwrap_or(QueryNode::Term(term.to_string()))
    } else {
        QueryNode::Or(alternatives)
    }
}
