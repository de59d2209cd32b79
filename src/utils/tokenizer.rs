use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use unicode_segmentation::UnicodeSegmentation;

/// Tokens longer than this (in bytes) are dropped by default.
/// Such runs are usually encoded blobs rather than words anyone searches for.
pub const DEFAULT_MAX_TERM_LENGTH: usize = 64;

/// Stemming languages. Each maps onto one Snowball stemmer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Danish,
    Dutch,
    English,
    Finnish,
    French,
    German,
    Hungarian,
    Italian,
    Norwegian,
    Portuguese,
    Russian,
    Spanish,
    Swedish,
}

impl Language {
    pub const ALL: [Language; 13] = [
        Language::Danish,
        Language::Dutch,
        Language::English,
        Language::Finnish,
        Language::French,
        Language::German,
        Language::Hungarian,
        Language::Italian,
        Language::Norwegian,
        Language::Portuguese,
        Language::Russian,
        Language::Spanish,
        Language::Swedish,
    ];

    /// Parse a language name, case-insensitively
    pub fn from_name(name: &str) -> Option<Language> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|lang| lang.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Language::Danish => "danish",
            Language::Dutch => "dutch",
            Language::English => "english",
            Language::Finnish => "finnish",
            Language::French => "french",
            Language::German => "german",
            Language::Hungarian => "hungarian",
            Language::Italian => "italian",
            Language::Norwegian => "norwegian",
            Language::Portuguese => "portuguese",
            Language::Russian => "russian",
            Language::Spanish => "spanish",
            Language::Swedish => "swedish",
        }
    }

    fn algorithm(self) -> Algorithm {
        match self {
            Language::Danish => Algorithm::Danish,
            Language::Dutch => Algorithm::Dutch,
            Language::English => Algorithm::English,
            Language::Finnish => Algorithm::Finnish,
            Language::French => Algorithm::French,
            Language::German => Algorithm::German,
            Language::Hungarian => Algorithm::Hungarian,
            Language::Italian => Algorithm::Italian,
            Language::Norwegian => Algorithm::Norwegian,
            Language::Portuguese => Algorithm::Portuguese,
            Language::Russian => Algorithm::Russian,
            Language::Spanish => Algorithm::Spanish,
            Language::Swedish => Algorithm::Swedish,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    /// Shared stemmer for this language, built on first use
    fn stemmer(self) -> &'static Stemmer {
        static STEMMERS: [OnceLock<Stemmer>; 13] = [const { OnceLock::new() }; 13];
        STEMMERS[self.index()].get_or_init(|| Stemmer::create(self.algorithm()))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A single analyzed word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    /// Case-folded and stemmed form, the indexed term
    pub term: String,
    /// Case-folded form before stemming
    pub word: String,
    /// Word position within the analyzed text
    pub position: u32,
    /// Byte offsets of the word in the source text
    pub start: usize,
    pub end: usize,
}

/// Splits text into terms. Cheap to copy, holds no per-call state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Analyzer {
    language: Option<Language>,
    max_term_length: usize,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Some(Language::English))
    }
}

impl Analyzer {
    /// `None` disables stemming
    pub fn new(language: Option<Language>) -> Self {
        Self {
            language,
            max_term_length: DEFAULT_MAX_TERM_LENGTH,
        }
    }

    pub fn with_max_term_length(mut self, max_term_length: usize) -> Self {
        self.max_term_length = max_term_length.max(1);
        self
    }

    pub fn language(&self) -> Option<Language> {
        self.language
    }

    /// Tokenize text on Unicode word boundaries. Positions are consecutive
    /// over the tokens returned.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mut tokens = Vec::new();
        let mut position = 0u32;

        for (start, raw) in text.unicode_word_indices() {
            if raw.len() > self.max_term_length {
                continue;
            }
            let word = fold(raw);
            let term = self.stem(&word);
            tokens.push(Token {
                term,
                word,
                position,
                start,
                end: start + raw.len(),
            });
            position += 1;
        }

        tokens
    }

    /// Normalize a single word the way `tokenize` would
    pub fn normalize_word(&self, word: &str) -> String {
        self.stem(&fold(word))
    }

    fn stem(&self, folded: &str) -> String {
        match self.language {
            Some(lang) => lang.stemmer().stem(folded).into_owned(),
            None => folded.to_string(),
        }
    }
}

/// Unicode case folding used by both index and query paths
pub fn fold(word: &str) -> String {
    word.to_lowercase()
}

/// Tokenize `text` into `(term, position)` pairs
pub fn tokenize(text: &str, language: Option<Language>) -> Vec<(String, u32)> {
    Analyzer::new(language)
        .tokenize(text)
        .into_iter()
        .map(|t| (t.term, t.position))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_english_stems() {
        let tokens = tokenize("The Quick foxes, jumping!", Some(Language::English));
        assert_eq!(
            tokens,
            vec![
                ("the".to_string(), 0),
                ("quick".to_string(), 1),
                ("fox".to_string(), 2),
                ("jump".to_string(), 3),
            ]
        );
    }

    #[test]
    fn test_no_language_disables_stemming() {
        let tokens = tokenize("Running Foxes", None);
        assert_eq!(
            tokens,
            vec![("running".to_string(), 0), ("foxes".to_string(), 1)]
        );
    }

    #[test]
    fn test_byte_offsets_and_words() {
        let text = "Grüße aus Köln";
        let tokens = Analyzer::new(None).tokenize(text);
        assert_eq!(tokens.len(), 3);
        assert_eq!(&text[tokens[0].start..tokens[0].end], "Grüße");
        assert_eq!(tokens[0].word, "grüße");
        assert_eq!(&text[tokens[2].start..tokens[2].end], "Köln");
    }

    #[test]
    fn test_long_tokens_dropped() {
        let long = "x".repeat(100);
        let text = format!("short {} word", long);
        let tokens = Analyzer::new(None).tokenize(&text);
        let terms: Vec<_> = tokens.iter().map(|t| t.term.as_str()).collect();
        assert_eq!(terms, vec!["short", "word"]);
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_language_names() {
        assert_eq!(Language::from_name("German"), Some(Language::German));
        assert_eq!(Language::from_name("klingon"), None);
        for lang in Language::ALL {
            assert_eq!(Language::from_name(lang.name()), Some(lang));
        }
        let json = serde_json::to_string(&Language::Swedish).unwrap();
        assert_eq!(json, "\"swedish\"");
    }

    #[test]
    fn test_index_and_query_symmetry() {
        let analyzer = Analyzer::new(Some(Language::English));
        let indexed = analyzer.tokenize("connections");
        assert_eq!(indexed[0].term, analyzer.normalize_word("Connection"));
    }

    #[test]
    fn test_punctuation_only_text() {
        assert!(tokenize("... --- !!!", Some(Language::English)).is_empty());
    }
}
