#![no_main]

use libfuzzer_sys::fuzz_target;
use locus::utils::{trigramize, Analyzer};

fuzz_target!(|data: &str| {
    // Every analyzed word of a non-empty text yields at least one trigram
    for token in Analyzer::default().tokenize(data) {
        assert!(!trigramize(&token.word).is_empty());
        assert!(token.start < token.end && token.end <= data.len());
    }
});
