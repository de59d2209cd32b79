//! Utility functions and data structures.
//!
//! This module provides shared utilities used throughout locus:
//!
//! ## Modules
//!
//! - [`cancel`] - Cooperative cancellation probes
//! - [`config`] - Engine configuration (user config directory, JSON)
//! - [`encoding`] - Varints, delta lists and checksummed file framing
//! - [`trigram`] - Padded 3-byte sequences used by the spelling index
//! - [`tokenizer`] - Word splitting, case folding and stemming
//!
//! ## Key Functions
//!
//! ```
//! use locus::utils::{trigramize, tokenize, Language};
//!
//! // Terms are folded and stemmed with the selected language
//! let terms = tokenize("Running foxes", Some(Language::English));
//! assert_eq!(terms[1].0, "fox");
//!
//! // Trigrams of a word, used for spelling correction
//! let grams = trigramize("water");
//! assert_eq!(grams.len(), 5);
//! ```

pub mod cancel;
pub mod config;
pub mod encoding;
pub mod tokenizer;
pub mod trigram;

pub use cancel::*;
pub use config::*;
pub use encoding::*;
pub use tokenizer::*;
pub use trigram::*;
