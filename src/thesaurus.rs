//! Synonym storage.
//!
//! Synonyms are one-directional: a query word that is a key is expanded to
//! itself plus all its synonyms. The table lives in `synonyms.json` inside
//! the database directory and is replaced atomically on every change, so
//! the next reader opened sees either the old or the new table.

use crate::error::{Result, SearchError};
use crate::index::reader::META_FILE;
use crate::utils::{fold, Analyzer};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

const SYNONYMS_FILE: &str = "synonyms.json";

/// Folded source word -> folded expansions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SynonymTable {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl SynonymTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table of a database; a database without one has no synonyms
    pub fn load(db_path: &Path) -> Result<Self> {
        let path = db_path.join(SYNONYMS_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the table next to meta.json via a temp file and rename
    pub fn save(&self, db_path: &Path) -> Result<()> {
        let path = db_path.join(SYNONYMS_FILE);
        let tmp = db_path.join(format!("{}.tmp", SYNONYMS_FILE));
        let json = serde_json::to_vec_pretty(self).map_err(|e| SearchError::Engine(e.to_string()))?;

        let mut file = File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Add expansions for `word`. Empty values and self-references are skipped.
    ///
    /// Queries look synonyms up one word at a time, so `word` must analyze
    /// to exactly one word; expansions may be phrases.
    pub fn insert<I, S>(&mut self, word: &str, synonyms: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let key = normalize(word);
        if key.is_empty() {
            return Ok(());
        }
        if !is_single_word(&key) {
            return Err(SearchError::Validation {
                field: word.to_string(),
                reason: "a synonym key must be a single word".into(),
            });
        }
        let expansions: BTreeSet<String> = synonyms
            .into_iter()
            .map(|s| normalize(s.as_ref()))
            .filter(|s| !s.is_empty() && *s != key)
            .collect();
        if !expansions.is_empty() {
            self.entries.entry(key).or_default().extend(expansions);
        }
        Ok(())
    }

    /// Expansions of a folded word
    pub fn get(&self, word: &str) -> Option<&BTreeSet<String>> {
        self.entries.get(word)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Fold case and collapse inner whitespace
fn normalize(text: &str) -> String {
    fold(text).split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the tokenizer sees `key` as one word, unchanged
fn is_single_word(key: &str) -> bool {
    let tokens = Analyzer::new(None).tokenize(key);
    matches!(tokens.as_slice(), [token] if token.word == key)
}

/// Synonym management for one database
#[derive(Debug)]
pub struct Thesaurus {
    db_path: PathBuf,
    table: SynonymTable,
}

impl Thesaurus {
    /// `path` must be an existing database
    pub fn open(path: &Path) -> Result<Self> {
        if !path.join(META_FILE).exists() {
            return Err(SearchError::NotFound(format!(
                "no database at {}",
                path.display()
            )));
        }
        Ok(Self {
            db_path: path.to_path_buf(),
            table: SynonymTable::load(path)?,
        })
    }

    /// Add every `word -> [synonyms]` mapping and persist immediately
    pub fn add_synonyms<S: AsRef<str>>(&mut self, synonyms: &BTreeMap<String, Vec<S>>) -> Result<()> {
        let mut table = self.table.clone();
        for (word, expansions) in synonyms {
            table.insert(word, expansions)?;
        }
        self.table = table;
        self.persist()
    }

    /// Add rows of the form `[word, syn1, syn2, ...]`. Rows with fewer than
    /// two entries carry no synonym and are skipped.
    pub fn add_synonyms_from_array<S: AsRef<str>>(&mut self, rows: &[Vec<S>]) -> Result<()> {
        let mut table = self.table.clone();
        for row in rows {
            if let Some((word, expansions)) = row.split_first() {
                table.insert(word.as_ref(), expansions)?;
            }
        }
        self.table = table;
        self.persist()
    }

    /// All synonyms currently defined
    pub fn get_synonyms(&self) -> &SynonymTable {
        &self.table
    }

    pub fn clear_synonyms(&mut self) -> Result<()> {
        self.table.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        self.table.save(&self.db_path)?;
        info!(entries = self.table.len(), "synonyms updated");
        Ok(())
    }
}
