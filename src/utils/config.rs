use crate::error::{Result, SearchError};
use crate::utils::tokenizer::{DEFAULT_MAX_TERM_LENGTH, Language};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "locus";
const CONFIG_FILE: &str = "config.json";

/// BM25 parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    /// Term frequency saturation
    pub k1: f64,
    /// Document length normalization, 0.0 disables it
    pub b: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpellingConfig {
    /// Candidates further than this from the query word are never suggested
    pub max_edit_distance: usize,
    /// How many trigram-overlap candidates get an edit-distance check
    pub max_candidates: usize,
}

impl Default for SpellingConfig {
    fn default() -> Self {
        Self {
            max_edit_distance: 2,
            max_candidates: 50,
        }
    }
}

/// When a commit triggers an automatic compaction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionPolicy {
    pub max_segments: usize,
    /// Deleted documents over all documents ever stored in live segments
    pub max_deleted_ratio: f64,
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self {
            max_segments: 16,
            max_deleted_ratio: 0.5,
        }
    }
}

impl CompactionPolicy {
    pub fn should_compact(&self, segments: usize, deleted: u64, stored: u64) -> bool {
        if segments > self.max_segments {
            return true;
        }
        stored > 0 && (deleted as f64 / stored as f64) > self.max_deleted_ratio
    }
}

/// Engine configuration, stored as JSON in the user's config directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `null` disables stemming at both index and query time
    pub stemming_language: Option<Language>,
    pub scoring: ScoringWeights,
    /// Positions skipped between two values of the same field so phrases
    /// never match across value boundaries
    pub position_gap: u32,
    pub max_term_length: usize,
    pub spelling: SpellingConfig,
    pub compaction: CompactionPolicy,
    pub default_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            stemming_language: Some(Language::English),
            scoring: ScoringWeights::default(),
            position_gap: 100,
            max_term_length: DEFAULT_MAX_TERM_LENGTH,
            spelling: SpellingConfig::default(),
            compaction: CompactionPolicy::default(),
            default_page_size: 10,
        }
    }
}

impl EngineConfig {
    /// Load config from the user config directory, or return default if not found
    pub fn load() -> Result<Self> {
        match get_config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load config from an explicit file. Malformed files are errors.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SearchError::validation(path.display().to_string(), e.to_string())
        })
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SearchError::Engine(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Analyzer matching this configuration
    pub fn analyzer(&self) -> crate::utils::tokenizer::Analyzer {
        crate::utils::tokenizer::Analyzer::new(self.stemming_language)
            .with_max_term_length(self.max_term_length)
    }
}

/// Path of the user-level config file, if the platform has a config directory
pub fn get_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_NAME).join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_default() {
        let config = EngineConfig::default();
        assert_eq!(config.stemming_language, Some(Language::English));
        assert_eq!(config.scoring.k1, 1.2);
        assert_eq!(config.default_page_size, 10);
    }

    #[test]
    fn test_engine_config_partial_json() {
        // Should use defaults for missing fields
        let json = r#"{"position_gap": 5, "scoring": {"k1": 2.0}}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.position_gap, 5);
        assert_eq!(config.scoring.k1, 2.0);
        assert_eq!(config.scoring.b, 0.75);
        assert_eq!(config.stemming_language, Some(Language::English));
    }

    #[test]
    fn test_null_language_disables_stemming() {
        let config: EngineConfig = serde_json::from_str(r#"{"stemming_language": null}"#).unwrap();
        assert_eq!(config.stemming_language, None);
        assert_eq!(config.analyzer().language(), None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = EngineConfig {
            stemming_language: Some(Language::French),
            default_page_size: 25,
            ..EngineConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(EngineConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(EngineConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_compaction_policy() {
        let policy = CompactionPolicy::default();
        assert!(!policy.should_compact(1, 0, 0));
        assert!(policy.should_compact(17, 0, 10));
        assert!(policy.should_compact(2, 6, 10));
        assert!(!policy.should_compact(2, 5, 10));
    }
}
