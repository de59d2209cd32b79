//! Field schema: which fields are indexed, stored, sortable or filterable.
//!
//! Schemas are JSON objects mapping field names to option objects, using
//! the same option names as the plist schemas of the mobile framework:
//!
//! ```json
//! {
//!   "title":    {"field": true, "index": true, "weight": 5, "spell": true, "textslot": 1},
//!   "filename": {"field": true, "id": true},
//!   "tag1":     {"field": true, "boolean": "tag"}
//! }
//! ```
//!
//! Options are validated once, when the schema is loaded. Unknown option
//! names, a weight below one, reused slot numbers and more than one `id`
//! field are all rejected up front.

use crate::error::{Result, SearchError};
use crate::index::types::SlotNumber;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Options of one field after validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldOptions {
    pub id: bool,
    pub index: bool,
    pub spell: bool,
    /// Multiplier applied to every term occurrence of this field
    pub weight: u32,
    /// Keep the raw values for retrieval (`field` in the schema file)
    pub stored: bool,
    /// Boolean filter key, if the field is filterable
    pub boolean_key: Option<String>,
    pub text_slot: Option<SlotNumber>,
    pub numeric_slot: Option<SlotNumber>,
}

impl Default for FieldOptions {
    fn default() -> Self {
        Self {
            id: false,
            index: false,
            spell: false,
            weight: 1,
            stored: false,
            boolean_key: None,
            text_slot: None,
            numeric_slot: None,
        }
    }
}

impl FieldOptions {
    /// A field with no effective option. Values for it are accepted and ignored.
    pub fn is_inert(&self) -> bool {
        !self.id
            && !self.index
            && !self.spell
            && !self.stored
            && self.boolean_key.is_none()
            && self.text_slot.is_none()
            && self.numeric_slot.is_none()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BooleanOption {
    Flag(bool),
    Key(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct RawFieldOptions {
    id: bool,
    index: bool,
    spell: bool,
    weight: Option<i64>,
    field: bool,
    boolean: Option<BooleanOption>,
    textslot: Option<i64>,
    numericslot: Option<i64>,
}

impl RawFieldOptions {
    fn resolve(self, name: &str) -> Result<FieldOptions> {
        let weight = match self.weight {
            None => 1,
            Some(w) if w >= 1 && w <= u32::MAX as i64 => w as u32,
            Some(w) => {
                return Err(SearchError::schema(
                    name,
                    format!("weight must be a positive integer, got {}", w),
                ));
            }
        };

        let boolean_key = match self.boolean {
            None | Some(BooleanOption::Flag(false)) => None,
            Some(BooleanOption::Flag(true)) => Some(name.to_string()),
            Some(BooleanOption::Key(key)) => {
                if key.chars().count() < 2 || !key.chars().all(char::is_alphanumeric) {
                    return Err(SearchError::schema(
                        name,
                        format!(
                            "boolean key '{}' must be at least 2 alphanumeric characters",
                            key
                        ),
                    ));
                }
                Some(key)
            }
        };

        Ok(FieldOptions {
            id: self.id,
            index: self.index,
            spell: self.spell,
            weight,
            stored: self.field,
            boolean_key,
            text_slot: slot_number(name, "textslot", self.textslot)?,
            numeric_slot: slot_number(name, "numericslot", self.numericslot)?,
        })
    }
}

fn slot_number(field: &str, option: &str, value: Option<i64>) -> Result<Option<SlotNumber>> {
    match value {
        None => Ok(None),
        Some(n) if n >= 1 && n <= SlotNumber::MAX as i64 => Ok(Some(n as SlotNumber)),
        Some(n) => Err(SearchError::schema(
            field,
            format!("{} must be a positive integer, got {}", option, n),
        )),
    }
}

/// A validated, immutable field schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    fields: BTreeMap<String, FieldOptions>,
    id_field: Option<String>,
}

impl Schema {
    /// Parse a JSON schema document
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
            .map_err(|e| SearchError::schema("<schema>", e.to_string()))?;

        let mut fields = BTreeMap::new();
        for (name, value) in raw {
            let options: RawFieldOptions = serde_json::from_value(value)
                .map_err(|e| SearchError::schema(name.as_str(), e.to_string()))?;
            let resolved = options.resolve(&name)?;
            fields.insert(name, resolved);
        }

        Self::from_options(fields)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Build a schema from already typed options, applying the same
    /// cross-field validation as [`Schema::from_json`]
    pub fn from_options(fields: BTreeMap<String, FieldOptions>) -> Result<Self> {
        let mut id_field: Option<String> = None;
        let mut slots: BTreeMap<SlotNumber, &str> = BTreeMap::new();

        for (name, options) in &fields {
            if name.is_empty() {
                return Err(SearchError::schema(name.as_str(), "field name must not be empty"));
            }
            if options.weight == 0 {
                return Err(SearchError::schema(name.as_str(), "weight must be at least 1"));
            }

            if options.id {
                if let Some(existing) = &id_field {
                    return Err(SearchError::schema(
                        name.as_str(),
                        format!("field '{}' is already the id field", existing),
                    ));
                }
                id_field = Some(name.clone());
            }

            for slot in options.text_slot.iter().chain(options.numeric_slot.iter()) {
                if let Some(owner) = slots.insert(*slot, name) {
                    return Err(SearchError::schema(
                        name.as_str(),
                        format!("slot {} is already used by field '{}'", slot, owner),
                    ));
                }
            }
        }

        Ok(Self { fields, id_field })
    }

    pub fn field(&self, name: &str) -> Option<&FieldOptions> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldOptions)> {
        self.fields.iter().map(|(name, opts)| (name.as_str(), opts))
    }

    /// Name of the field marked `id`, if any
    pub fn id_field(&self) -> Option<&str> {
        self.id_field.as_deref()
    }

    /// All boolean filter keys declared by the schema
    pub fn boolean_keys(&self) -> BTreeSet<&str> {
        self.fields
            .values()
            .filter_map(|opts| opts.boolean_key.as_deref())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXAMPLE: &str = r#"{
        "content":  {"field": true, "index": true, "spell": true},
        "title":    {"field": true, "index": true, "weight": 5, "spell": true, "textslot": 1},
        "filename": {"field": true, "id": true},
        "category": {"field": true, "boolean": true},
        "tag1":     {"field": true, "boolean": "tag"},
        "tag2":     {"field": true, "boolean": "tag"},
        "price":    {"numericslot": 2},
        "notes":    {}
    }"#;

    #[test]
    fn test_parse_example_schema() {
        let schema = Schema::from_json(EXAMPLE).unwrap();
        assert_eq!(schema.id_field(), Some("filename"));

        let title = schema.field("title").unwrap();
        assert_eq!(title.weight, 5);
        assert_eq!(title.text_slot, Some(1));
        assert!(title.stored && title.index && title.spell);

        assert_eq!(
            schema.field("category").unwrap().boolean_key.as_deref(),
            Some("category")
        );
        assert_eq!(schema.field("tag2").unwrap().boolean_key.as_deref(), Some("tag"));
        assert_eq!(
            schema.boolean_keys().into_iter().collect::<Vec<_>>(),
            vec!["category", "tag"]
        );
        assert!(schema.field("notes").unwrap().is_inert());
        assert!(!schema.field("price").unwrap().is_inert());
    }

    #[test]
    fn test_unknown_option_rejected() {
        let err = Schema::from_json(r#"{"title": {"colour": true}}"#).unwrap_err();
        assert!(matches!(err, SearchError::SchemaViolation { ref field, .. } if field == "title"));
    }

    #[test]
    fn test_bad_weight_rejected() {
        assert!(Schema::from_json(r#"{"title": {"index": true, "weight": 0}}"#).is_err());
        assert!(Schema::from_json(r#"{"title": {"index": true, "weight": -3}}"#).is_err());
        assert!(Schema::from_json(r#"{"title": {"index": true, "weight": "heavy"}}"#).is_err());
    }

    #[test]
    fn test_slot_reuse_rejected() {
        let err = Schema::from_json(r#"{"a": {"textslot": 3}, "b": {"numericslot": 3}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("slot 3"));
        assert!(Schema::from_json(r#"{"a": {"textslot": 0}}"#).is_err());
    }

    #[test]
    fn test_second_id_field_rejected() {
        let err = Schema::from_json(r#"{"a": {"id": true}, "b": {"id": true}}"#).unwrap_err();
        assert!(matches!(err, SearchError::SchemaViolation { .. }));
    }

    #[test]
    fn test_boolean_key_rules() {
        assert!(Schema::from_json(r#"{"a": {"boolean": "x"}}"#).is_err());
        assert!(Schema::from_json(r#"{"a": {"boolean": "bad key"}}"#).is_err());
        let schema = Schema::from_json(r#"{"a": {"boolean": false}}"#).unwrap();
        assert!(schema.field("a").unwrap().is_inert());
    }

    #[test]
    fn test_empty_field_name_rejected() {
        assert!(Schema::from_json(r#"{"": {"index": true}}"#).is_err());
    }
}
