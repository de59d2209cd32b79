use crate::error::{Result, SearchError};
use crate::index::schema::Schema;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A record waiting to be indexed: field name -> ordered values.
///
/// Values are checked against the schema as they are added, so a record
/// that exists is always structurally valid.
#[derive(Debug, Clone)]
pub struct IndexableRecord {
    schema: Arc<Schema>,
    fields: BTreeMap<String, Vec<String>>,
}

impl IndexableRecord {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self {
            schema,
            fields: BTreeMap::new(),
        }
    }

    /// A record asking for the document with this external id to be removed
    pub fn delete(schema: Arc<Schema>, id: &str) -> Result<Self> {
        let id_field = schema
            .id_field()
            .ok_or_else(|| SearchError::schema("<schema>", "schema has no id field"))?
            .to_string();
        let mut record = Self::new(schema);
        record.add_value(&id_field, id)?;
        Ok(record)
    }

    pub fn add_value(&mut self, field: &str, value: impl Into<String>) -> Result<()> {
        let value = value.into();
        let options = self
            .schema
            .field(field)
            .ok_or_else(|| SearchError::schema(field, "field is not defined in the schema"))?;

        if value.contains('\0') {
            return Err(SearchError::validation(field, "value contains a NUL character"));
        }

        if options.numeric_slot.is_some() && value.trim().parse::<f64>().is_err() {
            return Err(SearchError::validation(
                field,
                format!("'{}' is not a number", value),
            ));
        }

        if options.id {
            if value.is_empty() {
                return Err(SearchError::validation(field, "id must not be empty"));
            }
            if self.fields.get(field).is_some_and(|v| !v.is_empty()) {
                return Err(SearchError::validation(field, "record already has an id"));
            }
        }

        self.fields.entry(field.to_string()).or_default().push(value);
        Ok(())
    }

    pub fn add_values<I, S>(&mut self, field: &str, values: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.add_value(field, value)?;
        }
        Ok(())
    }

    pub fn values_for_field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Value of the schema's id field, if the record carries one
    pub fn external_id(&self) -> Option<&str> {
        let id_field = self.schema.id_field()?;
        self.values_for_field(id_field).first().map(String::as_str)
    }

    /// True when the id is the only populated field
    pub fn is_delete_only(&self) -> bool {
        let Some(id_field) = self.schema.id_field() else {
            return false;
        };
        self.external_id().is_some()
            && self
                .fields
                .iter()
                .all(|(name, values)| name == id_field || values.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::from_json(
                r#"{
                    "id": {"id": true, "field": true},
                    "title": {"index": true, "field": true},
                    "price": {"numericslot": 1},
                    "junk": {}
                }"#,
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_values_accumulate_in_order() {
        let mut record = IndexableRecord::new(schema());
        record.add_values("title", ["first", "second"]).unwrap();
        record.add_value("junk", "ignored but valid").unwrap();
        assert_eq!(record.values_for_field("title"), ["first", "second"]);
        assert!(record.values_for_field("price").is_empty());
        assert_eq!(record.field_names().collect::<Vec<_>>(), vec!["junk", "title"]);
    }

    #[test]
    fn test_unknown_field_is_schema_violation() {
        let mut record = IndexableRecord::new(schema());
        let err = record.add_value("colour", "red").unwrap_err();
        assert!(matches!(err, SearchError::SchemaViolation { .. }));
    }

    #[test]
    fn test_value_validation() {
        let mut record = IndexableRecord::new(schema());
        assert!(matches!(
            record.add_value("title", "a\0b"),
            Err(SearchError::Validation { .. })
        ));
        assert!(matches!(
            record.add_value("price", "cheap"),
            Err(SearchError::Validation { .. })
        ));
        record.add_value("price", " 12.5 ").unwrap();
        assert!(record.add_value("id", "").is_err());
        record.add_value("id", "d1").unwrap();
        assert!(record.add_value("id", "d2").is_err());
        assert_eq!(record.external_id(), Some("d1"));
    }

    #[test]
    fn test_delete_only_detection() {
        let deletion = IndexableRecord::delete(schema(), "d1").unwrap();
        assert!(deletion.is_delete_only());

        let mut full = IndexableRecord::new(schema());
        full.add_value("id", "d1").unwrap();
        full.add_value("title", "hello").unwrap();
        assert!(!full.is_delete_only());

        assert!(!IndexableRecord::new(schema()).is_delete_only());
    }

    #[test]
    fn test_delete_requires_id_field() {
        let schema = Arc::new(Schema::from_json(r#"{"title": {"index": true}}"#).unwrap());
        assert!(IndexableRecord::delete(schema, "x").is_err());
    }
}
