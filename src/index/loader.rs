//! Reader for the flat record format used by `locus index`.
//!
//! ```text
//! filename=document3.txt
//! title=The third document
//! content=This is an example of a field that is
//! =spread over
//! =multiple lines.
//!
//! filename=document4.txt
//! ```
//!
//! Records are separated by blank lines. A line starting with `=`
//! continues the previous value (joined with a newline). A field that
//! appears several times in one record gets several values.

use crate::error::{Result, SearchError};
use crate::index::record::IndexableRecord;
use crate::index::schema::Schema;
use memchr::{memchr, memchr_iter};
use std::sync::Arc;

/// One record as written in the file, before schema validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    /// 1-based line of the record's first field
    pub line: usize,
    pub fields: Vec<(String, String)>,
}

/// Split `input` into records. Malformed lines are errors naming the line.
pub fn parse_flat_records(input: &str) -> Result<Vec<FlatRecord>> {
    let bytes = input.as_bytes();
    let mut records = Vec::new();
    let mut current: Option<FlatRecord> = None;

    let mut start = 0;
    let mut line_no = 0;
    let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));

    for end in ends {
        if start > bytes.len() {
            break;
        }
        line_no += 1;
        let line = input[start..end].strip_suffix('\r').unwrap_or(&input[start..end]);
        start = end + 1;

        if line.trim().is_empty() {
            if let Some(record) = current.take() {
                records.push(record);
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix('=') {
            let record = current.as_mut().ok_or_else(|| {
                SearchError::validation(
                    format!("line {}", line_no),
                    "continuation line without a preceding field",
                )
            })?;
            if let Some((_, value)) = record.fields.last_mut() {
                value.push('\n');
                value.push_str(rest);
            }
            continue;
        }

        let Some(eq) = memchr(b'=', line.as_bytes()) else {
            return Err(SearchError::validation(
                format!("line {}", line_no),
                "expected 'field=value'",
            ));
        };

        let field = line[..eq].trim();
        if field.is_empty() {
            return Err(SearchError::validation(
                format!("line {}", line_no),
                "empty field name",
            ));
        }

        current
            .get_or_insert_with(|| FlatRecord {
                line: line_no,
                fields: Vec::new(),
            })
            .fields
            .push((field.to_string(), line[eq + 1..].to_string()));
    }

    if let Some(record) = current.take() {
        records.push(record);
    }
    Ok(records)
}

impl FlatRecord {
    /// Validate against a schema
    pub fn into_record(self, schema: &Arc<Schema>) -> Result<IndexableRecord> {
        let mut record = IndexableRecord::new(Arc::clone(schema));
        for (field, value) in self.fields {
            record.add_value(&field, value)?;
        }
        Ok(record)
    }
}
