use crate::error::Result;
use crate::index::reader::IndexReader;
use std::fmt;
use std::path::{Path, PathBuf};

/// Summary of a database, shown by `locus stats`
#[derive(Debug, Clone, PartialEq)]
pub struct DatabaseStats {
    pub path: PathBuf,
    pub version: u32,
    pub generation: u64,
    pub segment_count: usize,
    pub live_documents: u64,
    pub deleted_documents: u64,
    pub term_count: usize,
    pub spelling_words: usize,
    pub synonym_entries: usize,
    pub average_doc_length: f64,
    pub disk_size: u64,
    pub created_at: u64,
    pub updated_at: u64,
}

impl DatabaseStats {
    pub fn collect(path: &Path) -> Result<Self> {
        let reader = IndexReader::open(path)?;
        let meta = reader.meta();

        Ok(Self {
            path: path.to_path_buf(),
            version: meta.version,
            generation: meta.generation,
            segment_count: meta.segments.len(),
            live_documents: reader.document_count(),
            deleted_documents: reader.deleted_doc_ids().len(),
            term_count: reader.terms().len(),
            spelling_words: reader.spelling_words()?.len(),
            synonym_entries: reader.synonyms().len(),
            average_doc_length: reader.average_doc_length(),
            disk_size: dir_size(path)?,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
        })
    }
}

impl fmt::Display for DatabaseStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Database Statistics")?;
        writeln!(f, "===================")?;
        writeln!(f)?;
        writeln!(f, "Location:         {}", self.path.display())?;
        writeln!(f, "Format version:   {}", self.version)?;
        writeln!(f, "Generation:       {}", self.generation)?;
        writeln!(f, "Segments:         {}", self.segment_count)?;
        writeln!(f, "Documents:        {}", self.live_documents)?;
        writeln!(f, "Deleted (pending compaction): {}", self.deleted_documents)?;
        writeln!(f, "Distinct terms:   {}", self.term_count)?;
        writeln!(f, "Spelling words:   {}", self.spelling_words)?;
        writeln!(f, "Synonym entries:  {}", self.synonym_entries)?;
        writeln!(f, "Avg doc length:   {:.1}", self.average_doc_length)?;
        writeln!(f, "Size on disk:     {}", format_size(self.disk_size))?;
        writeln!(f)?;
        writeln!(f, "Created:          {}", format_timestamp(self.created_at))?;
        write!(f, "Updated:          {}", format_timestamp(self.updated_at))
    }
}

/// Calculate directory size recursively
fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut size = 0;
    if path.is_dir() {
        for entry in std::fs::read_dir(path)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_file() {
                size += entry.metadata()?.len();
            } else if path.is_dir() {
                size += dir_size(&path)?;
            }
        }
    }
    Ok(size)
}

/// Format byte size to human readable
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

/// Format unix timestamp
fn format_timestamp(ts: u64) -> String {
    use std::time::{Duration, UNIX_EPOCH};
    let datetime = UNIX_EPOCH + Duration::from_secs(ts);
    format!("{:?}", datetime)
}
