use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::data::{Post, post_from_row};
use crate::errors::PipelineError;
use crate::source::RecordStream;

/// Top-level document shapes accepted by both source modes: a bare
/// array of rows, or a CouchDB-style export object carrying the rows
/// under its `rows` key.
#[derive(Deserialize)]
#[serde(untagged)]
enum Document {
    Rows(Vec<Value>),
    Export { rows: Vec<Value> },
}

impl Document {
    fn into_rows(self) -> Vec<Value> {
        match self {
            Document::Rows(rows) | Document::Export { rows } => rows,
        }
    }
}

/// Record stream over a fully materialized post document.
///
/// The whole document parses up front, so the record count is known
/// before iteration and malformed top-level structure fails fast at
/// construction. Rows are kept as raw JSON values: one malformed row is
/// a per-record error on its own `next_record` call, not a document
/// error.
#[derive(Debug)]
pub struct BoundedSource {
    rows: std::vec::IntoIter<Value>,
    total: usize,
}

impl BoundedSource {
    fn from_document(document: Document) -> Self {
        let rows = document.into_rows();
        Self {
            total: rows.len(),
            rows: rows.into_iter(),
        }
    }

    /// Parse a document from any reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, PipelineError> {
        let document: Document = serde_json::from_reader(reader)
            .map_err(|err| PipelineError::Parse(err.to_string()))?;
        Ok(Self::from_document(document))
    }

    /// Parse a document held in a string.
    pub fn from_str(document: &str) -> Result<Self, PipelineError> {
        Self::from_reader(document.as_bytes())
    }

    /// Parse a document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }
}

impl RecordStream for BoundedSource {
    fn total(&self) -> Option<usize> {
        Some(self.total)
    }

    fn next_record(&mut self) -> Option<Result<Post, PipelineError>> {
        self.rows.next().map(post_from_row)
    }
}
