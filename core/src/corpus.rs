use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{IrError, Result};
use crate::DocId;

pub const REDACTED_TITLE: &str = "REDACTED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub description: String,
}

impl Document {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self { title: title.into(), description: description.into() }
    }

    pub fn is_tombstone(&self) -> bool {
        self.title == REDACTED_TITLE && self.description.is_empty()
    }
}

/// Append-only document store; position is the document id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Corpus {
    docs: Vec<Document>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    pub fn get(&self, doc_id: DocId) -> Option<&Document> {
        self.docs.get(doc_id as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Document> {
        self.docs.iter()
    }

    pub fn as_slice(&self) -> &[Document] {
        &self.docs
    }

    pub fn extend(&mut self, docs: impl IntoIterator<Item = Document>) {
        self.docs.extend(docs);
    }

    /// Erases a record's content but keeps its slot.
    pub fn tombstone(&mut self, doc_id: DocId) {
        if let Some(doc) = self.docs.get_mut(doc_id as usize) {
            doc.title = REDACTED_TITLE.to_string();
            doc.description.clear();
        }
    }

    pub fn live_len(&self) -> usize {
        self.docs.iter().filter(|d| !d.is_tombstone()).count()
    }
}

impl From<Vec<Document>> for Corpus {
    fn from(docs: Vec<Document>) -> Self {
        Self { docs }
    }
}

/// Joins a metadata TSV (id, _, title, ...) with a descriptions TSV (id, text).
///
/// Descriptions whose id has no metadata row are skipped.
pub fn load_tsv<P: AsRef<Path>, Q: AsRef<Path>>(metadata: P, descriptions: Q) -> Result<Vec<Document>> {
    let mut titles: HashMap<String, String> = HashMap::new();
    for (line_no, line) in BufReader::new(File::open(metadata.as_ref())?).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let cols: Vec<&str> = line.split('\t').collect();
        match (cols.first(), cols.get(2)) {
            (Some(id), Some(title)) => {
                titles.insert(id.to_string(), title.to_string());
            }
            _ => tracing::warn!(path = ?metadata.as_ref(), line = line_no + 1, "skipping short metadata row"),
        }
    }

    let mut docs = Vec::new();
    let mut skipped = 0usize;
    for (line_no, line) in BufReader::new(File::open(descriptions.as_ref())?).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let Some((id, text)) = line.split_once('\t') else {
            tracing::warn!(path = ?descriptions.as_ref(), line = line_no + 1, "skipping description row without tab");
            continue;
        };
        match titles.get(id) {
            Some(title) => docs.push(Document::new(title.clone(), text)),
            None => skipped += 1,
        }
    }
    tracing::info!(documents = docs.len(), skipped, "loaded tsv corpus");
    Ok(docs)
}

#[derive(Debug, Deserialize)]
struct InputDoc {
    title: String,
    #[serde(alias = "body")]
    description: String,
}

/// One JSON object per line with `title` and `description` (or `body`).
pub fn load_jsonl<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let path = path.as_ref();
    let reader = BufReader::new(File::open(path)?);
    let mut docs = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: InputDoc = serde_json::from_str(&line).map_err(|e| IrError::CorpusFormat {
            path: path.to_path_buf(),
            line: line_no + 1,
            reason: e.to_string(),
        })?;
        docs.push(Document::new(doc.title, doc.description));
    }
    tracing::info!(documents = docs.len(), "loaded jsonl corpus");
    Ok(docs)
}
