use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use crate::corpus::Corpus;
use crate::deletions::InvalidationVector;
use crate::error::{IrError, Result};
use crate::index::InvertedIndex;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    pub created_at: String,
    pub version: u32,
}

pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
    fn index(&self) -> PathBuf { self.root.join("index.bin") }
    fn biword(&self) -> PathBuf { self.root.join("biword.bin") }
    fn corpus(&self) -> PathBuf { self.root.join("corpus.bin") }
    fn deletions(&self) -> PathBuf { self.root.join("deletions.bin") }
    fn meta(&self) -> PathBuf { self.root.join("meta.json") }

    /// Whether a saved index appears to live here.
    pub fn exists(&self) -> bool {
        self.meta().is_file()
    }
}

/// Writes next to the target and renames over it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn save_bin<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value)?;
    write_atomic(path, &bytes)
}

fn load_bin<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(bincode::deserialize(&buf)?)
}

pub fn save_index(path: &Path, index: &InvertedIndex) -> Result<()> {
    write_atomic(path, &index.serialize()?)
}

pub fn load_index(path: &Path) -> Result<InvertedIndex> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    InvertedIndex::deserialize(&buf)
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    create_dir_all(&paths.root)?;
    let json = serde_json::to_string_pretty(meta)?;
    write_atomic(&paths.meta(), json.as_bytes())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let mut f = File::open(paths.meta())?;
    let mut buf = String::new();
    f.read_to_string(&mut buf)?;
    let meta: MetaFile = serde_json::from_str(&buf)?;
    Ok(meta)
}

/// Everything `save_system` writes.
pub struct StoredSystem {
    pub terms: InvertedIndex,
    pub biwords: InvertedIndex,
    pub corpus: Corpus,
    pub deletions: InvalidationVector,
    pub meta: MetaFile,
}

/// Document ids are `u32`, so a larger corpus cannot be described by meta.json.
fn document_count(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| IrError::Corrupt(format!("corpus of {len} documents exceeds the u32 id space")))
}

/// Writes the artifact set; meta.json goes last and marks the set complete.
pub fn save_system(
    paths: &IndexPaths,
    terms: &InvertedIndex,
    biwords: &InvertedIndex,
    corpus: &Corpus,
    deletions: &InvalidationVector,
) -> Result<()> {
    let num_docs = document_count(corpus.len())?;
    create_dir_all(&paths.root)?;
    save_index(&paths.index(), terms)?;
    save_index(&paths.biword(), biwords)?;
    save_bin(&paths.corpus(), corpus)?;
    save_bin(&paths.deletions(), deletions)?;
    let meta = MetaFile {
        num_docs,
        created_at: time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_default(),
        version: FORMAT_VERSION,
    };
    save_meta(paths, &meta)
}

pub fn load_system(paths: &IndexPaths) -> Result<StoredSystem> {
    let meta = load_meta(paths)?;
    if meta.version > FORMAT_VERSION {
        return Err(IrError::Corrupt(format!(
            "index format version {} is newer than supported {}",
            meta.version, FORMAT_VERSION
        )));
    }
    let stored = StoredSystem {
        terms: load_index(&paths.index())?,
        biwords: load_index(&paths.biword())?,
        corpus: load_bin(&paths.corpus())?,
        deletions: load_bin(&paths.deletions())?,
        meta,
    };
    if stored.corpus.len() != stored.meta.num_docs as usize {
        return Err(IrError::Corrupt(format!(
            "meta.json lists {} documents but corpus has {}",
            stored.meta.num_docs,
            stored.corpus.len()
        )));
    }
    Ok(stored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::Document;
    use tempfile::tempdir;

    #[test]
    fn missing_directory_is_recoverable_error() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("nope"));
        assert!(!paths.exists());
        let err = load_system(&paths).err().unwrap();
        assert!(err.is_persistence_failure());
    }

    #[test]
    fn corrupt_artifact_is_reported() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path());
        let corpus = Corpus::from(vec![Document::new("a", "b")]);
        save_system(&paths, &InvertedIndex::new(), &InvertedIndex::new(), &corpus, &InvalidationVector::with_live(1)).unwrap();
        assert!(paths.exists());
        std::fs::write(dir.path().join("corpus.bin"), b"\xff").unwrap();
        let err = load_system(&paths).err().unwrap();
        assert!(matches!(err, IrError::Serialization(_)));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn oversized_corpus_is_rejected_not_truncated() {
        assert_eq!(document_count(u32::MAX as usize).unwrap(), u32::MAX);
        let err = document_count(u32::MAX as usize + 1).err().unwrap();
        assert!(matches!(err, IrError::Corrupt(_)));
    }
}
