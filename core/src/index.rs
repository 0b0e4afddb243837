use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashMap};

use crate::corpus::Document;
use crate::deletions::InvalidationVector;
use crate::error::Result;
use crate::postings::PostingsList;
use crate::tokenizer::Tokenizer;

pub type DocId = u32;

/// How a bulk build walks the documents.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub parallel: bool,
    pub progress_every: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self { parallel: true, progress_every: 10_000 }
    }
}

/// Ordered term -> postings mapping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvertedIndex {
    terms: BTreeMap<String, PostingsList>,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Term index over `docs`, numbered from `start`.
    pub fn build_from_corpus(docs: &[Document], start: DocId, tokenizer: &Tokenizer, opts: BuildOptions) -> Self {
        let index = Self::build_with(docs, start, opts, |doc| tokenizer.tokenize(&doc.description));
        tracing::info!(documents = docs.len(), start, terms = index.len(), "built term index");
        index
    }

    /// Biword index over `docs`; keys come from the unstemmed word stream.
    pub fn build_biword_from_corpus(docs: &[Document], start: DocId, tokenizer: &Tokenizer, opts: BuildOptions) -> Self {
        let index = Self::build_with(docs, start, opts, |doc| tokenizer.biwords(&doc.description));
        tracing::info!(documents = docs.len(), start, biwords = index.len(), "built biword index");
        index
    }

    fn build_with<F>(docs: &[Document], start: DocId, opts: BuildOptions, extract: F) -> Self
    where
        F: Fn(&Document) -> Vec<String> + Sync,
    {
        let distinct = |doc: &Document| {
            let mut terms = extract(doc);
            terms.sort_unstable();
            terms.dedup();
            terms
        };
        let per_doc: Vec<Vec<String>> = if opts.parallel {
            docs.par_iter().map(distinct).collect()
        } else {
            docs.iter().map(distinct).collect()
        };

        // documents arrive in id order, so every merge is a pure append
        let mut acc: HashMap<String, PostingsList> = HashMap::new();
        for (offset, terms) in per_doc.into_iter().enumerate() {
            let doc_id = start + offset as DocId;
            for term in terms {
                let single = PostingsList::from_single(doc_id);
                match acc.get_mut(&term) {
                    Some(plist) => plist.merge(&single),
                    None => { acc.insert(term, single); }
                }
            }
            if opts.progress_every > 0 && (offset + 1) % opts.progress_every == 0 {
                tracing::debug!(indexed = offset + 1, total = docs.len(), "build progress");
            }
        }
        Self { terms: acc.into_iter().collect() }
    }

    pub fn get(&self, term: &str) -> Option<&PostingsList> {
        self.terms.get(term)
    }

    pub fn contains_term(&self, term: &str) -> bool {
        self.terms.contains_key(term)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn postings_count(&self) -> usize {
        self.terms.values().map(PostingsList::len).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PostingsList)> {
        self.terms.iter().map(|(t, p)| (t.as_str(), p))
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.terms.keys().map(String::as_str)
    }

    /// Folds a later segment into this one. Every id in `other` must be
    /// >= every id already here.
    pub fn merge(&mut self, other: InvertedIndex) {
        for (term, plist) in other.terms {
            match self.terms.entry(term) {
                Entry::Occupied(mut e) => e.get_mut().merge(&plist),
                Entry::Vacant(e) => { e.insert(plist); }
            }
        }
    }

    /// Drops deleted or out-of-range postings and any term left empty.
    pub fn remove_deleted_docs(&mut self, deletions: &InvalidationVector) {
        let before = self.len();
        self.terms.retain(|_, plist| {
            plist.retain_live(deletions);
            !plist.is_empty()
        });
        tracing::debug!(before, after = self.len(), "removed deleted postings");
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}
