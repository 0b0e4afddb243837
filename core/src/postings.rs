use serde::{Deserialize, Serialize};

use crate::corpus::{Corpus, Document};
use crate::deletions::InvalidationVector;
use crate::DocId;

/// Strictly increasing, duplicate-free list of document ids.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostingsList {
    doc_ids: Vec<DocId>,
}

impl PostingsList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_single(doc_id: DocId) -> Self {
        Self { doc_ids: vec![doc_id] }
    }

    /// Sorts and de-duplicates arbitrary input.
    pub fn from_unsorted(mut doc_ids: Vec<DocId>) -> Self {
        doc_ids.sort_unstable();
        doc_ids.dedup();
        Self { doc_ids }
    }

    fn from_sorted(doc_ids: Vec<DocId>) -> Self {
        debug_assert!(doc_ids.windows(2).all(|w| w[0] < w[1]));
        Self { doc_ids }
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    pub fn last(&self) -> Option<DocId> {
        self.doc_ids.last().copied()
    }

    pub fn first(&self) -> Option<DocId> {
        self.doc_ids.first().copied()
    }

    pub fn contains(&self, doc_id: DocId) -> bool {
        self.doc_ids.binary_search(&doc_id).is_ok()
    }

    pub fn as_slice(&self) -> &[DocId] {
        &self.doc_ids
    }

    pub fn iter(&self) -> impl Iterator<Item = DocId> + '_ {
        self.doc_ids.iter().copied()
    }

    /// Appends `other`, whose ids must all be >= the current maximum.
    ///
    /// Only a run equal to the current last id is skipped, so the cost is
    /// O(|other|). Interleaved ranges are a caller bug and panic.
    pub fn merge(&mut self, other: &PostingsList) {
        let Some(last) = self.last() else {
            self.doc_ids.extend_from_slice(&other.doc_ids);
            return;
        };
        if let Some(first) = other.first() {
            assert!(
                first >= last,
                "postings merge out of order: appending id {first} after id {last}"
            );
        }
        let skip = other.doc_ids.iter().take_while(|&&id| id == last).count();
        self.doc_ids.extend_from_slice(&other.doc_ids[skip..]);
    }

    pub fn intersection(&self, other: &PostingsList) -> PostingsList {
        let (a, b) = (&self.doc_ids, &other.doc_ids);
        let mut out = Vec::with_capacity(a.len().min(b.len()));
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        PostingsList::from_sorted(out)
    }

    pub fn union(&self, other: &PostingsList) -> PostingsList {
        let (a, b) = (&self.doc_ids, &other.doc_ids);
        let mut out = Vec::with_capacity(a.len() + b.len());
        let (mut i, mut j) = (0, 0);
        while i < a.len() && j < b.len() {
            match a[i].cmp(&b[j]) {
                std::cmp::Ordering::Equal => {
                    out.push(a[i]);
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => {
                    out.push(a[i]);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    out.push(b[j]);
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&a[i..]);
        out.extend_from_slice(&b[j..]);
        PostingsList::from_sorted(out)
    }

    /// Complement within `[0, universe_size)`.
    pub fn negation(&self, universe_size: usize) -> PostingsList {
        let mut out = Vec::with_capacity(universe_size.saturating_sub(self.len()));
        let mut present = self.doc_ids.iter().copied().peekable();
        for id in 0..universe_size as DocId {
            if present.peek() == Some(&id) {
                present.next();
            } else {
                out.push(id);
            }
        }
        PostingsList::from_sorted(out)
    }

    /// Drops every id the invalidation vector marks as deleted.
    pub fn without_deleted(&self, deletions: &InvalidationVector) -> PostingsList {
        PostingsList::from_sorted(
            self.doc_ids
                .iter()
                .copied()
                .filter(|&id| !deletions.is_deleted(id))
                .collect(),
        )
    }

    /// Keeps only ids inside the vector's range that are not deleted.
    pub(crate) fn retain_live(&mut self, deletions: &InvalidationVector) {
        self.doc_ids
            .retain(|&id| (id as usize) < deletions.len() && !deletions.is_deleted(id));
    }

    pub fn get_from_corpus<'c>(&self, corpus: &'c Corpus) -> Vec<&'c Document> {
        self.doc_ids.iter().filter_map(|&id| corpus.get(id)).collect()
    }
}

impl From<Vec<DocId>> for PostingsList {
    fn from(doc_ids: Vec<DocId>) -> Self {
        PostingsList::from_unsorted(doc_ids)
    }
}

impl<'a> IntoIterator for &'a PostingsList {
    type Item = &'a DocId;
    type IntoIter = std::slice::Iter<'a, DocId>;

    fn into_iter(self) -> Self::IntoIter {
        self.doc_ids.iter()
    }
}
