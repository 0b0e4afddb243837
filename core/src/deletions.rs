use serde::{Deserialize, Serialize};

use crate::DocId;

/// Soft-delete bitmap indexed by document id. Entries only go false -> true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationVector {
    deleted: Vec<bool>,
}

impl InvalidationVector {
    pub fn with_live(len: usize) -> Self {
        Self { deleted: vec![false; len] }
    }

    /// Total ids ever assigned, live or deleted.
    pub fn len(&self) -> usize {
        self.deleted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty()
    }

    pub fn extend_live(&mut self, count: usize) {
        self.deleted.resize(self.deleted.len() + count, false);
    }

    /// Returns true when the id was live and is now deleted. Ids past the end are ignored.
    pub fn mark(&mut self, doc_id: DocId) -> bool {
        match self.deleted.get_mut(doc_id as usize) {
            Some(slot) if !*slot => {
                *slot = true;
                true
            }
            _ => false,
        }
    }

    pub fn is_deleted(&self, doc_id: DocId) -> bool {
        self.deleted.get(doc_id as usize).copied().unwrap_or(false)
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.iter().filter(|&&d| d).count()
    }

    pub fn deleted_ids(&self) -> impl Iterator<Item = DocId> + '_ {
        self.deleted
            .iter()
            .enumerate()
            .filter(|(_, &d)| d)
            .map(|(id, _)| id as DocId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_is_monotonic_and_ignores_out_of_range() {
        let mut v = InvalidationVector::with_live(3);
        assert!(v.mark(1));
        assert!(!v.mark(1));
        assert!(!v.mark(10));
        assert_eq!(v.len(), 3);
        assert!(v.is_deleted(1));
        assert!(!v.is_deleted(10));
        v.extend_live(2);
        assert_eq!(v.len(), 5);
        assert_eq!(v.deleted_ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(v.deleted_count(), 1);
    }
}
