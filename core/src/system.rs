use crate::config::IrConfig;
use crate::corpus::{Corpus, Document};
use crate::deletions::InvalidationVector;
use crate::error::{IrError, Result};
use crate::index::{BuildOptions, DocId, InvertedIndex};
use crate::persist::{self, IndexPaths};
use crate::postings::PostingsList;
use crate::query::{self, SegmentView};
use crate::tokenizer::Tokenizer;
use std::ops::RangeInclusive;

/// A term index paired with the biword index over the same documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segment {
    pub terms: InvertedIndex,
    pub biwords: InvertedIndex,
}

impl Segment {
    fn build(docs: &[Document], start: DocId, tokenizer: &Tokenizer, opts: BuildOptions) -> Self {
        Self {
            terms: InvertedIndex::build_from_corpus(docs, start, tokenizer, opts),
            biwords: InvertedIndex::build_biword_from_corpus(docs, start, tokenizer, opts),
        }
    }

    fn merge(&mut self, later: Segment) {
        self.terms.merge(later.terms);
        self.biwords.merge(later.biwords);
    }

    fn remove_deleted_docs(&mut self, deletions: &InvalidationVector) {
        self.terms.remove_deleted_docs(deletions);
        self.biwords.remove_deleted_docs(deletions);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemState {
    Empty,
    PrimaryOnly,
    PrimaryWithAuxiliary,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemStats {
    pub documents: usize,
    pub live_documents: usize,
    pub pending_deletions: usize,
    pub primary_terms: usize,
    pub primary_biwords: usize,
    pub auxiliary_terms: usize,
    pub auxiliary_biwords: usize,
}

/// Incremental index manager: primary segment, optional auxiliary segment,
/// corpus and soft-delete vector. Callers serialize all access.
pub struct IrSystem {
    config: IrConfig,
    tokenizer: Tokenizer,
    corpus: Corpus,
    primary: Segment,
    auxiliary: Option<Segment>,
    deletions: InvalidationVector,
}

impl IrSystem {
    pub fn new(config: IrConfig) -> Self {
        let tokenizer = Tokenizer::with_cache_capacity(config.stem_cache_capacity);
        Self {
            config,
            tokenizer,
            corpus: Corpus::new(),
            primary: Segment::default(),
            auxiliary: None,
            deletions: InvalidationVector::default(),
        }
    }

    /// Builds the primary segment from scratch.
    pub fn from_corpus(docs: Vec<Document>, config: IrConfig) -> Self {
        let mut system = Self::new(config);
        system.primary = Segment::build(&docs, 0, &system.tokenizer, system.build_options());
        system.deletions = InvalidationVector::with_live(docs.len());
        system.corpus = Corpus::from(docs);
        tracing::info!(documents = system.corpus.len(), terms = system.primary.terms.len(), "index system created");
        system
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions { parallel: self.config.parallel_build, progress_every: self.config.progress_every }
    }

    pub fn config(&self) -> &IrConfig {
        &self.config
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn primary(&self) -> &Segment {
        &self.primary
    }

    pub fn auxiliary(&self) -> Option<&Segment> {
        self.auxiliary.as_ref()
    }

    pub fn deletions(&self) -> &InvalidationVector {
        &self.deletions
    }

    pub fn state(&self) -> SystemState {
        match (&self.auxiliary, self.corpus.is_empty()) {
            (Some(_), _) => SystemState::PrimaryWithAuxiliary,
            (None, true) => SystemState::Empty,
            (None, false) => SystemState::PrimaryOnly,
        }
    }

    /// Every id ever assigned, live or deleted.
    pub fn universe_size(&self) -> usize {
        self.deletions.len()
    }

    /// Documents neither soft-deleted nor compacted away.
    pub fn live_len(&self) -> usize {
        self.universe_size() - self.deletions.deleted_count()
    }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> {
        if self.deletions.is_deleted(doc_id) {
            return None;
        }
        self.corpus.get(doc_id)
    }

    pub fn stats(&self) -> SystemStats {
        let (auxiliary_terms, auxiliary_biwords) = self
            .auxiliary
            .as_ref()
            .map_or((0, 0), |aux| (aux.terms.len(), aux.biwords.len()));
        SystemStats {
            documents: self.corpus.len(),
            live_documents: self.live_len(),
            pending_deletions: self.deletions.deleted_ids().filter(|&id| self.corpus.get(id).is_some_and(|d| !d.is_tombstone())).count(),
            primary_terms: self.primary.terms.len(),
            primary_biwords: self.primary.biwords.len(),
            auxiliary_terms,
            auxiliary_biwords,
        }
    }

    /// Indexes `docs` into the auxiliary segment with ids continuing after
    /// the corpus; compacts once the auxiliary term count passes the limit.
    /// Returns the ids assigned.
    pub fn add_documents(&mut self, docs: Vec<Document>) -> std::ops::Range<DocId> {
        let start = self.deletions.len() as DocId;
        let end = start + docs.len() as DocId;
        if docs.is_empty() {
            return start..end;
        }
        let fresh = Segment::build(&docs, start, &self.tokenizer, self.build_options());
        match self.auxiliary.as_mut() {
            Some(aux) => aux.merge(fresh),
            None => self.auxiliary = Some(fresh),
        }
        self.deletions.extend_live(docs.len());
        self.corpus.extend(docs);
        tracing::info!(start, end, "documents added to auxiliary segment");

        let aux_terms = self.auxiliary.as_ref().map_or(0, |aux| aux.terms.len());
        if aux_terms > self.config.max_aux_terms {
            tracing::info!(aux_terms, limit = self.config.max_aux_terms, "auxiliary segment over limit");
            self.compact();
        }
        start..end
    }

    /// Soft-deletes `ids`; out-of-range ids are ignored. Returns how many
    /// were newly marked.
    pub fn delete_documents(&mut self, ids: &[DocId]) -> usize {
        let marked = ids.iter().filter(|&&id| self.deletions.mark(id)).count();
        tracing::info!(requested = ids.len(), marked, "documents marked deleted");
        marked
    }

    /// Marks every assigned id inside `ranges` deleted. Ranges are clamped to
    /// the ids handed out so far, so `0-4294967295` costs one pass over the
    /// universe.
    pub fn delete_ranges(&mut self, ranges: &[RangeInclusive<DocId>]) -> usize {
        let Some(last) = self.universe_size().checked_sub(1) else {
            return 0;
        };
        let last = DocId::try_from(last).unwrap_or(DocId::MAX);
        let mut marked = 0;
        for range in ranges {
            let hi = (*range.end()).min(last);
            marked += (*range.start()..=hi).filter(|&id| self.deletions.mark(id)).count();
        }
        tracing::info!(ranges = ranges.len(), marked, "document ranges marked deleted");
        marked
    }

    /// Folds the auxiliary segment into the primary one, purges deleted
    /// postings from both indexes and tombstones deleted corpus entries.
    pub fn compact(&mut self) {
        if let Some(aux) = self.auxiliary.take() {
            self.primary.merge(aux);
        }
        self.primary.remove_deleted_docs(&self.deletions);
        let mut scrubbed = 0usize;
        for doc_id in self.deletions.deleted_ids() {
            if self.corpus.get(doc_id).is_some_and(|d| !d.is_tombstone()) {
                self.corpus.tombstone(doc_id);
                scrubbed += 1;
            }
        }
        tracing::info!(
            terms = self.primary.terms.len(),
            biwords = self.primary.biwords.len(),
            scrubbed,
            "compaction finished"
        );
    }

    fn term_view(&self) -> SegmentView<'_> {
        SegmentView::new(&self.primary.terms, self.auxiliary.as_ref().map(|a| &a.terms))
    }

    fn biword_view(&self) -> SegmentView<'_> {
        SegmentView::new(&self.primary.biwords, self.auxiliary.as_ref().map(|a| &a.biwords))
    }

    /// Ids matching a boolean expression, deleted ids removed.
    pub fn query_ids(&self, expression: &str) -> Result<PostingsList> {
        let hits = query::boolean_query(expression, &self.tokenizer, self.term_view(), self.universe_size())?;
        Ok(hits.without_deleted(&self.deletions))
    }

    pub fn query(&self, expression: &str) -> Result<Vec<&Document>> {
        Ok(self.query_ids(expression)?.get_from_corpus(&self.corpus))
    }

    /// Ids of documents containing `phrase` verbatim (after normalization).
    pub fn phrase_ids(&self, phrase: &str) -> PostingsList {
        query::phrase_query(phrase, &self.tokenizer, self.biword_view()).without_deleted(&self.deletions)
    }

    pub fn phrase_query(&self, phrase: &str) -> Vec<&Document> {
        self.phrase_ids(phrase).get_from_corpus(&self.corpus)
    }

    /// Routes a quoted input to the phrase path and anything else to the
    /// boolean path.
    pub fn search_ids(&self, input: &str) -> Result<PostingsList> {
        let input = input.trim();
        match input.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')) {
            Some(phrase) => Ok(self.phrase_ids(phrase)),
            None => self.query_ids(input),
        }
    }

    pub fn search(&self, input: &str) -> Result<Vec<(DocId, &Document)>> {
        let ids = self.search_ids(input)?;
        Ok(ids.iter().filter_map(|id| self.corpus.get(id).map(|d| (id, d))).collect())
    }

    pub fn count(&self, input: &str) -> Result<usize> {
        Ok(self.search_ids(input)?.len())
    }

    /// Compacts, then writes the primary segment, corpus and deletions.
    pub fn save(&mut self, paths: &IndexPaths) -> Result<()> {
        self.compact();
        persist::save_system(paths, &self.primary.terms, &self.primary.biwords, &self.corpus, &self.deletions)?;
        tracing::info!(root = ?paths.root, documents = self.corpus.len(), "index saved");
        Ok(())
    }

    pub fn load(paths: &IndexPaths, config: IrConfig) -> Result<Self> {
        let stored = persist::load_system(paths)?;
        let mut system = Self::new(config);
        if stored.deletions.len() != stored.corpus.len() {
            return Err(IrError::Corrupt(format!(
                "deletion vector covers {} ids but corpus has {}",
                stored.deletions.len(),
                stored.corpus.len()
            )));
        }
        system.primary = Segment { terms: stored.terms, biwords: stored.biwords };
        system.corpus = stored.corpus;
        system.deletions = stored.deletions;
        tracing::info!(root = ?paths.root, documents = system.corpus.len(), "index loaded");
        Ok(system)
    }
}

/// Parses "1,3-5, 9" into inclusive ranges. Ranges are not expanded.
pub fn parse_id_ranges(input: &str) -> Result<Vec<RangeInclusive<DocId>>> {
    let mut ranges = Vec::new();
    for part in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let bad = || IrError::InvalidIdList(part.to_string());
        match part.split_once('-') {
            Some((lo, hi)) => {
                let lo: DocId = lo.trim().parse().map_err(|_| bad())?;
                let hi: DocId = hi.trim().parse().map_err(|_| bad())?;
                if lo > hi {
                    return Err(bad());
                }
                ranges.push(lo..=hi);
            }
            None => {
                let id: DocId = part.parse().map_err(|_| bad())?;
                ranges.push(id..=id);
            }
        }
    }
    Ok(ranges)
}
