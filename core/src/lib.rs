//! Boolean and phrase search over an append-only corpus with incremental
//! insertion and soft deletion.

pub mod config;
pub mod corpus;
pub mod deletions;
pub mod error;
pub mod index;
pub mod persist;
pub mod postings;
pub mod query;
pub mod system;
pub mod tokenizer;

pub use config::IrConfig;
pub use corpus::{Corpus, Document};
pub use deletions::InvalidationVector;
pub use error::{IrError, Result};
pub use index::{BuildOptions, DocId, InvertedIndex};
pub use postings::PostingsList;
pub use system::{IrSystem, SystemState, SystemStats};
