//! Boundary to the real, non-transactional index engine.
//!
//! The transaction overlay only ever talks to an engine through these traits:
//! read channels answer lookups against the last committed state, write
//! channels buffer changes until `commit()`. Neither offers multi-operation
//! atomicity across commits, which is what the overlay fabricates on top.

pub mod error;
pub mod memory;
pub mod tantivy;

pub use error::{EngineError, EngineResult};
pub use memory::{MemoryEngine, MemoryReader, MemoryWriter};
pub use self::tantivy::{TantivyEngine, TantivyReader, TantivyWriter};

use crate::types::{Analyzer, Document, DocumentId, Term};
use serde::{Deserialize, Serialize};

/// A shared handle on an index engine.
///
/// One engine value is shared by every transaction touching the index, so
/// implementations must be usable from several threads at once. Read channel
/// concurrency and write serialization are the engine's own responsibility.
pub trait IndexEngine: Send + Sync {
    type Reader: EngineReader;
    type Writer: EngineWriter;

    /// Open a read channel on the last committed state. Dropping it closes it.
    fn open_reader(&self) -> EngineResult<Self::Reader>;

    /// Open a write channel. Fails while another write channel is open.
    fn open_writer(&self) -> EngineResult<Self::Writer>;

    /// Change an engine-global setting for write channels opened afterwards.
    fn tune(&self, setting: TuningSetting) -> EngineResult<()>;

    /// Name of the field carrying document identities
    fn id_field(&self) -> &str;

    /// Refuse every channel from now on
    fn close(&self);

    fn is_closed(&self) -> bool;

    /// Term selecting a document by identity on this engine's identity field
    fn id_term(&self, id: &DocumentId) -> Term {
        Term::new(self.id_field(), id.as_str())
    }
}

/// Read channel on a committed snapshot of the index.
pub trait EngineReader {
    /// Number of live documents
    fn num_docs(&self) -> EngineResult<usize>;

    /// First live document carrying this identity
    fn document(&self, id: &DocumentId) -> EngineResult<Option<Document>>;

    /// True when no live document carries this identity
    fn is_deleted(&self, id: &DocumentId) -> EngineResult<bool> {
        Ok(self.document(id)?.is_none())
    }

    /// Resolve a term to the live documents it matches, in index order.
    fn search(&self, term: &Term) -> EngineResult<Vec<Document>>;
}

/// Write channel. Nothing written becomes visible before `commit()`.
pub trait EngineWriter {
    /// Buffer an insertion. `None` indexes each field with its own tokenizer.
    fn insert(&mut self, document: &Document, analyzer: Option<&Analyzer>) -> EngineResult<()>;

    /// Remove every document carrying this identity; returns how many matched
    /// at the last commit.
    fn remove_by_id(&mut self, id: &DocumentId) -> EngineResult<usize>;

    /// Remove every document matching the term; returns how many matched at
    /// the last commit.
    fn remove_by_term(&mut self, term: &Term) -> EngineResult<usize>;

    fn commit(&mut self) -> EngineResult<()>;

    /// Discard everything written since the last commit on this channel
    fn rollback(&mut self) -> EngineResult<()>;
}

/// Engine-global tuning knobs.
///
/// These affect every writer of the index, which is why they cannot be
/// deferred into a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningSetting {
    /// Overall indexing memory budget of a writer, in bytes
    MemoryBudget(usize),
    /// Number of indexing threads of a writer
    WriterThreads(usize),
    /// Minimum number of segments merged together
    MergeFactor(usize),
    /// Segments holding more documents than this are never merged
    MaxMergeDocs(usize),
    /// Disable background merges
    NoMerge,
}

/// Writer settings an engine applies when opening a write channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterTuning {
    pub memory_budget: usize,
    pub threads: usize,
    pub merge_factor: Option<usize>,
    pub max_merge_docs: Option<usize>,
    pub merges_enabled: bool,
}

/// Tantivy rejects budgets below this per indexing thread
pub const MIN_MEMORY_BUDGET_PER_THREAD: usize = 15_000_000;

impl Default for WriterTuning {
    fn default() -> Self {
        Self {
            memory_budget: 50_000_000,
            threads: 1,
            merge_factor: None,
            max_merge_docs: None,
            merges_enabled: true,
        }
    }
}

impl WriterTuning {
    /// Validate and fold a setting into this tuning
    pub fn apply(&mut self, setting: TuningSetting) -> EngineResult<()> {
        match setting {
            TuningSetting::MemoryBudget(bytes) => {
                if bytes < MIN_MEMORY_BUDGET_PER_THREAD * self.threads {
                    return Err(EngineError::InvalidFieldValue {
                        field: "memory_budget".to_string(),
                        reason: format!(
                            "{bytes} bytes is below {MIN_MEMORY_BUDGET_PER_THREAD} per thread for {} threads",
                            self.threads
                        ),
                    });
                }
                self.memory_budget = bytes;
            }
            TuningSetting::WriterThreads(threads) => {
                if threads == 0 || self.memory_budget < MIN_MEMORY_BUDGET_PER_THREAD * threads {
                    return Err(EngineError::InvalidFieldValue {
                        field: "threads".to_string(),
                        reason: format!(
                            "{threads} threads do not fit a budget of {} bytes",
                            self.memory_budget
                        ),
                    });
                }
                self.threads = threads;
            }
            TuningSetting::MergeFactor(factor) => {
                if factor < 2 {
                    return Err(EngineError::InvalidFieldValue {
                        field: "merge_factor".to_string(),
                        reason: "at least two segments are needed for a merge".to_string(),
                    });
                }
                self.merge_factor = Some(factor);
                self.merges_enabled = true;
            }
            TuningSetting::MaxMergeDocs(docs) => {
                self.max_merge_docs = Some(docs);
                self.merges_enabled = true;
            }
            TuningSetting::NoMerge => self.merges_enabled = false,
        }
        Ok(())
    }
}
