//! Transactional mutation overlay for full-text indexes.
//!
//! Stage document insertions and deletions against an index engine that has
//! no multi-operation atomicity, read a transaction-local view of them, and
//! either apply them all at commit or discard them.

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod transaction;
pub mod types;

// Explicit exports for better API clarity
pub use config::Settings;
pub use engine::{
    EngineError, EngineReader, EngineResult, EngineWriter, IndexEngine, MemoryEngine,
    TantivyEngine, TuningSetting,
};
pub use error::{Channel, CompensationFailure, TxError, TxResult};
pub use transaction::{
    ApplyMode, CacheTransactionStrategy, CommitReport, DeleteResolution, IndexHolder,
    IsolationLevel, Operation, OperationKind, PendingOperationLog, RollbackSegment,
    TransactionContext, TransactionDefinition, TransactionManager, TransactionProcessor,
    TransactionalReader, TransactionalWriter,
};
pub use types::{Analyzer, Document, DocumentId, Term};
