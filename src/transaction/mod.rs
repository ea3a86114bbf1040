//! Transactional overlay on a non-transactional index engine.
//!
//! Mutations are staged in a per-transaction [`PendingOperationLog`] and
//! paired with their inverses in a [`RollbackSegment`]. Reads go through a
//! [`TransactionalReader`] that masks staged deletes. At commit the
//! [`TransactionProcessor`] replays the log in staging order and undoes the
//! applied prefix if a later operation fails.

pub mod context;
pub mod operation;
pub mod pending;
pub mod processor;
pub mod reader;
pub mod rollback;
pub mod strategy;
pub mod writer;

pub use context::{TransactionContext, TransactionManager};
pub use operation::{AddOperation, DeleteOperation, Operation, OperationKind};
pub use pending::PendingOperationLog;
pub use processor::{ApplyMode, CommitReport, DeleteResolution, TransactionProcessor};
pub use reader::TransactionalReader;
pub use rollback::RollbackSegment;
pub use strategy::{CacheTransactionStrategy, IndexHolder, IsolationLevel, TransactionDefinition};
pub use writer::TransactionalWriter;

/// Record a forward operation and its compensation together
fn stage(pending: &mut PendingOperationLog, rollback: &mut RollbackSegment, operation: Operation) {
    rollback.record_compensation(&operation);
    pending.append(operation);
}
