//! Cache-based transaction strategy.
//!
//! `begin` hands out an [`IndexHolder`] owning a fresh pending log and
//! rollback segment; nothing touches the engine's write path until `commit`
//! runs the [`TransactionProcessor`]. `rollback` only discards the log.

use super::pending::PendingOperationLog;
use super::processor::{CommitReport, TransactionProcessor};
use super::reader::TransactionalReader;
use super::rollback::RollbackSegment;
use super::writer::TransactionalWriter;
use crate::config::TransactionConfig;
use crate::engine::{EngineError, IndexEngine};
use crate::error::{TxError, TxResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Isolation a transaction asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    #[default]
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// Levels served by staging changes until commit
    pub fn is_cached(self) -> bool {
        matches!(
            self,
            IsolationLevel::ReadCommitted | IsolationLevel::RepeatableRead
        )
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::ReadUncommitted => "read_uncommitted",
            IsolationLevel::ReadCommitted => "read_committed",
            IsolationLevel::RepeatableRead => "repeatable_read",
            IsolationLevel::Serializable => "serializable",
        };
        f.write_str(name)
    }
}

/// What a caller asks for when beginning a transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionDefinition {
    pub name: Option<String>,
    /// `None` uses the strategy's configured default
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
}

impl TransactionDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_isolation(mut self, isolation: IsolationLevel) -> Self {
        self.isolation = Some(isolation);
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

/// Everything one transaction owns. Released by commit or rollback.
pub struct IndexHolder<E: IndexEngine> {
    id: u64,
    definition: TransactionDefinition,
    isolation: IsolationLevel,
    engine: Arc<E>,
    pending: PendingOperationLog,
    rollback: RollbackSegment,
    rollback_only: bool,
    /// Open write transactions of the issuing strategy; `None` when read-only
    open_writes: Option<Arc<AtomicUsize>>,
}

impl<E: IndexEngine> IndexHolder<E> {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn definition(&self) -> &TransactionDefinition {
        &self.definition
    }

    /// Isolation in force, after applying the strategy default
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn is_read_only(&self) -> bool {
        self.definition.read_only
    }

    pub fn reader(&mut self) -> TransactionalReader<'_, E> {
        TransactionalReader::new(
            &self.engine,
            &mut self.pending,
            &mut self.rollback,
            self.definition.read_only,
        )
    }

    /// Write view; read-only transactions have none
    pub fn writer(&mut self) -> TxResult<TransactionalWriter<'_>> {
        if self.definition.read_only {
            return Err(TxError::unsupported("writer"));
        }
        Ok(TransactionalWriter::new(&mut self.pending, &mut self.rollback))
    }

    /// Make the eventual commit discard everything instead of applying it
    pub fn set_rollback_only(&mut self) {
        debug!(transaction = self.id, "Marked rollback-only");
        self.rollback_only = true;
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    pub fn pending(&self) -> &PendingOperationLog {
        &self.pending
    }

    pub fn rollback_segment(&self) -> &RollbackSegment {
        &self.rollback
    }
}

impl<E: IndexEngine> Drop for IndexHolder<E> {
    fn drop(&mut self) {
        if let Some(open_writes) = &self.open_writes {
            open_writes.fetch_sub(1, Ordering::AcqRel);
        }
        if !self.pending.is_empty() {
            warn!(
                transaction = self.id,
                staged = self.pending.len(),
                "Transaction dropped without commit or rollback, staged operations are discarded"
            );
        }
    }
}

/// Staging strategy for isolation levels that need repeatable reads.
pub struct CacheTransactionStrategy<E: IndexEngine> {
    engine: Arc<E>,
    processor: TransactionProcessor,
    default_isolation: IsolationLevel,
    next_id: AtomicU64,
    open_writes: Arc<AtomicUsize>,
}

impl<E: IndexEngine> CacheTransactionStrategy<E> {
    pub fn new(engine: Arc<E>, config: &TransactionConfig) -> Self {
        let processor = TransactionProcessor::new(
            config.apply_mode,
            config.delete_resolution,
            config.default_analyzer(),
        );
        Self::with_processor(engine, processor, config.default_isolation)
    }

    pub fn with_processor(
        engine: Arc<E>,
        processor: TransactionProcessor,
        default_isolation: IsolationLevel,
    ) -> Self {
        Self {
            engine,
            processor,
            default_isolation,
            next_id: AtomicU64::new(1),
            open_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn processor(&self) -> &TransactionProcessor {
        &self.processor
    }

    /// Write-capable holders issued here and not yet released
    pub fn open_write_transactions(&self) -> usize {
        self.open_writes.load(Ordering::Acquire)
    }

    pub fn begin(&self, definition: TransactionDefinition) -> TxResult<IndexHolder<E>> {
        let isolation = definition.isolation.unwrap_or(self.default_isolation);
        if !isolation.is_cached() {
            return Err(TxError::Config {
                reason: format!("isolation level {isolation} is not served by the cache strategy"),
            });
        }
        if self.engine.is_closed() {
            return Err(TxError::read_channel(EngineError::Closed));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let open_writes = (!definition.read_only).then(|| {
            self.open_writes.fetch_add(1, Ordering::AcqRel);
            Arc::clone(&self.open_writes)
        });
        info!(
            transaction = id,
            name = definition.name.as_deref().unwrap_or(""),
            %isolation,
            read_only = definition.read_only,
            "Transaction started"
        );

        Ok(IndexHolder {
            id,
            definition,
            isolation,
            engine: Arc::clone(&self.engine),
            pending: PendingOperationLog::new(),
            rollback: RollbackSegment::new(),
            rollback_only: false,
            open_writes,
        })
    }

    /// Apply the holder's log, or discard it when marked rollback-only.
    /// The holder is released either way.
    pub fn commit(&self, mut holder: IndexHolder<E>) -> TxResult<CommitReport> {
        if holder.rollback_only {
            info!(
                transaction = holder.id,
                discarded = holder.pending.len(),
                "Rollback-only transaction discarded at commit"
            );
            release(&mut holder);
            return Ok(CommitReport::rolled_back(self.processor.mode()));
        }

        let result = self
            .processor
            .apply(self.engine.as_ref(), &holder.pending, &holder.rollback);
        match &result {
            Ok(report) => info!(
                transaction = holder.id,
                applied = report.applied,
                "Transaction committed"
            ),
            Err(e) => warn!(
                transaction = holder.id,
                error = %e,
                fatal = e.is_fatal(),
                "Transaction commit failed"
            ),
        }
        release(&mut holder);
        result
    }

    /// Discard the holder's log. The engine was never touched.
    pub fn rollback(&self, mut holder: IndexHolder<E>) -> TxResult<()> {
        info!(
            transaction = holder.id,
            discarded = holder.pending.len(),
            "Transaction rolled back"
        );
        release(&mut holder);
        Ok(())
    }
}

fn release<E: IndexEngine>(holder: &mut IndexHolder<E>) {
    holder.pending.clear();
    holder.rollback.clear();
}
