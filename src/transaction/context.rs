//! Explicit transaction binding.
//!
//! A [`TransactionContext`] is the slot one unit of work carries around; it
//! holds at most one [`IndexHolder`]. The [`TransactionManager`] binds and
//! releases holders and guards engine-global calls against bound
//! transactions.

use super::processor::CommitReport;
use super::strategy::{CacheTransactionStrategy, IndexHolder, TransactionDefinition};
use crate::config::Settings;
use crate::engine::{EngineError, IndexEngine, TantivyEngine, TuningSetting};
use crate::error::{TxError, TxResult};
use std::sync::Arc;
use tracing::debug;

pub struct TransactionContext<E: IndexEngine> {
    holder: Option<IndexHolder<E>>,
}

impl<E: IndexEngine> TransactionContext<E> {
    pub fn new() -> Self {
        Self { holder: None }
    }

    pub fn is_active(&self) -> bool {
        self.holder.is_some()
    }

    pub fn transaction_id(&self) -> Option<u64> {
        self.holder.as_ref().map(IndexHolder::id)
    }

    /// The bound holder
    pub fn holder(&mut self) -> TxResult<&mut IndexHolder<E>> {
        self.holder.as_mut().ok_or(TxError::NoTransaction)
    }

    fn bind(&mut self, holder: IndexHolder<E>) -> TxResult<u64> {
        if let Some(existing) = &self.holder {
            return Err(TxError::AlreadyBound {
                existing: existing.id(),
            });
        }
        let id = holder.id();
        self.holder = Some(holder);
        Ok(id)
    }

    fn unbind(&mut self) -> TxResult<IndexHolder<E>> {
        self.holder.take().ok_or(TxError::NoTransaction)
    }
}

impl<E: IndexEngine> Default for TransactionContext<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Front end binding cache-strategy transactions to contexts.
pub struct TransactionManager<E: IndexEngine> {
    strategy: CacheTransactionStrategy<E>,
}

impl<E: IndexEngine> TransactionManager<E> {
    pub fn new(strategy: CacheTransactionStrategy<E>) -> Self {
        Self { strategy }
    }

    pub fn strategy(&self) -> &CacheTransactionStrategy<E> {
        &self.strategy
    }

    pub fn engine(&self) -> &Arc<E> {
        self.strategy.engine()
    }

    /// Begin a transaction and bind it to `context`. Fails with
    /// `AlreadyBound` instead of nesting.
    pub fn begin(
        &self,
        context: &mut TransactionContext<E>,
        definition: TransactionDefinition,
    ) -> TxResult<u64> {
        if let Some(existing) = context.transaction_id() {
            return Err(TxError::AlreadyBound { existing });
        }
        let holder = self.strategy.begin(definition)?;
        context.bind(holder)
    }

    pub fn commit(&self, context: &mut TransactionContext<E>) -> TxResult<CommitReport> {
        let holder = context.unbind()?;
        self.strategy.commit(holder)
    }

    pub fn rollback(&self, context: &mut TransactionContext<E>) -> TxResult<()> {
        let holder = context.unbind()?;
        self.strategy.rollback(holder)
    }

    /// Change an engine-global setting. Refused while any write-capable
    /// transaction begun through this manager is still open, whichever
    /// context holds it.
    pub fn tune(&self, setting: TuningSetting) -> TxResult<()> {
        let open = self.strategy.open_write_transactions();
        if open > 0 {
            debug!(open, "Tuning refused while write transactions are open");
            return Err(TxError::unsupported(format!("tune({setting:?})")));
        }

        self.engine().tune(setting).map_err(|e| match e {
            EngineError::Closed => TxError::write_channel(e),
            other => TxError::Config {
                reason: other.to_string(),
            },
        })?;
        debug!(?setting, "Engine tuned");
        Ok(())
    }
}

impl TransactionManager<TantivyEngine> {
    /// Open the configured Tantivy index and wrap it
    pub fn open(settings: &Settings) -> TxResult<Self> {
        let engine = TantivyEngine::open(&settings.index, &settings.writer)
            .map_err(TxError::write_channel)?;
        Ok(Self::new(CacheTransactionStrategy::new(
            Arc::new(engine),
            &settings.transaction,
        )))
    }
}
