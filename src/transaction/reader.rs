//! Read view of a transaction.
//!
//! Lookups go to the last committed state of the real engine, filtered
//! through the pending log. Staged adds are write-only until commit:
//! `get_document` never returns them, although `num_docs` counts them.

use super::operation::{Operation, OperationKind};
use super::pending::PendingOperationLog;
use super::rollback::RollbackSegment;
use super::stage;
use crate::engine::{EngineError, EngineReader, IndexEngine};
use crate::error::{TxError, TxResult};
use crate::types::{Document, DocumentId, Term};
use tracing::debug;

pub struct TransactionalReader<'tx, E: IndexEngine> {
    engine: &'tx E,
    pending: &'tx mut PendingOperationLog,
    rollback: &'tx mut RollbackSegment,
    read_only: bool,
}

impl<'tx, E: IndexEngine> TransactionalReader<'tx, E> {
    pub(crate) fn new(
        engine: &'tx E,
        pending: &'tx mut PendingOperationLog,
        rollback: &'tx mut RollbackSegment,
        read_only: bool,
    ) -> Self {
        Self {
            engine,
            pending,
            rollback,
            read_only,
        }
    }

    fn channel(&self) -> TxResult<E::Reader> {
        self.engine.open_reader().map_err(TxError::read_channel)
    }

    fn ensure_writable(&self, operation: &str) -> TxResult<()> {
        if self.read_only {
            Err(TxError::unsupported(operation))
        } else {
            Ok(())
        }
    }

    /// Committed document with this identity, unless a staged delete masks it
    pub fn get_document(&self, id: &DocumentId) -> TxResult<Option<Document>> {
        let document = self
            .channel()?
            .document(id)
            .map_err(TxError::read_channel)?;
        Ok(document.filter(|d| !self.pending.is_deleted(&d.id)))
    }

    /// Stage the deletion of every committed document `term` matches now.
    ///
    /// Returns how many committed documents `term` matched, including ones
    /// an earlier staged delete already masks. Only the documents not yet
    /// masked go into the snapshot, so an undo re-adds each document once.
    pub fn delete_documents(&mut self, term: &Term) -> TxResult<usize> {
        self.ensure_writable("delete_documents")?;

        let mut resolved = self.channel()?.search(term).map_err(|e| match e {
            EngineError::UnknownField(_) => TxError::staging(e.to_string()),
            other => TxError::read_channel(other),
        })?;
        let matched = resolved.len();
        resolved.retain(|d| !self.pending.is_deleted(&d.id));

        let operation = Operation::delete_term(term.clone(), resolved)?;
        debug!(%operation, "Staged delete");
        stage(self.pending, self.rollback, operation);
        Ok(matched)
    }

    /// Stage the deletion of one committed document. Returns false, staging
    /// nothing, when no such document is visible in this transaction.
    pub fn delete_document(&mut self, id: &DocumentId) -> TxResult<bool> {
        self.ensure_writable("delete_document")?;

        let Some(document) = self.get_document(id)? else {
            return Ok(false);
        };
        let operation = Operation::delete_documents(vec![document])?;
        debug!(%operation, "Staged delete");
        stage(self.pending, self.rollback, operation);
        Ok(true)
    }

    pub fn is_deleted(&self, id: &DocumentId) -> bool {
        self.pending.is_deleted(id)
    }

    /// Logical count: committed documents plus staged add operations minus
    /// staged delete operations. Each operation counts once, whatever the
    /// number of documents it carries.
    pub fn num_docs(&self) -> TxResult<usize> {
        let committed = self.channel()?.num_docs().map_err(TxError::read_channel)?;
        let added = self.pending.count_by_kind(OperationKind::Add);
        let deleted = self.pending.count_by_kind(OperationKind::Delete);
        Ok((committed + added).saturating_sub(deleted))
    }

    pub fn has_deletions(&self) -> bool {
        self.pending.count_by_kind(OperationKind::Delete) > 0
    }

    /// Drop every staged delete of this transaction together with its
    /// compensation. Returns how many deletes were dropped.
    pub fn undelete_all(&mut self) -> TxResult<usize> {
        self.ensure_writable("undelete_all")?;
        self.rollback.discard_compensations_of(OperationKind::Delete);
        let removed = self.pending.remove_all_deletes();
        debug!(removed, "Dropped staged deletes");
        Ok(removed)
    }
}
