//! Commit-time replay of a pending operation log against the real engine.
//!
//! `Idle -> Applying -> Committed`, or on failure of operation `k`:
//! `Applying -> Compensating -> Compensated(failed)`, where the compensations
//! of operations `0..k` are applied newest first.

use super::operation::{DeleteOperation, Operation, OperationKind};
use super::pending::PendingOperationLog;
use super::rollback::RollbackSegment;
use crate::engine::{EngineError, EngineResult, EngineWriter, IndexEngine};
use crate::error::{CompensationFailure, TxError, TxResult};
use crate::types::Analyzer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, warn};

/// How staged operations reach the real engine at commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyMode {
    /// Commit after every operation; failures are undone by compensation
    #[default]
    PerOperation,
    /// Commit once after the last operation; failures are undone by
    /// discarding the write channel
    SingleCommit,
}

impl fmt::Display for ApplyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyMode::PerOperation => f.write_str("per_operation"),
            ApplyMode::SingleCommit => f.write_str("single_commit"),
        }
    }
}

/// What a staged delete removes when it is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteResolution {
    /// The documents resolved at staging, by identity
    #[default]
    Snapshot,
    /// Whatever the staged term matches at commit
    Term,
}

/// Outcome of a commit that left the engine consistent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    /// Operations applied to the real engine
    pub applied: usize,
    pub mode: ApplyMode,
    /// The transaction was marked rollback-only and nothing was applied
    pub rolled_back: bool,
}

impl CommitReport {
    pub(crate) fn rolled_back(mode: ApplyMode) -> Self {
        Self {
            applied: 0,
            mode,
            rolled_back: true,
        }
    }
}

/// Replays a log against the real engine. Invoked once per commit.
#[derive(Debug, Clone, Default)]
pub struct TransactionProcessor {
    mode: ApplyMode,
    resolution: DeleteResolution,
    default_analyzer: Option<Analyzer>,
}

impl TransactionProcessor {
    pub fn new(
        mode: ApplyMode,
        resolution: DeleteResolution,
        default_analyzer: Option<Analyzer>,
    ) -> Self {
        Self {
            mode,
            resolution,
            default_analyzer,
        }
    }

    pub fn mode(&self) -> ApplyMode {
        self.mode
    }

    pub fn resolution(&self) -> DeleteResolution {
        self.resolution
    }

    /// Apply every staged operation in staging order.
    ///
    /// `Ok` means all of them are durable. `ApplyOperation` means the engine
    /// was restored to its state before the commit; `Compensation` means it
    /// could not be.
    pub fn apply<E: IndexEngine>(
        &self,
        engine: &E,
        log: &PendingOperationLog,
        segment: &RollbackSegment,
    ) -> TxResult<CommitReport> {
        if log.is_empty() {
            debug!("Nothing staged, commit is a no-op");
            return Ok(CommitReport {
                applied: 0,
                mode: self.mode,
                rolled_back: false,
            });
        }

        let mut writer = engine.open_writer().map_err(TxError::write_channel)?;
        info!(
            operations = log.len(),
            mode = %self.mode,
            "Applying staged operations"
        );

        let applied = match self.mode {
            ApplyMode::PerOperation => self.apply_per_operation(&mut writer, log, segment)?,
            ApplyMode::SingleCommit => self.apply_single_commit(&mut writer, log)?,
        };

        info!(applied, "Commit applied");
        Ok(CommitReport {
            applied,
            mode: self.mode,
            rolled_back: false,
        })
    }

    fn apply_per_operation<W: EngineWriter>(
        &self,
        writer: &mut W,
        log: &PendingOperationLog,
        segment: &RollbackSegment,
    ) -> TxResult<usize> {
        for (index, operation) in log.operations().iter().enumerate() {
            debug!(index, %operation, "Applying operation");
            let result = self
                .apply_forward(writer, operation)
                .and_then(|()| writer.commit());

            if let Err(source) = result {
                warn!(
                    index,
                    kind = %operation.kind(),
                    error = %source,
                    "Operation failed, compensating applied prefix"
                );
                if let Err(e) = writer.rollback() {
                    warn!(error = %e, "Failed to discard uncommitted changes");
                }
                return Err(self.compensate(writer, segment, index, operation.kind(), source));
            }
        }
        Ok(log.len())
    }

    fn apply_single_commit<W: EngineWriter>(
        &self,
        writer: &mut W,
        log: &PendingOperationLog,
    ) -> TxResult<usize> {
        for (index, operation) in log.operations().iter().enumerate() {
            debug!(index, %operation, "Applying operation");
            if let Err(source) = self.apply_forward(writer, operation) {
                warn!(
                    index,
                    kind = %operation.kind(),
                    error = %source,
                    "Operation failed, discarding write channel"
                );
                // Nothing is durable yet; dropping the channel discards it as well
                if let Err(e) = writer.rollback() {
                    warn!(error = %e, "Failed to discard uncommitted changes");
                }
                return Err(TxError::ApplyOperation {
                    index,
                    kind: operation.kind(),
                    source,
                    compensated: index,
                });
            }
        }

        writer.commit().map_err(|source| {
            warn!(error = %source, "Final commit failed");
            TxError::write_channel(source)
        })?;
        Ok(log.len())
    }

    fn apply_forward<W: EngineWriter>(
        &self,
        writer: &mut W,
        operation: &Operation,
    ) -> EngineResult<()> {
        match operation {
            Operation::Add(add) => {
                let analyzer = add.analyzer().or(self.default_analyzer.as_ref());
                for document in add.documents() {
                    writer.insert(document, analyzer)?;
                }
                Ok(())
            }
            Operation::Delete(delete) => self.apply_delete(writer, delete),
        }
    }

    fn apply_delete<W: EngineWriter>(
        &self,
        writer: &mut W,
        delete: &DeleteOperation,
    ) -> EngineResult<()> {
        match (self.resolution, delete.term()) {
            (DeleteResolution::Term, Some(term)) => {
                let removed = writer.remove_by_term(term)?;
                debug!(%term, removed, "Removed documents by term");
            }
            _ => {
                for id in delete.ids() {
                    writer.remove_by_id(id)?;
                }
            }
        }
        Ok(())
    }

    /// Undo operations `0..failed` newest first, committing each undo.
    /// Keeps going past failed compensations and reports all of them.
    fn compensate<W: EngineWriter>(
        &self,
        writer: &mut W,
        segment: &RollbackSegment,
        failed: usize,
        kind: OperationKind,
        source: EngineError,
    ) -> TxError {
        let mut failures = Vec::new();

        let applied = &segment.compensations()[..failed.min(segment.len())];

        for (index, compensation) in applied.iter().enumerate().rev() {
            debug!(index, %compensation, "Applying compensation");
            let result = apply_compensation(writer, compensation).and_then(|()| writer.commit());
            if let Err(e) = result {
                error!(index, error = %e, "Compensation failed");
                if let Err(discard) = writer.rollback() {
                    warn!(error = %discard, "Failed to discard uncommitted changes");
                }
                failures.push(CompensationFailure {
                    index,
                    kind: compensation.kind().inverse(),
                    source: e,
                });
            }
        }

        if failures.is_empty() {
            info!(index = failed, compensated = failed, "Commit rolled back by compensation");
            TxError::ApplyOperation {
                index: failed,
                kind,
                source,
                compensated: failed,
            }
        } else {
            error!(
                index = failed,
                failures = failures.len(),
                "Compensation failed, index state is indeterminate"
            );
            TxError::Compensation {
                index: failed,
                kind,
                source,
                failures,
            }
        }
    }
}

/// Compensations restore identities exactly and re-add snapshots with the
/// schema tokenizers, independent of the delete resolution in force.
fn apply_compensation<W: EngineWriter>(
    writer: &mut W,
    compensation: &Operation,
) -> EngineResult<()> {
    match compensation {
        Operation::Add(add) => {
            for document in add.documents() {
                writer.insert(document, None)?;
            }
        }
        Operation::Delete(delete) => {
            for id in delete.ids() {
                writer.remove_by_id(id)?;
            }
        }
    }
    Ok(())
}
