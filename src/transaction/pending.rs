//! Per-transaction log of staged operations.

use super::operation::{Operation, OperationKind};
use crate::types::DocumentId;
use std::collections::HashSet;

/// Ordered record of staged operations plus an index of the documents the
/// staged deletes name.
///
/// `deleted` is always exactly the union of the identities named by the
/// delete operations currently in `operations`.
#[derive(Debug, Default)]
pub struct PendingOperationLog {
    operations: Vec<Operation>,
    deleted: HashSet<DocumentId>,
}

impl PendingOperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, operation: Operation) {
        if let Operation::Delete(delete) = &operation {
            self.deleted.extend(delete.ids().cloned());
        }
        self.operations.push(operation);
    }

    /// Whether a staged delete names this document
    pub fn is_deleted(&self, id: &DocumentId) -> bool {
        self.deleted.contains(id)
    }

    pub fn count_by_kind(&self, kind: OperationKind) -> usize {
        self.operations.iter().filter(|op| op.kind() == kind).count()
    }

    /// Number of documents named by staged operations of one kind
    pub fn document_count_by_kind(&self, kind: OperationKind) -> usize {
        self.operations
            .iter()
            .filter(|op| op.kind() == kind)
            .map(|op| op.documents().len())
            .sum()
    }

    /// Staged operations of one kind, in staging order
    pub fn operations_of(&self, kind: OperationKind) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.kind() == kind)
            .collect()
    }

    /// Every staged operation, in staging order
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn clear(&mut self) {
        self.operations.clear();
        self.deleted.clear();
    }

    /// Drop every staged delete, keeping adds. Returns how many were dropped.
    pub fn remove_all_deletes(&mut self) -> usize {
        let before = self.operations.len();
        self.operations
            .retain(|op| op.kind() != OperationKind::Delete);
        self.deleted.clear();
        before - self.operations.len()
    }
}
