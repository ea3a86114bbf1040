//! Per-transaction record of compensating operations.

use super::operation::{Operation, OperationKind};

/// Inverses of the staged operations, recorded as they are staged.
///
/// Entry `i` undoes operation `i` of the paired [`PendingOperationLog`], so
/// both always have the same length until a commit starts consuming them.
///
/// [`PendingOperationLog`]: super::PendingOperationLog
#[derive(Debug, Default)]
pub struct RollbackSegment {
    compensations: Vec<Operation>,
}

impl RollbackSegment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the inverse of a forward operation that was just staged
    pub fn record_compensation(&mut self, forward: &Operation) {
        self.compensations.push(forward.inverse());
    }

    pub fn compensations(&self) -> &[Operation] {
        &self.compensations
    }

    pub fn len(&self) -> usize {
        self.compensations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.compensations.is_empty()
    }

    /// Drop the compensations of every forward operation of `kind`
    pub(crate) fn discard_compensations_of(&mut self, kind: OperationKind) {
        let inverse = kind.inverse();
        self.compensations.retain(|op| op.kind() != inverse);
    }

    pub(crate) fn clear(&mut self) {
        self.compensations.clear();
    }
}
