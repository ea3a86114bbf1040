//! Error types for the transactional index overlay
//!
//! This module provides structured error types using thiserror. The commit
//! path distinguishes a failed-and-compensated commit from a failed commit
//! whose compensation also failed, so callers never confuse the two.

use crate::engine::EngineError;
use crate::transaction::OperationKind;
use thiserror::Error;

/// Which engine channel an access error concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Read,
    Write,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Read => f.write_str("read"),
            Channel::Write => f.write_str("write"),
        }
    }
}

/// A compensating operation that could not be applied
#[derive(Debug)]
pub struct CompensationFailure {
    /// Position of the forward operation the compensation undoes
    pub index: usize,
    pub kind: OperationKind,
    pub source: EngineError,
}

impl std::fmt::Display for CompensationFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "undo of {} operation #{} failed: {}",
            self.kind, self.index, self.source
        )
    }
}

fn join_failures(failures: &[CompensationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Main error type for transactional operations
#[derive(Error, Debug)]
pub enum TxError {
    /// A malformed operation was staged; nothing was recorded
    #[error("Cannot stage operation: {reason}")]
    Staging { reason: String },

    /// The real engine's channel could not be opened or used
    #[error("Engine {channel} channel unavailable: {source}")]
    ResourceAccess {
        channel: Channel,
        #[source]
        source: EngineError,
    },

    /// A staged operation failed at commit; every applied operation was undone
    #[error(
        "Commit failed applying {kind} operation #{index}: {source}. {compensated} applied operation(s) were compensated"
    )]
    ApplyOperation {
        index: usize,
        kind: OperationKind,
        #[source]
        source: EngineError,
        compensated: usize,
    },

    /// Undoing a partially applied commit failed; the index state is indeterminate
    #[error(
        "Commit failed applying {kind} operation #{index}: {source}. Compensation also failed: {}",
        join_failures(.failures)
    )]
    Compensation {
        index: usize,
        kind: OperationKind,
        #[source]
        source: EngineError,
        failures: Vec<CompensationFailure>,
    },

    /// Engine-global or mutating call made where a transaction forbids it
    #[error("'{operation}' is not supported inside this transaction")]
    UnsupportedInTransaction { operation: String },

    /// A transaction is already bound to this context
    #[error("Transaction {existing} is already bound to this context")]
    AlreadyBound { existing: u64 },

    /// No transaction is bound to this context
    #[error("No transaction is bound to this context")]
    NoTransaction,

    /// Configuration errors
    #[error("Invalid configuration: {reason}")]
    Config { reason: String },
}

impl TxError {
    pub(crate) fn staging(reason: impl Into<String>) -> Self {
        Self::Staging {
            reason: reason.into(),
        }
    }

    pub(crate) fn read_channel(source: EngineError) -> Self {
        Self::ResourceAccess {
            channel: Channel::Read,
            source,
        }
    }

    pub(crate) fn write_channel(source: EngineError) -> Self {
        Self::ResourceAccess {
            channel: Channel::Write,
            source,
        }
    }

    pub(crate) fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedInTransaction {
            operation: operation.into(),
        }
    }

    /// True when the real engine may be left in a state that matches neither
    /// the pre-transaction state nor the fully committed one.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Compensation { .. })
    }

    /// True when retrying the whole transaction is a sensible reaction
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ResourceAccess { .. } | Self::ApplyOperation { .. })
    }

    /// Get a stable status code for this error type.
    pub fn status_code(&self) -> String {
        match self {
            Self::Staging { .. } => "STAGING_ERROR",
            Self::ResourceAccess { .. } => "RESOURCE_ACCESS_ERROR",
            Self::ApplyOperation { .. } => "APPLY_OPERATION_ERROR",
            Self::Compensation { .. } => "COMPENSATION_ERROR",
            Self::UnsupportedInTransaction { .. } => "UNSUPPORTED_IN_TRANSACTION",
            Self::AlreadyBound { .. } => "TRANSACTION_ALREADY_BOUND",
            Self::NoTransaction => "NO_TRANSACTION",
            Self::Config { .. } => "CONFIG_ERROR",
        }
        .to_string()
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            Self::Staging { .. } => vec![
                "Fix the rejected documents and stage them again",
                "Operations staged before this one are unaffected",
            ],
            Self::ResourceAccess { .. } => vec![
                "Check that the index is open and its directory is accessible",
                "Retry the transaction once the engine is available",
            ],
            Self::ApplyOperation { .. } => vec![
                "The commit was rolled back, the index is in its pre-transaction state",
                "Retry the transaction after fixing the failing operation",
            ],
            Self::Compensation { .. } => vec![
                "The index no longer matches its pre-transaction state",
                "Rebuild the index from its source of truth before serving reads",
            ],
            Self::UnsupportedInTransaction { .. } => vec![
                "Apply engine tuning before beginning or after ending the transaction",
            ],
            Self::AlreadyBound { .. } => vec![
                "Commit or roll back the bound transaction before beginning another",
            ],
            _ => vec![],
        }
    }
}

/// Result type alias for transactional operations
pub type TxResult<T> = Result<T, TxError>;
