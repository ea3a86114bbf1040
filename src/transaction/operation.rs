//! Staged mutations.
//!
//! An operation is an immutable description of one insertion or deletion
//! call. Operations carry no identity of their own: staging the same batch
//! twice records two equal operations.

use crate::error::{TxError, TxResult};
use crate::types::{Analyzer, Document, DocumentId, Term};
use std::fmt;

/// Discriminator of [`Operation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Add,
    Delete,
}

impl OperationKind {
    /// Kind of the operation that undoes this one
    pub fn inverse(self) -> Self {
        match self {
            OperationKind::Add => OperationKind::Delete,
            OperationKind::Delete => OperationKind::Add,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Add => f.write_str("add"),
            OperationKind::Delete => f.write_str("delete"),
        }
    }
}

/// Insert a batch of documents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOperation {
    documents: Vec<Document>,
    analyzer: Option<Analyzer>,
}

impl AddOperation {
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Analyzer named at staging; `None` means the strategy default
    pub fn analyzer(&self) -> Option<&Analyzer> {
        self.analyzer.as_ref()
    }
}

/// Remove documents, either named explicitly or selected by a term
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOperation {
    documents: Vec<Document>,
    term: Option<Term>,
}

impl DeleteOperation {
    /// Documents resolved when the delete was staged, as they were then
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn term(&self) -> Option<&Term> {
        self.term.as_ref()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DocumentId> {
        self.documents.iter().map(|d| &d.id)
    }
}

/// One staged mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add(AddOperation),
    Delete(DeleteOperation),
}

impl Operation {
    /// Insert `documents`. An empty or invalid batch is rejected.
    pub fn add(documents: Vec<Document>, analyzer: Option<Analyzer>) -> TxResult<Self> {
        if documents.is_empty() {
            return Err(TxError::staging("an add operation needs at least one document"));
        }
        for document in &documents {
            document.validate().map_err(TxError::staging)?;
        }
        Ok(Self::Add(AddOperation {
            documents,
            analyzer,
        }))
    }

    /// Remove exactly `documents`, by identity
    pub fn delete_documents(documents: Vec<Document>) -> TxResult<Self> {
        if documents.is_empty() {
            return Err(TxError::staging(
                "a delete without a term needs at least one document",
            ));
        }
        Ok(Self::Delete(DeleteOperation {
            documents,
            term: None,
        }))
    }

    /// Remove what `term` matches; `resolved` is what it matched at staging.
    /// `resolved` may be empty.
    pub fn delete_term(term: Term, resolved: Vec<Document>) -> TxResult<Self> {
        if term.field.is_empty() || term.value.is_empty() {
            return Err(TxError::staging(format!(
                "delete term '{term}' needs a field and a value"
            )));
        }
        Ok(Self::Delete(DeleteOperation {
            documents: resolved,
            term: Some(term),
        }))
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Add(_) => OperationKind::Add,
            Operation::Delete(_) => OperationKind::Delete,
        }
    }

    /// Documents the operation names: the batch of an add, the resolved
    /// snapshot of a delete
    pub fn documents(&self) -> &[Document] {
        match self {
            Operation::Add(add) => add.documents(),
            Operation::Delete(delete) => delete.documents(),
        }
    }

    /// The operation that undoes this one once it has been applied.
    ///
    /// An add is undone by deleting the same identities; a delete is undone
    /// by re-adding the snapshot taken at staging time, each field going
    /// through its schema tokenizer.
    pub fn inverse(&self) -> Operation {
        match self {
            Operation::Add(add) => Operation::Delete(DeleteOperation {
                documents: add.documents.clone(),
                term: None,
            }),
            Operation::Delete(delete) => Operation::Add(AddOperation {
                documents: delete.documents.clone(),
                analyzer: None,
            }),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Add(add) => write!(f, "add {} document(s)", add.documents.len()),
            Operation::Delete(DeleteOperation {
                documents,
                term: Some(term),
            }) => write!(f, "delete {term} ({} resolved)", documents.len()),
            Operation::Delete(delete) => {
                write!(f, "delete {} document(s)", delete.documents.len())
            }
        }
    }
}
