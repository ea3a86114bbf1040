//! In-process engine with the same channel contract as the Tantivy engine.
//!
//! Committed documents live in a copy-on-write table: readers keep the
//! snapshot they opened on, writers buffer their changes and swap in a new
//! table on `commit()`. Term matching is exact on field values.

use super::{
    EngineError, EngineReader, EngineResult, EngineWriter, IndexEngine, TuningSetting,
    WriterTuning,
};
use crate::types::{Analyzer, DEFAULT_ID_FIELD, Document, DocumentId, Term};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Tokenizer names the memory engine accepts, mirroring Tantivy's defaults
const KNOWN_ANALYZERS: &[&str] = &["default", "raw", "whitespace", "en_stem"];

#[derive(Debug, Default)]
struct MemoryState {
    documents: Arc<Vec<Document>>,
    writer_open: bool,
    closed: bool,
    tuning: WriterTuning,
}

#[derive(Clone, Debug)]
pub struct MemoryEngine {
    state: Arc<RwLock<MemoryState>>,
    id_field: Arc<str>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::with_id_field(DEFAULT_ID_FIELD)
    }

    pub fn with_id_field(id_field: &str) -> Self {
        Self {
            state: Arc::new(RwLock::new(MemoryState::default())),
            id_field: Arc::from(id_field),
        }
    }

    /// Engine pre-loaded with committed documents
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        let engine = Self::new();
        engine.state.write().documents = Arc::new(documents.into_iter().collect());
        engine
    }

    /// Committed documents, in insertion order
    pub fn documents(&self) -> Vec<Document> {
        self.state.read().documents.as_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.state.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().documents.is_empty()
    }

    pub fn tuning(&self) -> WriterTuning {
        self.state.read().tuning
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn matches(document: &Document, id_field: &str, term: &Term) -> bool {
    if term.field == id_field {
        document.id.as_str() == term.value
    } else {
        document.get_all(&term.field).any(|value| value == term.value)
    }
}

impl IndexEngine for MemoryEngine {
    type Reader = MemoryReader;
    type Writer = MemoryWriter;

    fn open_reader(&self) -> EngineResult<MemoryReader> {
        let state = self.state.read();
        if state.closed {
            return Err(EngineError::Closed);
        }
        Ok(MemoryReader {
            documents: Arc::clone(&state.documents),
            id_field: Arc::clone(&self.id_field),
        })
    }

    fn open_writer(&self) -> EngineResult<MemoryWriter> {
        let mut state = self.state.write();
        if state.closed {
            return Err(EngineError::Closed);
        }
        if state.writer_open {
            return Err(EngineError::WriterBusy);
        }
        state.writer_open = true;
        Ok(MemoryWriter {
            engine: self.clone(),
            pending: Vec::new(),
        })
    }

    fn tune(&self, setting: TuningSetting) -> EngineResult<()> {
        let mut state = self.state.write();
        if state.closed {
            return Err(EngineError::Closed);
        }
        state.tuning.apply(setting)
    }

    fn id_field(&self) -> &str {
        &self.id_field
    }

    fn close(&self) {
        self.state.write().closed = true;
    }

    fn is_closed(&self) -> bool {
        self.state.read().closed
    }
}

pub struct MemoryReader {
    documents: Arc<Vec<Document>>,
    id_field: Arc<str>,
}

impl EngineReader for MemoryReader {
    fn num_docs(&self) -> EngineResult<usize> {
        Ok(self.documents.len())
    }

    fn document(&self, id: &DocumentId) -> EngineResult<Option<Document>> {
        Ok(self.documents.iter().find(|d| d.id == *id).cloned())
    }

    fn search(&self, term: &Term) -> EngineResult<Vec<Document>> {
        Ok(self
            .documents
            .iter()
            .filter(|d| matches(d, &self.id_field, term))
            .cloned()
            .collect())
    }
}

#[derive(Debug)]
enum PendingChange {
    Insert(Document),
    RemoveTerm(Term),
}

pub struct MemoryWriter {
    engine: MemoryEngine,
    pending: Vec<PendingChange>,
}

impl MemoryWriter {
    fn committed_matches(&self, term: &Term) -> usize {
        let state = self.engine.state.read();
        state
            .documents
            .iter()
            .filter(|d| matches(d, &self.engine.id_field, term))
            .count()
    }
}

impl EngineWriter for MemoryWriter {
    fn insert(&mut self, document: &Document, analyzer: Option<&Analyzer>) -> EngineResult<()> {
        if let Some(analyzer) = analyzer.filter(|a| !KNOWN_ANALYZERS.contains(&a.name())) {
            return Err(EngineError::UnknownAnalyzer(analyzer.name().to_string()));
        }
        if let Some((name, _)) = document
            .fields
            .iter()
            .find(|(name, _)| *name == *self.engine.id_field)
        {
            return Err(EngineError::InvalidFieldValue {
                field: name.clone(),
                reason: "the identity is taken from the document id".to_string(),
            });
        }
        self.pending.push(PendingChange::Insert(document.clone()));
        Ok(())
    }

    fn remove_by_id(&mut self, id: &DocumentId) -> EngineResult<usize> {
        let term = self.engine.id_term(id);
        self.remove_by_term(&term)
    }

    fn remove_by_term(&mut self, term: &Term) -> EngineResult<usize> {
        let matched = self.committed_matches(term);
        self.pending.push(PendingChange::RemoveTerm(term.clone()));
        Ok(matched)
    }

    fn commit(&mut self) -> EngineResult<()> {
        let mut state = self.engine.state.write();
        if state.closed {
            return Err(EngineError::Closed);
        }

        let mut documents = state.documents.as_ref().clone();
        for change in self.pending.drain(..) {
            match change {
                PendingChange::Insert(document) => documents.push(document),
                PendingChange::RemoveTerm(term) => {
                    documents.retain(|d| !matches(d, &self.engine.id_field, &term))
                }
            }
        }
        debug!(documents = documents.len(), "Committed memory engine changes");
        state.documents = Arc::new(documents);
        Ok(())
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.pending.clear();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.engine.state.write().writer_open = false;
    }
}
