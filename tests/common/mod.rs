#![allow(dead_code)]

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tempfile::TempDir;
use txindex::config::{FieldConfig, IndexConfig, Settings, TransactionConfig, WriterConfig};
use txindex::engine::{MemoryReader, MemoryWriter};
use txindex::{
    Analyzer, CacheTransactionStrategy, Document, DocumentId, EngineError, EngineReader,
    EngineResult, EngineWriter, IndexEngine, MemoryEngine, TantivyEngine, Term, TuningSetting,
};

pub fn doc(id: &str, title: &str) -> Document {
    Document::new(id).with_field("title", title)
}

/// Index config with a tokenized `title` and an untokenized `tag`
pub fn test_fields() -> Vec<FieldConfig> {
    vec![FieldConfig::text("title"), FieldConfig::keyword("tag")]
}

/// Settings pointing at an isolated on-disk index.
/// This prevents Tantivy lock conflicts when tests run in parallel.
pub fn test_settings() -> (Settings, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let mut settings = Settings::default();
    settings.index = IndexConfig::at(temp_dir.path().join("index"), test_fields());
    (settings, temp_dir)
}

pub fn open_tantivy(settings: &Settings) -> TantivyEngine {
    TantivyEngine::open(&settings.index, &settings.writer).expect("Failed to open index")
}

/// RAM-backed Tantivy engine pre-loaded with committed documents
pub fn tantivy_with(documents: &[Document]) -> TantivyEngine {
    let config = IndexConfig::in_memory(test_fields());
    let engine =
        TantivyEngine::open(&config, &WriterConfig::default()).expect("Failed to open index");
    commit_documents(&engine, documents);
    engine
}

pub fn commit_documents<E: IndexEngine>(engine: &E, documents: &[Document]) {
    if documents.is_empty() {
        return;
    }
    let mut writer = engine.open_writer().expect("Failed to open writer");
    for document in documents {
        writer.insert(document, None).expect("Failed to insert");
    }
    writer.commit().expect("Failed to commit");
}

pub fn strategy<E: IndexEngine>(engine: Arc<E>) -> CacheTransactionStrategy<E> {
    CacheTransactionStrategy::new(engine, &TransactionConfig::default())
}

/// Whether a committed document with this identity exists
pub fn committed<E: IndexEngine>(engine: &E, id: &str) -> bool {
    engine
        .open_reader()
        .expect("Failed to open reader")
        .document(&DocumentId::from(id))
        .expect("Failed to read")
        .is_some()
}

pub fn committed_count<E: IndexEngine>(engine: &E) -> usize {
    engine
        .open_reader()
        .expect("Failed to open reader")
        .num_docs()
        .expect("Failed to count")
}

pub fn sorted_ids(engine: &MemoryEngine) -> Vec<String> {
    let mut ids: Vec<_> = engine
        .documents()
        .into_iter()
        .map(|d| d.id.as_str().to_string())
        .collect();
    ids.sort();
    ids
}

#[derive(Default)]
struct Faults {
    inserts: HashSet<String>,
    removals: HashSet<String>,
    commits: usize,
    fail_commit_at: Option<usize>,
}

/// Memory engine whose write channels fail on chosen documents
#[derive(Clone, Default)]
pub struct FaultyEngine {
    inner: MemoryEngine,
    faults: Arc<Mutex<Faults>>,
}

impl FaultyEngine {
    pub fn with_documents(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            inner: MemoryEngine::with_documents(documents),
            faults: Arc::default(),
        }
    }

    pub fn inner(&self) -> &MemoryEngine {
        &self.inner
    }

    /// Every insertion of this identity fails
    pub fn fail_insert_of(&self, id: &str) {
        self.faults.lock().inserts.insert(id.to_string());
    }

    /// Every removal of this identity fails
    pub fn fail_remove_of(&self, id: &str) {
        self.faults.lock().removals.insert(id.to_string());
    }

    /// The `nth` commit from now on fails, counting from 1
    pub fn fail_commit_at(&self, nth: usize) {
        let mut faults = self.faults.lock();
        faults.fail_commit_at = Some(faults.commits + nth);
    }

    pub fn commits(&self) -> usize {
        self.faults.lock().commits
    }
}

fn injected(what: &str) -> EngineError {
    EngineError::General(format!("injected failure: {what}"))
}

impl IndexEngine for FaultyEngine {
    type Reader = MemoryReader;
    type Writer = FaultyWriter;

    fn open_reader(&self) -> EngineResult<MemoryReader> {
        self.inner.open_reader()
    }

    fn open_writer(&self) -> EngineResult<FaultyWriter> {
        Ok(FaultyWriter {
            inner: self.inner.open_writer()?,
            faults: Arc::clone(&self.faults),
            id_field: self.inner.id_field().to_string(),
        })
    }

    fn tune(&self, setting: TuningSetting) -> EngineResult<()> {
        self.inner.tune(setting)
    }

    fn id_field(&self) -> &str {
        self.inner.id_field()
    }

    fn close(&self) {
        self.inner.close()
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

pub struct FaultyWriter {
    inner: MemoryWriter,
    faults: Arc<Mutex<Faults>>,
    id_field: String,
}

impl EngineWriter for FaultyWriter {
    fn insert(&mut self, document: &Document, analyzer: Option<&Analyzer>) -> EngineResult<()> {
        if self.faults.lock().inserts.contains(document.id.as_str()) {
            return Err(injected(&format!("insert {}", document.id)));
        }
        self.inner.insert(document, analyzer)
    }

    fn remove_by_id(&mut self, id: &DocumentId) -> EngineResult<usize> {
        if self.faults.lock().removals.contains(id.as_str()) {
            return Err(injected(&format!("remove {id}")));
        }
        self.inner.remove_by_id(id)
    }

    fn remove_by_term(&mut self, term: &Term) -> EngineResult<usize> {
        if term.field == self.id_field && self.faults.lock().removals.contains(&term.value) {
            return Err(injected(&format!("remove {term}")));
        }
        self.inner.remove_by_term(term)
    }

    fn commit(&mut self) -> EngineResult<()> {
        {
            let mut faults = self.faults.lock();
            faults.commits += 1;
            if faults.fail_commit_at == Some(faults.commits) {
                return Err(injected("commit"));
            }
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.inner.rollback()
    }
}
