//! Tantivy-backed real engine.
//!
//! The schema is one raw identity field plus the configured text fields.
//! Every read channel reloads the shared `IndexReader` first, so it sees the
//! last commit of any writer. Write channels wrap a single `IndexWriter`,
//! whose directory lock gives the single-writer discipline.

use super::{
    EngineError, EngineReader, EngineResult, EngineWriter, IndexEngine, TuningSetting,
    WriterTuning,
};
use crate::config::{IndexConfig, WriterConfig};
use crate::types::{Analyzer, Document, DocumentId, Term};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tantivy::collector::{Count, DocSetCollector};
use tantivy::directory::MmapDirectory;
use tantivy::merge_policy::{LogMergePolicy, NoMergePolicy};
use tantivy::query::TermQuery;
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::tokenizer::TokenizerManager;
use tantivy::{
    DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, TantivyDocument,
    TantivyError,
};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct IndexedField {
    name: String,
    field: Field,
    tokenizer: String,
    stored: bool,
}

/// Resolved schema handles shared by the engine and its channels
#[derive(Debug)]
struct SchemaFields {
    id_name: String,
    id: Field,
    fields: Vec<IndexedField>,
}

impl SchemaFields {
    fn build(config: &IndexConfig) -> EngineResult<(Schema, Self)> {
        if config.id_field.trim().is_empty() {
            return Err(EngineError::SchemaError(
                "identity field name must not be empty".to_string(),
            ));
        }

        let mut builder = Schema::builder();
        let id = builder.add_text_field(&config.id_field, STRING | STORED);

        let mut seen = HashSet::new();
        seen.insert(config.id_field.as_str());
        let mut fields = Vec::with_capacity(config.fields.len());

        for field_config in &config.fields {
            if !seen.insert(field_config.name.as_str()) {
                return Err(EngineError::SchemaError(format!(
                    "field '{}' is declared twice",
                    field_config.name
                )));
            }

            let indexing = TextFieldIndexing::default()
                .set_tokenizer(&field_config.tokenizer)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions);
            let mut options = TextOptions::default().set_indexing_options(indexing);
            if field_config.stored {
                options = options.set_stored();
            }

            fields.push(IndexedField {
                name: field_config.name.clone(),
                field: builder.add_text_field(&field_config.name, options),
                tokenizer: field_config.tokenizer.clone(),
                stored: field_config.stored,
            });
        }

        Ok((
            builder.build(),
            Self {
                id_name: config.id_field.clone(),
                id,
                fields,
            },
        ))
    }

    fn text_field(&self, name: &str) -> EngineResult<&IndexedField> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| EngineError::UnknownField(name.to_string()))
    }

    /// Field a term can target: the identity field or any text field
    fn term_field(&self, name: &str) -> EngineResult<Field> {
        if name == self.id_name {
            Ok(self.id)
        } else {
            self.text_field(name).map(|f| f.field)
        }
    }

    fn term(&self, term: &Term) -> EngineResult<tantivy::Term> {
        Ok(tantivy::Term::from_field_text(
            self.term_field(&term.field)?,
            &term.value,
        ))
    }

    fn id_term(&self, id: &DocumentId) -> tantivy::Term {
        tantivy::Term::from_field_text(self.id, id.as_str())
    }

    /// Rebuild a document from its stored fields. Unstored fields are lost.
    fn to_document(&self, stored: &TantivyDocument) -> EngineResult<Document> {
        let id = stored
            .get_first(self.id)
            .and_then(|value| value.as_str())
            .ok_or_else(|| EngineError::InvalidFieldValue {
                field: self.id_name.clone(),
                reason: "stored document has no identity".to_string(),
            })?;

        let mut document = Document::new(id);
        for indexed in self.fields.iter().filter(|f| f.stored) {
            for value in stored.get_all(indexed.field) {
                if let Some(text) = value.as_str() {
                    document.add_field(&indexed.name, text);
                }
            }
        }
        Ok(document)
    }
}

/// Real engine over a Tantivy index.
pub struct TantivyEngine {
    index: Index,
    reader: IndexReader,
    schema: Arc<SchemaFields>,
    tuning: Mutex<WriterTuning>,
    closed: AtomicBool,
}

impl TantivyEngine {
    /// Open the index described by `config`, creating it when missing.
    pub fn open(config: &IndexConfig, writer: &WriterConfig) -> EngineResult<Self> {
        let (schema, fields) = SchemaFields::build(config)?;

        let index = if config.in_memory {
            Index::create_in_ram(schema)
        } else {
            std::fs::create_dir_all(&config.path)?;
            let directory = MmapDirectory::open(&config.path)?;
            Index::open_or_create(directory, schema)?
        };

        let tokenizers = index.tokenizers();
        if let Some(missing) = fields
            .fields
            .iter()
            .find(|f| tokenizers.get(&f.tokenizer).is_none())
        {
            return Err(EngineError::UnknownAnalyzer(missing.tokenizer.clone()));
        }

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        info!(
            path = %config.path.display(),
            in_memory = config.in_memory,
            fields = fields.fields.len(),
            "Opened tantivy engine"
        );

        Ok(Self {
            index,
            reader,
            schema: Arc::new(fields),
            tuning: Mutex::new(writer.tuning()),
            closed: AtomicBool::new(false),
        })
    }

    /// Current writer tuning
    pub fn tuning(&self) -> WriterTuning {
        *self.tuning.lock()
    }

    fn ensure_open(&self) -> EngineResult<()> {
        if self.is_closed() {
            Err(EngineError::Closed)
        } else {
            Ok(())
        }
    }

    fn fresh_searcher(reader: &IndexReader) -> EngineResult<Searcher> {
        reader.reload()?;
        Ok(reader.searcher())
    }
}

impl IndexEngine for TantivyEngine {
    type Reader = TantivyReader;
    type Writer = TantivyWriter;

    fn open_reader(&self) -> EngineResult<TantivyReader> {
        self.ensure_open()?;
        Ok(TantivyReader {
            searcher: Self::fresh_searcher(&self.reader)?,
            schema: Arc::clone(&self.schema),
        })
    }

    fn open_writer(&self) -> EngineResult<TantivyWriter> {
        self.ensure_open()?;
        let tuning = self.tuning();

        let writer: IndexWriter = self
            .index
            .writer_with_num_threads(tuning.threads, tuning.memory_budget)
            .map_err(|e| match e {
                TantivyError::LockFailure(..) => EngineError::WriterBusy,
                other => EngineError::Tantivy(other),
            })?;

        if !tuning.merges_enabled {
            writer.set_merge_policy(Box::new(NoMergePolicy));
        } else if tuning.merge_factor.is_some() || tuning.max_merge_docs.is_some() {
            let mut policy = LogMergePolicy::default();
            if let Some(factor) = tuning.merge_factor {
                policy.set_min_num_segments(factor);
            }
            if let Some(docs) = tuning.max_merge_docs {
                policy.set_max_docs_before_merge(docs);
            }
            writer.set_merge_policy(Box::new(policy));
        }

        debug!(threads = tuning.threads, "Opened tantivy write channel");

        Ok(TantivyWriter {
            writer,
            reader: self.reader.clone(),
            tokenizers: self.index.tokenizers().clone(),
            schema: Arc::clone(&self.schema),
        })
    }

    fn tune(&self, setting: TuningSetting) -> EngineResult<()> {
        self.ensure_open()?;
        self.tuning.lock().apply(setting)?;
        debug!(?setting, "Tuned tantivy engine");
        Ok(())
    }

    fn id_field(&self) -> &str {
        &self.schema.id_name
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Read channel over one searcher snapshot
pub struct TantivyReader {
    searcher: Searcher,
    schema: Arc<SchemaFields>,
}

impl TantivyReader {
    fn addresses(&self, term: tantivy::Term) -> EngineResult<Vec<DocAddress>> {
        let query = TermQuery::new(term, IndexRecordOption::Basic);
        let mut addresses: Vec<DocAddress> = self
            .searcher
            .search(&query, &DocSetCollector)?
            .into_iter()
            .collect();
        addresses.sort();
        Ok(addresses)
    }

    fn load(&self, address: DocAddress) -> EngineResult<Document> {
        let stored: TantivyDocument = self.searcher.doc(address)?;
        self.schema.to_document(&stored)
    }
}

impl EngineReader for TantivyReader {
    fn num_docs(&self) -> EngineResult<usize> {
        Ok(self.searcher.num_docs() as usize)
    }

    fn document(&self, id: &DocumentId) -> EngineResult<Option<Document>> {
        match self.addresses(self.schema.id_term(id))?.first() {
            Some(address) => self.load(*address).map(Some),
            None => Ok(None),
        }
    }

    fn search(&self, term: &Term) -> EngineResult<Vec<Document>> {
        self.addresses(self.schema.term(term)?)?
            .into_iter()
            .map(|address| self.load(address))
            .collect()
    }
}

/// Write channel owning the index writer lock until dropped
pub struct TantivyWriter {
    writer: IndexWriter,
    reader: IndexReader,
    tokenizers: TokenizerManager,
    schema: Arc<SchemaFields>,
}

impl TantivyWriter {
    fn committed_matches(&self, term: &tantivy::Term) -> EngineResult<usize> {
        let searcher = TantivyEngine::fresh_searcher(&self.reader)?;
        let query = TermQuery::new(term.clone(), IndexRecordOption::Basic);
        Ok(searcher.search(&query, &Count)?)
    }

    fn to_tantivy(
        &self,
        document: &Document,
        analyzer: Option<&Analyzer>,
    ) -> EngineResult<TantivyDocument> {
        if let Some(analyzer) = analyzer.filter(|a| self.tokenizers.get(a.name()).is_none()) {
            return Err(EngineError::UnknownAnalyzer(analyzer.name().to_string()));
        }

        let mut stored = TantivyDocument::default();
        stored.add_text(self.schema.id, document.id.as_str());

        for (name, value) in &document.fields {
            if *name == self.schema.id_name {
                return Err(EngineError::InvalidFieldValue {
                    field: name.clone(),
                    reason: "the identity is taken from the document id".to_string(),
                });
            }
            let indexed = self.schema.text_field(name)?;
            // Tokenizers are fixed per field by the schema
            if let Some(analyzer) = analyzer.filter(|a| a.name() != indexed.tokenizer) {
                return Err(EngineError::AnalyzerMismatch {
                    analyzer: analyzer.name().to_string(),
                    field: indexed.name.clone(),
                    tokenizer: indexed.tokenizer.clone(),
                });
            }
            stored.add_text(indexed.field, value);
        }
        Ok(stored)
    }
}

impl EngineWriter for TantivyWriter {
    fn insert(&mut self, document: &Document, analyzer: Option<&Analyzer>) -> EngineResult<()> {
        let stored = self.to_tantivy(document, analyzer)?;
        self.writer.add_document(stored)?;
        Ok(())
    }

    fn remove_by_id(&mut self, id: &DocumentId) -> EngineResult<usize> {
        let term = self.schema.id_term(id);
        let matched = self.committed_matches(&term)?;
        self.writer.delete_term(term);
        Ok(matched)
    }

    fn remove_by_term(&mut self, term: &Term) -> EngineResult<usize> {
        let term = self.schema.term(term)?;
        let matched = self.committed_matches(&term)?;
        self.writer.delete_term(term);
        Ok(matched)
    }

    fn commit(&mut self) -> EngineResult<()> {
        self.writer.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> EngineResult<()> {
        self.writer.rollback()?;
        Ok(())
    }
}
