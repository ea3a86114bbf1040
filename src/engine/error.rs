use tantivy::directory::error::OpenDirectoryError;
use tantivy::TantivyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] TantivyError),

    #[error("Directory error: {0}")]
    Directory(#[from] OpenDirectoryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine is closed")]
    Closed,

    #[error("Another write channel holds the index lock")]
    WriterBusy,

    #[error("Unknown field '{0}' for this index schema")]
    UnknownField(String),

    #[error("Invalid field value for {field}: {reason}")]
    InvalidFieldValue { field: String, reason: String },

    #[error("Analyzer '{0}' is not registered with the engine")]
    UnknownAnalyzer(String),

    #[error("Analyzer '{analyzer}' does not match tokenizer '{tokenizer}' of field '{field}'")]
    AnalyzerMismatch {
        analyzer: String,
        field: String,
        tokenizer: String,
    },

    #[error("Schema error: {0}")]
    SchemaError(String),

    #[error("General error: {0}")]
    General(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
