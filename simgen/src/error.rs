use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while configuring or running the primary generator.
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("generator status {0:#x} of a primary particle is not encoded")]
    StatusNotEncoded(i32),

    /// Conditions vertex mode without a mean vertex object.
    #[error("vertex mode is ccdb but no mean vertex object was provided")]
    MissingMeanVertex,

    #[error("already embedding into {0}")]
    AlreadyEmbedding(String),

    #[error("cannot read embedding file {path}: {source}")]
    EmbeddingFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed embedding file {path}: {source}")]
    EmbeddingFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("no events to embed into in {0}")]
    NoEmbeddingEvents(PathBuf),

    #[error("generator '{name}' failed: {reason}")]
    Generator { name: String, reason: String },
}

pub type Result<T> = std::result::Result<T, GeneratorError>;
