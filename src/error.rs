//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Converts underlying I/O, XML, and description-file errors, and provides semantic
//! variants for graph validation, model loading, and gpt execution failures.
use thiserror::Error;

use crate::types::Toolbox;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error: {0}")]
    Xml(#[from] crate::io::XmlError),

    #[error("description error: {0}")]
    Description(#[from] crate::io::DescriptionError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("wrong model: unknown operator `{operator}`")]
    WrongModel { operator: String },

    #[error("not a GPF model graph: {0}")]
    InvalidModel(String),

    #[error("duplicate node id `{0}` in graph")]
    DuplicateNodeId(String),

    #[error("node `{node}` references source `{refid}` which is not in the graph")]
    UnresolvedSource { node: String, refid: String },

    #[error("missing required input: {name}")]
    MissingInput { name: String },

    #[error("gpt executable not found for {toolbox}; set the install folder or add gpt to PATH")]
    GptNotFound { toolbox: Toolbox },

    #[error("gpt run exceeded timeout of {seconds}s and was killed")]
    Timeout { seconds: u64 },
}
