use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Invalid parameter binding: {raw}. Expected NAME=VALUE")]
    InvalidParam { raw: String },

    #[error("Unknown operator: {operator}. Check the descriptions directory")]
    UnknownOperator { operator: String },

    #[error("Operator has no parameter named {name}")]
    UnknownParameter { name: String },

    #[error("Execution failed: {reason}")]
    ExecutionFailed { reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Gpf(#[from] gpfgraph::Error),
}
