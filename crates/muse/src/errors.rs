use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool execution failed: {0}")]
    Execution(String),

    #[error("Primary provider grid exhausted after {0} attempts")]
    GridExhausted(usize),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
