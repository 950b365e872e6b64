use thiserror::Error;

/// Errors surfaced by the chat session layer.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("No role selected for this session")]
    NoActiveSession,

    #[error("Model gateway error: {0}")]
    GatewayError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
