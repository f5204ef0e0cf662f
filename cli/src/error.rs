use thiserror::Error;

/// Custom error type for CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Error decoding payload: {0}")]
    Decode(#[from] aculink::DecodeError),
    #[error("Error parsing JSON reading: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("Error serializing reading: {0}")]
    Encode(#[source] serde_json::Error),
}
