use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("model client error: {0}")]
    Client(#[from] kimi_client::ClientError),

    #[error("invalid checkpoint entry {token:?}: {source}")]
    CheckpointParse {
        token: String,
        source: std::num::ParseIntError,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
