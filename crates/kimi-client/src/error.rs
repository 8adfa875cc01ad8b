use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("completion contained no choices")]
    EmptyCompletion,
}

pub type Result<T> = std::result::Result<T, ClientError>;
