use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key: {0:?}")]
    InvalidKey(String),

    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
