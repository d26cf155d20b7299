use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Store write error: {0}")]
    Write(String),

    #[error("Malformed stored record: {0}")]
    Decode(String),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
