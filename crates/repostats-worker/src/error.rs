use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Fetch error: {0}")]
    Fetch(#[from] repostats_github::Error),

    #[error("Store error: {0}")]
    Store(#[from] repostats_store::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] repostats_queue::Error),

    #[error(transparent)]
    Core(#[from] repostats_core::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
