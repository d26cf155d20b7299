use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Network trouble or a 5xx response; retried with bounded backoff.
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// Rejected credential or exhausted quota; retrying cannot succeed.
    #[error("Fatal fetch error: {0}")]
    Fatal(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
