pub mod client;
pub mod fetcher;
pub mod error;

// Re-exports
pub use client::{FetchConfig, QueryFilters, SearchClient, SearchPage};
pub use fetcher::{FetchEnd, FetchOutcome, RateLimitedFetcher, RepoStream};
pub use error::{Error, Result};
