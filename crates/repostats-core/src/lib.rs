pub mod assignment;
pub mod record;
pub mod aggregate;
pub mod result;
pub mod error;

// Re-exports
pub use assignment::{partition, partition_from, WorkAssignment};
pub use record::RepositoryRecord;
pub use aggregate::{LanguageAggregator, LanguageStatEntry, UNKNOWN_LANGUAGE};
pub use result::{merge, AggregatedResult, FetchStatus, PartialResult};
pub use error::{Error, Result};
