pub mod store;
pub mod memory;
pub mod error;

// Re-exports
pub use store::{PgResultStore, ResultStore};
pub use memory::MemoryResultStore;
pub use error::{Error, Result};
