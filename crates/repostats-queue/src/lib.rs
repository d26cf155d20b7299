pub mod queue;
pub mod pg;
pub mod memory;
pub mod error;

// Re-exports
pub use queue::{Delivery, Receipt, WorkQueue};
pub use pg::PgWorkQueue;
pub use memory::MemoryWorkQueue;
pub use error::{Error, Result};
