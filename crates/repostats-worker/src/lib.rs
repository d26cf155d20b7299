pub mod config;
pub mod dispatcher;
pub mod worker;
pub mod merger;
pub mod error;

// Re-exports
pub use config::Settings;
pub use dispatcher::Dispatcher;
pub use worker::Worker;
pub use merger::Merger;
pub use error::{Error, Result};
