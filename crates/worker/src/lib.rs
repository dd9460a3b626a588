//! Background worker that drains submitted edit batches into content history.

pub mod config;
pub mod drain;
pub mod error;

pub use config::WorkerConfig;
pub use error::WorkerError;
