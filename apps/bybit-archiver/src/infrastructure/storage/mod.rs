//! Durable Storage Adapters
//!
//! Parquet output for drained batches and the size-bounded retention sweep
//! that runs after every flush.

pub mod parquet;
pub mod retention;

pub use self::parquet::{BatchWriter, FILE_EXTENSION, WriteError};
pub use self::retention::{RetentionEnforcer, RetentionReport, StoredFile};
