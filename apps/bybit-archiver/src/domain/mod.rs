//! Domain Layer - Instruments, categories, and topic routing.
//!
//! This layer contains the configured instrument universe and the pure
//! topic-to-partition-key resolution logic. No I/O, no shared state.

/// Instrument catalog and stream keys.
pub mod catalog;

/// Topic-to-key resolution.
pub mod routing;
