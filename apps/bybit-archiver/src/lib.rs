#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::too_many_lines,
        clippy::needless_pass_by_value
    )
)]

//! Bybit Market-Data Archiver
//!
//! Ingests the Bybit v5 public WebSocket feed, buffers records in memory per
//! (instrument, category), flushes them once per day to compressed Parquet
//! files, and evicts the oldest files once storage exceeds a quota.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Instrument catalog and topic routing
//!   - `catalog`: Configured instruments, categories, stream keys
//!   - `routing`: Pure topic-to-key resolution
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `bybit`: Reconnecting WebSocket client
//!   - `buffer`: Concurrency-safe record accumulator
//!   - `flush`: Daily drain-write-evict cycle
//!   - `storage`: Parquet writer and retention enforcer
//!   - `config`: Environment-variable settings
//!   - `telemetry`: Tracing setup
//!
//! # Data Flow
//!
//! ```text
//! Bybit WS ──► FeedClient ──► RecordBuffer ◄── FlushScheduler (drain)
//!                                                    │
//!                                              BatchWriter ──► Parquet files
//!                                                    │
//!                                             RetentionEnforcer
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Instruments, categories, and topic routing.
pub mod domain;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::catalog::{CatalogError, InstrumentCatalog, StreamKey};
pub use domain::routing::{RouteError, resolve};

// Infrastructure config
pub use infrastructure::config::{
    ArchiverConfig, ConfigError, StorageSettings, WebSocketSettings,
};

// Buffer
pub use infrastructure::buffer::{BufferError, Record, RecordBuffer};

// Feed client
pub use infrastructure::bybit::{
    FeedClient, FeedClientConfig, FeedClientError, ReconnectConfig, ReconnectPolicy,
};

// Flush cycle
pub use infrastructure::flush::{FlushSchedule, FlushScheduler, FlushSummary};

// Storage
pub use infrastructure::storage::{
    BatchWriter, RetentionEnforcer, RetentionReport, WriteError,
};
