//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations around the domain: the feed transport, the
//! shared buffer, the flush cycle, durable storage, and process plumbing.

/// Bybit WebSocket client adapter.
pub mod bybit;

/// Shared in-memory record buffer.
pub mod buffer;

/// Environment-variable configuration.
pub mod config;

/// Daily flush scheduling and orchestration.
pub mod flush;

/// Parquet output and retention enforcement.
pub mod storage;

/// Tracing subscriber initialization.
pub mod telemetry;
