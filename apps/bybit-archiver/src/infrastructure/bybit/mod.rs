//! Bybit WebSocket Adapter
//!
//! Implements the reconnecting client for the Bybit v5 public data streams:
//! wire message types, the backoff policy, and the connection loop that
//! feeds the record buffer.

pub mod client;
pub mod messages;
pub mod reconnect;

pub use client::{FeedClient, FeedClientConfig, FeedClientError};
pub use messages::{CommandAck, Inbound, OpRequest};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
