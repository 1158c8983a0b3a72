//! Configuration Module
//!
//! Environment-variable configuration loading for the archiver.

mod settings;

pub use settings::{ArchiverConfig, ConfigError, StorageSettings, WebSocketSettings};
