//! Topic Routing
//!
//! Maps an inbound topic string to the (instrument, category) partition key
//! it belongs to. Pure functions over the immutable catalog, no state.
//!
//! Bybit topics put the instrument in the final dot-separated segment and
//! the category in everything before it, so `orderbook.50.BTCUSDT` resolves
//! to instrument `BTCUSDT`, category `orderbook.50`.

use super::catalog::{InstrumentCatalog, StreamKey};

/// A message could not be routed to a configured stream.
///
/// Routing failures are never fatal: the caller logs and drops the message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    /// The topic has no separator between category and instrument.
    #[error("malformed topic: {0:?}")]
    MalformedTopic(String),

    /// The instrument is not in the configured set.
    #[error("instrument {instrument:?} is not configured (topic {topic:?})")]
    UnknownInstrument {
        /// The offending topic.
        topic: String,
        /// The instrument segment parsed from it.
        instrument: String,
    },

    /// The category is not subscribed for this instrument.
    #[error("category {category:?} is not subscribed for {instrument:?}")]
    UnsubscribedCategory {
        /// The instrument parsed from the topic.
        instrument: String,
        /// The category parsed from the topic.
        category: String,
    },
}

/// Resolve a topic to its partition key.
///
/// # Errors
///
/// Returns a [`RouteError`] when the topic is malformed, names an instrument
/// outside the catalog, or names a category the instrument is not subscribed
/// to.
pub fn resolve(topic: &str, catalog: &InstrumentCatalog) -> Result<StreamKey, RouteError> {
    let Some((category, instrument)) = topic.rsplit_once('.') else {
        return Err(RouteError::MalformedTopic(topic.to_string()));
    };

    if category.is_empty() || instrument.is_empty() {
        return Err(RouteError::MalformedTopic(topic.to_string()));
    }

    if !catalog.contains(instrument, category) {
        if catalog.keys().any(|key| key.instrument == instrument) {
            return Err(RouteError::UnsubscribedCategory {
                instrument: instrument.to_string(),
                category: category.to_string(),
            });
        }
        return Err(RouteError::UnknownInstrument {
            topic: topic.to_string(),
            instrument: instrument.to_string(),
        });
    }

    Ok(StreamKey::new(instrument, category))
}

// =============================================================================
// Tests
// =============================================================================
