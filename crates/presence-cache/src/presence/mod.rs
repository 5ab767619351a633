//! Presence record storage

mod presence_store;

pub use presence_store::{OnlinePage, PresenceStore, PRESENCE_PREFIX};
