//! Key-value store port and its in-memory implementation

mod key_value;
mod memory;

pub use key_value::{KeyTtl, KeyValueStore, ScanPage, SharedKeyValueStore};
pub use memory::MemoryStore;
