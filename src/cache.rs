//! Token cache keys, entries, and stores.

pub mod delegating;
pub mod file;
pub mod item;
pub mod key;
pub mod memory;
pub mod store;
