// # Store Implementations
//
// Implementations of LedgerStore and CacheStore for different persistence
// strategies. Both share the table logic in `tables`.

pub mod file;
pub mod memory;
mod tables;

pub use file::{FileStore, FileStoreFactory};
pub use memory::{MemoryStore, MemoryStoreFactory};
