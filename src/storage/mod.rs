pub mod memory;
pub mod sweeper;
pub mod trait_def;

pub use memory::MemoryStore;
pub use sweeper::Sweeper;
pub use trait_def::{StorageError, StorageResult, UrlStore};
