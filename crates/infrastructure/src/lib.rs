pub mod clients;
pub mod database;
pub mod memory_store;
pub mod observability;

pub use clients::*;
pub use database::*;
pub use memory_store::MemoryRecycleStore;
pub use observability::*;
