pub mod sqlite_recycle_store;

pub use sqlite_recycle_store::SqliteRecycleStore;
