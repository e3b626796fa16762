//! Database access for the linker

pub mod cache;
pub mod progress;
pub mod retry;
pub mod settings;

pub use cache::SqliteResultCache;
pub use progress::SqliteProgressStore;
