//! Data models for the citation linker

pub mod classification;
pub mod item;
pub mod progress;
pub mod resolution;

pub use classification::{Classification, ItemKind};
pub use item::Item;
pub use progress::{LinkStatistics, ProgressState, RunStatus, UncertainItem};
pub use resolution::{CacheEntry, ResolutionResult};
