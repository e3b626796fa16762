//! Citation linking services

pub mod cache;
pub mod classifier;
pub mod document;
pub mod engine;
pub mod normalizer;
pub mod resolver;
pub mod scheduler;
pub mod segmenter;
pub mod shortcuts;

pub use cache::{MemoryResultCache, ResultCache};
pub use classifier::classify;
pub use engine::{BatchEngine, BatchOutcome, EngineConfig};
pub use resolver::{CitationResolver, Resolved, Resolver, ResolverSettings};
pub use scheduler::TokioScheduler;
pub use shortcuts::{extract_url, LibraryEntry, LibraryIndex};
