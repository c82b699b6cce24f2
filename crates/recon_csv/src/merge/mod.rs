//! Multi-source CSV merging: strategy dispatch, deduplication, and
//! conflict resolution across heterogeneous inputs.

// modules
mod config;
mod engine;
mod resolver;

// exports
pub use config::{
    ConflictResolution, ConflictResolver, DedupPredicate, DedupStrategy, InputSource, MergeConfig,
    MergeStrategy, RowFilter,
};
pub use engine::{MergeErrorCallback, MergeProgressCallback, MergerEngine};
pub use resolver::{Candidate, DuplicateResolver};
