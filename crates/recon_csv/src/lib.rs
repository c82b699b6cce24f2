//! Core CSV data-pipeline components for reconnaissance toolkits:
//! batch writing with periodic flush and compression, multi-source
//! merging with deduplication, and delta compression between snapshots.
//!
//! The three subsystems chain together: sources are merged by the
//! [`merge::MergerEngine`], written by the [`writer::BatchWriter`], and
//! successive snapshots are diffed and reconstructed by the types in
//! [`delta`].

// modules
pub mod error;       // shared error taxonomy, one enum per subsystem
pub mod fingerprint; // row/payload content fingerprints
pub mod row;         // CSV framing: parse/escape/quote one logical row
pub mod stats;   // thread-safe statistics registers with snapshots
pub mod timestamp; // shared timestamp parsing and formatting
pub mod writer;  // buffered batch CSV writer
pub mod merge;   // multi-source merger with deduplication
pub mod delta;   // change detection and delta codecs

// re-exports
pub use error::{DeltaError, MergeError, WriterError};
pub use row::Row;
pub use writer::{BatchWriter, Compression, FlushTrigger, WriterConfig};
pub use merge::{
    ConflictResolution, DedupStrategy, InputSource, MergeConfig, MergeStrategy, MergerEngine,
};
pub use delta::{
    ChangeDetector, DeltaAlgorithm, DeltaCompressor, DeltaConfig, DeltaDecompressor, DeltaHeader,
    DeltaOperation, DeltaRecord, DetectionMode,
};
