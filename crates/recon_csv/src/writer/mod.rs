//! Buffered batch CSV writer with periodic flush, optional
//! deflate-family compression, a background flush worker, and retry.

// modules
mod batch;
mod config;

// exports
pub use batch::{BatchWriter, ErrorCallback, FlushCallback, ProgressCallback, SharedSink};
pub use config::{Compression, FlushTrigger, WriterConfig};
