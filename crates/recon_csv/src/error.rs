//! Error taxonomy shared by the writer, merger, and delta subsystems.
//!
//! Each subsystem surfaces its own enum so callers can match on exactly
//! the failures that subsystem produces, but the kinds line up across
//! enums: configuration rejection, missing files, sink failures, codec
//! failures, and underlying I/O. Every error also maps to a stable
//! `*ErrorKind` used as the key of the per-kind histograms in `stats`.

// dependencies
use std::io;
use thiserror::Error;

/// Errors surfaced by the batch writer.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("invalid writer configuration: {0}")]
    InvalidConfig(String),
    #[error("cannot open output {path}: {reason}")]
    FileOpen { path: String, reason: String },
    #[error("write to sink failed: {0}")]
    Write(String),
    #[error("field of {size} bytes exceeds configured maximum of {max}")]
    BufferOverflow { size: usize, max: usize },
    #[error("compression failed: {0}")]
    Compression(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Stable histogram keys for writer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterErrorKind {
    InvalidConfig,
    FileOpen,
    Write,
    BufferOverflow,
    Compression,
    Io,
}

impl WriterError {
    pub fn kind(&self) -> WriterErrorKind {
        match self {
            WriterError::InvalidConfig(_) => WriterErrorKind::InvalidConfig,
            WriterError::FileOpen { .. } => WriterErrorKind::FileOpen,
            WriterError::Write(_) => WriterErrorKind::Write,
            WriterError::BufferOverflow { .. } => WriterErrorKind::BufferOverflow,
            WriterError::Compression(_) => WriterErrorKind::Compression,
            WriterError::Io(_) => WriterErrorKind::Io,
        }
    }
}

/// Errors surfaced by the merger engine.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("invalid merge configuration: {0}")]
    InvalidConfig(String),
    #[error("source file not found: {0}")]
    FileNotFound(String),
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("malformed CSV in {path}: {reason}")]
    Parse { path: String, reason: String },
    #[error("duplicate resolution produced no winner: {0}")]
    DuplicateResolution(String),
    #[error("cannot write merged output: {0}")]
    Output(String),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Stable histogram keys for merge errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeErrorKind {
    InvalidConfig,
    FileNotFound,
    SchemaMismatch,
    Parse,
    DuplicateResolution,
    Output,
    Io,
}

impl MergeError {
    pub fn kind(&self) -> MergeErrorKind {
        match self {
            MergeError::InvalidConfig(_) => MergeErrorKind::InvalidConfig,
            MergeError::FileNotFound(_) => MergeErrorKind::FileNotFound,
            MergeError::SchemaMismatch(_) => MergeErrorKind::SchemaMismatch,
            MergeError::Parse { .. } => MergeErrorKind::Parse,
            MergeError::DuplicateResolution(_) => MergeErrorKind::DuplicateResolution,
            MergeError::Output(_) => MergeErrorKind::Output,
            MergeError::Io(_) => MergeErrorKind::Io,
        }
    }
}

/// Errors surfaced by delta compression and decompression.
#[derive(Debug, Error)]
pub enum DeltaError {
    #[error("invalid delta configuration: {0}")]
    InvalidConfig(String),
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("invalid delta format: {0}")]
    InvalidFormat(String),
    #[error("compression failed: {0}")]
    CompressionFailed(String),
    #[error("decompression failed: {0}")]
    DecompressionFailed(String),
    #[error("delta format version {found} is not supported (expected {expected})")]
    VersionMismatch { found: String, expected: String },
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Stable histogram keys for delta errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeltaErrorKind {
    InvalidConfig,
    FileNotFound,
    InvalidFormat,
    CompressionFailed,
    DecompressionFailed,
    VersionMismatch,
    Io,
}

impl DeltaError {
    pub fn kind(&self) -> DeltaErrorKind {
        match self {
            DeltaError::InvalidConfig(_) => DeltaErrorKind::InvalidConfig,
            DeltaError::FileNotFound(_) => DeltaErrorKind::FileNotFound,
            DeltaError::InvalidFormat(_) => DeltaErrorKind::InvalidFormat,
            DeltaError::CompressionFailed(_) => DeltaErrorKind::CompressionFailed,
            DeltaError::DecompressionFailed(_) => DeltaErrorKind::DecompressionFailed,
            DeltaError::VersionMismatch { .. } => DeltaErrorKind::VersionMismatch,
            DeltaError::Io(_) => DeltaErrorKind::Io,
        }
    }
}
