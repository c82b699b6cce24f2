//! Writer configuration. The configuration is frozen once a file is
//! open; changing it requires closing and re-constructing the writer.

// dependencies
use std::time::Duration;
use crate::error::WriterError;

/// Deflate-family compression applied to each flush payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zlib,
    /// Selected from the output path suffix at open time:
    /// `.gz`/`.gzip` means gzip, `.z`/`.zlib` means zlib, anything else none.
    Auto,
}

/// Condition that causes an automatic flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// Only explicit `flush()` calls write the buffer out.
    Manual,
    /// Flush when the buffered row count reaches `flush_row_threshold`.
    RowCount,
    /// Flush when the buffered byte estimate reaches `flush_byte_threshold`.
    BufferBytes,
    /// Flush when `flush_interval` has elapsed since the last flush.
    TimeInterval,
    /// Any of the row, byte, or interval conditions.
    Mixed,
}

/// Batch writer configuration.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    // framing
    pub delimiter:          char,
    pub quote_char:         char,
    pub escape_char:        char,
    pub line_ending:        String,
    pub always_quote:       bool,
    pub quote_empty_fields: bool,
    pub write_header:       bool,
    pub write_bom:          bool,
    /// Informational only; output is always UTF-8.
    pub encoding:           String,
    // capacity
    pub buffer_byte_budget: usize,
    pub max_rows_in_buffer: usize,
    pub max_field_bytes:    usize,
    // flushing
    pub trigger:              FlushTrigger,
    pub flush_row_threshold:  usize,
    pub flush_byte_threshold: usize,
    pub flush_interval:       Duration,
    // compression
    pub compression:       Compression,
    pub compression_level: u32,
    // durability
    pub create_backup:      bool,
    pub max_retry_attempts: usize,
    pub retry_delay:        Duration,
    pub continue_on_error:  bool,
    pub temp_file_suffix:   String,
    // concurrency
    pub enable_background_flush: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        WriterConfig {
            delimiter:          ',',
            quote_char:         '"',
            escape_char:        '"',
            line_ending:        "\n".to_string(),
            always_quote:       false,
            quote_empty_fields: false,
            write_header:       true,
            write_bom:          false,
            encoding:           "UTF-8".to_string(),
            buffer_byte_budget: 65536,
            max_rows_in_buffer: 10000,
            max_field_bytes:    1024 * 1024,
            trigger:              FlushTrigger::Mixed,
            flush_row_threshold:  1000,
            flush_byte_threshold: 32768,
            flush_interval:       Duration::from_millis(5000),
            compression:       Compression::None,
            compression_level: 6,
            create_backup:      false,
            max_retry_attempts: 3,
            retry_delay:        Duration::from_millis(1000),
            continue_on_error:  false,
            temp_file_suffix:   ".tmp".to_string(),
            enable_background_flush: false,
        }
    }
}

impl WriterConfig {
    /// Reject configurations the writer cannot honor.
    pub fn validate(&self) -> Result<(), WriterError> {
        if self.buffer_byte_budget == 0 || self.max_rows_in_buffer == 0 || self.max_field_bytes == 0
        {
            return Err(WriterError::InvalidConfig(
                "buffer budget, row capacity, and field limit must be nonzero".to_string(),
            ));
        }
        if self.flush_row_threshold == 0 && self.trigger == FlushTrigger::RowCount {
            return Err(WriterError::InvalidConfig(
                "row-count trigger requires a nonzero flush_row_threshold".to_string(),
            ));
        }
        if self.flush_byte_threshold == 0 && self.trigger == FlushTrigger::BufferBytes {
            return Err(WriterError::InvalidConfig(
                "buffer-bytes trigger requires a nonzero flush_byte_threshold".to_string(),
            ));
        }
        if !(1..=9).contains(&self.compression_level) {
            return Err(WriterError::InvalidConfig(format!(
                "compression level {} is outside 1..=9",
                self.compression_level
            )));
        }
        if self.max_retry_attempts == 0 {
            return Err(WriterError::InvalidConfig(
                "max_retry_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve `Compression::Auto` against the output path suffix.
    pub fn detect_compression_from_path(&self, path: &str) -> Compression {
        let lower = path.to_lowercase();
        if lower.ends_with(".gz") || lower.ends_with(".gzip") {
            Compression::Gzip
        } else if lower.ends_with(".z") || lower.ends_with(".zlib") {
            Compression::Zlib
        } else {
            Compression::None
        }
    }
}
