//! The batch writer accumulates formatted rows in memory and writes them
//! out in flushes, optionally compressed, either on demand or when a
//! configured trigger fires. A background worker can drive time-based
//! flushing; shutdown is cooperative and `close_file` joins the worker
//! before the sink is released.
//!
//! Locking follows the two-mutex layout described in the concurrency
//! model: the writer mutex (the `state` lock) serializes public mutating
//! operations and sink access, while the row buffer has its own mutex
//! held only for push and drain.

// dependencies
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crossbeam::channel::{bounded, RecvTimeoutError, Sender};
use flate2::write::{GzEncoder, ZlibEncoder};
use log::{error, info};
use crate::error::{WriterError, WriterErrorKind};
use crate::row::{self, Row};
use crate::stats::{WriterStats, WriterStatsSnapshot};
use crate::writer::{Compression, FlushTrigger, WriterConfig};

// constants
const LOG_TARGET: &str = "batch_writer";
const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];
const INVALID_FILENAME_CHARS: &str = "<>:\"|?*";

/// Sink shared with a caller; the writer never closes it.
pub type SharedSink = Arc<Mutex<dyn Write + Send>>;

/// Invoked after each successful flush with the session totals
/// `(rows_written, bytes_written)`.
pub type FlushCallback = Box<dyn Fn(u64, u64) + Send + Sync>;
/// Invoked whenever an error is recorded, with its kind and message.
pub type ErrorCallback = Box<dyn Fn(WriterErrorKind, &str) + Send + Sync>;
/// Invoked after each flush with `(rows_written, progress_percent)`.
pub type ProgressCallback = Box<dyn Fn(u64, f64) + Send + Sync>;

#[derive(Default)]
struct CallbackSet {
    flush:    Option<FlushCallback>,
    error:    Option<ErrorCallback>,
    progress: Option<ProgressCallback>,
}

/// Where flushed bytes go.
enum Sink {
    /// Writer-owned file, closed on `close_file`.
    File(BufWriter<File>),
    /// Externally owned sink; `close_file` drops only our handle.
    Shared(SharedSink),
}

impl Sink {
    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match self {
            Sink::File(w) => w.write_all(data),
            Sink::Shared(s) => s.lock().unwrap().write_all(data),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::File(w) => w.flush(),
            Sink::Shared(s) => s.lock().unwrap().flush(),
        }
    }
}

/// State behind the writer mutex: the sink and the state machine.
struct WriterState {
    sink:           Option<Sink>,
    header_written: bool,
    current_path:   Option<String>,
    /// Compression resolved at open time (`Auto` collapses to a concrete
    /// algorithm from the path suffix).
    compression:    Compression,
    last_flush:     Instant,
}

/// State behind the buffer mutex: formatted lines and the byte estimate.
#[derive(Default)]
struct RowBuffer {
    lines: Vec<String>,
    bytes: usize,
}

/// Buffered CSV writer with periodic flushing, optional deflate-family
/// compression, and retry on sink failures.
pub struct BatchWriter {
    config:    WriterConfig,
    state:     Arc<Mutex<WriterState>>,
    buffer:    Arc<Mutex<RowBuffer>>,
    stats:     Arc<WriterStats>,
    callbacks: Arc<Mutex<CallbackSet>>,
    background: Option<BackgroundFlush>,
}

struct BackgroundFlush {
    stop_tx: Sender<()>,
    handle:  JoinHandle<()>,
}

impl BatchWriter {
    /* ------------------------------------------------------------------
    construction and configuration
    ------------------------------------------------------------------ */
    /// Create a writer with the given configuration. The configuration is
    /// frozen once a sink is open; reconfiguring requires closing first.
    pub fn new(config: WriterConfig) -> Result<Self, WriterError> {
        config.validate()?;
        Ok(BatchWriter {
            config,
            state: Arc::new(Mutex::new(WriterState {
                sink:           None,
                header_written: false,
                current_path:   None,
                compression:    Compression::None,
                last_flush:     Instant::now(),
            })),
            buffer:     Arc::new(Mutex::new(RowBuffer::default())),
            stats:      Arc::new(WriterStats::new()),
            callbacks:  Arc::new(Mutex::new(CallbackSet::default())),
            background: None,
        })
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Replace the configuration. Fails while a sink is open.
    pub fn set_config(&mut self, config: WriterConfig) -> Result<(), WriterError> {
        self.ensure_closed("configuration can only change while closed")?;
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn set_flush_callback(&self, callback: FlushCallback) {
        self.callbacks.lock().unwrap().flush = Some(callback);
    }

    pub fn set_error_callback(&self, callback: ErrorCallback) {
        self.callbacks.lock().unwrap().error = Some(callback);
    }

    pub fn set_progress_callback(&self, callback: ProgressCallback) {
        self.callbacks.lock().unwrap().progress = Some(callback);
    }

    /// Adjust the retry policy. Fails while a sink is open.
    pub fn set_retry_policy(
        &mut self,
        max_attempts: usize,
        delay: Duration,
    ) -> Result<(), WriterError> {
        self.ensure_closed("retry policy can only change while closed")?;
        if max_attempts == 0 {
            return Err(WriterError::InvalidConfig(
                "max_retry_attempts must be at least 1".to_string(),
            ));
        }
        self.config.max_retry_attempts = max_attempts;
        self.config.retry_delay = delay;
        Ok(())
    }

    /// Enable compression for subsequent opens. Fails while open.
    pub fn enable_compression(
        &mut self,
        compression: Compression,
        level: u32,
    ) -> Result<(), WriterError> {
        self.ensure_closed("compression can only change while closed")?;
        if !(1..=9).contains(&level) {
            return Err(WriterError::InvalidConfig(format!(
                "compression level {level} is outside 1..=9"
            )));
        }
        self.config.compression = compression;
        self.config.compression_level = level;
        Ok(())
    }

    pub fn disable_compression(&mut self) -> Result<(), WriterError> {
        self.ensure_closed("compression can only change while closed")?;
        self.config.compression = Compression::None;
        Ok(())
    }

    pub fn set_compression_level(&mut self, level: u32) -> Result<(), WriterError> {
        self.ensure_closed("compression can only change while closed")?;
        if !(1..=9).contains(&level) {
            return Err(WriterError::InvalidConfig(format!(
                "compression level {level} is outside 1..=9"
            )));
        }
        self.config.compression_level = level;
        Ok(())
    }

    pub fn is_compression_enabled(&self) -> bool {
        self.config.compression != Compression::None
    }

    fn ensure_closed(&self, reason: &str) -> Result<(), WriterError> {
        if self.state.lock().unwrap().sink.is_some() {
            return Err(WriterError::InvalidConfig(reason.to_string()));
        }
        Ok(())
    }

    /* ------------------------------------------------------------------
    file operations
    ------------------------------------------------------------------ */
    /// Open a file for writing. Fails if a sink is already open, if the
    /// path is invalid, or if the file cannot be created.
    pub fn open_path(&mut self, path: &str) -> Result<(), WriterError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.sink.is_some() {
                let message = format!("a sink is already open: {:?}", state.current_path);
                self.report_error(WriterErrorKind::FileOpen, &message);
                return Err(WriterError::FileOpen {
                    path:   path.to_string(),
                    reason: "writer is already open".to_string(),
                });
            }
            if !Self::is_valid_filename(path) {
                self.report_error(WriterErrorKind::FileOpen, &format!("invalid path: {path}"));
                return Err(WriterError::FileOpen {
                    path:   path.to_string(),
                    reason: "invalid filename".to_string(),
                });
            }
            if self.config.create_backup {
                Self::create_backup_file(path, ".bak")?;
            }
            let compression = match self.config.compression {
                Compression::Auto => self.config.detect_compression_from_path(path),
                other => other,
            };
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(path)
                .map_err(|e| {
                    let err = WriterError::FileOpen {
                        path:   path.to_string(),
                        reason: e.to_string(),
                    };
                    self.report_error(WriterErrorKind::FileOpen, &err.to_string());
                    err
                })?;
            let mut sink = Sink::File(BufWriter::new(file));
            if self.config.write_bom && self.config.encoding == "UTF-8" {
                sink.write_all(&UTF8_BOM)?;
            }
            state.sink = Some(sink);
            state.header_written = false;
            state.current_path = Some(path.to_string());
            state.compression = compression;
            state.last_flush = Instant::now();
            self.stats.start_timing();
            info!(target: LOG_TARGET, "opened {path} for writing");
        }
        if self.config.enable_background_flush {
            self.start_background_flush();
        }
        Ok(())
    }

    /// Wrap an externally owned sink. On close the writer drops only its
    /// own handle and never closes the caller's.
    pub fn open_stream(&mut self, sink: SharedSink) -> Result<(), WriterError> {
        {
            let mut state = self.state.lock().unwrap();
            if state.sink.is_some() {
                self.report_error(WriterErrorKind::FileOpen, "a sink is already open");
                return Err(WriterError::FileOpen {
                    path:   "<stream>".to_string(),
                    reason: "writer is already open".to_string(),
                });
            }
            state.sink = Some(Sink::Shared(sink));
            state.header_written = false;
            state.current_path = None;
            state.compression = match self.config.compression {
                Compression::Auto => Compression::None,
                other => other,
            };
            state.last_flush = Instant::now();
            self.stats.start_timing();
            info!(target: LOG_TARGET, "opened external stream for writing");
        }
        if self.config.enable_background_flush {
            self.start_background_flush();
        }
        Ok(())
    }

    /// Flush the remainder, stop the background flusher, and release the
    /// sink. Idempotent: closing a closed writer is a no-op.
    pub fn close_file(&mut self) -> Result<(), WriterError> {
        // the worker locks the writer mutex, so join it before taking it
        self.stop_background_flush();
        let mut state = self.state.lock().unwrap();
        if state.sink.is_none() {
            return Ok(());
        }
        let flush_result = flush_locked(
            &self.config,
            &mut state,
            &self.buffer,
            &self.stats,
            &self.callbacks,
        );
        state.sink = None;
        state.header_written = false;
        let path = state.current_path.take();
        self.stats.stop_timing();
        info!(
            target: LOG_TARGET,
            "closed {} ({} rows written)",
            path.as_deref().unwrap_or("<stream>"),
            self.stats.snapshot().rows_written
        );
        flush_result
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().sink.is_some()
    }

    pub fn current_path(&self) -> Option<String> {
        self.state.lock().unwrap().current_path.clone()
    }

    /// Clear the buffer and re-open the current path if the sink was lost.
    pub fn recover(&mut self) -> Result<(), WriterError> {
        let path = {
            let state = self.state.lock().unwrap();
            self.buffer.lock().unwrap().clear();
            if state.sink.is_some() {
                return Ok(());
            }
            state.current_path.clone()
        };
        match path {
            Some(path) => self.open_path(&path),
            None => Ok(()),
        }
    }

    /* ------------------------------------------------------------------
    row writing
    ------------------------------------------------------------------ */
    /// Append the header row and force a flush. No-op when headers are
    /// disabled; fails if the header was already written.
    pub fn write_header(&mut self, fields: &[String]) -> Result<(), WriterError> {
        if !self.config.write_header {
            return Ok(());
        }
        let mut state = self.state.lock().unwrap();
        if state.sink.is_none() {
            let err = WriterError::Write("no sink open for header".to_string());
            self.report_error(WriterErrorKind::Write, &err.to_string());
            return Err(err);
        }
        if state.header_written {
            let err = WriterError::InvalidConfig("header already written".to_string());
            self.report_error(WriterErrorKind::InvalidConfig, &err.to_string());
            return Err(err);
        }
        // the header bypasses the row counters so that written + skipped
        // + errored stays equal to the number of write_row calls
        let line = row::format_row(fields, &self.config);
        {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.bytes += line.len() + self.config.line_ending.len();
            buffer.lines.push(line);
        }
        state.header_written = true;
        flush_locked(
            &self.config,
            &mut state,
            &self.buffer,
            &self.stats,
            &self.callbacks,
        )
    }

    pub fn has_header_written(&self) -> bool {
        self.state.lock().unwrap().header_written
    }

    /// Append one row to the buffer, flushing first if the buffer is at
    /// row capacity and afterwards if a trigger condition holds.
    pub fn write_row(&mut self, fields: Row) -> Result<(), WriterError> {
        match self.write_row_inner(fields) {
            // counted as an errored row already; swallowed per policy
            Err(WriterError::BufferOverflow { .. }) if self.config.continue_on_error => Ok(()),
            other => other,
        }
    }

    fn write_row_inner(&mut self, fields: Row) -> Result<(), WriterError> {
        let mut state = self.state.lock().unwrap();
        if state.sink.is_none() {
            let err = WriterError::Write("no sink open for writing".to_string());
            self.report_error(WriterErrorKind::Write, &err.to_string());
            return Err(err);
        }
        if fields.is_empty() {
            self.stats.increment_rows_skipped();
            return Ok(());
        }
        for field in &fields {
            if field.len() > self.config.max_field_bytes {
                self.stats.increment_rows_with_errors();
                let err = WriterError::BufferOverflow {
                    size: field.len(),
                    max:  self.config.max_field_bytes,
                };
                self.report_error(WriterErrorKind::BufferOverflow, &err.to_string());
                return Err(err);
            }
        }
        let line = row::format_row(&fields, &self.config);
        let mut needs_capacity_flush = false;
        {
            let mut buffer = self.buffer.lock().unwrap();
            if buffer.lines.len() >= self.config.max_rows_in_buffer {
                needs_capacity_flush = true;
            }
        }
        if needs_capacity_flush {
            flush_locked(
                &self.config,
                &mut state,
                &self.buffer,
                &self.stats,
                &self.callbacks,
            )?;
        }
        {
            let mut buffer = self.buffer.lock().unwrap();
            buffer.bytes += line.len() + self.config.line_ending.len();
            buffer.lines.push(line);
        }
        self.stats.increment_rows_written();
        if should_flush(&self.config, &self.buffer, state.last_flush) {
            flush_locked(
                &self.config,
                &mut state,
                &self.buffer,
                &self.stats,
                &self.callbacks,
            )?;
        }
        Ok(())
    }

    /// Write a batch of rows. Stops at the first error unless
    /// `continue_on_error` is set, in which case per-row errors are
    /// tallied and the last one is returned at the end.
    pub fn write_rows<I>(&mut self, rows: I) -> Result<(), WriterError>
    where
        I: IntoIterator<Item = Row>,
    {
        let mut last_error = None;
        for fields in rows {
            if let Err(e) = self.write_row_inner(fields) {
                if !self.config.continue_on_error {
                    return Err(e);
                }
                last_error = Some(e);
            }
        }
        match last_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /* ------------------------------------------------------------------
    flushing
    ------------------------------------------------------------------ */
    /// Serialize the buffered rows, compress them if configured, write
    /// the result to the sink, and reset the buffer.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        let mut state = self.state.lock().unwrap();
        flush_locked(
            &self.config,
            &mut state,
            &self.buffer,
            &self.stats,
            &self.callbacks,
        )
    }

    /// Flush only if a trigger condition currently holds.
    pub fn flush_if_needed(&mut self) -> Result<(), WriterError> {
        let mut state = self.state.lock().unwrap();
        if should_flush(&self.config, &self.buffer, state.last_flush) {
            return flush_locked(
                &self.config,
                &mut state,
                &self.buffer,
                &self.stats,
                &self.callbacks,
            );
        }
        Ok(())
    }

    /* ------------------------------------------------------------------
    buffer inspection
    ------------------------------------------------------------------ */
    pub fn buffered_row_count(&self) -> usize {
        self.buffer.lock().unwrap().lines.len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.buffer.lock().unwrap().bytes
    }

    /// Buffered bytes as a fraction of the configured byte budget.
    pub fn buffer_utilization(&self) -> f64 {
        self.buffer.lock().unwrap().bytes as f64 / self.config.buffer_byte_budget as f64
    }

    /// Discard buffered rows without writing them.
    pub fn clear_buffer(&self) {
        self.buffer.lock().unwrap().clear();
    }

    /* ------------------------------------------------------------------
    statistics
    ------------------------------------------------------------------ */
    pub fn statistics(&self) -> WriterStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /* ------------------------------------------------------------------
    background flushing
    ------------------------------------------------------------------ */
    /// Start the background flush worker. The worker wakes on the flush
    /// interval, takes the writer mutex, and flushes when a trigger
    /// condition holds.
    pub fn start_background_flush(&mut self) {
        if self.background.is_some() {
            return;
        }
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let config = self.config.clone();
        let state = Arc::clone(&self.state);
        let buffer = Arc::clone(&self.buffer);
        let stats = Arc::clone(&self.stats);
        let callbacks = Arc::clone(&self.callbacks);
        let handle = thread::spawn(move || {
            info!(target: LOG_TARGET, "background flush worker started");
            loop {
                match stop_rx.recv_timeout(config.flush_interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        let mut state = state.lock().unwrap();
                        if state.sink.is_some()
                            && should_flush(&config, &buffer, state.last_flush)
                        {
                            // errors are recorded in the statistics and
                            // surfaced through the error callback
                            let _ = flush_locked(&config, &mut state, &buffer, &stats, &callbacks);
                        }
                    }
                }
            }
            info!(target: LOG_TARGET, "background flush worker stopped");
        });
        self.background = Some(BackgroundFlush { stop_tx, handle });
    }

    /// Stop the background worker: signal, then join.
    pub fn stop_background_flush(&mut self) {
        if let Some(background) = self.background.take() {
            let _ = background.stop_tx.send(());
            let _ = background.handle.join();
        }
    }

    pub fn is_background_flush_running(&self) -> bool {
        self.background.is_some()
    }

    /* ------------------------------------------------------------------
    static utilities
    ------------------------------------------------------------------ */
    /// See [`row::needs_quoting`].
    pub fn needs_quoting(field: &str, config: &WriterConfig) -> bool {
        row::needs_quoting(field, config)
    }

    /// See [`row::escape_field`].
    pub fn escape_field(field: &str, config: &WriterConfig) -> String {
        row::escape_field(field, config)
    }

    /// Copy an existing file to `path + suffix`; missing files are fine.
    pub fn create_backup_file(path: &str, suffix: &str) -> Result<(), WriterError> {
        if !Path::new(path).exists() {
            return Ok(());
        }
        fs::copy(path, format!("{path}{suffix}"))?;
        Ok(())
    }

    pub fn is_valid_filename(path: &str) -> bool {
        !path.is_empty() && !path.chars().any(|c| INVALID_FILENAME_CHARS.contains(c))
    }

    /// Rough size estimate after compression, for capacity planning.
    pub fn estimate_compressed_size(original: usize, compression: Compression) -> usize {
        match compression {
            Compression::Gzip | Compression::Zlib => original * 3 / 10,
            Compression::None | Compression::Auto => original,
        }
    }

    /// Durable write: emit to `path + temp_file_suffix`, then rename over
    /// `path`. On failure the temporary file is removed best-effort.
    pub fn atomic_file_write(&self, path: &str, data: &[u8]) -> Result<(), WriterError> {
        let temp_path = format!("{path}{}", self.config.temp_file_suffix);
        let write_temp = || -> Result<(), WriterError> {
            let mut file = File::create(&temp_path)?;
            file.write_all(data)?;
            file.flush()?;
            Ok(())
        };
        if let Err(e) = retry_operation(&self.config, write_temp) {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp_path, path) {
            let _ = fs::remove_file(&temp_path);
            return Err(WriterError::Io(e));
        }
        Ok(())
    }

    /* ------------------------------------------------------------------
    error reporting
    ------------------------------------------------------------------ */
    fn report_error(&self, kind: WriterErrorKind, message: &str) {
        report_error(&self.stats, &self.callbacks, kind, message);
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        self.stop_background_flush();
        let _ = self.close_file();
    }
}

/* ------------------------------------------------------------------
flush machinery, shared with the background worker
------------------------------------------------------------------ */
/// True when the trigger policy says the buffer should be written out.
fn should_flush(config: &WriterConfig, buffer: &Mutex<RowBuffer>, last_flush: Instant) -> bool {
    let (rows, bytes) = {
        let buffer = buffer.lock().unwrap();
        (buffer.lines.len(), buffer.bytes)
    };
    if rows == 0 {
        return false;
    }
    match config.trigger {
        FlushTrigger::Manual => false,
        FlushTrigger::RowCount => rows >= config.flush_row_threshold,
        FlushTrigger::BufferBytes => bytes >= config.flush_byte_threshold,
        FlushTrigger::TimeInterval => last_flush.elapsed() >= config.flush_interval,
        FlushTrigger::Mixed => {
            rows >= config.flush_row_threshold
                || bytes >= config.flush_byte_threshold
                || last_flush.elapsed() >= config.flush_interval
        }
    }
}

/// Flush with the writer mutex already held. A flush of an empty buffer
/// is a successful no-op, so back-to-back flushes are idempotent.
fn flush_locked(
    config: &WriterConfig,
    state: &mut WriterState,
    buffer: &Mutex<RowBuffer>,
    stats: &Arc<WriterStats>,
    callbacks: &Arc<Mutex<CallbackSet>>,
) -> Result<(), WriterError> {
    let sink = match state.sink.as_mut() {
        Some(sink) => sink,
        None => return Ok(()),
    };
    let flush_start = Instant::now();
    let (lines, drained_bytes) = {
        let mut buffer = buffer.lock().unwrap();
        if buffer.lines.is_empty() {
            return Ok(());
        }
        let bytes = buffer.bytes;
        buffer.bytes = 0;
        (std::mem::take(&mut buffer.lines), bytes)
    };
    let utilization = drained_bytes as f64 / config.buffer_byte_budget as f64;

    let mut payload = String::with_capacity(drained_bytes);
    for line in &lines {
        payload.push_str(line);
        payload.push_str(&config.line_ending);
    }
    let plaintext_len = payload.len() as u64;

    let data = match state.compression {
        Compression::Gzip | Compression::Zlib => {
            let compress_start = Instant::now();
            let compressed =
                compress_payload(payload.as_bytes(), state.compression, config.compression_level)
                    .map_err(|e| {
                        report_error(stats, callbacks, WriterErrorKind::Compression, &e.to_string());
                        e
                    })?;
            stats.record_compression_time(compress_start.elapsed());
            stats.add_bytes_compressed(plaintext_len, compressed.len() as u64);
            compressed
        }
        Compression::None | Compression::Auto => payload.into_bytes(),
    };

    let write_result = retry_operation(config, || {
        sink.write_all(&data).map_err(|e| WriterError::Write(e.to_string()))?;
        sink.flush().map_err(|e| WriterError::Write(e.to_string()))
    });
    if let Err(e) = write_result {
        report_error(stats, callbacks, WriterErrorKind::Write, &e.to_string());
        return Err(e);
    }

    stats.increment_flush_count();
    stats.add_bytes_written(plaintext_len);
    stats.record_flush_time(flush_start.elapsed());
    stats.record_buffer_utilization(utilization);
    state.last_flush = Instant::now();

    let snapshot = stats.snapshot();
    let callbacks = callbacks.lock().unwrap();
    if let Some(callback) = &callbacks.flush {
        callback(snapshot.rows_written, snapshot.bytes_written);
    }
    if let Some(callback) = &callbacks.progress {
        callback(snapshot.rows_written, utilization * 100.0);
    }
    Ok(())
}

/// Compress one flush payload with the configured deflate framing.
fn compress_payload(
    data: &[u8],
    compression: Compression,
    level: u32,
) -> Result<Vec<u8>, WriterError> {
    let level = flate2::Compression::new(level);
    let finish = |result: io::Result<Vec<u8>>| {
        result.map_err(|e| WriterError::Compression(e.to_string()))
    };
    match compression {
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), level);
            encoder
                .write_all(data)
                .map_err(|e| WriterError::Compression(e.to_string()))?;
            finish(encoder.finish())
        }
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), level);
            encoder
                .write_all(data)
                .map_err(|e| WriterError::Compression(e.to_string()))?;
            finish(encoder.finish())
        }
        Compression::None | Compression::Auto => Ok(data.to_vec()),
    }
}

/// Run an operation up to `max_retry_attempts` times, sleeping
/// `retry_delay * 2^attempt` between attempts.
fn retry_operation<T>(
    config: &WriterConfig,
    mut operation: impl FnMut() -> Result<T, WriterError>,
) -> Result<T, WriterError> {
    let mut last_error = None;
    for attempt in 0..config.max_retry_attempts {
        if attempt > 0 {
            thread::sleep(config.retry_delay * (1 << (attempt - 1)));
        }
        match operation() {
            Ok(value) => return Ok(value),
            Err(e) => last_error = Some(e),
        }
    }
    Err(last_error.expect("at least one attempt"))
}

fn report_error(
    stats: &Arc<WriterStats>,
    callbacks: &Arc<Mutex<CallbackSet>>,
    kind: WriterErrorKind,
    message: &str,
) {
    error!(target: LOG_TARGET, "{message}");
    stats.record_error(kind, message);
    if let Some(callback) = &callbacks.lock().unwrap().error {
        callback(kind, message);
    }
}

impl RowBuffer {
    fn clear(&mut self) {
        self.lines.clear();
        self.bytes = 0;
    }
}
