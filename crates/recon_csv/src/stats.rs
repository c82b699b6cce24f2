//! Thread-safe statistics registers.
//!
//! Counters are atomics so ingestion never blocks on bookkeeping; the
//! per-error-kind histograms and error logs sit behind a mutex of their
//! own. A register is never handed out directly: `snapshot()` copies the
//! current values into a plain struct, so readers get a coherent view
//! without stopping ingestion.

// dependencies
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use num_format::{Locale, ToFormattedString};
use crate::error::{DeltaErrorKind, MergeErrorKind, WriterErrorKind};

// buffer utilization samples are accumulated in millionths so the sum
// can live in an atomic alongside the counters
const UTILIZATION_SCALE: f64 = 1_000_000.0;

/* ------------------------------------------------------------------
writer statistics
------------------------------------------------------------------ */
/// Statistics register owned by a [`crate::BatchWriter`].
#[derive(Default)]
pub struct WriterStats {
    rows_written:     AtomicU64,
    rows_skipped:     AtomicU64,
    rows_with_errors: AtomicU64,
    flush_count:      AtomicU64,
    bytes_written:    AtomicU64,
    bytes_original:   AtomicU64,
    bytes_compressed: AtomicU64,
    utilization_sum:     AtomicU64, // millionths
    utilization_samples: AtomicU64,
    timing: Mutex<WriterTiming>,
    errors: Mutex<ErrorTracking<WriterErrorKind>>,
}

#[derive(Default)]
struct WriterTiming {
    started:           Option<Instant>,
    writing:           Duration,
    total_flush:       Duration,
    total_compression: Duration,
}

struct ErrorTracking<K> {
    counts:   HashMap<K, u64>,
    messages: Vec<String>,
}

impl<K> Default for ErrorTracking<K> {
    fn default() -> Self {
        ErrorTracking {
            counts:   HashMap::new(),
            messages: Vec::new(),
        }
    }
}

impl WriterStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all counters, timings, and error history.
    pub fn reset(&self) {
        self.rows_written.store(0, Ordering::Relaxed);
        self.rows_skipped.store(0, Ordering::Relaxed);
        self.rows_with_errors.store(0, Ordering::Relaxed);
        self.flush_count.store(0, Ordering::Relaxed);
        self.bytes_written.store(0, Ordering::Relaxed);
        self.bytes_original.store(0, Ordering::Relaxed);
        self.bytes_compressed.store(0, Ordering::Relaxed);
        self.utilization_sum.store(0, Ordering::Relaxed);
        self.utilization_samples.store(0, Ordering::Relaxed);
        *self.timing.lock().unwrap() = WriterTiming::default();
        let mut errors = self.errors.lock().unwrap();
        errors.counts.clear();
        errors.messages.clear();
    }

    /* ------------------------------------------------------------------
    timing bracket
    ------------------------------------------------------------------ */
    pub fn start_timing(&self) {
        let mut timing = self.timing.lock().unwrap();
        timing.started = Some(Instant::now());
    }

    pub fn stop_timing(&self) {
        let mut timing = self.timing.lock().unwrap();
        if let Some(started) = timing.started.take() {
            timing.writing += started.elapsed();
        }
    }

    pub fn record_flush_time(&self, elapsed: Duration) {
        self.timing.lock().unwrap().total_flush += elapsed;
    }

    pub fn record_compression_time(&self, elapsed: Duration) {
        self.timing.lock().unwrap().total_compression += elapsed;
    }

    /* ------------------------------------------------------------------
    counter updates
    ------------------------------------------------------------------ */
    pub fn increment_rows_written(&self) {
        self.rows_written.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_rows_skipped(&self) {
        self.rows_skipped.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_rows_with_errors(&self) {
        self.rows_with_errors.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_flush_count(&self) {
        self.flush_count.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_bytes_written(&self, bytes: u64) {
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }
    pub fn add_bytes_compressed(&self, original: u64, compressed: u64) {
        self.bytes_original.fetch_add(original, Ordering::Relaxed);
        self.bytes_compressed.fetch_add(compressed, Ordering::Relaxed);
    }
    pub fn record_buffer_utilization(&self, utilization: f64) {
        let scaled = (utilization.max(0.0) * UTILIZATION_SCALE) as u64;
        self.utilization_sum.fetch_add(scaled, Ordering::Relaxed);
        self.utilization_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Tally an error by kind and keep its message in the error log.
    pub fn record_error(&self, kind: WriterErrorKind, message: &str) {
        let mut errors = self.errors.lock().unwrap();
        *errors.counts.entry(kind).or_insert(0) += 1;
        errors.messages.push(message.to_string());
    }

    /// Copy current values into a plain snapshot.
    pub fn snapshot(&self) -> WriterStatsSnapshot {
        let timing = self.timing.lock().unwrap();
        let writing = match timing.started {
            Some(started) => timing.writing + started.elapsed(),
            None => timing.writing,
        };
        let errors = self.errors.lock().unwrap();
        WriterStatsSnapshot {
            rows_written:     self.rows_written.load(Ordering::Relaxed),
            rows_skipped:     self.rows_skipped.load(Ordering::Relaxed),
            rows_with_errors: self.rows_with_errors.load(Ordering::Relaxed),
            flush_count:      self.flush_count.load(Ordering::Relaxed),
            bytes_written:    self.bytes_written.load(Ordering::Relaxed),
            bytes_original:   self.bytes_original.load(Ordering::Relaxed),
            bytes_compressed: self.bytes_compressed.load(Ordering::Relaxed),
            utilization_sum: self.utilization_sum.load(Ordering::Relaxed) as f64
                / UTILIZATION_SCALE,
            utilization_samples: self.utilization_samples.load(Ordering::Relaxed),
            writing_duration:       writing,
            total_flush_time:       timing.total_flush,
            total_compression_time: timing.total_compression,
            error_counts:   errors.counts.clone(),
            error_messages: errors.messages.clone(),
        }
    }
}

/// Plain copy of a [`WriterStats`] register at one point in time.
#[derive(Debug, Clone, Default)]
pub struct WriterStatsSnapshot {
    pub rows_written:     u64,
    pub rows_skipped:     u64,
    pub rows_with_errors: u64,
    pub flush_count:      u64,
    pub bytes_written:    u64,
    pub bytes_original:   u64,
    pub bytes_compressed: u64,
    pub utilization_sum:     f64,
    pub utilization_samples: u64,
    pub writing_duration:       Duration,
    pub total_flush_time:       Duration,
    pub total_compression_time: Duration,
    pub error_counts:   HashMap<WriterErrorKind, u64>,
    pub error_messages: Vec<String>,
}

impl WriterStatsSnapshot {
    pub fn rows_per_second(&self) -> f64 {
        per_second(self.rows_written, self.writing_duration)
    }

    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.bytes_written, self.writing_duration)
    }

    /// Compression ratio as original bytes over compressed bytes;
    /// 0.0 when nothing was compressed.
    pub fn compression_ratio(&self) -> f64 {
        if self.bytes_compressed == 0 {
            return 0.0;
        }
        self.bytes_original as f64 / self.bytes_compressed as f64
    }

    pub fn average_buffer_utilization(&self) -> f64 {
        if self.utilization_samples == 0 {
            return 0.0;
        }
        self.utilization_sum / self.utilization_samples as f64
    }

    pub fn average_flush_time(&self) -> Duration {
        average(self.total_flush_time, self.flush_count)
    }

    pub fn average_compression_time(&self) -> Duration {
        average(self.total_compression_time, self.flush_count)
    }

    /// Human-readable multi-line report.
    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== batch writer statistics ===\n");
        report.push_str(&format!(
            "writing duration: {:.3}s\n",
            self.writing_duration.as_secs_f64()
        ));
        report.push_str(&format!(
            "rows: {} written, {} skipped, {} with errors\n",
            fmt_count(self.rows_written),
            fmt_count(self.rows_skipped),
            fmt_count(self.rows_with_errors),
        ));
        report.push_str(&format!(
            "throughput: {:.0} rows/s, {:.0} bytes/s\n",
            self.rows_per_second(),
            self.bytes_per_second()
        ));
        report.push_str(&format!(
            "flushes: {} (avg {:.4}s), avg buffer utilization {:.1}%\n",
            fmt_count(self.flush_count),
            self.average_flush_time().as_secs_f64(),
            self.average_buffer_utilization() * 100.0
        ));
        if self.bytes_compressed > 0 {
            report.push_str(&format!(
                "compression: {} -> {} bytes (ratio {:.2}, avg {:.4}s)\n",
                fmt_count(self.bytes_original),
                fmt_count(self.bytes_compressed),
                self.compression_ratio(),
                self.average_compression_time().as_secs_f64()
            ));
        }
        if !self.error_counts.is_empty() {
            report.push_str("errors:\n");
            let mut kinds: Vec<_> = self.error_counts.iter().collect();
            kinds.sort_by_key(|(kind, _)| format!("{kind:?}"));
            for (kind, count) in kinds {
                report.push_str(&format!("  {:?}: {}\n", kind, fmt_count(*count)));
            }
        }
        report
    }
}

/* ------------------------------------------------------------------
merge statistics
------------------------------------------------------------------ */
/// Statistics register owned by a [`crate::MergerEngine`].
#[derive(Default)]
pub struct MergeStats {
    rows_processed:     AtomicU64,
    rows_output:        AtomicU64,
    duplicates_removed: AtomicU64,
    conflicts_resolved: AtomicU64,
    files_processed:    AtomicU64,
    bytes_processed:    AtomicU64,
    schema_adjustments: AtomicU64,
    type_inconsistencies: AtomicU64,
    timing: Mutex<MergeTiming>,
    errors: Mutex<ErrorTracking<MergeErrorKind>>,
}

#[derive(Default)]
struct MergeTiming {
    started:  Option<Instant>,
    total:    Duration,
    phases:   HashMap<String, Duration>,
}

impl MergeStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.rows_processed.store(0, Ordering::Relaxed);
        self.rows_output.store(0, Ordering::Relaxed);
        self.duplicates_removed.store(0, Ordering::Relaxed);
        self.conflicts_resolved.store(0, Ordering::Relaxed);
        self.files_processed.store(0, Ordering::Relaxed);
        self.bytes_processed.store(0, Ordering::Relaxed);
        self.schema_adjustments.store(0, Ordering::Relaxed);
        self.type_inconsistencies.store(0, Ordering::Relaxed);
        *self.timing.lock().unwrap() = MergeTiming::default();
        let mut errors = self.errors.lock().unwrap();
        errors.counts.clear();
        errors.messages.clear();
    }

    pub fn start_timing(&self) {
        self.timing.lock().unwrap().started = Some(Instant::now());
    }

    pub fn stop_timing(&self) {
        let mut timing = self.timing.lock().unwrap();
        if let Some(started) = timing.started.take() {
            timing.total += started.elapsed();
        }
    }

    pub fn record_phase_time(&self, phase: &str, elapsed: Duration) {
        let mut timing = self.timing.lock().unwrap();
        *timing.phases.entry(phase.to_string()).or_default() += elapsed;
    }

    pub fn add_rows_processed(&self, count: u64) {
        self.rows_processed.fetch_add(count, Ordering::Relaxed);
    }
    pub fn add_rows_output(&self, count: u64) {
        self.rows_output.fetch_add(count, Ordering::Relaxed);
    }
    pub fn increment_duplicates_removed(&self) {
        self.duplicates_removed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_conflicts_resolved(&self) {
        self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_files_processed(&self) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
    }
    pub fn add_bytes_processed(&self, bytes: u64) {
        self.bytes_processed.fetch_add(bytes, Ordering::Relaxed);
    }
    pub fn increment_schema_adjustments(&self) {
        self.schema_adjustments.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_type_inconsistencies(&self) {
        self.type_inconsistencies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: MergeErrorKind, message: &str) {
        let mut errors = self.errors.lock().unwrap();
        *errors.counts.entry(kind).or_insert(0) += 1;
        errors.messages.push(message.to_string());
    }

    pub fn snapshot(&self) -> MergeStatsSnapshot {
        let timing = self.timing.lock().unwrap();
        let total = match timing.started {
            Some(started) => timing.total + started.elapsed(),
            None => timing.total,
        };
        let errors = self.errors.lock().unwrap();
        MergeStatsSnapshot {
            rows_processed:     self.rows_processed.load(Ordering::Relaxed),
            rows_output:        self.rows_output.load(Ordering::Relaxed),
            duplicates_removed: self.duplicates_removed.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            files_processed:    self.files_processed.load(Ordering::Relaxed),
            bytes_processed:    self.bytes_processed.load(Ordering::Relaxed),
            schema_adjustments: self.schema_adjustments.load(Ordering::Relaxed),
            type_inconsistencies: self.type_inconsistencies.load(Ordering::Relaxed),
            total_duration: total,
            phase_timings:  timing.phases.clone(),
            error_counts:   errors.counts.clone(),
            error_messages: errors.messages.clone(),
        }
    }
}

/// Plain copy of a [`MergeStats`] register at one point in time.
#[derive(Debug, Clone, Default)]
pub struct MergeStatsSnapshot {
    pub rows_processed:     u64,
    pub rows_output:        u64,
    pub duplicates_removed: u64,
    pub conflicts_resolved: u64,
    pub files_processed:    u64,
    pub bytes_processed:    u64,
    pub schema_adjustments: u64,
    pub type_inconsistencies: u64,
    pub total_duration: Duration,
    pub phase_timings:  HashMap<String, Duration>,
    pub error_counts:   HashMap<MergeErrorKind, u64>,
    pub error_messages: Vec<String>,
}

impl MergeStatsSnapshot {
    pub fn rows_per_second(&self) -> f64 {
        per_second(self.rows_processed, self.total_duration)
    }

    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.bytes_processed, self.total_duration)
    }

    /// Fraction of processed rows removed as duplicates.
    pub fn deduplication_ratio(&self) -> f64 {
        if self.rows_processed == 0 {
            return 0.0;
        }
        self.duplicates_removed as f64 / self.rows_processed as f64
    }

    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== merger engine statistics ===\n");
        report.push_str(&format!(
            "duration: {:.3}s, {} files\n",
            self.total_duration.as_secs_f64(),
            fmt_count(self.files_processed)
        ));
        report.push_str(&format!(
            "rows: {} processed, {} output, {} duplicates removed, {} conflicts resolved\n",
            fmt_count(self.rows_processed),
            fmt_count(self.rows_output),
            fmt_count(self.duplicates_removed),
            fmt_count(self.conflicts_resolved),
        ));
        report.push_str(&format!(
            "throughput: {:.0} rows/s, dedup ratio {:.1}%\n",
            self.rows_per_second(),
            self.deduplication_ratio() * 100.0
        ));
        if self.schema_adjustments > 0 || self.type_inconsistencies > 0 {
            report.push_str(&format!(
                "schema: {} rows padded, {} column type inconsistencies\n",
                fmt_count(self.schema_adjustments),
                fmt_count(self.type_inconsistencies)
            ));
        }
        if !self.phase_timings.is_empty() {
            report.push_str("phases:\n");
            let mut phases: Vec<_> = self.phase_timings.iter().collect();
            phases.sort_by(|a, b| a.0.cmp(b.0));
            for (phase, elapsed) in phases {
                report.push_str(&format!("  {}: {:.4}s\n", phase, elapsed.as_secs_f64()));
            }
        }
        if !self.error_counts.is_empty() {
            report.push_str("errors:\n");
            let mut kinds: Vec<_> = self.error_counts.iter().collect();
            kinds.sort_by_key(|(kind, _)| format!("{kind:?}"));
            for (kind, count) in kinds {
                report.push_str(&format!("  {:?}: {}\n", kind, fmt_count(*count)));
            }
        }
        report
    }
}

/* ------------------------------------------------------------------
delta statistics
------------------------------------------------------------------ */
/// Statistics register shared by delta compression and decompression.
#[derive(Default)]
pub struct DeltaStats {
    records_processed: AtomicU64,
    changes_detected:  AtomicU64,
    inserts:           AtomicU64,
    updates:           AtomicU64,
    deletes:           AtomicU64,
    moves:             AtomicU64,
    original_size:     AtomicU64,
    compressed_size:   AtomicU64,
    processing_millis: AtomicU64,
    errors: Mutex<ErrorTracking<DeltaErrorKind>>,
}

impl DeltaStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&self) {
        self.records_processed.store(0, Ordering::Relaxed);
        self.changes_detected.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
        self.updates.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.moves.store(0, Ordering::Relaxed);
        self.original_size.store(0, Ordering::Relaxed);
        self.compressed_size.store(0, Ordering::Relaxed);
        self.processing_millis.store(0, Ordering::Relaxed);
        let mut errors = self.errors.lock().unwrap();
        errors.counts.clear();
        errors.messages.clear();
    }

    pub fn add_records_processed(&self, count: u64) {
        self.records_processed.fetch_add(count, Ordering::Relaxed);
    }
    pub fn add_changes_detected(&self, count: u64) {
        self.changes_detected.fetch_add(count, Ordering::Relaxed);
    }
    pub fn increment_inserts(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_updates(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_deletes(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }
    pub fn increment_moves(&self) {
        self.moves.fetch_add(1, Ordering::Relaxed);
    }
    pub fn set_original_size(&self, bytes: u64) {
        self.original_size.store(bytes, Ordering::Relaxed);
    }
    pub fn set_compressed_size(&self, bytes: u64) {
        self.compressed_size.store(bytes, Ordering::Relaxed);
    }
    pub fn set_processing_time(&self, elapsed: Duration) {
        self.processing_millis
            .store(elapsed.as_millis() as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self, kind: DeltaErrorKind, message: &str) {
        let mut errors = self.errors.lock().unwrap();
        *errors.counts.entry(kind).or_insert(0) += 1;
        errors.messages.push(message.to_string());
    }

    pub fn snapshot(&self) -> DeltaStatsSnapshot {
        let errors = self.errors.lock().unwrap();
        DeltaStatsSnapshot {
            records_processed: self.records_processed.load(Ordering::Relaxed),
            changes_detected:  self.changes_detected.load(Ordering::Relaxed),
            inserts:           self.inserts.load(Ordering::Relaxed),
            updates:           self.updates.load(Ordering::Relaxed),
            deletes:           self.deletes.load(Ordering::Relaxed),
            moves:             self.moves.load(Ordering::Relaxed),
            original_size:     self.original_size.load(Ordering::Relaxed),
            compressed_size:   self.compressed_size.load(Ordering::Relaxed),
            processing_time: Duration::from_millis(self.processing_millis.load(Ordering::Relaxed)),
            error_counts:   errors.counts.clone(),
            error_messages: errors.messages.clone(),
        }
    }
}

/// Plain copy of a [`DeltaStats`] register at one point in time.
#[derive(Debug, Clone, Default)]
pub struct DeltaStatsSnapshot {
    pub records_processed: u64,
    pub changes_detected:  u64,
    pub inserts:           u64,
    pub updates:           u64,
    pub deletes:           u64,
    pub moves:             u64,
    pub original_size:     u64,
    pub compressed_size:   u64,
    pub processing_time:   Duration,
    pub error_counts:   HashMap<DeltaErrorKind, u64>,
    pub error_messages: Vec<String>,
}

impl DeltaStatsSnapshot {
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            return 0.0;
        }
        self.original_size as f64 / self.compressed_size as f64
    }

    pub fn report(&self) -> String {
        let mut report = String::new();
        report.push_str("=== delta compression statistics ===\n");
        report.push_str(&format!(
            "records: {} processed, {} changes ({} insert / {} update / {} delete / {} move)\n",
            fmt_count(self.records_processed),
            fmt_count(self.changes_detected),
            fmt_count(self.inserts),
            fmt_count(self.updates),
            fmt_count(self.deletes),
            fmt_count(self.moves),
        ));
        report.push_str(&format!(
            "size: {} -> {} bytes (ratio {:.2}), {}ms\n",
            fmt_count(self.original_size),
            fmt_count(self.compressed_size),
            self.compression_ratio(),
            self.processing_time.as_millis()
        ));
        if !self.error_counts.is_empty() {
            report.push_str("errors:\n");
            let mut kinds: Vec<_> = self.error_counts.iter().collect();
            kinds.sort_by_key(|(kind, _)| format!("{kind:?}"));
            for (kind, count) in kinds {
                report.push_str(&format!("  {:?}: {}\n", kind, fmt_count(*count)));
            }
        }
        report
    }
}

/* ------------------------------------------------------------------
shared helpers
------------------------------------------------------------------ */
fn per_second(count: u64, duration: Duration) -> f64 {
    let seconds = duration.as_secs_f64();
    if seconds <= 0.0 {
        return 0.0;
    }
    count as f64 / seconds
}

fn average(total: Duration, count: u64) -> Duration {
    if count == 0 {
        return Duration::ZERO;
    }
    total / count as u32
}

fn fmt_count(count: u64) -> String {
    count.to_formatted_string(&Locale::en)
}
