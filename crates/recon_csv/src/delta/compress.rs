//! Delta artifact I/O and reconstruction.
//!
//! Artifact layout: the text header (`KEY=value` lines terminated by
//! `END_HEADER`), then a little-endian u64 payload length, then that
//! many bytes of encoded record stream. The hybrid scheme's one-byte
//! algorithm tag lives inside the payload.

// dependencies
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::time::Instant;
use log::{error, info};
use crate::delta::codec::{decode_records, encode_records, serialize_records};
use crate::delta::detect::{load_csv_rows, row_key, ChangeDetector};
use crate::delta::record::HEADER_END;
use crate::delta::{DeltaConfig, DeltaHeader, DeltaOperation, DeltaRecord, DetectionMode};
use crate::error::DeltaError;
use crate::row::Row;
use crate::stats::{DeltaStats, DeltaStatsSnapshot};

// constants
const LOG_TARGET: &str = "delta_compression";

/// Creates delta artifacts from snapshot pairs or precomputed records.
pub struct DeltaCompressor {
    config:   DeltaConfig,
    detector: ChangeDetector,
    stats:    DeltaStats,
}

impl DeltaCompressor {
    pub fn new(config: DeltaConfig) -> Result<Self, DeltaError> {
        config.validate()?;
        Ok(DeltaCompressor {
            detector: ChangeDetector::new(config.clone()),
            config,
            stats: DeltaStats::new(),
        })
    }

    pub fn config(&self) -> &DeltaConfig {
        &self.config
    }

    pub fn statistics(&self) -> DeltaStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /// Detect changes between two snapshot files and write the delta
    /// artifact. Returns the header as written.
    pub fn compress(
        &self,
        old_path: &str,
        new_path: &str,
        delta_path: &str,
    ) -> Result<DeltaHeader, DeltaError> {
        let started = Instant::now();
        info!(target: LOG_TARGET, "computing delta {old_path} -> {new_path}");
        let (_, changes) = self
            .detector
            .detect_changes_from_files(old_path, new_path)
            .map_err(|e| {
                self.record_error(&e);
                e
            })?;

        let mut header = DeltaHeader {
            source_file:    old_path.to_string(),
            target_file:    new_path.to_string(),
            algorithm:      self.config.algorithm,
            detection_mode: self.config.detection_mode,
            key_columns:    self.config.key_columns.clone(),
            ..DeltaHeader::default()
        };
        self.compress_records(&changes, delta_path, &mut header)?;

        self.stats.add_records_processed(changes.len() as u64);
        self.stats.add_changes_detected(changes.len() as u64);
        for change in &changes {
            match change.operation {
                DeltaOperation::Insert => self.stats.increment_inserts(),
                DeltaOperation::Delete => self.stats.increment_deletes(),
                DeltaOperation::Update => self.stats.increment_updates(),
                DeltaOperation::Move => self.stats.increment_moves(),
            }
        }
        let original = file_size(old_path) + file_size(new_path);
        self.stats.set_original_size(original);
        self.stats.set_compressed_size(file_size(delta_path));
        self.stats.set_processing_time(started.elapsed());
        info!(
            target: LOG_TARGET,
            "delta written to {delta_path}: {} changes",
            changes.len()
        );
        Ok(header)
    }

    /// Encode precomputed records and write the artifact. The header's
    /// change count and compression ratio are filled in here.
    pub fn compress_records(
        &self,
        records: &[DeltaRecord],
        delta_path: &str,
        header: &mut DeltaHeader,
    ) -> Result<(), DeltaError> {
        let canonical_len = serialize_records(records)?.len();
        let payload = encode_records(
            records,
            header.algorithm,
            self.config.enable_run_length_encoding,
        )
        .map_err(|e| {
            self.record_error(&e);
            e
        })?;
        header.total_changes = records.len() as u64;
        header.compression_ratio = if payload.is_empty() {
            0
        } else {
            (canonical_len as u64 * 100) / payload.len() as u64
        };

        let file = File::create(delta_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(header.serialize().as_bytes())?;
        writer.write_all(&(payload.len() as u64).to_le_bytes())?;
        writer.write_all(&payload)?;
        writer.flush()?;
        Ok(())
    }

    fn record_error(&self, error: &DeltaError) {
        error!(target: LOG_TARGET, "{error}");
        self.stats.record_error(error.kind(), &error.to_string());
    }
}

/// Reads delta artifacts and reconstructs snapshots from them.
pub struct DeltaDecompressor {
    config: DeltaConfig,
    stats:  DeltaStats,
}

impl DeltaDecompressor {
    pub fn new(config: DeltaConfig) -> Result<Self, DeltaError> {
        config.validate()?;
        Ok(DeltaDecompressor {
            config,
            stats: DeltaStats::new(),
        })
    }

    pub fn statistics(&self) -> DeltaStatsSnapshot {
        self.stats.snapshot()
    }

    /// Parse a delta artifact into its header and record stream.
    pub fn read_records(
        &self,
        delta_path: &str,
    ) -> Result<(DeltaHeader, Vec<DeltaRecord>), DeltaError> {
        let bytes = fs::read(delta_path)
            .map_err(|_| DeltaError::FileNotFound(delta_path.to_string()))?;
        let terminator = format!("{HEADER_END}\n");
        let header_end = find_subsequence(&bytes, terminator.as_bytes()).ok_or_else(|| {
            DeltaError::InvalidFormat("delta artifact has no header terminator".to_string())
        })? + terminator.len();
        let header_text = std::str::from_utf8(&bytes[..header_end])
            .map_err(|_| DeltaError::InvalidFormat("delta header is not UTF-8".to_string()))?;
        let header = DeltaHeader::deserialize(header_text).map_err(|e| {
            self.record_error(&e);
            e
        })?;

        let rest = &bytes[header_end..];
        if rest.len() < 8 {
            return Err(DeltaError::InvalidFormat(
                "delta artifact is missing its payload length".to_string(),
            ));
        }
        let payload_len =
            u64::from_le_bytes(rest[..8].try_into().expect("8-byte slice")) as usize;
        let payload = rest
            .get(8..8 + payload_len)
            .ok_or_else(|| DeltaError::InvalidFormat("delta payload is truncated".to_string()))?;
        let records = decode_records(payload, header.algorithm).map_err(|e| {
            self.record_error(&e);
            e
        })?;
        self.stats.add_records_processed(records.len() as u64);
        Ok((header, records))
    }

    /// True when the artifact parses and its version is supported.
    pub fn validate(&self, delta_path: &str) -> bool {
        self.read_records(delta_path).is_ok()
    }

    /// Recompute every record's content hash from its carried values
    /// and compare against the stored hash.
    pub fn verify_integrity(&self, records: &[DeltaRecord]) -> bool {
        records
            .iter()
            .all(|record| record.change_hash == record.expected_hash())
    }

    /// Apply a record stream to base rows, in record order. Deletes and
    /// updates locate their row by key under key-based detection and by
    /// position (with content fallback) otherwise.
    pub fn apply_delta(
        &self,
        base: &[Row],
        records: &[DeltaRecord],
        headers: &[String],
        mode: DetectionMode,
    ) -> Result<Vec<Row>, DeltaError> {
        let by_key = matches!(
            mode,
            DetectionMode::KeyBased | DetectionMode::TimestampBased
        );
        let mut data: Vec<Row> = base.to_vec();
        for record in records {
            match record.operation {
                DeltaOperation::Insert => {
                    let at = record.row_index.min(data.len());
                    data.insert(at, record.new_values.clone());
                }
                DeltaOperation::Delete => {
                    let position = if by_key {
                        self.find_by_key(&data, &record.old_values, headers)
                    } else {
                        find_positional(&data, record.row_index, &record.old_values)
                    };
                    if let Some(index) = position {
                        data.remove(index);
                    }
                }
                DeltaOperation::Update => {
                    let position = if by_key {
                        self.find_by_key(&data, &record.old_values, headers)
                    } else {
                        find_positional(&data, record.row_index, &record.old_values)
                    };
                    if let Some(index) = position {
                        data[index] = record.new_values.clone();
                    }
                }
                DeltaOperation::Move => {
                    if let Some(index) =
                        find_positional(&data, record.row_index, &record.new_values)
                    {
                        let row = data.remove(index);
                        let target = record.move_target().unwrap_or(data.len());
                        data.insert(target.min(data.len()), row);
                    }
                }
            }
        }
        Ok(data)
    }

    /// Reconstruct the target snapshot: base file + delta -> output
    /// file. The base file's header row is preserved.
    pub fn decompress(
        &self,
        delta_path: &str,
        base_path: &str,
        output_path: &str,
    ) -> Result<(), DeltaError> {
        let started = Instant::now();
        let (header, records) = self.read_records(delta_path)?;
        if self.config.validate_integrity && !self.verify_integrity(&records) {
            let e = DeltaError::DecompressionFailed(
                "delta records fail their content hash check".to_string(),
            );
            self.record_error(&e);
            return Err(e);
        }
        let base = load_csv_rows(base_path)?;
        if base.is_empty() {
            return Err(DeltaError::InvalidFormat(
                "base snapshot needs at least a header row".to_string(),
            ));
        }
        let headers = base[0].clone();
        let result = self.apply_delta(&base[1..], &records, &headers, header.detection_mode)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(output_path)
            .map_err(|e| DeltaError::InvalidFormat(format!("cannot write {output_path}: {e}")))?;
        writer
            .write_record(&headers)
            .map_err(|e| DeltaError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        for row in &result {
            writer
                .write_record(row)
                .map_err(|e| DeltaError::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())))?;
        }
        writer
            .flush()
            .map_err(DeltaError::Io)?;
        self.stats.add_changes_detected(records.len() as u64);
        self.stats.set_processing_time(started.elapsed());
        info!(
            target: LOG_TARGET,
            "reconstructed {output_path} from {base_path} with {} changes",
            records.len()
        );
        Ok(())
    }

    fn find_by_key(&self, data: &[Row], expected: &[String], headers: &[String]) -> Option<usize> {
        let key = row_key(&self.config, expected, headers);
        data.iter()
            .position(|row| row_key(&self.config, row, headers) == key)
    }

    fn record_error(&self, error: &DeltaError) {
        error!(target: LOG_TARGET, "{error}");
        self.stats.record_error(error.kind(), &error.to_string());
    }
}

/* ------------------------------------------------------------------
helpers
------------------------------------------------------------------ */
/// Locate a row by index when the content still matches, falling back
/// to a content scan when indices have shifted. With duplicate rows the
/// occurrence nearest the recorded index is the one that moved there,
/// so ties resolve by distance, then toward the later position.
fn find_positional(data: &[Row], index: usize, expected: &[String]) -> Option<usize> {
    if index < data.len() && (expected.is_empty() || data[index] == expected) {
        return Some(index);
    }
    if expected.is_empty() {
        return None;
    }
    let mut best: Option<usize> = None;
    for (position, row) in data.iter().enumerate() {
        if row != expected {
            continue;
        }
        let better = match best {
            None => true,
            Some(current) => {
                let current_distance = current.abs_diff(index);
                let distance = position.abs_diff(index);
                distance < current_distance
                    || (distance == current_distance && position > current)
            }
        };
        if better {
            best = Some(position);
        }
    }
    best
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn file_size(path: &str) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
