//! Change detection between two row sets.
//!
//! Each mode maps `(old, new)` into a stream of delta records. Output
//! order is deterministic: updates and deletes follow the scan order of
//! the data, never hash-map iteration order.

// dependencies
use std::collections::{HashMap, HashSet};
use std::path::Path;
use crate::delta::{DeltaConfig, DeltaRecord, DetectionMode};
use crate::error::DeltaError;
use crate::fingerprint::content_hash;
use crate::row::Row;
use crate::timestamp::parse_timestamp;

/// Computes the delta record stream between two snapshots.
pub struct ChangeDetector {
    config: DeltaConfig,
}

impl ChangeDetector {
    pub fn new(config: DeltaConfig) -> Self {
        ChangeDetector { config }
    }

    pub fn config(&self) -> &DeltaConfig {
        &self.config
    }

    /* ------------------------------------------------------------------
    entry points
    ------------------------------------------------------------------ */
    /// Detect changes under the configured mode.
    pub fn detect_changes(
        &self,
        old_data: &[Row],
        new_data: &[Row],
        headers: &[String],
    ) -> Vec<DeltaRecord> {
        match self.config.detection_mode {
            DetectionMode::ContentHash => self.detect_content_hash_changes(old_data, new_data),
            DetectionMode::FieldByField => {
                self.detect_field_changes(old_data, new_data, None)
            }
            DetectionMode::Semantic => {
                self.detect_field_changes(old_data, new_data, Some(self.config.similarity_threshold))
            }
            DetectionMode::KeyBased => {
                self.detect_key_based_changes(old_data, new_data, headers, false)
            }
            DetectionMode::TimestampBased => {
                self.detect_key_based_changes(old_data, new_data, headers, true)
            }
        }
    }

    /// Load both snapshots, drop the header row from each, and detect
    /// changes. Returns the header vector alongside the records.
    pub fn detect_changes_from_files(
        &self,
        old_path: &str,
        new_path: &str,
    ) -> Result<(Vec<String>, Vec<DeltaRecord>), DeltaError> {
        let old_data = load_csv_rows(old_path)?;
        let new_data = load_csv_rows(new_path)?;
        if old_data.is_empty() || new_data.is_empty() {
            return Err(DeltaError::InvalidFormat(
                "both snapshots need at least a header row".to_string(),
            ));
        }
        let headers = old_data[0].clone();
        let changes = self.detect_changes(&old_data[1..], &new_data[1..], &headers);
        Ok((headers, changes))
    }

    /* ------------------------------------------------------------------
    detection modes
    ------------------------------------------------------------------ */
    /// Rows are identified by their content hash; an update shows up as
    /// a delete plus an insert.
    fn detect_content_hash_changes(&self, old_data: &[Row], new_data: &[Row]) -> Vec<DeltaRecord> {
        let old_hashes: HashSet<String> = old_data.iter().map(|row| content_hash(row)).collect();
        let new_hashes: HashSet<String> = new_data.iter().map(|row| content_hash(row)).collect();

        let mut changes = Vec::new();
        for (index, row) in new_data.iter().enumerate() {
            if !old_hashes.contains(&content_hash(row)) {
                changes.push(DeltaRecord::insert(index, row.clone()));
            }
        }
        let mut deleted = HashSet::new();
        for (index, row) in old_data.iter().enumerate() {
            let hash = content_hash(row);
            if !new_hashes.contains(&hash) && deleted.insert(hash) {
                changes.push(DeltaRecord::delete(index, row.clone()));
            }
        }
        changes
    }

    /// Positional comparison. With a similarity gate (semantic mode),
    /// rows below the threshold are treated as unrelated and emitted as
    /// a delete plus an insert instead of an update.
    fn detect_field_changes(
        &self,
        old_data: &[Row],
        new_data: &[Row],
        similarity_gate: Option<f64>,
    ) -> Vec<DeltaRecord> {
        let mut changes = Vec::new();
        let shared = old_data.len().min(new_data.len());
        for index in 0..shared {
            let (old_row, new_row) = (&old_data[index], &new_data[index]);
            if old_row == new_row {
                continue;
            }
            let unrelated = similarity_gate
                .map(|threshold| row_similarity(old_row, new_row) < threshold)
                .unwrap_or(false);
            if unrelated {
                changes.push(DeltaRecord::delete(index, old_row.clone()));
                changes.push(DeltaRecord::insert(index, new_row.clone()));
            } else {
                let changed = find_changed_columns(old_row, new_row);
                changes.push(DeltaRecord::update(
                    index,
                    old_row.clone(),
                    new_row.clone(),
                    changed,
                ));
            }
        }
        for (index, row) in new_data.iter().enumerate().skip(shared) {
            changes.push(DeltaRecord::insert(index, row.clone()));
        }
        for (index, row) in old_data.iter().enumerate().skip(shared) {
            changes.push(DeltaRecord::delete(index, row.clone()));
        }
        changes
    }

    /// Rows are identified by their key-column projection. In timestamp
    /// mode the update is emitted only when the new row is not older
    /// than the one it supplants.
    fn detect_key_based_changes(
        &self,
        old_data: &[Row],
        new_data: &[Row],
        headers: &[String],
        timestamp_gated: bool,
    ) -> Vec<DeltaRecord> {
        let mut old_keys: HashMap<String, usize> = HashMap::new();
        for (index, row) in old_data.iter().enumerate() {
            old_keys.insert(row_key(&self.config, row, headers), index);
        }
        let mut new_keys: HashSet<String> = HashSet::new();

        let ts_index = self
            .config
            .timestamp_column
            .as_ref()
            .and_then(|column| headers.iter().position(|h| h == column));

        let mut changes = Vec::new();
        for (index, row) in new_data.iter().enumerate() {
            let key = row_key(&self.config, row, headers);
            new_keys.insert(key.clone());
            match old_keys.get(&key) {
                None => changes.push(DeltaRecord::insert(index, row.clone())),
                Some(&old_index) => {
                    let old_row = &old_data[old_index];
                    if old_row == row {
                        continue;
                    }
                    if timestamp_gated && !newer_or_unparseable(old_row, row, ts_index) {
                        continue; // the existing row wins
                    }
                    let changed = find_changed_columns(old_row, row);
                    changes.push(DeltaRecord::update(
                        old_index,
                        old_row.clone(),
                        row.clone(),
                        changed,
                    ));
                }
            }
        }
        let mut deleted = HashSet::new();
        for (index, row) in old_data.iter().enumerate() {
            let key = row_key(&self.config, row, headers);
            if !new_keys.contains(&key) && deleted.insert(key) {
                changes.push(DeltaRecord::delete(index, row.clone()));
            }
        }
        changes
    }
}

/* ------------------------------------------------------------------
row utilities
------------------------------------------------------------------ */
/// Project a row onto the configured key columns. Columns missing from
/// the header fall back to the first field so headerless exports still
/// get a usable identity.
pub fn row_key(config: &DeltaConfig, row: &[String], headers: &[String]) -> String {
    let mut key = String::new();
    let mut found = false;
    for key_column in &config.key_columns {
        if let Some(index) = headers.iter().position(|h| h == key_column) {
            found = true;
            let mut value = row.get(index).cloned().unwrap_or_default();
            if config.trim_key_whitespace {
                value = value.trim().to_string();
            }
            if !config.case_sensitive_keys {
                value = value.to_lowercase();
            }
            key.push_str(&value);
            key.push('|');
        }
    }
    if !found {
        key.push_str(row.first().map(String::as_str).unwrap_or(""));
        key.push('|');
    }
    key
}

/// Indices of positionally differing columns; length differences mark
/// every trailing column as changed.
pub(crate) fn find_changed_columns(old_row: &[String], new_row: &[String]) -> Vec<usize> {
    let shared = old_row.len().min(new_row.len());
    let longest = old_row.len().max(new_row.len());
    let mut changed: Vec<usize> = (0..shared)
        .filter(|&i| old_row[i] != new_row[i])
        .collect();
    changed.extend(shared..longest);
    changed
}

/// Fraction of positionally equal fields; rows of unequal width are
/// never similar.
fn row_similarity(row1: &[String], row2: &[String]) -> f64 {
    if row1.len() != row2.len() || row1.is_empty() {
        return 0.0;
    }
    let equal = row1.iter().zip(row2).filter(|(a, b)| a == b).count();
    equal as f64 / row1.len() as f64
}

/// True when the new row's timestamp is newer than or equal to the old
/// one's, or either timestamp fails to parse.
fn newer_or_unparseable(old_row: &[String], new_row: &[String], ts_index: Option<usize>) -> bool {
    let Some(ts_index) = ts_index else { return true };
    let old_ts = old_row.get(ts_index).and_then(|v| parse_timestamp(v));
    let new_ts = new_row.get(ts_index).and_then(|v| parse_timestamp(v));
    match (old_ts, new_ts) {
        (Some(old_ts), Some(new_ts)) => new_ts >= old_ts,
        _ => true,
    }
}

/// Load every row of a CSV file, header included.
pub(crate) fn load_csv_rows(path: &str) -> Result<Vec<Row>, DeltaError> {
    if !Path::new(path).exists() {
        return Err(DeltaError::FileNotFound(path.to_string()));
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(|e| DeltaError::InvalidFormat(format!("cannot read {path}: {e}")))?;
    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| DeltaError::InvalidFormat(format!("bad row in {path}: {e}")))?;
        rows.push(record.iter().map(|field| field.to_string()).collect());
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::DeltaOperation;

    fn rows(data: &[&[&str]]) -> Vec<Row> {
        data.iter()
            .map(|row| row.iter().map(|f| f.to_string()).collect())
            .collect()
    }

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn content_hash_mode_emits_insert_and_delete_pairs() {
        let detector = ChangeDetector::new(DeltaConfig {
            detection_mode: DetectionMode::ContentHash,
            ..DeltaConfig::default()
        });
        let old = rows(&[&["1", "Alice"], &["2", "Bob"]]);
        let new = rows(&[&["1", "Alice"], &["2", "Robert"]]);
        let changes = detector.detect_changes(&old, &new, &headers(&["id", "name"]));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].operation, DeltaOperation::Insert);
        assert_eq!(changes[1].operation, DeltaOperation::Delete);
    }

    #[test]
    fn field_by_field_mode_tracks_changed_columns() {
        let detector = ChangeDetector::new(DeltaConfig {
            detection_mode: DetectionMode::FieldByField,
            ..DeltaConfig::default()
        });
        let old = rows(&[&["1", "Alice", "a@x"], &["2", "Bob", "b@x"]]);
        let new = rows(&[&["1", "Alicia", "a@y"], &["2", "Bob", "b@x"], &["3", "Eve", "e@x"]]);
        let changes = detector.detect_changes(&old, &new, &headers(&["id", "name", "email"]));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].operation, DeltaOperation::Update);
        assert_eq!(changes[0].changed_columns, vec![1, 2]);
        assert_eq!(changes[1].operation, DeltaOperation::Insert);
        assert_eq!(changes[1].row_index, 2);
    }

    #[test]
    fn key_based_mode_matches_reference_scenario() {
        let detector = ChangeDetector::new(DeltaConfig {
            detection_mode: DetectionMode::KeyBased,
            key_columns: vec!["id".to_string()],
            ..DeltaConfig::default()
        });
        let old = rows(&[
            &["1", "Alice", "a@x"],
            &["2", "Bob", "b@x"],
            &["3", "Charlie", "c@x"],
        ]);
        let new = rows(&[
            &["1", "Alice", "a@y"],
            &["2", "Bob", "b@x"],
            &["4", "David", "d@x"],
        ]);
        let changes = detector.detect_changes(&old, &new, &headers(&["id", "name", "email"]));
        assert_eq!(changes.len(), 3);

        let update = changes
            .iter()
            .find(|c| c.operation == DeltaOperation::Update)
            .unwrap();
        assert_eq!(update.row_index, 0);
        assert_eq!(update.changed_columns, vec![2]);

        let insert = changes
            .iter()
            .find(|c| c.operation == DeltaOperation::Insert)
            .unwrap();
        assert_eq!(insert.new_values[1], "David");

        let delete = changes
            .iter()
            .find(|c| c.operation == DeltaOperation::Delete)
            .unwrap();
        assert_eq!(delete.old_values[1], "Charlie");
    }

    #[test]
    fn semantic_mode_splits_unrelated_rows() {
        let detector = ChangeDetector::new(DeltaConfig {
            detection_mode: DetectionMode::Semantic,
            similarity_threshold: 0.5,
            ..DeltaConfig::default()
        });
        let old = rows(&[&["1", "Alice", "a@x", "active"]]);
        // only one of four fields survives: below the 0.5 gate
        let new = rows(&[&["9", "Zed", "z@z", "active"]]);
        let changes = detector.detect_changes(&old, &new, &headers(&["id", "name", "email", "s"]));
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].operation, DeltaOperation::Delete);
        assert_eq!(changes[1].operation, DeltaOperation::Insert);
    }

    #[test]
    fn timestamp_mode_keeps_newer_rows() {
        let detector = ChangeDetector::new(DeltaConfig {
            detection_mode: DetectionMode::TimestampBased,
            key_columns: vec!["id".to_string()],
            timestamp_column: Some("seen".to_string()),
            ..DeltaConfig::default()
        });
        let hdr = headers(&["id", "host", "seen"]);
        let old = rows(&[&["1", "a.example.com", "2026-05-01T00:00:00Z"]]);
        // the incoming row is older, so the existing one wins
        let stale = rows(&[&["1", "stale.example.com", "2026-01-01T00:00:00Z"]]);
        assert!(detector.detect_changes(&old, &stale, &hdr).is_empty());
        let fresh = rows(&[&["1", "fresh.example.com", "2026-06-01T00:00:00Z"]]);
        let changes = detector.detect_changes(&old, &fresh, &hdr);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].operation, DeltaOperation::Update);
        assert_eq!(changes[0].old_values[1], "a.example.com");
    }

    #[test]
    fn changed_columns_cover_length_differences() {
        let old: Row = vec!["a".to_string(), "b".to_string()];
        let new: Row = vec!["a".to_string(), "x".to_string(), "extra".to_string()];
        assert_eq!(find_changed_columns(&old, &new), vec![1, 2]);
    }
}
