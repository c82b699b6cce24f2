//! Delta records and the artifact header.
//!
//! A delta record is one atomic change between two snapshots. Its
//! canonical (version 1.0) form is one JSON object per record; metadata
//! lives in a `BTreeMap` so serialization is deterministic. The artifact
//! header is line-oriented `KEY=value` text terminated by `END_HEADER`.

// dependencies
use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use crate::error::DeltaError;
use crate::fingerprint::{content_hash, fingerprint};
use crate::row::Row;
use crate::timestamp::now_iso8601;

// constants
pub(crate) const DELTA_VERSION: &str = "1.0";
pub(crate) const HEADER_PREFIX: &str = "DELTA_HEADER_V";
pub(crate) const HEADER_END: &str = "END_HEADER";

/// The kind of change a delta record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaOperation {
    Insert,
    Delete,
    Update,
    Move,
}

/// Compression scheme applied to the serialized record stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaAlgorithm {
    None,
    Rle,
    DeltaEncoding,
    Dictionary,
    Lz77,
    Hybrid,
}

impl DeltaAlgorithm {
    pub fn id(self) -> u8 {
        match self {
            DeltaAlgorithm::None => 0,
            DeltaAlgorithm::Rle => 1,
            DeltaAlgorithm::DeltaEncoding => 2,
            DeltaAlgorithm::Dictionary => 3,
            DeltaAlgorithm::Lz77 => 4,
            DeltaAlgorithm::Hybrid => 5,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, DeltaError> {
        match id {
            0 => Ok(DeltaAlgorithm::None),
            1 => Ok(DeltaAlgorithm::Rle),
            2 => Ok(DeltaAlgorithm::DeltaEncoding),
            3 => Ok(DeltaAlgorithm::Dictionary),
            4 => Ok(DeltaAlgorithm::Lz77),
            5 => Ok(DeltaAlgorithm::Hybrid),
            other => Err(DeltaError::InvalidFormat(format!(
                "unknown compression algorithm id {other}"
            ))),
        }
    }
}

/// How differences between the two snapshots are identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    ContentHash,
    FieldByField,
    KeyBased,
    Semantic,
    TimestampBased,
}

impl DetectionMode {
    pub fn id(self) -> u8 {
        match self {
            DetectionMode::ContentHash => 0,
            DetectionMode::FieldByField => 1,
            DetectionMode::KeyBased => 2,
            DetectionMode::Semantic => 3,
            DetectionMode::TimestampBased => 4,
        }
    }

    pub fn from_id(id: u8) -> Result<Self, DeltaError> {
        match id {
            0 => Ok(DetectionMode::ContentHash),
            1 => Ok(DetectionMode::FieldByField),
            2 => Ok(DetectionMode::KeyBased),
            3 => Ok(DetectionMode::Semantic),
            4 => Ok(DetectionMode::TimestampBased),
            other => Err(DeltaError::InvalidFormat(format!(
                "unknown detection mode id {other}"
            ))),
        }
    }
}

/// One atomic change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeltaRecord {
    pub operation:       DeltaOperation,
    pub row_index:       usize,
    pub old_values:      Vec<String>,
    pub new_values:      Vec<String>,
    pub changed_columns: Vec<usize>,
    pub timestamp:       String,
    pub change_hash:     String,
    pub metadata:        BTreeMap<String, String>,
}

impl DeltaRecord {
    pub fn insert(row_index: usize, row: Row) -> Self {
        let change_hash = content_hash(&row);
        DeltaRecord {
            operation: DeltaOperation::Insert,
            row_index,
            old_values: Vec::new(),
            new_values: row,
            changed_columns: Vec::new(),
            timestamp: now_iso8601(),
            change_hash,
            metadata: BTreeMap::new(),
        }
    }

    pub fn delete(row_index: usize, row: Row) -> Self {
        let change_hash = content_hash(&row);
        DeltaRecord {
            operation: DeltaOperation::Delete,
            row_index,
            old_values: row,
            new_values: Vec::new(),
            changed_columns: Vec::new(),
            timestamp: now_iso8601(),
            change_hash,
            metadata: BTreeMap::new(),
        }
    }

    pub fn update(row_index: usize, old: Row, new: Row, changed_columns: Vec<usize>) -> Self {
        // the change hash covers both sides so reordered updates differ
        let change_hash = fingerprint(&format!("{}{}", content_hash(&old), content_hash(&new)));
        DeltaRecord {
            operation: DeltaOperation::Update,
            row_index,
            old_values: old,
            new_values: new,
            changed_columns,
            timestamp: now_iso8601(),
            change_hash,
            metadata: BTreeMap::new(),
        }
    }

    pub fn relocate(old_index: usize, new_index: usize, row: Row) -> Self {
        let change_hash = content_hash(&row);
        let mut metadata = BTreeMap::new();
        metadata.insert("new_index".to_string(), new_index.to_string());
        DeltaRecord {
            operation: DeltaOperation::Move,
            row_index: old_index,
            old_values: Vec::new(),
            new_values: row,
            changed_columns: Vec::new(),
            timestamp: now_iso8601(),
            change_hash,
            metadata,
        }
    }

    /// Target position of a `Move`, carried in the metadata map.
    pub fn move_target(&self) -> Option<usize> {
        self.metadata.get("new_index")?.parse().ok()
    }

    /// Canonical (version 1.0) textual form: one JSON object.
    pub fn serialize(&self) -> Result<String, DeltaError> {
        serde_json::to_string(self)
            .map_err(|e| DeltaError::InvalidFormat(format!("record serialization failed: {e}")))
    }

    pub fn deserialize(data: &str) -> Result<Self, DeltaError> {
        serde_json::from_str(data)
            .map_err(|e| DeltaError::InvalidFormat(format!("record deserialization failed: {e}")))
    }

    /// Recompute the change hash from the carried values.
    pub fn expected_hash(&self) -> String {
        match self.operation {
            DeltaOperation::Insert | DeltaOperation::Move => content_hash(&self.new_values),
            DeltaOperation::Delete => content_hash(&self.old_values),
            DeltaOperation::Update => fingerprint(&format!(
                "{}{}",
                content_hash(&self.old_values),
                content_hash(&self.new_values)
            )),
        }
    }
}

/// Immutable descriptor prefixed to every delta artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaHeader {
    pub version:            String,
    pub source_file:        String,
    pub target_file:        String,
    pub creation_timestamp: String,
    pub algorithm:          DeltaAlgorithm,
    pub detection_mode:     DetectionMode,
    pub key_columns:        Vec<String>,
    pub total_changes:      u64,
    /// Canonical bytes over encoded bytes, as an integer percentage.
    pub compression_ratio:  u64,
    pub metadata:           BTreeMap<String, String>,
}

impl Default for DeltaHeader {
    fn default() -> Self {
        DeltaHeader {
            version:            DELTA_VERSION.to_string(),
            source_file:        String::new(),
            target_file:        String::new(),
            creation_timestamp: now_iso8601(),
            algorithm:          DeltaAlgorithm::Hybrid,
            detection_mode:     DetectionMode::ContentHash,
            key_columns:        Vec::new(),
            total_changes:      0,
            compression_ratio:  0,
            metadata:           BTreeMap::new(),
        }
    }
}

impl DeltaHeader {
    /// Line-oriented `KEY=value` text, terminated by `END_HEADER`.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("{HEADER_PREFIX}{}\n", self.version));
        out.push_str(&format!("SOURCE_FILE={}\n", self.source_file));
        out.push_str(&format!("TARGET_FILE={}\n", self.target_file));
        out.push_str(&format!("CREATION_TIMESTAMP={}\n", self.creation_timestamp));
        out.push_str(&format!("ALGORITHM={}\n", self.algorithm.id()));
        out.push_str(&format!("DETECTION_MODE={}\n", self.detection_mode.id()));
        out.push_str(&format!("TOTAL_CHANGES={}\n", self.total_changes));
        out.push_str(&format!("COMPRESSION_RATIO={}\n", self.compression_ratio));
        out.push_str(&format!("KEY_COLUMNS={}\n", self.key_columns.join(",")));
        for (key, value) in &self.metadata {
            out.push_str(&format!("META_{key}={value}\n"));
        }
        out.push_str(HEADER_END);
        out.push('\n');
        out
    }

    /// Parse a header; unsupported versions yield `VersionMismatch`.
    pub fn deserialize(text: &str) -> Result<Self, DeltaError> {
        let mut header = DeltaHeader::default();
        let mut lines = text.lines();
        match lines.next() {
            Some(first) if first.starts_with(HEADER_PREFIX) => {
                header.version = first[HEADER_PREFIX.len()..].to_string();
                if header.version != DELTA_VERSION {
                    return Err(DeltaError::VersionMismatch {
                        found:    header.version,
                        expected: DELTA_VERSION.to_string(),
                    });
                }
            }
            _ => {
                return Err(DeltaError::InvalidFormat(
                    "missing delta header magic line".to_string(),
                ))
            }
        }
        for line in lines {
            if line == HEADER_END {
                return Ok(header);
            }
            let Some((key, value)) = line.split_once('=') else { continue };
            match key {
                "SOURCE_FILE" => header.source_file = value.to_string(),
                "TARGET_FILE" => header.target_file = value.to_string(),
                "CREATION_TIMESTAMP" => header.creation_timestamp = value.to_string(),
                "ALGORITHM" => {
                    let id = value.parse::<u8>().map_err(|_| {
                        DeltaError::InvalidFormat(format!("bad algorithm id: {value}"))
                    })?;
                    header.algorithm = DeltaAlgorithm::from_id(id)?;
                }
                "DETECTION_MODE" => {
                    let id = value.parse::<u8>().map_err(|_| {
                        DeltaError::InvalidFormat(format!("bad detection mode id: {value}"))
                    })?;
                    header.detection_mode = DetectionMode::from_id(id)?;
                }
                "TOTAL_CHANGES" => {
                    header.total_changes = value.parse().map_err(|_| {
                        DeltaError::InvalidFormat(format!("bad change count: {value}"))
                    })?;
                }
                "COMPRESSION_RATIO" => {
                    header.compression_ratio = value.parse().map_err(|_| {
                        DeltaError::InvalidFormat(format!("bad compression ratio: {value}"))
                    })?;
                }
                "KEY_COLUMNS" => {
                    header.key_columns = if value.is_empty() {
                        Vec::new()
                    } else {
                        value.split(',').map(|c| c.to_string()).collect()
                    };
                }
                _ => {
                    if let Some(meta_key) = key.strip_prefix("META_") {
                        header
                            .metadata
                            .insert(meta_key.to_string(), value.to_string());
                    }
                }
            }
        }
        Err(DeltaError::InvalidFormat(
            "delta header is not terminated".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(fields: &[&str]) -> Row {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn record_serialization_round_trips() {
        let record = DeltaRecord::update(
            3,
            row(&["1", "Alice", "a@x"]),
            row(&["1", "Alice", "a@y"]),
            vec![2],
        );
        let text = record.serialize().unwrap();
        assert_eq!(DeltaRecord::deserialize(&text).unwrap(), record);
    }

    #[test]
    fn change_hashes_match_expected() {
        let insert = DeltaRecord::insert(0, row(&["a", "b"]));
        assert_eq!(insert.change_hash, insert.expected_hash());
        let update = DeltaRecord::update(0, row(&["a"]), row(&["b"]), vec![0]);
        assert_eq!(update.change_hash, update.expected_hash());
    }

    #[test]
    fn move_records_carry_their_target() {
        let relocated = DeltaRecord::relocate(4, 1, row(&["x"]));
        assert_eq!(relocated.row_index, 4);
        assert_eq!(relocated.move_target(), Some(1));
    }

    #[test]
    fn header_round_trips() {
        let mut header = DeltaHeader {
            source_file: "old.csv".to_string(),
            target_file: "new.csv".to_string(),
            algorithm: DeltaAlgorithm::Lz77,
            detection_mode: DetectionMode::KeyBased,
            key_columns: vec!["id".to_string(), "host".to_string()],
            total_changes: 17,
            compression_ratio: 140,
            ..DeltaHeader::default()
        };
        header
            .metadata
            .insert("scan".to_string(), "subfinder".to_string());
        let parsed = DeltaHeader::deserialize(&header.serialize()).unwrap();
        assert_eq!(parsed, header);
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let text = "DELTA_HEADER_V9.9\nEND_HEADER\n";
        match DeltaHeader::deserialize(text) {
            Err(DeltaError::VersionMismatch { found, .. }) => assert_eq!(found, "9.9"),
            other => panic!("expected version mismatch, got {other:?}"),
        }
    }
}
