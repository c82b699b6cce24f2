//! Merge configuration: strategies, deduplication, conflict resolution,
//! and per-source input descriptors.

// dependencies
use std::collections::BTreeMap;
use std::sync::Arc;
use regex::Regex;
use crate::error::MergeError;
use crate::row::Row;
use crate::writer::WriterConfig;

/// How rows from multiple sources are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Concatenate all sources in listed order.
    Append,
    /// Deduplicate across sources with conflict resolution.
    Smart,
    /// Smart merge over sources ordered by descending priority.
    Priority,
    /// Smart merge resolving conflicts toward the newest timestamp.
    TimeBased,
    /// Smart merge with rows padded to the merged schema and column
    /// type inconsistencies reported through statistics.
    SchemaAware,
}

/// How two rows are judged to be the same logical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    None,
    Exact,
    Fuzzy,
    KeyBased,
    ContentHash,
    Custom,
}

/// How the winner is chosen among a cluster of duplicate rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    KeepFirst,
    KeepLast,
    KeepNewest,
    KeepOldest,
    MergeValues,
    PrioritySource,
    Custom,
}

/// Caller-provided row equivalence predicate.
pub type DedupPredicate = Arc<dyn Fn(&[String], &[String]) -> bool + Send + Sync>;
/// Caller-provided conflict resolver; `None` means no winner.
pub type ConflictResolver = Arc<dyn Fn(&[Row]) -> Option<Row> + Send + Sync>;
/// Caller-provided row filter; rows returning `false` are dropped.
pub type RowFilter = Arc<dyn Fn(&[String]) -> bool + Send + Sync>;

/// One CSV input to the merger.
#[derive(Debug, Clone)]
pub struct InputSource {
    pub path:     String,
    pub name:     String,
    /// Higher numbers win under priority ordering and `PrioritySource`.
    pub priority: i32,
    /// Informational only; inputs are read as UTF-8.
    pub encoding:  String,
    pub delimiter: char,
    pub has_header: bool,
    /// Column consulted by timestamp-aware conflict resolution.
    pub timestamp_column: Option<String>,
    pub metadata: BTreeMap<String, String>,
}

impl InputSource {
    pub fn new(path: &str, name: &str) -> Self {
        InputSource {
            path:     path.to_string(),
            name:     name.to_string(),
            priority: 0,
            encoding:  "UTF-8".to_string(),
            delimiter: ',',
            has_header: true,
            timestamp_column: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn without_header(mut self) -> Self {
        self.has_header = false;
        self
    }
}

/// Full merger configuration.
#[derive(Clone)]
pub struct MergeConfig {
    // core strategy selection
    pub strategy:            MergeStrategy,
    pub dedup:               DedupStrategy,
    pub conflict_resolution: ConflictResolution,
    // key handling
    pub key_columns:         Vec<String>,
    pub case_sensitive_keys: bool,
    pub trim_key_whitespace: bool,
    // fuzzy matching
    pub fuzzy_threshold: f64,
    // timestamp handling
    pub time_column: Option<String>,
    // output framing, fed to the batch writer
    pub output: WriterConfig,
    // memory and performance
    pub memory_budget:       usize,
    pub chunk_size:          usize,
    pub parallel_processing: bool,
    // validation and filtering
    pub strict_schema_validation: bool,
    pub continue_on_error:        bool,
    pub exclude_patterns:         Vec<Regex>,
    pub column_mappings:          BTreeMap<String, String>,
    // caller hooks
    pub custom_dedup:    Option<DedupPredicate>,
    pub custom_resolver: Option<ConflictResolver>,
    pub custom_filter:   Option<RowFilter>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        MergeConfig {
            strategy:            MergeStrategy::Smart,
            dedup:               DedupStrategy::KeyBased,
            conflict_resolution: ConflictResolution::KeepNewest,
            key_columns:         Vec::new(),
            case_sensitive_keys: true,
            trim_key_whitespace: true,
            fuzzy_threshold: 0.85,
            time_column: None,
            output: WriterConfig::default(),
            memory_budget:       512 * 1024 * 1024,
            chunk_size:          10000,
            parallel_processing: true,
            strict_schema_validation: false,
            continue_on_error:        false,
            exclude_patterns:         Vec::new(),
            column_mappings:          BTreeMap::new(),
            custom_dedup:    None,
            custom_resolver: None,
            custom_filter:   None,
        }
    }
}

impl MergeConfig {
    /// Reject configurations the engine cannot honor.
    pub fn validate(&self) -> Result<(), MergeError> {
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(MergeError::InvalidConfig(format!(
                "fuzzy threshold {} is outside 0.0..=1.0",
                self.fuzzy_threshold
            )));
        }
        if self.chunk_size == 0 {
            return Err(MergeError::InvalidConfig(
                "chunk size must be nonzero".to_string(),
            ));
        }
        if self.memory_budget == 0 {
            return Err(MergeError::InvalidConfig(
                "memory budget must be nonzero".to_string(),
            ));
        }
        if self.dedup == DedupStrategy::KeyBased && self.key_columns.is_empty() {
            return Err(MergeError::InvalidConfig(
                "key-based deduplication requires key columns".to_string(),
            ));
        }
        if self.dedup == DedupStrategy::Custom && self.custom_dedup.is_none() {
            return Err(MergeError::InvalidConfig(
                "custom deduplication requires a predicate".to_string(),
            ));
        }
        if self.conflict_resolution == ConflictResolution::Custom && self.custom_resolver.is_none()
        {
            return Err(MergeError::InvalidConfig(
                "custom conflict resolution requires a resolver".to_string(),
            ));
        }
        if self.strategy == MergeStrategy::TimeBased && self.time_column.is_none() {
            return Err(MergeError::InvalidConfig(
                "time-based merging requires a time column".to_string(),
            ));
        }
        self.output
            .validate()
            .map_err(|e| MergeError::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_needs_key_columns_for_key_dedup() {
        assert!(MergeConfig::default().validate().is_err());
        let cfg = MergeConfig {
            key_columns: vec!["id".to_string()],
            ..MergeConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_out_of_range_fuzzy_threshold() {
        let cfg = MergeConfig {
            dedup: DedupStrategy::Exact,
            fuzzy_threshold: 1.5,
            ..MergeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn time_based_requires_time_column() {
        let cfg = MergeConfig {
            strategy: MergeStrategy::TimeBased,
            dedup: DedupStrategy::Exact,
            ..MergeConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
