//! Delta compression configuration.

// dependencies
use crate::delta::{DeltaAlgorithm, DetectionMode};
use crate::error::DeltaError;

/// Configuration for change detection and delta encoding.
#[derive(Debug, Clone)]
pub struct DeltaConfig {
    // core selection
    pub algorithm:      DeltaAlgorithm,
    pub detection_mode: DetectionMode,
    // key handling for key-based detection
    pub key_columns:         Vec<String>,
    pub timestamp_column:    Option<String>,
    pub case_sensitive_keys: bool,
    pub trim_key_whitespace: bool,
    // similarity gate for semantic detection: rows below this fraction
    // of positionally equal fields are treated as unrelated
    pub similarity_threshold: f64,
    // codec tuning
    pub max_dictionary_size:       usize,
    pub enable_run_length_encoding: bool,
    // capacity
    pub chunk_size:       usize,
    pub max_memory_bytes: usize,
    // integrity
    pub validate_integrity:    bool,
    pub min_compression_ratio: f64,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        DeltaConfig {
            algorithm:      DeltaAlgorithm::Hybrid,
            detection_mode: DetectionMode::ContentHash,
            key_columns:         vec!["id".to_string()],
            timestamp_column:    None,
            case_sensitive_keys: true,
            trim_key_whitespace: true,
            similarity_threshold: 0.8,
            max_dictionary_size:       1000,
            enable_run_length_encoding: true,
            chunk_size:       10000,
            max_memory_bytes: 100 * 1024 * 1024,
            validate_integrity:    true,
            min_compression_ratio: 1.1,
        }
    }
}

impl DeltaConfig {
    /// All validation failures at once, for diagnostics.
    pub fn validation_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            errors.push("similarity threshold must be between 0.0 and 1.0".to_string());
        }
        if self.chunk_size == 0 {
            errors.push("chunk size must be greater than 0".to_string());
        }
        if self.max_memory_bytes == 0 {
            errors.push("memory limit must be greater than 0".to_string());
        }
        if self.min_compression_ratio < 1.0 {
            errors.push("minimum compression ratio must be >= 1.0".to_string());
        }
        if self.detection_mode == DetectionMode::KeyBased && self.key_columns.is_empty() {
            errors.push("key-based detection requires key columns".to_string());
        }
        if self.detection_mode == DetectionMode::TimestampBased && self.timestamp_column.is_none() {
            errors.push("timestamp-based detection requires a timestamp column".to_string());
        }
        errors
    }

    pub fn validate(&self) -> Result<(), DeltaError> {
        let errors = self.validation_errors();
        if errors.is_empty() {
            return Ok(());
        }
        Err(DeltaError::InvalidConfig(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DeltaConfig::default().validate().is_ok());
    }

    #[test]
    fn key_based_requires_key_columns() {
        let config = DeltaConfig {
            detection_mode: DetectionMode::KeyBased,
            key_columns: Vec::new(),
            ..DeltaConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn collects_all_validation_errors() {
        let config = DeltaConfig {
            similarity_threshold: 2.0,
            chunk_size: 0,
            ..DeltaConfig::default()
        };
        assert_eq!(config.validation_errors().len(), 2);
    }
}
