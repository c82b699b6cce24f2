//! Integration tests for the merger engine: strategies, deduplication,
//! conflict resolution, and schema handling over real files.

// dependencies
use std::fs;
use std::path::Path;
use regex::Regex;
use recon_csv::{
    ConflictResolution, DedupStrategy, InputSource, MergeConfig, MergeError, MergeStrategy,
    MergerEngine,
};

fn path_str(dir: &Path, name: &str) -> String {
    dir.join(name).to_str().unwrap().to_string()
}

fn write_source(dir: &Path, name: &str, contents: &str) -> String {
    let path = path_str(dir, name);
    fs::write(&path, contents).unwrap();
    path
}

fn read_rows(path: &str) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(|f| f.to_string()).collect())
        .collect()
}

fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

#[test]
fn smart_merge_with_exact_dedup_drops_repeated_rows() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(
        dir.path(),
        "a.csv",
        "id,name,email\n1,John,j@x\n2,Jane,ja@x\n",
    );
    let b = write_source(dir.path(), "b.csv", "id,name,email\n1,John,j@x\n3,Bob,b@x\n");

    let config = MergeConfig {
        strategy: MergeStrategy::Smart,
        dedup: DedupStrategy::Exact,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "first-scan"));
    engine.add_source(InputSource::new(&b, "second-scan"));

    let (headers, rows) = engine.preview(100).unwrap();
    assert_eq!(headers, row(&["id", "name", "email"]));
    assert_eq!(
        rows,
        vec![
            row(&["1", "John", "j@x"]),
            row(&["2", "Jane", "ja@x"]),
            row(&["3", "Bob", "b@x"]),
        ]
    );
    assert_eq!(engine.statistics().duplicates_removed, 1);
}

#[test]
fn priority_merge_keeps_the_high_priority_row() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id,name,email\n1,John,j@x\n");
    let b = write_source(dir.path(), "b.csv", "id,name,email\n1,Johnny,jj@x\n");

    let config = MergeConfig {
        strategy: MergeStrategy::Priority,
        dedup: DedupStrategy::KeyBased,
        conflict_resolution: ConflictResolution::KeepFirst,
        key_columns: vec!["id".to_string()],
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    // listed low-priority first to prove ordering comes from priority
    engine.add_source(InputSource::new(&b, "stale").with_priority(1));
    engine.add_source(InputSource::new(&a, "fresh").with_priority(2));

    let (_, rows) = engine.preview(100).unwrap();
    assert_eq!(rows, vec![row(&["1", "John", "j@x"])]);
}

#[test]
fn append_merge_writes_one_header_and_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id,name\n1,John\n2,Jane\n");
    let b = write_source(dir.path(), "b.csv", "id,name\n3,Bob\n");
    let out = path_str(dir.path(), "merged.csv");

    let config = MergeConfig {
        strategy: MergeStrategy::Append,
        dedup: DedupStrategy::None,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(&b, "b"));
    engine.merge_to_path(&out).unwrap();

    let rows = read_rows(&out);
    assert_eq!(
        rows,
        vec![
            row(&["id", "name"]),
            row(&["1", "John"]),
            row(&["2", "Jane"]),
            row(&["3", "Bob"]),
        ]
    );
    assert_eq!(engine.statistics().rows_output, 3);
}

#[test]
fn smart_merge_output_never_exceeds_input_sizes() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(
        dir.path(),
        "a.csv",
        "host,ip\nx.example.com,1\ny.example.com,2\nx.example.com,1\n",
    );
    let b = write_source(
        dir.path(),
        "b.csv",
        "host,ip\ny.example.com,2\nz.example.com,3\n",
    );

    let config = MergeConfig {
        strategy: MergeStrategy::Smart,
        dedup: DedupStrategy::Exact,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(&b, "b"));
    let (_, rows) = engine.preview(1000).unwrap();
    assert!(rows.len() <= 5);
    assert_eq!(rows.len(), 3);
    assert_eq!(engine.statistics().duplicates_removed, 2);
}

#[test]
fn missing_source_fails_fast_without_continue_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id\n1\n");

    let config = MergeConfig {
        dedup: DedupStrategy::Exact,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(
        &path_str(dir.path(), "missing.csv"),
        "ghost",
    ));
    assert!(matches!(
        engine.preview(10),
        Err(MergeError::FileNotFound(_))
    ));
}

#[test]
fn missing_source_is_skipped_with_continue_on_error() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id\n1\n2\n");

    let config = MergeConfig {
        dedup: DedupStrategy::Exact,
        continue_on_error: true,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(
        &path_str(dir.path(), "missing.csv"),
        "ghost",
    ));
    let (_, rows) = engine.preview(10).unwrap();
    assert_eq!(rows.len(), 2);
    let stats = engine.statistics();
    assert_eq!(
        stats.error_counts[&recon_csv::error::MergeErrorKind::FileNotFound],
        1
    );
}

#[test]
fn strict_schema_validation_rejects_mismatched_headers() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id,name\n1,John\n");
    let b = write_source(dir.path(), "b.csv", "id,email\n1,j@x\n");

    let config = MergeConfig {
        dedup: DedupStrategy::Exact,
        strict_schema_validation: true,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(&b, "b"));
    assert!(matches!(
        engine.preview(10),
        Err(MergeError::SchemaMismatch(_))
    ));
    assert!(!engine.validate_schema_compatibility());
}

#[test]
fn schema_aware_merge_pads_rows_to_the_union() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id,name\n1,John\n");
    let b = write_source(dir.path(), "b.csv", "id,email\n2,j@x\n");

    let config = MergeConfig {
        strategy: MergeStrategy::SchemaAware,
        dedup: DedupStrategy::KeyBased,
        key_columns: vec!["id".to_string()],
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(&b, "b"));

    let (headers, rows) = engine.preview(10).unwrap();
    assert_eq!(headers, row(&["email", "id", "name"]));
    assert_eq!(rows, vec![row(&["", "1", "John"]), row(&["j@x", "2", ""])]);
    assert!(engine.statistics().schema_adjustments > 0);
}

#[test]
fn time_based_merge_keeps_the_newest_row() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(
        dir.path(),
        "a.csv",
        "id,host,seen\n1,old.example.com,2026-01-01T00:00:00Z\n",
    );
    let b = write_source(
        dir.path(),
        "b.csv",
        "id,host,seen\n1,new.example.com,2026-06-01T00:00:00Z\n",
    );

    let config = MergeConfig {
        strategy: MergeStrategy::TimeBased,
        dedup: DedupStrategy::KeyBased,
        key_columns: vec!["id".to_string()],
        time_column: Some("seen".to_string()),
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "january"));
    engine.add_source(InputSource::new(&b, "june"));

    let (_, rows) = engine.preview(10).unwrap();
    assert_eq!(rows, vec![row(&["1", "new.example.com", "2026-06-01T00:00:00Z"])]);
    assert_eq!(engine.statistics().conflicts_resolved, 1);
}

#[test]
fn merge_values_resolution_fills_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id,name,email\n1,John,\n");
    let b = write_source(dir.path(), "b.csv", "id,name,email\n1,,j@x\n");

    let config = MergeConfig {
        dedup: DedupStrategy::KeyBased,
        conflict_resolution: ConflictResolution::MergeValues,
        key_columns: vec!["id".to_string()],
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.add_source(InputSource::new(&b, "b"));
    let (_, rows) = engine.preview(10).unwrap();
    assert_eq!(rows, vec![row(&["1", "John", "j@x"])]);
}

#[test]
fn exclude_patterns_drop_matching_rows() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(
        dir.path(),
        "a.csv",
        "host\nkeep.example.com\nskip.internal.lan\n",
    );

    let config = MergeConfig {
        dedup: DedupStrategy::Exact,
        exclude_patterns: vec![Regex::new(r"\.internal\.lan$").unwrap()],
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    let (_, rows) = engine.preview(10).unwrap();
    assert_eq!(rows, vec![row(&["keep.example.com"])]);
}

#[test]
fn merge_with_callback_cancels_between_rows() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id\n1\n2\n3\n");

    let config = MergeConfig {
        dedup: DedupStrategy::None,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    let mut delivered = Vec::new();
    engine
        .merge_with_callback(|row, index| {
            delivered.push((index, row.clone()));
            index == 0 // accept the first row, then cancel
        })
        .unwrap();
    assert_eq!(delivered.len(), 2); // row 1 was delivered, then cancelled
    assert_eq!(engine.statistics().rows_output, 1);
}

#[test]
fn progress_callback_sees_phase_names() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id\n1\n");
    let config = MergeConfig {
        dedup: DedupStrategy::Exact,
        parallel_processing: false,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    let phases = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
    {
        let phases = phases.clone();
        engine.set_progress_callback(Box::new(move |fraction, phase| {
            phases.lock().unwrap().push((fraction, phase.to_string()));
        }));
    }
    engine.preview(10).unwrap();
    let phases = phases.lock().unwrap();
    assert!(phases.iter().any(|(_, p)| p.contains("validating")));
    assert!(phases.iter().any(|(_, p)| p.contains("merging")));
}

#[test]
fn statistics_report_summarizes_the_merge() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_source(dir.path(), "a.csv", "id\n1\n1\n2\n");
    let config = MergeConfig {
        dedup: DedupStrategy::Exact,
        ..MergeConfig::default()
    };
    let mut engine = MergerEngine::new(config);
    engine.add_source(InputSource::new(&a, "a"));
    engine.preview(10).unwrap();
    let report = engine.statistics().report();
    assert!(report.contains("3 processed"));
    assert!(report.contains("1 duplicates removed"));
}
