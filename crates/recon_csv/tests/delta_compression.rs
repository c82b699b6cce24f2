//! Integration tests for delta compression: end-to-end artifacts,
//! reconstruction, integrity checking, and round-trip properties.

// dependencies
use std::fs;
use std::path::Path;
use recon_csv::delta::{
    delta_decode_integers, delta_encode_integers, dictionary_decode, dictionary_encode,
    lz77_compress, lz77_decompress, rle_decode, rle_encode,
};
use recon_csv::{
    ChangeDetector, DeltaAlgorithm, DeltaCompressor, DeltaConfig, DeltaDecompressor, DeltaError,
    DeltaHeader, DeltaRecord, DetectionMode,
};

fn path_str(dir: &Path, name: &str) -> String {
    dir.join(name).to_str().unwrap().to_string()
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = path_str(dir, name);
    fs::write(&path, contents).unwrap();
    path
}

fn row(fields: &[&str]) -> Vec<String> {
    fields.iter().map(|f| f.to_string()).collect()
}

fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
    data.iter().map(|r| row(r)).collect()
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

fn key_based_config() -> DeltaConfig {
    DeltaConfig {
        detection_mode: DetectionMode::KeyBased,
        key_columns: vec!["id".to_string()],
        ..DeltaConfig::default()
    }
}

const OLD_SNAPSHOT: &str = "id,name,email\n1,Alice,a@x\n2,Bob,b@x\n3,Charlie,c@x\n";
const NEW_SNAPSHOT: &str = "id,name,email\n1,Alice,a@y\n2,Bob,b@x\n4,David,d@x\n";

#[test]
fn key_based_delta_matches_reference_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let old = write_file(dir.path(), "old.csv", OLD_SNAPSHOT);
    let new = write_file(dir.path(), "new.csv", NEW_SNAPSHOT);
    let delta = path_str(dir.path(), "snapshot.delta");

    let compressor = DeltaCompressor::new(key_based_config()).unwrap();
    let header = compressor.compress(&old, &new, &delta).unwrap();
    assert_eq!(header.total_changes, 3);
    assert_eq!(header.detection_mode, DetectionMode::KeyBased);

    let stats = compressor.statistics();
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.updates, 1);
    assert_eq!(stats.deletes, 1);
    assert!(stats.original_size > 0);
    assert!(stats.compressed_size > 0);
}

#[test]
fn delta_artifact_round_trips_through_the_decompressor() {
    let dir = tempfile::tempdir().unwrap();
    let old = write_file(dir.path(), "old.csv", OLD_SNAPSHOT);
    let new = write_file(dir.path(), "new.csv", NEW_SNAPSHOT);
    let delta = path_str(dir.path(), "snapshot.delta");
    let output = path_str(dir.path(), "reconstructed.csv");

    let compressor = DeltaCompressor::new(key_based_config()).unwrap();
    compressor.compress(&old, &new, &delta).unwrap();

    let decompressor = DeltaDecompressor::new(key_based_config()).unwrap();
    let (header, records) = decompressor.read_records(&delta).unwrap();
    assert_eq!(header.total_changes, records.len() as u64);
    assert!(decompressor.verify_integrity(&records));

    decompressor.decompress(&delta, &old, &output).unwrap();
    assert_eq!(read_rows(&output), read_rows(&new));
}

#[test]
fn every_algorithm_round_trips_an_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let detector = ChangeDetector::new(key_based_config());
    let old = rows(&[&["1", "Alice", "a@x"], &["2", "Bob", "b@x"]]);
    let new = rows(&[&["1", "Alice", "a@y"], &["3", "Carol", "c@x"]]);
    let records = detector.detect_changes(&old, &new, &row(&["id", "name", "email"]));

    for algorithm in [
        DeltaAlgorithm::None,
        DeltaAlgorithm::Rle,
        DeltaAlgorithm::Lz77,
        DeltaAlgorithm::Hybrid,
    ] {
        let config = DeltaConfig {
            algorithm,
            ..key_based_config()
        };
        let compressor = DeltaCompressor::new(config.clone()).unwrap();
        let delta = path_str(dir.path(), &format!("delta-{}.bin", algorithm.id()));
        let mut header = DeltaHeader {
            algorithm,
            detection_mode: DetectionMode::KeyBased,
            ..DeltaHeader::default()
        };
        compressor
            .compress_records(&records, &delta, &mut header)
            .unwrap();

        let decompressor = DeltaDecompressor::new(config).unwrap();
        let (read_header, read_back) = decompressor.read_records(&delta).unwrap();
        assert_eq!(read_header.algorithm, algorithm);
        assert_eq!(read_back, records);
    }
}

#[test]
fn field_by_field_apply_reconstructs_exactly() {
    let config = DeltaConfig {
        detection_mode: DetectionMode::FieldByField,
        ..DeltaConfig::default()
    };
    let detector = ChangeDetector::new(config.clone());
    let decompressor = DeltaDecompressor::new(config).unwrap();
    let headers = row(&["id", "host", "port"]);

    let cases = vec![
        // update + trailing insert
        (
            rows(&[&["1", "a", "80"], &["2", "b", "443"]]),
            rows(&[&["1", "a", "8080"], &["2", "b", "443"], &["3", "c", "22"]]),
        ),
        // update + trailing deletes
        (
            rows(&[&["1", "a", "80"], &["2", "b", "443"], &["3", "c", "22"], &["4", "d", "21"]]),
            rows(&[&["1", "a", "81"], &["2", "b", "443"]]),
        ),
        // everything replaced
        (
            rows(&[&["1", "a", "80"]]),
            rows(&[&["9", "z", "9090"], &["8", "y", "8081"]]),
        ),
        // no change at all
        (rows(&[&["1", "a", "80"]]), rows(&[&["1", "a", "80"]])),
    ];
    for (old, new) in cases {
        let records = detector.detect_changes(&old, &new, &headers);
        let rebuilt = decompressor
            .apply_delta(&old, &records, &headers, DetectionMode::FieldByField)
            .unwrap();
        assert_eq!(rebuilt, new);
    }
}

#[test]
fn content_hash_apply_is_hash_set_equivalent() {
    let config = DeltaConfig {
        detection_mode: DetectionMode::ContentHash,
        ..DeltaConfig::default()
    };
    let detector = ChangeDetector::new(config.clone());
    let decompressor = DeltaDecompressor::new(config).unwrap();
    let headers = row(&["host"]);

    let old = rows(&[&["a.example.com"], &["b.example.com"], &["c.example.com"]]);
    let new = rows(&[&["b.example.com"], &["d.example.com"], &["a.example.com"]]);
    let records = detector.detect_changes(&old, &new, &headers);
    let rebuilt = decompressor
        .apply_delta(&old, &records, &headers, DetectionMode::ContentHash)
        .unwrap();

    let hash_set = |data: &[Vec<String>]| {
        let mut hashes: Vec<String> = data
            .iter()
            .map(|r| recon_csv::fingerprint::content_hash(r))
            .collect();
        hashes.sort();
        hashes
    };
    assert_eq!(hash_set(&rebuilt), hash_set(&new));
}

#[test]
fn move_records_relocate_rows() {
    let decompressor = DeltaDecompressor::new(DeltaConfig::default()).unwrap();
    let headers = row(&["host"]);
    let base = rows(&[&["first"], &["second"], &["third"]]);
    let records = vec![DeltaRecord::relocate(2, 0, row(&["third"]))];
    let rebuilt = decompressor
        .apply_delta(&base, &records, &headers, DetectionMode::FieldByField)
        .unwrap();
    assert_eq!(rebuilt, rows(&[&["third"], &["first"], &["second"]]));
}

#[test]
fn tampered_records_fail_the_integrity_check() {
    let dir = tempfile::tempdir().unwrap();
    let old = write_file(dir.path(), "old.csv", OLD_SNAPSHOT);
    let new = write_file(dir.path(), "new.csv", NEW_SNAPSHOT);
    let delta = path_str(dir.path(), "snapshot.delta");
    let output = path_str(dir.path(), "out.csv");

    let config = DeltaConfig {
        algorithm: DeltaAlgorithm::None,
        ..key_based_config()
    };
    let compressor = DeltaCompressor::new(config.clone()).unwrap();
    compressor.compress(&old, &new, &delta).unwrap();

    let decompressor = DeltaDecompressor::new(config.clone()).unwrap();
    let (mut header, mut records) = decompressor.read_records(&delta).unwrap();
    records[0].change_hash = "0".repeat(64); // corrupt one record
    assert!(!decompressor.verify_integrity(&records));
    compressor
        .compress_records(&records, &delta, &mut header)
        .unwrap();
    assert!(matches!(
        decompressor.decompress(&delta, &old, &output),
        Err(DeltaError::DecompressionFailed(_))
    ));
}

#[test]
fn version_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let delta = write_file(
        dir.path(),
        "future.delta",
        "DELTA_HEADER_V2.0\nEND_HEADER\n\0\0\0\0\0\0\0\0",
    );
    let decompressor = DeltaDecompressor::new(DeltaConfig::default()).unwrap();
    assert!(matches!(
        decompressor.read_records(&delta),
        Err(DeltaError::VersionMismatch { .. })
    ));
    assert!(!decompressor.validate(&delta));
}

#[test]
fn missing_files_surface_as_not_found() {
    let compressor = DeltaCompressor::new(DeltaConfig::default()).unwrap();
    let result = compressor.compress("no-old.csv", "no-new.csv", "no.delta");
    assert!(matches!(result, Err(DeltaError::FileNotFound(_))));
}

/* ------------------------------------------------------------------
round-trip properties over generated data
------------------------------------------------------------------ */
/// Small deterministic linear congruential generator; keeps the
/// property runs reproducible without a randomness dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        self.0 >> 33
    }

    fn below(&mut self, bound: u64) -> u64 {
        self.next() % bound
    }

    fn field(&mut self) -> String {
        let length = self.below(12) as usize;
        (0..length)
            .map(|_| char::from(b'a' + self.below(26) as u8))
            .collect()
    }

    fn bytes(&mut self, length: usize) -> Vec<u8> {
        (0..length).map(|_| self.below(256) as u8).collect()
    }
}

#[test]
fn codecs_round_trip_generated_payloads() {
    let mut rng = Lcg(0x5EED);
    for _ in 0..20 {
        let length = rng.below(2000) as usize;
        let payload = rng.bytes(length);
        assert_eq!(rle_decode(&rle_encode(&payload)).unwrap(), payload);
        assert_eq!(lz77_decompress(&lz77_compress(&payload)).unwrap(), payload);
    }
    for _ in 0..10 {
        let values: Vec<i64> = (0..rng.below(200)).map(|_| rng.next() as i64).collect();
        assert_eq!(
            delta_decode_integers(&delta_encode_integers(&values)).unwrap(),
            values
        );
        let strings: Vec<String> = (0..rng.below(200)).map(|_| rng.field()).collect();
        assert_eq!(
            dictionary_decode(&dictionary_encode(&strings, 50)).unwrap(),
            strings
        );
    }
}

#[test]
fn field_by_field_round_trips_generated_snapshots() {
    let config = DeltaConfig {
        detection_mode: DetectionMode::FieldByField,
        ..DeltaConfig::default()
    };
    let detector = ChangeDetector::new(config.clone());
    let decompressor = DeltaDecompressor::new(config).unwrap();
    let headers = row(&["a", "b", "c"]);

    let mut rng = Lcg(0xC0FFEE);
    for _ in 0..25 {
        let make_rows = |rng: &mut Lcg, count: u64| -> Vec<Vec<String>> {
            (0..count)
                .map(|_| (0..3).map(|_| rng.field()).collect())
                .collect()
        };
        let old_count = rng.below(40);
        let old = make_rows(&mut rng, old_count);
        // mutate a copy of old rather than generating fresh rows, so
        // the delta mixes updates with inserts and deletes
        let mut new = old.clone();
        let mutations = rng.below(10);
        for _ in 0..mutations {
            if new.is_empty() || rng.below(3) == 0 {
                new.push((0..3).map(|_| rng.field()).collect());
            } else {
                let index = rng.below(new.len() as u64) as usize;
                if rng.below(4) == 0 {
                    new.remove(index);
                } else {
                    let column = rng.below(3) as usize;
                    new[index][column] = rng.field();
                }
            }
        }
        let records = detector.detect_changes(&old, &new, &headers);
        let rebuilt = decompressor
            .apply_delta(&old, &records, &headers, DetectionMode::FieldByField)
            .unwrap();
        assert_eq!(rebuilt, new);
    }
}
