//! The merger engine orchestrates multi-source ingestion: validate the
//! configuration and sources, infer the merged schema, dispatch by
//! strategy, and hand the result to a batch writer or a row callback.
//!
//! Entry points take `&mut self`, so a single engine can never run two
//! merges concurrently; callers wanting parallel merges use separate
//! engines. Progress and error callbacks are invoked at phase
//! boundaries, never while any internal lock is held.

// dependencies
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use log::{error, info};
use rayon::prelude::*;
use crate::error::{MergeError, MergeErrorKind};
use crate::merge::resolver::{Candidate, DuplicateResolver};
use crate::merge::{ConflictResolution, DedupStrategy, InputSource, MergeConfig, MergeStrategy};
use crate::fingerprint::content_hash;
use crate::row::Row;
use crate::stats::{MergeStats, MergeStatsSnapshot};
use crate::timestamp::parse_timestamp;
use crate::writer::BatchWriter;

// constants
const LOG_TARGET: &str = "merger_engine";

/// Invoked at phase boundaries with `(progress_fraction, phase_name)`.
pub type MergeProgressCallback = Box<dyn Fn(f64, &str) + Send + Sync>;
/// Invoked whenever an error is recorded, with its kind and message.
pub type MergeErrorCallback = Box<dyn Fn(MergeErrorKind, &str) + Send + Sync>;

/// Multi-source CSV merger.
pub struct MergerEngine {
    config:  MergeConfig,
    sources: Vec<InputSource>,
    stats:   MergeStats,
    progress_callback: Option<MergeProgressCallback>,
    error_callback:    Option<MergeErrorCallback>,
}

/// A kept output row plus the priority of the source it came from.
struct KeptRow {
    fields:   Row,
    priority: i32,
}

impl MergerEngine {
    /* ------------------------------------------------------------------
    construction and source management
    ------------------------------------------------------------------ */
    pub fn new(config: MergeConfig) -> Self {
        MergerEngine {
            config,
            sources: Vec::new(),
            stats:   MergeStats::new(),
            progress_callback: None,
            error_callback:    None,
        }
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: MergeConfig) {
        self.config = config;
    }

    pub fn add_source(&mut self, source: InputSource) {
        self.sources.push(source);
    }

    pub fn add_sources(&mut self, sources: Vec<InputSource>) {
        self.sources.extend(sources);
    }

    pub fn clear_sources(&mut self) {
        self.sources.clear();
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn set_progress_callback(&mut self, callback: MergeProgressCallback) {
        self.progress_callback = Some(callback);
    }

    pub fn set_error_callback(&mut self, callback: MergeErrorCallback) {
        self.error_callback = Some(callback);
    }

    pub fn statistics(&self) -> MergeStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_statistics(&self) {
        self.stats.reset();
    }

    /* ------------------------------------------------------------------
    merge entry points
    ------------------------------------------------------------------ */
    /// Merge all sources into a CSV file at `path`, written through a
    /// batch writer configured with the output framing options.
    pub fn merge_to_path(&mut self, path: &str) -> Result<(), MergeError> {
        let mut writer = BatchWriter::new(self.config.output.clone())
            .map_err(|e| MergeError::Output(e.to_string()))?;
        writer.open_path(path).map_err(|e| {
            self.report_error(MergeErrorKind::Output, &e.to_string());
            MergeError::Output(e.to_string())
        })?;
        let result = self.merge_to_writer(&mut writer);
        let close_result = writer
            .close_file()
            .map_err(|e| MergeError::Output(e.to_string()));
        result.and(close_result)
    }

    /// Merge all sources into an already opened batch writer.
    pub fn merge_to_writer(&mut self, writer: &mut BatchWriter) -> Result<(), MergeError> {
        let (headers, rows) = self.run_merge()?;
        self.report_progress(0.9, "writing merged output");
        let write_start = Instant::now();
        if self.config.output.write_header {
            writer
                .write_header(&headers)
                .map_err(|e| MergeError::Output(e.to_string()))?;
        }
        for row in rows {
            writer.write_row(row).map_err(|e| {
                self.report_error(MergeErrorKind::Output, &e.to_string());
                MergeError::Output(e.to_string())
            })?;
            self.stats.add_rows_output(1);
        }
        writer
            .flush()
            .map_err(|e| MergeError::Output(e.to_string()))?;
        self.stats.record_phase_time("write", write_start.elapsed());
        self.report_progress(1.0, "merge complete");
        info!(
            target: LOG_TARGET,
            "merge complete: {} rows written",
            self.stats.snapshot().rows_output
        );
        Ok(())
    }

    /// Merge and hand each output row to `callback` together with its
    /// output index. Returning `false` cancels the merge between rows.
    pub fn merge_with_callback<F>(&mut self, mut callback: F) -> Result<(), MergeError>
    where
        F: FnMut(&Row, usize) -> bool,
    {
        let (_, rows) = self.run_merge()?;
        for (index, row) in rows.iter().enumerate() {
            if !callback(row, index) {
                info!(target: LOG_TARGET, "merge cancelled by callback at row {index}");
                break;
            }
            self.stats.add_rows_output(1);
        }
        Ok(())
    }

    /// Run the merge without writing anywhere; returns the merged header
    /// and at most `max_rows` rows.
    pub fn preview(&mut self, max_rows: usize) -> Result<(Vec<String>, Vec<Row>), MergeError> {
        let (headers, mut rows) = self.run_merge()?;
        rows.truncate(max_rows);
        Ok((headers, rows))
    }

    /* ------------------------------------------------------------------
    schema operations
    ------------------------------------------------------------------ */
    /// The merged schema over all sources. Identical headers are kept in
    /// their original order; otherwise the union is ordered
    /// alphabetically, or by first appearance in descending source
    /// priority when any source declares one.
    pub fn infer_merged_schema(&self) -> Result<Vec<String>, MergeError> {
        let mut per_source = Vec::new();
        for source in &self.sources {
            match self.read_source_headers(source) {
                Ok(headers) => per_source.push((source.priority, headers)),
                Err(e) => {
                    if !self.config.continue_on_error {
                        return Err(e);
                    }
                }
            }
        }
        if per_source.is_empty() {
            return Err(MergeError::SchemaMismatch(
                "no readable source headers".to_string(),
            ));
        }
        Ok(merged_schema(&per_source))
    }

    /// True when every source reports the same header vector.
    pub fn validate_schema_compatibility(&self) -> bool {
        let mut reference: Option<Vec<String>> = None;
        for source in &self.sources {
            match self.read_source_headers(source) {
                Ok(headers) => match &reference {
                    Some(reference) if *reference != headers => return false,
                    Some(_) => {}
                    None => reference = Some(headers),
                },
                Err(_) => return false,
            }
        }
        true
    }

    /* ------------------------------------------------------------------
    merge pipeline
    ------------------------------------------------------------------ */
    fn run_merge(&mut self) -> Result<(Vec<String>, Vec<Row>), MergeError> {
        self.stats.reset();
        self.stats.start_timing();
        info!(
            target: LOG_TARGET,
            "starting {:?} merge of {} sources",
            self.config.strategy,
            self.sources.len()
        );

        // validation phase
        self.report_progress(0.0, "validating sources");
        let validation_start = Instant::now();
        if let Err(e) = self.config.validate() {
            self.report_error(MergeErrorKind::InvalidConfig, &e.to_string());
            return Err(e);
        }
        let readable = self.validate_sources()?;
        self.stats
            .record_phase_time("validation", validation_start.elapsed());

        // schema phase
        let schema_start = Instant::now();
        let mut per_source_headers = Vec::new();
        for &source_index in &readable {
            let source = &self.sources[source_index];
            let headers = self.read_source_headers(source)?;
            per_source_headers.push((source_index, headers));
        }
        if self.config.strict_schema_validation {
            let reference = &per_source_headers[0].1;
            for (source_index, headers) in &per_source_headers[1..] {
                if headers != reference {
                    let message = format!(
                        "source {} does not match the reference schema",
                        self.sources[*source_index].name
                    );
                    self.report_error(MergeErrorKind::SchemaMismatch, &message);
                    return Err(MergeError::SchemaMismatch(message));
                }
            }
        }
        let priority_headers: Vec<(i32, Vec<String>)> = per_source_headers
            .iter()
            .map(|(i, headers)| (self.sources[*i].priority, headers.clone()))
            .collect();
        let merged = merged_schema(&priority_headers);
        self.stats.record_phase_time("schema", schema_start.elapsed());

        // load phase: priority merges consume sources highest-first
        let load_order: Vec<usize> = match self.config.strategy {
            MergeStrategy::Priority => {
                let mut order = readable.clone();
                order.sort_by_key(|&i| std::cmp::Reverse(self.sources[i].priority));
                order
            }
            _ => readable,
        };
        let load_start = Instant::now();
        let loaded = self.load_sources(&load_order)?;
        self.stats.record_phase_time("load", load_start.elapsed());

        // strategy phase
        self.report_progress(0.6, "merging rows");
        let merge_start = Instant::now();
        let header_by_source: HashMap<usize, &Vec<String>> = per_source_headers
            .iter()
            .map(|(i, headers)| (*i, headers))
            .collect();
        let rows = match self.config.strategy {
            MergeStrategy::Append => self.append_merge(&merged, &header_by_source, loaded),
            MergeStrategy::Smart | MergeStrategy::Priority => {
                self.smart_merge(&merged, &header_by_source, loaded, false)?
            }
            MergeStrategy::TimeBased => {
                self.smart_merge(&merged, &header_by_source, loaded, false)?
            }
            MergeStrategy::SchemaAware => {
                self.smart_merge(&merged, &header_by_source, loaded, true)?
            }
        };
        self.stats.record_phase_time("merge", merge_start.elapsed());
        self.stats.stop_timing();
        Ok((merged, rows))
    }

    /// Check that sources exist, aggregating failures when
    /// `continue_on_error` is set. Returns the indices of usable sources.
    fn validate_sources(&self) -> Result<Vec<usize>, MergeError> {
        if self.sources.is_empty() {
            let message = "no input sources specified".to_string();
            self.report_error(MergeErrorKind::InvalidConfig, &message);
            return Err(MergeError::InvalidConfig(message));
        }
        let mut readable = Vec::new();
        for (index, source) in self.sources.iter().enumerate() {
            if Path::new(&source.path).exists() {
                readable.push(index);
            } else {
                let message = format!("source file not found: {}", source.path);
                self.report_error(MergeErrorKind::FileNotFound, &message);
                if !self.config.continue_on_error {
                    return Err(MergeError::FileNotFound(source.path.clone()));
                }
            }
        }
        if readable.is_empty() {
            return Err(MergeError::FileNotFound(
                "no readable input sources".to_string(),
            ));
        }
        Ok(readable)
    }

    /// Load data rows of every source in `order`, in parallel when the
    /// configuration allows it.
    fn load_sources(&self, order: &[usize]) -> Result<Vec<(usize, Vec<Row>)>, MergeError> {
        let total = order.len();
        if self.config.parallel_processing {
            let loaded: Result<Vec<_>, MergeError> = order
                .par_iter()
                .map(|&index| Ok((index, self.read_source(&self.sources[index])?)))
                .collect();
            let loaded = loaded?;
            for (done, (index, rows)) in loaded.iter().enumerate() {
                self.stats.increment_files_processed();
                self.report_progress(
                    0.1 + 0.5 * (done + 1) as f64 / total as f64,
                    &format!("loaded {} ({} rows)", self.sources[*index].name, rows.len()),
                );
            }
            Ok(loaded)
        } else {
            let mut loaded = Vec::with_capacity(total);
            for (done, &index) in order.iter().enumerate() {
                let source = &self.sources[index];
                self.report_progress(
                    0.1 + 0.5 * done as f64 / total as f64,
                    &format!("loading {}", source.name),
                );
                let rows = self.read_source(source)?;
                self.stats.increment_files_processed();
                loaded.push((index, rows));
            }
            Ok(loaded)
        }
    }

    /* ------------------------------------------------------------------
    strategy implementations
    ------------------------------------------------------------------ */
    /// Append: every data row of every source, in source order,
    /// re-projected onto the merged schema.
    fn append_merge(
        &self,
        merged: &[String],
        header_by_source: &HashMap<usize, &Vec<String>>,
        loaded: Vec<(usize, Vec<Row>)>,
    ) -> Vec<Row> {
        let mut out = Vec::new();
        for (source_index, rows) in loaded {
            let projection = header_by_source
                .get(&source_index)
                .map(|headers| projection_map(headers, merged));
            for row in rows {
                self.stats.add_rows_processed(1);
                out.push(match &projection {
                    Some(map) => project_row(&row, map, merged.len()),
                    None => row,
                });
            }
        }
        out
    }

    /// Smart merge: cluster rows by the deduplication strategy, resolve
    /// conflicts in place, and keep first-appearance output order.
    fn smart_merge(
        &self,
        merged: &[String],
        header_by_source: &HashMap<usize, &Vec<String>>,
        loaded: Vec<(usize, Vec<Row>)>,
        schema_aware: bool,
    ) -> Result<Vec<Row>, MergeError> {
        // time-based merging defaults conflict resolution to the newest
        // row by the configured time column
        let mut effective = self.config.clone();
        if self.config.strategy == MergeStrategy::TimeBased {
            effective.conflict_resolution = ConflictResolution::KeepNewest;
        }
        let resolver = DuplicateResolver::new(&effective);

        if schema_aware {
            self.report_column_types(merged, header_by_source, &loaded);
        }

        let mut kept: Vec<KeptRow> = Vec::new();
        let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();
        for (source_index, rows) in loaded {
            let priority = self.sources[source_index].priority;
            let projection = if schema_aware {
                header_by_source
                    .get(&source_index)
                    .map(|headers| projection_map(headers, merged))
            } else {
                None
            };
            for row in rows {
                self.stats.add_rows_processed(1);
                let row = match &projection {
                    Some(map) => {
                        let projected = project_row(&row, map, merged.len());
                        if projected != row {
                            self.stats.increment_schema_adjustments();
                        }
                        projected
                    }
                    None => row,
                };
                self.absorb_row(&resolver, &mut kept, &mut buckets, merged, row, priority)?;
            }
        }
        Ok(kept.into_iter().map(|kept| kept.fields).collect())
    }

    /// Fold one row into the kept set, resolving against an equivalent
    /// earlier row when the deduplication strategy finds one.
    fn absorb_row(
        &self,
        resolver: &DuplicateResolver<'_>,
        kept: &mut Vec<KeptRow>,
        buckets: &mut HashMap<String, Vec<usize>>,
        headers: &[String],
        row: Row,
        priority: i32,
    ) -> Result<(), MergeError> {
        // keyed strategies narrow the comparison to a hash bucket; fuzzy
        // and custom predicates have no key and scan the kept rows
        let bucket_key = match self.config.dedup {
            DedupStrategy::None => {
                kept.push(KeptRow { fields: row, priority });
                return Ok(());
            }
            DedupStrategy::Exact | DedupStrategy::ContentHash => Some(content_hash(&row)),
            DedupStrategy::KeyBased => {
                let key = resolver.generate_key(&row, headers);
                if key.is_empty() {
                    kept.push(KeptRow { fields: row, priority });
                    return Ok(());
                }
                Some(key)
            }
            DedupStrategy::Fuzzy | DedupStrategy::Custom => None,
        };

        let candidates: Vec<usize> = match &bucket_key {
            Some(key) => buckets.get(key).cloned().unwrap_or_default(),
            None => (0..kept.len()).collect(),
        };
        for index in candidates {
            if resolver.are_duplicates(&row, &kept[index].fields, headers) {
                let cluster = [
                    Candidate {
                        fields:   &kept[index].fields,
                        priority: kept[index].priority,
                    },
                    Candidate {
                        fields: &row,
                        priority,
                    },
                ];
                match resolver.resolve_conflict(&cluster, headers) {
                    Ok(winner) => {
                        if winner == row {
                            kept[index].priority = priority;
                        }
                        kept[index].fields = winner;
                        self.stats.increment_duplicates_removed();
                        self.stats.increment_conflicts_resolved();
                    }
                    Err(e) => {
                        self.report_error(MergeErrorKind::DuplicateResolution, &e.to_string());
                        if !self.config.continue_on_error {
                            return Err(e);
                        }
                    }
                }
                return Ok(());
            }
        }
        let new_index = kept.len();
        kept.push(KeptRow { fields: row, priority });
        if let Some(key) = bucket_key {
            buckets.entry(key).or_default().push(new_index);
        }
        Ok(())
    }

    /// Report per-column type inconsistencies across sources through the
    /// statistics register.
    fn report_column_types(
        &self,
        merged: &[String],
        header_by_source: &HashMap<usize, &Vec<String>>,
        loaded: &[(usize, Vec<Row>)],
    ) {
        for (column_index, column) in merged.iter().enumerate() {
            let mut seen: Option<ColumnType> = None;
            let mut inconsistent = false;
            for (source_index, rows) in loaded {
                let position = header_by_source
                    .get(source_index)
                    .and_then(|headers| headers.iter().position(|h| h == column));
                let Some(position) = position else { continue };
                let inferred = infer_column_type(rows, position);
                if inferred == ColumnType::Empty {
                    continue;
                }
                match seen {
                    Some(previous) if previous != inferred => inconsistent = true,
                    Some(_) => {}
                    None => seen = Some(inferred),
                }
            }
            if inconsistent {
                self.stats.increment_type_inconsistencies();
                info!(
                    target: LOG_TARGET,
                    "column {column} (index {column_index}) has inconsistent types across sources"
                );
            }
        }
    }

    /* ------------------------------------------------------------------
    source reading
    ------------------------------------------------------------------ */
    /// Header names of one source, with column mappings applied; sources
    /// without a header row get positional names.
    fn read_source_headers(&self, source: &InputSource) -> Result<Vec<String>, MergeError> {
        let mut reader = self.open_reader(source)?;
        let mut record = csv::StringRecord::new();
        let has_record = reader.read_record(&mut record).map_err(|e| {
            self.parse_error(&source.path, &e.to_string())
        })?;
        if !has_record {
            return Ok(Vec::new());
        }
        if source.has_header {
            Ok(record
                .iter()
                .map(|name| {
                    self.config
                        .column_mappings
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| name.to_string())
                })
                .collect())
        } else {
            Ok((1..=record.len()).map(|i| format!("column_{i}")).collect())
        }
    }

    /// All data rows of one source, with filters applied.
    fn read_source(&self, source: &InputSource) -> Result<Vec<Row>, MergeError> {
        let mut reader = self.open_reader(source)?;
        let mut rows = Vec::new();
        for (index, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(e) => {
                    let err = self.parse_error(&source.path, &e.to_string());
                    self.report_error(MergeErrorKind::Parse, &err.to_string());
                    if self.config.continue_on_error {
                        continue;
                    }
                    return Err(err);
                }
            };
            if index == 0 && source.has_header {
                continue;
            }
            self.stats
                .add_bytes_processed((record.as_slice().len() + record.len()) as u64);
            let row: Row = record.iter().map(|field| field.to_string()).collect();
            if self.row_excluded(&row) {
                continue;
            }
            rows.push(row);
        }
        Ok(rows)
    }

    fn open_reader(
        &self,
        source: &InputSource,
    ) -> Result<csv::Reader<std::fs::File>, MergeError> {
        csv::ReaderBuilder::new()
            .has_headers(false) // headers are handled explicitly
            .delimiter(source.delimiter as u8)
            .flexible(true)
            .from_path(&source.path)
            .map_err(|e| self.parse_error(&source.path, &e.to_string()))
    }

    /// True when a configured filter rejects the row.
    fn row_excluded(&self, row: &Row) -> bool {
        if let Some(filter) = &self.config.custom_filter {
            if !filter(row) {
                return true;
            }
        }
        if self.config.exclude_patterns.is_empty() {
            return false;
        }
        let joined = row.join(",");
        self.config
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.is_match(&joined))
    }

    fn parse_error(&self, path: &str, reason: &str) -> MergeError {
        MergeError::Parse {
            path:   path.to_string(),
            reason: reason.to_string(),
        }
    }

    /* ------------------------------------------------------------------
    callbacks
    ------------------------------------------------------------------ */
    fn report_progress(&self, fraction: f64, phase: &str) {
        if let Some(callback) = &self.progress_callback {
            callback(fraction, phase);
        }
    }

    fn report_error(&self, kind: MergeErrorKind, message: &str) {
        error!(target: LOG_TARGET, "{message}");
        self.stats.record_error(kind, message);
        if let Some(callback) = &self.error_callback {
            callback(kind, message);
        }
    }
}

/* ------------------------------------------------------------------
schema harmonization
------------------------------------------------------------------ */
/// Merged schema over per-source `(priority, headers)` pairs: identical
/// headers keep their order; otherwise the union is alphabetical, or in
/// first-appearance order over descending priority when any source
/// declares one.
fn merged_schema(per_source: &[(i32, Vec<String>)]) -> Vec<String> {
    let first = &per_source[0].1;
    if per_source.iter().all(|(_, headers)| headers == first) {
        return first.clone();
    }
    let prioritized = per_source.iter().any(|(priority, _)| *priority != 0);
    let mut merged = Vec::new();
    if prioritized {
        let mut order: Vec<&(i32, Vec<String>)> = per_source.iter().collect();
        order.sort_by_key(|(priority, _)| std::cmp::Reverse(*priority));
        for (_, headers) in order {
            for header in headers {
                if !merged.contains(header) {
                    merged.push(header.clone());
                }
            }
        }
    } else {
        for (_, headers) in per_source {
            for header in headers {
                if !merged.contains(header) {
                    merged.push(header.clone());
                }
            }
        }
        merged.sort();
    }
    merged
}

/// For each merged column, the position of that column in the source
/// header, if present.
fn projection_map(source_headers: &[String], merged: &[String]) -> Vec<Option<usize>> {
    merged
        .iter()
        .map(|name| source_headers.iter().position(|h| h == name))
        .collect()
}

/// Re-project a source row onto the merged schema; missing columns
/// become empty fields.
fn project_row(row: &Row, map: &[Option<usize>], width: usize) -> Row {
    let mut projected = Vec::with_capacity(width);
    for position in map {
        projected.push(
            position
                .and_then(|i| row.get(i))
                .cloned()
                .unwrap_or_default(),
        );
    }
    projected
}

/* ------------------------------------------------------------------
column type inference
------------------------------------------------------------------ */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Empty,
    Boolean,
    Integer,
    Float,
    Timestamp,
    Text,
}

fn detect_type(value: &str) -> ColumnType {
    let value = value.trim();
    if value.is_empty() {
        return ColumnType::Empty;
    }
    if value.eq_ignore_ascii_case("true") || value.eq_ignore_ascii_case("false") {
        return ColumnType::Boolean;
    }
    if value.parse::<i64>().is_ok() {
        return ColumnType::Integer;
    }
    if value.parse::<f64>().is_ok() {
        return ColumnType::Float;
    }
    if parse_timestamp(value).is_some() {
        return ColumnType::Timestamp;
    }
    ColumnType::Text
}

/// The most specific type consistent with every non-empty value in the
/// column; integers widen to floats, anything else degrades to text.
fn infer_column_type(rows: &[Row], position: usize) -> ColumnType {
    let mut inferred = ColumnType::Empty;
    for row in rows {
        let Some(value) = row.get(position) else { continue };
        let detected = detect_type(value);
        inferred = match (inferred, detected) {
            (current, ColumnType::Empty) => current,
            (ColumnType::Empty, next) => next,
            (current, next) if current == next => current,
            (ColumnType::Integer, ColumnType::Float) | (ColumnType::Float, ColumnType::Integer) => {
                ColumnType::Float
            }
            _ => ColumnType::Text,
        };
        if inferred == ColumnType::Text {
            break;
        }
    }
    inferred
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn identical_headers_keep_their_order() {
        let per_source = vec![
            (0, headers(&["id", "name", "email"])),
            (0, headers(&["id", "name", "email"])),
        ];
        assert_eq!(merged_schema(&per_source), headers(&["id", "name", "email"]));
    }

    #[test]
    fn mixed_headers_union_alphabetically() {
        let per_source = vec![
            (0, headers(&["id", "name"])),
            (0, headers(&["id", "email"])),
        ];
        assert_eq!(merged_schema(&per_source), headers(&["email", "id", "name"]));
    }

    #[test]
    fn prioritized_headers_union_by_priority() {
        let per_source = vec![
            (1, headers(&["id", "name"])),
            (5, headers(&["id", "email"])),
        ];
        assert_eq!(merged_schema(&per_source), headers(&["id", "email", "name"]));
    }

    #[test]
    fn projection_pads_missing_columns() {
        let source = headers(&["id", "name"]);
        let merged = headers(&["email", "id", "name"]);
        let map = projection_map(&source, &merged);
        let projected = project_row(&vec!["1".to_string(), "John".to_string()], &map, 3);
        assert_eq!(projected, vec!["", "1", "John"]);
    }

    #[test]
    fn type_detection() {
        assert_eq!(detect_type("42"), ColumnType::Integer);
        assert_eq!(detect_type("4.2"), ColumnType::Float);
        assert_eq!(detect_type("true"), ColumnType::Boolean);
        assert_eq!(detect_type("2026-07-31"), ColumnType::Timestamp);
        assert_eq!(detect_type("host.example.com"), ColumnType::Text);
        assert_eq!(detect_type(""), ColumnType::Empty);
    }

    #[test]
    fn column_type_widens_integers_to_floats() {
        let rows = vec![
            vec!["1".to_string()],
            vec!["2.5".to_string()],
            vec!["".to_string()],
        ];
        assert_eq!(infer_column_type(&rows, 0), ColumnType::Float);
    }
}
