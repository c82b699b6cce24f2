//! Row equivalence and conflict arbitration.
//!
//! The resolver decides whether two rows are the same logical record
//! under the configured deduplication strategy, and picks the winner
//! among a cluster of equivalent rows under the configured conflict
//! resolution.

// dependencies
use std::collections::HashSet;
use crate::error::MergeError;
use crate::fingerprint::content_hash;
use crate::merge::{ConflictResolution, DedupStrategy, MergeConfig};
use crate::row::Row;
use crate::timestamp::parse_timestamp;

/// One member of a duplicate cluster, with the priority of the source it
/// came from. Priority is consulted only by `PrioritySource`.
pub struct Candidate<'a> {
    pub fields:   &'a Row,
    pub priority: i32,
}

/// Strategy-driven duplicate detection and conflict resolution.
pub struct DuplicateResolver<'a> {
    config: &'a MergeConfig,
}

impl<'a> DuplicateResolver<'a> {
    pub fn new(config: &'a MergeConfig) -> Self {
        DuplicateResolver { config }
    }

    /* ------------------------------------------------------------------
    duplicate detection
    ------------------------------------------------------------------ */
    /// Decide equivalence of two rows under the configured strategy.
    pub fn are_duplicates(&self, row1: &[String], row2: &[String], headers: &[String]) -> bool {
        match self.config.dedup {
            DedupStrategy::None => false,
            DedupStrategy::Exact => row1 == row2,
            DedupStrategy::KeyBased => {
                let key1 = self.generate_key(row1, headers);
                !key1.is_empty() && key1 == self.generate_key(row2, headers)
            }
            DedupStrategy::Fuzzy => self.fuzzy_match(row1, row2),
            DedupStrategy::ContentHash => content_hash(row1) == content_hash(row2),
            DedupStrategy::Custom => match &self.config.custom_dedup {
                Some(predicate) => predicate(row1, row2),
                None => false,
            },
        }
    }

    /// Project a row onto the key columns, normalized per configuration.
    /// Returns the empty string when no key column is present.
    pub fn generate_key(&self, row: &[String], headers: &[String]) -> String {
        let mut key = String::new();
        for key_column in &self.config.key_columns {
            if let Some(index) = headers.iter().position(|h| h == key_column) {
                let mut value = row.get(index).cloned().unwrap_or_default();
                if self.config.trim_key_whitespace {
                    value = value.trim().to_string();
                }
                if !self.config.case_sensitive_keys {
                    value = value.to_lowercase();
                }
                key.push_str(&value);
                key.push('|');
            }
        }
        key
    }

    fn fuzzy_match(&self, row1: &[String], row2: &[String]) -> bool {
        if row1.len() != row2.len() {
            return false;
        }
        let mut total = 0.0;
        let mut compared = 0usize;
        for (a, b) in row1.iter().zip(row2) {
            if !a.is_empty() || !b.is_empty() {
                total += self.calculate_similarity(a, b);
                compared += 1;
            }
        }
        if compared == 0 {
            return false;
        }
        total / compared as f64 >= self.config.fuzzy_threshold
    }

    /* ------------------------------------------------------------------
    string similarity
    ------------------------------------------------------------------ */
    /// Weighted similarity in `[0, 1]`: 0.7 Levenshtein + 0.3 Jaccard
    /// over character bigrams. Equal strings score 1.0; a single empty
    /// side scores 0.0.
    pub fn calculate_similarity(&self, str1: &str, str2: &str) -> f64 {
        if str1 == str2 {
            return 1.0;
        }
        if str1.is_empty() || str2.is_empty() {
            return 0.0;
        }
        0.7 * levenshtein_similarity(str1, str2) + 0.3 * jaccard_similarity(str1, str2)
    }

    /* ------------------------------------------------------------------
    conflict resolution
    ------------------------------------------------------------------ */
    /// Select the winner among a cluster of duplicate rows.
    pub fn resolve_conflict(
        &self,
        candidates: &[Candidate],
        headers: &[String],
    ) -> Result<Row, MergeError> {
        let first = candidates.first().ok_or_else(|| {
            MergeError::DuplicateResolution("empty duplicate cluster".to_string())
        })?;
        if candidates.len() == 1 {
            return Ok(first.fields.clone());
        }
        match self.config.conflict_resolution {
            ConflictResolution::KeepFirst => Ok(first.fields.clone()),
            ConflictResolution::KeepLast => {
                Ok(candidates.last().expect("nonempty cluster").fields.clone())
            }
            ConflictResolution::KeepNewest => {
                Ok(self.select_by_timestamp(candidates, headers, true))
            }
            ConflictResolution::KeepOldest => {
                Ok(self.select_by_timestamp(candidates, headers, false))
            }
            ConflictResolution::MergeValues => Ok(merge_values(candidates)),
            ConflictResolution::PrioritySource => {
                let mut best = first;
                for candidate in &candidates[1..] {
                    if candidate.priority > best.priority {
                        best = candidate;
                    }
                }
                Ok(best.fields.clone())
            }
            ConflictResolution::Custom => {
                let resolver = self.config.custom_resolver.as_ref().ok_or_else(|| {
                    MergeError::DuplicateResolution("no custom resolver configured".to_string())
                })?;
                let rows: Vec<Row> = candidates.iter().map(|c| c.fields.clone()).collect();
                resolver(&rows).ok_or_else(|| {
                    MergeError::DuplicateResolution("custom resolver returned no winner".to_string())
                })
            }
        }
    }

    /// Pick the row with the newest (or oldest) parseable timestamp.
    /// Unparseable timestamps lose to parseable ones; a full tie falls
    /// back to the last (newest) or first (oldest) position.
    fn select_by_timestamp(
        &self,
        candidates: &[Candidate],
        headers: &[String],
        keep_newest: bool,
    ) -> Row {
        let ts_index = self
            .config
            .time_column
            .as_ref()
            .and_then(|column| headers.iter().position(|h| h == column));
        let timestamp_of = |candidate: &Candidate| {
            ts_index
                .and_then(|i| candidate.fields.get(i))
                .and_then(|value| parse_timestamp(value))
        };
        let mut best = 0usize;
        let mut best_ts = timestamp_of(&candidates[0]);
        for (i, candidate) in candidates.iter().enumerate().skip(1) {
            let ts = timestamp_of(candidate);
            let replace = match (&ts, &best_ts) {
                (Some(a), Some(b)) => {
                    if keep_newest {
                        a >= b // tie breaks toward the last occurrence
                    } else {
                        a < b // tie breaks toward the first occurrence
                    }
                }
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => keep_newest,
            };
            if replace {
                best = i;
                best_ts = ts;
            }
        }
        candidates[best].fields.clone()
    }
}

/* ------------------------------------------------------------------
similarity metrics
------------------------------------------------------------------ */
/// Levenshtein distance normalized to `1 - d / max(|a|, |b|)`.
fn levenshtein_similarity(str1: &str, str2: &str) -> f64 {
    let a: Vec<char> = str1.chars().collect();
    let b: Vec<char> = str2.chars().collect();
    if a.is_empty() {
        return if b.is_empty() { 1.0 } else { 0.0 };
    }
    if b.is_empty() {
        return 0.0;
    }
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0usize; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }
    let distance = previous[b.len()];
    1.0 - distance as f64 / a.len().max(b.len()) as f64
}

/// Jaccard similarity over character bigram sets.
fn jaccard_similarity(str1: &str, str2: &str) -> f64 {
    let bigrams = |s: &str| -> HashSet<(char, char)> {
        let chars: Vec<char> = s.chars().collect();
        chars.windows(2).map(|w| (w[0], w[1])).collect()
    };
    let set1 = bigrams(str1);
    let set2 = bigrams(str2);
    if set1.is_empty() && set2.is_empty() {
        return 1.0;
    }
    if set1.is_empty() || set2.is_empty() {
        return 0.0;
    }
    let intersection = set1.intersection(&set2).count();
    let union = set1.len() + set2.len() - intersection;
    intersection as f64 / union as f64
}

/// Per column, take the modal non-empty value across the cluster; ties
/// break toward the value seen first.
fn merge_values(candidates: &[Candidate]) -> Row {
    let max_cols = candidates
        .iter()
        .map(|c| c.fields.len())
        .max()
        .unwrap_or(0);
    let mut merged = vec![String::new(); max_cols];
    for (col, slot) in merged.iter_mut().enumerate() {
        // insertion order preserved so the tie-break is deterministic
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for candidate in candidates {
            match candidate.fields.get(col) {
                Some(value) if !value.is_empty() => {
                    match counts.iter_mut().find(|(v, _)| *v == value.as_str()) {
                        Some((_, count)) => *count += 1,
                        None => counts.push((value.as_str(), 1)),
                    }
                }
                _ => {}
            }
        }
        if let Some((value, _)) = counts.iter().max_by_key(|(_, count)| *count) {
            *slot = value.to_string();
        }
    }
    merged
}
