//! Pure derivation of aggregate views from raw timeline records.
//!
//! Everything here is synchronous and side-effect-free: the timeline engine
//! calls [`derive_view`] eagerly after every raw-result change rather than
//! relying on any implicit recomputation.

use std::collections::HashSet;

use crate::models::{CategoryTally, ObservationRow, RepeatIssueEntry, TimelineRecord};

/// Minimum character count for a repeat-finding phrase to surface as a
/// systemic issue entry (strictly greater than).
pub const REPEAT_ISSUE_MIN_LEN: usize = 30;

/// Category tokens shorter than or equal to this are ignored by the
/// repeat-finding linkage heuristic.
pub const MIN_LINK_TOKEN_LEN: usize = 3;

/// How many systemic issue entries the display surfaces. All entries are
/// retained internally; only the view is capped.
pub const REPEAT_ISSUE_DISPLAY_CAP: usize = 6;

/// Aggregate view derived from one raw timeline result set.
#[derive(Debug, Clone, Default)]
pub struct DerivedView {
    /// One row per observation (or per record when it has none).
    pub rows: Vec<ObservationRow>,
    /// Distinct company names across the records.
    pub company_count: usize,
    /// Number of source records, not rows.
    pub file_count: usize,
    /// Per-category row counts in first-seen order.
    pub category_tallies: Vec<CategoryTally>,
    /// Every repeat-finding phrase longer than [`REPEAT_ISSUE_MIN_LEN`],
    /// duplicates included, in record order then phrase order.
    pub repeat_issues: Vec<RepeatIssueEntry>,
}

/// Lowercased whitespace tokens of a category that are long enough to take
/// part in repeat-finding linkage.
pub fn category_tokens(category: &str) -> Vec<String> {
    category
        .to_lowercase()
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_LINK_TOKEN_LEN)
        .map(str::to_string)
        .collect()
}

/// Whether a row category lexically overlaps any repeat-finding phrase.
///
/// A deliberately loose heuristic: any sufficiently long category token
/// appearing as a substring of any lowercased phrase counts, first match
/// short-circuits.
fn links_to_repeat_finding(category: &str, lowered_phrases: &[String]) -> bool {
    if category.is_empty() || lowered_phrases.is_empty() {
        return false;
    }
    category_tokens(category)
        .iter()
        .any(|token| lowered_phrases.iter().any(|phrase| phrase.contains(token)))
}

/// Flatten one record into rows carrying the parent's identity fields.
///
/// A record with k > 0 observations yields exactly k rows; a record with
/// none yields exactly one row built from its legacy fallback fields, so
/// every record contributes at least one row.
fn flatten_record(record: &TimelineRecord) -> Vec<ObservationRow> {
    let lowered_phrases: Vec<String> = record
        .repeat_finding
        .iter()
        .map(|phrase| phrase.to_lowercase())
        .collect();

    let make_row = |summary: String, category: String, cfr_number: String| ObservationRow {
        company_name: record.company_name.clone(),
        fei_number: record.fei_number.clone(),
        url: record.url.clone(),
        date: record.inspection_date,
        issue_identified: links_to_repeat_finding(&category, &lowered_phrases),
        summary,
        category,
        cfr_number,
    };

    if record.observations.is_empty() {
        vec![make_row(
            record.summary.clone().unwrap_or_default(),
            record.category.clone().unwrap_or_default(),
            record.cfr_number.clone().unwrap_or_default(),
        )]
    } else {
        record
            .observations
            .iter()
            .map(|obs| {
                make_row(
                    obs.summary.clone(),
                    obs.category.clone().unwrap_or_default(),
                    obs.cfr_number.clone().unwrap_or_default(),
                )
            })
            .collect()
    }
}

/// Tally rows by non-empty category, preserving first-seen order.
fn tally_categories(rows: &[ObservationRow]) -> Vec<CategoryTally> {
    let mut tallies: Vec<CategoryTally> = Vec::new();
    for row in rows {
        if row.category.is_empty() {
            continue;
        }
        match tallies.iter_mut().find(|t| t.label == row.category) {
            Some(tally) => tally.count += 1,
            None => tallies.push(CategoryTally {
                label: row.category.clone(),
                count: 1,
            }),
        }
    }
    tallies
}

/// Collect repeat-finding phrases long enough to surface as systemic issues.
fn collect_repeat_issues(records: &[TimelineRecord]) -> Vec<RepeatIssueEntry> {
    records
        .iter()
        .flat_map(|record| record.repeat_finding.iter())
        .filter(|phrase| phrase.chars().count() > REPEAT_ISSUE_MIN_LEN)
        .map(|phrase| RepeatIssueEntry {
            label: phrase.clone(),
        })
        .collect()
}

/// Derive the full aggregate view from a raw result set.
pub fn derive_view(records: &[TimelineRecord]) -> DerivedView {
    let rows: Vec<ObservationRow> = records.iter().flat_map(flatten_record).collect();

    let companies: HashSet<&str> = records
        .iter()
        .map(|record| record.company_name.as_str())
        .collect();

    DerivedView {
        category_tallies: tally_categories(&rows),
        repeat_issues: collect_repeat_issues(records),
        company_count: companies.len(),
        file_count: records.len(),
        rows,
    }
}
