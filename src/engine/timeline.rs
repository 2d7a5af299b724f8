//! Timeline engine: date-bounded aggregation over inspection observations.
//!
//! One `run_analysis` call owns its raw result set for the duration of the
//! query; every derived structure is recomputed in full from it, never
//! patched incrementally. Category and systemic-issue drill-downs narrow
//! the visible row subset without touching the derived rows themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::api::{ApiError, InspectionApi, TimeAnalysisResponse};
use crate::engine::derive::{
    category_tokens, derive_view, DerivedView, REPEAT_ISSUE_DISPLAY_CAP,
};
use crate::engine::{RequestSequence, RequestToken};
use crate::error::EngineError;
use crate::models::{CategoryTally, ObservationRow, RepeatIssueEntry, TimelineRecord};

/// User message when the backend reports the no-documents sentinel.
pub const MSG_NO_DOCUMENTS: &str = "No documents found from the selected date range";

/// User message for a transport or decode failure.
pub const MSG_FETCH_FAILED: &str = "Failed to fetch data, Please try again";

/// User message when a date bound is missing.
pub const MSG_MISSING_BOUNDS: &str = "Select both a start and end date to run the analysis";

/// Lifecycle of the timeline engine.
///
/// `Empty → Loading → {Loaded, Failed, Empty}`; a loaded view toggles
/// between `Loaded` and `Filtered` on drill-down and reset. The sentinel
/// response lands in `Empty`, which is distinct from `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisState {
    Empty,
    Loading,
    Loaded,
    Failed,
    /// Drill-down active on the named category.
    Filtered(String),
}

/// Headline numbers for a completed analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalysisSummary {
    pub observation_count: usize,
    pub company_count: usize,
    pub file_count: usize,
}

/// Holds one date-bounded result set and the views derived from it.
pub struct TimelineEngine {
    api: Arc<dyn InspectionApi>,
    records: Vec<TimelineRecord>,
    view: DerivedView,
    visible: Vec<ObservationRow>,
    state: AnalysisState,
    analysis_seq: RequestSequence,
}

impl TimelineEngine {
    pub fn new(api: Arc<dyn InspectionApi>) -> Self {
        Self {
            api,
            records: Vec::new(),
            view: DerivedView::default(),
            visible: Vec::new(),
            state: AnalysisState::Empty,
            analysis_seq: RequestSequence::default(),
        }
    }

    pub fn state(&self) -> &AnalysisState {
        &self.state
    }

    /// The raw records behind the current view.
    pub fn records(&self) -> &[TimelineRecord] {
        &self.records
    }

    /// All derived rows, regardless of any active drill-down.
    pub fn rows(&self) -> &[ObservationRow] {
        &self.view.rows
    }

    /// The rows currently visible after any drill-down.
    pub fn visible_rows(&self) -> &[ObservationRow] {
        &self.visible
    }

    pub fn category_tallies(&self) -> &[CategoryTally] {
        &self.view.category_tallies
    }

    /// Every systemic issue entry, uncapped.
    pub fn repeat_issues(&self) -> &[RepeatIssueEntry] {
        &self.view.repeat_issues
    }

    /// The capped slice the systemic-issues panel displays.
    pub fn display_repeat_issues(&self) -> &[RepeatIssueEntry] {
        let cap = self.view.repeat_issues.len().min(REPEAT_ISSUE_DISPLAY_CAP);
        &self.view.repeat_issues[..cap]
    }

    pub fn company_count(&self) -> usize {
        self.view.company_count
    }

    pub fn file_count(&self) -> usize {
        self.view.file_count
    }

    /// The category an active drill-down is narrowed to, if any.
    pub fn active_category(&self) -> Option<&str> {
        match &self.state {
            AnalysisState::Filtered(category) => Some(category),
            _ => None,
        }
    }

    /// Run the date-bounded analysis. Both bounds are required: a missing
    /// one blocks the action before any request is issued. Bounds are sent
    /// as millisecond epoch timestamps.
    pub async fn run_analysis(
        &mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<AnalysisSummary, EngineError> {
        let (start, end) = match (start, end) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(EngineError::Validation(MSG_MISSING_BOUNDS.to_string())),
        };

        let token = self.begin_analysis();
        let result = self
            .api
            .fetch_time_analysis(start.timestamp_millis(), end.timestamp_millis())
            .await;
        self.apply_analysis(token, result)
    }

    /// Issue a token for an analysis fetch and enter `Loading`.
    pub fn begin_analysis(&mut self) -> RequestToken {
        self.state = AnalysisState::Loading;
        self.analysis_seq.issue()
    }

    /// Apply an analysis response. A response whose token has been
    /// superseded is discarded without touching state; otherwise the raw
    /// result set is replaced and every derived view recomputed, with the
    /// visible subset defaulting to all rows.
    pub fn apply_analysis(
        &mut self,
        token: RequestToken,
        result: Result<TimeAnalysisResponse, ApiError>,
    ) -> Result<AnalysisSummary, EngineError> {
        if !self.analysis_seq.is_latest(token) {
            return Err(EngineError::Superseded);
        }
        match result {
            Ok(TimeAnalysisResponse::Records(records)) => {
                debug!(records = records.len(), "analysis result received");
                self.replace_records(records);
                self.state = AnalysisState::Loaded;
                Ok(self.summary())
            }
            Ok(TimeAnalysisResponse::NoDocuments) => {
                self.replace_records(Vec::new());
                self.state = AnalysisState::Empty;
                Err(EngineError::EmptyResult(MSG_NO_DOCUMENTS.to_string()))
            }
            Err(err) => {
                warn!(error = %err, "analysis fetch failed");
                self.replace_records(Vec::new());
                self.state = AnalysisState::Failed;
                Err(EngineError::Transport(MSG_FETCH_FAILED.to_string()))
            }
        }
    }

    fn replace_records(&mut self, records: Vec<TimelineRecord>) {
        self.records = records;
        self.view = derive_view(&self.records);
        self.visible = self.view.rows.clone();
    }

    fn summary(&self) -> AnalysisSummary {
        AnalysisSummary {
            observation_count: self.view.rows.len(),
            company_count: self.view.company_count,
            file_count: self.view.file_count,
        }
    }

    /// Narrow the visible rows to one category (exact label match).
    pub fn filter_by_category(&mut self, label: &str) {
        self.visible = self
            .view
            .rows
            .iter()
            .filter(|row| row.category == label)
            .cloned()
            .collect();
        self.state = AnalysisState::Filtered(label.to_string());
    }

    /// Drill down from a clicked systemic-issue phrase.
    ///
    /// Two-step resolution: first find the repeat-linked rows whose category
    /// tokens appear inside the phrase, then narrow ALL rows to the most
    /// frequent category among those matches (ties broken by first
    /// encountered in the descending-count sort). If no repeat-linked row
    /// matches, the visible set is left unchanged and no filter applies.
    pub fn filter_by_systemic_issue(&mut self, phrase: &str) {
        let lowered_phrase = phrase.to_lowercase();
        let matched: Vec<&ObservationRow> = self
            .view
            .rows
            .iter()
            .filter(|row| row.issue_identified)
            .filter(|row| {
                category_tokens(&row.category)
                    .iter()
                    .any(|token| lowered_phrase.contains(token.as_str()))
            })
            .collect();

        if matched.is_empty() {
            debug!(%phrase, "no repeat-linked rows match phrase; leaving view unchanged");
            return;
        }

        let mut counts: Vec<(String, usize)> = Vec::new();
        for row in matched {
            match counts.iter_mut().find(|(label, _)| *label == row.category) {
                Some((_, count)) => *count += 1,
                None => counts.push((row.category.clone(), 1)),
            }
        }
        // Stable sort keeps first-encountered order among equal counts.
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        let top_category = counts[0].0.clone();
        self.filter_by_category(&top_category);
    }

    /// Clear any drill-down; visible rows become the full derived row list.
    pub fn reset_to_all(&mut self) {
        self.visible = self.view.rows.clone();
        if matches!(self.state, AnalysisState::Filtered(_)) {
            self.state = AnalysisState::Loaded;
        }
    }
}
