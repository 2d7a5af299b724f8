//! Tests for the timeline engine: flattening, aggregation, repeat-finding
//! linkage, drill-down filters, the state machine, and the stale guard.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use common::{legacy_record, record, FakeApi};
use trend483::api::TimeAnalysisResponse;
use trend483::engine::timeline::{MSG_FETCH_FAILED, MSG_NO_DOCUMENTS};
use trend483::notify::Severity;
use trend483::{AnalysisState, EngineError, TimelineEngine};

fn engine_with_records(records: Vec<trend483::TimelineRecord>) -> (Arc<FakeApi>, TimelineEngine) {
    let api = Arc::new(FakeApi::with_analysis(Ok(TimeAnalysisResponse::Records(
        records,
    ))));
    (api.clone(), TimelineEngine::new(api))
}

async fn run_default(engine: &mut TimelineEngine) {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).single();
    engine
        .run_analysis(start, end)
        .await
        .expect("analysis should succeed");
}

// ============================================================================
// flattening
// ============================================================================

#[tokio::test]
async fn each_record_contributes_observation_rows_or_one_fallback_row() {
    let (_, mut engine) = engine_with_records(vec![
        record(
            "Acme Pharma",
            &[("First finding", "Documentation"), ("Second finding", "QA")],
            &[],
        ),
        legacy_record("Beacon Biologics", "Legacy-only finding", "Cleaning Validation"),
    ]);
    run_default(&mut engine).await;

    assert_eq!(engine.rows().len(), 3);
    assert_eq!(engine.file_count(), 2);
    assert_eq!(engine.company_count(), 2);

    let fallback = &engine.rows()[2];
    assert_eq!(fallback.company_name, "Beacon Biologics");
    assert_eq!(fallback.summary, "Legacy-only finding");
    assert_eq!(fallback.category, "Cleaning Validation");
}

#[tokio::test]
async fn derivation_links_repeat_findings_and_tallies_categories() {
    // One record with an observation whose category overlaps its repeat
    // finding, one legacy record without.
    let (_, mut engine) = engine_with_records(vec![
        record(
            "Acme Pharma",
            &[("Change control gap", "Documentation")],
            &["Documentation control gap across sites"],
        ),
        legacy_record("Beacon Biologics", "QA oversight lapse", "QA"),
    ]);
    run_default(&mut engine).await;

    let rows = engine.rows();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].issue_identified);
    assert!(!rows[1].issue_identified);

    let tallies: Vec<(&str, usize)> = engine
        .category_tallies()
        .iter()
        .map(|t| (t.label.as_str(), t.count))
        .collect();
    assert_eq!(tallies, vec![("Documentation", 1), ("QA", 1)]);
}

#[tokio::test]
async fn category_tallies_preserve_first_seen_order() {
    let (_, mut engine) = engine_with_records(vec![record(
        "Acme Pharma",
        &[("one", "A"), ("two", "B"), ("three", "A"), ("four", "C")],
        &[],
    )]);
    run_default(&mut engine).await;

    let tallies: Vec<(&str, usize)> = engine
        .category_tallies()
        .iter()
        .map(|t| (t.label.as_str(), t.count))
        .collect();
    assert_eq!(tallies, vec![("A", 2), ("B", 1), ("C", 1)]);
}

#[tokio::test]
async fn repeat_issues_keep_long_phrases_and_cap_the_display_view() {
    let long = "Documentation control appears deficient"; // 39 chars
    let (_, mut engine) = engine_with_records(vec![
        record("One", &[], &[long, "short phrase"]),
        record("Two", &[], &[long, long, long, long, long, long]),
    ]);
    run_default(&mut engine).await;

    // All qualifying phrases retained (duplicates included), view capped.
    assert_eq!(engine.repeat_issues().len(), 7);
    assert_eq!(engine.display_repeat_issues().len(), 6);
}

// ============================================================================
// run_analysis outcomes and state machine
// ============================================================================

#[tokio::test]
async fn missing_bound_blocks_the_analysis_without_a_request() {
    let api = Arc::new(FakeApi::new());
    let mut engine = TimelineEngine::new(api.clone());

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    let result = engine.run_analysis(start, None).await;

    match result {
        Err(err @ EngineError::Validation(_)) => {
            assert_eq!(err.severity(), Some(Severity::Warning));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(api.analysis_calls.load(Ordering::SeqCst), 0);
    assert_eq!(*engine.state(), AnalysisState::Empty);
}

#[tokio::test]
async fn bounds_are_sent_as_epoch_milliseconds() {
    let api = Arc::new(FakeApi::new());
    let mut engine = TimelineEngine::new(api.clone());

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).single();
    engine
        .run_analysis(start, end)
        .await
        .expect("analysis should succeed");

    let bounds = engine_bounds(&api);
    assert_eq!(bounds.0, start.unwrap().timestamp_millis());
    assert_eq!(bounds.1, end.unwrap().timestamp_millis());
}

fn engine_bounds(api: &FakeApi) -> (i64, i64) {
    api.last_analysis_bounds
        .lock()
        .expect("bounds lock poisoned")
        .expect("analysis should have been issued")
}

#[tokio::test]
async fn sentinel_response_clears_results_and_lands_in_empty() {
    let api = Arc::new(FakeApi::with_analysis(Ok(
        TimeAnalysisResponse::NoDocuments,
    )));
    let mut engine = TimelineEngine::new(api);

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(2024, 1, 31, 0, 0, 0).single();
    let result = engine.run_analysis(start, end).await;

    match result {
        Err(err @ EngineError::EmptyResult(_)) => {
            assert_eq!(err.to_string(), MSG_NO_DOCUMENTS);
            assert_eq!(err.severity(), Some(Severity::Error));
        }
        other => panic!("expected empty-result error, got {other:?}"),
    }
    assert!(engine.visible_rows().is_empty());
    assert_eq!(*engine.state(), AnalysisState::Empty);
}

#[tokio::test]
async fn transport_failure_clears_previous_results_and_lands_in_failed() {
    let (api, mut engine) =
        engine_with_records(vec![record("Acme Pharma", &[("finding", "QA")], &[])]);
    run_default(&mut engine).await;
    assert_eq!(engine.rows().len(), 1);

    api.push_analysis(Err("boom".to_string()));
    let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).single();
    let end = Utc.with_ymd_and_hms(2024, 2, 28, 0, 0, 0).single();
    let result = engine.run_analysis(start, end).await;

    match result {
        Err(err @ EngineError::Transport(_)) => {
            assert_eq!(err.to_string(), MSG_FETCH_FAILED);
            assert_eq!(err.severity(), Some(Severity::Error));
        }
        other => panic!("expected transport error, got {other:?}"),
    }
    assert!(engine.rows().is_empty());
    assert!(engine.visible_rows().is_empty());
    assert_eq!(*engine.state(), AnalysisState::Failed);
}

#[tokio::test]
async fn successful_analysis_defaults_the_visible_subset_to_all_rows() {
    let (_, mut engine) = engine_with_records(vec![record(
        "Acme Pharma",
        &[("one", "A"), ("two", "B")],
        &[],
    )]);
    run_default(&mut engine).await;

    assert_eq!(*engine.state(), AnalysisState::Loaded);
    assert_eq!(engine.visible_rows(), engine.rows());
}

// ============================================================================
// drill-down filters
// ============================================================================

#[tokio::test]
async fn category_filter_narrows_and_reset_restores_by_content() {
    let (_, mut engine) = engine_with_records(vec![record(
        "Acme Pharma",
        &[("one", "A"), ("two", "B"), ("three", "A")],
        &[],
    )]);
    run_default(&mut engine).await;
    let all_rows = engine.rows().to_vec();

    engine.filter_by_category("A");
    assert_eq!(engine.visible_rows().len(), 2);
    assert!(engine.visible_rows().iter().all(|r| r.category == "A"));
    assert_eq!(*engine.state(), AnalysisState::Filtered("A".to_string()));
    assert_eq!(engine.active_category(), Some("A"));

    engine.reset_to_all();
    assert_eq!(engine.visible_rows(), all_rows.as_slice());
    assert_eq!(*engine.state(), AnalysisState::Loaded);
    assert_eq!(engine.active_category(), None);
}

#[tokio::test]
async fn systemic_issue_click_filters_to_the_dominant_linked_category() {
    let phrase = "Documentation and quality control gaps across sites";
    let (_, mut engine) = engine_with_records(vec![
        record("One", &[("a", "Documentation")], &[phrase]),
        record("Two", &[("b", "Documentation")], &[phrase]),
        record("Three", &[("c", "Quality")], &[phrase]),
        record("Four", &[("d", "Sterility")], &[]),
    ]);
    run_default(&mut engine).await;

    engine.filter_by_systemic_issue(phrase);

    // Documentation outnumbers Quality among the linked rows, so all rows
    // narrow to it.
    assert_eq!(engine.active_category(), Some("Documentation"));
    assert_eq!(engine.visible_rows().len(), 2);
    assert!(engine
        .visible_rows()
        .iter()
        .all(|r| r.category == "Documentation"));
}

#[tokio::test]
async fn systemic_issue_click_without_linked_rows_changes_nothing() {
    let (_, mut engine) = engine_with_records(vec![
        record("One", &[("a", "Documentation")], &[]),
        record("Two", &[("b", "QA")], &[]),
    ]);
    run_default(&mut engine).await;

    engine.filter_by_systemic_issue("Documentation control gap across sites");

    assert_eq!(engine.visible_rows().len(), 2);
    assert_eq!(*engine.state(), AnalysisState::Loaded);
    assert_eq!(engine.active_category(), None);
}

// ============================================================================
// stale-response guard
// ============================================================================

// The product never guarded overlapping analyses; the engine resolves that
// open question by discarding any response whose token has been superseded.
#[tokio::test]
async fn superseded_analysis_response_is_discarded() {
    let api = Arc::new(FakeApi::new());
    let mut engine = TimelineEngine::new(api);

    let stale = engine.begin_analysis();
    let fresh = engine.begin_analysis();

    let outcome = engine.apply_analysis(
        stale,
        Ok(TimeAnalysisResponse::Records(vec![record(
            "Stale Co",
            &[("old", "A")],
            &[],
        )])),
    );
    assert!(matches!(outcome, Err(EngineError::Superseded)));
    assert!(engine.rows().is_empty());
    assert_eq!(*engine.state(), AnalysisState::Loading);

    let outcome = engine.apply_analysis(
        fresh,
        Ok(TimeAnalysisResponse::Records(vec![record(
            "Fresh Co",
            &[("new", "B")],
            &[],
        )])),
    );
    assert!(outcome.is_ok());
    assert_eq!(engine.rows().len(), 1);
    assert_eq!(engine.rows()[0].company_name, "Fresh Co");
}
