//! Shared test doubles: an in-memory backend standing in for the HTTP API.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use trend483::api::{ApiError, InspectionApi, TimeAnalysisResponse};
use trend483::models::{
    EnrichmentRecord, FeiNumber, InspectionDocument, Observation, TimelineRecord,
};

/// In-memory [`InspectionApi`] with canned responses and call counters.
#[derive(Default)]
pub struct FakeApi {
    pub documents: Vec<InspectionDocument>,
    pub fail_documents: bool,
    pub enrichment: Vec<EnrichmentRecord>,
    pub fail_enrichment: bool,
    pub document_bytes: Vec<u8>,
    pub analysis_queue: Mutex<VecDeque<Result<TimeAnalysisResponse, String>>>,
    pub document_calls: AtomicUsize,
    pub enrichment_calls: AtomicUsize,
    pub analysis_calls: AtomicUsize,
    pub last_analysis_bounds: Mutex<Option<(i64, i64)>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<InspectionDocument>) -> Self {
        Self {
            documents,
            ..Self::default()
        }
    }

    pub fn with_enrichment(mut self, enrichment: Vec<EnrichmentRecord>) -> Self {
        self.enrichment = enrichment;
        self
    }

    pub fn failing_enrichment(mut self) -> Self {
        self.fail_enrichment = true;
        self
    }

    pub fn with_document_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.document_bytes = bytes;
        self
    }

    /// Queue the next time-analysis response; queued responses are consumed
    /// in order, and an empty queue yields an empty record set.
    pub fn push_analysis(&self, response: Result<TimeAnalysisResponse, String>) {
        self.analysis_queue
            .lock()
            .expect("analysis queue poisoned")
            .push_back(response);
    }

    pub fn with_analysis(response: Result<TimeAnalysisResponse, String>) -> Self {
        let api = Self::default();
        api.push_analysis(response);
        api
    }
}

#[async_trait]
impl InspectionApi for FakeApi {
    async fn fetch_documents(&self) -> Result<Vec<InspectionDocument>, ApiError> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_documents {
            return Err(ApiError::UnexpectedPayload("simulated outage".to_string()));
        }
        Ok(self.documents.clone())
    }

    async fn fetch_enrichment(
        &self,
        _fei_numbers: &[FeiNumber],
    ) -> Result<Vec<EnrichmentRecord>, ApiError> {
        self.enrichment_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_enrichment {
            return Err(ApiError::UnexpectedPayload("simulated outage".to_string()));
        }
        Ok(self.enrichment.clone())
    }

    async fn fetch_time_analysis(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<TimeAnalysisResponse, ApiError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        *self
            .last_analysis_bounds
            .lock()
            .expect("bounds lock poisoned") = Some((start_ms, end_ms));
        match self
            .analysis_queue
            .lock()
            .expect("analysis queue poisoned")
            .pop_front()
        {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ApiError::UnexpectedPayload(message)),
            None => Ok(TimeAnalysisResponse::Records(Vec::new())),
        }
    }

    async fn fetch_document_bytes(&self, _url: &str) -> Result<Vec<u8>, ApiError> {
        Ok(self.document_bytes.clone())
    }
}

pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Build a browse document with the given name, optional FEI, and date.
pub fn document(name: &str, fei: Option<&str>, date: Option<&str>) -> InspectionDocument {
    InspectionDocument {
        name: name.to_string(),
        fei_number: fei.map(FeiNumber::from),
        date: date.and_then(parse_date),
        url: format!("https://example.com/{}.pdf", name.replace(' ', "-")),
        summary: None,
        category: None,
    }
}

/// Build a timeline record with `(summary, category)` observation pairs and
/// repeat-finding phrases.
pub fn record(
    company: &str,
    observations: &[(&str, &str)],
    repeat_finding: &[&str],
) -> TimelineRecord {
    TimelineRecord {
        company_name: company.to_string(),
        fei_number: None,
        url: format!("https://example.com/{}.pdf", company.replace(' ', "-")),
        inspection_date: parse_date("2024-01-05T00:00:00Z"),
        observations: observations
            .iter()
            .map(|(summary, category)| Observation {
                summary: summary.to_string(),
                category: if category.is_empty() {
                    None
                } else {
                    Some(category.to_string())
                },
                cfr_number: None,
            })
            .collect(),
        repeat_finding: repeat_finding.iter().map(|s| s.to_string()).collect(),
        summary: None,
        category: None,
        cfr_number: None,
    }
}

/// Build a timeline record with no observations, only legacy fallback fields.
pub fn legacy_record(company: &str, summary: &str, category: &str) -> TimelineRecord {
    TimelineRecord {
        company_name: company.to_string(),
        fei_number: None,
        url: format!("https://example.com/{}.pdf", company.replace(' ', "-")),
        inspection_date: parse_date("2024-01-12T00:00:00Z"),
        observations: Vec::new(),
        repeat_finding: Vec::new(),
        summary: Some(summary.to_string()),
        category: if category.is_empty() {
            None
        } else {
            Some(category.to_string())
        },
        cfr_number: None,
    }
}
