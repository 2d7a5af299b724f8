//! HTTP client for the Trend 483 backend.
//!
//! The backend is an external collaborator consumed through three endpoints:
//! the full browse document list, a batched enrichment lookup, and the
//! date-bounded time analysis. [`InspectionApi`] is the seam the engines
//! depend on; [`ApiClient`] is the reqwest implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::models::{EnrichmentRecord, FeiNumber, InspectionDocument, TimelineRecord};

/// Production backend base URL. Overridable via config or `--base-url`.
pub const DEFAULT_BASE_URL: &str =
    "https://fda483.orangeplant-b290c40b.centralus.azurecontainerapps.io/api";

/// Distinguished "no documents" response from the time analysis endpoint.
/// Checked by strict equality, never by emptiness: an empty record list and
/// this sentinel are different outcomes with different user messaging.
pub const NO_DOCUMENTS_SENTINEL: &str =
    "No documents found in Firebase Firestore for the date range";

/// Errors from the backend client.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("unexpected response payload: {0}")]
    UnexpectedPayload(String),
}

/// Result of the time analysis endpoint: either records or the sentinel.
#[derive(Debug, Clone)]
pub enum TimeAnalysisResponse {
    Records(Vec<TimelineRecord>),
    NoDocuments,
}

/// Data source contract for the inspection backend.
#[async_trait]
pub trait InspectionApi: Send + Sync {
    /// Fetch the full browse document list (`GET /firebaseData`).
    async fn fetch_documents(&self) -> Result<Vec<InspectionDocument>, ApiError>;

    /// Look up enrichment summaries for a batch of FEI numbers
    /// (`POST /browseDocuments`).
    async fn fetch_enrichment(
        &self,
        fei_numbers: &[FeiNumber],
    ) -> Result<Vec<EnrichmentRecord>, ApiError>;

    /// Run the date-bounded analysis (`GET /timeAnalysis`). Bounds are
    /// millisecond epoch timestamps.
    async fn fetch_time_analysis(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<TimeAnalysisResponse, ApiError>;

    /// Fetch a source document's raw bytes (PDF download).
    async fn fetch_document_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Serialize)]
struct EnrichmentRequest<'a> {
    #[serde(rename = "feiNumbers")]
    fei_numbers: &'a [FeiNumber],
}

/// Reqwest-backed implementation of [`InspectionApi`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a client for the given base URL with a request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        // Validate up front so a bad config fails at startup, not mid-fetch.
        url::Url::parse(base_url).map_err(|source| ApiError::InvalidBaseUrl {
            url: base_url.to_string(),
            source,
        })?;

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl InspectionApi for ApiClient {
    async fn fetch_documents(&self) -> Result<Vec<InspectionDocument>, ApiError> {
        let url = self.endpoint("firebaseData");
        debug!(%url, "fetching document list");
        let response = self.client.get(&url).send().await?.error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_enrichment(
        &self,
        fei_numbers: &[FeiNumber],
    ) -> Result<Vec<EnrichmentRecord>, ApiError> {
        let url = self.endpoint("browseDocuments");
        debug!(%url, count = fei_numbers.len(), "fetching enrichment batch");
        let response = self
            .client
            .post(&url)
            .json(&EnrichmentRequest { fei_numbers })
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn fetch_time_analysis(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<TimeAnalysisResponse, ApiError> {
        let url = self.endpoint("timeAnalysis");
        debug!(%url, start_ms, end_ms, "running time analysis");
        let response = self
            .client
            .get(&url)
            .query(&[("startDate", start_ms), ("endDate", end_ms)])
            .send()
            .await?
            .error_for_status()?;

        // The endpoint returns either a record array or a bare string
        // sentinel, so decode into a Value before committing to a shape.
        let payload: Value = response.json().await?;
        match payload {
            Value::String(s) if s == NO_DOCUMENTS_SENTINEL => {
                Ok(TimeAnalysisResponse::NoDocuments)
            }
            Value::String(s) => Err(ApiError::UnexpectedPayload(format!(
                "unrecognized string response: {s}"
            ))),
            records @ Value::Array(_) => serde_json::from_value(records)
                .map(TimeAnalysisResponse::Records)
                .map_err(|err| ApiError::UnexpectedPayload(err.to_string())),
            other => Err(ApiError::UnexpectedPayload(format!(
                "expected array or string, got {other}"
            ))),
        }
    }

    async fn fetch_document_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        debug!(%url, "downloading document");
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}
