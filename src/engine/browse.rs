//! Browse engine: facet filtering, debounced search, and enrichment over
//! the full inspection document list.
//!
//! Three independent facets drive the filtered subset: company selection,
//! FEI selection, and free-text search. Facets replace each other rather
//! than intersecting (last selection wins) — a deliberate simplification
//! carried over from the product, not a bug.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::ValueEnum;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::InspectionApi;
use crate::engine::debounce::Debouncer;
use crate::engine::{RequestSequence, RequestToken};
use crate::error::EngineError;
use crate::models::{EnrichmentRecord, FeiNumber, InspectionDocument};

/// Delay between the last keystroke and the search filter applying.
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);

/// User message when the document list cannot be loaded.
pub const MSG_LOAD_FAILED: &str = "Failed to load inspection documents, Please try again";

/// User message when a document download fails.
pub const MSG_DOWNLOAD_FAILED: &str = "Failed to download document, Please try again";

/// Sort orders for the filtered document list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SortKey {
    /// Newest inspection first.
    InspectionDate,
    /// Ascending lexical company name.
    CompanyName,
    /// Ascending lexical FEI number (canonical string form).
    FeiNumber,
}

/// Holds the full document list and the currently filtered subset.
pub struct BrowseEngine {
    api: Arc<dyn InspectionApi>,
    documents: Vec<InspectionDocument>,
    filtered: Vec<InspectionDocument>,
    company_list: Vec<String>,
    fei_list: Vec<FeiNumber>,
    selected_company: Option<String>,
    selected_fei: Option<FeiNumber>,
    search_input: String,
    debouncer: Debouncer<String>,
    search_rx: mpsc::UnboundedReceiver<String>,
    load_seq: RequestSequence,
    enrich_seq: RequestSequence,
}

impl BrowseEngine {
    pub fn new(api: Arc<dyn InspectionApi>) -> Self {
        let (debouncer, search_rx) = Debouncer::new(SEARCH_DEBOUNCE);
        Self {
            api,
            documents: Vec::new(),
            filtered: Vec::new(),
            company_list: Vec::new(),
            fei_list: Vec::new(),
            selected_company: None,
            selected_fei: None,
            search_input: String::new(),
            debouncer,
            search_rx,
            load_seq: RequestSequence::default(),
            enrich_seq: RequestSequence::default(),
        }
    }

    /// The full raw document list.
    pub fn documents(&self) -> &[InspectionDocument] {
        &self.documents
    }

    /// The currently filtered subset.
    pub fn filtered(&self) -> &[InspectionDocument] {
        &self.filtered
    }

    /// Distinct company names over the full list, first-seen order.
    pub fn company_list(&self) -> &[String] {
        &self.company_list
    }

    /// Distinct FEI numbers over the full list, first-seen order.
    pub fn fei_list(&self) -> &[FeiNumber] {
        &self.fei_list
    }

    /// The raw (not yet debounced) search input.
    pub fn search_input(&self) -> &str {
        &self.search_input
    }

    pub fn selected_company(&self) -> Option<&str> {
        self.selected_company.as_deref()
    }

    pub fn selected_fei(&self) -> Option<&FeiNumber> {
        self.selected_fei.as_ref()
    }

    /// Fetch the full document list once. Failure leaves the list empty and
    /// is reported to the caller; nothing is retried.
    pub async fn load_all(&mut self) -> Result<usize, EngineError> {
        let token = self.begin_load();
        let result = self.api.fetch_documents().await;
        self.apply_documents(token, result.map_err(|err| err.to_string()))
    }

    /// Issue a token for a document-list fetch.
    pub fn begin_load(&mut self) -> RequestToken {
        self.load_seq.issue()
    }

    /// Apply a document-list response. A response whose token has been
    /// superseded is discarded without touching state.
    pub fn apply_documents(
        &mut self,
        token: RequestToken,
        result: Result<Vec<InspectionDocument>, String>,
    ) -> Result<usize, EngineError> {
        if !self.load_seq.is_latest(token) {
            return Err(EngineError::Superseded);
        }
        match result {
            Ok(documents) => {
                debug!(count = documents.len(), "document list loaded");
                self.documents = documents;
                self.rebuild_facet_lists();
                Ok(self.documents.len())
            }
            Err(err) => {
                warn!(error = %err, "document list fetch failed");
                self.documents.clear();
                self.rebuild_facet_lists();
                Err(EngineError::Transport(MSG_LOAD_FAILED.to_string()))
            }
        }
    }

    /// Replace the filtered subset with exact company-name matches and
    /// enrich the result. Any previous facet selection is replaced.
    pub async fn filter_by_company(&mut self, name: &str) {
        self.select_company(name);
        self.run_enrichment().await;
    }

    /// Replace the filtered subset with exact FEI matches and enrich the
    /// result. Any previous facet selection is replaced.
    pub async fn filter_by_fei(&mut self, fei: &FeiNumber) {
        self.select_fei(fei);
        self.run_enrichment().await;
    }

    /// Exact-match company filter without the enrichment side effect.
    pub fn select_company(&mut self, name: &str) {
        self.selected_company = Some(name.to_string());
        self.filtered = self
            .documents
            .iter()
            .filter(|doc| doc.name == name)
            .cloned()
            .collect();
    }

    /// Exact-match FEI filter without the enrichment side effect.
    pub fn select_fei(&mut self, fei: &FeiNumber) {
        self.selected_fei = Some(fei.clone());
        self.filtered = self
            .documents
            .iter()
            .filter(|doc| doc.fei_number.as_ref() == Some(fei))
            .cloned()
            .collect();
    }

    /// Record a keystroke and (re)start the debounce timer. The filter is
    /// applied only when the timer fires unsuperseded; drive that through
    /// [`Self::next_debounced_search`] and [`Self::apply_search`].
    pub fn set_search_text(&mut self, text: &str) {
        self.search_input = text.to_string();
        self.debouncer.submit(text.to_string());
    }

    /// Wait for the next settled search value.
    pub async fn next_debounced_search(&mut self) -> Option<String> {
        self.search_rx.recv().await
    }

    /// Apply a settled search value. Empty text clears the filtered set to
    /// zero results (the empty-state card), not to "no filter". Matching is
    /// a case-insensitive substring test over the company name or the
    /// canonical FEI string. Search never triggers enrichment.
    pub fn apply_search(&mut self, text: &str) {
        if text.is_empty() {
            self.filtered.clear();
            return;
        }
        let needle = text.to_lowercase();
        self.filtered = self
            .documents
            .iter()
            .filter(|doc| {
                doc.name.to_lowercase().contains(&needle)
                    || doc
                        .fei_number
                        .as_ref()
                        .is_some_and(|fei| fei.as_str().to_lowercase().contains(&needle))
            })
            .cloned()
            .collect();
    }

    /// Enrich the filtered subset, logging any failure. Enrichment is never
    /// user-visible: on error the subset is simply left unenriched.
    async fn run_enrichment(&mut self) {
        if let Err(err) = self.enrich().await {
            match err {
                EngineError::Superseded => {}
                other => warn!(error = %other, "enrichment skipped"),
            }
        }
    }

    /// Send the filtered subset's distinct FEI batch to the enrichment
    /// endpoint and merge summaries back in. No-op for an empty subset.
    pub async fn enrich(&mut self) -> Result<(), EngineError> {
        if self.filtered.is_empty() {
            return Ok(());
        }
        let mut batch: Vec<FeiNumber> = Vec::new();
        for doc in &self.filtered {
            if let Some(fei) = &doc.fei_number {
                if !batch.contains(fei) {
                    batch.push(fei.clone());
                }
            }
        }

        let token = self.begin_enrichment();
        let result = self.api.fetch_enrichment(&batch).await;
        self.apply_enrichment(token, result.map_err(|err| err.to_string()))
    }

    /// Issue a token for an enrichment fetch.
    pub fn begin_enrichment(&mut self) -> RequestToken {
        self.enrich_seq.issue()
    }

    /// Merge an enrichment response onto the filtered subset by company
    /// name. Superseded responses are discarded; failures surface as
    /// [`EngineError::Enrichment`] for the caller to log.
    pub fn apply_enrichment(
        &mut self,
        token: RequestToken,
        result: Result<Vec<EnrichmentRecord>, String>,
    ) -> Result<(), EngineError> {
        if !self.enrich_seq.is_latest(token) {
            return Err(EngineError::Superseded);
        }
        let records = result.map_err(EngineError::Enrichment)?;
        for doc in &mut self.filtered {
            if let Some(record) = records.iter().find(|r| r.company_name == doc.name) {
                doc.summary = record.summary.clone();
                doc.category = record.category.clone();
            }
        }
        Ok(())
    }

    /// A sorted copy of the filtered subset. The stored subset is never
    /// mutated by sorting.
    pub fn sorted_view(&self, key: SortKey) -> Vec<InspectionDocument> {
        let mut view = self.filtered.clone();
        match key {
            SortKey::InspectionDate => view.sort_by(|a, b| b.date.cmp(&a.date)),
            SortKey::CompanyName => view.sort_by(|a, b| a.name.cmp(&b.name)),
            SortKey::FeiNumber => view.sort_by(|a, b| {
                let a_key = a.fei_number.as_ref().map(FeiNumber::as_str);
                let b_key = b.fei_number.as_ref().map(FeiNumber::as_str);
                a_key.cmp(&b_key)
            }),
        }
        view
    }

    /// Download a document's source PDF into `dir`, named after the company.
    pub async fn download_document(
        &self,
        document: &InspectionDocument,
        dir: &Path,
    ) -> Result<PathBuf, EngineError> {
        let bytes = self
            .api
            .fetch_document_bytes(&document.url)
            .await
            .map_err(|err| {
                warn!(error = %err, url = %document.url, "document download failed");
                EngineError::Transport(MSG_DOWNLOAD_FAILED.to_string())
            })?;

        let path = dir.join(download_filename(&document.name));
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|err| EngineError::Transport(err.to_string()))?;
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|err| EngineError::Transport(err.to_string()))?;
        debug!(path = %path.display(), bytes = bytes.len(), "document saved");
        Ok(path)
    }

    /// Facet option lists are projections over the FULL list, independent of
    /// the current filters; records missing a field are skipped for that
    /// facet only.
    fn rebuild_facet_lists(&mut self) {
        self.company_list.clear();
        self.fei_list.clear();
        for doc in &self.documents {
            if !doc.name.is_empty() && !self.company_list.contains(&doc.name) {
                self.company_list.push(doc.name.clone());
            }
            if let Some(fei) = &doc.fei_number {
                if !self.fei_list.contains(fei) {
                    self.fei_list.push(fei.clone());
                }
            }
        }
    }
}

/// Filesystem-safe filename for a downloaded document.
fn download_filename(company: &str) -> String {
    let cleaned: String = company
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            other => other,
        })
        .collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "document.pdf".to_string()
    } else {
        format!("{trimmed}.pdf")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_filename_replaces_path_characters() {
        assert_eq!(download_filename("Acme/Pharma: East"), "Acme-Pharma- East.pdf");
        assert_eq!(download_filename("  "), "document.pdf");
    }
}
