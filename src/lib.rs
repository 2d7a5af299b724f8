//! Trend 483 — analytics engine for FDA Form 483 inspection documents.
//!
//! Two sibling engines share one shape: the [`engine::BrowseEngine`] holds
//! the full inspection document list and derives facet-filtered or searched
//! subsets; the [`engine::TimelineEngine`] holds one date-bounded query
//! result and derives flattened observation rows, category tallies, and
//! systemic-issue entries, with category and systemic-issue drill-down.
//!
//! The backend API is an external collaborator behind the
//! [`api::InspectionApi`] trait. All derivation is pure and synchronous;
//! the fetch is the only asynchronous boundary. Engines return typed
//! outcomes and the shell maps them onto a [`notify::NotificationSink`].

pub mod api;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod notify;

pub use api::{ApiClient, ApiError, InspectionApi, TimeAnalysisResponse};
pub use config::{Config, Settings};
pub use engine::{AnalysisState, BrowseEngine, SortKey, TimelineEngine};
pub use error::EngineError;
pub use models::{
    CategoryTally, EnrichmentRecord, FeiNumber, InspectionDocument, Observation, ObservationRow,
    RepeatIssueEntry, TimelineRecord,
};
pub use notify::{NotificationSink, Severity};
