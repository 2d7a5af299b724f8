//! Engines deriving filtered and aggregated views from raw inspection data.
//!
//! Two sibling engines share one shape: each owns the raw result of one
//! backend query plus derived views recomputed synchronously after every
//! mutation. The only asynchronous boundary is the fetch itself.

pub mod browse;
pub mod debounce;
pub mod derive;
pub mod timeline;

pub use browse::{BrowseEngine, SortKey};
pub use debounce::Debouncer;
pub use derive::{derive_view, DerivedView};
pub use timeline::{AnalysisState, AnalysisSummary, TimelineEngine};

/// Identifies one issued backend request.
///
/// Each engine tags every request with a monotonically increasing token and
/// applies a response only if its token is still the latest issued one, so a
/// slow response can never overwrite the result of a newer request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestToken(pub(crate) u64);

/// Monotonic token source, one per logical operation.
#[derive(Debug, Default)]
pub(crate) struct RequestSequence(u64);

impl RequestSequence {
    pub(crate) fn issue(&mut self) -> RequestToken {
        self.0 += 1;
        RequestToken(self.0)
    }

    pub(crate) fn is_latest(&self, token: RequestToken) -> bool {
        token.0 == self.0
    }
}
