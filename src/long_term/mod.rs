//! Long-term patient progress.
//!
//! - Visit and session history
//! - Trend analysis over the ordered history
//! - Storage with a post-write summary refresh

pub mod aggregator;
pub mod history;
pub mod store;

pub use aggregator::{
    analyze_long_term_progress, AggregationError, AggregatorSettings, LongTermSummary,
    StressTrend,
};
pub use history::{SessionEntry, VisitHistoryEntry};
pub use store::{
    refresh_long_term_summary, InMemoryPatientStore, PatientStore, RefreshOutcome, StoreError,
};
