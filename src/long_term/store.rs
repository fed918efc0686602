//! Patient record storage and the post-write summary refresh.
//!
//! Whenever a visit is written, the patient's long-term summary is
//! recomputed from the full history. A failed recomputation is logged and
//! swallowed; the visit write stands and the previous summary is kept.

use crate::long_term::aggregator::{
    analyze_long_term_progress, AggregationError, AggregatorSettings, LongTermSummary,
};
use crate::long_term::history::VisitHistoryEntry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, RwLock};
use uuid::Uuid;

/// Storage errors.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreError {
    /// No record for the patient
    PatientNotFound(String),
    /// The backing store is unusable
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::PatientNotFound(id) => write!(f, "Patient not found: {id}"),
            StoreError::Unavailable(msg) => write!(f, "Store unavailable: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Access to patient visit histories and their long-term summaries.
pub trait PatientStore: Send + Sync {
    /// Visits ordered by date, sessions ordered by creation time.
    fn visit_history(&self, patient_id: &str) -> Result<Vec<VisitHistoryEntry>, StoreError>;

    fn long_term_summary(&self, patient_id: &str) -> Result<Option<LongTermSummary>, StoreError>;

    fn set_long_term_summary(
        &self,
        patient_id: &str,
        summary: LongTermSummary,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct PatientRecord {
    visits: Vec<(Uuid, VisitHistoryEntry)>,
    summary: Option<LongTermSummary>,
}

/// Process-local store.
///
/// Visit writes are serialized, so a summary stored after a write always
/// reflects the history that write produced.
#[derive(Debug, Default)]
pub struct InMemoryPatientStore {
    patients: RwLock<HashMap<String, PatientRecord>>,
    writes: Mutex<()>,
}

impl InMemoryPatientStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn write_guard(&self) -> Result<MutexGuard<'_, ()>, StoreError> {
        self.writes
            .lock()
            .map_err(|_| StoreError::Unavailable("visit write lock poisoned".to_string()))
    }

    /// Persist a visit and return its id. Does not refresh the summary.
    pub fn insert_visit(
        &self,
        patient_id: &str,
        visit: VisitHistoryEntry,
    ) -> Result<Uuid, StoreError> {
        let _guard = self.write_guard()?;
        self.push_visit(patient_id, visit)
    }

    fn push_visit(&self, patient_id: &str, mut visit: VisitHistoryEntry) -> Result<Uuid, StoreError> {
        visit.sessions.sort_by_key(|s| s.created_at);

        let mut patients = self
            .patients
            .write()
            .map_err(|_| StoreError::Unavailable("patient store lock poisoned".to_string()))?;
        let record = patients.entry(patient_id.to_string()).or_default();

        let id = Uuid::new_v4();
        // Keep visits ordered by date, ties in insertion order
        let pos = record.visits.partition_point(|(_, v)| v.date <= visit.date);
        record.visits.insert(pos, (id, visit));

        Ok(id)
    }

    /// Persist a visit, then refresh the patient's long-term summary.
    ///
    /// No other visit write runs between the insert and the refresh.
    pub fn record_visit(
        &self,
        patient_id: &str,
        visit: VisitHistoryEntry,
        settings: &AggregatorSettings,
    ) -> Result<(Uuid, RefreshOutcome), StoreError> {
        let _guard = self.write_guard()?;
        let id = self.push_visit(patient_id, visit)?;
        tracing::debug!(patient_id, visit_id = %id, "Visit saved");
        let outcome = refresh_long_term_summary(self, patient_id, settings);
        Ok((id, outcome))
    }

    pub fn visit_count(&self, patient_id: &str) -> usize {
        self.patients
            .read()
            .ok()
            .and_then(|p| p.get(patient_id).map(|r| r.visits.len()))
            .unwrap_or(0)
    }
}

impl PatientStore for InMemoryPatientStore {
    fn visit_history(&self, patient_id: &str) -> Result<Vec<VisitHistoryEntry>, StoreError> {
        let patients = self
            .patients
            .read()
            .map_err(|_| StoreError::Unavailable("patient store lock poisoned".to_string()))?;
        let record = patients
            .get(patient_id)
            .ok_or_else(|| StoreError::PatientNotFound(patient_id.to_string()))?;
        Ok(record.visits.iter().map(|(_, v)| v.clone()).collect())
    }

    fn long_term_summary(&self, patient_id: &str) -> Result<Option<LongTermSummary>, StoreError> {
        let patients = self
            .patients
            .read()
            .map_err(|_| StoreError::Unavailable("patient store lock poisoned".to_string()))?;
        patients
            .get(patient_id)
            .map(|r| r.summary.clone())
            .ok_or_else(|| StoreError::PatientNotFound(patient_id.to_string()))
    }

    fn set_long_term_summary(
        &self,
        patient_id: &str,
        summary: LongTermSummary,
    ) -> Result<(), StoreError> {
        let mut patients = self
            .patients
            .write()
            .map_err(|_| StoreError::Unavailable("patient store lock poisoned".to_string()))?;
        let record = patients
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::PatientNotFound(patient_id.to_string()))?;
        record.summary = Some(summary);
        Ok(())
    }
}

/// Outcome of a summary refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Updated(LongTermSummary),
    /// The refresh failed and the previous summary was left in place
    Failed(String),
}

impl RefreshOutcome {
    pub fn is_updated(&self) -> bool {
        matches!(self, RefreshOutcome::Updated(_))
    }
}

/// Recompute and store a patient's long-term summary.
///
/// Never returns an error: every failure is logged and reported as
/// [`RefreshOutcome::Failed`].
pub fn refresh_long_term_summary(
    store: &dyn PatientStore,
    patient_id: &str,
    settings: &AggregatorSettings,
) -> RefreshOutcome {
    let history = match store.visit_history(patient_id) {
        Ok(history) => history,
        Err(e) => {
            tracing::error!(patient_id, error = %e, "Could not gather visit history");
            return RefreshOutcome::Failed(e.to_string());
        }
    };

    let summary = match analyze_long_term_progress(&history, settings) {
        Ok(summary) => summary,
        Err(e) => {
            log_aggregation_failure(patient_id, &e);
            return RefreshOutcome::Failed(e.to_string());
        }
    };

    match store.set_long_term_summary(patient_id, summary.clone()) {
        Ok(()) => {
            tracing::info!(
                patient_id,
                visits = summary.visits_analyzed,
                trend = ?summary.trend,
                "Long-term summary updated"
            );
            RefreshOutcome::Updated(summary)
        }
        Err(e) => {
            tracing::error!(patient_id, error = %e, "Could not store long-term summary");
            RefreshOutcome::Failed(e.to_string())
        }
    }
}

fn log_aggregation_failure(patient_id: &str, error: &AggregationError) {
    tracing::warn!(
        patient_id,
        error = %error,
        "Long-term analysis failed, keeping previous summary"
    );
}
