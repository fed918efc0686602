//! HTTP server for stress classification and patient progress.
//!
//! This module provides an HTTP server that:
//! - Classifies wristband recordings (or simulated data) via
//!   `POST /api/stress-classification/`
//! - Serves the pre-processed dataset view via
//!   `GET /api/stress-classification/wesad-data/`
//! - Stores visits and refreshes the long-term summary after each write
//!
//! # Architecture
//!
//! ```text
//! Frontend ──→ POST /api/stress-classification/ ──→ StressPipeline ──→ report
//!                                                        ↓
//!                                              [ClassifierHandle, loaded once]
//!
//! Frontend ──→ POST /api/patients/{id}/visits ──→ store ──→ long-term refresh
//! ```

use crate::classifier::ClassifierHandle;
use crate::config::Config;
use crate::core::pipeline::{ClassificationError, PipelineSettings, StressPipeline};
use crate::core::report::ClassificationReport;
use crate::core::request::InferenceRequest;
use crate::core::simulator::SimulationConfig;
use crate::dataset::{load_dataset, DatasetError, DatasetView};
use crate::long_term::{
    AggregatorSettings, InMemoryPatientStore, LongTermSummary, PatientStore, RefreshOutcome,
    StoreError, VisitHistoryEntry,
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderValue, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub host: IpAddr,
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Application settings
    pub settings: Config,
}

impl ServerConfig {
    /// Create a new server configuration bound to localhost
    pub fn new(port: u16, settings: Config) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port,
            settings,
        }
    }

    /// Server configuration from the `server` section of the settings
    pub fn from_settings(settings: Config) -> anyhow::Result<Self> {
        let host: IpAddr = settings
            .server
            .host
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid server host `{}`: {e}", settings.server.host))?;
        Ok(Self {
            host,
            port: settings.server.port,
            settings,
        })
    }
}

/// Shared server state
pub struct ServerState {
    classifier: Arc<ClassifierHandle>,
    pipeline: PipelineSettings,
    simulation: SimulationConfig,
    dataset_path: PathBuf,
    aggregator: AggregatorSettings,
    patients: Arc<InMemoryPatientStore>,
}

impl ServerState {
    /// Create new server state. The model is not read here.
    pub fn new(config: &ServerConfig) -> Self {
        let settings = &config.settings;
        Self {
            classifier: Arc::new(ClassifierHandle::new(settings.model_path.clone())),
            pipeline: settings.pipeline.clone(),
            simulation: settings.simulation.clone(),
            dataset_path: settings.dataset_path.clone(),
            aggregator: settings.aggregator,
            patients: Arc::new(InMemoryPatientStore::new()),
        }
    }
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model_loaded: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Response after storing a visit
#[derive(Debug, Serialize)]
pub struct VisitResponse {
    pub patient_id: String,
    pub visit_id: String,
    pub long_term_summary_updated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_term_summary: Option<LongTermSummary>,
}

/// Stored long-term summary of a patient
#[derive(Debug, Serialize)]
pub struct LongTermSummaryResponse {
    pub patient_id: String,
    pub long_term_summary: Option<LongTermSummary>,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
            details: None,
        }),
    )
}

fn bad_json(rejection: JsonRejection) -> ApiError {
    api_error(
        StatusCode::BAD_REQUEST,
        "INVALID_JSON",
        format!("Invalid request body: {}", rejection.body_text()),
    )
}

fn classification_error(e: ClassificationError) -> ApiError {
    match e {
        ClassificationError::Validation(v) => {
            tracing::warn!(field = %v.field, "Rejected classification request: {}", v.message);
            let mut resp = api_error(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", v.to_string());
            resp.1.details = Some(serde_json::json!({ "field": v.field }));
            resp
        }
        ClassificationError::ModelUnavailable(e) => {
            tracing::error!("Model unavailable: {}", e);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "MODEL_UNAVAILABLE",
                format!("Model unavailable: {e}"),
            )
        }
        ClassificationError::Inference(msg) => {
            tracing::error!("Classification failed: {}", msg);
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INFERENCE_ERROR",
                format!("Classification failed: {msg}"),
            )
        }
    }
}

fn store_error(e: StoreError) -> ApiError {
    match e {
        StoreError::PatientNotFound(_) => {
            api_error(StatusCode::NOT_FOUND, "PATIENT_NOT_FOUND", e.to_string())
        }
        StoreError::Unavailable(_) => api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "STORE_UNAVAILABLE",
            e.to_string(),
        ),
    }
}

fn join_error(e: tokio::task::JoinError) -> ApiError {
    tracing::error!("Worker task failed: {}", e);
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "Worker task failed",
    )
}

/// GET /health
async fn health(State(state): State<Arc<ServerState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model_loaded: state.classifier.is_loaded(),
    })
}

/// POST /api/stress-classification/
///
/// Classifies the supplied channels, or simulated data when requested or
/// when any channel is missing.
async fn classify(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<InferenceRequest>, JsonRejection>,
) -> Result<Json<ClassificationReport>, ApiError> {
    let Json(request) = payload.map_err(bad_json)?;

    let report = tokio::task::spawn_blocking(move || {
        let pipeline = StressPipeline::new(&state.classifier, state.pipeline.clone());
        pipeline.classify_request(&request, &state.simulation)
    })
    .await
    .map_err(join_error)?
    .map_err(classification_error)?;

    Ok(Json(report))
}

/// GET /api/stress-classification/wesad-data/
async fn dataset_view(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<DatasetView>, ApiError> {
    let path = state.dataset_path.clone();
    let spec = state.pipeline.window_spec();

    let view = tokio::task::spawn_blocking(move || load_dataset(&path).map(|d| d.to_view(&spec)))
        .await
        .map_err(join_error)?
        .map_err(|e| match e {
            DatasetError::NotFound(_) => {
                tracing::warn!("{}", e);
                api_error(StatusCode::NOT_FOUND, "DATASET_NOT_FOUND", e.to_string())
            }
            _ => {
                tracing::error!("Dataset could not be read: {}", e);
                api_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATASET_ERROR",
                    e.to_string(),
                )
            }
        })?;

    Ok(Json(view))
}

/// POST /api/patients/:patient_id/visits
///
/// Stores the visit, then refreshes the long-term summary. A failed
/// refresh does not fail the request.
async fn record_visit(
    State(state): State<Arc<ServerState>>,
    Path(patient_id): Path<String>,
    payload: Result<Json<VisitHistoryEntry>, JsonRejection>,
) -> Result<(StatusCode, Json<VisitResponse>), ApiError> {
    let Json(visit) = payload.map_err(bad_json)?;

    let (visit_id, outcome) = state
        .patients
        .record_visit(&patient_id, visit, &state.aggregator)
        .map_err(store_error)?;

    let (updated, summary) = match outcome {
        RefreshOutcome::Updated(summary) => (true, Some(summary)),
        RefreshOutcome::Failed(_) => (false, None),
    };

    Ok((
        StatusCode::CREATED,
        Json(VisitResponse {
            patient_id,
            visit_id: visit_id.to_string(),
            long_term_summary_updated: updated,
            long_term_summary: summary,
        }),
    ))
}

/// GET /api/patients/:patient_id/long-term-summary
async fn long_term_summary(
    State(state): State<Arc<ServerState>>,
    Path(patient_id): Path<String>,
) -> Result<Json<LongTermSummaryResponse>, ApiError> {
    let summary = state
        .patients
        .long_term_summary(&patient_id)
        .map_err(store_error)?;

    Ok(Json(LongTermSummaryResponse {
        patient_id,
        long_term_summary: summary,
    }))
}

/// Build the router over shared state
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/stress-classification/", post(classify))
        .route("/api/stress-classification/wesad-data/", get(dataset_view))
        .route("/api/patients/:patient_id/visits", post(record_visit))
        .route(
            "/api/patients/:patient_id/long-term-summary",
            get(long_term_summary),
        )
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    HeaderValue::from_static("http://localhost:3000"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config));

    // Load eagerly so a missing artifact shows up at startup; requests retry.
    let classifier = state.classifier.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = classifier.load() {
            tracing::error!("Model not loaded at startup: {}", e);
        }
    });

    let app = router(state);

    let addr = SocketAddr::new(config.host, config.port);
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Stress classifier listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}
