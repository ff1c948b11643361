//! HTTP and WebSocket surface.
//!
//! REST endpoints manage interviews and per-user provider settings; the
//! WebSocket endpoint carries the live dialogue. Everything routes through
//! the [`InterviewEngine`], which owns provider resolution.

pub mod ws;

use crate::config::{ProviderConfig, ServerConfig};
use crate::error::{IntervoxError, Result};
use crate::interview::InterviewEngine;
use crate::provider::stt::Transcript;
use crate::store::{Interview, InterviewMessage, NewInterview, UserSettings};
use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InterviewEngine>,
    pub providers: ProviderConfig,
    /// Per-user provider settings, keyed by user id. Kept in memory; a real
    /// deployment replaces this with its account service.
    pub settings: Arc<RwLock<HashMap<i64, UserSettings>>>,
}

impl AppState {
    pub fn new(engine: Arc<InterviewEngine>, providers: ProviderConfig) -> Self {
        Self {
            engine,
            providers,
            settings: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Settings for `user_id`, with empty provider fields filled from the
    /// server's configured defaults.
    pub async fn settings_for(&self, user_id: i64) -> UserSettings {
        let mut settings = {
            let stored = self.settings.read().await;
            stored.get(&user_id).cloned().unwrap_or_else(|| UserSettings {
                user_id,
                ..UserSettings::default()
            })
        };
        if settings.llm_provider.is_empty() {
            settings.llm_provider = self.providers.default_llm.clone();
        }
        if settings.tts_provider.is_empty() {
            settings.tts_provider = self.providers.default_tts.clone();
        }
        if settings.stt_provider.is_empty() {
            settings.stt_provider = self.providers.default_stt.clone();
        }
        settings
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/interviews", post(create_interview))
        .route("/api/interviews/{id}", get(get_interview))
        .route("/api/interviews/{id}/messages", get(list_messages))
        .route("/api/users/{user_id}/settings", put(put_settings))
        .route("/api/users/{user_id}/transcriptions", post(transcribe))
        .route("/ws/interviews/{id}", get(ws::upgrade))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves.
pub async fn serve<F>(config: &ServerConfig, state: AppState, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// [`IntervoxError`] with an HTTP status attached at the boundary.
#[derive(Debug)]
pub struct ApiError(IntervoxError);

impl From<IntervoxError> for ApiError {
    fn from(err: IntervoxError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            IntervoxError::InterviewNotFound { .. } | IntervoxError::EvaluationNotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            IntervoxError::InterviewEnded { .. } => StatusCode::CONFLICT,
            err if err.is_setup() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": crate::version_string(),
    }))
}

async fn create_interview(
    State(state): State<AppState>,
    Json(request): Json<NewInterview>,
) -> std::result::Result<Json<Interview>, ApiError> {
    let interview = state.engine.create_interview(request).await?;
    Ok(Json(interview))
}

async fn get_interview(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<Interview>, ApiError> {
    Ok(Json(state.engine.get_interview(id).await?))
}

async fn list_messages(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<Vec<InterviewMessage>>, ApiError> {
    // 404 for unknown interviews rather than an empty list.
    state.engine.get_interview(id).await?;
    Ok(Json(state.engine.list_messages(id).await?))
}

async fn put_settings(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(mut settings): Json<UserSettings>,
) -> StatusCode {
    settings.user_id = user_id;
    state.settings.write().await.insert(user_id, settings);
    StatusCode::NO_CONTENT
}

#[derive(Debug, Deserialize)]
struct TranscribeParams {
    #[serde(default = "default_clip_name")]
    filename: String,
    #[serde(default)]
    language: String,
}

fn default_clip_name() -> String {
    "clip.wav".to_string()
}

async fn transcribe(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Query(params): Query<TranscribeParams>,
    body: axum::body::Bytes,
) -> std::result::Result<Json<Transcript>, ApiError> {
    if body.is_empty() {
        return Err(IntervoxError::InvalidRequest {
            message: "empty audio payload".to_string(),
        }
        .into());
    }
    let settings = state.settings_for(user_id).await;
    let transcript = state
        .engine
        .transcribe(&settings, body.to_vec(), &params.filename, &params.language)
        .await?;
    Ok(Json(transcript))
}
