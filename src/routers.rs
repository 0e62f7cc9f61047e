use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::catalog::{COUNTRIES, INDICATORS};
use crate::errors::{AnalysisError, Result};
use crate::models::{Action, AnalysisRecord, AnalysisSummary, HistoryEntry, TriggerRequest};
use crate::services::export::{self, ExportFormat};
use crate::services::normalizer;
use crate::services::webhook::WebhookReply;
use crate::AppState;

#[derive(Deserialize)]
pub struct CountryQuery {
    pub country: Option<String>,
}

impl CountryQuery {
    fn country(&self) -> Option<&str> {
        self.country
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: String,
    pub history_entries: usize,
    pub history_available: bool,
    pub available_endpoints: Vec<String>,
}

fn require_id(id: &str) -> Result<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AnalysisError::Validation("Analysis id is required".to_string()));
    }
    Ok(id)
}

// Отклонённая форма ответа логируется здесь, нормализатор остаётся чистым
fn log_rejected(action: Action, payload: &Value, err: &AnalysisError) {
    if matches!(
        err,
        AnalysisError::UnrecognizedShape(_) | AnalysisError::IncompleteData(_)
    ) {
        tracing::warn!(
            "Ответ на {} не распознан ({}): {}",
            action.as_str(),
            normalizer::describe(payload),
            err
        );
    }
}

async fn fetch_record(state: &AppState, id: &str) -> Result<AnalysisRecord> {
    let payload = match state.webhook.get_analysis(id).await? {
        WebhookReply::NoData => return Err(AnalysisError::NoData),
        WebhookReply::Body(payload) => payload,
    };

    normalizer::normalize_single(Action::GetAnalysis, &payload).map_err(|e| match e {
        AnalysisError::Upstream(message) => AnalysisError::NotFound(message),
        other => {
            log_rejected(Action::GetAnalysis, &payload, &other);
            other
        }
    })
}

// Детали одного анализа
pub async fn get_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisRecord>> {
    let id = require_id(&id)?;
    tracing::info!("Запрос анализа {}", id);
    Ok(Json(fetch_record(&state, id).await?))
}

// Выгрузка анализа в CSV или JSON
pub async fn download_analysis(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response> {
    let id = require_id(&id)?;
    let format = ExportFormat::parse(query.format.as_deref()).ok_or_else(|| {
        AnalysisError::Validation("format must be either csv or json".to_string())
    })?;

    let record = fetch_record(&state, id).await?;
    let body = match format {
        ExportFormat::Csv => export::to_csv(&record),
        ExportFormat::Json => export::to_json(&record)?,
    };
    let filename = export::download_filename(id, format, Utc::now().timestamp_millis())?;
    tracing::info!("Выгрузка {} ({} байт)", filename, body.len());

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response())
}

// Список анализов на стороне вебхука
pub async fn list_analyses(
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Result<Json<Vec<AnalysisSummary>>> {
    let payload = match state.webhook.list_analyses(query.country()).await? {
        WebhookReply::NoData => return Ok(Json(Vec::new())),
        WebhookReply::Body(payload) => payload,
    };

    let analyses = normalizer::normalize_list(&payload).map_err(|e| {
        log_rejected(Action::ListAnalyses, &payload, &e);
        e
    })?;
    tracing::info!("Получено {} анализов", analyses.len());
    Ok(Json(analyses))
}

// Запуск нового анализа; результат попадает в историю
pub async fn trigger_analysis(
    State(state): State<AppState>,
    body: std::result::Result<Json<TriggerRequest>, JsonRejection>,
) -> Result<Json<AnalysisRecord>> {
    let Json(request) = body.map_err(|e| AnalysisError::Validation(e.body_text()))?;
    let params = request.validate()?;

    tracing::info!(
        "Запуск анализа {} для {} за {} .. {}",
        params.indicator,
        params.country,
        params.start_date,
        params.end_date
    );

    let payload = match state.webhook.trigger_analysis(&params).await? {
        WebhookReply::NoData => {
            return Err(AnalysisError::UnrecognizedShape("empty response body".to_string()))
        }
        WebhookReply::Body(payload) => payload,
    };

    let record = normalizer::normalize_single(Action::TriggerAnalysis, &payload).map_err(|e| {
        log_rejected(Action::TriggerAnalysis, &payload, &e);
        e
    })?;

    state.history.upsert(record.clone()).await;
    Ok(Json(record))
}

// Локальная история анализов
pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<CountryQuery>,
) -> Json<Vec<HistoryEntry>> {
    Json(state.history.list(query.country()).await)
}

pub async fn get_history_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CountryQuery>,
) -> Result<Json<HistoryEntry>> {
    let id = require_id(&id)?;
    state
        .history
        .find(id, query.country())
        .await
        .map(Json)
        .ok_or_else(|| AnalysisError::NotFound(format!("No saved analysis for {}", id)))
}

pub async fn catalog() -> Json<Value> {
    Json(json!({
        "countries": COUNTRIES,
        "indicators": INDICATORS,
    }))
}

// Проверка здоровья сервиса
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Economic analysis dashboard API is running".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// Получение статуса сервиса
pub async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ready".to_string(),
        history_entries: state.history.len().await,
        history_available: state.history.is_available().await,
        available_endpoints: vec![
            "/".to_string(),
            "/status".to_string(),
            "/api/catalog".to_string(),
            "/api/analysis/list".to_string(),
            "/api/analysis/trigger".to_string(),
            "/api/analysis/:id".to_string(),
            "/api/analysis/:id/download".to_string(),
            "/api/history".to_string(),
            "/api/history/:id".to_string(),
        ],
    })
}

// Создание маршрутов
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/status", get(get_status))
        .route("/api/catalog", get(catalog))
        .route("/api/analysis/list", get(list_analyses))
        .route("/api/analysis/trigger", post(trigger_analysis))
        .route("/api/analysis/:id", get(get_analysis))
        .route("/api/analysis/:id/download", get(download_analysis))
        .route("/api/history", get(list_history))
        .route("/api/history/:id", get(get_history_entry))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
