use std::{sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{sse::Sse, Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;

use store_setup_core::{Category, Country, Currency, DraftPatch, SelectOption};

use crate::form::{FormView, SubmitError};
use crate::problem::ProblemResponse;
use crate::registry::FormRegistry;
use crate::sse::{keep_alive, SseStream, ViewStreams};
use crate::telemetry;

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    forms: FormRegistry,
    streams: ViewStreams,
    sse_heartbeat: Duration,
    domain_suffix: Arc<str>,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        forms: FormRegistry,
        sse_heartbeat: Duration,
        domain_suffix: &str,
    ) -> Self {
        Self {
            metrics,
            forms,
            streams: ViewStreams::new(),
            sse_heartbeat,
            domain_suffix: Arc::from(domain_suffix),
        }
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn forms(&self) -> &FormRegistry {
        &self.forms
    }

    pub fn streams(&self) -> &ViewStreams {
        &self.streams
    }

    pub fn sse_heartbeat(&self) -> Duration {
        self.sse_heartbeat
    }

    pub fn domain_suffix(&self) -> &str {
        &self.domain_suffix
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .route("/api/options", get(options))
        .route("/api/forms", post(open_form))
        .route(
            "/api/forms/:id",
            get(get_form).patch(patch_form).delete(close_form),
        )
        .route("/api/forms/:id/submit", post(submit_form))
        .route("/api/forms/:id/events", get(form_events))
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
}

#[derive(Debug, Serialize)]
struct OptionsResponse {
    domain_suffix: String,
    countries: Vec<SelectOption>,
    categories: Vec<SelectOption>,
    currencies: Vec<SelectOption>,
}

async fn options(State(state): State<AppState>) -> Json<OptionsResponse> {
    Json(OptionsResponse {
        domain_suffix: state.domain_suffix().to_string(),
        countries: Country::options(),
        categories: Category::options(),
        currencies: Currency::options(),
    })
}

#[derive(Debug, Serialize)]
struct OpenFormResponse {
    id: String,
    view: FormView,
}

async fn open_form(State(state): State<AppState>) -> (StatusCode, Json<OpenFormResponse>) {
    let (id, session) = state.forms().open().await;
    (
        StatusCode::CREATED,
        Json(OpenFormResponse {
            id: id.to_string(),
            view: session.view(),
        }),
    )
}

async fn get_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FormView>, ProblemResponse> {
    let session = state.forms().get(&id).await?;
    Ok(Json(session.view()))
}

async fn patch_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<DraftPatch>,
) -> Result<Json<FormView>, ProblemResponse> {
    let session = state.forms().get(&id).await?;
    Ok(Json(session.apply(patch)))
}

async fn close_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ProblemResponse> {
    state.forms().close(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit_form(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<FormView>), ProblemResponse> {
    let session = state.forms().get(&id).await?;
    let status = match session.submit().await {
        Ok(_) => StatusCode::OK,
        Err(SubmitError::Invalid(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        Err(SubmitError::Api(_)) => StatusCode::BAD_GATEWAY,
        Err(SubmitError::InProgress) => return Err(ProblemResponse::submission_in_progress()),
    };
    Ok((status, Json(session.view())))
}

async fn form_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<SseStream>, ProblemResponse> {
    let session = state.forms().get(&id).await?;
    let stream = state.streams().open(&session);
    Ok(Sse::new(stream).keep_alive(keep_alive(state.sse_heartbeat())))
}
