//! HTTP layer
//!
//! Thin axum routes over the analytics engine and the demo store. Falling
//! back to placeholder analytics is decided here, never inside the engine.

use crate::aggregator::{CONTRIBUTOR_NAME_LEN, TOP_CONTRIBUTORS};
use crate::analytics::Analyzer;
use crate::error::{AnalysisError, FetchError};
use crate::model::{AnalyticsResult, ContributorStat, Summary};
use crate::store::{Document, NewTeam, Store, Team};
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, Request, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

pub const ANALYTICS_SOURCE_HEADER: &str = "x-analytics-source";

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub store: Arc<dyn Store>,
    pub cors_origin: Arc<str>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/analytics", get(analytics_handler))
        .route("/api/teams", get(list_teams_handler).post(create_team_handler))
        .route("/api/teams/:team_id", get(get_team_handler))
        .route("/api/teams/:team_id/analytics", get(team_analytics_handler))
        .route("/api/tasks", get(list_tasks_handler).post(create_task_handler))
        .route("/api/tasks/:task_id", put(update_task_handler))
        .route("/api/events", get(list_events_handler).post(create_event_handler))
        .layer(from_fn_with_state(state.clone(), cors_middleware))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsQuery {
    repo: Option<String>,
    days: Option<i64>,
    max_commits: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TeamFilter {
    team_id: Option<String>,
}

fn error_response(status: StatusCode, kind: &str, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into(), "kind": kind }))).into_response()
}

fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::InvalidParameter { .. } | AnalysisError::ParameterOutOfRange { .. } => {
            StatusCode::BAD_REQUEST
        }
        AnalysisError::Fetch(FetchError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::Fetch(_) => StatusCode::BAD_GATEWAY,
        AnalysisError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn analytics_response(result: AnalyticsResult, source: &'static str) -> Response {
    let mut resp = Json(result).into_response();
    resp.headers_mut()
        .insert(ANALYTICS_SOURCE_HEADER, HeaderValue::from_static(source));
    resp
}

/// Stand-in payload for a team whose repository could not be analyzed:
/// members listed without activity, no timeline.
pub fn placeholder_analytics(team: &Team) -> AnalyticsResult {
    let contributors = team
        .members
        .iter()
        .take(TOP_CONTRIBUTORS)
        .map(|member| ContributorStat {
            name: member.chars().take(CONTRIBUTOR_NAME_LEN).collect(),
            commits: 0,
            additions: 0,
            deletions: 0,
            activity_score: 0,
        })
        .collect();

    AnalyticsResult {
        summary: Summary {
            total_contributors: team.members.len(),
            ..Summary::default()
        },
        contributors,
        timeline: Vec::new(),
    }
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": "Repo Analytics API", "status": "running" }))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn analytics_handler(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsQuery>,
) -> Response {
    let Some(repo) = params.repo.filter(|r| !r.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "missing_parameter", "query parameter `repo` is required");
    };

    match state.analyzer.analyze(&repo, params.days, params.max_commits).await {
        Ok(result) => analytics_response(result, "live"),
        Err(e) => {
            warn!("⚠️  Analytics for {} failed: {}", repo, e);
            error_response(status_for(&e), e.kind(), e.to_string())
        }
    }
}

async fn team_analytics_handler(
    State(state): State<AppState>,
    Path(team_id): Path<String>,
) -> Response {
    let Some(team) = state.store.get_team(&team_id) else {
        return error_response(StatusCode::NOT_FOUND, "not_found", "Team not found");
    };
    let Some(repo_url) = team.repo_url.clone() else {
        info!("Team {} has no repository, serving placeholder analytics", team.id);
        return analytics_response(placeholder_analytics(&team), "placeholder");
    };

    match state.analyzer.analyze(&repo_url, None, None).await {
        Ok(result) => analytics_response(result, "live"),
        Err(e) if e.allows_fallback() => {
            warn!("⚠️  Analytics for team {} failed ({}), serving placeholder", team.id, e);
            analytics_response(placeholder_analytics(&team), "placeholder")
        }
        Err(e) => error_response(status_for(&e), e.kind(), e.to_string()),
    }
}

async fn list_teams_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.store.list_teams())
}

async fn get_team_handler(State(state): State<AppState>, Path(team_id): Path<String>) -> Response {
    match state.store.get_team(&team_id) {
        Some(team) => Json(team).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found", "Team not found"),
    }
}

async fn create_team_handler(State(state): State<AppState>, Json(team): Json<NewTeam>) -> impl IntoResponse {
    let team = state.store.create_team(team);
    info!("👥 Created team {} ({})", team.id, team.name);
    Json(json!({ "id": team.id, "message": "Team created successfully" }))
}

async fn list_tasks_handler(State(state): State<AppState>, Query(filter): Query<TeamFilter>) -> impl IntoResponse {
    Json(state.store.list_tasks(filter.team_id.as_deref()))
}

async fn create_task_handler(State(state): State<AppState>, Json(task): Json<Document>) -> impl IntoResponse {
    Json(state.store.create_task(task))
}

async fn update_task_handler(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    Json(update): Json<Document>,
) -> Response {
    match state.store.update_task(&task_id, update) {
        Some(task) => Json(task).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "not_found", "Task not found"),
    }
}

async fn list_events_handler(State(state): State<AppState>, Query(filter): Query<TeamFilter>) -> impl IntoResponse {
    Json(state.store.list_events(filter.team_id.as_deref()))
}

async fn create_event_handler(State(state): State<AppState>, Json(event): Json<Document>) -> impl IntoResponse {
    Json(state.store.create_event(event))
}

async fn cors_middleware(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let allowed_origin = req
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .filter(|origin| *origin == &*state.cors_origin)
        .and_then(|origin| HeaderValue::from_str(origin).ok());

    let mut resp = if req.method() == Method::OPTIONS {
        let mut resp = StatusCode::NO_CONTENT.into_response();
        if allowed_origin.is_some() {
            resp.headers_mut().insert(
                "access-control-allow-methods",
                HeaderValue::from_static("GET,POST,PUT,OPTIONS"),
            );
            resp.headers_mut().insert(
                "access-control-allow-headers",
                HeaderValue::from_static("content-type,authorization"),
            );
        }
        resp
    } else {
        next.run(req).await
    };

    if let Some(origin) = allowed_origin {
        resp.headers_mut().insert("access-control-allow-origin", origin);
        resp.headers_mut().insert(
            "access-control-allow-credentials",
            HeaderValue::from_static("true"),
        );
    }
    resp
}
