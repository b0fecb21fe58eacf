//! API route handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::parlay::{self, ParlayReport};
use crate::scoring::{score_race, HorseScore, ScoringConfig};
use crate::sources::PickSource;
use crate::stats::{
    compute_stats, custom_composite_stats, daily_stats, system_stats, DailyStatsRow, StatsReport,
    SystemStats,
};
use crate::storage::RaceRepository;
use crate::types::parse_race_date;

/// Application state shared across handlers.
pub struct AppState {
    pub repo: Mutex<RaceRepository>,
    pub scoring: ScoringConfig,
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Common date range + source query parameters.
#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    /// Pick source name: "pundit", "trend-30", "strategy-<id>", "composite".
    pub source: Option<String>,
}

fn parse_date_opt(s: &Option<String>) -> Result<Option<NaiveDate>, ApiError> {
    match s {
        Some(s) => parse_race_date(s)
            .map(Some)
            .map_err(|e| ApiError::bad_request(e.to_string())),
        None => Ok(None),
    }
}

fn parse_source_opt(s: &Option<String>) -> Result<PickSource, ApiError> {
    match s {
        Some(s) => s
            .parse::<PickSource>()
            .map_err(|e| ApiError::bad_request(e.to_string())),
        None => Ok(PickSource::Pundit),
    }
}

fn load_cards(
    state: &AppState,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<crate::types::RaceCard>, ApiError> {
    let repo = state
        .repo
        .lock()
        .map_err(|_| ApiError::internal("Repository lock poisoned"))?;
    repo.get_race_cards(start, end)
        .map_err(|e| ApiError::internal(e.to_string()))
}

/// Statistics response for one pick source.
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub source: String,
    #[serde(flatten)]
    pub report: StatsReport,
}

/// Per-bet-type statistics over a date range.
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let start = parse_date_opt(&query.start)?;
    let end = parse_date_opt(&query.end)?;
    let source = parse_source_opt(&query.source)?;

    let cards = load_cards(&state, start, end)?;
    let report = compute_stats(&cards, &source);
    Ok(Json(StatsResponse {
        source: source.to_string(),
        report,
    }))
}

/// Daily statistics response.
#[derive(Debug, Serialize)]
pub struct DailyStatsResponse {
    pub source: String,
    pub days: Vec<DailyStatsRow>,
}

/// Per-race-day breakdown for charting.
pub async fn daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<DailyStatsResponse>, ApiError> {
    let start = parse_date_opt(&query.start)?;
    let end = parse_date_opt(&query.end)?;
    let source = parse_source_opt(&query.source)?;

    let cards = load_cards(&state, start, end)?;
    let days = daily_stats(&cards, &source);
    Ok(Json(DailyStatsResponse {
        source: source.to_string(),
        days,
    }))
}

/// Custom composite request: an arbitrary blend of named sources.
#[derive(Debug, Deserialize)]
pub struct CompositeRequest {
    pub sources: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Statistics for a caller-defined composite blend.
pub async fn composite(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompositeRequest>,
) -> Result<Json<StatsResponse>, ApiError> {
    if req.sources.is_empty() {
        return Err(ApiError::bad_request("No sources provided"));
    }
    let sources = req
        .sources
        .iter()
        .map(|s| s.parse::<PickSource>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let start = parse_date_opt(&req.start)?;
    let end = parse_date_opt(&req.end)?;
    let cards = load_cards(&state, start, end)?;

    let source = PickSource::Composite(sources.clone());
    let report = custom_composite_stats(&cards, sources);
    Ok(Json(StatsResponse {
        source: source.to_string(),
        report,
    }))
}

/// Pundit accuracy summary.
pub async fn system(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<SystemStats>, ApiError> {
    let start = parse_date_opt(&query.start)?;
    let end = parse_date_opt(&query.end)?;
    let cards = load_cards(&state, start, end)?;
    Ok(Json(system_stats(&cards)))
}

/// Parlay simulation query parameters.
#[derive(Debug, Deserialize)]
pub struct ParlayQuery {
    pub start: Option<String>,
    pub end: Option<String>,
    pub source: Option<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_legs")]
    pub legs: usize,
}

fn default_top_k() -> usize {
    1
}

fn default_legs() -> usize {
    2
}

/// Parlay chain simulation over a date range.
pub async fn parlay(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ParlayQuery>,
) -> Result<Json<ParlayReport>, ApiError> {
    if !(1..=2).contains(&query.top_k) {
        return Err(ApiError::bad_request("top_k must be 1 or 2"));
    }
    if query.legs == 0 {
        return Err(ApiError::bad_request("legs must be at least 1"));
    }
    let start = parse_date_opt(&query.start)?;
    let end = parse_date_opt(&query.end)?;
    let source = parse_source_opt(&query.source)?;

    let cards = load_cards(&state, start, end)?;
    Ok(Json(parlay::simulate(&cards, &source, query.top_k, query.legs)))
}

/// Scored race response.
#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub race_id: String,
    pub scores: Vec<HorseScore>,
}

/// Score a single race with the configured factor table.
pub async fn score(
    State(state): State<Arc<AppState>>,
    Path(race_id): Path<String>,
) -> Result<Json<ScoreResponse>, ApiError> {
    let repo = state
        .repo
        .lock()
        .map_err(|_| ApiError::internal("Repository lock poisoned"))?;

    let card = repo
        .get_race_card(&race_id)
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| ApiError::not_found(format!("Unknown race: {}", race_id)))?;

    let factors = repo
        .get_horse_factors(&race_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let adjustments = repo
        .get_manual_adjustments(&race_id)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let scores = score_race(card.race_date, &factors, &state.scoring, &adjustments);
    Ok(Json(ScoreResponse { race_id, scores }))
}
