//! 오라클 분석 endpoint.
//!
//! 모든 응답은 [`AnalysisService`](crate::services::AnalysisService)의 캐시를 거칩니다.
//! `/api/search`만 예외로 매번 오라클을 호출합니다.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use super::health::oracle_health;
use crate::error::ApiResult;
use crate::services::{
    AnalysisReport, AnalyzeRequest, CalendarReport, FundamentalReport, NewsReport, SearchAnswer,
};
use crate::state::AppState;

/// `force_refresh`만 받는 쿼리.
#[derive(Debug, Default, Deserialize)]
pub struct RefreshQuery {
    #[serde(default)]
    pub force_refresh: bool,
}

/// 캘린더 쿼리. 날짜는 `YYYY-MM-DD`.
#[derive(Debug, Default, Deserialize)]
pub struct CalendarQuery {
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct OracleSearchQuery {
    #[serde(default)]
    pub q: String,
}

/// POST /api/fundamental-analysis
pub async fn fundamental_analysis(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshQuery>,
) -> ApiResult<Json<FundamentalReport>> {
    let report = state.analysis.fundamental(params.force_refresh).await?;
    Ok(Json(report))
}

/// GET /api/calendar
pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CalendarQuery>,
) -> ApiResult<Json<CalendarReport>> {
    let report = state
        .analysis
        .calendar(params.date_from, params.date_to, params.force_refresh)
        .await?;
    Ok(Json(report))
}

/// GET /api/news
pub async fn news(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshQuery>,
) -> ApiResult<Json<NewsReport>> {
    Ok(Json(state.analysis.news(params.force_refresh).await?))
}

/// 시장 분석. 빈 객체 `{}`는 기본 요청과 같습니다.
///
/// POST /api/analyze
pub async fn analyze(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RefreshQuery>,
    Json(request): Json<AnalyzeRequest>,
) -> ApiResult<Json<AnalysisReport>> {
    let report = state.analysis.analyze(request, params.force_refresh).await?;
    Ok(Json(report))
}

/// 캐시 없는 오라클 질의.
///
/// GET /api/search?q=
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OracleSearchQuery>,
) -> ApiResult<Json<SearchAnswer>> {
    Ok(Json(state.analysis.search(&params.q).await?))
}

/// 분석 라우터 생성 (`/api` 아래에 중첩).
pub fn analysis_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/fundamental-analysis", post(fundamental_analysis))
        .route("/calendar", get(calendar))
        .route("/news", get(news))
        .route("/analyze", post(analyze))
        .route("/search", get(search))
        .route("/health", get(oracle_health))
}
