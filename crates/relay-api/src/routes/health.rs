//! 헬스 체크 endpoint.
//!
//! `/health`는 릴레이 프로세스 자체, `/api/health`는 오라클과 캐시 상태를 보고합니다.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::CacheStatus;
use crate::state::AppState;

/// 릴레이 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// 항상 "ok"
    pub status: String,
    pub service: String,
    /// 현재 연결된 WebSocket 수
    pub connections: usize,
}

/// 오라클 헬스 체크 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct OracleHealthResponse {
    /// "healthy" | "unhealthy"
    pub status: String,
    /// "connected" | "not_configured"
    pub oracle: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// 캐시 키별 신선도
    pub cache: CacheStatus,
    pub uptime_secs: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 릴레이 헬스 체크.
///
/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: state.service_name.clone(),
        connections: state.relay.connections(),
    })
}

/// 오라클 상태와 캐시 신선도.
///
/// 오라클이 없어도 200을 반환하고 본문의 `status`로 구분합니다.
/// GET /api/health
pub async fn oracle_health(State(state): State<Arc<AppState>>) -> Json<OracleHealthResponse> {
    let analysis = &state.analysis;
    let configured = analysis.is_configured();

    Json(OracleHealthResponse {
        status: if configured { "healthy" } else { "unhealthy" }.to_string(),
        oracle: if configured {
            "connected"
        } else {
            "not_configured"
        }
        .to_string(),
        model: analysis.model().map(str::to_string),
        cache: analysis.cache_status(),
        uptime_secs: state.uptime_secs(),
        error: (!configured).then(|| "PERPLEXITY_API_KEY not configured".to_string()),
    })
}
