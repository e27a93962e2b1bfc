//! 서비스 디스크립터 endpoint.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::services::humanize;
use crate::state::AppState;

/// `GET /` 응답.
#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    pub version: String,
    /// 활성 차트 피드 이름
    pub feed: String,
    /// 오라클 모델 (미설정이면 `null`)
    pub model: Option<String>,
    pub endpoints: BTreeMap<String, String>,
    /// "operational" | "degraded"
    pub status: String,
    pub features: Features,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Features {
    pub realtime_charts: bool,
    pub symbol_search: bool,
    pub ai_analysis: bool,
    /// 분석 캐시 유지 시간 (예: "4 hours")
    pub caching: String,
}

/// 서비스 디스크립터.
///
/// GET /
pub async fn root_descriptor(State(state): State<Arc<AppState>>) -> Json<ServiceDescriptor> {
    let analysis = &state.analysis;

    let endpoints = [
        ("websocket", "/ws"),
        ("health", "/health"),
        ("symbol_search", "/search"),
        ("fundamental_analysis", "/api/fundamental-analysis"),
        ("calendar", "/api/calendar"),
        ("news", "/api/news"),
        ("analysis", "/api/analyze"),
        ("search", "/api/search"),
        ("oracle_health", "/api/health"),
        ("metrics", "/metrics"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    Json(ServiceDescriptor {
        name: state.service_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        feed: state.relay.feed_name().to_string(),
        model: analysis.model().map(str::to_string),
        endpoints,
        status: if analysis.is_configured() {
            "operational"
        } else {
            "degraded"
        }
        .to_string(),
        features: Features {
            realtime_charts: true,
            symbol_search: true,
            ai_analysis: analysis.is_configured(),
            caching: humanize(analysis.ttl()),
        },
    })
}
