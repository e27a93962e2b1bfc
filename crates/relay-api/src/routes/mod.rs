//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/` - 서비스 디스크립터
//! - `/health` - 릴레이 헬스 체크
//! - `/search` - 심볼 검색 패스스루
//! - `/ws` - 차트 제어 채널
//! - `/api/*` - 오라클 분석 (캐시)
//! - `/api/health` - 오라클 상태와 캐시 신선도

pub mod analysis;
pub mod health;
pub mod root;
pub mod search;

pub use analysis::{analysis_router, CalendarQuery, OracleSearchQuery, RefreshQuery};
pub use health::{health_check, oracle_health, HealthResponse, OracleHealthResponse};
pub use root::{root_descriptor, ServiceDescriptor};
pub use search::{symbol_search, SearchQuery};

use axum::{routing::get, Router};
use std::sync::Arc;

use crate::state::AppState;
use crate::websocket::websocket_router;

/// 전체 API 라우터 생성.
///
/// `/metrics`는 상태가 없는 별도 라우터로 `main`에서 병합됩니다.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(root_descriptor))
        .route("/health", get(health_check))
        .route("/search", get(symbol_search))
        .nest("/api", analysis_router())
        .merge(websocket_router())
}
