//! 차트 릴레이 REST API 및 WebSocket 서버.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 연결별 세션과 단일 업스트림 구독을 관리하는 WebSocket 제어 채널
//! - 심볼 검색 패스스루
//! - 캐시된 오라클 분석 엔드포인트
//! - Prometheus 메트릭
//!
//! # 모듈 구성
//!
//! - [`state`]: 애플리케이션 공유 상태 (AppState)
//! - [`routes`]: REST API 엔드포인트
//! - [`websocket`]: 차트 제어 채널
//! - [`services`]: 분석 서비스
//! - [`cache`]: single-flight TTL 캐시
//! - [`metrics`]: Prometheus 메트릭 수집
//! - [`middleware`]: HTTP 미들웨어

pub mod cache;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod websocket;

pub use cache::{Cached, SingleFlightCache};
pub use error::{api_error, ApiErrorResponse, ApiResult, ServiceError};
pub use metrics::setup_metrics_recorder;
pub use middleware::metrics_layer;
pub use routes::create_api_router;
pub use services::{AnalysisService, AnalyzeRequest, CacheStatus};
pub use state::AppState;
pub use websocket::{
    websocket_handler, websocket_router, ChartRelay, ClientMessage, ErrorCode, ServerMessage,
    Session, SessionTable, SubscriptionHandle, SubscriptionId, WsError,
};
