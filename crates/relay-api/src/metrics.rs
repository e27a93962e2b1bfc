//! Prometheus 메트릭 설정 및 유틸리티.
//!
//! HTTP 요청 메트릭과 릴레이/오라클 메트릭을 수집하고 `/metrics` 엔드포인트로 노출합니다.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

/// HTTP 요청 지속 시간 히스토그램 버킷 (초).
const HTTP_DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0, 300.0];

/// 오라클 호출 지속 시간 히스토그램 버킷 (초).
const ORACLE_DURATION_BUCKETS: &[f64] = &[0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 180.0];

/// Prometheus 메트릭 레코더를 설정하고 핸들을 반환합니다.
///
/// # Errors
///
/// 버킷 설정이 잘못되었거나 레코더가 이미 설치되어 있으면 에러를 반환합니다.
pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("http_request_duration_seconds".to_string()),
            HTTP_DURATION_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Full("oracle_request_duration_seconds".to_string()),
            ORACLE_DURATION_BUCKETS,
        )?
        .install_recorder()
}

// ==================== HTTP 메트릭 ====================

/// HTTP 요청 카운터 증가.
pub fn record_http_request(method: &str, path: &str) {
    counter!("http_requests_total", "method" => method.to_string(), "path" => path.to_string())
        .increment(1);
}

/// HTTP 응답 카운터 증가.
pub fn record_http_response(method: &str, path: &str, status: u16) {
    counter!(
        "http_responses_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// HTTP 요청 지속 시간 기록.
pub fn record_http_duration(method: &str, path: &str, duration_secs: f64) {
    histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_secs);
}

// ==================== 릴레이 메트릭 ====================

/// WebSocket 연결 수 증가.
pub fn increment_websocket_connections() {
    gauge!("websocket_connections_active").increment(1.0);
}

/// WebSocket 연결 수 감소.
pub fn decrement_websocket_connections() {
    gauge!("websocket_connections_active").decrement(1.0);
}

/// 업스트림 구독 수 증가.
pub fn increment_subscriptions() {
    gauge!("relay_subscriptions_active").increment(1.0);
}

/// 업스트림 구독 수 감소.
pub fn decrement_subscriptions() {
    gauge!("relay_subscriptions_active").decrement(1.0);
}

/// 업스트림 에러 카운터 증가.
pub fn record_upstream_error(kind: &str) {
    counter!("relay_upstream_errors_total", "kind" => kind.to_string()).increment(1);
}

// ==================== 오라클 메트릭 ====================

/// 오라클 호출 결과 기록.
pub fn record_oracle_request(kind: &str, success: bool, duration_secs: f64) {
    let result = if success { "success" } else { "failure" };
    counter!(
        "oracle_requests_total",
        "kind" => kind.to_string(),
        "result" => result
    )
    .increment(1);
    histogram!("oracle_request_duration_seconds", "kind" => kind.to_string())
        .record(duration_secs);
}

/// 분석 캐시 적중 카운터 증가.
pub fn record_cache_hit(key: &str) {
    counter!("analysis_cache_hits_total", "key" => key.to_string()).increment(1);
}

/// 매칭되지 않은 경로에 사용하는 라벨.
pub const UNMATCHED_PATH: &str = "unmatched";

/// 메트릭 라벨용 경로.
///
/// 라우터가 매칭한 경로 템플릿을 그대로 쓰고, 매칭되지 않은 요청은
/// 하나의 라벨로 묶어 카디널리티를 제한합니다.
pub fn path_label(matched: Option<&str>) -> String {
    matched.unwrap_or(UNMATCHED_PATH).to_string()
}
