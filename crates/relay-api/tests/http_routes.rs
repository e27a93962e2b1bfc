//! HTTP 라우트 통합 테스트.
//!
//! 호출 횟수를 세는 모의 오라클과 심볼 검색으로 라우터 전체를 `oneshot`으로 구동합니다.

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    Router,
};
use relay_api::{create_api_router, AnalysisService, AppState, ChartRelay};
use relay_core::{Market, ServerConfig};
use relay_feed::{ChartFeed, ChartLink, FeedError, FeedResult, SymbolSearch};
use relay_oracle::{AnalysisOracle, OracleError, OracleResult};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TTL: Duration = Duration::from_secs(14_400);

struct CountingOracle {
    calls: AtomicUsize,
    delay: Duration,
    fail: bool,
}

impl CountingOracle {
    fn new() -> Arc<Self> {
        Self::with(Duration::ZERO, false)
    }

    fn with(delay: Duration, fail: bool) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay,
            fail,
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AnalysisOracle for CountingOracle {
    fn model(&self) -> &str {
        "sonar-pro"
    }

    async fn ask(&self, _query: &str) -> OracleResult<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(OracleError::Api {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        Ok(format!("analysis #{n}: EUR/USD outlook is bullish"))
    }
}

#[derive(Default)]
struct CountingSearch {
    calls: AtomicUsize,
    fail: bool,
}

#[async_trait]
impl SymbolSearch for CountingSearch {
    async fn search(&self, query: &str) -> FeedResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(FeedError::Timeout("10s".to_string()));
        }
        Ok(json!([{ "symbol": query.to_uppercase(), "exchange": "OANDA" }]))
    }
}

/// HTTP 테스트에서는 열리지 않는 피드.
struct IdleFeed;

#[async_trait]
impl ChartFeed for IdleFeed {
    fn name(&self) -> &str {
        "idle"
    }

    async fn open(&self, _market: &Market) -> FeedResult<Box<dyn ChartLink>> {
        Err(FeedError::Connect("idle feed".to_string()))
    }
}

fn app(oracle: Option<Arc<CountingOracle>>, search: Arc<CountingSearch>) -> Router {
    let oracle = oracle.map(|o| o as Arc<dyn AnalysisOracle>);
    let state = AppState::new(
        Arc::new(ChartRelay::new(Arc::new(IdleFeed))),
        Arc::new(AnalysisService::new(oracle, TTL)),
        search,
        &ServerConfig::default(),
    );
    create_api_router().with_state(Arc::new(state))
}

async fn call(app: &Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let body = if method == Method::POST {
        Body::from("{}")
    } else {
        Body::empty()
    };
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_health_reports_service_and_connections() {
    let app = app(None, Arc::default());

    let (status, body) = call(&app, Method::GET, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["service"], "chart-relay");
    assert_eq!(body["connections"], 0);
}

#[tokio::test]
async fn test_root_descriptor_lists_endpoints() {
    let app = app(Some(CountingOracle::new()), Arc::default());

    let (status, body) = call(&app, Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feed"], "idle");
    assert_eq!(body["model"], "sonar-pro");
    assert_eq!(body["status"], "operational");
    assert_eq!(body["features"]["caching"], "4 hours");
    assert_eq!(body["endpoints"]["websocket"], "/ws");
}

#[tokio::test]
async fn test_symbol_search_requires_query() {
    let search = Arc::new(CountingSearch::default());
    let app = app(None, search.clone());

    for uri in ["/search", "/search?query=", "/search?query=%20%20"] {
        let (status, body) = call(&app, Method::GET, uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["code"], "INVALID_INPUT");
    }
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_symbol_search_relays_upstream_json() {
    let search = Arc::new(CountingSearch::default());
    let app = app(None, search.clone());

    let (status, body) = call(&app, Method::GET, "/search?query=eurusd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "symbol": "EURUSD", "exchange": "OANDA" }]));
    assert_eq!(search.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_symbol_search_upstream_failure_is_500() {
    let search = Arc::new(CountingSearch {
        fail: true,
        ..Default::default()
    });
    let app = app(None, search);

    let (status, body) = call(&app, Method::GET, "/search?query=eurusd").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "UPSTREAM_ERROR");
}

#[tokio::test]
async fn test_fundamental_analysis_is_cached_within_ttl() {
    let oracle = CountingOracle::new();
    let app = app(Some(oracle.clone()), Arc::default());

    let (status, first) = call(&app, Method::POST, "/api/fundamental-analysis").await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = call(&app, Method::POST, "/api/fundamental-analysis").await;

    assert_eq!(oracle.calls(), 1);
    assert_eq!(first, second);
    assert_eq!(first["success"], true);
    assert_eq!(first["model"], "sonar-pro");
    assert_eq!(first["source"], "Perplexity AI");
    assert_eq!(first["cache_duration"], "4 hours");
}

#[tokio::test]
async fn test_force_refresh_issues_second_call() {
    let oracle = CountingOracle::new();
    let app = app(Some(oracle.clone()), Arc::default());

    call(&app, Method::POST, "/api/fundamental-analysis").await;
    let (status, body) = call(
        &app,
        Method::POST,
        "/api/fundamental-analysis?force_refresh=true",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(oracle.calls(), 2);
    assert!(body["analysis"].as_str().unwrap().starts_with("analysis #2"));
}

#[tokio::test]
async fn test_concurrent_requests_share_one_oracle_call() {
    let oracle = CountingOracle::with(Duration::from_millis(50), false);
    let app = app(Some(oracle.clone()), Arc::default());

    let (a, b) = tokio::join!(
        call(&app, Method::POST, "/api/fundamental-analysis"),
        call(&app, Method::POST, "/api/fundamental-analysis"),
    );

    assert_eq!(oracle.calls(), 1);
    assert_eq!(a.0, StatusCode::OK);
    assert_eq!(b.0, StatusCode::OK);
    assert_eq!(a.1, b.1);
}

#[tokio::test]
async fn test_analysis_without_oracle_is_unavailable() {
    let app = app(None, Arc::default());

    for (method, uri) in [
        (Method::POST, "/api/fundamental-analysis"),
        (Method::GET, "/api/calendar"),
        (Method::GET, "/api/news"),
        (Method::POST, "/api/analyze"),
        (Method::GET, "/api/search?q=fed"),
    ] {
        let (status, body) = call(&app, method, uri).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{uri}");
        assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    }
}

#[tokio::test]
async fn test_oracle_failure_is_500_and_not_cached() {
    let oracle = CountingOracle::with(Duration::ZERO, true);
    let app = app(Some(oracle.clone()), Arc::default());

    let (status, body) = call(&app, Method::GET, "/api/news").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "ORACLE_ERROR");

    call(&app, Method::GET, "/api/news").await;
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn test_oracle_search_requires_question() {
    let oracle = CountingOracle::new();
    let app = app(Some(oracle.clone()), Arc::default());

    let (status, _) = call(&app, Method::GET, "/api/search").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(oracle.calls(), 0);

    let (status, body) = call(&app, Method::GET, "/api/search?q=fed%20policy").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["query"], "fed policy");

    call(&app, Method::GET, "/api/search?q=fed%20policy").await;
    assert_eq!(oracle.calls(), 2);
}

#[tokio::test]
async fn test_oracle_health_reports_cache_freshness() {
    let oracle = CountingOracle::new();
    let app = app(Some(oracle), Arc::default());

    let (status, before) = call(&app, Method::GET, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(before["status"], "healthy");
    assert_eq!(before["oracle"], "connected");
    assert_eq!(before["cache"]["news"], false);

    call(&app, Method::GET, "/api/news").await;
    let (_, after) = call(&app, Method::GET, "/api/health").await;
    assert_eq!(after["cache"]["news"], true);
    assert_eq!(after["cache"]["fundamental"], false);
}

#[tokio::test]
async fn test_oracle_health_without_client() {
    let app = app(None, Arc::default());

    let (status, body) = call(&app, Method::GET, "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["oracle"], "not_configured");
    assert!(body["error"].is_string());
}
