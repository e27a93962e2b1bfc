//! 설정 관리.
//!
//! 내장 기본값, 선택적 설정 파일, 환경 변수 순서로 설정을 병합합니다.
//! 환경 변수는 `RELAY` 접두어와 `__` 구분자를 사용합니다
//! (예: `RELAY__SERVER__PORT=9000`).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CoreResult;

/// 기본 설정 파일 경로.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// 애플리케이션 설정.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// 서버 설정
    #[serde(default)]
    pub server: ServerConfig,
    /// 업스트림 차트 피드 설정
    #[serde(default)]
    pub feed: FeedConfig,
    /// 심볼 검색 설정
    #[serde(default)]
    pub search: SearchConfig,
    /// 분석 오라클 설정
    #[serde(default)]
    pub oracle: OracleConfig,
    /// 분석 캐시 설정
    #[serde(default)]
    pub cache: CacheConfig,
    /// 로깅 설정
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 서버 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 바인딩할 호스트
    pub host: String,
    /// 리스닝할 포트
    pub port: u16,
    /// 헬스 체크에 노출되는 서비스 이름
    pub service_name: String,
    /// HTTP 요청 타임아웃 (초)
    pub request_timeout_secs: u64,
    /// 허용할 CORS origin 목록 (비어 있으면 모두 허용)
    pub cors_origins: Vec<String>,
    /// 연결당 송신 큐 크기
    pub outbound_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8006,
            service_name: "chart-relay".to_string(),
            request_timeout_secs: 300,
            cors_origins: Vec::new(),
            outbound_queue: 256,
        }
    }
}

/// 차트 피드 구현 선택.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedMode {
    /// TradingView 소켓 연결
    #[default]
    Tradingview,
    /// 랜덤 워크 시뮬레이션 (로컬 개발용)
    Simulated,
}

/// 업스트림 차트 피드 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// 피드 구현
    pub mode: FeedMode,
    /// 소켓 URL
    pub url: String,
    /// 핸드셰이크 시 전송할 Origin 헤더
    pub origin: String,
    /// 요청할 바 개수 (윈도우 크기와 동일)
    pub bar_count: usize,
    /// 핸드셰이크 타임아웃 (초)
    pub handshake_timeout_secs: u64,
    /// 시뮬레이션 틱 간격 (밀리초)
    pub simulated_tick_ms: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            mode: FeedMode::Tradingview,
            url: "wss://data.tradingview.com/socket.io/websocket".to_string(),
            origin: "https://www.tradingview.com".to_string(),
            bar_count: 100,
            handshake_timeout_secs: 10,
            simulated_tick_ms: 1_000,
        }
    }
}

/// 심볼 검색 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SearchConfig {
    /// 검색 엔드포인트
    pub url: String,
    /// 요청 시 전송할 Origin 헤더
    pub origin: String,
    /// 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "https://symbol-search.tradingview.com/symbol_search/v3/".to_string(),
            origin: "https://www.tradingview.com".to_string(),
            timeout_secs: 10,
        }
    }
}

/// 분석 오라클 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    /// API 키. 없으면 분석 엔드포인트는 503을 반환합니다.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// API 기본 URL
    pub base_url: String,
    /// 모델 이름
    pub model: String,
    /// 응답 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.perplexity.ai".to_string(),
            model: "sonar-pro".to_string(),
            timeout_secs: 180,
        }
    }
}

/// 분석 캐시 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// 항목 유효 시간 (초)
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 14_400 }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 로그 레벨
    pub level: String,
    /// 로그 형식 (pretty, json, compact)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// 파일과 환경 변수에서 설정을 로드합니다.
    ///
    /// 파일이 없으면 기본값과 환경 변수만 사용합니다.
    /// `PORT`와 `PERPLEXITY_API_KEY`는 접두어 없이도 인식됩니다.
    pub fn load<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::from(path.as_ref()).required(false))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("server.cors_origins")
                    .try_parsing(true),
            );

        let mut config: AppConfig = builder.build()?.try_deserialize()?;
        config.apply_env_fallbacks(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// 기본 경로에서 설정을 로드합니다.
    pub fn load_default() -> CoreResult<Self> {
        Self::load(DEFAULT_CONFIG_PATH)
    }

    /// 접두어 없는 관용 환경 변수를 반영합니다.
    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            self.server.port = port;
        }
        if self.oracle.api_key.is_none() {
            self.oracle.api_key = lookup("PERPLEXITY_API_KEY").filter(|k| !k.trim().is_empty());
        }
    }

    /// 바인딩 주소 문자열 반환.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
