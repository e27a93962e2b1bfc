//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! Arc로 래핑되어 Axum의 State extractor를 통해 핸들러에 주입됩니다.

use anyhow::Context;
use chrono::{DateTime, Utc};
use relay_core::{AppConfig, FeedMode, ServerConfig};
use relay_feed::{
    ChartFeed, SimulatedFeed, SymbolSearch, TradingViewFeed, TradingViewSymbolSearch,
};
use relay_oracle::{AnalysisOracle, OracleError, PerplexityClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::services::AnalysisService;
use crate::websocket::ChartRelay;

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 차트 릴레이 - 연결별 세션과 업스트림 구독
    pub relay: Arc<ChartRelay>,

    /// 분석 서비스 - 오라클 호출과 결과 캐시
    pub analysis: Arc<AnalysisService>,

    /// 심볼 검색 패스스루
    pub symbol_search: Arc<dyn SymbolSearch>,

    /// `/health`에 표시되는 서비스 이름
    pub service_name: String,

    /// 연결별 송신 큐 크기
    pub outbound_queue: usize,

    /// 서버 시작 시각
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// 이미 만들어진 구성 요소로 상태를 조립합니다.
    pub fn new(
        relay: Arc<ChartRelay>,
        analysis: Arc<AnalysisService>,
        symbol_search: Arc<dyn SymbolSearch>,
        server: &ServerConfig,
    ) -> Self {
        Self {
            relay,
            analysis,
            symbol_search,
            service_name: server.service_name.clone(),
            outbound_queue: server.outbound_queue,
            started_at: Utc::now(),
        }
    }

    /// 설정에서 피드, 오라클, 검색 클라이언트를 만들어 상태를 구성합니다.
    ///
    /// 오라클 API 키가 없으면 분석 엔드포인트만 비활성화되고 서버는 계속 뜹니다.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let feed: Arc<dyn ChartFeed> = match config.feed.mode {
            FeedMode::Tradingview => Arc::new(TradingViewFeed::new((&config.feed).into())),
            FeedMode::Simulated => Arc::new(SimulatedFeed::from_config(&config.feed)),
        };
        info!(feed = feed.name(), bar_count = config.feed.bar_count, "Chart feed configured");

        let oracle: Option<Arc<dyn AnalysisOracle>> =
            match PerplexityClient::from_config(&config.oracle) {
                Ok(client) => {
                    info!(model = %config.oracle.model, "Oracle client initialized");
                    Some(Arc::new(client))
                }
                Err(OracleError::NotConfigured) => {
                    warn!("PERPLEXITY_API_KEY not set, analysis endpoints disabled");
                    None
                }
                Err(e) => {
                    warn!(error = %e, "Oracle client init failed, analysis endpoints disabled");
                    None
                }
            };

        let symbol_search = TradingViewSymbolSearch::new(&config.search)
            .context("failed to build symbol search client")?;

        let analysis = AnalysisService::new(oracle, Duration::from_secs(config.cache.ttl_secs));

        Ok(Self::new(
            Arc::new(ChartRelay::new(feed)),
            Arc::new(analysis),
            Arc::new(symbol_search),
            &config.server,
        ))
    }

    /// 서버 업타임(초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}
