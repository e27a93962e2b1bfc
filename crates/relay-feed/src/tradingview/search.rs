//! TradingView 심볼 검색 클라이언트.

use async_trait::async_trait;
use relay_core::SearchConfig;
use reqwest::header::ORIGIN;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::traits::SymbolSearch;

/// 업스트림 심볼 검색 엔드포인트 호출기. 결과를 캐시하지 않습니다.
pub struct TradingViewSymbolSearch {
    client: Client,
    url: String,
    origin: String,
}

impl TradingViewSymbolSearch {
    /// 새로운 검색 클라이언트 생성.
    pub fn new(config: &SearchConfig) -> FeedResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            url: config.url.clone(),
            origin: config.origin.clone(),
        })
    }
}

#[async_trait]
impl SymbolSearch for TradingViewSymbolSearch {
    async fn search(&self, query: &str) -> FeedResult<serde_json::Value> {
        let query = query.trim();
        if query.is_empty() {
            return Err(FeedError::InvalidInput("query is required".to_string()));
        }

        debug!(query = %query, "Symbol search");
        let response = self
            .client
            .get(&self.url)
            .header(ORIGIN, &self.origin)
            .query(&[
                ("text", query),
                ("hl", "1"),
                ("lang", "en"),
                ("domain", "production"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Symbol search rejected by upstream");
            return Err(FeedError::upstream(
                format!("http_{}", status.as_u16()),
                body.chars().take(200).collect::<String>(),
            ));
        }

        Ok(response.json().await?)
    }
}
