//! AI 분석 서비스.
//!
//! 오라클 호출 결과를 종류별 단일 슬롯 캐시에 보관합니다.
//! 모든 캐시는 같은 TTL을 사용하며 TTL은 시작 시 정해집니다.

use chrono::{Duration as ChronoDuration, Utc};
use relay_oracle::extract::{self, CalendarEvent, NewsStory};
use relay_oracle::{prompts, AnalysisOracle, OracleError, OracleResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cache::{Cached, SingleFlightCache};
use crate::error::ServiceError;
use crate::metrics::{record_cache_hit, record_oracle_request};

/// 응답의 `source` 필드.
pub const SOURCE: &str = "Perplexity AI";

/// 맥락 한 조각의 최대 길이 (문자).
const CONTEXT_PART_LIMIT: usize = 500;

/// 기본 캘린더 조회 기간 (일).
const DEFAULT_CALENDAR_DAYS: i64 = 7;

// ==================== 응답 타입 ====================

/// 펀더멘털 분석 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalReport {
    pub success: bool,
    pub analysis: String,
    pub model: String,
    pub date: String,
    pub time: String,
    pub source: String,
    pub generated_at: String,
    pub cache_duration: String,
}

/// 경제 캘린더 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarReport {
    pub success: bool,
    pub date_from: String,
    pub date_to: String,
    pub events: Vec<CalendarEvent>,
    pub count: usize,
    pub source: String,
    pub cached_at: String,
}

/// 시장 뉴스 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsReport {
    pub success: bool,
    pub news: Vec<NewsStory>,
    pub count: usize,
    pub source: String,
    pub cached_at: String,
}

/// 시장 분석 결과.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub analysis: Value,
    pub source: String,
    pub generated_at: String,
}

/// 자유 질문 답변.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchAnswer {
    pub success: bool,
    pub query: String,
    pub response: String,
    pub source: String,
    pub timestamp: String,
}

fn default_true() -> bool {
    true
}

/// `POST /api/analyze` 요청 본문.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default = "default_true")]
    pub include_calendar: bool,
    #[serde(default = "default_true")]
    pub include_news: bool,
    #[serde(default)]
    pub custom_query: Option<String>,
}

impl Default for AnalyzeRequest {
    fn default() -> Self {
        Self {
            include_calendar: true,
            include_news: true,
            custom_query: None,
        }
    }
}

/// 캐시별 신선도.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub fundamental: bool,
    pub calendar: bool,
    pub news: bool,
    pub analysis: bool,
}

// ==================== 서비스 ====================

/// 오라클 기반 분석 서비스.
pub struct AnalysisService {
    oracle: Option<Arc<dyn AnalysisOracle>>,
    ttl: Duration,
    fundamental: SingleFlightCache<FundamentalReport>,
    calendar: SingleFlightCache<CalendarReport>,
    news: SingleFlightCache<NewsReport>,
    analysis: SingleFlightCache<AnalysisReport>,
}

impl AnalysisService {
    /// 새 서비스 생성. 오라클이 없으면 모든 요청이 `Unavailable`로 실패합니다.
    pub fn new(oracle: Option<Arc<dyn AnalysisOracle>>, ttl: Duration) -> Self {
        Self {
            oracle,
            ttl,
            fundamental: SingleFlightCache::new(ttl),
            calendar: SingleFlightCache::new(ttl),
            news: SingleFlightCache::new(ttl),
            analysis: SingleFlightCache::new(ttl),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.oracle.is_some()
    }

    /// 모든 캐시에 공통인 TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 오라클 모델 이름.
    pub fn model(&self) -> Option<&str> {
        self.oracle.as_deref().map(|oracle| oracle.model())
    }

    /// 캐시별 신선도.
    pub fn cache_status(&self) -> CacheStatus {
        CacheStatus {
            fundamental: self.fundamental.is_fresh(),
            calendar: self.calendar.is_fresh(),
            news: self.news.is_fresh(),
            analysis: self.analysis.is_fresh(),
        }
    }

    fn oracle(&self) -> Result<Arc<dyn AnalysisOracle>, ServiceError> {
        self.oracle.clone().ok_or(ServiceError::Unavailable)
    }

    /// 펀더멘털 분석 (캐시됨).
    pub async fn fundamental(&self, force: bool) -> Result<FundamentalReport, ServiceError> {
        let oracle = self.oracle()?;
        let cache_duration = humanize(self.ttl);

        let cached = self
            .fundamental
            .get(force, move || async move {
                let now = Utc::now();
                let date = now.format("%Y-%m-%d").to_string();
                let time = now.format("%H:%M:%S").to_string();
                info!("Starting fundamental analysis");

                let analysis = ask(
                    oracle.as_ref(),
                    "fundamental",
                    &prompts::fundamental_analysis(&date, &time),
                )
                .await?;

                Ok::<_, OracleError>(FundamentalReport {
                    success: true,
                    analysis,
                    model: oracle.model().to_string(),
                    date,
                    time,
                    source: SOURCE.to_string(),
                    generated_at: Utc::now().to_rfc3339(),
                    cache_duration,
                })
            })
            .await?;
        Ok(observe("fundamental", cached))
    }

    /// 경제 캘린더 (캐시됨). 기본 기간은 오늘부터 7일.
    ///
    /// 캐시된 결과의 기간이 요청 기간과 다르면 새로 생성합니다.
    pub async fn calendar(
        &self,
        date_from: Option<String>,
        date_to: Option<String>,
        force: bool,
    ) -> Result<CalendarReport, ServiceError> {
        let oracle = self.oracle()?;
        let today = Utc::now().date_naive();
        let date_from = date_from
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| today.format("%Y-%m-%d").to_string());
        let date_to = date_to
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| {
                (today + ChronoDuration::days(DEFAULT_CALENDAR_DAYS))
                    .format("%Y-%m-%d")
                    .to_string()
            });

        let covers = |report: &CalendarReport| {
            report.date_from == date_from && report.date_to == date_to
        };
        let other_range = self.calendar.peek().is_some_and(|cached| !covers(&cached));
        let generate = || generate_calendar(oracle.clone(), date_from.clone(), date_to.clone());

        let mut cached = self.calendar.get(force || other_range, generate).await?;
        // 다른 기간의 생성에 합류했다면 요청 기간으로 다시 생성합니다
        if !covers(&cached.value) {
            cached = self.calendar.get(true, generate).await?;
        }
        if !covers(&cached.value) {
            warn!(%date_from, %date_to, "Calendar slot raced by another range, answering uncached");
            cached = Cached {
                value: generate().await?,
                generated_at: Utc::now(),
                hit: false,
            };
        }
        Ok(observe("calendar", cached))
    }

    /// 최신 시장 뉴스 (캐시됨).
    pub async fn news(&self, force: bool) -> Result<NewsReport, ServiceError> {
        let oracle = self.oracle()?;

        let cached = self
            .news
            .get(force, move || async move {
                let answer = ask(oracle.as_ref(), "news", &prompts::market_news()).await?;
                let news = extract::parse_news(&answer);

                Ok::<_, OracleError>(NewsReport {
                    success: true,
                    count: news.len(),
                    news,
                    source: SOURCE.to_string(),
                    cached_at: Utc::now().to_rfc3339(),
                })
            })
            .await?;
        Ok(observe("news", cached))
    }

    /// 시장 분석.
    ///
    /// `custom_query`가 있으면 캐시를 거치지 않고, 요청된 캘린더/뉴스 맥락을
    /// 덧붙여 바로 질문합니다.
    pub async fn analyze(
        &self,
        request: AnalyzeRequest,
        force: bool,
    ) -> Result<AnalysisReport, ServiceError> {
        let oracle = self.oracle()?;

        if let Some(custom) = request.custom_query.as_deref().filter(|q| !q.trim().is_empty()) {
            let context = self
                .context(request.include_calendar, request.include_news)
                .await;
            let query = format!("{custom}\n\nContext:\n{context}");
            let answer = ask(oracle.as_ref(), "custom_analysis", &query).await?;
            return Ok(AnalysisReport {
                success: true,
                analysis: extract::parse_analysis(&answer),
                source: SOURCE.to_string(),
                generated_at: Utc::now().to_rfc3339(),
            });
        }

        let cached = self
            .analysis
            .get(force, move || async move {
                let now = Utc::now();
                let prompt = prompts::fundamental_analysis(
                    &now.format("%Y-%m-%d").to_string(),
                    &now.format("%H:%M").to_string(),
                );
                let answer = ask(oracle.as_ref(), "analysis", &prompt).await?;

                Ok::<_, OracleError>(AnalysisReport {
                    success: true,
                    analysis: extract::parse_analysis(&answer),
                    source: SOURCE.to_string(),
                    generated_at: Utc::now().to_rfc3339(),
                })
            })
            .await?;
        Ok(observe("analysis", cached))
    }

    /// 캐시 없는 자유 질문.
    pub async fn search(&self, query: &str) -> Result<SearchAnswer, ServiceError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ServiceError::InvalidInput("q parameter is required".to_string()));
        }
        let oracle = self.oracle()?;
        info!(query, "Oracle search");

        let response = ask(oracle.as_ref(), "search", query).await?;
        Ok(SearchAnswer {
            success: true,
            query: query.to_string(),
            response,
            source: SOURCE.to_string(),
            timestamp: Utc::now().to_rfc3339(),
        })
    }

    /// 캐시된 캘린더/뉴스로 맥락 문자열을 만듭니다. 실패한 조각은 건너뜁니다.
    async fn context(&self, include_calendar: bool, include_news: bool) -> String {
        let mut parts = Vec::new();

        if include_calendar {
            match self.calendar(None, None, false).await {
                Ok(report) => parts.push(format!("Economic Calendar: {}", truncated_json(&report))),
                Err(e) => warn!(error = %e, "Calendar context unavailable"),
            }
        }
        if include_news {
            match self.news(false).await {
                Ok(report) => parts.push(format!("Latest News: {}", truncated_json(&report))),
                Err(e) => warn!(error = %e, "News context unavailable"),
            }
        }

        parts.join("\n\n")
    }
}

/// 오라클 호출 + 메트릭.
/// 주어진 기간의 캘린더를 오라클에 묻습니다.
async fn generate_calendar(
    oracle: Arc<dyn AnalysisOracle>,
    date_from: String,
    date_to: String,
) -> OracleResult<CalendarReport> {
    info!(%date_from, %date_to, "Querying oracle for calendar");
    let answer = ask(
        oracle.as_ref(),
        "calendar",
        &prompts::economic_calendar(&date_from, &date_to),
    )
    .await?;
    let events = extract::parse_calendar(&answer, &date_from);

    Ok(CalendarReport {
        success: true,
        count: events.len(),
        date_from,
        date_to,
        events,
        source: SOURCE.to_string(),
        cached_at: Utc::now().to_rfc3339(),
    })
}

async fn ask(oracle: &dyn AnalysisOracle, kind: &str, query: &str) -> OracleResult<String> {
    let started = Instant::now();
    let result = oracle.ask(query).await;
    record_oracle_request(kind, result.is_ok(), started.elapsed().as_secs_f64());
    if let Err(e) = &result {
        warn!(kind, error = %e, "Oracle request failed");
    }
    result
}

fn observe<T>(key: &str, cached: Cached<T>) -> T {
    if cached.hit {
        record_cache_hit(key);
        info!(key, generated_at = %cached.generated_at, "Returning cached result");
    }
    cached.value
}

fn truncated_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .chars()
        .take(CONTEXT_PART_LIMIT)
        .collect()
}

/// TTL을 사람이 읽는 문자열로 (예: 14400초 → "4 hours").
pub fn humanize(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    let (value, unit) = if secs >= 3600 && secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs >= 60 && secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };
    if value == 1 {
        format!("1 {unit}")
    } else {
        format!("{value} {unit}s")
    }
}
