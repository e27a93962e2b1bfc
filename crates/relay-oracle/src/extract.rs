//! 자유 형식 답변에서 JSON 추출.
//!
//! 추출 순서:
//! 1. 전체 텍스트를 그대로 파싱
//! 2. 첫 번째 ```` ``` ```` 코드 블록 (실패 시 후행 쉼표 제거 후 재시도)
//! 3. 첫 `[`부터 마지막 `]`까지
//! 4. 첫 `{`부터 마지막 `}`까지

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

const FENCE: &str = "```";

/// 답변 텍스트에서 JSON 값을 추출합니다.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(block) = fenced_block(trimmed) {
        if let Ok(value) = serde_json::from_str(block) {
            return Some(value);
        }
        if let Ok(value) = serde_json::from_str(&strip_trailing_commas(block)) {
            return Some(value);
        }
    }

    for (open, close) in [('[', ']'), ('{', '}')] {
        if let Some(span) = outermost(trimmed, open, close) {
            if let Ok(value) = serde_json::from_str(span) {
                return Some(value);
            }
        }
    }

    None
}

/// 첫 번째 코드 블록 본문 (언어 태그 `json` 제외).
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE)? + FENCE.len();
    let rest = &text[start..];
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let end = rest.find(FENCE)?;
    Some(rest[..end].trim())
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// `]` 또는 `}` 바로 앞(공백 무시)의 쉼표를 제거합니다.
fn strip_trailing_commas(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (idx, &ch) in chars.iter().enumerate() {
        if ch == ',' {
            let next = chars[idx + 1..].iter().find(|c| !c.is_whitespace());
            if matches!(next, Some(']') | Some('}')) {
                continue;
            }
        }
        out.push(ch);
    }
    out
}

// ==================== 타입 ====================

/// 문자열/숫자/불리언을 모두 문자열로 받습니다.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_optional(deserializer)?.unwrap_or_default())
}

fn lenient_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// 경제 캘린더 이벤트.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub time: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub country: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub event: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub currency: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub impact: String,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub actual: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub forecast: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional")]
    pub previous: Option<String>,
}

/// 뉴스 기사.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsStory {
    #[serde(default, deserialize_with = "lenient_text")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub source: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub impact: String,
    #[serde(default)]
    pub affected_pairs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<String>,
}

/// 시장 방향성.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    /// 키워드 기반 방향성 추정.
    pub fn from_keywords(text: &str) -> Self {
        let lower = text.to_lowercase();
        let has_any = |words: &[&str]| words.iter().any(|w| lower.contains(w));
        if has_any(&["bullish", "positive", "upward", "rally"]) {
            Sentiment::Bullish
        } else if has_any(&["bearish", "negative", "downward", "decline"]) {
            Sentiment::Bearish
        } else {
            Sentiment::Neutral
        }
    }
}

/// JSON이 없는 답변에 대한 시장 분석 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAnalysis {
    pub sentiment: Sentiment,
    pub confidence: u8,
    pub top_pairs: Vec<String>,
    pub risk_factors: Vec<String>,
    pub reasoning: String,
}

impl MarketAnalysis {
    /// 키워드로 방향성만 추정한 기본 분석.
    pub fn fallback(answer: &str) -> Self {
        Self {
            sentiment: Sentiment::from_keywords(answer),
            confidence: 75,
            top_pairs: vec![
                "EUR/USD".to_string(),
                "GBP/USD".to_string(),
                "USD/JPY".to_string(),
            ],
            risk_factors: vec!["Market uncertainty".to_string()],
            reasoning: answer.to_string(),
        }
    }
}

// ==================== 파서 ====================

fn typed_items<T: for<'de> Deserialize<'de>>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

fn list_under(value: Value, keys: &[&str]) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(mut map) => keys
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// 캘린더 답변 파싱. JSON이 없으면 `키: 값` 줄에서 이벤트를 추정합니다.
pub fn parse_calendar(answer: &str, today: &str) -> Vec<CalendarEvent> {
    if let Some(value) = extract_json(answer) {
        return typed_items(list_under(value, &["events"]));
    }

    warn!("JSON parsing failed for calendar, using line fallback");
    answer
        .lines()
        .map(str::trim)
        .filter(|line| {
            let lower = line.to_lowercase();
            line.contains(':') && ["event", "release", "data"].iter().any(|kw| lower.contains(kw))
        })
        .map(|line| CalendarEvent {
            date: today.to_string(),
            time: "TBD".to_string(),
            country: "Various".to_string(),
            event: line.rsplit(':').next().unwrap_or_default().trim().to_string(),
            currency: "USD".to_string(),
            impact: "Medium".to_string(),
            actual: None,
            forecast: None,
            previous: None,
        })
        .collect()
}

/// 뉴스 답변 파싱. 목록, `{news: [...]}`, `{stories: [...]}`를 받습니다.
pub fn parse_news(answer: &str) -> Vec<NewsStory> {
    match extract_json(answer) {
        Some(value) => typed_items(list_under(value, &["news", "stories"])),
        None => {
            warn!("JSON parsing failed for news");
            Vec::new()
        }
    }
}

/// 분석 답변 파싱. JSON 객체면 그대로, 아니면 키워드 기반 요약을 반환합니다.
pub fn parse_analysis(answer: &str) -> Value {
    match extract_json(answer) {
        Some(value @ Value::Object(_)) => value,
        _ => serde_json::to_value(MarketAnalysis::fallback(answer)).unwrap_or(Value::Null),
    }
}
