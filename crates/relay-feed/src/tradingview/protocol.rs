//! TradingView 소켓 프레임 코덱 및 패킷 해석.
//!
//! 프레임 형식은 `~m~<길이>~m~<페이로드>`이며 길이는 페이로드의 UTF-16 단위 수입니다.
//! 하나의 소켓 메시지에 여러 프레임이 이어 붙어 올 수 있습니다.

use rand::Rng;
use relay_core::{Bar, Market};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::FeedError;

const FRAME_MARKER: &str = "~m~";
const HEARTBEAT_PREFIX: &str = "~h~";

/// 가격 시리즈 식별자.
pub const SERIES_ID: &str = "$prices";
const SYMBOL_REF: &str = "ser_1";
const SERIES_TURNAROUND: &str = "s1";

// ==================== 프레임 ====================

/// 해석된 프레임.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// 하트비트 (`~h~<n>`). 같은 페이로드로 응답해야 합니다.
    Heartbeat(String),
    /// 메서드 패킷 (`{"m": ..., "p": [...]}`)
    Packet(Packet),
    /// 세션 헬로 등 메서드가 없는 JSON
    Info(Value),
}

/// 메서드 패킷.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Packet {
    #[serde(rename = "m")]
    pub method: String,
    #[serde(rename = "p", default)]
    pub params: Vec<Value>,
}

/// 페이로드를 프레임으로 감쌉니다.
pub fn encode_frame(payload: &str) -> String {
    format!(
        "{FRAME_MARKER}{}{FRAME_MARKER}{payload}",
        payload.encode_utf16().count()
    )
}

/// 메서드 패킷을 프레임으로 인코딩합니다.
pub fn encode_packet(method: &str, params: Vec<Value>) -> String {
    encode_frame(&json!({ "m": method, "p": params }).to_string())
}

/// 소켓 메시지 하나에서 프레임 페이로드들을 분리합니다.
///
/// 선언된 길이가 다음 마커나 메시지 끝과 맞지 않으면 다음 마커까지를 페이로드로 봅니다.
pub fn split_frames(raw: &str) -> Vec<&str> {
    let mut payloads = Vec::new();
    let mut rest = raw;

    while let Some(start) = rest.find(FRAME_MARKER) {
        rest = &rest[start + FRAME_MARKER.len()..];
        let Some(len_end) = rest.find(FRAME_MARKER) else {
            break;
        };
        let declared = rest[..len_end].trim().parse::<usize>().ok();
        rest = &rest[len_end + FRAME_MARKER.len()..];

        let end = declared
            .and_then(|units| utf16_offset(rest, units))
            .filter(|&end| rest[end..].is_empty() || rest[end..].starts_with(FRAME_MARKER))
            .or_else(|| rest.find(FRAME_MARKER))
            .unwrap_or(rest.len());

        payloads.push(&rest[..end]);
        rest = &rest[end..];
    }

    payloads
}

/// UTF-16 단위 `units`개에 해당하는 바이트 오프셋.
fn utf16_offset(s: &str, units: usize) -> Option<usize> {
    let mut count = 0;
    for (idx, ch) in s.char_indices() {
        if count == units {
            return Some(idx);
        }
        count += ch.len_utf16();
        if count > units {
            return None;
        }
    }
    (count == units).then_some(s.len())
}

/// 페이로드 하나를 해석합니다.
pub fn parse_payload(payload: &str) -> Result<Frame, FeedError> {
    if payload.starts_with(HEARTBEAT_PREFIX) {
        return Ok(Frame::Heartbeat(payload.to_string()));
    }

    let value: Value = serde_json::from_str(payload)?;
    if value.get("m").is_some() {
        let packet: Packet = serde_json::from_value(value)?;
        Ok(Frame::Packet(packet))
    } else {
        Ok(Frame::Info(value))
    }
}

/// 메시지에 들어 있는 모든 프레임을 해석합니다. 해석 실패한 프레임은 에러로 남깁니다.
pub fn decode_message(raw: &str) -> Vec<Result<Frame, FeedError>> {
    split_frames(raw).into_iter().map(parse_payload).collect()
}

// ==================== 핸드셰이크 ====================

/// 새 차트 세션 ID (`cs_` + 소문자 12자).
pub fn new_chart_session_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..12)
        .map(|_| char::from(rng.gen_range(b'a'..=b'z')))
        .collect();
    format!("cs_{suffix}")
}

/// 헬로 수신 후 보낼 구독 패킷들.
pub fn subscribe_packets(session: &str, market: &Market, bar_count: usize) -> Vec<String> {
    let symbol_spec = format!(
        "={}",
        json!({ "symbol": market.symbol.as_str(), "adjustment": "splits" })
    );

    vec![
        encode_packet("set_auth_token", vec![json!("unauthorized_user_token")]),
        encode_packet("chart_create_session", vec![json!(session), json!("")]),
        encode_packet(
            "resolve_symbol",
            vec![json!(session), json!(SYMBOL_REF), json!(symbol_spec)],
        ),
        encode_packet(
            "create_series",
            vec![
                json!(session),
                json!(SERIES_ID),
                json!(SERIES_TURNAROUND),
                json!(SYMBOL_REF),
                json!(market.interval.code()),
                json!(bar_count),
                json!(""),
            ],
        ),
    ]
}

// ==================== 패킷 해석 ====================

/// 시리즈 관점에서 본 패킷 의미.
#[derive(Debug, Clone, PartialEq)]
pub enum SeriesEvent {
    /// 새 바 또는 갱신된 바
    Bars(Vec<Bar>),
    /// 업스트림 에러
    Error(FeedError),
    /// 바와 무관한 패킷
    Ignored,
}

#[derive(Debug, Deserialize)]
struct SeriesPoint {
    v: Vec<f64>,
}

/// 패킷을 시리즈 이벤트로 해석합니다.
pub fn interpret(packet: &Packet) -> SeriesEvent {
    match packet.method.as_str() {
        "timescale_update" | "du" => match extract_bars(&packet.params) {
            Ok(bars) if bars.is_empty() => SeriesEvent::Ignored,
            Ok(bars) => SeriesEvent::Bars(bars),
            Err(err) => SeriesEvent::Error(err),
        },
        "symbol_error" | "series_error" | "critical_error" => {
            SeriesEvent::Error(FeedError::upstream(
                packet.method.clone(),
                describe(packet.params.iter().skip(1)),
            ))
        }
        "protocol_error" => SeriesEvent::Error(FeedError::upstream(
            packet.method.clone(),
            describe(packet.params.iter()),
        )),
        _ => SeriesEvent::Ignored,
    }
}

fn describe<'a>(params: impl Iterator<Item = &'a Value>) -> String {
    let parts: Vec<String> = params
        .filter_map(|value| match value {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Null => None,
            Value::String(_) => None,
            other => Some(other.to_string()),
        })
        .collect();
    if parts.is_empty() {
        "unknown error".to_string()
    } else {
        parts.join(": ")
    }
}

/// `p[1]["$prices"]["s"]`의 `{i, v: [t, o, h, l, c, vol]}` 목록을 바로 변환합니다.
fn extract_bars(params: &[Value]) -> Result<Vec<Bar>, FeedError> {
    let Some(series) = params
        .get(1)
        .and_then(|data| data.get(SERIES_ID))
        .and_then(|series| series.get("s"))
    else {
        return Ok(Vec::new());
    };

    let points: Vec<SeriesPoint> = serde_json::from_value(series.clone())?;
    points
        .into_iter()
        .map(|point| match point.v.as_slice() {
            [time, open, high, low, close, rest @ ..] => Ok(Bar {
                time: (time * 1000.0).round() as i64,
                open: *open,
                high: *high,
                low: *low,
                close: *close,
                volume: rest.first().copied().unwrap_or(0.0),
            }),
            _ => Err(FeedError::Protocol(format!(
                "series point has {} values",
                point.v.len()
            ))),
        })
        .collect()
}
