//! WebSocket 메시지 타입.
//!
//! 클라이언트-서버 간 교환되는 제어 채널 메시지 정의.

use relay_core::Bar;
use serde::{Deserialize, Serialize};

/// WebSocket 에러.
#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 기본 인터벌 (일봉).
fn default_interval() -> String {
    "D".to_string()
}

// ==================== 클라이언트 → 서버 메시지 ====================

/// 클라이언트에서 서버로 보내는 메시지.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// 차트 구독 (기존 구독은 교체됨)
    #[serde(rename = "INIT_CHART")]
    InitChart {
        #[serde(default)]
        symbol: String,
        #[serde(default = "default_interval")]
        interval: String,
    },
    /// 알 수 없는 메시지 타입 (무시)
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// JSON 문자열에서 파싱.
    pub fn from_json(json: &str) -> Result<Self, WsError> {
        serde_json::from_str(json).map_err(|e| WsError::InvalidMessage(e.to_string()))
    }
}

// ==================== 서버 → 클라이언트 메시지 ====================

/// 제어 채널 에러 코드.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// 파싱할 수 없는 메시지
    InvalidMessage,
    /// 빈 심볼
    InvalidSymbol,
    /// 업스트림 연결/핸드셰이크 실패
    UpstreamConnect,
    /// 구독 중 업스트림 에러
    UpstreamError,
}

/// 서버에서 클라이언트로 보내는 메시지.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerMessage {
    /// 현재 바 윈도우 전체 (오래된 순)
    ChartData { data: Vec<Bar> },
    /// 에러 이벤트. 연결은 유지됩니다.
    Error { code: ErrorCode, message: String },
}

impl ServerMessage {
    /// 에러 메시지 생성.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }

    /// JSON 문자열로 직렬화.
    pub fn to_json(&self) -> Result<String, WsError> {
        Ok(serde_json::to_string(self)?)
    }
}
