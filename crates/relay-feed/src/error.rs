//! 피드 에러 타입.

use thiserror::Error;

/// 구독을 종료시키는 업스트림 에러 종류.
const TERMINAL_UPSTREAM_KINDS: &[&str] = &["symbol_error", "critical_error", "protocol_error"];

/// 업스트림 피드 관련 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// 소켓/HTTP 연결 실패
    #[error("Connection failed: {0}")]
    Connect(String),

    /// 핸드셰이크 실패
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// 프레임/패킷 해석 실패
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 업스트림이 보고한 에러
    #[error("Upstream {kind}: {message}")]
    Upstream { kind: String, message: String },

    /// 업스트림 연결 끊김
    #[error("Disconnected: {0}")]
    Disconnected(String),

    /// 타임아웃
    #[error("Timeout: {0}")]
    Timeout(String),

    /// 잘못된 요청 (빈 검색어 등)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 이미 닫힌 링크
    #[error("Link closed")]
    Closed,
}

/// 피드 작업을 위한 Result 타입.
pub type FeedResult<T> = Result<T, FeedError>;

impl FeedError {
    /// 이후 링크가 더 이상 이벤트를 내보내지 않는 에러인지 확인.
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::Upstream { kind, .. } => TERMINAL_UPSTREAM_KINDS.contains(&kind.as_str()),
            FeedError::Protocol(_) | FeedError::InvalidInput(_) => false,
            _ => true,
        }
    }

    /// 업스트림 에러 생성 헬퍼.
    pub fn upstream(kind: impl Into<String>, message: impl Into<String>) -> Self {
        FeedError::Upstream {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FeedError::Timeout(err.to_string())
        } else if err.is_decode() {
            FeedError::Protocol(err.to_string())
        } else {
            FeedError::Connect(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Protocol(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error as WsError;
        match err {
            WsError::ConnectionClosed | WsError::AlreadyClosed => {
                FeedError::Disconnected(err.to_string())
            }
            WsError::Protocol(_) => FeedError::Protocol(err.to_string()),
            other => FeedError::Connect(other.to_string()),
        }
    }
}
