//! 오라클 에러 타입.

use thiserror::Error;

/// 오라클 호출 에러.
///
/// 진행 중인 생성 결과를 여러 대기자에게 나눠 주기 위해 `Clone`입니다.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// API 키가 없어 클라이언트가 초기화되지 않음
    #[error("AI service not initialized. Please restart the server.")]
    NotConfigured,

    /// 네트워크 에러
    #[error("Network error: {0}")]
    Network(String),

    /// 응답 대기 시간 초과
    #[error("Request timeout: {0}")]
    Timeout(String),

    /// API가 에러 상태 코드를 반환
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// 답변 텍스트가 비어 있음
    #[error("Empty answer from oracle")]
    EmptyAnswer,

    /// 응답 파싱 실패
    #[error("Parse error: {0}")]
    Parse(String),
}

/// 오라클 작업을 위한 Result 타입.
pub type OracleResult<T> = Result<T, OracleError>;

impl OracleError {
    /// 재시도하면 성공할 수도 있는 에러인지 확인.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Network(_) | OracleError::Timeout(_) | OracleError::EmptyAnswer => true,
            OracleError::Api { status, .. } => *status == 429 || *status >= 500,
            OracleError::NotConfigured | OracleError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for OracleError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            OracleError::Timeout(err.to_string())
        } else if err.is_decode() {
            OracleError::Parse(err.to_string())
        } else {
            OracleError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for OracleError {
    fn from(err: serde_json::Error) -> Self {
        OracleError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(OracleError::Timeout("180s".into()).is_retryable());
        assert!(OracleError::Api { status: 503, message: "busy".into() }.is_retryable());
        assert!(!OracleError::Api { status: 401, message: "bad key".into() }.is_retryable());
        assert!(!OracleError::NotConfigured.is_retryable());
    }
}
