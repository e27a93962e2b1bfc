//! 통합 API 에러 응답 타입.
//!
//! 모든 HTTP 엔드포인트는 실패 시 같은 JSON 형식을 반환합니다.

use axum::{http::StatusCode, Json};
use relay_feed::FeedError;
use relay_oracle::OracleError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "UPSTREAM_ERROR",
///   "message": "Search request failed: Timeout: 10s",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_INPUT", "SERVICE_UNAVAILABLE")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 타임스탬프를 포함한 에러 생성.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보를 덧붙입니다.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// API 핸들러 Result 타입.
pub type ApiResult<T> = Result<T, (StatusCode, Json<ApiErrorResponse>)>;

/// 상태 코드와 에러 본문을 묶습니다.
pub fn api_error(
    status: StatusCode,
    code: &str,
    message: impl Into<String>,
) -> (StatusCode, Json<ApiErrorResponse>) {
    (status, Json(ApiErrorResponse::new(code, message)))
}

// ==================== 서비스 에러 ====================

/// 분석/검색 서비스 에러.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// 오라클 클라이언트가 초기화되지 않음 (재시작으로만 복구)
    #[error("AI service not initialized. Please restart the server.")]
    Unavailable,

    /// 잘못된 요청
    #[error("{0}")]
    InvalidInput(String),

    /// 오라클 호출 실패
    #[error("Analysis failed: {0}")]
    Oracle(OracleError),

    /// 심볼 검색 실패
    #[error("Search request failed: {0}")]
    Search(FeedError),
}

impl ServiceError {
    /// 에러 코드 문자열.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unavailable => "SERVICE_UNAVAILABLE",
            ServiceError::InvalidInput(_) => "INVALID_INPUT",
            ServiceError::Oracle(_) => "ORACLE_ERROR",
            ServiceError::Search(_) => "UPSTREAM_ERROR",
        }
    }

    /// HTTP 상태 코드.
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Oracle(_) | ServiceError::Search(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<OracleError> for ServiceError {
    fn from(err: OracleError) -> Self {
        match err {
            OracleError::NotConfigured => ServiceError::Unavailable,
            other => ServiceError::Oracle(other),
        }
    }
}

impl From<FeedError> for ServiceError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::InvalidInput(message) => ServiceError::InvalidInput(message),
            other => ServiceError::Search(other),
        }
    }
}

impl From<ServiceError> for (StatusCode, Json<ApiErrorResponse>) {
    fn from(err: ServiceError) -> Self {
        api_error(err.status(), err.code(), err.to_string())
    }
}
