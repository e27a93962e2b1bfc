//! 심볼 검색 패스스루.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::error::{ApiResult, ServiceError};
use crate::metrics::record_upstream_error;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub query: Option<String>,
}

/// 업스트림 심볼 검색 결과를 그대로 전달합니다.
///
/// 검색어가 없거나 공백뿐이면 업스트림을 호출하지 않고 400을 반환합니다.
/// GET /search?query=
pub async fn symbol_search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<Value>> {
    let query = params
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| ServiceError::InvalidInput("query parameter is required".to_string()))?;

    match state.symbol_search.search(query).await {
        Ok(body) => Ok(Json(body)),
        Err(e) => {
            warn!(query, error = %e, "Symbol search failed");
            record_upstream_error("search");
            Err(ServiceError::from(e).into())
        }
    }
}
