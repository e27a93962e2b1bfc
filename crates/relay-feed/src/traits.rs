//! 차트 피드 trait 정의.
//!
//! 릴레이는 업스트림을 다음 능력으로만 다룹니다:
//! `open(market) -> link`, `link.on_update(cb)`, `link.on_error(cb)`, `link.close()`.

use async_trait::async_trait;
use relay_core::{BarWindow, Market};
use std::sync::Arc;

use crate::error::{FeedError, FeedResult};

/// 바 윈도우 갱신 콜백. 항상 전체 윈도우(오래된 순)를 받습니다.
pub type UpdateCallback = Arc<dyn Fn(&BarWindow) + Send + Sync>;

/// 업스트림 에러 콜백.
pub type ErrorCallback = Arc<dyn Fn(&FeedError) + Send + Sync>;

/// 차트 데이터 소스.
#[async_trait]
pub trait ChartFeed: Send + Sync {
    /// 피드 이름 반환.
    fn name(&self) -> &str;

    /// 마켓 구독을 엽니다. 업스트림 핸드셰이크가 끝난 뒤 반환됩니다.
    async fn open(&self, market: &Market) -> FeedResult<Box<dyn ChartLink>>;
}

/// 하나의 업스트림 구독에 대한 독점 연결.
///
/// 모든 메서드는 동기적이며 내부 락을 짧게만 잡습니다.
/// 호출자는 자신의 락을 잡은 채로 `on_update`를 호출하면 안 됩니다
/// (등록 즉시 현재 윈도우로 콜백이 호출될 수 있음).
pub trait ChartLink: Send + Sync {
    /// 이 링크가 열린 마켓.
    fn market(&self) -> &Market;

    /// 갱신 콜백 등록. 이미 받은 바가 있으면 즉시 한 번 호출됩니다.
    fn on_update(&self, callback: UpdateCallback);

    /// 에러 콜백 등록.
    fn on_error(&self, callback: ErrorCallback);

    /// 모든 콜백을 해제하고 업스트림 자원을 반납합니다. 여러 번 호출해도 안전합니다.
    fn close(&self);

    /// 닫혔는지 여부.
    fn is_closed(&self) -> bool;
}

/// 심볼 검색 소스.
#[async_trait]
pub trait SymbolSearch: Send + Sync {
    /// 검색어에 대한 업스트림 JSON 응답을 그대로 반환합니다.
    async fn search(&self, query: &str) -> FeedResult<serde_json::Value>;
}
