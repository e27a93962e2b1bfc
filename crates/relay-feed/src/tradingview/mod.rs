//! TradingView 연동.
//!
//! - `protocol`: `~m~` 프레임 코덱과 패킷 해석
//! - `client`: 차트 소켓 기반 [`ChartFeed`](crate::ChartFeed)
//! - `search`: 심볼 검색 HTTP 클라이언트

pub mod client;
pub mod protocol;
pub mod search;

pub use client::{TradingViewConfig, TradingViewFeed};
pub use search::TradingViewSymbolSearch;
