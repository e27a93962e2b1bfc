//! # Relay Feed
//!
//! 업스트림 차트 데이터 소스와의 연결을 담당합니다.
//!
//! - [`ChartFeed`] / [`ChartLink`]: 릴레이가 의존하는 구독 능력 인터페이스
//! - [`tradingview`]: TradingView 소켓 클라이언트 및 심볼 검색
//! - [`simulated`]: 로컬 개발용 랜덤 워크 피드

pub mod error;
pub mod link;
pub mod simulated;
pub mod traits;
pub mod tradingview;

pub use error::*;
pub use link::{CallbackRegistry, LinkCore, StreamLink};
pub use simulated::SimulatedFeed;
pub use traits::*;
pub use tradingview::{TradingViewFeed, TradingViewSymbolSearch};
