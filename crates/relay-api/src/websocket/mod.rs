//! 차트 구독을 위한 WebSocket 제어 채널.
//!
//! 연결마다 세션 하나가 있고, 세션은 업스트림 구독을 최대 하나만 소유합니다.
//!
//! # 메시지 형식
//!
//! ## 클라이언트 → 서버
//!
//! ```json
//! {"type": "INIT_CHART", "symbol": "OANDA:EURUSD", "interval": "1H"}
//! ```
//!
//! 알 수 없는 `type`은 무시됩니다.
//!
//! ## 서버 → 클라이언트
//!
//! ```json
//! {"type": "CHART_DATA", "data": [{"time": 1738300800000, "open": 1.03, ...}]}
//! {"type": "ERROR", "code": "INVALID_SYMBOL", "message": "symbol is required"}
//! ```

pub mod handler;
pub mod messages;
pub mod relay;
pub mod session;
pub mod subscriptions;

pub use handler::{websocket_handler, websocket_router};
pub use messages::{ClientMessage, ErrorCode, ServerMessage, WsError};
pub use relay::ChartRelay;
pub use session::{ConnectionId, Session, SessionTable};
pub use subscriptions::{SubscriptionHandle, SubscriptionId, SubscriptionState};
