//! 세션 다중화 차트 릴레이.
//!
//! 제어 메시지를 해석해 세션의 구독 핸들을 열거나 교체하고,
//! 업스트림 갱신을 해당 세션의 연결로만 전달합니다.

use futures::FutureExt;
use relay_core::{relay_span, BarWindow, Interval, Market, Symbol};
use relay_feed::{ChartFeed, ErrorCallback, FeedError};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn, Instrument};

use super::messages::{ClientMessage, ErrorCode, ServerMessage};
use super::session::{ConnectionId, Session, SessionTable};
use super::subscriptions::{SubscriptionHandle, SubscriptionId};
use crate::metrics::{
    decrement_websocket_connections, increment_websocket_connections, record_upstream_error,
};

/// 차트 릴레이.
pub struct ChartRelay {
    feed: Arc<dyn ChartFeed>,
    sessions: SessionTable,
}

impl ChartRelay {
    pub fn new(feed: Arc<dyn ChartFeed>) -> Self {
        Self {
            feed,
            sessions: SessionTable::new(),
        }
    }

    /// 업스트림 피드 이름.
    pub fn feed_name(&self) -> &str {
        self.feed.name()
    }

    /// 현재 연결 수.
    pub fn connections(&self) -> usize {
        self.sessions.len()
    }

    /// 새 연결의 세션을 만들고 등록합니다.
    pub fn connect(&self, outbound: mpsc::Sender<ServerMessage>) -> Arc<Session> {
        let session = Arc::new(Session::new(ConnectionId::new(), outbound));
        self.sessions.register(session.clone());
        increment_websocket_connections();
        info!(connection = %session.id(), "Client connected");
        session
    }

    /// 연결 종료: 세션을 제거하고 소유한 구독을 즉시 닫습니다.
    pub fn disconnect(&self, id: ConnectionId) {
        if let Some(session) = self.sessions.unregister(id) {
            session.close();
            decrement_websocket_connections();
            info!(connection = %id, "Client disconnected");
        }
    }

    /// 텍스트 프레임 하나를 처리합니다. 어떤 실패도 연결을 끊지 않습니다.
    pub fn handle_text(&self, session: &Arc<Session>, text: &str) {
        match ClientMessage::from_json(text) {
            Ok(ClientMessage::InitChart { symbol, interval }) => {
                self.subscribe(session, &symbol, &interval);
            }
            Ok(ClientMessage::Unknown) => {
                debug!(connection = %session.id(), "Ignoring unknown message type");
            }
            Err(e) => {
                warn!(connection = %session.id(), error = %e, "Invalid client message");
                session.send(ServerMessage::error(ErrorCode::InvalidMessage, e.to_string()));
            }
        }
    }

    /// 세션의 구독을 `(symbol, interval)`로 교체합니다.
    ///
    /// 이전 핸들은 새 연결 시도 전에 닫힙니다. 심볼이 비어 있으면 에러 이벤트만 보내고
    /// 아무 핸들도 열지 않습니다.
    pub fn subscribe(
        &self,
        session: &Arc<Session>,
        symbol: &str,
        interval: &str,
    ) -> Option<Arc<SubscriptionHandle>> {
        let symbol = match Symbol::parse(symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                session.send(ServerMessage::error(ErrorCode::InvalidSymbol, e.to_string()));
                return None;
            }
        };
        let market = Market::new(symbol, Interval::normalize(interval));

        let handle = SubscriptionHandle::new(market.clone());
        if !session.replace_subscription(handle.clone()) {
            return None;
        }

        let span = relay_span!("subscription", session.id(), market);
        let task = tokio::spawn(
            supervise_open(self.feed.clone(), session.clone(), handle.clone()).instrument(span),
        );
        handle.attach_connect_task(task);

        info!(
            connection = %session.id(),
            subscription = %handle.id(),
            symbol = %market.symbol,
            interval = %market.interval,
            "Subscription requested"
        );
        Some(handle)
    }
}

/// 연결 태스크가 패닉해도 클라이언트에 에러를 알리고 핸들을 정리합니다.
async fn supervise_open(
    feed: Arc<dyn ChartFeed>,
    session: Arc<Session>,
    handle: Arc<SubscriptionHandle>,
) {
    let handle_id = handle.id();
    let weak = Arc::downgrade(&session);

    let Err(panic) = AssertUnwindSafe(open_link(feed, session, handle))
        .catch_unwind()
        .await
    else {
        return;
    };

    let reason = panic_message(panic.as_ref());
    error!(subscription = %handle_id, reason, "Upstream connect task panicked");
    record_upstream_error("connect");
    if let Some(session) = weak.upgrade() {
        session.deliver(
            handle_id,
            ServerMessage::error(
                ErrorCode::UpstreamConnect,
                format!("upstream connect failed: {reason}"),
            ),
        );
        session.release_if_current(handle_id);
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("panic")
}

/// 업스트림 링크를 열고 콜백을 연결합니다.
async fn open_link(
    feed: Arc<dyn ChartFeed>,
    session: Arc<Session>,
    handle: Arc<SubscriptionHandle>,
) {
    let handle_id = handle.id();

    let link = match feed.open(handle.market()).await {
        Ok(link) => link,
        Err(e) => {
            warn!(error = %e, "Upstream connection failed");
            record_upstream_error("connect");
            session.deliver(
                handle_id,
                ServerMessage::error(ErrorCode::UpstreamConnect, e.to_string()),
            );
            session.release_if_current(handle_id);
            return;
        }
    };

    // 핸드셰이크 도중 교체/종료되었으면 activate가 링크를 닫습니다.
    let Some(link) = handle.activate(link) else {
        debug!("Subscription closed during handshake");
        return;
    };

    let weak = Arc::downgrade(&session);
    drop(session);

    link.on_error(error_callback(weak.clone(), handle_id));
    link.on_update(Arc::new(move |window: &BarWindow| {
        if let Some(session) = weak.upgrade() {
            session.deliver(handle_id, ServerMessage::ChartData { data: window.to_vec() });
        }
    }));
}

fn error_callback(session: Weak<Session>, handle_id: SubscriptionId) -> ErrorCallback {
    Arc::new(move |error: &FeedError| {
        let Some(session) = session.upgrade() else {
            return;
        };
        record_upstream_error(if error.is_terminal() { "terminal" } else { "transient" });
        warn!(
            connection = %session.id(),
            subscription = %handle_id,
            error = %error,
            "Upstream error"
        );

        session.deliver(
            handle_id,
            ServerMessage::error(ErrorCode::UpstreamError, error.to_string()),
        );
        if error.is_terminal() {
            session.release_if_current(handle_id);
        }
    })
}
