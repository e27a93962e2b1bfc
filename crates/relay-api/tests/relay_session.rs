//! 세션 다중화 릴레이 통합 테스트.
//!
//! 호출 횟수를 세는 모의 피드로 다음을 확인합니다:
//! 1. 세션당 활성 구독은 최대 하나
//! 2. 교체된 핸들의 늦은 이벤트는 전달되지 않음
//! 3. 연결 종료 시 업스트림 링크가 정확히 한 번 해제됨
//! 4. 인터벌 정규화와 빈 입력 거부

use async_trait::async_trait;
use relay_api::{ChartRelay, ErrorCode, ServerMessage, Session, SubscriptionHandle};
use relay_core::{Bar, BarWindow, Market};
use relay_feed::{ChartFeed, ChartLink, ErrorCallback, FeedError, FeedResult, UpdateCallback};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};

/// 모의 링크 상태. 닫힌 뒤에도 콜백을 보관해 늦은 이벤트를 흉내낼 수 있습니다.
struct MockLinkState {
    market: Market,
    updates: Mutex<Vec<UpdateCallback>>,
    errors: Mutex<Vec<ErrorCallback>>,
    closes: AtomicUsize,
    closed: AtomicBool,
}

impl MockLinkState {
    fn emit_update(&self, window: &BarWindow) {
        let callbacks = self.updates.lock().unwrap().clone();
        for callback in callbacks {
            callback(window);
        }
    }

    fn emit_error(&self, error: &FeedError) {
        let callbacks = self.errors.lock().unwrap().clone();
        for callback in callbacks {
            callback(error);
        }
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct MockLink(Arc<MockLinkState>);

impl ChartLink for MockLink {
    fn market(&self) -> &Market {
        &self.0.market
    }

    fn on_update(&self, callback: UpdateCallback) {
        self.0.updates.lock().unwrap().push(callback);
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.0.errors.lock().unwrap().push(callback);
    }

    fn close(&self) {
        self.0.closes.fetch_add(1, Ordering::SeqCst);
        self.0.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.0.closed.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct MockFeed {
    opens: AtomicUsize,
    links: Mutex<Vec<Arc<MockLinkState>>>,
    fail_with: Option<FeedError>,
    gate: Option<Arc<Semaphore>>,
    panics: bool,
}

impl MockFeed {
    fn failing(error: FeedError) -> Self {
        Self {
            fail_with: Some(error),
            ..Default::default()
        }
    }

    fn panicking() -> Self {
        Self {
            panics: true,
            ..Default::default()
        }
    }

    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Default::default()
        }
    }

    fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn link(&self, index: usize) -> Arc<MockLinkState> {
        self.links.lock().unwrap()[index].clone()
    }

    fn links(&self) -> Vec<Arc<MockLinkState>> {
        self.links.lock().unwrap().clone()
    }

    /// 열렸지만 아직 해제되지 않은 링크 수.
    fn live_links(&self) -> usize {
        self.links().iter().filter(|link| link.closes() == 0).count()
    }
}

#[async_trait]
impl ChartFeed for MockFeed {
    fn name(&self) -> &str {
        "mock"
    }

    async fn open(&self, market: &Market) -> FeedResult<Box<dyn ChartLink>> {
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.map_err(|_| FeedError::Closed)?;
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.panics {
            panic!("feed adapter bug");
        }
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }

        let state = Arc::new(MockLinkState {
            market: market.clone(),
            updates: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            closes: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        });
        self.links.lock().unwrap().push(state.clone());
        Ok(Box::new(MockLink(state)))
    }
}

struct Harness {
    feed: Arc<MockFeed>,
    relay: ChartRelay,
    session: Arc<Session>,
    outbound: mpsc::Receiver<ServerMessage>,
}

impl Harness {
    fn new(feed: MockFeed) -> Self {
        let feed = Arc::new(feed);
        let relay = ChartRelay::new(feed.clone());
        let (tx, outbound) = mpsc::channel(64);
        let session = relay.connect(tx);
        Self {
            feed,
            relay,
            session,
            outbound,
        }
    }

    fn init_chart(&self, symbol: &str, interval: &str) -> Option<Arc<SubscriptionHandle>> {
        self.relay.subscribe(&self.session, symbol, interval)
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            messages.push(message);
        }
        messages
    }
}

/// 조건이 참이 될 때까지 스폰된 태스크에 실행 기회를 줍니다.
async fn settle(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(1), async {
        while !condition() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// 태스크 큐를 몇 번 비웁니다.
async fn yield_a_few() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn window_with(close: f64) -> BarWindow {
    let mut window = BarWindow::new(100);
    window.upsert(Bar {
        time: 1_738_300_800_000,
        open: close,
        high: close,
        low: close,
        close,
        volume: 10.0,
    });
    window
}

#[tokio::test]
async fn test_consecutive_subscribes_leave_one_active_handle() {
    let mut h = Harness::new(MockFeed::default());

    let mut handles = Vec::new();
    for symbol in ["OANDA:EURUSD", "OANDA:GBPUSD", "OANDA:USDJPY", "OANDA:AUDUSD"] {
        let handle = h.init_chart(symbol, "1H").unwrap();
        settle(|| handle.is_active()).await;
        handles.push(handle);
    }

    let (last, prior) = handles.split_last().unwrap();
    assert!(last.is_active());
    assert!(prior.iter().all(|handle| handle.is_closed()));

    assert_eq!(h.feed.opens(), 4);
    assert_eq!(h.feed.live_links(), 1);
    for link in &h.feed.links()[..3] {
        assert_eq!(link.closes(), 1);
    }
    assert_eq!(h.session.subscription().unwrap().id(), last.id());
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_rapid_subscribes_before_handshake_keep_one_link() {
    let h = Harness::new(MockFeed::default());

    let handles: Vec<_> = (0..5)
        .map(|_| h.init_chart("BINANCE:BTCUSDT", "D").unwrap())
        .collect();

    let last = handles.last().unwrap().clone();
    settle(|| last.is_active()).await;
    yield_a_few().await;

    assert_eq!(handles.iter().filter(|handle| handle.is_closed()).count(), 4);
    assert_eq!(h.feed.live_links(), 1);
    // 핸드셰이크 중 교체된 핸들이 링크를 얻었다면 이미 닫혀 있어야 합니다
    assert!(h
        .feed
        .links()
        .iter()
        .all(|link| link.closes() <= 1));
}

#[tokio::test]
async fn test_late_event_for_replaced_handle_is_dropped() {
    let mut h = Harness::new(MockFeed::default());

    let first = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    settle(|| first.is_active()).await;
    let second = h.init_chart("OANDA:GBPUSD", "1H").unwrap();
    settle(|| second.is_active()).await;
    h.drain();

    let stale = h.feed.link(0);
    stale.emit_update(&window_with(1.03));
    stale.emit_error(&FeedError::upstream("series_error", "late"));
    assert!(h.drain().is_empty());

    h.feed.link(1).emit_update(&window_with(1.27));
    let messages = h.drain();
    assert_eq!(messages.len(), 1);
    match &messages[0] {
        ServerMessage::ChartData { data } => {
            assert_eq!(data.len(), 1);
            assert_eq!(data[0].close, 1.27);
        }
        other => panic!("unexpected message: {other:?}"),
    }
}

#[tokio::test]
async fn test_disconnect_releases_link_exactly_once() {
    let mut h = Harness::new(MockFeed::default());

    let handle = h.init_chart("OANDA:EURUSD", "4H").unwrap();
    settle(|| handle.is_active()).await;
    assert_eq!(h.relay.connections(), 1);

    h.relay.disconnect(h.session.id());
    assert!(handle.is_closed());
    assert_eq!(h.feed.link(0).closes(), 1);
    assert_eq!(h.relay.connections(), 0);

    // 두 번째 종료와 늦은 이벤트는 아무 효과가 없어야 합니다
    h.relay.disconnect(h.session.id());
    handle.close();
    h.feed.link(0).emit_update(&window_with(1.0));
    assert_eq!(h.feed.link(0).closes(), 1);
    assert!(h.drain().is_empty());
}

#[tokio::test]
async fn test_disconnect_during_handshake_opens_nothing() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::new(MockFeed::gated(gate.clone()));

    let handle = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    yield_a_few().await;
    assert!(!handle.is_active());

    h.relay.disconnect(h.session.id());
    assert!(handle.is_closed());

    gate.add_permits(1);
    yield_a_few().await;
    assert_eq!(h.feed.opens(), 0);
    assert_eq!(h.feed.live_links(), 0);
}

#[tokio::test]
async fn test_updates_reach_only_owning_session() {
    let feed = Arc::new(MockFeed::default());
    let relay = ChartRelay::new(feed.clone());
    let (tx_a, mut rx_a) = mpsc::channel(8);
    let (tx_b, mut rx_b) = mpsc::channel(8);
    let a = relay.connect(tx_a);
    let b = relay.connect(tx_b);

    let handle_a = relay.subscribe(&a, "OANDA:EURUSD", "1H").unwrap();
    settle(|| handle_a.is_active()).await;
    let handle_b = relay.subscribe(&b, "OANDA:EURUSD", "1H").unwrap();
    settle(|| handle_b.is_active()).await;

    // 같은 마켓이라도 세션마다 독립된 링크를 가집니다
    assert_eq!(feed.opens(), 2);

    feed.link(0).emit_update(&window_with(1.1));
    assert!(matches!(rx_a.try_recv(), Ok(ServerMessage::ChartData { .. })));
    assert!(rx_b.try_recv().is_err());
}

#[tokio::test]
async fn test_interval_is_normalized_before_open() {
    let h = Harness::new(MockFeed::default());

    let hourly = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    settle(|| hourly.is_active()).await;
    let weekly = h.init_chart("OANDA:EURUSD", "weekly").unwrap();
    settle(|| weekly.is_active()).await;

    assert_eq!(h.feed.link(0).market.interval.code(), "60");
    assert_eq!(h.feed.link(1).market.interval.code(), "weekly");
}

#[tokio::test]
async fn test_empty_symbol_emits_error_and_opens_nothing() {
    let mut h = Harness::new(MockFeed::default());

    assert!(h.init_chart("   ", "1H").is_none());
    h.relay
        .handle_text(&h.session, r#"{"type": "INIT_CHART", "interval": "1H"}"#);
    yield_a_few().await;

    let messages = h.drain();
    assert_eq!(messages.len(), 2);
    for message in messages {
        match message {
            ServerMessage::Error { code, .. } => assert_eq!(code, ErrorCode::InvalidSymbol),
            other => panic!("unexpected message: {other:?}"),
        }
    }
    assert_eq!(h.feed.opens(), 0);
    assert!(h.session.subscription().is_none());
}

#[tokio::test]
async fn test_empty_symbol_keeps_existing_subscription() {
    let h = Harness::new(MockFeed::default());

    let handle = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    settle(|| handle.is_active()).await;
    assert!(h.init_chart("", "1H").is_none());

    assert!(handle.is_active());
    assert_eq!(h.feed.link(0).closes(), 0);
}

#[tokio::test]
async fn test_malformed_and_unknown_messages() {
    let mut h = Harness::new(MockFeed::default());

    h.relay.handle_text(&h.session, "not json");
    h.relay.handle_text(&h.session, r#"{"type": "PING"}"#);
    yield_a_few().await;

    let messages = h.drain();
    assert_eq!(messages.len(), 1);
    assert!(matches!(
        messages[0],
        ServerMessage::Error { code: ErrorCode::InvalidMessage, .. }
    ));
    assert_eq!(h.feed.opens(), 0);
}

#[tokio::test]
async fn test_init_chart_text_opens_link() {
    let h = Harness::new(MockFeed::default());

    h.relay.handle_text(
        &h.session,
        r#"{"type": "INIT_CHART", "symbol": "OANDA:EURUSD", "interval": "1D"}"#,
    );
    settle(|| h.feed.opens() == 1).await;

    let market = &h.feed.link(0).market;
    assert_eq!(market.symbol.as_str(), "OANDA:EURUSD");
    assert_eq!(market.interval.code(), "D");
}

#[tokio::test]
async fn test_open_failure_reports_and_releases() {
    let mut h = Harness::new(MockFeed::failing(FeedError::Handshake(
        "no hello frame".to_string(),
    )));

    let handle = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    settle(|| handle.is_closed() || h.session.subscription().is_none()).await;
    yield_a_few().await;

    let messages = h.drain();
    assert!(matches!(
        messages.as_slice(),
        [ServerMessage::Error { code: ErrorCode::UpstreamConnect, .. }]
    ));
    assert!(h.session.subscription().is_none());
}

#[tokio::test]
async fn test_panicking_open_reports_and_releases() {
    let mut h = Harness::new(MockFeed::panicking());

    let handle = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    settle(|| handle.is_closed()).await;
    yield_a_few().await;

    let messages = h.drain();
    match messages.as_slice() {
        [ServerMessage::Error { code: ErrorCode::UpstreamConnect, message }] => {
            assert!(message.contains("feed adapter bug"));
        }
        other => panic!("unexpected messages: {other:?}"),
    }
    assert!(h.session.subscription().is_none());
    assert!(!h.session.is_closed());
    assert_eq!(h.feed.opens(), 1);
}

#[tokio::test]
async fn test_terminal_upstream_error_releases_subscription() {
    let mut h = Harness::new(MockFeed::default());

    let handle = h.init_chart("OANDA:EURUSD", "1H").unwrap();
    settle(|| handle.is_active()).await;

    h.feed
        .link(0)
        .emit_error(&FeedError::upstream("series_error", "retrying"));
    assert!(handle.is_active());

    h.feed
        .link(0)
        .emit_error(&FeedError::Disconnected("socket closed".to_string()));

    let messages = h.drain();
    assert_eq!(messages.len(), 2);
    assert!(messages
        .iter()
        .all(|m| matches!(m, ServerMessage::Error { code: ErrorCode::UpstreamError, .. })));
    assert!(handle.is_closed());
    assert_eq!(h.feed.link(0).closes(), 1);
    assert!(h.session.subscription().is_none());
}
