//! 업스트림 구독 핸들.
//!
//! 핸들 하나는 세션 하나가 독점하는 업스트림 링크 하나를 감쌉니다.
//!
//! 상태 전이: `Connecting → Active → Closed`, 어느 상태에서든 `Closed`로 갈 수 있고
//! `Closed`는 최종 상태입니다. 닫힌 핸들은 재사용하지 않습니다.

use relay_core::Market;
use relay_feed::ChartLink;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::metrics::{decrement_subscriptions, increment_subscriptions};

static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 프로세스 내에서 유일한 구독 식별자.
///
/// 같은 마켓을 다시 구독해도 새 핸들은 새 식별자를 받으므로,
/// 콜백의 소속 확인은 마켓 문자열이 아니라 이 값으로 합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// 구독 상태.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// 업스트림 핸드셰이크 대기 중
    Connecting,
    /// 링크가 열려 갱신을 전달 중
    Active,
    /// 종료됨 (최종)
    Closed,
}

struct HandleInner {
    state: SubscriptionState,
    link: Option<Arc<dyn ChartLink>>,
    connect_task: Option<JoinHandle<()>>,
}

/// 업스트림 구독 핸들.
pub struct SubscriptionHandle {
    id: SubscriptionId,
    market: Market,
    inner: Mutex<HandleInner>,
}

impl SubscriptionHandle {
    /// `Connecting` 상태의 새 핸들.
    pub fn new(market: Market) -> Arc<Self> {
        Arc::new(Self {
            id: SubscriptionId::next(),
            market,
            inner: Mutex::new(HandleInner {
                state: SubscriptionState::Connecting,
                link: None,
                connect_task: None,
            }),
        })
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn state(&self) -> SubscriptionState {
        lock(&self.inner).state
    }

    pub fn is_active(&self) -> bool {
        self.state() == SubscriptionState::Active
    }

    pub fn is_closed(&self) -> bool {
        self.state() == SubscriptionState::Closed
    }

    /// 연결 태스크를 붙입니다. 이미 닫혔으면 즉시 중단합니다.
    pub fn attach_connect_task(&self, task: JoinHandle<()>) {
        let mut inner = lock(&self.inner);
        if inner.state == SubscriptionState::Closed {
            task.abort();
        } else {
            inner.connect_task = Some(task);
        }
    }

    /// 열린 링크를 받아 `Active`로 전이합니다.
    ///
    /// 핸드셰이크 도중 핸들이 닫혔다면 링크를 바로 닫고 `None`을 반환합니다.
    /// 반환된 링크에 콜백을 등록할 때는 어떤 락도 잡고 있으면 안 됩니다.
    pub fn activate(&self, link: Box<dyn ChartLink>) -> Option<Arc<dyn ChartLink>> {
        let link: Arc<dyn ChartLink> = Arc::from(link);
        {
            let mut inner = lock(&self.inner);
            if inner.state == SubscriptionState::Connecting {
                inner.state = SubscriptionState::Active;
                inner.link = Some(link.clone());
                inner.connect_task = None;
                drop(inner);
                increment_subscriptions();
                debug!(subscription = %self.id, market = %self.market, "Subscription active");
                return Some(link);
            }
        }
        link.close();
        None
    }

    /// 핸들을 닫고 업스트림 자원을 반납합니다.
    ///
    /// 여러 번 호출해도 안전하며 실제 반납은 처음 한 번만 일어납니다.
    /// 처음 닫았을 때만 `true`를 반환합니다.
    pub fn close(&self) -> bool {
        let (previous, link, task) = {
            let mut inner = lock(&self.inner);
            if inner.state == SubscriptionState::Closed {
                return false;
            }
            let previous = inner.state;
            inner.state = SubscriptionState::Closed;
            (previous, inner.link.take(), inner.connect_task.take())
        };

        if let Some(task) = task {
            task.abort();
        }
        if let Some(link) = link {
            link.close();
        }
        if previous == SubscriptionState::Active {
            decrement_subscriptions();
        }
        debug!(subscription = %self.id, market = %self.market, ?previous, "Subscription closed");
        true
    }
}

impl fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.id)
            .field("market", &self.market.to_string())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{Interval, Symbol};
    use relay_feed::{ErrorCallback, UpdateCallback};
    use std::sync::atomic::AtomicUsize;

    struct CountingLink {
        market: Market,
        closes: Arc<AtomicUsize>,
    }

    impl ChartLink for CountingLink {
        fn market(&self) -> &Market {
            &self.market
        }
        fn on_update(&self, _callback: UpdateCallback) {}
        fn on_error(&self, _callback: ErrorCallback) {}
        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        fn is_closed(&self) -> bool {
            self.closes.load(Ordering::SeqCst) > 0
        }
    }

    fn market() -> Market {
        Market::new(Symbol::parse("OANDA:EURUSD").unwrap(), Interval::normalize("4H"))
    }

    fn link(closes: &Arc<AtomicUsize>) -> Box<dyn ChartLink> {
        Box::new(CountingLink {
            market: market(),
            closes: closes.clone(),
        })
    }

    #[test]
    fn test_ids_are_unique_for_same_market() {
        let a = SubscriptionHandle::new(market());
        let b = SubscriptionHandle::new(market());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_lifecycle_and_idempotent_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let handle = SubscriptionHandle::new(market());
        assert_eq!(handle.state(), SubscriptionState::Connecting);

        assert!(handle.activate(link(&closes)).is_some());
        assert_eq!(handle.state(), SubscriptionState::Active);

        assert!(handle.close());
        assert!(!handle.close());
        assert!(handle.is_closed());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_activate_after_close_releases_link() {
        let closes = Arc::new(AtomicUsize::new(0));
        let handle = SubscriptionHandle::new(market());
        assert!(handle.close());

        assert!(handle.activate(link(&closes)).is_none());
        assert_eq!(handle.state(), SubscriptionState::Closed);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    /// 태스크가 drop되면 완료되는 수신기와 함께 멈춰 있는 태스크를 만듭니다.
    fn parked_task() -> (JoinHandle<()>, tokio::sync::oneshot::Receiver<()>) {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        (task, rx)
    }

    #[tokio::test]
    async fn test_close_aborts_connect_task() {
        let handle = SubscriptionHandle::new(market());
        let (task, dropped) = parked_task();
        handle.attach_connect_task(task);

        handle.close();
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), dropped).await;
        assert!(matches!(result, Ok(Err(_))));
    }

    #[tokio::test]
    async fn test_attach_after_close_aborts_immediately() {
        let handle = SubscriptionHandle::new(market());
        handle.close();

        let (task, dropped) = parked_task();
        handle.attach_connect_task(task);
        let result = tokio::time::timeout(std::time::Duration::from_secs(1), dropped).await;
        assert!(matches!(result, Ok(Err(_))));
    }
}
