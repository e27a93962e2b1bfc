//! 연결별 세션 상태와 세션 테이블.

use relay_core::Market;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};
use uuid::Uuid;

use super::messages::ServerMessage;
use super::subscriptions::{SubscriptionHandle, SubscriptionId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// 연결 식별자.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Default)]
struct SessionState {
    market: Option<Market>,
    subscription: Option<Arc<SubscriptionHandle>>,
    closed: bool,
}

/// 클라이언트 연결 하나에 묶인 서버 측 상태.
///
/// 세션은 최대 하나의 구독 핸들만 소유합니다. 상태 락은 비동기 대기 없이
/// 짧게만 잡으며, 업스트림 콜백은 이 락 안에서 핸들 식별자를 확인한 뒤 전송합니다.
pub struct Session {
    id: ConnectionId,
    outbound: mpsc::Sender<ServerMessage>,
    state: Mutex<SessionState>,
}

impl Session {
    /// 새 세션 생성. `outbound`는 연결의 송신 태스크로 이어집니다.
    pub fn new(id: ConnectionId, outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id,
            outbound,
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// 마지막으로 요청된 마켓.
    pub fn market(&self) -> Option<Market> {
        lock(&self.state).market.clone()
    }

    /// 현재 구독 핸들.
    pub fn subscription(&self) -> Option<Arc<SubscriptionHandle>> {
        lock(&self.state).subscription.clone()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// 이 연결로 메시지를 보냅니다. 세션이 닫혔거나 큐가 가득 차면 `false`.
    pub fn send(&self, message: ServerMessage) -> bool {
        if lock(&self.state).closed {
            return false;
        }
        self.enqueue(message)
    }

    fn enqueue(&self, message: ServerMessage) -> bool {
        match self.outbound.try_send(message) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection = %self.id, "Outbound queue full, dropping message");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// 현재 핸들을 새 핸들로 교체합니다.
    ///
    /// 이전 핸들은 반환 전에 완전히 닫힙니다. 세션이 이미 닫혔으면
    /// 새 핸들을 닫고 `false`를 반환합니다.
    pub fn replace_subscription(&self, handle: Arc<SubscriptionHandle>) -> bool {
        let previous = {
            let mut state = lock(&self.state);
            if state.closed {
                drop(state);
                handle.close();
                return false;
            }
            state.market = Some(handle.market().clone());
            state.subscription.replace(handle)
        };

        if let Some(previous) = previous {
            debug!(connection = %self.id, subscription = %previous.id(), "Replacing subscription");
            previous.close();
        }
        true
    }

    /// `handle_id`가 현재 핸들일 때만 메시지를 보냅니다.
    ///
    /// 교체되었거나 닫힌 핸들에서 늦게 도착한 이벤트는 여기서 버려집니다.
    pub fn deliver(&self, handle_id: SubscriptionId, message: ServerMessage) -> bool {
        let state = lock(&self.state);
        let current = state
            .subscription
            .as_ref()
            .is_some_and(|handle| handle.id() == handle_id && !handle.is_closed());
        if state.closed || !current {
            debug!(connection = %self.id, subscription = %handle_id, "Dropping stale event");
            return false;
        }
        self.enqueue(message)
    }

    /// `handle_id`가 현재 핸들이면 떼어내 닫습니다.
    pub fn release_if_current(&self, handle_id: SubscriptionId) -> bool {
        let released = {
            let mut state = lock(&self.state);
            match &state.subscription {
                Some(handle) if handle.id() == handle_id => state.subscription.take(),
                _ => None,
            }
        };
        released.is_some_and(|handle| handle.close())
    }

    /// 세션을 닫고 소유한 구독을 반납합니다. 여러 번 호출해도 안전합니다.
    pub fn close(&self) {
        let subscription = {
            let mut state = lock(&self.state);
            state.closed = true;
            state.subscription.take()
        };
        if let Some(handle) = subscription {
            handle.close();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("subscription", &self.subscription().map(|h| h.id()))
            .finish()
    }
}

// ==================== 세션 테이블 ====================

/// 연결 식별자 → 세션 소유 테이블.
///
/// 연결 수락 시 등록, 연결 종료 시 제거합니다. 세션 간 브로드캐스트는 없습니다.
#[derive(Default)]
pub struct SessionTable {
    sessions: Mutex<HashMap<ConnectionId, Arc<Session>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, session: Arc<Session>) {
        lock(&self.sessions).insert(session.id(), session);
    }

    pub fn unregister(&self, id: ConnectionId) -> Option<Arc<Session>> {
        lock(&self.sessions).remove(&id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Arc<Session>> {
        lock(&self.sessions).get(&id).cloned()
    }

    /// 현재 연결 수.
    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
