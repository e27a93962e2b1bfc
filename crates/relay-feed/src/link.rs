//! 백그라운드 태스크로 구동되는 공용 링크 구현.
//!
//! 피드 구현은 [`StreamLink::spawn`]에 드라이버 future를 넘기고,
//! 드라이버는 [`LinkCore`]를 통해 바와 에러를 발행합니다.

use relay_core::{Bar, BarWindow, Market};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::debug;

use crate::error::FeedError;
use crate::traits::{ChartLink, ErrorCallback, UpdateCallback};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ==================== 콜백 레지스트리 ====================

#[derive(Default)]
struct Callbacks {
    updates: Vec<UpdateCallback>,
    errors: Vec<ErrorCallback>,
    closed: bool,
}

/// 링크에 등록된 콜백 목록.
///
/// 발행 시에는 목록을 복사한 뒤 락 밖에서 호출하므로,
/// 콜백이 실행되는 동안 `close()`가 막히지 않습니다.
#[derive(Default)]
pub struct CallbackRegistry {
    inner: Mutex<Callbacks>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 갱신 콜백 추가. 이미 닫혔으면 `false`.
    pub fn add_update(&self, callback: UpdateCallback) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return false;
        }
        inner.updates.push(callback);
        true
    }

    /// 에러 콜백 추가. 이미 닫혔으면 `false`.
    pub fn add_error(&self, callback: ErrorCallback) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return false;
        }
        inner.errors.push(callback);
        true
    }

    /// 현재 갱신 콜백 스냅샷.
    pub fn update_snapshot(&self) -> Vec<UpdateCallback> {
        lock(&self.inner).updates.clone()
    }

    /// 현재 에러 콜백 스냅샷.
    pub fn error_snapshot(&self) -> Vec<ErrorCallback> {
        lock(&self.inner).errors.clone()
    }

    /// 모든 콜백을 해제합니다. 처음 닫을 때만 `true`를 반환합니다.
    pub fn close(&self) -> bool {
        let mut inner = lock(&self.inner);
        if inner.closed {
            return false;
        }
        inner.closed = true;
        inner.updates.clear();
        inner.errors.clear();
        true
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.inner).closed
    }

    /// 등록된 콜백 수 (갱신 + 에러).
    pub fn len(&self) -> usize {
        let inner = lock(&self.inner);
        inner.updates.len() + inner.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ==================== 링크 코어 ====================

/// 드라이버와 링크가 공유하는 상태.
pub struct LinkCore {
    market: Market,
    window: Mutex<BarWindow>,
    callbacks: CallbackRegistry,
    /// 처음 발행된 종료 에러. 늦게 등록된 에러 콜백에 재생됩니다.
    terminal: Mutex<Option<FeedError>>,
    cancel: CancellationToken,
}

impl LinkCore {
    fn new(market: Market, capacity: usize) -> Self {
        Self {
            market,
            window: Mutex::new(BarWindow::new(capacity)),
            callbacks: CallbackRegistry::new(),
            terminal: Mutex::new(None),
            cancel: CancellationToken::new(),
        }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// 바를 윈도우에 반영하고 갱신 콜백에 전체 윈도우를 전달합니다.
    ///
    /// 윈도우 락을 잡은 채로 호출하므로 같은 링크의 갱신은 발생 순서대로 전달됩니다.
    pub fn publish_bars<I: IntoIterator<Item = Bar>>(&self, bars: I) {
        let mut window = lock(&self.window);
        window.extend(bars);
        if window.is_empty() || self.is_closed() {
            return;
        }
        for callback in self.callbacks.update_snapshot() {
            callback(&window);
        }
    }

    /// 에러 콜백에 에러를 전달합니다.
    ///
    /// 종료 에러는 기억해 두었다가 이후 등록되는 에러 콜백에 한 번 전달합니다.
    pub fn publish_error(&self, error: &FeedError) {
        if self.is_closed() {
            return;
        }
        let callbacks = {
            let mut terminal = lock(&self.terminal);
            if error.is_terminal() && terminal.is_none() {
                *terminal = Some(error.clone());
            }
            self.callbacks.error_snapshot()
        };
        for callback in callbacks {
            callback(error);
        }
    }

    /// 에러 콜백을 등록하고, 이미 종료 에러가 있었다면 바로 전달합니다.
    fn subscribe_errors(&self, callback: ErrorCallback) {
        let replay = {
            let terminal = lock(&self.terminal);
            if !self.callbacks.add_error(callback.clone()) {
                return;
            }
            terminal.clone()
        };
        if let Some(error) = replay {
            callback(&error);
        }
    }

    /// 발행된 종료 에러.
    pub fn terminal_error(&self) -> Option<FeedError> {
        lock(&self.terminal).clone()
    }

    /// 최근 바 (시뮬레이터가 다음 값을 만들 때 사용).
    pub fn last_bar(&self) -> Option<Bar> {
        lock(&self.window).last().copied()
    }

    /// 링크가 닫히면 완료되는 future.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn close(&self) -> bool {
        let first = self.callbacks.close();
        self.cancel.cancel();
        first
    }
}

// ==================== StreamLink ====================

/// 드라이버 태스크 하나를 소유하는 [`ChartLink`] 구현.
pub struct StreamLink {
    core: Arc<LinkCore>,
}

impl StreamLink {
    /// 링크를 만들고 드라이버를 백그라운드에서 실행합니다.
    ///
    /// 드라이버는 `LinkCore::cancelled()`를 감시해 닫힘 요청 시 종료해야 합니다.
    pub fn spawn<F, Fut>(market: Market, capacity: usize, driver: F) -> Self
    where
        F: FnOnce(Arc<LinkCore>) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let core = Arc::new(LinkCore::new(market, capacity));
        tokio::spawn(driver(core.clone()));
        Self { core }
    }
}

impl ChartLink for StreamLink {
    fn market(&self) -> &Market {
        &self.core.market
    }

    fn on_update(&self, callback: UpdateCallback) {
        let window = lock(&self.core.window);
        if !self.core.callbacks.add_update(callback.clone()) {
            return;
        }
        if !window.is_empty() {
            callback(&window);
        }
    }

    fn on_error(&self, callback: ErrorCallback) {
        self.core.subscribe_errors(callback);
    }

    fn close(&self) {
        if self.core.close() {
            debug!(market = %self.core.market, "Chart link closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

impl Drop for StreamLink {
    fn drop(&mut self) {
        self.close();
    }
}
