//! 단일 슬롯, 시간 만료, 단일 생성(single-flight) 캐시.
//!
//! - 만료는 읽는 시점에만 확인합니다 (백그라운드 정리 없음).
//! - 생성은 한 번에 하나만 진행되며, 그동안 들어온 요청은 같은 결과를 기다립니다.
//!   `force = true`도 진행 중인 생성에 합류합니다.
//! - 실패한 생성은 슬롯을 바꾸지 않고 모든 대기자에게 같은 에러를 전달합니다.

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use relay_oracle::OracleError;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

type Generation<T> = Shared<BoxFuture<'static, Result<(T, DateTime<Utc>), OracleError>>>;

struct Entry<T> {
    value: T,
    generated_at: DateTime<Utc>,
    expires_at: Instant,
}

struct Slot<T> {
    entry: Option<Entry<T>>,
    in_flight: Option<(u64, Generation<T>)>,
    next_generation: u64,
}

/// 캐시 조회 결과.
#[derive(Debug, Clone, PartialEq)]
pub struct Cached<T> {
    pub value: T,
    /// 값이 생성된 시각
    pub generated_at: DateTime<Utc>,
    /// 저장된 값을 그대로 돌려준 경우 `true`
    pub hit: bool,
}

/// 단일 슬롯 single-flight 캐시.
pub struct SingleFlightCache<T> {
    ttl: Duration,
    slot: Mutex<Slot<T>>,
}

impl<T> SingleFlightCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// TTL은 생성 시 고정되며 이후 바뀌지 않습니다.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: Mutex::new(Slot {
                entry: None,
                in_flight: None,
                next_generation: 0,
            }),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 만료되지 않은 값이 있는지 확인.
    pub fn is_fresh(&self) -> bool {
        lock(&self.slot)
            .entry
            .as_ref()
            .is_some_and(|entry| Instant::now() < entry.expires_at)
    }

    /// 신선한 값을 복사해 돌려줍니다. 생성은 시작하지 않습니다.
    pub fn peek(&self) -> Option<T> {
        lock(&self.slot)
            .entry
            .as_ref()
            .filter(|entry| Instant::now() < entry.expires_at)
            .map(|entry| entry.value.clone())
    }

    /// 생성이 진행 중인지 확인.
    pub fn is_generating(&self) -> bool {
        lock(&self.slot).in_flight.is_some()
    }

    /// 값을 조회합니다.
    ///
    /// 신선한 값이 있고 `force`가 아니면 바로 반환합니다. 그렇지 않으면 진행 중인
    /// 생성에 합류하거나 `generate`로 새 생성을 시작합니다.
    pub async fn get<F, Fut>(&self, force: bool, generate: F) -> Result<Cached<T>, OracleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, OracleError>> + Send + 'static,
    {
        let (generation, shared) = {
            let mut slot = lock(&self.slot);

            if !force {
                if let Some(entry) = slot
                    .entry
                    .as_ref()
                    .filter(|entry| Instant::now() < entry.expires_at)
                {
                    return Ok(Cached {
                        value: entry.value.clone(),
                        generated_at: entry.generated_at,
                        hit: true,
                    });
                }
            }

            match slot.in_flight.clone() {
                Some(in_flight) => in_flight,
                None => {
                    slot.next_generation += 1;
                    let generation = slot.next_generation;
                    let pending = generate();
                    let shared = async move { pending.await.map(|value| (value, Utc::now())) }
                        .boxed()
                        .shared();
                    slot.in_flight = Some((generation, shared.clone()));
                    (generation, shared)
                }
            }
        };

        let result = shared.await;
        self.finish(generation, &result);

        result.map(|(value, generated_at)| Cached {
            value,
            generated_at,
            hit: false,
        })
    }

    /// 생성이 끝난 뒤 한 번만 슬롯을 갱신합니다.
    fn finish(&self, generation: u64, result: &Result<(T, DateTime<Utc>), OracleError>) {
        let mut slot = lock(&self.slot);
        if !matches!(&slot.in_flight, Some((current, _)) if *current == generation) {
            return;
        }
        slot.in_flight = None;
        if let Ok((value, generated_at)) = result {
            slot.entry = Some(Entry {
                value: value.clone(),
                generated_at: *generated_at,
                expires_at: Instant::now() + self.ttl,
            });
        }
    }
}
