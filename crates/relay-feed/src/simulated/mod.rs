//! 랜덤 워크 기반 시뮬레이션 피드.
//!
//! 업스트림 없이 로컬에서 릴레이를 돌려볼 때 사용합니다.
//! 링크마다 `bar_count`개의 과거 바를 만들고, 틱마다 마지막 바를 갱신하거나
//! 인터벌 주기가 지나면 새 바를 추가합니다.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use relay_core::{Bar, FeedConfig, Market};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

use crate::error::FeedResult;
use crate::link::{LinkCore, StreamLink};
use crate::traits::{ChartFeed, ChartLink};

/// 틱당 최대 변동률.
const TICK_VOLATILITY: f64 = 0.002;

/// 시뮬레이션 피드.
pub struct SimulatedFeed {
    bar_count: usize,
    tick: Duration,
}

impl SimulatedFeed {
    pub fn new(bar_count: usize, tick: Duration) -> Self {
        Self {
            bar_count: bar_count.max(1),
            tick: tick.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.bar_count, Duration::from_millis(config.simulated_tick_ms))
    }
}

#[async_trait]
impl ChartFeed for SimulatedFeed {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn open(&self, market: &Market) -> FeedResult<Box<dyn ChartLink>> {
        let period_ms = i64::try_from(market.interval.period_secs().saturating_mul(1000))
            .unwrap_or(i64::MAX);
        let seed = seed_bars(
            self.bar_count,
            period_ms,
            base_price(market.symbol.as_str()),
            Utc::now().timestamp_millis(),
        );
        let tick = self.tick;

        debug!(market = %market, "Simulated chart link opened");
        let link = StreamLink::spawn(market.clone(), self.bar_count, move |core| {
            drive(core, seed, period_ms, tick)
        });
        Ok(Box::new(link))
    }
}

async fn drive(core: Arc<LinkCore>, seed: Vec<Bar>, period_ms: i64, tick: Duration) {
    core.publish_bars(seed);

    let mut ticker = interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = core.cancelled() => return,
            _ = ticker.tick() => {
                if let Some(last) = core.last_bar() {
                    core.publish_bars([next_bar(&last, period_ms, Utc::now().timestamp_millis())]);
                }
            }
        }
    }
}

/// 심볼별로 고정된 시작 가격.
fn base_price(symbol: &str) -> f64 {
    let hash: u32 = symbol.bytes().map(u32::from).sum();
    1.0 + f64::from(hash % 200)
}

/// `now_ms` 직전까지 이어지는 과거 바를 생성합니다.
pub fn seed_bars(count: usize, period_ms: i64, start_price: f64, now_ms: i64) -> Vec<Bar> {
    let mut rng = rand::thread_rng();
    let period_ms = period_ms.max(1);
    let current_open = now_ms - now_ms.rem_euclid(period_ms);
    let span = period_ms.saturating_mul(i64::try_from(count.saturating_sub(1)).unwrap_or(i64::MAX));
    let mut time = current_open.saturating_sub(span);
    let mut price = start_price;
    let mut bars = Vec::with_capacity(count);

    for _ in 0..count {
        let open = price;
        let close = open * (1.0 + rng.gen_range(-0.01_f64..0.01));
        let high = open.max(close) * (1.0 + rng.gen::<f64>() * 0.005);
        let low = open.min(close) * (1.0 - rng.gen::<f64>() * 0.005);
        bars.push(Bar {
            time,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(10.0..1000.0),
        });
        price = close;
        time = time.saturating_add(period_ms);
    }

    bars
}

/// 다음 틱의 바. 주기가 지났으면 새 바를, 아니면 갱신된 마지막 바를 반환합니다.
pub fn next_bar(last: &Bar, period_ms: i64, now_ms: i64) -> Bar {
    let mut rng = rand::thread_rng();
    let period_ms = period_ms.max(1);
    let price = last.close * (1.0 + rng.gen_range(-TICK_VOLATILITY..TICK_VOLATILITY));
    let volume: f64 = rng.gen_range(1.0..50.0);

    if now_ms >= last.time.saturating_add(period_ms) {
        let time = now_ms - now_ms.rem_euclid(period_ms);
        Bar {
            time,
            open: last.close,
            high: last.close.max(price),
            low: last.close.min(price),
            close: price,
            volume,
        }
    } else {
        Bar {
            time: last.time,
            open: last.open,
            high: last.high.max(price),
            low: last.low.min(price),
            close: price,
            volume: last.volume + volume,
        }
    }
}
