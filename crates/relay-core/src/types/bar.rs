//! OHLCV 바 및 바 윈도우.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// 차트 클라이언트에 전달되는 기본 바 개수.
pub const DEFAULT_BAR_LIMIT: usize = 100;

/// 하나의 OHLCV 바 (캔들).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// 바 시작 시각 (Unix epoch 밀리초)
    pub time: i64,
    /// 시가
    pub open: f64,
    /// 고가
    pub high: f64,
    /// 저가
    pub low: f64,
    /// 종가
    pub close: f64,
    /// 거래량
    pub volume: f64,
}

/// 시간순으로 정렬된 크기 제한 바 목록.
///
/// 같은 시각의 바는 교체되고, 용량을 넘으면 가장 오래된 바부터 제거됩니다.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarWindow {
    /// 주어진 용량의 빈 윈도우를 생성합니다.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            bars: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 바를 추가하거나 같은 시각의 바를 교체합니다.
    pub fn upsert(&mut self, bar: Bar) {
        match self.bars.back() {
            Some(last) if last.time == bar.time => {
                if let Some(last) = self.bars.back_mut() {
                    *last = bar;
                }
            }
            Some(last) if last.time > bar.time => {
                match self.bars.binary_search_by(|probe| probe.time.cmp(&bar.time)) {
                    Ok(idx) => self.bars[idx] = bar,
                    Err(idx) => self.bars.insert(idx, bar),
                }
            }
            _ => self.bars.push_back(bar),
        }

        while self.bars.len() > self.capacity {
            self.bars.pop_front();
        }
    }

    /// 여러 바를 순서대로 반영합니다.
    pub fn extend<I: IntoIterator<Item = Bar>>(&mut self, bars: I) {
        for bar in bars {
            self.upsert(bar);
        }
    }

    /// 가장 최근 바.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    /// 오래된 순 반복자.
    pub fn iter(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    /// 오래된 순으로 복사한 바 목록.
    pub fn to_vec(&self) -> Vec<Bar> {
        self.bars.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for BarWindow {
    fn default() -> Self {
        Self::new(DEFAULT_BAR_LIMIT)
    }
}
