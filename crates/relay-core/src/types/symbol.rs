//! 심볼 및 마켓 정의.
//!
//! 이 모듈은 차트 구독 대상을 나타내는 타입을 정의합니다:
//! - `Symbol` - 거래소 접두어가 붙은 티커 (예: "OANDA:EURUSD")
//! - `Market` - 심볼과 인터벌의 쌍

use serde::{Deserialize, Serialize};
use std::fmt;

use super::Interval;
use crate::error::{CoreError, CoreResult};

/// 거래소 접두어가 붙은 차트 심볼.
///
/// 앞뒤 공백은 제거되며, 빈 심볼은 생성할 수 없습니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(String);

impl Symbol {
    /// 클라이언트 입력에서 심볼을 생성합니다.
    ///
    /// # Errors
    /// 공백을 제거한 결과가 비어 있으면 `CoreError::InvalidInput`을 반환합니다.
    pub fn parse(raw: &str) -> CoreResult<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::InvalidInput("symbol is required".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// 심볼 문자열 반환.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 거래소 접두어 반환 (예: "OANDA:EURUSD" → "OANDA").
    pub fn exchange(&self) -> Option<&str> {
        self.0.split_once(':').map(|(exchange, _)| exchange)
    }

    /// 거래소 접두어를 제외한 티커 반환.
    pub fn ticker(&self) -> &str {
        self.0
            .split_once(':')
            .map(|(_, ticker)| ticker)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 업스트림 구독 단위인 (심볼, 인터벌) 쌍.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    /// 심볼
    pub symbol: Symbol,
    /// 정규화된 인터벌
    pub interval: Interval,
}

impl Market {
    /// 새 마켓을 생성합니다.
    pub fn new(symbol: Symbol, interval: Interval) -> Self {
        Self { symbol, interval }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.symbol, self.interval)
    }
}
