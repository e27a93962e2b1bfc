//! 차트 인터벌 정규화.
//!
//! 클라이언트가 보낸 자유 형식 인터벌을 업스트림 코드로 변환합니다.
//! 알 수 없는 값은 업스트림이 직접 판단하도록 그대로 전달됩니다.

use serde::{Deserialize, Serialize};
use std::fmt;

/// 클라이언트 표기 → 업스트림 코드 변환 테이블.
const INTERVAL_TABLE: &[(&str, &str)] = &[("1H", "60"), ("4H", "240"), ("1D", "D"), ("D", "D")];

/// 분 단위 기본 바 주기 (초).
const DEFAULT_PERIOD_SECS: u64 = 60;

/// 바 주기 상한 (초). 약 1년.
pub const MAX_PERIOD_SECS: u64 = 366 * 86_400;

/// 업스트림 인터벌 코드.
///
/// `Interval::normalize`를 통해서만 생성됩니다.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Interval(String);

impl Interval {
    /// 클라이언트 입력을 업스트림 코드로 정규화합니다.
    ///
    /// - `"1H"` → `"60"`
    /// - `"4H"` → `"240"`
    /// - `"1D"`, `"D"` → `"D"`
    /// - 그 외 → 입력 그대로
    pub fn normalize(raw: &str) -> Self {
        let code = INTERVAL_TABLE
            .iter()
            .find(|(input, _)| *input == raw)
            .map(|(_, code)| (*code).to_string())
            .unwrap_or_else(|| raw.to_string());
        Self(code)
    }

    /// 업스트림 코드 반환.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// 바 하나의 대략적인 주기(초)를 반환합니다.
    ///
    /// 숫자 코드는 분 단위, `D`/`W`/`M` 접미사는 일/주/월 단위입니다.
    /// 해석할 수 없는 코드는 1분으로 간주하고, 결과는 [`MAX_PERIOD_SECS`]를 넘지 않습니다.
    pub fn period_secs(&self) -> u64 {
        self.raw_period_secs()
            .unwrap_or(MAX_PERIOD_SECS)
            .clamp(1, MAX_PERIOD_SECS)
    }

    /// 곱셈이 넘치면 `None`.
    fn raw_period_secs(&self) -> Option<u64> {
        let code = self.0.as_str();
        if let Ok(minutes) = code.parse::<u64>() {
            return minutes.checked_mul(60);
        }

        let (count, unit) = match code.char_indices().last() {
            Some((idx, unit)) => (&code[..idx], unit),
            None => return Some(DEFAULT_PERIOD_SECS),
        };
        let count = if count.is_empty() {
            1
        } else {
            match count.parse::<u64>() {
                Ok(n) if n > 0 => n,
                _ => return Some(DEFAULT_PERIOD_SECS),
            }
        };

        match unit {
            'S' => Some(count),
            'D' => count.checked_mul(86_400),
            'W' => count.checked_mul(7 * 86_400),
            'M' => count.checked_mul(30 * 86_400), // 근사값
            _ => Some(DEFAULT_PERIOD_SECS),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
