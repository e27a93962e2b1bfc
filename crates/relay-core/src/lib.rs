//! # Relay Core
//!
//! 차트 릴레이 서버의 핵심 도메인 타입을 제공합니다.
//!
//! 이 크레이트는 릴레이 전반에서 사용되는 기본 타입을 제공합니다:
//! - 심볼, 인터벌, 마켓 정의
//! - OHLCV 바 및 제한된 크기의 바 윈도우
//! - 설정 관리
//! - 로깅 인프라

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use self::config::*;
pub use error::*;
pub use logging::*;
pub use types::*;
