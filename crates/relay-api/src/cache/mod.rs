//! 분석 결과 캐시.

pub mod single_flight;

pub use single_flight::{Cached, SingleFlightCache};
