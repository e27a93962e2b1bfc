//! 서비스 모듈.
//!
//! HTTP 핸들러 뒤에서 외부 오라클 호출과 캐시를 담당합니다.

pub mod analysis;

pub use analysis::{
    humanize, AnalysisReport, AnalysisService, AnalyzeRequest, CacheStatus, CalendarReport,
    FundamentalReport, NewsReport, SearchAnswer,
};
