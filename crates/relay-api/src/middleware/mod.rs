//! HTTP 미들웨어.
//!
//! - `metrics`: 요청 수/응답 상태/지연 시간 Prometheus 메트릭

pub mod metrics;

pub use metrics::metrics_layer;
