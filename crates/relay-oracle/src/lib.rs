//! # Relay Oracle
//!
//! 외부 AI 검색/추론 서비스 연동.
//!
//! - [`AnalysisOracle`]: 질문 하나에 답변 텍스트 하나를 돌려주는 능력 인터페이스
//! - [`PerplexityClient`]: OpenAI 호환 chat completions API 클라이언트
//! - [`prompts`]: 버전이 붙은 고정 지시문
//! - [`extract`]: 자유 형식 답변에서 JSON 추출 및 타입 변환

pub mod error;
pub mod extract;
pub mod perplexity;
pub mod prompts;
pub mod traits;

pub use error::*;
pub use perplexity::PerplexityClient;
pub use traits::*;
