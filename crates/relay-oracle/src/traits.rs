//! 오라클 trait 정의.

use async_trait::async_trait;

use crate::error::OracleResult;

/// 요청/응답형 AI 오라클.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    /// 답변에 사용되는 모델 이름.
    fn model(&self) -> &str;

    /// 질문을 보내고 답변 텍스트를 받습니다.
    async fn ask(&self, query: &str) -> OracleResult<String>;
}
