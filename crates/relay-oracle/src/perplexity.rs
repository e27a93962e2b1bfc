//! Perplexity API 클라이언트.
//!
//! OpenAI 호환 `POST {base_url}/chat/completions` 엔드포인트를 사용합니다.
//! 답변은 `choices[0].message.content`입니다.

use async_trait::async_trait;
use relay_core::OracleConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::error::{OracleError, OracleResult};
use crate::traits::AnalysisOracle;

// ==================== 요청/응답 타입 ====================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AnswerMessage,
}

#[derive(Debug, Deserialize)]
struct AnswerMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

// ==================== 클라이언트 ====================

/// Perplexity chat completions 클라이언트.
pub struct PerplexityClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl PerplexityClient {
    /// 새로운 클라이언트 생성.
    pub fn new(
        api_key: SecretString,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> OracleResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    /// 설정에서 생성합니다. API 키가 없으면 `NotConfigured`.
    pub fn from_config(config: &OracleConfig) -> OracleResult<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(OracleError::NotConfigured)?;

        Self::new(
            SecretString::from(api_key.to_string()),
            config.base_url.clone(),
            config.model.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl AnalysisOracle for PerplexityClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn ask(&self, query: &str) -> OracleResult<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: query,
            }],
        };

        let started = Instant::now();
        debug!(model = %self.model, query_chars = query.len(), "Querying oracle");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or_else(|_| body.chars().take(300).collect());
            warn!(status = %status, "Oracle request rejected");
            return Err(OracleError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = response.json().await?;
        let answer = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(OracleError::EmptyAnswer)?;

        info!(
            model = %self.model,
            answer_chars = answer.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Oracle answered"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    fn client(url: &str) -> PerplexityClient {
        PerplexityClient::new(
            SecretString::from("pplx-test".to_string()),
            url,
            "sonar-pro",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_ask_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer pplx-test")
            .match_body(Matcher::PartialJson(json!({
                "model": "sonar-pro",
                "messages": [{"role": "user", "content": "What moved EUR/USD?"}]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "The ECB did."}}]})
                    .to_string(),
            )
            .create_async()
            .await;

        let answer = client(&server.url()).ask("What moved EUR/USD?").await.unwrap();

        assert_eq!(answer, "The ECB did.");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_error_message_is_extracted() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(401)
            .with_body(r#"{"error":{"message":"Invalid API key","type":"auth"}}"#)
            .create_async()
            .await;

        let err = client(&server.url()).ask("hi").await.unwrap_err();
        assert_eq!(
            err,
            OracleError::Api {
                status: 401,
                message: "Invalid API key".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_empty_answer() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let err = client(&server.url()).ask("hi").await.unwrap_err();
        assert_eq!(err, OracleError::EmptyAnswer);
    }

    #[test]
    fn test_from_config_requires_key() {
        let mut config = OracleConfig::default();
        assert!(matches!(
            PerplexityClient::from_config(&config),
            Err(OracleError::NotConfigured)
        ));

        config.api_key = Some("  ".to_string());
        assert!(PerplexityClient::from_config(&config).is_err());

        config.api_key = Some("pplx-key".to_string());
        let client = PerplexityClient::from_config(&config).unwrap();
        assert_eq!(client.model(), "sonar-pro");
        assert_eq!(client.endpoint(), "https://api.perplexity.ai/chat/completions");
    }
}
