use std::time::Duration;

use futures_util::stream::{BoxStream, StreamExt};
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::{AgentChunk, AgentError, AgentErrorKind, AgentRequest};

/// Streaming completion body: chunks in arrival order.
pub type ChunkStream = BoxStream<'static, Result<AgentChunk, AgentError>>;

#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8080".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Opens one streaming call to the generative agent.
#[async_trait::async_trait]
pub trait AgentClient: Send + Sync {
    async fn invoke(&self, request: AgentRequest) -> Result<ChunkStream, AgentError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InvokeBody<'a> {
    input_text: &'a str,
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default, alias = "__type", alias = "code")]
    error_type: Option<String>,
    #[serde(default, alias = "Message")]
    message: Option<String>,
}

/// Agent runtime reached over HTTP. The completion body is streamed and
/// surfaced chunk by chunk.
#[derive(Debug, Clone)]
pub struct HttpAgentClient {
    settings: AgentSettings,
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new(settings: AgentSettings) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| AgentError::new(AgentErrorKind::Transport, err.to_string()))?;
        Ok(Self { settings, client })
    }

    fn invoke_url(&self, request: &AgentRequest) -> String {
        format!(
            "{}/agents/{}/agentAliases/{}/sessions/{}/text",
            self.settings.endpoint.trim_end_matches('/'),
            request.identity.agent_id,
            request.identity.alias_id,
            request.session_id
        )
    }
}

#[async_trait::async_trait]
impl AgentClient for HttpAgentClient {
    async fn invoke(&self, request: AgentRequest) -> Result<ChunkStream, AgentError> {
        let response = self
            .client
            .post(self.invoke_url(&request))
            .json(&InvokeBody {
                input_text: &request.prompt,
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let header_type = error_type_header(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), header_type, &body));
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk
                .map(|bytes| AgentChunk { bytes: Some(bytes) })
                .map_err(map_reqwest_error)
        });
        Ok(stream.boxed())
    }
}

fn error_type_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-amzn-errortype")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(':').next())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Throttling is recognised by status 429 or a `ThrottlingException` error
/// type in either spelling. Everything else is a service error.
fn classify_failure(status: u16, header_type: Option<String>, body: &str) -> AgentError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let code = header_type
        .or(parsed.error_type)
        .map(|code| code.rsplit('#').next().unwrap_or(&code).to_string());
    let message = parsed
        .message
        .unwrap_or_else(|| if body.is_empty() { format!("http status {status}") } else { body.to_string() });

    let throttled = status == 429
        || code
            .as_deref()
            .is_some_and(|code| code.eq_ignore_ascii_case("ThrottlingException"));
    if throttled {
        return AgentError::throttling(message);
    }
    AgentError::service(code.unwrap_or_else(|| format!("Http{status}")), message)
}

fn map_reqwest_error(err: reqwest::Error) -> AgentError {
    if err.is_timeout() {
        return AgentError::new(AgentErrorKind::Transport, format!("timeout: {err}"));
    }
    AgentError::new(AgentErrorKind::Transport, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_429_is_throttling() {
        let err = classify_failure(429, None, "");
        assert!(err.is_throttling());
        assert_eq!(err.message, "http status 429");
    }

    #[test]
    fn lowercase_throttling_type_is_recognised() {
        let err = classify_failure(
            400,
            None,
            r#"{"__type": "com.amazon#throttlingException", "message": "slow down"}"#,
        );
        assert!(err.is_throttling());
        assert_eq!(err.message, "slow down");
    }

    #[test]
    fn other_codes_are_service_errors() {
        let err = classify_failure(
            403,
            Some("AccessDeniedException".to_string()),
            r#"{"message": "denied"}"#,
        );
        assert_eq!(
            err.kind,
            AgentErrorKind::Service {
                code: "AccessDeniedException".to_string()
            }
        );
        assert!(err.to_string().contains("denied"));
    }
}
