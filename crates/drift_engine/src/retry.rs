use std::sync::Arc;
use std::time::Duration;

use drift_logging::{drift_debug, drift_error, drift_warn};
use rand::Rng;
use uuid::Uuid;

use crate::aggregate::aggregate_chunks;
use crate::{AgentClient, AgentError, AgentIdentity, AgentRequest, InvokeError};

#[derive(Debug, Clone)]
pub struct RetrySettings {
    /// Total attempts, first call included.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(500),
        }
    }
}

impl RetrySettings {
    /// Wait after throttled attempt `attempt` (0-based):
    /// `base * 2^attempt + jitter * max_jitter`, with `jitter` in `[0, 1)`.
    pub fn backoff_delay(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.base_delay.saturating_mul(factor) + self.max_jitter.mul_f64(jitter)
    }
}

/// Suspends the current task between attempts.
#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Fresh session identifier for one attempt.
pub fn session_id(seed: &str, attempt: u32) -> String {
    format!("{seed}-{attempt}-{}", Uuid::new_v4().simple())
}

/// Calls the agent, retrying only on throttling with exponential backoff.
///
/// Every attempt runs under its own session. A throttling failure raised
/// while the stream is being read counts the same as one raised on open.
pub struct BackoffRetrier {
    client: Arc<dyn AgentClient>,
    identity: AgentIdentity,
    settings: RetrySettings,
    sleeper: Arc<dyn Sleeper>,
}

impl BackoffRetrier {
    pub fn new(client: Arc<dyn AgentClient>, identity: AgentIdentity, settings: RetrySettings) -> Self {
        Self {
            client,
            identity,
            settings,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn settings(&self) -> &RetrySettings {
        &self.settings
    }

    pub async fn invoke(&self, prompt: &str, session_seed: &str) -> Result<String, InvokeError> {
        self.invoke_with_retries(prompt, session_seed, self.settings.max_retries)
            .await
    }

    pub async fn invoke_with_retries(
        &self,
        prompt: &str,
        session_seed: &str,
        max_retries: u32,
    ) -> Result<String, InvokeError> {
        let mut attempt = 0;
        while attempt < max_retries {
            let request = AgentRequest {
                prompt: prompt.to_string(),
                session_id: session_id(session_seed, attempt),
                identity: self.identity.clone(),
            };
            drift_debug!("Invoking agent, session {}", request.session_id);

            match self.attempt(request).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_throttling() => {
                    attempt += 1;
                    if attempt >= max_retries {
                        break;
                    }
                    let jitter = rand::thread_rng().gen::<f64>();
                    let wait = self.settings.backoff_delay(attempt - 1, jitter);
                    drift_warn!(
                        "Rate limit hit. Retry {}/{} after {:.1} seconds",
                        attempt,
                        max_retries,
                        wait.as_secs_f64()
                    );
                    self.sleeper.sleep(wait).await;
                }
                Err(err) => {
                    drift_error!("Agent invoke error: {}", err);
                    return Err(InvokeError::Fatal(err));
                }
            }
        }

        drift_error!("Max retries reached due to throttling after {} attempts", attempt);
        Err(InvokeError::RetriesExhausted { attempts: attempt })
    }

    async fn attempt(&self, request: AgentRequest) -> Result<String, AgentError> {
        let stream = self.client.invoke(request).await?;
        aggregate_chunks(stream).await
    }
}
