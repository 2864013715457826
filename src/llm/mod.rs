//! Model client module: a trait over text-generation providers, with Gemini
//! as the implementation and a shared retry loop.

mod error;
mod gemini;

pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use gemini::{GeminiClient, GeminiInitError, DEFAULT_GEMINI_MODEL};

use async_trait::async_trait;

use crate::outcome::CallOutcome;

/// Trait for model clients.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Model identifier used for requests.
    fn model(&self) -> &str;

    /// Generate text for a system instruction and a user prompt (one attempt).
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String, LlmError>;
}

/// Call `client`, retrying transient failures according to `retry`.
///
/// Permanent failures are not retried and map to `Unavailable`; transient
/// failures that exhaust the attempt bound map to `TransientError`.
pub async fn generate_with_retry(
    client: &dyn LlmClient,
    retry: &RetryConfig,
    system_prompt: &str,
    user_prompt: &str,
) -> CallOutcome<String> {
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match client.generate(system_prompt, user_prompt).await {
            Ok(text) => {
                if attempts > 1 {
                    tracing::info!("Model {} succeeded after {} attempts", client.model(), attempts);
                }
                return CallOutcome::Success(text);
            }
            Err(error) if retry.should_retry(&error, attempts) => {
                let delay = retry.delay_for(&error, attempts - 1);
                tracing::warn!(
                    "Attempt {} failed with {}, retrying in {:?}: {}",
                    attempts,
                    error.kind,
                    delay,
                    error.message
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) if error.is_transient() => {
                tracing::error!("Model request failed after {} attempts: {}", attempts, error);
                return CallOutcome::TransientError {
                    attempts,
                    message: error.to_string(),
                };
            }
            Err(error) => {
                tracing::error!("Model request failed (non-retryable): {}", error);
                return CallOutcome::Unavailable(error.to_string());
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted model client for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub struct ScriptedClient {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        pub calls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        pub fn new(replies: Vec<Result<String, LlmError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, _system: &str, user: &str) -> Result<String, LlmError> {
            self.calls.lock().unwrap().push(user.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::server_error(503, "script exhausted".into())))
        }
    }
}
