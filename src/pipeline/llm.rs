//! Record analysis: send the minutes text to the model and recover JSON.
//!
//! The prompt lives in [`crate::prompts`]; this module only drives the call.
//! By default a document gets exactly one request. `max_retries` adds
//! attempts with exponential backoff (`retry_backoff_ms * 2^attempt`).
//!
//! The returned payload is untrusted: it is whatever the model wrote,
//! unwrapped from its first code fence. Validation happens in
//! [`crate::pipeline::store`].

use crate::config::PipelineConfig;
use crate::error::DocumentError;
use crate::pipeline::postprocess::extract_json_payload;
use crate::prompts::voting_record_prompt;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// What the model returned for one document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Analysis {
    /// JSON candidate recovered from the response. Not validated.
    pub payload: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub duration_ms: u64,
}

/// Capability: minutes text + document id in, JSON candidate out.
#[async_trait]
pub trait RecordAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str, document_id: &str) -> Result<Analysis, DocumentError>;
}

/// [`RecordAnalyzer`] backed by an edgequake-llm provider.
pub struct LlmRecordAnalyzer {
    provider: Arc<dyn LLMProvider>,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    api_timeout_secs: u64,
}

impl LlmRecordAnalyzer {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &PipelineConfig) -> Self {
        Self {
            provider,
            options: build_options(config),
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            api_timeout_secs: config.api_timeout_secs,
        }
    }
}

#[async_trait]
impl RecordAnalyzer for LlmRecordAnalyzer {
    async fn analyze(&self, text: &str, document_id: &str) -> Result<Analysis, DocumentError> {
        let start = Instant::now();
        let messages = vec![ChatMessage::user(voting_record_prompt(text, document_id))];
        let limit = Duration::from_secs(self.api_timeout_secs);

        info!("{}: sending {} chars to the model", document_id, text.len());

        let mut last_err = DocumentError::AnalysisFailed {
            attempts: 0,
            detail: "no attempt made".to_string(),
        };

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                warn!(
                    "{}: retry {}/{} after {}ms",
                    document_id, attempt, self.max_retries, backoff
                );
                sleep(Duration::from_millis(backoff)).await;
            }

            match timeout(limit, self.provider.chat(&messages, Some(&self.options))).await {
                Ok(Ok(response)) => {
                    let duration = start.elapsed();
                    debug!(
                        "{}: {} input tokens, {} output tokens, {:?}",
                        document_id, response.prompt_tokens, response.completion_tokens, duration
                    );
                    return Ok(Analysis {
                        payload: extract_json_payload(&response.content),
                        input_tokens: response.prompt_tokens as u32,
                        output_tokens: response.completion_tokens as u32,
                        duration_ms: duration.as_millis() as u64,
                    });
                }
                Ok(Err(e)) => {
                    warn!("{}: attempt {} failed: {}", document_id, attempt + 1, e);
                    last_err = DocumentError::AnalysisFailed {
                        attempts: attempt + 1,
                        detail: e.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        "{}: attempt {} timed out after {}s",
                        document_id,
                        attempt + 1,
                        self.api_timeout_secs
                    );
                    last_err = DocumentError::AnalysisTimeout {
                        secs: self.api_timeout_secs,
                    };
                }
            }
        }

        Err(last_err)
    }
}

/// Build `CompletionOptions` from the pipeline config.
fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}
