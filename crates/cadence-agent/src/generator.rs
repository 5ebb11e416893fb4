use std::time::{Duration, Instant};

use async_trait::async_trait;
use cadence_core::config::{GeneratorConfig, ProviderKind};
use cadence_core::{RecurrenceProposal, RecurrenceRequest, TokenUsage};
use tracing::debug;

use crate::prompt::{PromptBuilder, TOOL_NAME};
use crate::provider::{ChatRequest, ChatResponse, LlmProvider, ProviderError};

/// One generator call's product.
#[derive(Debug, Clone)]
pub struct Generation {
    pub proposal: RecurrenceProposal,
    pub latency: Duration,
    pub usage: TokenUsage,
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// Backend asked us to slow down. Retried locally.
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },

    #[error("generator failed: {0}")]
    Fatal(String),

    /// The backend answered but not with a proposal-shaped payload.
    #[error("malformed proposal: {0}")]
    MalformedProposal(String),
}

impl GenerationError {
    pub fn is_transient(&self) -> bool {
        matches!(self, GenerationError::RateLimited { .. })
    }
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { retry_after_ms } => GenerationError::RateLimited {
                retry_after: Some(Duration::from_millis(retry_after_ms)),
            },
            ProviderError::Parse(msg) => GenerationError::MalformedProposal(msg),
            other => GenerationError::Fatal(other.to_string()),
        }
    }
}

/// Natural language in, structured proposal out.
#[async_trait]
pub trait RecurrenceGenerator: Send + Sync {
    /// Label used in logs, ledger entries and reports.
    fn name(&self) -> &str;

    async fn generate(
        &self,
        instructions: &str,
        request: &RecurrenceRequest,
    ) -> Result<Generation, GenerationError>;
}

/// [`RecurrenceGenerator`] backed by a chat-completion [`LlmProvider`].
pub struct LlmGenerator {
    provider: Box<dyn LlmProvider>,
    kind: ProviderKind,
    model: String,
    label: String,
    max_tokens: u32,
}

impl LlmGenerator {
    pub fn new(provider: Box<dyn LlmProvider>, config: &GeneratorConfig) -> Self {
        Self {
            provider,
            kind: config.provider,
            model: config.model.clone(),
            label: config.label().to_string(),
            max_tokens: config.max_tokens,
        }
    }

    fn build_request(&self, instructions: &str, request: &RecurrenceRequest) -> ChatRequest {
        let mut req = ChatRequest::new(&self.model, instructions, &request.message);
        req.max_tokens = self.max_tokens;
        match self.kind {
            ProviderKind::OpenAi => {
                // GPT-5 family rejects a temperature; steer it with reasoning effort instead.
                if self.model.starts_with("gpt-5") {
                    req.reasoning_effort = Some("low".to_string());
                } else {
                    req.temperature = Some(0.0);
                }
                req.response_format = Some(PromptBuilder::response_format());
            }
            ProviderKind::Anthropic => {
                req.temperature = Some(0.0);
                req.tools.push(PromptBuilder::proposal_tool());
                req.tool_choice = Some(TOOL_NAME.to_string());
            }
        }
        req
    }

    fn extract(&self, resp: &ChatResponse) -> Result<RecurrenceProposal, GenerationError> {
        match self.kind {
            ProviderKind::OpenAi => serde_json::from_str(&resp.content)
                .map_err(|e| GenerationError::MalformedProposal(e.to_string())),
            ProviderKind::Anthropic => {
                let call = resp
                    .tool_calls
                    .iter()
                    .find(|c| c.name == TOOL_NAME)
                    .ok_or_else(|| {
                        GenerationError::MalformedProposal(format!(
                            "no {TOOL_NAME} tool_use block in response"
                        ))
                    })?;
                serde_json::from_value(call.input.clone())
                    .map_err(|e| GenerationError::MalformedProposal(e.to_string()))
            }
        }
    }
}

#[async_trait]
impl RecurrenceGenerator for LlmGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    async fn generate(
        &self,
        instructions: &str,
        request: &RecurrenceRequest,
    ) -> Result<Generation, GenerationError> {
        let req = self.build_request(instructions, request);
        let started = Instant::now();
        let resp = self.provider.send(&req).await?;
        let latency = started.elapsed();

        debug!(
            generator = %self.label,
            provider = %self.provider.name(),
            latency_ms = latency.as_millis() as u64,
            tokens_in = resp.tokens_in,
            tokens_out = resp.tokens_out,
            "generator responded"
        );

        Ok(Generation {
            proposal: self.extract(&resp)?,
            latency,
            usage: TokenUsage::new(resp.tokens_in, resp.tokens_out),
        })
    }
}
