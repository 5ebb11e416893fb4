//! `cadence-agent`: generator backends and the escalation pipeline.
//!
//! # Overview
//!
//! A [`RecurrenceGenerator`] turns a natural-language request into a
//! [`cadence_core::RecurrenceProposal`]. [`LlmGenerator`] adapts any
//! [`LlmProvider`] (OpenAI chat completions, Anthropic messages) to that trait.
//!
//! [`EscalationPipeline`] calls the cheap primary first and escalates to the
//! fallback only when the primary's recurrence rule fails to parse.
//!
//! | Piece             | Role                                                 |
//! |-------------------|------------------------------------------------------|
//! | [`RetryPolicy`]   | Local backoff on rate limits, fatal errors pass through |
//! | [`UsageLedger`]   | Per-generator calls, failures, latency and tokens     |
//! | [`PromptBuilder`] | Instructions plus the strict output schema            |

pub mod anthropic;
pub mod generator;
pub mod ledger;
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod provider;
pub mod retry;

pub use generator::{Generation, GenerationError, LlmGenerator, RecurrenceGenerator};
pub use ledger::{GeneratorUsage, UsageLedger};
pub use pipeline::{EscalationPipeline, EscalationResult, PipelineError, PipelineState, Tier, Verdict};
pub use prompt::PromptBuilder;
pub use provider::{LlmProvider, ProviderError};
pub use retry::RetryPolicy;
