use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use cadence_core::{Expectation, RecurrenceProposal, RecurrenceRequest, TokenUsage};
use cadence_validator::{validate_against, ValidationOutcome};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::generator::{Generation, GenerationError, RecurrenceGenerator};
use crate::ledger::UsageLedger;
use crate::prompt::PromptBuilder;
use crate::retry::RetryPolicy;

/// Which generator produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Primary,
    Fallback,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Primary => write!(f, "primary"),
            Tier::Fallback => write!(f, "fallback"),
        }
    }
}

/// Pipeline progress, logged at each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    PrimaryPending,
    Validating(Tier),
    FallbackPending,
    Accepted,
    Rejected,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::PrimaryPending => write!(f, "PRIMARY_PENDING"),
            PipelineState::Validating(tier) => write!(f, "VALIDATING({tier})"),
            PipelineState::FallbackPending => write!(f, "FALLBACK_PENDING"),
            PipelineState::Accepted => write!(f, "ACCEPTED"),
            PipelineState::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Final disposition of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verdict {
    Accepted,
    /// No tier produced a usable proposal. Never replaced by a guessed default.
    Rejected { reason: String },
}

/// Durable per-request output of the pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct EscalationResult {
    /// The last tier's proposal.
    pub proposal: RecurrenceProposal,
    pub tier: Tier,
    /// Validation of `proposal`.
    pub outcome: ValidationOutcome,
    /// Summed across every tier that ran.
    #[serde(serialize_with = "as_millis")]
    pub latency: Duration,
    pub usage: TokenUsage,
    pub fallback_used: bool,
    pub verdict: Verdict,
}

impl EscalationResult {
    pub fn is_accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// A generator call failed for good (fatal, or still rate-limited after retries).
    ///
    /// `latency` and `usage` are what earlier tiers had already spent on the request.
    #[error("{tier} generator failed: {source}")]
    Generation {
        tier: Tier,
        #[source]
        source: GenerationError,
        latency: Duration,
        usage: TokenUsage,
    },
}

impl PipelineError {
    pub fn tier(&self) -> Tier {
        match self {
            PipelineError::Generation { tier, .. } => *tier,
        }
    }

    /// Latency and tokens consumed before the failing call.
    pub fn spent(&self) -> (Duration, TokenUsage) {
        match self {
            PipelineError::Generation { latency, usage, .. } => (*latency, *usage),
        }
    }
}

/// Cheap generator first; the costly one only when the cheap output is unusable.
///
/// Escalation fires iff the primary proposal claims to be recurring and its rule
/// does not parse. Parseable-but-wrong proposals are returned as they are.
/// A pipeline built with [`single`](Self::single) has no fallback and never escalates.
pub struct EscalationPipeline {
    primary: Arc<dyn RecurrenceGenerator>,
    fallback: Option<Arc<dyn RecurrenceGenerator>>,
    retry: RetryPolicy,
    ledger: Arc<UsageLedger>,
}

impl EscalationPipeline {
    pub fn new(
        primary: Arc<dyn RecurrenceGenerator>,
        fallback: Arc<dyn RecurrenceGenerator>,
        retry: RetryPolicy,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            primary,
            fallback: Some(fallback),
            retry,
            ledger,
        }
    }

    /// One generator on its own, validated the same way.
    pub fn single(
        generator: Arc<dyn RecurrenceGenerator>,
        retry: RetryPolicy,
        ledger: Arc<UsageLedger>,
    ) -> Self {
        Self {
            primary: generator,
            fallback: None,
            retry,
            ledger,
        }
    }

    pub fn ledger(&self) -> &Arc<UsageLedger> {
        &self.ledger
    }

    /// Production entry point: structural validation only.
    pub async fn resolve(
        &self,
        request: &RecurrenceRequest,
    ) -> Result<EscalationResult, PipelineError> {
        self.run(request, &Expectation::default()).await
    }

    /// Run the pipeline, validating each proposal against `expected`.
    pub async fn run(
        &self,
        request: &RecurrenceRequest,
        expected: &Expectation,
    ) -> Result<EscalationResult, PipelineError> {
        let instructions = PromptBuilder::recurrence_instructions(request);

        transition(PipelineState::PrimaryPending);
        let first = self
            .call(Tier::Primary, self.primary.as_ref(), &instructions, request, None)
            .await?;

        transition(PipelineState::Validating(Tier::Primary));
        let outcome = validate_against(request, expected, &first.proposal);

        if !(first.proposal.is_recurring() && !outcome.parseable) {
            return Ok(finish(Tier::Primary, first, outcome, None));
        }
        let Some(fallback) = self.fallback.as_deref() else {
            return Ok(finish(Tier::Primary, first, outcome, None));
        };

        info!(
            primary = %self.primary.name(),
            fallback = %fallback.name(),
            reason = outcome.parse_error.as_deref().unwrap_or("parse failed"),
            "primary rule unparseable, escalating"
        );

        transition(PipelineState::FallbackPending);
        let second = self
            .call(Tier::Fallback, fallback, &instructions, request, Some(&first))
            .await?;

        transition(PipelineState::Validating(Tier::Fallback));
        let outcome = validate_against(request, expected, &second.proposal);
        Ok(finish(Tier::Fallback, second, outcome, Some(&first)))
    }

    async fn call(
        &self,
        tier: Tier,
        generator: &dyn RecurrenceGenerator,
        instructions: &str,
        request: &RecurrenceRequest,
        earlier: Option<&Generation>,
    ) -> Result<Generation, PipelineError> {
        let ledger: &UsageLedger = &self.ledger;

        self.retry
            .run(generator.name(), || async move {
                let result = generator.generate(instructions, request).await;
                match &result {
                    Ok(g) => ledger.record_success(generator.name(), g.latency, g.usage),
                    Err(e) => ledger.record_error(generator.name(), e),
                }
                result
            })
            .await
            .map_err(|source| {
                warn!(%tier, generator = %generator.name(), error = %source, "generator call failed");
                let (latency, usage) = earlier
                    .map(|g| (g.latency, g.usage))
                    .unwrap_or_default();
                PipelineError::Generation {
                    tier,
                    source,
                    latency,
                    usage,
                }
            })
    }
}

fn transition(state: PipelineState) {
    debug!(%state, "pipeline transition");
}

fn finish(
    tier: Tier,
    last: Generation,
    outcome: ValidationOutcome,
    earlier: Option<&Generation>,
) -> EscalationResult {
    let (latency, usage) = match earlier {
        Some(prev) => (prev.latency + last.latency, prev.usage + last.usage),
        None => (last.latency, last.usage),
    };

    let verdict = if outcome.parseable {
        transition(PipelineState::Accepted);
        Verdict::Accepted
    } else {
        transition(PipelineState::Rejected);
        let reason = outcome
            .parse_error
            .clone()
            .unwrap_or_else(|| outcome.notes.join("; "));
        Verdict::Rejected { reason }
    };

    EscalationResult {
        proposal: last.proposal,
        tier,
        outcome,
        latency,
        usage,
        fallback_used: earlier.is_some(),
        verdict,
    }
}
