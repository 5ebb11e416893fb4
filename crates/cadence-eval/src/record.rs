use cadence_agent::{EscalationResult, PipelineError, Tier, Verdict};
use cadence_core::{Category, RecurrenceProposal, TestCase, TokenUsage};
use cadence_validator::ValidationOutcome;
use serde::Serialize;

use crate::scoring::ScoringEngine;

/// One evaluated case, as it appears in the JSON report.
#[derive(Debug, Clone, Serialize)]
pub struct CaseRecord {
    pub id: u32,
    pub category: Category,
    pub message: String,
    pub score: f64,
    pub outcome: ValidationOutcome,
    pub proposal: Option<RecurrenceProposal>,
    pub tier: Option<Tier>,
    pub verdict: Option<Verdict>,
    pub latency_ms: u64,
    pub tokens: TokenUsage,
    pub fallback_used: bool,
    pub error: Option<String>,
}

impl CaseRecord {
    pub fn from_result(case: &TestCase, result: EscalationResult, engine: &ScoringEngine) -> Self {
        Self {
            id: case.id,
            category: case.category,
            message: case.request.message.clone(),
            score: engine.score(&result.outcome),
            outcome: result.outcome,
            proposal: Some(result.proposal),
            tier: Some(result.tier),
            verdict: Some(result.verdict),
            latency_ms: result.latency.as_millis() as u64,
            tokens: result.usage,
            fallback_used: result.fallback_used,
            error: None,
        }
    }

    /// A case that produced no proposal and no cost figures.
    pub fn failed(case: &TestCase, error: impl Into<String>, engine: &ScoringEngine) -> Self {
        let error = error.into();
        let outcome = ValidationOutcome::failed(error.clone());
        Self {
            id: case.id,
            category: case.category,
            message: case.request.message.clone(),
            score: engine.score(&outcome),
            outcome,
            proposal: None,
            tier: None,
            verdict: None,
            latency_ms: 0,
            tokens: TokenUsage::default(),
            fallback_used: false,
            error: Some(error),
        }
    }

    /// A case the pipeline gave up on. Cost spent by earlier tiers is kept.
    pub fn from_error(case: &TestCase, error: &PipelineError, engine: &ScoringEngine) -> Self {
        let (latency, usage) = error.spent();
        Self {
            tier: Some(error.tier()),
            latency_ms: latency.as_millis() as u64,
            tokens: usage,
            fallback_used: error.tier() == Tier::Fallback,
            ..Self::failed(case, error.to_string(), engine)
        }
    }

    pub fn needs_clarification(&self) -> bool {
        self.proposal
            .as_ref()
            .is_some_and(|p| p.needs_clarification)
    }
}
