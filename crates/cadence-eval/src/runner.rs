use std::convert::Infallible;
use std::sync::Arc;

use cadence_agent::EscalationPipeline;
use cadence_core::TestCase;
use cadence_dispatch::Dispatcher;
use tracing::info;

use crate::record::CaseRecord;
use crate::scoring::ScoringEngine;

/// Drives every case through the pipeline, at most `max_in_flight` at a time.
pub struct Runner {
    pipeline: Arc<EscalationPipeline>,
    engine: ScoringEngine,
    max_in_flight: usize,
}

impl Runner {
    pub fn new(pipeline: Arc<EscalationPipeline>, engine: ScoringEngine, max_in_flight: usize) -> Self {
        Self {
            pipeline,
            engine,
            max_in_flight,
        }
    }

    /// One record per case, in case order. A failed case never stops the batch.
    pub async fn run(&self, cases: &[TestCase]) -> Vec<CaseRecord> {
        let mut dispatcher = Dispatcher::new("eval", self.max_in_flight);
        for case in cases {
            let pipeline = Arc::clone(&self.pipeline);
            let request = case.request.clone();
            let expected = case.expected.clone();
            // pipeline errors stay typed so the record keeps their cost
            dispatcher.submit(async move {
                Ok::<_, Infallible>(pipeline.run(&request, &expected).await)
            });
        }

        info!(
            cases = cases.len(),
            max_in_flight = dispatcher.max_in_flight(),
            "evaluation started"
        );
        let results = dispatcher.drain().await;

        cases
            .iter()
            .zip(results)
            .map(|(case, result)| {
                let record = match result {
                    Ok(Ok(r)) => CaseRecord::from_result(case, r, &self.engine),
                    Ok(Err(e)) => CaseRecord::from_error(case, &e, &self.engine),
                    Err(e) => CaseRecord::failed(case, e.to_string(), &self.engine),
                };
                info!(
                    case = record.id,
                    category = %record.category,
                    score = format_args!("{:.2}", record.score),
                    latency_ms = record.latency_ms,
                    fallback = record.fallback_used,
                    notes = %record.outcome.notes.join("; "),
                    "case scored"
                );
                record
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cadence_agent::{Generation, GenerationError, RecurrenceGenerator, RetryPolicy, UsageLedger};
    use cadence_core::{RecurrenceProposal, RecurrenceRequest, TokenUsage};
    use std::time::Duration;

    /// Answers from a fixed table keyed by message; anything else fails fatally.
    struct Oracle {
        name: &'static str,
        answers: Vec<(&'static str, RecurrenceProposal)>,
    }

    #[async_trait]
    impl RecurrenceGenerator for Oracle {
        fn name(&self) -> &str {
            self.name
        }

        async fn generate(
            &self,
            _instructions: &str,
            request: &RecurrenceRequest,
        ) -> Result<Generation, GenerationError> {
            let proposal = self
                .answers
                .iter()
                .find(|(msg, _)| *msg == request.message)
                .map(|(_, p)| p.clone())
                .ok_or_else(|| GenerationError::Fatal("HTTP 500".into()))?;
            Ok(Generation {
                proposal,
                latency: Duration::from_millis(50),
                usage: TokenUsage::new(900, 60),
            })
        }
    }

    fn runner(primary: Oracle, fallback: Oracle) -> Runner {
        let pipeline = EscalationPipeline::new(
            Arc::new(primary),
            Arc::new(fallback),
            RetryPolicy::none(),
            UsageLedger::new(),
        );
        Runner::new(Arc::new(pipeline), ScoringEngine::default(), 2)
    }

    #[tokio::test]
    async fn scores_every_case_in_order() {
        let cases = crate::cases::builtin().unwrap();
        let subset: Vec<_> = cases.into_iter().filter(|c| [2, 15, 26, 28].contains(&c.id)).collect();

        let primary = Oracle {
            name: "fast",
            answers: vec![
                (
                    "Every Monday at 10:00",
                    RecurrenceProposal::recurring(
                        "DTSTART;TZID=Europe/Berlin:20260302T100000\nRRULE:FREQ=WEEKLY;BYDAY=MO",
                    ),
                ),
                (
                    "Every third Thursday of the month at 15:00",
                    RecurrenceProposal::recurring("RRULE:FREQ=MONTHLY;BYDAY=3TH"),
                ),
                (
                    "Remind me tomorrow at 3pm",
                    RecurrenceProposal::one_time("2026-03-02T15:00:00"),
                ),
            ],
        };
        let fallback = Oracle {
            name: "smart",
            answers: vec![(
                "Every third Thursday of the month at 15:00",
                RecurrenceProposal::recurring(
                    "DTSTART;TZID=Europe/Berlin:20260319T150000\nRRULE:FREQ=MONTHLY;BYDAY=3TH",
                ),
            )],
        };

        let records = runner(primary, fallback).run(&subset).await;
        let ids: Vec<u32> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 15, 26, 28]);

        assert_eq!(records[0].score, 1.0);
        assert!(!records[0].fallback_used);

        assert!(records[1].fallback_used);
        assert_eq!(records[1].score, 1.0);
        assert_eq!(records[1].latency_ms, 100);

        assert_eq!(records[2].score, 1.0);

        // No canned answer: fatal generator error, recorded not propagated.
        assert_eq!(records[3].score, 0.0);
        assert!(records[3].error.as_deref().unwrap().contains("HTTP 500"));
        assert!(!records[3].outcome.parseable);
        assert_eq!(records[3].latency_ms, 0);
    }

    #[tokio::test]
    async fn failed_escalation_still_reports_primary_cost() {
        let cases = crate::cases::builtin().unwrap();
        let subset: Vec<_> = cases.into_iter().filter(|c| c.id == 15).collect();

        let primary = Oracle {
            name: "fast",
            answers: vec![(
                "Every third Thursday of the month at 15:00",
                RecurrenceProposal::recurring("RRULE:FREQ=MONTHLY;BYDAY=3TH"),
            )],
        };
        let fallback = Oracle {
            name: "smart",
            answers: vec![],
        };

        let records = runner(primary, fallback).run(&subset).await;
        let record = &records[0];
        assert_eq!(record.score, 0.0);
        assert!(record.error.as_deref().unwrap().contains("fallback generator failed"));
        assert_eq!(record.tier, Some(cadence_agent::Tier::Fallback));
        assert!(record.fallback_used);
        assert_eq!(record.latency_ms, 50);
        assert_eq!(record.tokens, TokenUsage::new(900, 60));

        let summary = crate::summary::RunSummary::from_records(&records);
        assert_eq!(summary.tokens_in, 900);
        assert_eq!(summary.fallback_count, 1);
    }
}
