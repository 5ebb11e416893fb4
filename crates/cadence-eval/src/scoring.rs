use cadence_core::config::ScoreWeights;
use cadence_validator::ValidationOutcome;

/// Weighted score of a [`ValidationOutcome`] in `[0, 1]`.
///
/// Only applicable dimensions count: the sum is re-normalized over the weights
/// of dimensions that are not `None`, so an unasserted check never penalizes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoringEngine {
    weights: ScoreWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, outcome: &ValidationOutcome) -> f64 {
        let w = &self.weights;
        let checks = [
            (outcome.recurring, w.recurring),
            (Some(outcome.parseable), w.parseable),
            (outcome.frequency, w.frequency),
            (outcome.wall_clock, w.wall_clock),
            (outcome.interval, w.interval),
            (outcome.weekdays, w.weekdays),
            (outcome.month_days, w.month_days),
            (outcome.set_positions, w.set_positions),
        ];

        let mut total = 0.0;
        let mut earned = 0.0;
        for (value, weight) in checks {
            let Some(passed) = value else { continue };
            total += weight;
            if passed {
                earned += weight;
            }
        }

        if total > 0.0 {
            earned / total
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> ScoringEngine {
        ScoringEngine::new(ScoreWeights::default())
    }

    #[test]
    fn perfect_outcome_scores_one() {
        let outcome = ValidationOutcome {
            parseable: true,
            recurring: Some(true),
            frequency: Some(true),
            weekdays: Some(true),
            set_positions: Some(true),
            wall_clock: Some(true),
            ..ValidationOutcome::default()
        };
        assert_eq!(engine().score(&outcome), 1.0);
    }

    #[test]
    fn unasserted_dimensions_are_excluded() {
        // recurring 20 + parseable 20 + frequency 15 + wall clock 15 = 70; wall clock wrong.
        let outcome = ValidationOutcome {
            parseable: true,
            recurring: Some(true),
            frequency: Some(true),
            wall_clock: Some(false),
            ..ValidationOutcome::default()
        };
        let score = engine().score(&outcome);
        assert!((score - 55.0 / 70.0).abs() < 1e-9);
    }

    #[test]
    fn unparseable_recurring_keeps_only_classification() {
        let outcome = ValidationOutcome {
            parseable: false,
            recurring: Some(true),
            ..ValidationOutcome::default()
        };
        assert!((engine().score(&outcome) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn failed_call_scores_zero() {
        assert_eq!(engine().score(&ValidationOutcome::failed("HTTP 500")), 0.0);
    }

    #[test]
    fn zero_weights_score_one() {
        let engine = ScoringEngine::new(ScoreWeights {
            recurring: 0.0,
            parseable: 0.0,
            frequency: 0.0,
            wall_clock: 0.0,
            interval: 0.0,
            weekdays: 0.0,
            month_days: 0.0,
            set_positions: 0.0,
        });
        assert_eq!(engine.score(&ValidationOutcome::failed("x")), 1.0);
    }

    #[test]
    fn custom_weights_change_the_balance() {
        let outcome = ValidationOutcome {
            parseable: true,
            recurring: Some(true),
            frequency: Some(false),
            ..ValidationOutcome::default()
        };
        let heavy_freq = ScoringEngine::new(ScoreWeights {
            frequency: 60.0,
            ..ScoreWeights::default()
        });
        assert!((heavy_freq.score(&outcome) - 0.4).abs() < 1e-9);
    }
}
