use cadence_rrule::Equivalence;
use serde::Serialize;

/// Result of validating one proposal.
///
/// Every dimension is tri-state: `Some(true)` asserted and satisfied,
/// `Some(false)` asserted and violated, `None` not asserted (or not checkable
/// because the proposal is unparseable). `None` never affects a score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    pub parseable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
    pub recurring: Option<bool>,
    pub frequency: Option<bool>,
    pub interval: Option<bool>,
    pub weekdays: Option<bool>,
    pub month_days: Option<bool>,
    pub set_positions: Option<bool>,
    pub wall_clock: Option<bool>,
    /// Equivalent encodings accepted while comparing.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub equivalences: Vec<Equivalence>,
    pub notes: Vec<String>,
}

impl ValidationOutcome {
    /// Outcome for a generator call that never produced a proposal.
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            parseable: false,
            parse_error: Some(reason.into()),
            recurring: Some(false),
            ..Self::default()
        }
    }

    /// Asserted dimensions that came out `Some(false)`, by name.
    pub fn failed_dimensions(&self) -> Vec<&'static str> {
        let mut failed = Vec::new();
        if !self.parseable {
            failed.push("parseable");
        }
        for (name, value) in self.dimensions() {
            if value == Some(false) {
                failed.push(name);
            }
        }
        failed
    }

    /// `(name, value)` for every tri-state dimension, in reporting order.
    pub fn dimensions(&self) -> [(&'static str, Option<bool>); 7] {
        [
            ("recurring", self.recurring),
            ("frequency", self.frequency),
            ("interval", self.interval),
            ("weekdays", self.weekdays),
            ("month_days", self.month_days),
            ("set_positions", self.set_positions),
            ("wall_clock", self.wall_clock),
        ]
    }

    pub fn is_clean(&self) -> bool {
        self.failed_dimensions().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_outcome_marks_classification_false() {
        let outcome = ValidationOutcome::failed("HTTP 500");
        assert!(!outcome.parseable);
        assert_eq!(outcome.recurring, Some(false));
        assert_eq!(outcome.frequency, None);
        assert_eq!(outcome.failed_dimensions(), vec!["parseable", "recurring"]);
    }

    #[test]
    fn unasserted_dimensions_do_not_fail() {
        let outcome = ValidationOutcome {
            parseable: true,
            recurring: Some(true),
            ..ValidationOutcome::default()
        };
        assert!(outcome.is_clean());
    }
}
