use serde::{Deserialize, Serialize};

/// What a generator proposed, tagged on its `is_recurring` claim.
///
/// The field belonging to the other branch is kept as a `stray_*` value so the
/// validator can enforce the exclusive-or rule instead of trusting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposedSchedule {
    Recurring {
        rrule: Option<String>,
        stray_datetime: Option<String>,
    },
    OneTime {
        at: Option<String>,
        stray_rrule: Option<String>,
    },
}

/// Structured generator output.
///
/// Wire (see [`WireProposal`]):
/// `{ "is_recurring": true, "rrule_string": "DTSTART;…\nRRULE:…", "one_time_datetime": null,
///    "explanation": "…", "needs_clarification": false, "assumptions": [] }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireProposal", into = "WireProposal")]
pub struct RecurrenceProposal {
    pub schedule: ProposedSchedule,
    pub explanation: String,
    pub needs_clarification: bool,
    pub assumptions: Vec<String>,
}

impl RecurrenceProposal {
    pub fn recurring(rrule: impl Into<String>) -> Self {
        Self::bare(ProposedSchedule::Recurring {
            rrule: Some(rrule.into()),
            stray_datetime: None,
        })
    }

    pub fn one_time(at: impl Into<String>) -> Self {
        Self::bare(ProposedSchedule::OneTime {
            at: Some(at.into()),
            stray_rrule: None,
        })
    }

    pub fn bare(schedule: ProposedSchedule) -> Self {
        Self {
            schedule,
            explanation: String::new(),
            needs_clarification: false,
            assumptions: Vec::new(),
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn is_recurring(&self) -> bool {
        matches!(self.schedule, ProposedSchedule::Recurring { .. })
    }

    /// The `rrule_string` field as it appeared on the wire, whichever branch.
    pub fn rrule_string(&self) -> Option<&str> {
        match &self.schedule {
            ProposedSchedule::Recurring { rrule, .. } => rrule.as_deref(),
            ProposedSchedule::OneTime { stray_rrule, .. } => stray_rrule.as_deref(),
        }
    }

    /// The `one_time_datetime` field as it appeared on the wire, whichever branch.
    pub fn one_time_datetime(&self) -> Option<&str> {
        match &self.schedule {
            ProposedSchedule::Recurring { stray_datetime, .. } => stray_datetime.as_deref(),
            ProposedSchedule::OneTime { at, .. } => at.as_deref(),
        }
    }
}

/// Loosely-typed JSON shape produced by the generator backends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireProposal {
    pub is_recurring: bool,
    #[serde(default)]
    pub rrule_string: Option<String>,
    #[serde(default)]
    pub one_time_datetime: Option<String>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub assumptions: Vec<String>,
}

/// Blank strings are treated like `null`; some models emit `""` for absent fields.
fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl From<WireProposal> for RecurrenceProposal {
    fn from(wire: WireProposal) -> Self {
        let rrule = non_blank(wire.rrule_string);
        let datetime = non_blank(wire.one_time_datetime);
        let schedule = if wire.is_recurring {
            ProposedSchedule::Recurring {
                rrule,
                stray_datetime: datetime,
            }
        } else {
            ProposedSchedule::OneTime {
                at: datetime,
                stray_rrule: rrule,
            }
        };
        Self {
            schedule,
            explanation: wire.explanation,
            needs_clarification: wire.needs_clarification,
            assumptions: wire.assumptions,
        }
    }
}

impl From<RecurrenceProposal> for WireProposal {
    fn from(p: RecurrenceProposal) -> Self {
        let (is_recurring, rrule_string, one_time_datetime) = match p.schedule {
            ProposedSchedule::Recurring {
                rrule,
                stray_datetime,
            } => (true, rrule, stray_datetime),
            ProposedSchedule::OneTime { at, stray_rrule } => (false, stray_rrule, at),
        };
        Self {
            is_recurring,
            rrule_string,
            one_time_datetime,
            explanation: p.explanation,
            needs_clarification: p.needs_clarification,
            assumptions: p.assumptions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recurring_wire_becomes_recurring_branch() {
        let json = r#"{
            "is_recurring": true,
            "rrule_string": "DTSTART;TZID=Europe/Berlin:20260302T100000\nRRULE:FREQ=WEEKLY;BYDAY=MO",
            "one_time_datetime": null,
            "explanation": "weekly on Monday",
            "needs_clarification": false,
            "assumptions": []
        }"#;
        let p: RecurrenceProposal = serde_json::from_str(json).unwrap();
        assert!(p.is_recurring());
        assert!(p.rrule_string().unwrap().contains("FREQ=WEEKLY"));
        assert!(p.one_time_datetime().is_none());
    }

    #[test]
    fn stray_field_is_preserved() {
        let json = r#"{"is_recurring": false, "rrule_string": "RRULE:FREQ=DAILY",
                       "one_time_datetime": "2026-03-02T15:00:00"}"#;
        let p: RecurrenceProposal = serde_json::from_str(json).unwrap();
        match &p.schedule {
            ProposedSchedule::OneTime { at, stray_rrule } => {
                assert_eq!(at.as_deref(), Some("2026-03-02T15:00:00"));
                assert_eq!(stray_rrule.as_deref(), Some("RRULE:FREQ=DAILY"));
            }
            other => panic!("expected one-time branch, got {other:?}"),
        }
    }

    #[test]
    fn blank_strings_count_as_absent() {
        let json = r#"{"is_recurring": true, "rrule_string": "  ", "one_time_datetime": ""}"#;
        let p: RecurrenceProposal = serde_json::from_str(json).unwrap();
        assert!(p.rrule_string().is_none());
        assert!(p.one_time_datetime().is_none());
    }

    #[test]
    fn serializes_back_to_wire_shape() {
        let p = RecurrenceProposal::one_time("2026-03-02T15:00:00");
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value["is_recurring"], false);
        assert_eq!(value["one_time_datetime"], "2026-03-02T15:00:00");
        assert!(value["rrule_string"].is_null());
        assert_eq!(value["assumptions"], serde_json::json!([]));
    }
}
