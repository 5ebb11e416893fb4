//! Instructions and output schema for the recurrence generators.

use cadence_core::RecurrenceRequest;

use crate::provider::{JsonSchemaFormat, ToolDefinition};

/// Tool name / schema name shared by both backends.
pub const TOOL_NAME: &str = "rrule_generation";

pub struct PromptBuilder;

impl PromptBuilder {
    /// System instructions for turning `request.message` into a proposal.
    pub fn recurrence_instructions(request: &RecurrenceRequest) -> String {
        let tz = request.timezone.name();
        let date = request.reference_date.format("%Y-%m-%d");
        let weekday = request.reference_weekday_name();
        let now = match request.reference_time {
            Some(t) => format!("\n- Current time: {}", t.format("%H:%M")),
            None => String::new(),
        };

        format!(
            "You are a reminder scheduling assistant. Your job is to convert natural language \
reminder requests into structured scheduling data.

## Context
- User's timezone: {tz}
- Current date: {date}
- Current day of week: {weekday}{now}

## Rules

### For recurring reminders:
1. Generate a valid iCalendar RRULE string (RFC 5545)
2. The RRULE must include DTSTART with TZID in the format: DTSTART;TZID={tz}:YYYYMMDDTHHmmss
3. The RRULE line follows on a new line: RRULE:FREQ=...
4. FREQ must be one of exactly these four values: DAILY, WEEKLY, MONTHLY, YEARLY. QUARTERLY is NOT valid; use MONTHLY;INTERVAL=3 instead
5. All times are wall-clock times in the user's timezone
6. Use the current date to anchor the first occurrence (DTSTART is the next occurrence on or after the current date)
7. For \"every other\" patterns, use INTERVAL=2
8. For \"every N days/weeks/months\", use INTERVAL=N
9. For \"every quarter\" / \"quarterly\", use FREQ=MONTHLY;INTERVAL=3
10. For ordinal weekdays (e.g. \"third Thursday\"), use BYDAY with the ordinal prefix (e.g. BYDAY=3TH)
11. For \"last\" patterns, use negative ordinals (e.g. BYDAY=-1FR for last Friday) or BYMONTHDAY=-1 for the last day
12. If no time is specified, default to 09:00

### For one-time reminders:
1. Do NOT generate an RRULE
2. Provide the absolute datetime in the user's timezone
3. For relative times like \"in 2 hours\", compute the absolute time from the current date (assume the current time is 12:00 if not given)

### Output format:
Return a JSON object with:
- `is_recurring`: boolean
- `rrule_string`: string | null, the full DTSTART + RRULE string for recurring, null for one-time
- `one_time_datetime`: string | null, ISO datetime in the user's timezone for one-time, null for recurring
- `explanation`: string, brief explanation of the interpretation
- `needs_clarification`: boolean, true if the request is genuinely ambiguous and you had to make assumptions
- `assumptions`: string[], assumptions made (empty if none)"
        )
    }

    /// Structured-output constraint for backends that support `response_format`.
    pub fn response_format() -> JsonSchemaFormat {
        JsonSchemaFormat {
            name: TOOL_NAME.to_string(),
            strict: true,
            schema: proposal_schema(),
        }
    }

    /// The single forced tool for backends that return structure via tool use.
    pub fn proposal_tool() -> ToolDefinition {
        ToolDefinition {
            name: TOOL_NAME.to_string(),
            description: "Generate RRULE or one-time datetime from the user request.".to_string(),
            input_schema: proposal_schema(),
        }
    }
}

/// JSON schema of the generator output (all six fields required, nothing else allowed).
pub fn proposal_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "is_recurring": {
                "type": "boolean",
                "description": "Whether the reminder is recurring"
            },
            "rrule_string": {
                "type": ["string", "null"],
                "description": "Full DTSTART + RRULE string for recurring reminders, null for one-time. Format: DTSTART;TZID=Timezone:YYYYMMDDTHHmmss\\nRRULE:FREQ=..."
            },
            "one_time_datetime": {
                "type": ["string", "null"],
                "description": "ISO datetime string in user timezone for one-time reminders, null for recurring. Format: YYYY-MM-DDTHH:mm:ss"
            },
            "explanation": {
                "type": "string",
                "description": "Brief explanation of how the request was interpreted"
            },
            "needs_clarification": {
                "type": "boolean",
                "description": "Whether the request required assumptions that should be confirmed with the user"
            },
            "assumptions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "List of assumptions made when interpreting the request"
            }
        },
        "required": [
            "is_recurring",
            "rrule_string",
            "one_time_datetime",
            "explanation",
            "needs_clarification",
            "assumptions"
        ],
        "additionalProperties": false
    })
}
