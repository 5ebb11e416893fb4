use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context;
use cadence_agent::GeneratorUsage;
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::gate::{pct, GateReport, Thresholds};
use crate::record::CaseRecord;
use crate::summary::RunSummary;

const RULE: &str = "============================================================";
const MIN_LABEL_WIDTH: usize = 26;

/// How a configuration produced its proposals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigKind {
    /// One generator on its own.
    Model,
    /// Primary, validation, then fallback.
    Pipeline,
}

/// Results of one configuration over the whole case set.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigRun {
    pub label: String,
    pub kind: ConfigKind,
    pub summary: RunSummary,
    pub generators: Vec<GeneratorUsage>,
    pub cases: Vec<CaseRecord>,
}

impl ConfigRun {
    pub fn new(
        label: impl Into<String>,
        kind: ConfigKind,
        cases: Vec<CaseRecord>,
        generators: Vec<GeneratorUsage>,
    ) -> Self {
        Self {
            label: label.into(),
            kind,
            summary: RunSummary::from_records(&cases),
            generators,
            cases,
        }
    }
}

/// Everything one evaluation run produced.
///
/// The regression gate is applied to the last pipeline configuration, or to
/// the last configuration when no pipeline ran.
#[derive(Debug, Clone, Serialize)]
pub struct EvalReport {
    pub run_id: Uuid,
    pub run_at: DateTime<Utc>,
    pub test_count: usize,
    /// Labels in run order.
    pub configs: Vec<String>,
    #[serde(serialize_with = "by_label")]
    pub results: Vec<ConfigRun>,
    pub gated: Option<String>,
    pub gate: GateReport,
}

fn by_label<S: Serializer>(runs: &[ConfigRun], s: S) -> Result<S::Ok, S::Error> {
    s.collect_map(runs.iter().map(|r| (&r.label, r)))
}

impl EvalReport {
    pub fn new(results: Vec<ConfigRun>, thresholds: &Thresholds) -> Self {
        let gated = results
            .iter()
            .rev()
            .find(|r| r.kind == ConfigKind::Pipeline)
            .or_else(|| results.last());
        let gate = match gated {
            Some(run) => thresholds.gate(&run.summary),
            None => GateReport {
                passed: false,
                failures: vec!["no configuration was evaluated".to_string()],
            },
        };

        Self {
            run_id: Uuid::new_v4(),
            run_at: Utc::now(),
            test_count: results.first().map_or(0, |r| r.cases.len()),
            configs: results.iter().map(|r| r.label.clone()).collect(),
            gated: gated.map(|r| r.label.clone()),
            gate,
            results,
        }
    }

    /// Human-readable report: per-config summaries, comparison table, gate and
    /// the cases that failed somewhere.
    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "RECURRENCE EVALUATION");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Run:        {}", self.run_id);
        let _ = writeln!(out, "Date:       {}", self.run_at.to_rfc3339());
        let _ = writeln!(out, "Test cases: {}", self.test_count);
        let _ = writeln!(out, "Configs:    {}", self.configs.join(", "));

        for run in &self.results {
            render_summary(&mut out, run);
        }

        self.render_comparison(&mut out);

        match &self.gated {
            Some(label) => {
                let verdict = if self.gate.passed { "PASSED" } else { "FAILED" };
                let _ = writeln!(out, "\nGate ({label}): {verdict}");
            }
            None => {
                let _ = writeln!(out, "\nGate: FAILED");
            }
        }
        for f in &self.gate.failures {
            let _ = writeln!(out, "  - {f}");
        }

        self.render_problems(&mut out);
        out
    }

    fn render_comparison(&self, out: &mut String) {
        let width = self
            .results
            .iter()
            .map(|r| r.label.chars().count() + 2)
            .max()
            .unwrap_or(0)
            .max(MIN_LABEL_WIDTH);
        let header = format!(
            "{:<width$}{:<8}{:<10}{:<8}{:<8}{:<8}{}",
            "Config", "Score", "Latency", "Parse", "Recur", "Freq", "Clock"
        );
        let line = "=".repeat(header.len() + 4);

        let _ = writeln!(out, "\n{line}");
        let _ = writeln!(out, "COMPARISON TABLE");
        let _ = writeln!(out, "{line}");
        let _ = writeln!(out, "{header}");
        for run in &self.results {
            let s = &run.summary;
            let _ = writeln!(
                out,
                "{:<width$}{:<8}{:<10}{:<8}{:<8}{:<8}{}",
                run.label,
                pct(s.avg_score),
                format!("{}ms", s.avg_latency_ms),
                whole_pct(s.parse_rate),
                whole_pct(s.recurring_accuracy),
                whole_pct(s.frequency_accuracy),
                whole_pct(s.wall_clock_accuracy),
            );
        }
    }

    fn render_problems(&self, out: &mut String) {
        let _ = writeln!(out, "\n{RULE}");
        let _ = writeln!(out, "PROBLEMATIC PATTERNS (failed in at least one config)");
        let _ = writeln!(out, "{RULE}");

        // case id -> (first record seen, per-config failure lines)
        let mut failed: BTreeMap<u32, (&CaseRecord, Vec<String>)> = BTreeMap::new();
        for run in &self.results {
            for c in run.cases.iter().filter(|c| c.score < 1.0) {
                let fallback = if c.fallback_used { " [FALLBACK]" } else { "" };
                let detail = match &c.error {
                    Some(err) => format!("error: {err}"),
                    None => c.outcome.notes.join("; "),
                };
                failed.entry(c.id).or_insert_with(|| (c, Vec::new())).1.push(format!(
                    "{}: score={:.2}{fallback} {detail}",
                    run.label, c.score
                ));
            }
        }

        if failed.is_empty() {
            let _ = writeln!(out, "None, every case passed in every config");
            return;
        }
        let total = self.results.len();
        for (id, (case, lines)) in failed {
            let _ = writeln!(
                out,
                "\n  #{id} [{}] \"{}\": failed in {}/{total} configs",
                case.category,
                case.message,
                lines.len()
            );
            for l in lines {
                let _ = writeln!(out, "    {}", l.trim_end());
            }
        }
    }

    /// Write `results-<ts>.json` and `report-<ts>.txt` into `dir`.
    pub fn write(&self, dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating output directory {}", dir.display()))?;

        let stamp = self.run_at.format("%Y-%m-%dT%H-%M-%S");
        let json_path = dir.join(format!("results-{stamp}.json"));
        let text_path = dir.join(format!("report-{stamp}.txt"));

        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&json_path, json)
            .with_context(|| format!("writing {}", json_path.display()))?;
        std::fs::write(&text_path, self.render_text())
            .with_context(|| format!("writing {}", text_path.display()))?;

        Ok((json_path, text_path))
    }
}

fn render_summary(out: &mut String, run: &ConfigRun) {
    let s = &run.summary;
    let kind = match run.kind {
        ConfigKind::Model => "model",
        ConfigKind::Pipeline => "pipeline",
    };

    let _ = writeln!(out, "\n--- {} ({kind}) ---", run.label);
    let _ = writeln!(out, "Overall score:      {}", pct(s.avg_score));
    let _ = writeln!(out, "Avg latency:        {}ms", s.avg_latency_ms);
    let _ = writeln!(out, "Total tokens:       {} in / {} out", s.tokens_in, s.tokens_out);
    if run.kind == ConfigKind::Pipeline || s.fallback_count > 0 {
        let _ = writeln!(out, "Fallback used:      {}/{} cases", s.fallback_count, s.cases);
    }
    let _ = writeln!(out, "Failed calls:       {}", s.failed_calls);

    let _ = writeln!(out, "\nSuccess criteria:");
    let _ = writeln!(out, "  RRULE parseable:     {}", pct(s.parse_rate));
    let _ = writeln!(out, "  Recurring correct:   {}", pct(s.recurring_accuracy));
    let _ = writeln!(out, "  Freq correct:        {}", pct(s.frequency_accuracy));
    let _ = writeln!(out, "  Wall clock correct:  {}", pct(s.wall_clock_accuracy));
    let _ = writeln!(out, "  Needs clarification: {}/{}", s.needs_clarification, s.cases);

    let _ = writeln!(out, "\nBy category:");
    for (cat, c) in &s.by_category {
        let _ = writeln!(out, "  {cat}: {} avg ({} cases)", pct(c.avg_score), c.cases);
    }

    if !run.generators.is_empty() {
        let _ = writeln!(out, "\nGenerators:");
        for g in &run.generators {
            let _ = writeln!(
                out,
                "  {}: {} ok, {} failed, {} rate-limited, avg {}ms, {} in / {} out",
                g.name, g.calls_ok, g.calls_err, g.rate_limited, g.avg_latency_ms, g.tokens_in, g.tokens_out
            );
        }
    }
}

fn whole_pct(value: f64) -> String {
    format!("{:.0}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::ScoringEngine;
    use cadence_core::{Category, Expectation, RecurrenceRequest, TestCase};
    use cadence_validator::ValidationOutcome;
    use chrono::NaiveDate;

    const PIPELINE: &str = "claude-haiku-4-5 -> gpt-5-mini (fallback)";

    fn last_friday() -> TestCase {
        TestCase {
            id: 16,
            category: Category::Complex,
            request: RecurrenceRequest::new(
                "Last Friday of the month at 17:00",
                chrono_tz::US::Eastern,
                NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            ),
            expected: Expectation::default(),
            notes: None,
        }
    }

    fn failed() -> CaseRecord {
        CaseRecord::failed(&last_friday(), "HTTP 503", &ScoringEngine::default())
    }

    fn passed() -> CaseRecord {
        let mut record = failed();
        record.error = None;
        record.score = 1.0;
        record.latency_ms = 800;
        record.outcome = ValidationOutcome {
            parseable: true,
            recurring: Some(true),
            ..ValidationOutcome::default()
        };
        record
    }

    fn report() -> EvalReport {
        EvalReport::new(
            vec![
                ConfigRun::new("gpt-5-nano", ConfigKind::Model, vec![failed()], Vec::new()),
                ConfigRun::new(PIPELINE, ConfigKind::Pipeline, vec![passed()], Vec::new()),
            ],
            &Thresholds::default(),
        )
    }

    #[test]
    fn gate_applies_to_the_pipeline() {
        let report = report();
        assert_eq!(report.gated.as_deref(), Some(PIPELINE));
        assert!(report.gate.passed, "{:?}", report.gate.failures);
        assert_eq!(report.test_count, 1);
        assert_eq!(report.configs, ["gpt-5-nano", PIPELINE]);
    }

    #[test]
    fn models_only_gate_the_last_model() {
        let report = EvalReport::new(
            vec![ConfigRun::new("gpt-5-nano", ConfigKind::Model, vec![failed()], Vec::new())],
            &Thresholds::default(),
        );
        assert_eq!(report.gated.as_deref(), Some("gpt-5-nano"));
        assert!(!report.gate.passed);

        let empty = EvalReport::new(Vec::new(), &Thresholds::default());
        assert!(empty.gated.is_none());
        assert!(!empty.gate.passed);
    }

    #[test]
    fn text_compares_configs_and_lists_patterns() {
        let text = report().render_text();
        assert!(text.contains(&format!("Configs:    gpt-5-nano, {PIPELINE}")));
        assert!(text.contains("--- gpt-5-nano (model) ---"));
        assert!(text.contains(&format!("--- {PIPELINE} (pipeline) ---")));
        assert!(text.contains(&format!("Gate ({PIPELINE}): PASSED")));

        assert!(text.contains("COMPARISON TABLE"));
        let row = text
            .lines()
            .find(|l| l.starts_with("gpt-5-nano "))
            .unwrap();
        assert!(row.contains("0.0%"));
        assert!(row.contains("0ms"));
        let pipeline_row = text.lines().find(|l| l.starts_with(PIPELINE)).unwrap();
        assert!(pipeline_row.contains("100.0%"));
        assert!(pipeline_row.contains("800ms"));

        assert!(text.contains(
            "#16 [complex] \"Last Friday of the month at 17:00\": failed in 1/2 configs"
        ));
        assert!(text.contains("gpt-5-nano: score=0.00 error: HTTP 503"));
        assert!(!text.contains(&format!("{PIPELINE}: score=")));
    }

    #[test]
    fn json_is_keyed_by_config() {
        let value = serde_json::to_value(report()).unwrap();
        assert_eq!(value["test_count"], 1);
        assert_eq!(value["gate"]["passed"], true);
        assert_eq!(value["gated"], PIPELINE);
        assert_eq!(value["configs"][0], "gpt-5-nano");

        let nano = &value["results"]["gpt-5-nano"];
        assert_eq!(nano["kind"], "model");
        assert_eq!(nano["summary"]["by_category"]["complex"]["cases"], 1);
        let case = &nano["cases"][0];
        assert_eq!(case["id"], 16);
        assert_eq!(case["category"], "complex");
        assert_eq!(case["outcome"]["parseable"], false);
        assert!(case["outcome"]["frequency"].is_null());
        assert!(case["proposal"].is_null());

        assert_eq!(value["results"][PIPELINE]["kind"], "pipeline");
        assert_eq!(value["results"][PIPELINE]["summary"]["avg_score"], 1.0);
    }

    #[test]
    fn writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let (json, text) = report().write(&dir.path().join("results")).unwrap();
        assert!(json.file_name().unwrap().to_string_lossy().starts_with("results-"));
        assert!(text.file_name().unwrap().to_string_lossy().starts_with("report-"));
        let raw = std::fs::read_to_string(json).unwrap();
        assert!(raw.contains("\"run_id\""));
        assert!(raw.contains("\"gpt-5-nano\": {"));
    }
}
