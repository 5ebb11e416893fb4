use std::collections::BTreeMap;

use anyhow::anyhow;
use cadence_core::config::ThresholdsConfig;
use cadence_core::Category;
use serde::Serialize;
use tracing::warn;

use crate::summary::RunSummary;

/// Regression thresholds a run must meet.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    pub min_overall: f64,
    pub min_parse_rate: f64,
    pub categories: BTreeMap<Category, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateReport {
    pub passed: bool,
    pub failures: Vec<String>,
}

impl Thresholds {
    /// Category keys must be known category slugs.
    pub fn from_config(config: &ThresholdsConfig) -> anyhow::Result<Self> {
        let categories = config
            .categories
            .iter()
            .map(|(slug, min)| {
                slug.parse::<Category>()
                    .map(|cat| (cat, *min))
                    .map_err(|e| anyhow!("scoring.thresholds.categories: {e}"))
            })
            .collect::<anyhow::Result<_>>()?;
        Ok(Self {
            min_overall: config.min_overall,
            min_parse_rate: config.min_parse_rate,
            categories,
        })
    }

    pub fn gate(&self, summary: &RunSummary) -> GateReport {
        let mut failures = Vec::new();

        if below(summary.avg_score, self.min_overall) {
            failures.push(format!(
                "overall score {} below minimum {}",
                pct(summary.avg_score),
                pct(self.min_overall)
            ));
        }
        if below(summary.parse_rate, self.min_parse_rate) {
            failures.push(format!(
                "parse rate {} below minimum {}",
                pct(summary.parse_rate),
                pct(self.min_parse_rate)
            ));
        }
        for (cat, min) in &self.categories {
            match summary.by_category.get(cat) {
                Some(c) if below(c.avg_score, *min) => failures.push(format!(
                    "category {cat}: {} below minimum {}",
                    pct(c.avg_score),
                    pct(*min)
                )),
                Some(_) => {}
                None => failures.push(format!("category {cat}: no cases evaluated")),
            }
        }

        for f in &failures {
            warn!(failure = %f, "regression gate");
        }
        GateReport {
            passed: failures.is_empty(),
            failures,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        let config = ThresholdsConfig::default();
        Self {
            min_overall: config.min_overall,
            min_parse_rate: config.min_parse_rate,
            categories: BTreeMap::new(),
        }
    }
}

fn below(value: f64, min: f64) -> bool {
    value + 1e-9 < min
}

pub(crate) fn pct(value: f64) -> String {
    format!("{:.1}%", value * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::CategorySummary;

    fn summary(avg_score: f64, parse_rate: f64) -> RunSummary {
        let mut by_category = BTreeMap::new();
        by_category.insert(
            Category::Complex,
            CategorySummary {
                cases: 6,
                avg_score: 0.75,
            },
        );
        RunSummary {
            cases: 28,
            avg_score,
            avg_latency_ms: 800,
            parse_rate,
            recurring_accuracy: 1.0,
            frequency_accuracy: 1.0,
            wall_clock_accuracy: 1.0,
            needs_clarification: 0,
            fallback_count: 0,
            failed_calls: 0,
            tokens_in: 0,
            tokens_out: 0,
            by_category,
        }
    }

    #[test]
    fn passing_run() {
        let report = Thresholds::default().gate(&summary(0.95, 1.0));
        assert!(report.passed);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn overall_and_parse_rate_failures() {
        let report = Thresholds::default().gate(&summary(0.85, 27.0 / 28.0));
        assert!(!report.passed);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0], "overall score 85.0% below minimum 90.0%");
        assert!(report.failures[1].starts_with("parse rate 96.4%"));
    }

    #[test]
    fn category_minimums() {
        let mut config = ThresholdsConfig::default();
        config.categories.insert("complex".into(), 0.8);
        config.categories.insert("one_time".into(), 0.5);
        let thresholds = Thresholds::from_config(&config).unwrap();

        let report = thresholds.gate(&summary(0.95, 1.0));
        assert_eq!(
            report.failures,
            vec![
                "category complex: 75.0% below minimum 80.0%".to_string(),
                "category one_time: no cases evaluated".to_string(),
            ]
        );
    }

    #[test]
    fn unknown_category_slug_is_rejected() {
        let mut config = ThresholdsConfig::default();
        config.categories.insert("weird".into(), 0.8);
        assert!(Thresholds::from_config(&config).is_err());
    }
}
