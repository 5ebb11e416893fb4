use std::collections::BTreeMap;

use cadence_core::Category;
use serde::Serialize;

use crate::record::CaseRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub cases: usize,
    pub avg_score: f64,
}

/// Run-level aggregates over every evaluated case.
///
/// Accuracy figures are taken over the cases where that dimension applied;
/// a dimension that applied nowhere reports 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub cases: usize,
    pub avg_score: f64,
    pub avg_latency_ms: u64,
    pub parse_rate: f64,
    pub recurring_accuracy: f64,
    pub frequency_accuracy: f64,
    pub wall_clock_accuracy: f64,
    pub needs_clarification: usize,
    pub fallback_count: usize,
    pub failed_calls: usize,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub by_category: BTreeMap<Category, CategorySummary>,
}

impl RunSummary {
    pub fn from_records(records: &[CaseRecord]) -> Self {
        let n = records.len();

        let mut categories: BTreeMap<Category, (usize, f64)> = BTreeMap::new();
        for r in records {
            let entry = categories.entry(r.category).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += r.score;
        }
        let by_category = categories
            .into_iter()
            .map(|(cat, (cases, total))| {
                (
                    cat,
                    CategorySummary {
                        cases,
                        avg_score: total / cases as f64,
                    },
                )
            })
            .collect();

        Self {
            cases: n,
            avg_score: mean(records.iter().map(|r| r.score), n),
            avg_latency_ms: if n == 0 {
                0
            } else {
                let total: u64 = records.iter().map(|r| r.latency_ms).sum();
                (total as f64 / n as f64).round() as u64
            },
            parse_rate: ratio(records.iter().filter(|r| r.outcome.parseable).count(), n),
            recurring_accuracy: accuracy(records.iter().map(|r| r.outcome.recurring)),
            frequency_accuracy: accuracy(records.iter().map(|r| r.outcome.frequency)),
            wall_clock_accuracy: accuracy(records.iter().map(|r| r.outcome.wall_clock)),
            needs_clarification: records.iter().filter(|r| r.needs_clarification()).count(),
            fallback_count: records.iter().filter(|r| r.fallback_used).count(),
            failed_calls: records.iter().filter(|r| r.error.is_some()).count(),
            tokens_in: records.iter().map(|r| u64::from(r.tokens.input)).sum(),
            tokens_out: records.iter().map(|r| u64::from(r.tokens.output)).sum(),
            by_category,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

fn ratio(hits: usize, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        hits as f64 / n as f64
    }
}

fn accuracy(values: impl Iterator<Item = Option<bool>>) -> f64 {
    let (mut applicable, mut correct) = (0, 0);
    for v in values.flatten() {
        applicable += 1;
        if v {
            correct += 1;
        }
    }
    ratio(correct, applicable)
}
