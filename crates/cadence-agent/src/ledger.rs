//! Per-generator usage ledger, fed by real calls only.
//!
//! Records successes, failures, rate-limit hits, latency and token usage for
//! each generator label. Snapshots go into evaluation reports.

use std::sync::Arc;
use std::time::Duration;

use cadence_core::TokenUsage;
use dashmap::DashMap;
use serde::Serialize;

use crate::generator::GenerationError;

/// Public snapshot of one generator's usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratorUsage {
    pub name: String,
    pub calls_ok: u32,
    pub calls_err: u32,
    pub rate_limited: u32,
    pub avg_latency_ms: u64,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<i64>,
}

#[derive(Default)]
struct InternalEntry {
    calls_ok: u32,
    calls_err: u32,
    rate_limited: u32,
    total_latency_ms: u64,
    tokens_in: u64,
    tokens_out: u64,
    last_error: Option<String>,
    last_error_at: Option<i64>,
}

impl InternalEntry {
    fn avg_latency_ms(&self) -> u64 {
        if self.calls_ok == 0 {
            return 0;
        }
        self.total_latency_ms / u64::from(self.calls_ok)
    }

    fn to_usage(&self, name: &str) -> GeneratorUsage {
        GeneratorUsage {
            name: name.to_string(),
            calls_ok: self.calls_ok,
            calls_err: self.calls_err,
            rate_limited: self.rate_limited,
            avg_latency_ms: self.avg_latency_ms(),
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            last_error: self.last_error.clone(),
            last_error_at: self.last_error_at,
        }
    }
}

/// Concurrent ledger shared by every pipeline in a run.
#[derive(Default)]
pub struct UsageLedger {
    entries: DashMap<String, InternalEntry>,
}

impl UsageLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_success(&self, generator: &str, latency: Duration, usage: TokenUsage) {
        let mut entry = self.entries.entry(generator.to_string()).or_default();
        entry.calls_ok += 1;
        entry.total_latency_ms += latency.as_millis() as u64;
        entry.tokens_in += u64::from(usage.input);
        entry.tokens_out += u64::from(usage.output);
    }

    pub fn record_error(&self, generator: &str, error: &GenerationError) {
        let mut entry = self.entries.entry(generator.to_string()).or_default();
        if error.is_transient() {
            entry.rate_limited += 1;
        } else {
            entry.calls_err += 1;
        }
        entry.last_error = Some(error.to_string());
        entry.last_error_at = Some(chrono::Utc::now().timestamp());
    }

    /// Snapshot of every generator seen so far, sorted by name.
    pub fn snapshot(&self) -> Vec<GeneratorUsage> {
        let mut all: Vec<GeneratorUsage> = self
            .entries
            .iter()
            .map(|e| e.value().to_usage(e.key()))
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// One line per generator, for plain-text reports.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for u in self.snapshot() {
            out.push_str(&format!(
                "- {}: {} ok, {} failed, {} rate-limited, avg {}ms, {} tokens in / {} out\n",
                u.name, u.calls_ok, u.calls_err, u.rate_limited, u.avg_latency_ms, u.tokens_in, u.tokens_out
            ));
        }
        out
    }
}
