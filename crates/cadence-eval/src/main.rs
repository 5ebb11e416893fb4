use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use cadence_agent::anthropic::AnthropicProvider;
use cadence_agent::openai::OpenAiProvider;
use cadence_agent::{EscalationPipeline, LlmGenerator, LlmProvider, RecurrenceGenerator, RetryPolicy, UsageLedger};
use cadence_core::config::{GeneratorConfig, ProviderKind};
use cadence_core::time::parse_timezone;
use cadence_core::{CadenceConfig, TestCase};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::report::{ConfigKind, ConfigRun, EvalReport};
use crate::scoring::ScoringEngine;

mod cases;
mod check;
mod gate;
mod record;
mod report;
mod runner;
mod scoring;
mod summary;

#[derive(Parser)]
#[command(name = "cadence-eval")]
#[command(about = "Natural-language recurrence generation: evaluation and rule checks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run each configured model alone, then the escalation pipeline, over a
    /// fixture set and write a comparison report
    Run {
        /// Config file (defaults to $CADENCE_CONFIG, then ~/.cadence/cadence.toml)
        #[arg(long)]
        config: Option<String>,
        /// JSON fixture file (defaults to the built-in set)
        #[arg(long)]
        cases: Option<PathBuf>,
        /// Output directory for results-<ts>.json and report-<ts>.txt
        #[arg(long, default_value = "results")]
        out: PathBuf,
        /// Pipeline label in the report (defaults to "<primary> -> <fallback>")
        #[arg(long)]
        label: Option<String>,
        /// Skip the standalone runs of `eval.models`
        #[arg(long)]
        pipeline_only: bool,
    },
    /// Parse a rule offline and print its next occurrences
    Check {
        /// DTSTART + RRULE text; literal \n separators are accepted
        #[arg(long)]
        rule: String,
        /// IANA timezone to display wall-clock times in
        #[arg(long)]
        tz: String,
        /// Start listing at local midnight of this date
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(short = 'n', long, default_value = "5")]
        count: usize,
    },
    /// List the built-in fixture cases
    Cases,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cadence_eval=info,cadence_agent=info".into()),
        )
        .init();

    match Cli::parse().command {
        Command::Run {
            config,
            cases,
            out,
            label,
            pipeline_only,
        } => run(config, cases, out, label, pipeline_only).await,
        Command::Check {
            rule,
            tz,
            from,
            count,
        } => {
            let tz = parse_timezone(&tz)?;
            for line in check::upcoming(&rule, tz, from, count)? {
                println!("{line}");
            }
            Ok(())
        }
        Command::Cases => {
            for c in cases::builtin()? {
                println!(
                    "#{:<3} [{:<9}] {:<14} {}  \"{}\"",
                    c.id,
                    c.category.as_str(),
                    c.request.timezone.name(),
                    c.request.reference_date,
                    c.request.message
                );
            }
            Ok(())
        }
    }
}

async fn run(
    config_path: Option<String>,
    cases_path: Option<PathBuf>,
    out: PathBuf,
    label: Option<String>,
    pipeline_only: bool,
) -> anyhow::Result<()> {
    // load config: explicit path > CADENCE_CONFIG env > ~/.cadence/cadence.toml
    let config_path = config_path.or_else(|| std::env::var("CADENCE_CONFIG").ok());
    let config = CadenceConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        CadenceConfig::default()
    });

    let cases = cases::load(cases_path.as_deref())?;
    let thresholds = gate::Thresholds::from_config(&config.scoring.thresholds)?;
    let retry = RetryPolicy::from_config(&config.retry);
    let engine = ScoringEngine::new(config.scoring.weights);

    let models: &[GeneratorConfig] = if pipeline_only { &[] } else { &config.eval.models };
    let label = label.unwrap_or_else(|| {
        format!(
            "{} -> {}",
            config.pipeline.primary.label(),
            config.pipeline.fallback.label()
        )
    });
    let mut seen = BTreeSet::new();
    for l in models.iter().map(|m| m.label()).chain([label.as_str()]) {
        if !seen.insert(l) {
            bail!("duplicate config label {l:?}; set a distinct label");
        }
    }

    let mut runs = Vec::with_capacity(models.len() + 1);
    for model in models {
        let ledger = UsageLedger::new();
        let generator = build_generator(&config, model)?;
        let pipeline = EscalationPipeline::single(generator, retry, Arc::clone(&ledger));
        // each backend gets its own rate limit
        let max_in_flight = config.max_in_flight(model.provider);
        info!(config = model.label(), max_in_flight, "standalone run");
        let records = run_config(pipeline, engine, max_in_flight, &cases).await;
        runs.push(ConfigRun::new(model.label(), ConfigKind::Model, records, ledger.snapshot()));
    }

    let ledger = UsageLedger::new();
    let pipeline = EscalationPipeline::new(
        build_generator(&config, &config.pipeline.primary)?,
        build_generator(&config, &config.pipeline.fallback)?,
        retry,
        Arc::clone(&ledger),
    );
    // the primary backend's rate limit is the bottleneck
    let max_in_flight = config.max_in_flight(config.pipeline.primary.provider);
    info!(config = %label, max_in_flight, "pipeline run");
    let records = run_config(pipeline, engine, max_in_flight, &cases).await;
    runs.push(ConfigRun::new(label, ConfigKind::Pipeline, records, ledger.snapshot()));

    let report = EvalReport::new(runs, &thresholds);
    print!("{}", report.render_text());
    let (json_path, text_path) = report.write(&out)?;
    info!(json = %json_path.display(), text = %text_path.display(), "report written");

    if !report.gate.passed {
        bail!("regression gate failed");
    }
    Ok(())
}

async fn run_config(
    pipeline: EscalationPipeline,
    engine: ScoringEngine,
    max_in_flight: usize,
    cases: &[TestCase],
) -> Vec<record::CaseRecord> {
    runner::Runner::new(Arc::new(pipeline), engine, max_in_flight)
        .run(cases)
        .await
}

/// Build one generator tier from config.
///
/// Credentials come from `providers.<kind>` or, when that section is absent,
/// from OPENAI_API_KEY / ANTHROPIC_API_KEY.
fn build_generator(
    config: &CadenceConfig,
    tier: &GeneratorConfig,
) -> anyhow::Result<Arc<dyn RecurrenceGenerator>> {
    let provider: Box<dyn LlmProvider> = match tier.provider {
        ProviderKind::OpenAi => {
            let (api_key, base_url) = match config.providers.openai {
                Some(ref openai) => (openai.api_key.clone(), Some(openai.base_url.clone())),
                None => (env_key("OPENAI_API_KEY")?, None),
            };
            Box::new(OpenAiProvider::new(api_key, base_url))
        }
        ProviderKind::Anthropic => {
            let (api_key, base_url) = match config.providers.anthropic {
                Some(ref anthropic) => (anthropic.api_key.clone(), Some(anthropic.base_url.clone())),
                None => (env_key("ANTHROPIC_API_KEY")?, None),
            };
            Box::new(AnthropicProvider::new(api_key, base_url))
        }
    };

    info!(
        "generator {}: {} model {} (max {} in flight)",
        tier.label(),
        tier.provider,
        tier.model,
        config.max_in_flight(tier.provider)
    );
    Ok(Arc::new(LlmGenerator::new(provider, tier)))
}

fn env_key(var: &str) -> anyhow::Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => bail!("no credentials: configure the provider section or set {var}"),
    }
}
