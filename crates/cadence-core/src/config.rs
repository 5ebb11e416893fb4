use std::collections::BTreeMap;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_OPENAI_MAX_IN_FLIGHT: usize = 5;
pub const DEFAULT_ANTHROPIC_MAX_IN_FLIGHT: usize = 2; // stricter org rate limit
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 15_000;

/// Top-level config (cadence.toml + CADENCE_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub eval: EvalConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub openai: Option<OpenAiConfig>,
    pub anthropic: Option<AnthropicConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Concurrent requests allowed against this backend.
    #[serde(default = "default_openai_max_in_flight")]
    pub max_in_flight: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    #[serde(default = "default_anthropic_base_url")]
    pub base_url: String,
    #[serde(default = "default_anthropic_max_in_flight")]
    pub max_in_flight: usize,
}

/// Which backend a generator tier talks to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::OpenAi => write!(f, "openai"),
            ProviderKind::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// One generator tier: backend + model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub provider: ProviderKind,
    pub model: String,
    /// Display label in logs and reports. Defaults to the model id.
    pub label: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl GeneratorConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.model)
    }
}

/// Cheap primary tier and the costlier fallback it escalates to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_primary")]
    pub primary: GeneratorConfig,
    #[serde(default = "default_fallback")]
    pub fallback: GeneratorConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            fallback: default_fallback(),
        }
    }
}

/// Local retry for rate-limited generator calls.
/// Delay before retry `i` (0-based) is `base_delay_ms * (i + 1)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub thresholds: ThresholdsConfig,
}

/// Relative weight of each validation dimension. Empirical defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub recurring: f64,
    pub parseable: f64,
    pub frequency: f64,
    pub wall_clock: f64,
    pub interval: f64,
    pub weekdays: f64,
    pub month_days: f64,
    pub set_positions: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            recurring: 20.0,
            parseable: 20.0,
            frequency: 15.0,
            wall_clock: 15.0,
            interval: 10.0,
            weekdays: 10.0,
            month_days: 5.0,
            set_positions: 5.0,
        }
    }
}

/// Pass/fail gate for regression runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdsConfig {
    pub min_overall: f64,
    pub min_parse_rate: f64,
    /// Per-category minimum average score, keyed by category slug.
    pub categories: BTreeMap<String, f64>,
}

impl Default for ThresholdsConfig {
    fn default() -> Self {
        Self {
            min_overall: 0.9,
            min_parse_rate: 1.0,
            categories: BTreeMap::new(),
        }
    }
}

/// Generators evaluated on their own, next to the pipeline, for comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default = "default_eval_models")]
    pub models: Vec<GeneratorConfig>,
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            models: default_eval_models(),
        }
    }
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}
fn default_anthropic_base_url() -> String {
    DEFAULT_ANTHROPIC_BASE_URL.to_string()
}
fn default_openai_max_in_flight() -> usize {
    DEFAULT_OPENAI_MAX_IN_FLIGHT
}
fn default_anthropic_max_in_flight() -> usize {
    DEFAULT_ANTHROPIC_MAX_IN_FLIGHT
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_retry_attempts() -> u32 {
    DEFAULT_RETRY_ATTEMPTS
}
fn default_retry_base_delay_ms() -> u64 {
    DEFAULT_RETRY_BASE_DELAY_MS
}
fn default_primary() -> GeneratorConfig {
    GeneratorConfig {
        provider: ProviderKind::Anthropic,
        model: "claude-haiku-4-5-20251001".to_string(),
        label: Some("claude-haiku-4-5".to_string()),
        max_tokens: default_max_tokens(),
    }
}
fn default_eval_models() -> Vec<GeneratorConfig> {
    let model = |provider, id: &str, label: &str| GeneratorConfig {
        provider,
        model: id.to_string(),
        label: Some(label.to_string()),
        max_tokens: default_max_tokens(),
    };
    vec![
        model(ProviderKind::OpenAi, "gpt-5-nano", "gpt-5-nano"),
        model(ProviderKind::OpenAi, "gpt-5-mini", "gpt-5-mini"),
        model(ProviderKind::Anthropic, "claude-haiku-4-5-20251001", "claude-haiku-4-5"),
    ]
}
fn default_fallback() -> GeneratorConfig {
    GeneratorConfig {
        provider: ProviderKind::OpenAi,
        model: "gpt-5-mini".to_string(),
        label: Some("gpt-5-mini (fallback)".to_string()),
        max_tokens: default_max_tokens(),
    }
}

impl CadenceConfig {
    /// Load config from a TOML file with CADENCE_* env var overrides.
    ///
    /// Checks in order:
    ///   1. Explicit path argument
    ///   2. ~/.cadence/cadence.toml
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Self::figment(&path)
            .extract()
            .map_err(|e| crate::error::CadenceError::Config(e.to_string()))
    }

    fn figment(path: &str) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed("CADENCE_").split("__"))
    }

    /// Concurrency bound for the given backend.
    pub fn max_in_flight(&self, kind: ProviderKind) -> usize {
        match kind {
            ProviderKind::OpenAi => self
                .providers
                .openai
                .as_ref()
                .map(|c| c.max_in_flight)
                .unwrap_or(DEFAULT_OPENAI_MAX_IN_FLIGHT),
            ProviderKind::Anthropic => self
                .providers
                .anthropic
                .as_ref()
                .map(|c| c.max_in_flight)
                .unwrap_or(DEFAULT_ANTHROPIC_MAX_IN_FLIGHT),
        }
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.cadence/cadence.toml", home)
}
