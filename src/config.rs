use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for one agent run (and, with a reduced iteration budget,
/// its delegated child runs).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Model identifier passed to the provider. `None` uses the provider's
    /// default model.
    #[serde(default)]
    pub model: Option<String>,

    /// Tool results larger than this (in characters) are evicted out of the
    /// conversation into the virtual filesystem.
    #[serde(default = "default_eviction_threshold", rename = "evictionThresholdChars")]
    pub eviction_threshold_chars: usize,

    /// Approximate token count above which old history is summarized.
    #[serde(default = "default_summary_trigger", rename = "summaryTriggerTokens")]
    pub summary_trigger_tokens: usize,

    /// Number of most recent messages kept verbatim through summarization.
    #[serde(default = "default_messages_to_keep", rename = "messagesToKeep")]
    pub messages_to_keep: usize,

    #[serde(default = "default_max_iterations", rename = "maxIterations")]
    pub max_iterations: usize,

    #[serde(default = "default_max_depth", rename = "maxSubagentDepth")]
    pub max_subagent_depth: usize,

    /// Iteration budget for delegated child runs, smaller than the parent's.
    #[serde(default = "default_subagent_iterations", rename = "maxIterationsPerSubagent")]
    pub max_iterations_per_subagent: usize,

    /// Turns without a plan item completing before a stagnation advisory is
    /// injected.
    #[serde(default = "default_stagnation_turns", rename = "stagnationTurnsThreshold")]
    pub stagnation_turns_threshold: usize,

    /// Consecutive tool calls without a plan item completing before a
    /// stagnation advisory is injected.
    #[serde(default = "default_stagnation_tool_calls", rename = "stagnationToolCallsThreshold")]
    pub stagnation_tool_calls_threshold: usize,

    /// Identical back-to-back tool-call signatures before a stagnation
    /// advisory is injected.
    #[serde(default = "default_same_signature", rename = "sameSignatureThreshold")]
    pub same_signature_threshold: usize,

    #[serde(default = "default_model_timeout", rename = "modelTimeoutSecs")]
    pub model_timeout_secs: u64,

    #[serde(default = "default_tool_timeout", rename = "toolTimeoutSecs")]
    pub tool_timeout_secs: u64,

    #[serde(default = "default_max_tokens", rename = "maxTokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_eviction_threshold() -> usize {
    80_000
}

fn default_summary_trigger() -> usize {
    170_000
}

fn default_messages_to_keep() -> usize {
    6
}

fn default_max_iterations() -> usize {
    100
}

fn default_max_depth() -> usize {
    2
}

fn default_subagent_iterations() -> usize {
    50
}

fn default_stagnation_turns() -> usize {
    2
}

fn default_stagnation_tool_calls() -> usize {
    10
}

fn default_same_signature() -> usize {
    3
}

fn default_model_timeout() -> u64 {
    120
}

fn default_tool_timeout() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            model: None,
            eviction_threshold_chars: default_eviction_threshold(),
            summary_trigger_tokens: default_summary_trigger(),
            messages_to_keep: default_messages_to_keep(),
            max_iterations: default_max_iterations(),
            max_subagent_depth: default_max_depth(),
            max_iterations_per_subagent: default_subagent_iterations(),
            stagnation_turns_threshold: default_stagnation_turns(),
            stagnation_tool_calls_threshold: default_stagnation_tool_calls(),
            same_signature_threshold: default_same_signature(),
            model_timeout_secs: default_model_timeout(),
            tool_timeout_secs: default_tool_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            retry: RetryConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Configuration for provider retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries", rename = "maxRetries")]
    pub max_retries: usize,
    #[serde(default = "default_initial_delay", rename = "initialDelayMs")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay", rename = "maxDelayMs")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier", rename = "backoffMultiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_delay() -> u64 {
    1000
}

fn default_max_delay() -> u64 {
    10000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_multiplier(),
        }
    }
}
