//! Typed configuration surface. The loader that turns a file + environment
//! into one of these lives in `taskweave-runtime` (it needs the `config`
//! crate, which the kernel does not depend on); this module only defines
//! the shape and its defaults.

use serde::{Deserialize, Serialize};

fn default_provider() -> String {
    "openai-compatible".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

/// One tier's provider configuration (`{simple,medium,complex}` in the
/// external config surface).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TierConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model_id: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default)]
    pub keep_alive: Option<String>,
}

impl Default for TierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model_id: String::new(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_ms: default_timeout_ms(),
            keep_alive: None,
        }
    }
}

fn default_max_attempts() -> u32 {
    5
}

fn default_tree_creation_timeout_ms() -> u64 {
    60_000
}

fn default_publisher_buffer_size() -> usize {
    10
}

/// Root configuration: one [`TierConfig`] per complexity tier plus
/// planner/executor knobs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    pub simple: TierConfig,
    pub medium: TierConfig,
    pub complex: TierConfig,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_tree_creation_timeout_ms")]
    pub tree_creation_timeout_ms: u64,
    #[serde(default = "default_publisher_buffer_size")]
    pub publisher_buffer_size: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            simple: TierConfig::default(),
            medium: TierConfig::default(),
            complex: TierConfig::default(),
            max_attempts: default_max_attempts(),
            tree_creation_timeout_ms: default_tree_creation_timeout_ms(),
            publisher_buffer_size: default_publisher_buffer_size(),
        }
    }
}
