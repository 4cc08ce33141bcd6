use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PageflowError, Result};

/// Top-level pageflow configuration.
///
/// Every section has defaults, so an empty file (or no file at all) is a
/// valid configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub retrieval: Option<RetrievalConfig>,
    #[serde(default)]
    pub refinement: Option<RefinementConfig>,
    #[serde(default)]
    pub templates: TemplateSet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Hard ceiling on node executions per run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    /// Critique rejects runs with fewer QA items than this.
    #[serde(default = "default_min_qa_items")]
    pub min_qa_items: usize,
    /// The QA generator pads its output up to this many items.
    #[serde(default = "default_target_qa_items")]
    pub target_qa_items: usize,
    /// Block ids the critique requires.
    #[serde(default = "default_required_blocks")]
    pub required_blocks: Vec<String>,
    /// Rejections tolerated before the run ends unresolved.
    #[serde(default = "default_max_revisions")]
    pub max_revisions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            min_qa_items: default_min_qa_items(),
            target_qa_items: default_target_qa_items(),
            required_blocks: default_required_blocks(),
            max_revisions: default_max_revisions(),
        }
    }
}

fn default_max_steps() -> usize { 200 }
fn default_min_qa_items() -> usize { 10 }
fn default_target_qa_items() -> usize { 15 }
fn default_max_revisions() -> usize { 3 }
fn default_required_blocks() -> Vec<String> {
    vec!["benefits_block".to_string(), "usage_block".to_string()]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving run documents and the latest-run pointer.
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> String { "outputs".to_string() }

/// Optional semantic retrieval over generated content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `local` (hashing embedder, no network) or `http` (OpenAI-compatible embeddings API).
    #[serde(default = "default_retrieval_provider")]
    pub provider: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Query run against the freshly built index during a pipeline run.
    #[serde(default = "default_probe_query")]
    pub probe_query: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_retrieval_provider(),
            base_url: None,
            api_key: None,
            model: default_embedding_model(),
            dimensions: default_dimensions(),
            top_k: default_top_k(),
            probe_query: default_probe_query(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_true() -> bool { true }
fn default_retrieval_provider() -> String { "local".to_string() }
fn default_embedding_model() -> String { "text-embedding-3-small".to_string() }
fn default_dimensions() -> usize { 256 }
fn default_top_k() -> usize { 3 }
fn default_probe_query() -> String { "How to use the product?".to_string() }
fn default_timeout_secs() -> u64 { 30 }

/// Optional LLM answer refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model_id: default_model_id(),
            api_key: None,
            base_url: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl RefinementConfig {
    /// An API key that is present and not an unexpanded `${VAR}` reference.
    pub fn usable_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty() && !k.starts_with("${"))
    }
}

fn default_provider() -> String { "openai".to_string() }
fn default_model_id() -> String { "gpt-4o-mini".to_string() }
fn default_max_tokens() -> u32 { 150 }

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_retries() -> u32 { 2 }
fn default_initial_backoff_ms() -> u64 { 500 }
fn default_max_backoff_ms() -> u64 { 5_000 }

/// Layout of one output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub title: String,
    #[serde(default)]
    pub sections: Vec<String>,
    #[serde(default)]
    pub include_faq: bool,
}

/// Templates for the three document variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateSet {
    #[serde(default = "default_product_template")]
    pub product: TemplateConfig,
    #[serde(default = "default_faq_template")]
    pub faq: TemplateConfig,
    #[serde(default = "default_comparison_template")]
    pub comparison: TemplateConfig,
}

impl Default for TemplateSet {
    fn default() -> Self {
        Self {
            product: default_product_template(),
            faq: default_faq_template(),
            comparison: default_comparison_template(),
        }
    }
}

fn default_product_template() -> TemplateConfig {
    TemplateConfig {
        title: "{{product.name}}".to_string(),
        sections: vec![
            "benefits_block".to_string(),
            "ingredients_block".to_string(),
            "usage_block".to_string(),
        ],
        include_faq: false,
    }
}

fn default_faq_template() -> TemplateConfig {
    TemplateConfig {
        title: "FAQ - {{product.name}}".to_string(),
        sections: vec![],
        include_faq: true,
    }
}

fn default_comparison_template() -> TemplateConfig {
    TemplateConfig {
        title: "Comparison - {{product.name}} vs Fictional".to_string(),
        sections: vec!["ingredients_block".to_string()],
        include_faq: false,
    }
}

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| PageflowError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Parse TOML text, expanding `${ENV_VAR}` references first.
    pub fn parse(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded).map_err(|e| PageflowError::ConfigFile(e.to_string()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Apply environment-driven switches.
    ///
    /// `OPENAI_API_KEY` turns refinement on when no `[refinement]` section
    /// exists, and fills in a missing key when one does.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if key.is_empty() {
                return;
            }
            match self.refinement {
                Some(ref mut refinement) if refinement.usable_api_key().is_none() => {
                    refinement.api_key = Some(key);
                }
                Some(_) => {}
                None => {
                    self.refinement = Some(RefinementConfig {
                        api_key: Some(key),
                        ..RefinementConfig::default()
                    });
                }
            }
        }
    }

    /// Turn retrieval on, keeping any configured settings.
    pub fn enable_retrieval(&mut self) {
        match self.retrieval {
            Some(ref mut retrieval) => retrieval.enabled = true,
            None => self.retrieval = Some(RetrievalConfig::default()),
        }
    }

    pub fn retrieval_enabled(&self) -> bool {
        self.retrieval.as_ref().is_some_and(|r| r.enabled)
    }

    pub fn output_dir(&self) -> PathBuf {
        let dir = &self.output.dir;
        if let Some(rest) = dir.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(dir)
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                Err(_) => {
                    // Keep original if env var not set
                    result.push_str(&format!("${{{}}}", var_name));
                }
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("TEST_PAGEFLOW_VAR", "hello");
        let result = expand_env_vars("key = \"${TEST_PAGEFLOW_VAR}\"");
        assert_eq!(result, "key = \"hello\"");
        std::env::remove_var("TEST_PAGEFLOW_VAR");
    }

    #[test]
    fn test_expand_env_vars_missing() {
        let result = expand_env_vars("key = \"${NONEXISTENT_PAGEFLOW_VAR}\"");
        assert_eq!(result, "key = \"${NONEXISTENT_PAGEFLOW_VAR}\"");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::parse("").unwrap();
        assert_eq!(config.pipeline.max_steps, 200);
        assert_eq!(config.pipeline.min_qa_items, 10);
        assert_eq!(config.pipeline.target_qa_items, 15);
        assert_eq!(config.pipeline.max_revisions, 3);
        assert_eq!(
            config.pipeline.required_blocks,
            vec!["benefits_block", "usage_block"]
        );
        assert_eq!(config.output.dir, "outputs");
        assert!(config.retrieval.is_none());
        assert!(config.refinement.is_none());
        assert_eq!(config.templates, TemplateSet::default());
    }

    #[test]
    fn test_partial_sections_fill_defaults() {
        let toml_str = r#"
[pipeline]
min_qa_items = 12

[retrieval]
top_k = 5

[refinement]
model_id = "gpt-4o"

[templates.faq]
title = "Questions about {{product.name}}"
include_faq = true
"#;
        let config = AppConfig::parse(toml_str).unwrap();
        assert_eq!(config.pipeline.min_qa_items, 12);
        assert_eq!(config.pipeline.max_steps, 200);

        let retrieval = config.retrieval.as_ref().unwrap();
        assert!(retrieval.enabled);
        assert_eq!(retrieval.provider, "local");
        assert_eq!(retrieval.top_k, 5);
        assert!(config.retrieval_enabled());

        let refinement = config.refinement.as_ref().unwrap();
        assert_eq!(refinement.model_id, "gpt-4o");
        assert_eq!(refinement.max_tokens, 150);
        assert_eq!(refinement.retry.max_retries, 2);

        assert_eq!(config.templates.faq.title, "Questions about {{product.name}}");
        assert!(config.templates.faq.sections.is_empty());
        assert_eq!(config.templates.product.title, "{{product.name}}");
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = AppConfig::parse("[pipeline\nmax_steps = ").unwrap_err();
        assert!(matches!(err, PageflowError::ConfigFile(_)));
    }

    #[test]
    fn test_usable_api_key_rejects_placeholder() {
        let mut refinement = RefinementConfig::default();
        assert!(refinement.usable_api_key().is_none());
        refinement.api_key = Some("${MISSING_KEY}".into());
        assert!(refinement.usable_api_key().is_none());
        refinement.api_key = Some("sk-test".into());
        assert_eq!(refinement.usable_api_key(), Some("sk-test"));
    }

    #[test]
    fn test_enable_retrieval_keeps_settings() {
        let mut config = AppConfig::parse("[retrieval]\nenabled = false\ntop_k = 7\n").unwrap();
        assert!(!config.retrieval_enabled());
        config.enable_retrieval();
        assert!(config.retrieval_enabled());
        assert_eq!(config.retrieval.unwrap().top_k, 7);

        let mut bare = AppConfig::default();
        bare.enable_retrieval();
        assert!(bare.retrieval_enabled());
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let mut config = AppConfig::default();
        config.enable_retrieval();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed = AppConfig::parse(&text).unwrap();
        assert_eq!(parsed.templates, config.templates);
        assert!(parsed.retrieval_enabled());
    }
}
