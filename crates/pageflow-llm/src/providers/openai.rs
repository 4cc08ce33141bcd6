use std::time::Duration;

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pageflow_core::config::RefinementConfig;
use pageflow_core::error::{PageflowError, Result};
use pageflow_core::traits::Refiner;
use pageflow_core::types::Product;

use super::presets::get_preset;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Answer refiner over an OpenAI-compatible chat completions endpoint.
/// Works with OpenAI, Ollama, Groq, OpenRouter, etc.
pub struct OpenAiRefiner {
    http: Client,
    url: String,
    api_key: Option<String>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    extra_headers: Vec<(String, String)>,
}

impl OpenAiRefiner {
    pub fn new(config: &RefinementConfig) -> Result<Self> {
        let preset = get_preset(&config.provider);
        let url = config
            .base_url
            .clone()
            .or_else(|| preset.as_ref().map(|p| p.default_base_url.to_string()))
            .unwrap_or_else(|| OPENAI_API_URL.to_string());
        let extra_headers = preset
            .map(|p| {
                p.extra_headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            })
            .unwrap_or_default();

        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PageflowError::LlmRequest(e.to_string()))?;

        Ok(Self {
            http,
            url,
            api_key: config.usable_api_key().map(String::from),
            model: config.model_id.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            extra_headers,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body(&self, question: &str, answer: &str, product: &Product) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![OaiMessage {
                role: "user".to_string(),
                content: refine_prompt(question, answer, product),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: false,
        }
    }
}

// Request types
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<OaiMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Serialize)]
struct OaiMessage {
    role: String,
    content: String,
}

// Response types
#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

fn refine_prompt(question: &str, answer: &str, product: &Product) -> String {
    format!(
        "Rephrase the answer concisely and clearly. Context product: {}. \
         Question: {}\nExisting answer: {}\nRefined answer:",
        product.name, question, answer
    )
}

/// Pull the refined answer out of a completions response body.
/// An empty or whitespace-only answer reads as "no refinement".
fn parse_response(body: &str) -> Result<Option<String>> {
    let parsed: ChatResponse =
        serde_json::from_str(body).map_err(|e| PageflowError::LlmParse(e.to_string()))?;
    let text = parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    Ok(text)
}

impl Refiner for OpenAiRefiner {
    fn refine(&self, question: &str, answer: &str, product: &Product) -> Result<Option<String>> {
        let body = self.request_body(question, answer, product);
        let mut req = self.http.post(&self.url).json(&body);

        if let Some(api_key) = &self.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }
        for (k, v) in &self.extra_headers {
            req = req.header(k.as_str(), v.as_str());
        }

        let response = req
            .send()
            .map_err(|e| PageflowError::LlmRequest(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_else(|_| "unknown".to_string());
            return Err(PageflowError::LlmRequest(format!("HTTP {}: {}", status, body)));
        }

        let text = response
            .text()
            .map_err(|e| PageflowError::LlmRequest(e.to_string()))?;
        let refined = parse_response(&text)?;
        debug!(model = %self.model, refined = refined.is_some(), "Refinement response");
        Ok(refined)
    }

    fn label(&self) -> String {
        format!("openai-compatible:{}", self.model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_test_utils::sample_product;

    fn config() -> RefinementConfig {
        RefinementConfig {
            api_key: Some("sk-test".to_string()),
            ..RefinementConfig::default()
        }
    }

    #[test]
    fn test_request_body_shape() {
        let refiner = OpenAiRefiner::new(&config()).unwrap();
        let body = refiner.request_body("What is the price?", "₹699", &sample_product());
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["max_tokens"], 150);
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
        let prompt = json["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("Context product: GlowBoost Vitamin C Serum."));
        assert!(prompt.contains("Existing answer: ₹699"));
        assert!(prompt.ends_with("Refined answer:"));
    }

    #[test]
    fn test_url_from_preset_and_override() {
        assert_eq!(OpenAiRefiner::new(&config()).unwrap().url(), OPENAI_API_URL);

        let ollama = RefinementConfig {
            provider: "ollama".to_string(),
            ..config()
        };
        assert!(OpenAiRefiner::new(&ollama).unwrap().url().contains("11434"));

        let custom = RefinementConfig {
            base_url: Some("http://127.0.0.1:9999/v1/chat/completions".to_string()),
            ..config()
        };
        assert_eq!(
            OpenAiRefiner::new(&custom).unwrap().url(),
            "http://127.0.0.1:9999/v1/chat/completions"
        );
    }

    #[test]
    fn test_parse_response_trims() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"  Costs ₹699.  "}}]}"#;
        assert_eq!(parse_response(body).unwrap().as_deref(), Some("Costs ₹699."));
    }

    #[test]
    fn test_parse_response_empty_is_none() {
        assert_eq!(parse_response(r#"{"choices":[{"message":{"content":"   "}}]}"#).unwrap(), None);
        assert_eq!(parse_response(r#"{"choices":[]}"#).unwrap(), None);
        assert_eq!(parse_response(r#"{"choices":[{"message":{}}]}"#).unwrap(), None);
    }

    #[test]
    fn test_parse_response_malformed() {
        let err = parse_response("not json").unwrap_err();
        assert!(matches!(err, PageflowError::LlmParse(_)));
    }

    #[test]
    fn test_unreachable_endpoint_is_request_error() {
        let cfg = RefinementConfig {
            base_url: Some("http://127.0.0.1:1/v1/chat/completions".to_string()),
            timeout_secs: 2,
            ..config()
        };
        let err = OpenAiRefiner::new(&cfg)
            .unwrap()
            .refine("q", "a", &sample_product())
            .unwrap_err();
        assert!(matches!(err, PageflowError::LlmRequest(_)));
    }
}
