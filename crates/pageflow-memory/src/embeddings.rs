use std::time::Duration;

use serde::{Deserialize, Serialize};

use pageflow_core::error::{PageflowError, Result};
use pageflow_core::traits::Embedder;

const OPENAI_EMBEDDINGS_BASE: &str = "https://api.openai.com/v1";

/// HTTP-based embedder compatible with OpenAI, Ollama, etc.
pub struct HttpEmbedder {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dims: usize,
}

impl HttpEmbedder {
    pub fn new(
        base_url: Option<&str>,
        api_key: Option<&str>,
        model: &str,
        dims: usize,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PageflowError::Embedding(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url
                .unwrap_or(OPENAI_EMBEDDINGS_BASE)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.map(String::from),
            model: model.to_string(),
            dims,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url)
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

fn parse_embeddings(body: &str, expected: usize) -> Result<Vec<Vec<f32>>> {
    let parsed: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| PageflowError::Embedding(format!("Failed to parse embedding response: {}", e)))?;
    if parsed.data.len() != expected {
        return Err(PageflowError::Embedding(format!(
            "Expected {} embeddings, got {}",
            expected,
            parsed.data.len()
        )));
    }
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
}

impl Embedder for HttpEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let mut req = self.client.post(self.endpoint()).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });

        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .map_err(|e| PageflowError::Embedding(format!("Embedding request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_default();
            return Err(PageflowError::Embedding(format!(
                "Embedding API error {}: {}",
                status, body
            )));
        }

        let body = resp
            .text()
            .map_err(|e| PageflowError::Embedding(format!("Embedding request failed: {}", e)))?;
        parse_embeddings(&body, texts.len())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Offline embedder: signed feature hashing of lowercase word tokens,
/// L2-normalized. Texts sharing words land close together; nothing leaves
/// the process.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dims];
        for token in tokens(text) {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dims as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }
}

impl Embedder for HashingEmbedder {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

// Stable across platforms and releases, unlike `DefaultHasher`.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 {
        0.0
    } else {
        dot / denom
    }
}
