//! Fixtures and mock collaborators shared by the pageflow test suites.

use std::collections::HashSet;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use pageflow_core::error::{PageflowError, Result};
use pageflow_core::traits::{Refiner, Retriever};
use pageflow_core::types::{Product, RawInput};

/// The GlowBoost serum record used across tests.
pub fn sample_raw_input() -> RawInput {
    let value = serde_json::json!({
        "Product Name": "GlowBoost Vitamin C Serum",
        "Concentration": "10% Vitamin C",
        "Skin Type": "Oily, Combination",
        "Key Ingredients": "Vitamin C, Hyaluronic Acid",
        "Benefits": "Brightening, Fades dark spots",
        "How to Use": "Apply 2-3 drops in the morning before sunscreen",
        "Side Effects": "Mild tingling for sensitive skin",
        "Price": "₹699"
    });
    match value {
        serde_json::Value::Object(map) => map,
        _ => RawInput::new(),
    }
}

/// [`sample_raw_input`] already parsed.
pub fn sample_product() -> Product {
    Product {
        name: "GlowBoost Vitamin C Serum".to_string(),
        concentration: Some("10% Vitamin C".to_string()),
        skin_type: vec!["Oily".to_string(), "Combination".to_string()],
        key_ingredients: vec!["Vitamin C".to_string(), "Hyaluronic Acid".to_string()],
        benefits: vec!["Brightening".to_string(), "Fades dark spots".to_string()],
        how_to_use: "Apply 2-3 drops in the morning before sunscreen".to_string(),
        side_effects: Some("Mild tingling for sensitive skin".to_string()),
        price_inr: Some(699.0),
    }
}

/// Write `contents` to a temporary `.toml` file.
pub fn temp_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

/// Refiner that appends a fixed suffix and counts its calls.
pub struct MockRefiner {
    suffix: String,
    calls: AtomicUsize,
    questions: Mutex<Vec<String>>,
}

impl MockRefiner {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            calls: AtomicUsize::new(0),
            questions: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn questions(&self) -> Vec<String> {
        self.questions.lock().map(|q| q.clone()).unwrap_or_default()
    }
}

impl Refiner for MockRefiner {
    fn refine(&self, question: &str, answer: &str, _product: &Product) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut q) = self.questions.lock() {
            q.push(question.to_string());
        }
        Ok(Some(format!("{}{}", answer, self.suffix)))
    }

    fn label(&self) -> String {
        "mock".to_string()
    }
}

/// Refiner whose every call fails like an unreachable endpoint.
#[derive(Default)]
pub struct FailingRefiner {
    calls: AtomicUsize,
}

impl FailingRefiner {
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Refiner for FailingRefiner {
    fn refine(&self, _question: &str, _answer: &str, _product: &Product) -> Result<Option<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(PageflowError::LlmRequest("connection refused".to_string()))
    }
}

/// Retriever ranking texts by shared lowercase words with the query.
#[derive(Debug, Default)]
pub struct KeywordRetriever {
    corpus: Vec<String>,
}

fn words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

impl Retriever for KeywordRetriever {
    fn build_index(&mut self, texts: &[String]) -> Result<()> {
        self.corpus = texts.to_vec();
        Ok(())
    }

    fn query(&self, text: &str, top_k: usize) -> Result<Vec<String>> {
        let query = words(text);
        let mut scored: Vec<(usize, &String)> = self
            .corpus
            .iter()
            .map(|doc| (words(doc).intersection(&query).count(), doc))
            .filter(|(score, _)| *score > 0)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(top_k).map(|(_, doc)| doc.clone()).collect())
    }
}
