use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw product input as supplied by the caller: loosely-typed key/value pairs.
pub type RawInput = serde_json::Map<String, serde_json::Value>;

/// Unique pipeline run identifier.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier and start time of a run. Generated once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: RunId,
    pub timestamp: DateTime<Utc>,
}

impl RunMeta {
    pub fn new() -> Self {
        Self {
            run_id: RunId::new(),
            timestamp: Utc::now(),
        }
    }

    /// RFC 3339 timestamp with second precision, e.g. `2026-10-19T08:30:00Z`.
    pub fn timestamp_rfc3339(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl Default for RunMeta {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalized product record produced by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    #[serde(default)]
    pub concentration: Option<String>,
    #[serde(default)]
    pub skin_type: Vec<String>,
    #[serde(default)]
    pub key_ingredients: Vec<String>,
    #[serde(default)]
    pub benefits: Vec<String>,
    #[serde(default)]
    pub how_to_use: String,
    #[serde(default)]
    pub side_effects: Option<String>,
    #[serde(default)]
    pub price_inr: Option<f64>,
}

/// Category of a generated question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QaCategory {
    Informational,
    Usage,
    Benefits,
    Safety,
    Purchase,
}

impl std::fmt::Display for QaCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Informational => "Informational",
            Self::Usage => "Usage",
            Self::Benefits => "Benefits",
            Self::Safety => "Safety",
            Self::Purchase => "Purchase",
        };
        f.write_str(s)
    }
}

/// A generated question/answer pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaItem {
    pub id: String,
    pub category: QaCategory,
    pub question: String,
    pub answer: String,
}

impl QaItem {
    /// Text used when indexing the item for retrieval.
    pub fn corpus_text(&self) -> String {
        format!("{} {}", self.question, self.answer)
    }
}

/// Side of a comparison describing the input product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedProduct {
    pub name: String,
    pub price: Option<f64>,
    pub ingredients: Vec<String>,
}

/// The fictional product the input is compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RivalProduct {
    pub name: String,
    pub key_ingredients: Vec<String>,
    pub benefits: Vec<String>,
    pub price_inr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Differences {
    pub price_diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub product_a: ComparedProduct,
    pub product_b: RivalProduct,
    pub differences: Differences,
}

/// Run metadata stamped onto every output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMeta {
    pub run_id: RunId,
    pub timestamp: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageMeta {
    pub price_inr: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub content: serde_json::Value,
}

/// A rendered output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub meta: PageMeta,
    pub sections: Vec<Section>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faq: Option<Vec<QaItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparison: Option<Comparison>,
    #[serde(rename = "_meta", default, skip_serializing_if = "Option::is_none")]
    pub run_meta: Option<DocumentMeta>,
}

/// The three document variants produced by one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Documents {
    pub product_page: Document,
    pub faq: Document,
    pub comparison_page: Document,
}

impl Documents {
    /// Variant name paired with its document, in a stable order.
    pub fn variants(&self) -> [(&'static str, &Document); 3] {
        [
            ("product_page", &self.product_page),
            ("faq", &self.faq),
            ("comparison_page", &self.comparison_page),
        ]
    }
}
