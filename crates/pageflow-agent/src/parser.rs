use std::sync::OnceLock;

use regex::Regex;

use pageflow_core::error::{PageflowError, Result};
use pageflow_core::types::{Product, RawInput};

fn price_pattern() -> &'static Regex {
    static PRICE: OnceLock<Regex> = OnceLock::new();
    PRICE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("valid price pattern"))
}

/// Normalizes raw key/value product input into a [`Product`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ParserAgent;

impl ParserAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn parse(&self, raw: &RawInput) -> Result<Product> {
        let name = field(raw, "Product Name")
            .or_else(|| field(raw, "name"))
            .filter(|n| !n.is_empty())
            .ok_or_else(|| PageflowError::Input("missing product name".to_string()))?;

        Ok(Product {
            name,
            concentration: field(raw, "Concentration").filter(|s| !s.is_empty()),
            skin_type: split_list(field(raw, "Skin Type")),
            key_ingredients: split_list(field(raw, "Key Ingredients")),
            benefits: split_list(field(raw, "Benefits")),
            how_to_use: field(raw, "How to Use").unwrap_or_default(),
            side_effects: field(raw, "Side Effects").filter(|s| !s.is_empty()),
            price_inr: field(raw, "Price").and_then(|p| parse_price(&p)),
        })
    }
}

/// Read a raw field as trimmed text. Numbers and booleans are stringified;
/// null, arrays and objects read as absent.
fn field(raw: &RawInput, key: &str) -> Option<String> {
    match raw.get(key)? {
        serde_json::Value::String(s) => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Split a comma-separated list, dropping empty entries.
fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Extract a price from text such as `₹699`, `Rs. 1,299.50` or `700`.
pub fn parse_price(text: &str) -> Option<f64> {
    let cleaned = text.replace(',', "");
    price_pattern()
        .find(&cleaned)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}
