use std::collections::BTreeMap;

use serde_json::{json, Value};

use pageflow_core::types::Product;

/// Content blocks keyed by block id.
pub type Blocks = BTreeMap<String, Value>;

pub const BENEFITS_BLOCK: &str = "benefits_block";
pub const INGREDIENTS_BLOCK: &str = "ingredients_block";
pub const USAGE_BLOCK: &str = "usage_block";
pub const SAFETY_BLOCK: &str = "safety_block";

/// Builds the reusable content blocks that templates arrange into pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContentBlockAgent;

impl ContentBlockAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn build(&self, product: &Product) -> Blocks {
        let skin = product.skin_type.join(", ");
        let bullets: Vec<String> = product
            .benefits
            .iter()
            .map(|b| format!("{} - ideal for {} skin.", b, skin))
            .collect();

        let mut blocks = Blocks::new();
        blocks.insert(
            BENEFITS_BLOCK.to_string(),
            json!({
                "summary": product.benefits.join(", "),
                "bullets": bullets,
            }),
        );
        blocks.insert(
            INGREDIENTS_BLOCK.to_string(),
            json!({
                "list": product.key_ingredients,
                "note": product
                    .concentration
                    .as_ref()
                    .map(|c| format!("Concentration: {}", c))
                    .unwrap_or_default(),
            }),
        );
        blocks.insert(USAGE_BLOCK.to_string(), json!({ "how": product.how_to_use }));
        blocks.insert(
            SAFETY_BLOCK.to_string(),
            json!({
                "side_effects": product
                    .side_effects
                    .clone()
                    .unwrap_or_else(|| "Mild or none.".to_string()),
            }),
        );
        blocks
    }
}

/// Flatten a block's string leaves into one line of text.
pub fn block_text(block: &Value) -> String {
    let mut parts = Vec::new();
    collect_strings(block, &mut parts);
    parts.join(" ")
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s),
        Value::Array(items) => items.iter().for_each(|v| collect_strings(v, out)),
        Value::Object(map) => map.values().for_each(|v| collect_strings(v, out)),
        _ => {}
    }
}
