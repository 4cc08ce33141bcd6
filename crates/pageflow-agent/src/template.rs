use std::sync::OnceLock;

use regex::{Captures, Regex};

use pageflow_core::config::TemplateConfig;
use pageflow_core::types::{Document, PageMeta, Product, QaItem, Section};

use crate::content::Blocks;

fn placeholder_pattern() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\{\{\s*product\.([a-z_]+)\s*\}\}").expect("valid placeholder pattern")
    })
}

/// Substitute `{{product.<field>}}` placeholders. Unknown fields are left
/// as written.
pub fn fill_placeholders(text: &str, product: &Product) -> String {
    placeholder_pattern()
        .replace_all(text, |caps: &Captures| {
            product_field(product, &caps[1]).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn product_field(product: &Product, field: &str) -> Option<String> {
    match field {
        "name" => Some(product.name.clone()),
        "concentration" => Some(product.concentration.clone().unwrap_or_default()),
        "price_inr" => Some(product.price_inr.map(format_price).unwrap_or_default()),
        "how_to_use" => Some(product.how_to_use.clone()),
        _ => None,
    }
}

fn format_price(price: f64) -> String {
    if price.fract() == 0.0 {
        format!("{}", price as i64)
    } else {
        format!("{}", price)
    }
}

/// Render one template into a document. Sections naming a block that does
/// not exist render with `null` content.
pub fn render(
    template: &TemplateConfig,
    product: &Product,
    blocks: &Blocks,
    qa_items: &[QaItem],
) -> Document {
    let sections = template
        .sections
        .iter()
        .map(|id| Section {
            id: id.clone(),
            content: blocks.get(id).cloned().unwrap_or(serde_json::Value::Null),
        })
        .collect();

    Document {
        title: fill_placeholders(&template.title, product),
        meta: PageMeta {
            price_inr: product.price_inr,
        },
        sections,
        faq: template.include_faq.then(|| qa_items.to_vec()),
        comparison: None,
        run_meta: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentBlockAgent;
    use pageflow_test_utils::sample_product;

    fn template(title: &str, sections: &[&str], include_faq: bool) -> TemplateConfig {
        TemplateConfig {
            title: title.to_string(),
            sections: sections.iter().map(|s| s.to_string()).collect(),
            include_faq,
        }
    }

    #[test]
    fn test_fill_known_placeholders() {
        let product = sample_product();
        assert_eq!(
            fill_placeholders("FAQ - {{product.name}}", &product),
            "FAQ - GlowBoost Vitamin C Serum"
        );
        assert_eq!(
            fill_placeholders("{{ product.price_inr }} INR, {{product.concentration}}", &product),
            "699 INR, 10% Vitamin C"
        );
    }

    #[test]
    fn test_unknown_placeholder_untouched() {
        let product = sample_product();
        assert_eq!(
            fill_placeholders("{{product.color}} / {{site.name}}", &product),
            "{{product.color}} / {{site.name}}"
        );
    }

    #[test]
    fn test_render_sections_and_faq() {
        let product = sample_product();
        let blocks = ContentBlockAgent::new().build(&product);
        let qa = vec![QaItem {
            id: "1".into(),
            category: pageflow_core::types::QaCategory::Usage,
            question: "How?".into(),
            answer: "Like this.".into(),
        }];

        let doc = render(
            &template("{{product.name}}", &["usage_block", "missing_block"], true),
            &product,
            &blocks,
            &qa,
        );
        assert_eq!(doc.title, "GlowBoost Vitamin C Serum");
        assert_eq!(doc.meta.price_inr, Some(699.0));
        assert_eq!(doc.sections[0].content["how"], blocks["usage_block"]["how"]);
        assert!(doc.sections[1].content.is_null());
        assert_eq!(doc.faq.as_ref().map(Vec::len), Some(1));
    }

    #[test]
    fn test_render_without_faq() {
        let product = sample_product();
        let doc = render(&template("x", &[], false), &product, &Blocks::new(), &[]);
        assert!(doc.faq.is_none());
        assert!(doc.sections.is_empty());
    }
}
