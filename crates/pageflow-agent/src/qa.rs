use tracing::{debug, warn};
use uuid::Uuid;

use pageflow_core::traits::{Capability, Refiner};
use pageflow_core::types::{Product, QaCategory, QaItem};

/// Rule-based question/answer generator with optional LLM refinement.
///
/// The rule set always pads its output to `target` items, so a product
/// with no benefits or skin types still yields a full FAQ.
pub struct QaGenerator {
    target: usize,
    refiner: Capability<Box<dyn Refiner>>,
}

impl QaGenerator {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            refiner: Capability::unavailable("refinement not configured"),
        }
    }

    pub fn with_refiner(mut self, refiner: Capability<Box<dyn Refiner>>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn refines(&self) -> bool {
        self.refiner.is_available()
    }

    pub fn generate(&self, product: &Product) -> Vec<QaItem> {
        let items = self.rule_items(product);
        debug!(count = items.len(), product = %product.name, "Generated QA items");
        match self.refiner.as_ref() {
            Some(refiner) => refine_all(refiner.as_ref(), items, product),
            None => items,
        }
    }

    fn rule_items(&self, product: &Product) -> Vec<QaItem> {
        let mut drafts: Vec<(QaCategory, String, String)> = Vec::new();

        drafts.push((
            QaCategory::Informational,
            "What is the product name?".to_string(),
            product.name.clone(),
        ));
        drafts.push((
            QaCategory::Informational,
            "What is the concentration?".to_string(),
            product
                .concentration
                .clone()
                .unwrap_or_else(|| "Not specified".to_string()),
        ));
        drafts.push((
            QaCategory::Usage,
            "How to use the product?".to_string(),
            product.how_to_use.clone(),
        ));
        for benefit in &product.benefits {
            drafts.push((
                QaCategory::Benefits,
                format!("What benefit does it provide related to {}?", benefit),
                format!("{} helps with {}.", product.name, benefit.to_lowercase()),
            ));
        }
        drafts.push((
            QaCategory::Safety,
            "Are there side effects?".to_string(),
            product
                .side_effects
                .clone()
                .unwrap_or_else(|| "None known for most users.".to_string()),
        ));
        drafts.push((
            QaCategory::Purchase,
            "What is the price?".to_string(),
            match product.price_inr {
                Some(price) => format!("₹{}", price.trunc() as i64),
                None => "Contact seller".to_string(),
            },
        ));

        let mut idx = 0;
        while drafts.len() < self.target {
            drafts.push(filler(product, idx));
            idx += 1;
        }

        drafts
            .into_iter()
            .enumerate()
            .map(|(i, (category, question, answer))| QaItem {
                id: item_id(&product.name, i, &question),
                category,
                question,
                answer,
            })
            .collect()
    }
}

/// Padding question number `idx`: skin types first, then ingredients, then
/// a generic usage question.
fn filler(product: &Product, idx: usize) -> (QaCategory, String, String) {
    if !product.skin_type.is_empty() {
        let skin = &product.skin_type[idx % product.skin_type.len()];
        return (
            QaCategory::Informational,
            format!("Is this suitable for {} skin?", skin),
            "Yes, it is suitable.".to_string(),
        );
    }
    if !product.key_ingredients.is_empty() {
        let ingredient = &product.key_ingredients[idx % product.key_ingredients.len()];
        return (
            QaCategory::Informational,
            format!("Does it contain {}?", ingredient),
            format!("Yes, {} is one of the key ingredients.", ingredient),
        );
    }
    (
        QaCategory::Usage,
        format!("Can {} be used daily?", product.name),
        "Follow the usage directions on the label.".to_string(),
    )
}

/// Stable id so identical input yields identical output.
fn item_id(product_name: &str, index: usize, question: &str) -> String {
    let seed = format!("{}:{}:{}", product_name, index, question);
    Uuid::new_v5(&Uuid::NAMESPACE_OID, seed.as_bytes()).to_string()
}

fn refine_all(refiner: &dyn Refiner, items: Vec<QaItem>, product: &Product) -> Vec<QaItem> {
    let mut refined_count = 0;
    let items: Vec<QaItem> = items
        .into_iter()
        .map(|mut item| {
            match refiner.refine(&item.question, &item.answer, product) {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    item.answer = text.trim().to_string();
                    refined_count += 1;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, refiner = %refiner.label(), question = %item.question, "Refinement failed, keeping rule-based answer");
                }
            }
            item
        })
        .collect();
    debug!(refined = refined_count, total = items.len(), "Refinement pass complete");
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_core::error::{PageflowError, Result};
    use pageflow_test_utils::sample_product;

    struct Shouting;

    impl Refiner for Shouting {
        fn refine(&self, _q: &str, answer: &str, _p: &Product) -> Result<Option<String>> {
            Ok(Some(answer.to_uppercase()))
        }
    }

    struct Broken;

    impl Refiner for Broken {
        fn refine(&self, _q: &str, _a: &str, _p: &Product) -> Result<Option<String>> {
            Err(PageflowError::LlmRequest("503 Service Unavailable".into()))
        }
    }

    #[test]
    fn test_generates_target_count() {
        let items = QaGenerator::new(15).generate(&sample_product());
        assert_eq!(items.len(), 15);
        assert_eq!(items[0].question, "What is the product name?");
        assert_eq!(items[0].answer, "GlowBoost Vitamin C Serum");
        assert_eq!(items[2].category, QaCategory::Usage);
    }

    #[test]
    fn test_benefit_and_price_items() {
        let items = QaGenerator::new(15).generate(&sample_product());
        let benefit = items
            .iter()
            .find(|i| i.question.contains("Fades dark spots"))
            .unwrap();
        assert_eq!(benefit.category, QaCategory::Benefits);
        assert_eq!(benefit.answer, "GlowBoost Vitamin C Serum helps with fades dark spots.");

        let price = items.iter().find(|i| i.category == QaCategory::Purchase).unwrap();
        assert_eq!(price.answer, "₹699");
    }

    #[test]
    fn test_padding_cycles_skin_types() {
        let items = QaGenerator::new(15).generate(&sample_product());
        let fillers: Vec<&str> = items
            .iter()
            .filter(|i| i.question.starts_with("Is this suitable"))
            .map(|i| i.question.as_str())
            .collect();
        assert_eq!(fillers[0], "Is this suitable for Oily skin?");
        assert_eq!(fillers[1], "Is this suitable for Combination skin?");
        assert_eq!(fillers[2], "Is this suitable for Oily skin?");
    }

    #[test]
    fn test_padding_without_skin_or_ingredients() {
        let product = Product {
            name: "Bare".into(),
            concentration: None,
            skin_type: vec![],
            key_ingredients: vec![],
            benefits: vec![],
            how_to_use: String::new(),
            side_effects: None,
            price_inr: None,
        };
        let items = QaGenerator::new(12).generate(&product);
        assert_eq!(items.len(), 12);
        assert_eq!(items[1].answer, "Not specified");
        assert!(items.iter().any(|i| i.answer == "Contact seller"));
        assert!(items.iter().any(|i| i.question == "Can Bare be used daily?"));
    }

    #[test]
    fn test_ids_are_deterministic_and_unique() {
        let first = QaGenerator::new(15).generate(&sample_product());
        let second = QaGenerator::new(15).generate(&sample_product());
        assert_eq!(first, second);

        let mut ids: Vec<&str> = first.iter().map(|i| i.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 15);
    }

    #[test]
    fn test_refiner_rewrites_answers() {
        let generator = QaGenerator::new(10)
            .with_refiner(Capability::Available(Box::new(Shouting) as Box<dyn Refiner>));
        assert!(generator.refines());
        let items = generator.generate(&sample_product());
        assert_eq!(items[0].answer, "GLOWBOOST VITAMIN C SERUM");
    }

    #[test]
    fn test_refiner_failure_keeps_rule_answers() {
        let plain = QaGenerator::new(15).generate(&sample_product());
        let generator = QaGenerator::new(15)
            .with_refiner(Capability::Available(Box::new(Broken) as Box<dyn Refiner>));
        assert_eq!(generator.generate(&sample_product()), plain);
    }
}
