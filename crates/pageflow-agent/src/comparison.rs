use pageflow_core::types::{ComparedProduct, Comparison, Differences, Product, RivalProduct};

/// Price assumed for the input product when it has none.
const FALLBACK_PRICE_INR: f64 = 700.0;
const RIVAL_MARKUP_INR: f64 = 100.0;

/// Compares the input product against a fictional rival derived from it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ComparisonAgent;

impl ComparisonAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn compare(&self, product: &Product) -> Comparison {
        let brand = product.name.split_whitespace().next().unwrap_or("Generic");
        let rival = RivalProduct {
            name: format!("{} Plus", brand),
            key_ingredients: product
                .key_ingredients
                .iter()
                .map(|i| format!("{} Extract", i))
                .collect(),
            benefits: vec!["Brightening".to_string(), "Hydration".to_string()],
            price_inr: product.price_inr.unwrap_or(FALLBACK_PRICE_INR) + RIVAL_MARKUP_INR,
        };
        let price_diff = rival.price_inr - product.price_inr.unwrap_or(0.0);

        Comparison {
            product_a: ComparedProduct {
                name: product.name.clone(),
                price: product.price_inr,
                ingredients: product.key_ingredients.clone(),
            },
            product_b: rival,
            differences: Differences { price_diff },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_test_utils::sample_product;

    #[test]
    fn test_rival_derived_from_product() {
        let cmp = ComparisonAgent::new().compare(&sample_product());
        assert_eq!(cmp.product_a.name, "GlowBoost Vitamin C Serum");
        assert_eq!(cmp.product_b.name, "GlowBoost Plus");
        assert_eq!(
            cmp.product_b.key_ingredients,
            vec!["Vitamin C Extract", "Hyaluronic Acid Extract"]
        );
        assert_eq!(cmp.product_b.price_inr, 799.0);
        assert_eq!(cmp.differences.price_diff, 100.0);
    }

    #[test]
    fn test_missing_price_uses_fallback() {
        let mut product = sample_product();
        product.price_inr = None;
        let cmp = ComparisonAgent::new().compare(&product);
        assert_eq!(cmp.product_a.price, None);
        assert_eq!(cmp.product_b.price_inr, 800.0);
        assert_eq!(cmp.differences.price_diff, 800.0);
    }
}
