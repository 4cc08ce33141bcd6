use pageflow_core::config::TemplateSet;
use pageflow_core::types::{Comparison, DocumentMeta, Documents, Product, QaItem, RunMeta};

use crate::content::Blocks;
use crate::template::render;

/// Renders the three page templates into final documents.
#[derive(Debug, Clone)]
pub struct AssemblerAgent {
    templates: TemplateSet,
}

impl AssemblerAgent {
    pub fn new(templates: TemplateSet) -> Self {
        Self { templates }
    }

    pub fn assemble(
        &self,
        product: &Product,
        blocks: &Blocks,
        qa_items: &[QaItem],
        comparison: &Comparison,
        meta: &RunMeta,
    ) -> Documents {
        let mut documents = Documents {
            product_page: render(&self.templates.product, product, blocks, qa_items),
            faq: render(&self.templates.faq, product, blocks, qa_items),
            comparison_page: render(&self.templates.comparison, product, blocks, qa_items),
        };
        documents.comparison_page.comparison = Some(comparison.clone());

        // `source` names the variant the document was rendered as.
        let timestamp = meta.timestamp_rfc3339();
        for (source, doc) in [
            ("product_page", &mut documents.product_page),
            ("faq", &mut documents.faq),
            ("comparison_page", &mut documents.comparison_page),
        ] {
            doc.run_meta = Some(DocumentMeta {
                run_id: meta.run_id.clone(),
                timestamp: timestamp.clone(),
                source: source.to_string(),
            });
        }
        documents
    }
}
