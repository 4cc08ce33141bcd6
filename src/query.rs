use std::io::{self, BufRead, Write};

use tracing::warn;

use pageflow_core::traits::{Capability, Refiner, Retriever};
use pageflow_core::types::{Product, QaItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerSource {
    Retrieval,
    ExactMatch,
    Substring,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub source: AnswerSource,
    pub refined: bool,
}

/// Answers free-text questions from a persisted FAQ.
pub struct FaqResponder {
    items: Vec<QaItem>,
    product: Product,
    retriever: Option<Box<dyn Retriever>>,
    refiner: Capability<Box<dyn Refiner>>,
}

impl FaqResponder {
    pub fn new(items: Vec<QaItem>, product: Product) -> Self {
        Self {
            items,
            product,
            retriever: None,
            refiner: Capability::unavailable("refinement not configured"),
        }
    }

    /// Index the FAQ with `retriever`. On failure the responder keeps
    /// working with text matching only.
    pub fn with_retriever(mut self, retriever: Capability<Box<dyn Retriever>>) -> Self {
        if let Capability::Available(mut retriever) = retriever {
            let corpus: Vec<String> = self.items.iter().map(QaItem::corpus_text).collect();
            match retriever.build_index(&corpus) {
                Ok(()) => self.retriever = Some(retriever),
                Err(e) => warn!(error = %e, "Failed to index FAQ, using text matching"),
            }
        }
        self
    }

    pub fn with_refiner(mut self, refiner: Capability<Box<dyn Refiner>>) -> Self {
        self.refiner = refiner;
        self
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn answer(&self, question: &str) -> Option<Answer> {
        let (text, source) = self
            .by_retrieval(question)
            .map(|a| (a, AnswerSource::Retrieval))
            .or_else(|| self.by_text(question))?;

        if let Some(refiner) = self.refiner.as_ref() {
            match refiner.refine(question, &text, &self.product) {
                Ok(Some(refined)) => {
                    return Some(Answer {
                        text: refined,
                        source,
                        refined: true,
                    })
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "Refinement failed, using stored answer"),
            }
        }

        Some(Answer {
            text,
            source,
            refined: false,
        })
    }

    fn by_retrieval(&self, question: &str) -> Option<String> {
        let retriever = self.retriever.as_ref()?;
        let hit = match retriever.query(question, 1) {
            Ok(hits) => hits.into_iter().next()?,
            Err(e) => {
                warn!(error = %e, "Retrieval query failed, using text matching");
                return None;
            }
        };
        self.items
            .iter()
            .find(|item| item.corpus_text() == hit)
            .map(|item| item.answer.clone())
    }

    fn by_text(&self, question: &str) -> Option<(String, AnswerSource)> {
        let q = question.trim().to_lowercase();
        if q.is_empty() {
            return None;
        }
        if let Some(item) = self.items.iter().find(|i| i.question.to_lowercase() == q) {
            return Some((item.answer.clone(), AnswerSource::ExactMatch));
        }
        self.items
            .iter()
            .find(|i| i.question.to_lowercase().contains(&q) || i.answer.to_lowercase().contains(&q))
            .map(|i| (i.answer.clone(), AnswerSource::Substring))
    }
}

/// Prompt loop: one question per line until `exit`, `quit` or end of input.
pub fn prompt_loop<R: BufRead, W: Write>(
    responder: &FaqResponder,
    mut input: R,
    mut output: W,
) -> io::Result<()> {
    loop {
        write!(output, "\n> ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(output, "\nbye")?;
            break;
        }

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query.eq_ignore_ascii_case("exit") || query.eq_ignore_ascii_case("quit") {
            writeln!(output, "bye")?;
            break;
        }

        match responder.answer(query) {
            Some(answer) => writeln!(output, "\nAnswer:\n{}", answer.text)?,
            None => writeln!(
                output,
                "No good answer found in FAQ. You can try rephrasing the question."
            )?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pageflow_agent::QaGenerator;
    use pageflow_test_utils::{sample_product, FailingRefiner, KeywordRetriever, MockRefiner};

    fn responder() -> FaqResponder {
        let product = sample_product();
        FaqResponder::new(QaGenerator::new(15).generate(&product), product)
    }

    #[test]
    fn test_exact_match_is_case_insensitive() {
        let answer = responder().answer("what is THE price?").unwrap();
        assert_eq!(answer.text, "₹699");
        assert_eq!(answer.source, AnswerSource::ExactMatch);
        assert!(!answer.refined);
    }

    #[test]
    fn test_substring_match_searches_answers() {
        let answer = responder().answer("tingling").unwrap();
        assert_eq!(answer.text, "Mild tingling for sensitive skin");
        assert_eq!(answer.source, AnswerSource::Substring);
    }

    #[test]
    fn test_no_match() {
        assert!(responder().answer("shipping to Mars").is_none());
        assert!(responder().answer("   ").is_none());
    }

    #[test]
    fn test_retrieval_preferred_when_available() {
        let responder = responder().with_retriever(Capability::Available(
            Box::new(KeywordRetriever::default()) as Box<dyn Retriever>,
        ));
        let answer = responder.answer("any side effects").unwrap();
        assert_eq!(answer.source, AnswerSource::Retrieval);
        assert_eq!(answer.text, "Mild tingling for sensitive skin");
    }

    #[test]
    fn test_refined_answer() {
        let responder = responder().with_refiner(Capability::Available(
            Box::new(MockRefiner::new(" Enjoy!")) as Box<dyn Refiner>,
        ));
        let answer = responder.answer("What is the price?").unwrap();
        assert_eq!(answer.text, "₹699 Enjoy!");
        assert!(answer.refined);
    }

    #[test]
    fn test_refiner_failure_keeps_answer() {
        let responder = responder().with_refiner(Capability::Available(
            Box::new(FailingRefiner::default()) as Box<dyn Refiner>,
        ));
        let answer = responder.answer("What is the price?").unwrap();
        assert_eq!(answer.text, "₹699");
        assert!(!answer.refined);
    }

    #[test]
    fn test_prompt_loop_until_quit() {
        let input = b"What is the price?\n\nshipping to Mars\nquit\nWhat is the price?\n";
        let mut out = Vec::new();
        prompt_loop(&responder(), &input[..], &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Answer:\n₹699").count(), 1);
        assert!(text.contains("No good answer found"));
        assert!(text.trim_end().ends_with("bye"));
    }

    #[test]
    fn test_prompt_loop_stops_at_eof() {
        let mut out = Vec::new();
        prompt_loop(&responder(), &b"tingling"[..], &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Mild tingling"));
        assert!(text.ends_with("bye\n"));
    }
}
