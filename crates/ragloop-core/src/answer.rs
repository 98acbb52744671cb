//! Grounded answer generation over fused context.

use std::sync::Arc;

use crate::error::{Result, Service};
use crate::llm::{Completion, Generator};
use crate::models::{EvaluationResult, SearchResult};

/// Placed between context items in the prompt.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

const SYSTEM_PROMPT: &str = "You are a specialised assistant.\n\
Answer using ONLY the context provided.\n\
If the context does not contain the answer, say that the information was not found.\n\
\n\
Context:\n";

/// Join context contents in the given order.
pub fn context_block(context: &[SearchResult]) -> String {
    context
        .iter()
        .map(|r| r.content.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

pub struct Answerer {
    generator: Arc<dyn Generator>,
    feedback: bool,
}

impl Answerer {
    /// `feedback` controls whether [`Answerer::refine`] tells the model
    /// which claims the evaluator flagged.
    pub fn new(generator: Arc<dyn Generator>, feedback: bool) -> Self {
        Self {
            generator,
            feedback,
        }
    }

    pub async fn generate(&self, question: &str, context: &[SearchResult]) -> Result<Completion> {
        let system = format!("{}{}", SYSTEM_PROMPT, context_block(context));
        self.generator
            .complete(&system, question)
            .await
            .map_err(|e| e.for_service(Service::Generation))
    }

    /// Regenerate for the same question and context.
    ///
    /// With feedback disabled, or when the verdict lists no unsupported
    /// claims, this is the same request as [`Answerer::generate`].
    pub async fn refine(
        &self,
        question: &str,
        context: &[SearchResult],
        evaluation: &EvaluationResult,
    ) -> Result<Completion> {
        if !self.feedback || evaluation.unsupported_claims.is_empty() {
            return self.generate(question, context).await;
        }

        let mut system = format!("{}{}", SYSTEM_PROMPT, context_block(context));
        system.push_str(
            "\n\nA previous answer made these claims that the context does not support. \
             Do not repeat them:\n",
        );
        for claim in &evaluation.unsupported_claims {
            system.push_str("- ");
            system.push_str(claim);
            system.push('\n');
        }

        self.generator
            .complete(&system, question)
            .await
            .map_err(|e| e.for_service(Service::Generation))
    }
}
