//! Bounded generate / evaluate / refine state machine.
//!
//! ```text
//! Generated ──▶ Evaluated ──┬──▶ Refining ──▶ Generated
//!                           └──▶ Done
//! ```
//!
//! At most [`MAX_REFINEMENTS`] regeneration happens per question, whatever
//! the verdicts say or the configuration asks for.

use tracing::{debug, info};

use crate::answer::Answerer;
use crate::error::Error;
use crate::evaluate::Evaluator;
use crate::models::{EvaluationResult, SearchResult};

/// Hard cap on extra generation attempts.
pub const MAX_REFINEMENTS: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefinementPolicy {
    pub max_refinements: u32,
}

impl Default for RefinementPolicy {
    fn default() -> Self {
        Self {
            max_refinements: MAX_REFINEMENTS,
        }
    }
}

impl RefinementPolicy {
    pub fn new(max_refinements: u32) -> Self {
        Self { max_refinements }
    }

    /// Configured attempts, capped at [`MAX_REFINEMENTS`].
    pub fn budget(&self) -> u32 {
        self.max_refinements.min(MAX_REFINEMENTS)
    }

    pub fn should_refine(&self, evaluation: &EvaluationResult, done: u32) -> bool {
        evaluation.needs_refinement && done < self.budget()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Generated,
    Evaluated,
    Refining,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RefinementOutcome {
    pub answer: String,
    /// Verdict on `answer`, the last answer produced.
    pub evaluation: EvaluationResult,
    pub was_refined: bool,
    pub refinements: u32,
    /// Generation plus judgment tokens across every step.
    pub tokens_used: u64,
}

/// A generation failure inside the loop, with the tokens already spent on
/// earlier steps.
#[derive(Debug)]
pub struct LoopFailure {
    pub error: Error,
    pub tokens_used: u64,
}

pub struct RefinementLoop<'a> {
    answerer: &'a Answerer,
    evaluator: &'a Evaluator,
    policy: RefinementPolicy,
}

impl<'a> RefinementLoop<'a> {
    pub fn new(answerer: &'a Answerer, evaluator: &'a Evaluator, policy: RefinementPolicy) -> Self {
        Self {
            answerer,
            evaluator,
            policy,
        }
    }

    /// Drive the machine to `Done`. Generation errors propagate as a
    /// [`LoopFailure`]; judgment never fails.
    pub async fn run(
        &self,
        question: &str,
        context: &[SearchResult],
    ) -> std::result::Result<RefinementOutcome, LoopFailure> {
        let first = self
            .answerer
            .generate(question, context)
            .await
            .map_err(|error| LoopFailure {
                error,
                tokens_used: 0,
            })?;
        let mut answer = first.text;
        let mut tokens_used = first.tokens_used;
        let mut evaluation = EvaluationResult::neutral();
        let mut refinements = 0u32;
        let mut state = LoopState::Generated;

        loop {
            state = match state {
                LoopState::Generated => {
                    let judgment = self.evaluator.evaluate(&answer, context).await;
                    tokens_used += judgment.tokens_used;
                    evaluation = judgment.evaluation;
                    LoopState::Evaluated
                }
                LoopState::Evaluated => {
                    if self.policy.should_refine(&evaluation, refinements) {
                        LoopState::Refining
                    } else {
                        LoopState::Done
                    }
                }
                LoopState::Refining => {
                    info!(
                        support = %evaluation.support_level,
                        utility = evaluation.utility_score,
                        "refining answer"
                    );
                    let refined = self
                        .answerer
                        .refine(question, context, &evaluation)
                        .await
                        .map_err(|error| LoopFailure { error, tokens_used })?;
                    answer = refined.text;
                    tokens_used += refined.tokens_used;
                    refinements += 1;
                    LoopState::Generated
                }
                LoopState::Done => break,
            };
        }

        debug!(refinements, tokens_used, "refinement loop finished");
        Ok(RefinementOutcome {
            answer,
            evaluation,
            was_refined: refinements > 0,
            refinements,
            tokens_used,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, Service};
    use crate::evaluate::JUDGE_SYSTEM_PROMPT;
    use crate::llm::{Completion, Generator};
    use crate::models::SupportLevel;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Answers with "answer N" and judges with scripted verdicts.
    struct Scripted {
        verdicts: Mutex<Vec<&'static str>>,
        answers: AtomicUsize,
        judgments: AtomicUsize,
        fail_answers_after: Option<usize>,
    }

    impl Scripted {
        fn new(verdicts: Vec<&'static str>) -> Self {
            Self {
                verdicts: Mutex::new(verdicts),
                answers: AtomicUsize::new(0),
                judgments: AtomicUsize::new(0),
                fail_answers_after: None,
            }
        }
    }

    #[async_trait]
    impl Generator for Scripted {
        fn model_name(&self) -> &str {
            "scripted"
        }
        async fn complete(&self, system: &str, _user: &str) -> Result<Completion> {
            if system == JUDGE_SYSTEM_PROMPT {
                self.judgments.fetch_add(1, Ordering::SeqCst);
                let mut verdicts = self.verdicts.lock().unwrap();
                let verdict = if verdicts.len() > 1 {
                    verdicts.remove(0)
                } else {
                    verdicts[0]
                };
                return Ok(Completion::new(verdict, 1));
            }
            let n = self.answers.fetch_add(1, Ordering::SeqCst);
            if self.fail_answers_after.is_some_and(|limit| n >= limit) {
                return Err(Error::provider(Service::Generation, "quota"));
            }
            Ok(Completion::new(format!("answer {}", n), 10))
        }
    }

    const BAD: &str = r#"{"support": "no", "utility": 1, "issues": ["made up"]}"#;
    const GOOD: &str = r#"{"support": "fully", "utility": 5, "issues": []}"#;

    async fn run(
        gen: Arc<Scripted>,
        policy: RefinementPolicy,
    ) -> std::result::Result<RefinementOutcome, LoopFailure> {
        let answerer = Answerer::new(gen.clone(), true);
        let evaluator = Evaluator::new(gen, 3).unwrap();
        RefinementLoop::new(&answerer, &evaluator, policy)
            .run("q", &[])
            .await
    }

    #[tokio::test]
    async fn test_good_first_answer_is_final() {
        let gen = Arc::new(Scripted::new(vec![GOOD]));
        let out = run(gen.clone(), RefinementPolicy::default()).await.unwrap();
        assert_eq!(out.answer, "answer 0");
        assert!(!out.was_refined);
        assert_eq!(gen.answers.load(Ordering::SeqCst), 1);
        assert_eq!(gen.judgments.load(Ordering::SeqCst), 1);
        assert_eq!(out.tokens_used, 11);
    }

    #[tokio::test]
    async fn test_refines_once_and_reevaluates() {
        let gen = Arc::new(Scripted::new(vec![BAD, GOOD]));
        let out = run(gen.clone(), RefinementPolicy::default()).await.unwrap();
        assert_eq!(out.answer, "answer 1");
        assert!(out.was_refined);
        assert_eq!(out.evaluation.support_level, SupportLevel::Fully);
        assert_eq!(out.tokens_used, 22);
    }

    #[tokio::test]
    async fn test_hard_cap_ignores_configured_budget() {
        let gen = Arc::new(Scripted::new(vec![BAD]));
        let out = run(gen.clone(), RefinementPolicy::new(5)).await.unwrap();
        assert_eq!(out.refinements, 1);
        assert!(out.was_refined);
        assert_eq!(gen.answers.load(Ordering::SeqCst), 2);
        assert_eq!(gen.judgments.load(Ordering::SeqCst), 2);
        // final verdict is still the failing one
        assert!(out.evaluation.needs_refinement);
    }

    #[tokio::test]
    async fn test_zero_budget_never_refines() {
        let gen = Arc::new(Scripted::new(vec![BAD]));
        let out = run(gen.clone(), RefinementPolicy::new(0)).await.unwrap();
        assert!(!out.was_refined);
        assert_eq!(gen.answers.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_refinement_error_propagates() {
        let mut scripted = Scripted::new(vec![BAD]);
        scripted.fail_answers_after = Some(1);
        let failure = run(Arc::new(scripted), RefinementPolicy::default())
            .await
            .unwrap_err();
        assert!(matches!(
            failure.error,
            Error::Provider {
                service: Service::Generation,
                ..
            }
        ));
        // first answer (10) and its judgment (1) were already spent
        assert_eq!(failure.tokens_used, 11);
    }

    #[test]
    fn test_policy_budget() {
        assert_eq!(RefinementPolicy::new(3).budget(), 1);
        assert_eq!(RefinementPolicy::new(0).budget(), 0);
        let bad = EvaluationResult::new(SupportLevel::No, 1, vec![], 3);
        let policy = RefinementPolicy::default();
        assert!(policy.should_refine(&bad, 0));
        assert!(!policy.should_refine(&bad, 1));
        assert!(!policy.should_refine(&EvaluationResult::neutral(), 0));
    }
}
