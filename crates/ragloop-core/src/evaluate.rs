//! Self-evaluation of generated answers.
//!
//! The judge is the same [`Generator`] used for answering, asked for a
//! small JSON verdict:
//!
//! ```json
//! {"support": "fully|partially|no", "utility": 1-5, "issues": ["..."]}
//! ```
//!
//! Judgment fails soft. A provider error or an unparseable reply yields
//! [`EvaluationResult::neutral`], which never triggers refinement.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result, Service};
use crate::llm::Generator;
use crate::models::{EvaluationResult, SearchResult, SupportLevel};

/// Context items shown to the judge.
pub const SUMMARY_ITEMS: usize = 3;
/// Characters kept from each summarised context item.
pub const SUMMARY_CHARS: usize = 200;

pub const DEFAULT_UTILITY_THRESHOLD: u8 = 3;

pub const JUDGE_SYSTEM_PROMPT: &str = "You are a strict evaluator of answers produced from a \
reference context. Reply with a single JSON object and no markdown.";

const DEFAULT_UTILITY: u8 = 3;

/// A verdict plus the tokens the judgment call consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct Judgment {
    pub evaluation: EvaluationResult,
    pub tokens_used: u64,
}

/// First [`SUMMARY_ITEMS`] contents, each cut to [`SUMMARY_CHARS`] chars.
pub fn context_summary(context: &[SearchResult]) -> String {
    context
        .iter()
        .take(SUMMARY_ITEMS)
        .map(|r| r.content.chars().take(SUMMARY_CHARS).collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}

fn judge_prompt(answer: &str, context: &[SearchResult]) -> String {
    format!(
        "Evaluate this answer.\n\n\
         Context: {}\n\
         Answer: {}\n\n\
         JSON (no markdown):\n\
         {{\"support\": \"fully/partially/no\", \"utility\": 1-5, \"issues\": []}}",
        context_summary(context),
        answer
    )
}

/// Parse a raw judge reply into a verdict.
///
/// Code fences are stripped first. Missing keys default to
/// `partially` / `3` / `[]`; an unrecognised support value counts as
/// `partially`; utility is rounded and clamped to `1..=5`.
pub fn parse_verdict(raw: &str, utility_threshold: u8) -> Result<EvaluationResult> {
    let cleaned = raw.replace("```json", "").replace("```", "");
    let value: Value =
        serde_json::from_str(cleaned.trim()).map_err(|e| Error::Parse(e.to_string()))?;
    let obj = value
        .as_object()
        .ok_or_else(|| Error::Parse("verdict is not a JSON object".to_string()))?;

    let support = obj
        .get("support")
        .and_then(Value::as_str)
        .and_then(SupportLevel::parse)
        .unwrap_or(SupportLevel::Partially);

    let utility = obj.get("utility").map(utility_value).unwrap_or(DEFAULT_UTILITY);

    let issues = match obj.get("issues") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    };

    Ok(EvaluationResult::new(
        support,
        utility,
        issues,
        utility_threshold,
    ))
}

fn utility_value(value: &Value) -> u8 {
    let raw = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(x) if x.is_finite() => x.round().clamp(1.0, 5.0) as u8,
        _ => DEFAULT_UTILITY,
    }
}

pub struct Evaluator {
    generator: Arc<dyn Generator>,
    utility_threshold: u8,
}

impl Evaluator {
    pub fn new(generator: Arc<dyn Generator>, utility_threshold: u8) -> Result<Self> {
        if !(1..=5).contains(&utility_threshold) {
            return Err(Error::config(format!(
                "utility_threshold must be in 1..=5, got {}",
                utility_threshold
            )));
        }
        Ok(Self {
            generator,
            utility_threshold,
        })
    }

    pub fn utility_threshold(&self) -> u8 {
        self.utility_threshold
    }

    /// Judge `answer` against `context`. Never fails.
    pub async fn evaluate(&self, answer: &str, context: &[SearchResult]) -> Judgment {
        let completion = match self
            .generator
            .complete(JUDGE_SYSTEM_PROMPT, &judge_prompt(answer, context))
            .await
        {
            Ok(c) => c,
            Err(e) => {
                let e = e.for_service(Service::Judgment);
                warn!(error = %e, "judgment call failed, using neutral verdict");
                return Judgment {
                    evaluation: EvaluationResult::neutral(),
                    tokens_used: 0,
                };
            }
        };

        let evaluation = match parse_verdict(&completion.text, self.utility_threshold) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "unparseable verdict, using neutral verdict");
                EvaluationResult::neutral()
            }
        };

        Judgment {
            evaluation,
            tokens_used: completion.tokens_used,
        }
    }
}
