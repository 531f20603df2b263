//! LLM-backed reviewer and verdict parsing

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{info, warn};
use serde_json::json;

use super::{ReviewError, Reviewer};
use crate::domain::{ExecutionTrace, Plan, ReviewVerdict};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::{REVIEW_REQUEST, REVIEWER_SYSTEM};

const REVISE_MARKER: &str = "REVISE";
const COMPLETE_MARKER: &str = "COMPLETE";

/// Longest slice of an unusable reply quoted back in the Revise reason
const QUOTE_LIMIT: usize = 200;

#[derive(Debug, Clone)]
pub struct LlmReviewerConfig {
    /// Overrides the client's default model when set
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmReviewerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            timeout: Duration::from_secs(120),
        }
    }
}

pub struct LlmReviewer {
    client: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    config: LlmReviewerConfig,
}

impl LlmReviewer {
    pub fn new(client: Arc<dyn LlmClient>, renderer: Arc<PromptRenderer>, config: LlmReviewerConfig) -> Self {
        Self {
            client,
            renderer,
            config,
        }
    }

    fn build_request(&self, issue: &str, plan: &Plan, trace: &ExecutionTrace) -> crate::error::Result<CompletionRequest> {
        let system = self.renderer.render(REVIEWER_SYSTEM, &json!({}))?;
        let user = self.renderer.render(
            REVIEW_REQUEST,
            &json!({
                "issue": issue,
                "plan": plan.steps_json(),
                "results": trace.joined_output(),
            }),
        )?;
        let mut request = CompletionRequest::new(system)
            .with_user_message(user)
            .with_max_tokens(self.config.max_tokens);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        Ok(request)
    }
}

#[async_trait]
impl Reviewer for LlmReviewer {
    async fn review(&self, issue: &str, plan: &Plan, trace: &ExecutionTrace) -> Result<ReviewVerdict, ReviewError> {
        let request = match self.build_request(issue, plan, trace) {
            Ok(r) => r,
            Err(e) => return Ok(ReviewVerdict::revise(format!("review unavailable: {}", e))),
        };

        let verdict = match tokio::time::timeout(self.config.timeout, self.client.complete(request)).await {
            Err(_) => {
                warn!("reviewer timed out after {:?}", self.config.timeout);
                ReviewVerdict::revise(format!(
                    "review unavailable: timed out after {}ms",
                    self.config.timeout.as_millis()
                ))
            }
            Ok(Err(e)) if e.is_fatal() => return Err(ReviewError::Fatal(e.to_string())),
            Ok(Err(e)) => {
                warn!("reviewer call failed: {}", e);
                ReviewVerdict::revise(format!("review unavailable: {}", e))
            }
            Ok(Ok(response)) => parse_verdict(&response.content).unwrap_or_else(|| {
                warn!("reviewer reply had no verdict marker");
                let quoted: String = response.content.trim().chars().take(QUOTE_LIMIT).collect();
                ReviewVerdict::revise(format!("reviewer returned an unusable verdict: {}", quoted))
            }),
        };

        info!("review verdict: {}", verdict);
        Ok(verdict)
    }
}

/// Position of `word` in `upper` with no letter directly before or after it
fn find_word(upper: &str, word: &str) -> Option<usize> {
    upper.match_indices(word).map(|(i, _)| i).find(|&i| {
        let before = upper[..i].chars().next_back();
        let after = upper[i + word.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphabetic()) && !after.is_some_and(|c| c.is_alphabetic())
    })
}

/// Parse a reviewer reply. REVISE wins over COMPLETE when both appear.
/// Returns None when neither marker is present.
pub fn parse_verdict(text: &str) -> Option<ReviewVerdict> {
    let upper = text.to_ascii_uppercase();

    if let Some(pos) = find_word(&upper, REVISE_MARKER) {
        let rest = text[pos + REVISE_MARKER.len()..].trim_start_matches(|c: char| c == ':' || c == '-' || c.is_whitespace());
        let reason = if rest.trim().is_empty() { text.trim() } else { rest.trim() };
        return Some(ReviewVerdict::revise(reason));
    }

    if find_word(&upper, COMPLETE_MARKER).is_some() {
        return Some(ReviewVerdict::Complete);
    }

    None
}
