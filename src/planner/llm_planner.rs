//! LLM-backed planner.
//!
//! The model is offered the registry's tool definitions; the tool calls in its
//! reply become the plan's steps, in order. Nothing is executed here.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::{PlanContext, Planner};
use crate::domain::{Plan, Step};
use crate::error::Result;
use crate::llm::{CompletionRequest, CompletionResponse, LlmClient, ToolDefinition};
use crate::prompt::PromptRenderer;
use crate::prompt::templates::{PLAN_FRESH, PLAN_FROM_CACHE, PLAN_RECOVERY, PLANNER_SYSTEM};

/// Planner call settings
#[derive(Debug, Clone)]
pub struct LlmPlannerConfig {
    /// Overrides the client's default model when set
    pub model: Option<String>,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LlmPlannerConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 4096,
            timeout: Duration::from_secs(180),
        }
    }
}

pub struct LlmPlanner {
    client: Arc<dyn LlmClient>,
    renderer: Arc<PromptRenderer>,
    tools: Vec<ToolDefinition>,
    config: LlmPlannerConfig,
}

impl LlmPlanner {
    pub fn new(
        client: Arc<dyn LlmClient>,
        renderer: Arc<PromptRenderer>,
        tools: Vec<ToolDefinition>,
        config: LlmPlannerConfig,
    ) -> Self {
        Self {
            client,
            renderer,
            tools,
            config,
        }
    }

    fn build_request(&self, issue: &str, context: &PlanContext) -> Result<CompletionRequest> {
        let tool_list: Vec<Value> = self
            .tools
            .iter()
            .map(|t| json!({"name": t.name, "description": t.description}))
            .collect();
        let system = self.renderer.render(PLANNER_SYSTEM, &json!({ "tools": tool_list }))?;

        let user = match context {
            PlanContext::Fresh => self.renderer.render(PLAN_FRESH, &json!({ "issue": issue }))?,
            PlanContext::CacheSeeded(record) => self.renderer.render(
                PLAN_FROM_CACHE,
                &json!({
                    "issue": issue,
                    "cached_issue": record.issue,
                    "cached_plan": record.steps_json(),
                }),
            )?,
            PlanContext::RecoverySeeded {
                failed_plan,
                trace,
                reason,
            } => self.renderer.render(
                PLAN_RECOVERY,
                &json!({
                    "issue": issue,
                    "failed_plan": failed_plan.steps_json(),
                    "execution_results": trace.joined_output(),
                    "reason": reason,
                }),
            )?,
        };

        let mut request = CompletionRequest::new(system)
            .with_user_message(user)
            .with_tools(self.tools.clone())
            .with_max_tokens(self.config.max_tokens);
        if let Some(model) = &self.config.model {
            request = request.with_model(model.clone());
        }
        Ok(request)
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    async fn plan(&self, issue: &str, context: &PlanContext) -> Plan {
        let mode = context.mode();
        let request = match self.build_request(issue, context) {
            Ok(r) => r,
            Err(e) => {
                warn!("planner prompt failed ({}): {}; returning empty plan", mode.as_str(), e);
                return Plan::empty();
            }
        };

        let response = match tokio::time::timeout(self.config.timeout, self.client.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!("planner generation failed ({}): {}; returning empty plan", mode.as_str(), e);
                return Plan::empty();
            }
            Err(_) => {
                warn!(
                    "planner timed out after {:?} ({}); returning empty plan",
                    self.config.timeout,
                    mode.as_str()
                );
                return Plan::empty();
            }
        };

        let plan = Plan::new(steps_from_response(&response));
        info!("planner produced {} steps ({} context), plan {}", plan.len(), mode.as_str(), plan.id);
        plan
    }
}

/// Steps from a planner reply: tool calls first, else a JSON array in the text
pub fn steps_from_response(response: &CompletionResponse) -> Vec<Step> {
    if !response.tool_calls.is_empty() {
        return response
            .tool_calls
            .iter()
            .map(|call| step_from_value(&call.name, &call.input))
            .collect();
    }

    match extract_json_array(&response.content) {
        Some(items) => items
            .iter()
            .filter_map(|item| {
                let name = item
                    .get("tool_name")
                    .or_else(|| item.get("name"))
                    .and_then(Value::as_str)?;
                let params = item
                    .get("parameters")
                    .or_else(|| item.get("args"))
                    .or_else(|| item.get("input"))
                    .cloned()
                    .unwrap_or(Value::Null);
                Some(step_from_value(name, &params))
            })
            .collect(),
        None => {
            debug!("planner reply had no tool calls and no JSON plan");
            Vec::new()
        }
    }
}

/// Non-string argument values are kept as their JSON text
fn step_from_value(name: &str, input: &Value) -> Step {
    let mut step = Step::new(name);
    if let Some(obj) = input.as_object() {
        for (key, value) in obj {
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            step = step.with_param(key.clone(), text);
        }
    }
    step
}

fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Vec<Value>>(&text[start..=end]).ok()
}
