//! Plan and Step types
//!
//! A Plan is an ordered, immutable sequence of tool invocations. Every
//! planning round produces a new Plan with its own id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::id::generate_plan_id;

/// Parameter key that marks a step as touching a file
pub const FILE_PATH_PARAM: &str = "file_path";

/// One tool invocation within a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Tool identifier (e.g. "read_file")
    pub tool_name: String,

    /// Named parameters passed to the tool
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

impl Step {
    /// Create a step with no parameters
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter value
    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    /// The file path this step references, if any
    pub fn file_path(&self) -> Option<&str> {
        self.param(FILE_PATH_PARAM)
    }
}

/// An ordered sequence of steps produced by one planning round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique per planning round
    pub id: String,

    /// Steps in execution order
    pub steps: Vec<Step>,
}

impl Plan {
    /// Create a plan with a fresh id
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            id: generate_plan_id(),
            steps,
        }
    }

    /// A plan with no steps
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter()
    }

    /// Distinct file paths referenced across all steps
    pub fn touched_files(&self) -> BTreeSet<String> {
        self.steps
            .iter()
            .filter_map(|s| s.file_path())
            .map(str::to_string)
            .collect()
    }

    /// Steps as pretty-printed JSON (`[{tool_name, parameters}, ...]`)
    pub fn steps_json(&self) -> String {
        serde_json::to_string_pretty(&self.steps).unwrap_or_else(|_| "[]".to_string())
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Plan {
        Plan::new(vec![
            Step::new("list_files").with_param("directory", "."),
            Step::new("read_file").with_param("file_path", "src/app.py"),
            Step::new("write_file")
                .with_param("file_path", "src/app.py")
                .with_param("content", "print('fixed')"),
            Step::new("read_file").with_param("file_path", "README.md"),
        ])
    }

    #[test]
    fn test_step_builder() {
        let step = Step::new("read_file").with_param("file_path", "a.txt");
        assert_eq!(step.tool_name, "read_file");
        assert_eq!(step.param("file_path"), Some("a.txt"));
        assert_eq!(step.file_path(), Some("a.txt"));
        assert_eq!(step.param("missing"), None);
    }

    #[test]
    fn test_touched_files_are_distinct() {
        let files = sample_plan().touched_files();
        assert_eq!(files.len(), 2);
        assert!(files.contains("src/app.py"));
        assert!(files.contains("README.md"));
    }

    #[test]
    fn test_list_files_only_touches_nothing() {
        let plan = Plan::new(vec![Step::new("list_files")]);
        assert!(plan.touched_files().is_empty());
    }

    #[test]
    fn test_new_plans_get_distinct_ids() {
        let a = Plan::new(vec![Step::new("list_files")]);
        let b = Plan::new(a.steps.clone());
        assert_ne!(a.id, b.id);
        assert_eq!(a.steps, b.steps);
    }

    #[test]
    fn test_step_json_shape() {
        let step = Step::new("write_file")
            .with_param("file_path", "x.py")
            .with_param("content", "pass");
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["tool_name"], "write_file");
        assert_eq!(json["parameters"]["file_path"], "x.py");
    }

    #[test]
    fn test_step_missing_parameters_defaults_empty() {
        let step: Step = serde_json::from_str(r#"{"tool_name": "list_files"}"#).unwrap();
        assert!(step.parameters.is_empty());
    }

    #[test]
    fn test_steps_json_empty_plan() {
        assert_eq!(Plan::empty().steps_json(), "[]");
    }
}
