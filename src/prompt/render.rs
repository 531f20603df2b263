//! Prompt Renderer - render templates with context variables using Handlebars

use handlebars::Handlebars;
use serde::Serialize;

use super::templates::BUILTIN;
use crate::error::{FixloopError, Result};

/// Renders prompt templates using Handlebars
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptRenderer {
    /// Renderer with no templates registered
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Prompts are plain text; no HTML escaping
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    /// Renderer with the planner and reviewer templates registered
    pub fn with_builtin() -> Result<Self> {
        let mut renderer = Self::new();
        for (name, template) in BUILTIN {
            renderer.register_template(name, template)?;
        }
        Ok(renderer)
    }

    /// Register (or replace) a named template
    pub fn register_template(&mut self, name: &str, template: &str) -> Result<()> {
        self.handlebars
            .register_template_string(name, template)
            .map_err(|e| FixloopError::Generation(format!("Failed to register template '{}': {}", name, e)))
    }

    /// Render a registered template with any serializable context
    pub fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| FixloopError::Generation(format!("Failed to render template '{}': {}", name, e)))
    }

    /// Render an ad-hoc template string
    pub fn render_str<T: Serialize>(&self, template: &str, context: &T) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .map_err(|e| FixloopError::Generation(format!("Failed to render template: {}", e)))
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.handlebars.get_template(name).is_some()
    }
}
