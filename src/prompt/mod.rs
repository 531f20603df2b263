//! Prompt system - Handlebars rendering of the built-in planner and reviewer prompts

mod render;
pub mod templates;

pub use render::PromptRenderer;
