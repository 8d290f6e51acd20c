mod builder;
mod context;
mod engine;
mod fragments;
pub mod renderer;

pub use builder::{ATTACHMENT_NOTE, DEFAULT_TASK, PromptBuilder, PromptKind, RenderedPrompt};
pub use context::{PromptContext, format_hint, sanitize_custom_prompt};
pub use engine::TeraEngine;
pub use fragments::{Fragment, PromptLibrary};
