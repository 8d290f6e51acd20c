use super::context::{PromptContext, sanitize_custom_prompt};
use super::engine::TeraEngine;
use super::fragments::PromptLibrary;
use super::renderer::{self, Vars};
use crate::error::PromptError;

/// Task line sent when the user gave no custom prompt.
pub const DEFAULT_TASK: &str = "Please provide your grid recommendation";

/// Appended to the instruction when images travel with the request.
pub const ATTACHMENT_NOTE: &str =
    "[img]: Global canvas showing all agents (your grid has a GRAY BORDER)";

/// Marker that turns a custom prompt into a verbatim training instruction.
const TRAINING_MARKER: &str = "TRAINING";

/// Which fragments produced the instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    Seed,
    Continuation,
    Exercise,
    Custom,
}

/// A prompt ready for an adapter: system-side instruction plus the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub instruction: String,
    pub task: String,
    pub kind: PromptKind,
    /// Continuation prompts reference the canvas image.
    pub wants_attachments: bool,
}

impl RenderedPrompt {
    /// Mention the attached images in the instruction.
    pub fn note_attachments(&mut self) {
        self.instruction.push_str("\n\n");
        self.instruction.push_str(ATTACHMENT_NOTE);
    }

    /// A follow-up asking for pixels only, reusing this instruction.
    pub fn clarify(&self, intention: &str) -> Self {
        let intention = if intention.trim().is_empty() {
            "(not stated)"
        } else {
            intention.trim()
        };
        Self {
            instruction: self.instruction.clone(),
            task: format!(
                "You explained your intention but didn't generate the pixels command. \
                 Please generate the pixels now based on your intention: {intention}. \
                 Use the format: pixels: x,y#HEX x,y#HEX ..."
            ),
            kind: self.kind,
            wants_attachments: false,
        }
    }
}

/// Assembles per-iteration prompts from the fragment library.
pub struct PromptBuilder {
    library: PromptLibrary,
    engine: TeraEngine,
}

impl PromptBuilder {
    pub fn new(library: PromptLibrary) -> Result<Self, PromptError> {
        Ok(Self {
            library,
            engine: TeraEngine::new()?,
        })
    }

    pub fn library(&self) -> &PromptLibrary {
        &self.library
    }

    /// Pick and render the fragments for `ctx`.
    ///
    /// Precedence: active exercise, then a custom prompt carrying the
    /// training marker, then seed (iteration 0 or 1), then continuation.
    pub fn build(&self, ctx: &PromptContext) -> Result<RenderedPrompt, PromptError> {
        let vars = ctx.vars(&self.engine)?;
        let custom = ctx
            .custom_prompt
            .as_deref()
            .map(sanitize_custom_prompt)
            .filter(|c| !c.is_empty());

        let (kind, template) = if let Some(exercise) = ctx.exercise {
            let text = self
                .library
                .training_fragment(exercise.id)
                .unwrap_or_else(|| exercise.prompt.to_string());
            (PromptKind::Exercise, text)
        } else if let Some(c) = custom.as_deref()
            && c.contains(TRAINING_MARKER)
        {
            (PromptKind::Custom, c.to_string())
        } else if ctx.iteration <= 1 {
            (PromptKind::Seed, self.library.seed_system.text())
        } else {
            let text = [
                self.library.memory_context.text(),
                self.library.global_positioning.text(),
                self.library.continuation_system.text(),
            ]
            .join("\n\n");
            (PromptKind::Continuation, text)
        };

        let instruction = render_checked(&template, &vars);
        let task = match (kind, custom) {
            (PromptKind::Seed | PromptKind::Continuation, Some(c)) => c,
            _ => DEFAULT_TASK.to_string(),
        };

        Ok(RenderedPrompt {
            instruction: instruction.trim().to_string(),
            task,
            kind,
            wants_attachments: kind == PromptKind::Continuation,
        })
    }
}

fn render_checked(template: &str, vars: &Vars) -> String {
    let rendered = renderer::render(template, vars);
    let left = renderer::unresolved(&rendered);
    if !left.is_empty() {
        tracing::debug!(placeholders = ?left, "placeholders left unresolved");
    }
    rendered
}
