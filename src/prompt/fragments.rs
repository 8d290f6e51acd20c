use crate::error::PromptError;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// A fragment is written either as one string or as an array of lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    Text(String),
    Lines(Vec<String>),
}

impl Fragment {
    pub fn text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Lines(lines) => lines.join("\n"),
        }
    }
}

impl From<&str> for Fragment {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Shape of an override file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct FragmentFile {
    seed_system: Option<Fragment>,
    memory_context: Option<Fragment>,
    global_positioning: Option<Fragment>,
    continuation_system: Option<Fragment>,
    #[serde(default)]
    training: HashMap<String, Fragment>,
}

const SEED_SYSTEM: &[&str] = &[
    "You are one painter among many on a shared pixel canvas.",
    "You own a 20x20 grid (x and y from 0 to 19, origin top-left) at world position {{position}} ({{compass}}).",
    "",
    "Current state of your grid: {{colorPalette}}",
    "",
    "Start a drawing of your own. Suggested colors: {{colors}}.",
    "",
    "{{format}}",
];

const MEMORY_CONTEXT: &[&str] = &[
    "What you described last time:",
    "- your grid: {{localDescription}}",
    "- the whole canvas: {{globalDescription}}",
    "Your last strategy: {{last_strategy}}",
    "",
    "{{colorPalette}}",
];

const GLOBAL_POSITIONING: &[&str] = &[
    "Your grid sits at world position [{{myX}}, {{myY}}] ({{positionDescription}}).",
    "Your neighbors:",
    "{{neighbors}}",
    "{{neighborHint}}",
];

const CONTINUATION_SYSTEM: &[&str] = &[
    "Iteration {{iteration}}. Continue your drawing: refine it, extend it, or answer a neighbor.",
    "Fresh colors you may use: {{colors}}.",
    "",
    "Before the pixels, answer briefly:",
    "Q3: global vision of the canvas",
    "Q4: interesting neighbors",
    "Q5: my intention",
    "Q6: technical issues",
    "",
    "{{format}}",
];

/// Text templates the prompt is assembled from.
///
/// The built-in set is complete; an override file replaces fragments one
/// by one and adds or replaces training entries by exercise id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptLibrary {
    pub seed_system: Fragment,
    pub memory_context: Fragment,
    pub global_positioning: Fragment,
    pub continuation_system: Fragment,
    pub training: HashMap<String, Fragment>,
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PromptLibrary {
    pub fn builtin() -> Self {
        let lines = |l: &[&str]| Fragment::Lines(l.iter().map(ToString::to_string).collect());
        Self {
            seed_system: lines(SEED_SYSTEM),
            memory_context: lines(MEMORY_CONTEXT),
            global_positioning: lines(GLOBAL_POSITIONING),
            continuation_system: lines(CONTINUATION_SYSTEM),
            training: HashMap::new(),
        }
    }

    /// Built-in fragments overridden by the keys present in `json`.
    pub fn from_json(json: &str) -> Result<Self, PromptError> {
        let file: FragmentFile =
            serde_json::from_str(json).map_err(|e| PromptError::Library(e.to_string()))?;
        let mut library = Self::builtin();
        if let Some(f) = file.seed_system {
            library.seed_system = f;
        }
        if let Some(f) = file.memory_context {
            library.memory_context = f;
        }
        if let Some(f) = file.global_positioning {
            library.global_positioning = f;
        }
        if let Some(f) = file.continuation_system {
            library.continuation_system = f;
        }
        for (id, fragment) in file.training {
            library.training.insert(id.to_ascii_uppercase(), fragment);
        }
        Ok(library)
    }

    /// Load an override file. A leading `~` in the path is expanded.
    pub fn load(path: &str) -> Result<Self, PromptError> {
        let expanded = shellexpand::tilde(path).to_string();
        let content = std::fs::read_to_string(Path::new(&expanded))
            .map_err(|e| PromptError::Library(format!("{expanded}: {e}")))?;
        let library = Self::from_json(&content)?;
        tracing::info!(path = %expanded, training = library.training.len(), "prompt fragments loaded");
        Ok(library)
    }

    /// Override text for an exercise, if the library carries one.
    pub fn training_fragment(&self, exercise_id: &str) -> Option<String> {
        self.training
            .get(&exercise_id.trim().to_ascii_uppercase())
            .map(Fragment::text)
    }
}
