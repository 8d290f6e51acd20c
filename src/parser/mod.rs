//! Reply parsing: free-form model output in, pixel commands out.

pub mod extract;
pub mod grammar;
pub mod json;
pub mod narrative;

pub use extract::{Extractor, dedupe_last_wins, strip_fences};
pub use narrative::Narrative;

use crate::canvas::PixelCommand;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How a backend encodes pixel commands in its replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `pixels: x,y#hex ...` lines.
    Text,
    /// A JSON object with a `pixels` array or a `grid`, falling back to text.
    Json,
}

/// Which extraction strategy produced the commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Json,
    Keyword,
    WholeReply,
    PlaceholderRepair,
    Loose,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    Commands {
        commands: Vec<PixelCommand>,
        narrative: Narrative,
        strategy: Strategy,
    },
    /// Nothing extractable. The raw reply is kept for logging and the
    /// narrative for a clarifying re-prompt.
    Empty { raw: String, narrative: Narrative },
}

impl ParseResult {
    pub fn commands(&self) -> &[PixelCommand] {
        match self {
            Self::Commands { commands, .. } => commands,
            Self::Empty { .. } => &[],
        }
    }

    pub fn into_commands(self) -> Vec<PixelCommand> {
        match self {
            Self::Commands { commands, .. } => commands,
            Self::Empty { .. } => Vec::new(),
        }
    }

    pub fn narrative(&self) -> &Narrative {
        match self {
            Self::Commands { narrative, .. } | Self::Empty { narrative, .. } => narrative,
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match self {
            Self::Commands { strategy, .. } => Some(*strategy),
            Self::Empty { .. } => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.commands().is_empty()
    }
}
