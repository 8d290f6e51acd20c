use crate::canvas::Position;
use crate::color::normalize_hex;
use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Frames the canvas server pushes to every agent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasEvent {
    InitialState {
        #[serde(default)]
        grid_size: Option<u32>,
        #[serde(default, deserialize_with = "grid_state")]
        grid_state: GridState,
        /// Per user, `"x,y"` → color.
        #[serde(default)]
        sub_cell_states: HashMap<String, HashMap<String, String>>,
        #[serde(default)]
        my_user_id: Option<String>,
    },
    CellUpdate {
        #[serde(default)]
        user_id: Option<String>,
        sub_x: i32,
        sub_y: i32,
        color: String,
    },
    NewUser {
        user_id: String,
        #[serde(default)]
        position: Option<Vec<Value>>,
    },
    UserLeft {
        user_id: String,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GridState {
    /// Positions arrive as `[x, y]`, sometimes with string components.
    #[serde(default)]
    pub user_positions: HashMap<String, Vec<Value>>,
}

impl GridState {
    pub fn position_of(&self, user_id: &str) -> Option<Position> {
        self.user_positions.get(user_id).and_then(|p| parse_position(p))
    }
}

/// `grid_state` is either an object or that object JSON-encoded in a string.
fn grid_state<'de, D: Deserializer<'de>>(deserializer: D) -> Result<GridState, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Object(GridState),
        Encoded(String),
        Null(()),
    }
    match Raw::deserialize(deserializer)? {
        Raw::Object(state) => Ok(state),
        Raw::Encoded(text) => serde_json::from_str(&text).map_err(serde::de::Error::custom),
        Raw::Null(()) => Ok(GridState::default()),
    }
}

/// `[x, y]` with numeric or numeric-string components.
pub fn parse_position(raw: &[Value]) -> Option<Position> {
    let axis = |v: &Value| -> Option<i32> {
        match v {
            Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    };
    match raw {
        [x, y] => Some(Position::new(axis(x)?, axis(y)?)),
        _ => None,
    }
}

/// Parse a `"x,y"` sub-cell key.
pub fn parse_cell_key(key: &str) -> Option<(i32, i32)> {
    let (x, y) = key.split_once(',')?;
    Some((x.trim().parse().ok()?, y.trim().parse().ok()?))
}

/// Frames this agent sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    CellUpdate { sub_x: i32, sub_y: i32, color: String },
    Heartbeat,
}

impl OutboundFrame {
    /// A paint frame; short hex colors are expanded to six digits.
    pub fn cell_update(sub_x: i32, sub_y: i32, color: &str) -> Self {
        let color = normalize_hex(color).unwrap_or_else(|_| color.to_string());
        Self::CellUpdate {
            sub_x,
            sub_y,
            color,
        }
    }
}
