use super::events::{CanvasEvent, parse_cell_key, parse_position};
use crate::canvas::{
    Direction, GRID_SIZE, LocalCanvasState, MAX_COORD, NeighborSnapshot, PixelCommand, PixelDelta,
    Position, in_bounds,
};
use crate::color::HexColor;
use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use strum::IntoEnumIterator;

/// Recent pixel changes kept per user.
pub const RECENT_CAPACITY: usize = 200;

#[derive(Debug, Default)]
struct UserCanvas {
    position: Option<Position>,
    pixels: HashMap<(i32, i32), HexColor>,
    recent: VecDeque<PixelDelta>,
    last_strategy: Option<String>,
}

impl UserCanvas {
    fn color_at(&self, x: i32, y: i32) -> HexColor {
        self.pixels.get(&(x, y)).copied().unwrap_or(HexColor::BLACK)
    }

    fn record(&mut self, x: i32, y: i32, color: HexColor) {
        self.pixels.insert((x, y), color);
        self.recent.push_front(PixelDelta {
            x,
            y,
            color,
            at: Utc::now(),
        });
        self.recent.truncate(RECENT_CAPACITY);
    }
}

/// Everything known about the shared canvas, built from server events.
#[derive(Debug, Default)]
pub struct WorldView {
    my_user_id: Option<String>,
    grid_size: Option<u32>,
    users: HashMap<String, UserCanvas>,
    own: LocalCanvasState,
}

impl WorldView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn my_user_id(&self) -> Option<&str> {
        self.my_user_id.as_deref()
    }

    pub fn grid_size(&self) -> Option<u32> {
        self.grid_size
    }

    pub fn my_position(&self) -> Option<Position> {
        self.my_user_id
            .as_ref()
            .and_then(|id| self.users.get(id))
            .and_then(|u| u.position)
    }

    /// This agent's pixels as confirmed by the server.
    pub fn own_canvas(&self) -> &LocalCanvasState {
        &self.own
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn set_strategy(&mut self, user_id: &str, strategy: &str) {
        self.users.entry(user_id.to_string()).or_default().last_strategy =
            Some(strategy.to_string());
    }

    /// Fold one server event into the view.
    pub fn apply(&mut self, event: CanvasEvent) {
        match event {
            CanvasEvent::InitialState {
                grid_size,
                grid_state,
                sub_cell_states,
                my_user_id,
            } => {
                if self.my_user_id.is_none() {
                    self.my_user_id = my_user_id;
                }
                if grid_size.is_some() {
                    self.grid_size = grid_size;
                }
                for (uid, raw) in &grid_state.user_positions {
                    let position = parse_position(raw);
                    let user = self.users.entry(uid.clone()).or_default();
                    if position.is_some() {
                        user.position = position;
                    }
                }
                for (uid, cells) in sub_cell_states {
                    let pixels = cells
                        .iter()
                        .filter_map(|(key, color)| {
                            let (x, y) = parse_cell_key(key)?;
                            let color = HexColor::parse(color).ok()?;
                            in_bounds(x, y).then_some(((x, y), color))
                        })
                        .collect();
                    self.users.entry(uid).or_default().pixels = pixels;
                }
                self.mirror_own();
            }
            CanvasEvent::CellUpdate {
                user_id: Some(uid),
                sub_x,
                sub_y,
                color,
            } => {
                let Ok(color) = HexColor::parse(&color) else {
                    tracing::debug!(user = %uid, color = %color, "cell update with invalid color dropped");
                    return;
                };
                if !in_bounds(sub_x, sub_y) {
                    return;
                }
                if self.my_user_id.as_deref() == Some(uid.as_str()) {
                    self.own.mark_painted(&PixelCommand::new(sub_x, sub_y, color));
                }
                self.users.entry(uid).or_default().record(sub_x, sub_y, color);
            }
            CanvasEvent::NewUser { user_id, position } => {
                let user = self.users.entry(user_id).or_default();
                if let Some(p) = position.as_deref().and_then(parse_position) {
                    user.position = Some(p);
                }
            }
            CanvasEvent::UserLeft { user_id } => {
                self.users.remove(&user_id);
            }
            CanvasEvent::CellUpdate { user_id: None, .. } | CanvasEvent::Unknown => {}
        }
    }

    fn mirror_own(&mut self) {
        let Some(me) = self.my_user_id.as_ref().and_then(|id| self.users.get(id)) else {
            return;
        };
        let cells: Vec<PixelCommand> = me
            .pixels
            .iter()
            .map(|(&(x, y), &color)| PixelCommand::new(x, y, color))
            .collect();
        self.own.clear();
        for cell in &cells {
            self.own.mark_painted(cell);
        }
    }

    /// One snapshot per occupied compass direction, in direction order.
    pub fn neighbors(&self) -> Vec<NeighborSnapshot> {
        let Some(origin) = self.my_position() else {
            return Vec::new();
        };
        let me = self.my_user_id.as_deref();
        let own_colors: HashSet<HexColor> =
            self.own.rows().into_iter().flatten().filter(|c| !c.is_black()).collect();

        Direction::iter()
            .filter_map(|direction| {
                let target = direction.neighbor_of(origin);
                let (uid, user) = self
                    .users
                    .iter()
                    .find(|(uid, u)| Some(uid.as_str()) != me && u.position == Some(target))?;
                Some(self.snapshot(uid, user, direction, target, &own_colors))
            })
            .collect()
    }

    fn snapshot(
        &self,
        uid: &str,
        user: &UserCanvas,
        direction: Direction,
        position: Position,
        own_colors: &HashSet<HexColor>,
    ) -> NeighborSnapshot {
        let theirs: HashSet<HexColor> = user.pixels.values().copied().collect();
        let echo_ratio = if theirs.is_empty() {
            0.0
        } else {
            ratio(theirs.intersection(own_colors).count(), theirs.len())
        };

        let edge = shared_edge(direction);
        let (border_similarity, border_palette) = match edge {
            Some(pairs) if !user.pixels.is_empty() => {
                let matches = pairs
                    .iter()
                    .filter(|&&((mx, my), (tx, ty))| {
                        self.own.get(mx, my).unwrap_or(HexColor::BLACK) == user.color_at(tx, ty)
                    })
                    .count();
                let mut palette: Vec<HexColor> = Vec::new();
                for &(_, (tx, ty)) in &pairs {
                    if let Some(c) = user.pixels.get(&(tx, ty))
                        && !palette.contains(c)
                    {
                        palette.push(*c);
                    }
                }
                (ratio(matches, pairs.len()), palette)
            }
            _ => (0.0, Vec::new()),
        };

        NeighborSnapshot {
            user_id: uid.to_string(),
            direction,
            position,
            pixel_count: user.pixels.len(),
            recent: user.recent.iter().cloned().collect(),
            last_strategy: user.last_strategy.clone(),
            border_similarity,
            echo_ratio,
            border_palette,
        }
    }
}

/// Cell pairs `(mine, theirs)` facing each other across a cardinal edge.
fn shared_edge(direction: Direction) -> Option<Vec<((i32, i32), (i32, i32))>> {
    let span = 0..GRID_SIZE;
    let pairs = match direction {
        Direction::W => span.map(|y| ((0, y), (MAX_COORD, y))).collect(),
        Direction::E => span.map(|y| ((MAX_COORD, y), (0, y))).collect(),
        Direction::N => span.map(|x| ((x, 0), (x, MAX_COORD))).collect(),
        Direction::S => span.map(|x| ((x, MAX_COORD), (x, 0))).collect(),
        _ => return None,
    };
    Some(pairs)
}

#[allow(clippy::cast_precision_loss)]
fn ratio(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}
