use super::events::CanvasEvent;
use super::traits::{CanvasTransport, PixelSink};
use super::world::WorldView;
use crate::canvas::{LocalCanvasState, NeighborSnapshot, PixelCommand, Position};
use crate::error::TransportError;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// User id the in-memory canvas assigns to the local agent.
pub const LOCAL_USER: &str = "local";

/// A canvas that lives in this process: sent pixels are confirmed
/// immediately and recorded for inspection.
///
/// Backs offline runs and the integration tests.
pub struct MemoryTransport {
    world: Mutex<WorldView>,
    sent: Mutex<Vec<PixelCommand>>,
    reject_sends: AtomicBool,
    lost: CancellationToken,
}

impl MemoryTransport {
    pub fn new(position: Position) -> Self {
        let mut world = WorldView::new();
        world.apply(CanvasEvent::InitialState {
            grid_size: None,
            grid_state: super::events::GridState {
                user_positions: HashMap::from([(
                    LOCAL_USER.to_string(),
                    vec![Value::from(position.x), Value::from(position.y)],
                )]),
            },
            sub_cell_states: HashMap::new(),
            my_user_id: Some(LOCAL_USER.to_string()),
        });
        Self {
            world: Mutex::new(world),
            sent: Mutex::new(Vec::new()),
            reject_sends: AtomicBool::new(false),
            lost: CancellationToken::new(),
        }
    }

    /// Feed a server event, e.g. a neighbor joining or painting.
    pub fn apply(&self, event: CanvasEvent) {
        if let Ok(mut world) = self.world.lock() {
            world.apply(event);
        }
    }

    pub fn sent(&self) -> Vec<PixelCommand> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Make subsequent sends fail as if the socket were full.
    pub fn reject_sends(&self, reject: bool) {
        self.reject_sends.store(reject, Ordering::SeqCst);
    }

    pub fn disconnect(&self) {
        self.lost.cancel();
    }
}

impl PixelSink for MemoryTransport {
    fn send_pixel(&self, cmd: &PixelCommand) -> anyhow::Result<()> {
        if self.lost.is_cancelled() {
            return Err(TransportError::Disconnected.into());
        }
        if self.reject_sends.load(Ordering::SeqCst) {
            return Err(TransportError::Send("outbound queue full".into()).into());
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(*cmd);
        }
        self.apply(CanvasEvent::CellUpdate {
            user_id: Some(LOCAL_USER.to_string()),
            sub_x: cmd.x,
            sub_y: cmd.y,
            color: cmd.color.to_string(),
        });
        Ok(())
    }
}

impl CanvasTransport for MemoryTransport {
    fn name(&self) -> &str {
        "memory"
    }

    fn my_position(&self) -> Option<Position> {
        self.world.lock().ok().and_then(|w| w.my_position())
    }

    fn neighbors(&self) -> Vec<NeighborSnapshot> {
        self.world
            .lock()
            .map(|w| w.neighbors())
            .unwrap_or_default()
    }

    fn lost(&self) -> CancellationToken {
        self.lost.clone()
    }

    fn own_canvas(&self) -> LocalCanvasState {
        self.world
            .lock()
            .map(|w| w.own_canvas().clone())
            .unwrap_or_default()
    }

    fn record_strategy(&self, strategy: &str) {
        if let Ok(mut world) = self.world.lock() {
            world.set_strategy(LOCAL_USER, strategy);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Direction;
    use crate::color::HexColor;

    #[test]
    fn sends_are_recorded_and_confirmed() {
        let transport = MemoryTransport::new(Position::new(1, 1));
        let cmd = PixelCommand::new(0, 0, HexColor::from_rgb(1, 2, 3));
        transport.send_pixel(&cmd).unwrap();
        assert_eq!(transport.sent(), vec![cmd]);
        assert_eq!(transport.my_position(), Some(Position::new(1, 1)));
    }

    #[test]
    fn neighbors_come_from_applied_events() {
        let transport = MemoryTransport::new(Position::new(0, 0));
        transport.apply(CanvasEvent::NewUser {
            user_id: "south".into(),
            position: Some(vec![Value::from(0), Value::from(1)]),
        });
        let neighbors = transport.neighbors();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].direction, Direction::S);
    }

    #[test]
    fn disconnect_fails_sends() {
        let transport = MemoryTransport::new(Position::default());
        transport.disconnect();
        assert!(!transport.is_connected());
        assert!(transport.send_pixel(&PixelCommand::new(0, 0, HexColor::BLACK)).is_err());
    }
}
