use crate::canvas::{LocalCanvasState, NeighborSnapshot, PixelCommand, Position};
use tokio_util::sync::CancellationToken;

/// Outbound half of the canvas connection: one pixel at a time.
///
/// Sending must not block. Implementations queue the frame and return.
pub trait PixelSink: Send + Sync {
    fn send_pixel(&self, cmd: &PixelCommand) -> anyhow::Result<()>;
}

/// What the control loop needs from the shared canvas.
pub trait CanvasTransport: PixelSink {
    /// Transport identifier for logs (e.g. "websocket", "memory").
    fn name(&self) -> &str;

    /// This agent's cell in the world, once the server has assigned one.
    fn my_position(&self) -> Option<Position>;

    /// Per-direction summaries of the adjacent agents.
    fn neighbors(&self) -> Vec<NeighborSnapshot>;

    /// Cancelled when the connection is gone for good.
    fn lost(&self) -> CancellationToken;

    /// This agent's pixels as confirmed by the server.
    fn own_canvas(&self) -> LocalCanvasState {
        LocalCanvasState::new()
    }

    /// Remember the strategy this agent just declared.
    fn record_strategy(&self, _strategy: &str) {}

    fn is_connected(&self) -> bool {
        !self.lost().is_cancelled()
    }
}
