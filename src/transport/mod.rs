pub mod events;
pub mod memory;
pub mod traits;
pub mod websocket;
pub mod world;

pub use events::{CanvasEvent, GridState, OutboundFrame};
pub use memory::{LOCAL_USER, MemoryTransport};
pub use traits::{CanvasTransport, PixelSink};
pub use websocket::{DEFAULT_HEARTBEAT, WebSocketTransport};
pub use world::{RECENT_CAPACITY, WorldView};
