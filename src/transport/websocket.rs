use super::events::{CanvasEvent, OutboundFrame};
use super::traits::{CanvasTransport, PixelSink};
use super::world::WorldView;
use crate::canvas::{LocalCanvasState, NeighborSnapshot, PixelCommand, Position};
use crate::error::TransportError;
use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_HEARTBEAT: Duration = Duration::from_secs(5);
/// How long `connect` waits for the server to assign an identity.
const INITIAL_STATE_TIMEOUT: Duration = Duration::from_secs(15);
/// Frames queued ahead of the socket; a full batch fits.
const OUTBOUND_CAPACITY: usize = 1024;

/// Live connection to the shared canvas server.
///
/// One background task owns the socket: it forwards queued frames, sends a
/// heartbeat on every tick and folds inbound events into the [`WorldView`].
/// When the socket closes the `lost` token is cancelled and never reset.
pub struct WebSocketTransport {
    outbound: mpsc::Sender<OutboundFrame>,
    world: Arc<Mutex<WorldView>>,
    lost: CancellationToken,
}

impl WebSocketTransport {
    pub async fn connect(url: &str, heartbeat: Duration) -> anyhow::Result<Self> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
            .with_context(|| format!("connect canvas websocket: {url}"))?;

        let (tx, rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let (ready_tx, mut ready_rx) = watch::channel(false);
        let world = Arc::new(Mutex::new(WorldView::new()));
        let lost = CancellationToken::new();

        tokio::spawn(run_socket(
            ws_stream,
            rx,
            Arc::clone(&world),
            ready_tx,
            lost.clone(),
            heartbeat,
        ));

        let identified = tokio::time::timeout(INITIAL_STATE_TIMEOUT, ready_rx.wait_for(|r| *r))
            .await
            .is_ok_and(|r| r.is_ok());
        if !identified {
            lost.cancel();
            return Err(TransportError::Connection(
                "no initial_state with an identity from the canvas server".into(),
            )
            .into());
        }

        let transport = Self {
            outbound: tx,
            world,
            lost,
        };
        tracing::info!(
            url,
            position = ?transport.my_position(),
            "canvas.connected"
        );
        Ok(transport)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.lost.cancel();
    }
}

impl PixelSink for WebSocketTransport {
    fn send_pixel(&self, cmd: &PixelCommand) -> anyhow::Result<()> {
        if self.lost.is_cancelled() {
            return Err(TransportError::Disconnected.into());
        }
        let frame = OutboundFrame::cell_update(cmd.x, cmd.y, &cmd.color.to_string());
        self.outbound
            .try_send(frame)
            .map_err(|e| TransportError::Send(e.to_string()).into())
    }
}

impl CanvasTransport for WebSocketTransport {
    fn name(&self) -> &str {
        "websocket"
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
        if let Ok(mut world) = self.world.lock()
            && let Some(me) = world.my_user_id().map(str::to_string)
        {
            world.set_strategy(&me, strategy);
        }
    }
}

async fn run_socket<S>(
    ws_stream: S,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    world: Arc<Mutex<WorldView>>,
    ready: watch::Sender<bool>,
    lost: CancellationToken,
    heartbeat: Duration,
) where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + Unpin,
{
    let (mut write, mut read) = ws_stream.split();
    let mut heartbeat = interval(heartbeat);

    loop {
        tokio::select! {
            () = lost.cancelled() => break,
            _ = heartbeat.tick() => {
                if let Err(e) = send_frame(&mut write, &OutboundFrame::Heartbeat).await {
                    tracing::warn!(error = %e, "canvas heartbeat failed");
                    break;
                }
            }
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = send_frame(&mut write, &frame).await {
                    tracing::warn!(error = %e, "canvas send failed");
                    break;
                }
            }
            message = read.next() => {
                let message = match message {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::warn!("canvas socket closed");
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "canvas socket error");
                        break;
                    }
                    Some(Ok(message)) => message,
                };
                let Some(text) = websocket_message_to_text(message) else {
                    continue;
                };
                match serde_json::from_str::<CanvasEvent>(&text) {
                    Ok(event) => {
                        if let Ok(mut view) = world.lock() {
                            view.apply(event);
                            if view.my_user_id().is_some() {
                                ready.send_replace(true);
                            }
                        }
                    }
                    Err(e) => tracing::debug!(error = %e, "unreadable canvas frame skipped"),
                }
            }
        }
    }
    lost.cancel();
}

async fn send_frame<W>(write: &mut W, frame: &OutboundFrame) -> anyhow::Result<()>
where
    W: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let payload = serde_json::to_string(frame)?;
    write
        .send(Message::Text(payload.into()))
        .await
        .map_err(|e| TransportError::Send(e.to_string()))?;
    Ok(())
}

fn websocket_message_to_text(message: Message) -> Option<String> {
    match message {
        Message::Text(text) => Some(text.to_string()),
        Message::Binary(bytes) => String::from_utf8(bytes.to_vec()).ok(),
        _ => None,
    }
}
