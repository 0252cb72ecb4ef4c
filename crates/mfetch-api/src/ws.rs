//! Realtime status channel.
//!
//! Each connection gets a reader loop, a writer task draining the
//! connection's event sink, and a processor task that answers the
//! connection's frames one at a time in arrival order. Rejected frames go
//! through the same queue, so their `error` never interleaves with the events
//! of an earlier request.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use mfetch_models::{ClientRequest, RequestType, StatusEvent};
use mfetch_worker::{ChannelSink, EventSink, JobOrchestrator};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::state::AppState;

const ENDPOINT: &str = "ws";

/// Global counter for active WebSocket connections.
static ACTIVE_WS_CONNECTIONS: AtomicI64 = AtomicI64::new(0);

/// Upgrade to the status channel.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        metrics::record_ws_connection(ENDPOINT);
        let count = ACTIVE_WS_CONNECTIONS.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_ws_active_connections(count);

        handle_socket(socket, state).await;

        let count = ACTIVE_WS_CONNECTIONS.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::set_ws_active_connections(count);
    })
}

/// One queued frame: a request to run, or the error answer for a frame that
/// cannot be run.
pub type QueuedFrame = Result<ClientRequest, StatusEvent>;

/// Decode one text frame into a request that is ready to run.
pub fn parse_request(text: &str) -> Result<ClientRequest, StatusEvent> {
    let request: ClientRequest = serde_json::from_str(text)
        .map_err(|e| StatusEvent::error(format!("Invalid request: {}", e)))?;
    request
        .validate_source()
        .map_err(|e| StatusEvent::error(format!("Invalid URL: {}", e)))?;
    Ok(request)
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (sink, mut events) = ChannelSink::channel();
    let sink = Arc::new(sink);

    info!("Status channel opened");

    let send_task = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "Failed to serialize status event");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json)).await.is_err() {
                debug!("Client went away, stopping writer");
                break;
            }
            metrics::record_ws_message_sent(ENDPOINT, event.status.as_str());
        }
    });

    let (request_tx, request_rx) = mpsc::unbounded_channel();
    tokio::spawn(process_requests(
        state.orchestrator.clone(),
        request_rx,
        Arc::clone(&sink),
    ));

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                metrics::record_ws_message_received(ENDPOINT);
                if request_tx.send(parse_request(&text)).is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "Status channel read failed");
                break;
            }
        }
    }

    // In-flight work keeps running; its events are dropped from here on.
    drop(request_tx);
    send_task.abort();
    info!("Status channel closed");
}

/// Answer queued frames in order until the queue closes.
pub async fn process_requests(
    orchestrator: JobOrchestrator,
    mut frames: mpsc::UnboundedReceiver<QueuedFrame>,
    sink: Arc<ChannelSink>,
) {
    while let Some(frame) = frames.recv().await {
        if sink.is_closed() {
            debug!("Client disconnected, skipping queued frame");
            continue;
        }

        let request = match frame {
            Ok(request) => request,
            Err(event) => {
                sink.send(event);
                continue;
            }
        };

        match request.kind {
            RequestType::GetFormats => {
                if let Err(e) = orchestrator.get_formats(&request.url, sink.as_ref()).await {
                    debug!(url = %request.url, error = %e, "Format lookup failed");
                }
            }
            RequestType::Download => {
                let job_sink: Arc<dyn EventSink> = sink.clone();
                if let Err(e) = orchestrator.download(&request, job_sink).await {
                    debug!(url = %request.url, error = %e, "Download failed");
                }
            }
        }
    }
}
