//! WebSocket read pump — dispatches incoming frames.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use stowbox_protocol::binary::parse_chunk_frame;
use stowbox_protocol::constants::{MessageType, WS_MAX_MESSAGE_SIZE, WS_PONG_WAIT};
use stowbox_protocol::envelope::Message;

use crate::streams::{StreamFrame, StreamMap};

pub(crate) type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<Message>>>>;

/// Reads frames from the WebSocket and dispatches them.
///
/// Text messages are routed to an open server stream by id first, then to a
/// pending unary request; binary frames always belong to a server stream.
/// A read deadline detects dead connections: if nothing arrives within
/// [`WS_PONG_WAIT`] the loop exits, which fails every pending request and
/// ends every open stream.
pub(crate) async fn read_pump<S>(
    mut read: S,
    pending: PendingMap,
    streams: StreamMap,
    write_tx: mpsc::Sender<tungstenite::Message>,
    cancel: CancellationToken,
) where
    S: StreamExt<Item = Result<tungstenite::Message, tungstenite::Error>> + Unpin,
{
    // Any incoming frame (not just Pong) resets the timer.
    let pong_deadline = tokio::time::sleep(WS_PONG_WAIT);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            () = &mut pong_deadline => {
                warn!("read deadline expired, connection dead");
                break;
            }

            msg = read.next() => {
                match msg {
                    Some(Ok(msg)) => {
                        pong_deadline.as_mut().reset(tokio::time::Instant::now() + WS_PONG_WAIT);

                        match msg {
                            tungstenite::Message::Text(text) => {
                                handle_text_message(&text, &pending, &streams).await;
                            }
                            tungstenite::Message::Binary(data) => {
                                handle_binary_frame(&data, &streams).await;
                            }
                            tungstenite::Message::Ping(data) => {
                                trace!("received ping, sending pong");
                                let _ = write_tx.send(tungstenite::Message::Pong(data)).await;
                            }
                            tungstenite::Message::Pong(_) => {
                                trace!("received pong");
                            }
                            tungstenite::Message::Close(_) => {
                                debug!("received close frame");
                                break;
                            }
                            _ => {}
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket read error: {e}");
                        break;
                    }
                    None => {
                        debug!("WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Fail every pending request and end every open stream: dropping the
    // senders wakes all waiters.
    pending.lock().await.clear();
    if let Ok(mut map) = streams.lock() {
        map.clear();
    }
}

/// Handles a text message from the WebSocket.
async fn handle_text_message(text: &str, pending: &PendingMap, streams: &StreamMap) {
    if text.len() > WS_MAX_MESSAGE_SIZE {
        warn!("message too large ({} bytes), dropping", text.len());
        return;
    }

    let msg: Message = match serde_json::from_str(text) {
        Ok(m) => m,
        Err(e) => {
            warn!("failed to parse message: {e}");
            return;
        }
    };

    trace!(msg_type = ?msg.msg_type, id = %msg.id, "received message");

    // An open server stream owns every message carrying its id.
    let stream_tx = streams
        .lock()
        .expect("stream registry poisoned")
        .get(&msg.id)
        .cloned();
    if let Some(tx) = stream_tx {
        let id = msg.id.clone();
        match msg.msg_type {
            MessageType::StreamEnd => {
                debug!(id = %id, "stream ended");
                remove_stream(streams, &id);
            }
            MessageType::Error => {
                // Forward so the consumer sees the failure, then end.
                let _ = tx.send(StreamFrame::Message(msg)).await;
                remove_stream(streams, &id);
            }
            _ => {
                let _ = tx.send(StreamFrame::Message(msg)).await;
            }
        }
        return;
    }

    // Route the response to a pending unary request.
    if let Some(tx) = pending.lock().await.remove(&msg.id) {
        let _ = tx.send(msg);
        return;
    }

    warn!(msg_type = ?msg.msg_type, id = %msg.id, "unsolicited message, dropping");
}

/// Handles a binary chunk frame from the WebSocket.
async fn handle_binary_frame(data: &[u8], streams: &StreamMap) {
    let (header, payload) = match parse_chunk_frame(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("failed to parse binary frame: {e}");
            return;
        }
    };

    let stream_tx = streams
        .lock()
        .expect("stream registry poisoned")
        .get(&header.id)
        .cloned();
    match stream_tx {
        Some(tx) => {
            let _ = tx
                .send(StreamFrame::Chunk {
                    header,
                    data: payload,
                })
                .await;
        }
        None => {
            warn!(id = %header.id, "binary frame for unknown stream, dropping");
        }
    }
}

fn remove_stream(streams: &StreamMap, id: &str) {
    if let Ok(mut map) = streams.lock() {
        map.remove(id);
    }
}
