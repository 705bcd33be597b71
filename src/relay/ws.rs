use axum::{
    debug_handler,
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use crate::{messages::Message, AppState};

use super::{Connection, MessageRouter};

pub const ADD_USER: &str = "/app/chat.addUser";
pub const PRIVATE: &str = "/app/chat.private";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "destination", content = "body")]
pub enum ClientFrame {
    #[serde(rename = "/app/chat.addUser")]
    AddUser(Message),
    #[serde(rename = "/app/chat.private")]
    Private(Message),
}

#[debug_handler(state = AppState)]
pub(crate) async fn relay_ws(
    State(router): State<MessageRouter>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| handle_socket(router, stream))
}

async fn handle_socket(router: MessageRouter, stream: WebSocket) {
    let Connection { id, mut queue, mut public, guard } = router.open();
    info!(connection = %id, "relay connection opened");

    let (mut sender, mut receiver) = stream.split();

    let forward_task = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                frame = queue.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
                frame = public.recv() => match frame {
                    Ok(frame) => frame,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(connection = %id, skipped, "public topic lagging");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let text = match serde_json::to_string(&frame) {
                Ok(text) => text,
                Err(err) => {
                    error!(connection = %id, error = %err, "unserializable frame");
                    continue;
                }
            };
            if sender.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // one frame at a time keeps a connection's events in arrival order
    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            WsMessage::Text(text) => text,
            WsMessage::Close(_) => break,
            _ => continue,
        };
        let frame = match serde_json::from_str::<ClientFrame>(text.as_str()) {
            Ok(frame) => frame,
            Err(err) => {
                debug!(connection = %id, error = %err, "skipping unreadable frame");
                continue;
            }
        };

        match frame {
            ClientFrame::AddUser(message) => router.join(id, &message.sender_username),
            ClientFrame::Private(message) => {
                if let Err(err) = router.send_private(id, message).await {
                    error!(connection = %id, error = %err, "private message not persisted");
                }
            }
        }
    }

    drop(guard);
    forward_task.abort();

    info!(connection = %id, "relay connection closed");
}
