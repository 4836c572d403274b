//! WebSocket endpoints.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tally_state::{NotificationFilter, SentNotification};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::{Stream, StreamExt};
use tracing::warn;

use crate::state::AppState;

/// WebSocket message for the notification stream.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationStreamMessage {
    /// Subscription established.
    Connected { filter: NotificationFilter },
    /// An outbound chat message.
    Notification(SentNotification),
    /// The subscriber fell behind and missed messages.
    Lagged { skipped: u64 },
}

/// Live stream of outbound notifications, optionally filtered by recipient
/// or thread.
pub async fn notification_stream(
    ws: WebSocketUpgrade,
    Query(filter): Query<NotificationFilter>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_notification_stream(socket, filter, state))
}

async fn handle_notification_stream(
    mut socket: WebSocket,
    filter: NotificationFilter,
    state: AppState,
) {
    let messages = notification_messages(state.notifier.subscribe(), filter);
    tokio::pin!(messages);

    loop {
        tokio::select! {
            next = messages.next() => {
                let Some(msg) = next else { break };
                if send_json(&mut socket, &msg).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = socket.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }
}

/// Messages for one subscriber: a greeting, then every notification matching
/// `filter`, with a marker wherever the subscriber fell behind.
pub fn notification_messages(
    receiver: broadcast::Receiver<SentNotification>,
    filter: NotificationFilter,
) -> impl Stream<Item = NotificationStreamMessage> {
    let hello = NotificationStreamMessage::Connected {
        filter: filter.clone(),
    };
    let updates = BroadcastStream::new(receiver).filter_map(move |next| match next {
        Ok(sent) if filter.matches(&sent.notification) => {
            Some(NotificationStreamMessage::Notification(sent))
        }
        Ok(_) => None,
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            warn!(skipped, "notification subscriber lagged");
            Some(NotificationStreamMessage::Lagged { skipped })
        }
    });
    tokio_stream::once(hello).chain(updates)
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, msg: &T) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(msg) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "failed to encode stream message");
            return Ok(());
        }
    };
    socket.send(Message::Text(json)).await
}
