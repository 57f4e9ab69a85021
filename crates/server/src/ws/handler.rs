use axum::{
    extract::{ws::{Message, WebSocket}, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::middleware::auth::session_for_token;
use crate::models::AuthSession;
use crate::ws::registry::OutboundFrame;
use crate::AppState;

/// Client-to-server frames. Everything that mutates state travels over
/// HTTP; the socket only carries typing signals and keepalives inbound.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
enum ClientFrame {
    Typing { chat_id: String, active: bool },
    Ping,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    query: axum::extract::Query<std::collections::HashMap<String, String>>,
    headers: axum::http::HeaderMap,
) -> impl IntoResponse {
    // Token comes from a query param or the Authorization header
    let auth = extract_session(&state, &headers, &query).await;

    ws.on_upgrade(move |socket| handle_socket(socket, state, auth))
}

async fn extract_session(
    state: &AppState,
    headers: &axum::http::HeaderMap,
    query: &std::collections::HashMap<String, String>,
) -> Option<AuthSession> {
    let token_from_query = query.get("token").cloned();

    let token_from_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.to_string());

    let token = token_from_query.or(token_from_header)?;
    if token.is_empty() {
        return None;
    }

    session_for_token(state, &token).await
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, auth: Option<AuthSession>) {
    let auth = match auth {
        Some(auth) => auth,
        None => return,
    };
    let session_id = auth.session.id.clone();

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundFrame>();

    state.registry.register(&session_id, tx.clone()).await;
    tracing::info!(
        user = auth.user.id,
        session = %session_id,
        "live channel up ({} connected)",
        state.registry.connection_count().await
    );

    // Task to forward registry frames to the WebSocket
    let send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let sent = match frame {
                OutboundFrame::Event(text) => ws_tx.send(Message::Text(text.into())).await,
                OutboundFrame::Ping => ws_tx.send(Message::Ping(vec![].into())).await,
                OutboundFrame::Close => {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                }
            };
            if sent.is_err() {
                break;
            }
        }
    });

    // Receive loop
    let state_clone = state.clone();
    let user_id = auth.user.id;
    let session_clone = session_id.clone();
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_rx.next().await {
            match msg {
                Message::Text(text) => {
                    let text_str: &str = &text;
                    if let Ok(frame) = serde_json::from_str::<ClientFrame>(text_str) {
                        handle_client_frame(&state_clone, user_id, &session_clone, frame).await;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    state.registry.unregister(&session_id, &tx).await;
    tracing::info!(session = %session_id, "live channel down");
}

async fn handle_client_frame(
    state: &AppState,
    user_id: i64,
    session_id: &str,
    frame: ClientFrame,
) {
    match frame {
        ClientFrame::Typing { chat_id, active } => {
            // Typing echoes to everyone except the originating device
            match state.chat_service.typing(user_id, &chat_id, active).await {
                Ok(request) => state.notifier.deliver(request, Some(session_id)).await,
                Err(err) => {
                    tracing::debug!(user = user_id, chat = %chat_id, "typing signal rejected: {err}");
                }
            }
        }
        ClientFrame::Ping => {}
    }
}
