//! Per-socket handling: registration, the login path, and hand-off of
//! everything else to the dispatcher.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde_json::Value;

use cairn_core::{CallFrame, ReplyFrame, RequestId};
use cairn_services::{Args, Outbound, Reply, SessionHandle};

use super::{Shared, TransportEvent};

pub(crate) fn router(shared: Arc<Shared>) -> Router {
    Router::new()
        .route("/", get(ws_upgrade))
        .route("/ws", get(ws_upgrade))
        .with_state(shared)
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(shared): State<Arc<Shared>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, peer, shared))
}

async fn handle_socket(socket: WebSocket, peer: SocketAddr, shared: Arc<Shared>) {
    let (session, mut outbound) = SessionHandle::new(peer);
    let session_id = session.id;
    shared.registry.add(session.clone());
    shared.emit(TransportEvent::SessionOpened {
        session_id,
        peer_addr: peer,
    });
    tracing::info!(%session_id, %peer, "session opened");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(item) = outbound.recv().await {
            match item {
                Outbound::Text(text) => {
                    if sink.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let reader = async {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Text(text)) => handle_text(&shared, &session, text.as_str()),
                Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                    Ok(text) => handle_text(&shared, &session, text),
                    Err(e) => request_error(&shared, &session, e.to_string()),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(%session_id, error = %e, "socket read failed");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {}
        _ = &mut writer => {}
    }

    shared.registry.remove(&session_id);
    writer.abort();
    shared.emit(TransportEvent::SessionClosed { session_id });
    tracing::info!(%session_id, "session closed");
}

fn handle_text(shared: &Arc<Shared>, session: &SessionHandle, text: &str) {
    let frame = match CallFrame::parse(text) {
        Ok(frame) => frame,
        Err(e) => {
            request_error(shared, session, e.to_string());
            return;
        }
    };

    if let Some(auth) = frame.login_auth() {
        tokio::spawn(login(
            shared.clone(),
            session.clone(),
            frame.request_id.clone(),
            auth.clone(),
        ));
        return;
    }

    if !shared.dispatching.load(Ordering::Acquire) {
        tracing::debug!(session_id = %session.id, method = frame.method(), "dropped call before dispatch start");
        return;
    }
    let reply = Reply::new(frame.request_id.clone(), session.clone());
    shared.dispatcher.dispatch(&frame, reply);
}

fn request_error(shared: &Shared, session: &SessionHandle, error: String) {
    tracing::debug!(session_id = %session.id, %error, "request error");
    shared.emit(TransportEvent::RequestError {
        session_id: session.id,
        error,
    });
}

/// Verify credentials and cache the principal. Only a recognised login
/// attempt gets here, and it always gets an answer.
async fn login(shared: Arc<Shared>, session: SessionHandle, request_id: RequestId, auth: Args) {
    match shared.bindings.authenticator.login(&auth).await {
        Ok(principal) => {
            let email = principal.email.clone();
            if !shared.registry.authenticate(&session.id, principal) {
                tracing::debug!(session_id = %session.id, "session closed during login");
                return;
            }
            tracing::info!(session_id = %session.id, email = ?email, "session logged in");
            shared.emit(TransportEvent::LoggedIn {
                session_id: session.id,
                email: email.clone(),
            });
            session.send_frame(&ReplyFrame::ok(request_id, email.map_or(Value::Null, Value::String)));
        }
        Err(e) => {
            tracing::debug!(session_id = %session.id, error = %e, "login rejected");
            session.send_frame(&ReplyFrame::err(request_id, e));
        }
    }
}
