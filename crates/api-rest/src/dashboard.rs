//! WebSocket endpoints for entity and user dashboards.
//!
//! The identity is resolved before the upgrade, so an unknown entity or user gets a plain
//! `404` and is never subscribed. After the upgrade the socket is split: a writer task drains
//! outbound text into the sink while [`LiveConnection::run`] consumes inbound frames.

use crate::error::ApiError;
use crate::extract::ApiPath;
use crate::AppState;
use alinea_core::live::{DashboardIdentity, InboundFrame, LiveConnection};
use alinea_core::{EntityId, UserId};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{future, SinkExt, StreamExt};
use tokio::sync::mpsc::unbounded_channel;

#[axum::debug_handler]
pub async fn entity_dashboard(
    State(state): State<AppState>,
    ApiPath(entity_id): ApiPath<i64>,
    ws: WebSocketUpgrade,
) -> Response {
    accept(ws, DashboardIdentity::Entity(EntityId(entity_id)), &state).await
}

#[axum::debug_handler]
pub async fn user_dashboard(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ws: WebSocketUpgrade,
) -> Response {
    accept(ws, DashboardIdentity::User(UserId(user_id)), &state).await
}

async fn accept(ws: WebSocketUpgrade, identity: DashboardIdentity, state: &AppState) -> Response {
    match LiveConnection::connect(identity, &state.core).await {
        Ok(connection) => ws.on_upgrade(move |socket| serve(socket, connection)),
        Err(e) => {
            tracing::warn!(channel = %identity.channel(), error = %e, "dashboard refused");
            ApiError::from(e).into_response()
        }
    }
}

async fn serve(socket: WebSocket, connection: LiveConnection) {
    let (mut sink, stream) = socket.split();
    let (outbound, mut pending) = unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(text) = pending.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let inbound = stream.filter_map(|frame| {
        future::ready(match frame {
            Ok(Message::Text(text)) => Some(InboundFrame::Text(text)),
            Ok(Message::Close(_)) => Some(InboundFrame::Close),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!("dashboard socket error: {}", e);
                Some(InboundFrame::Close)
            }
        })
    });

    connection.run(inbound, outbound).await;

    if let Err(e) = writer.await {
        tracing::error!("dashboard writer failed: {:?}", e);
    }
}
