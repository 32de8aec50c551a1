//! Live dashboard connections.
//!
//! A [`LiveConnection`] is the transport-independent half of a dashboard socket. The API layer
//! adapts its socket into a stream of [`InboundFrame`]s plus an outbound text sender and hands
//! both to [`LiveConnection::run`].
//!
//! ## Lifecycle
//!
//! ```text
//! Connecting ──resolve identity──▶ Subscribed ──client close / transport error──▶ Closed
//!      │                                │
//!      └─ unknown identity: refused     ├─ inbound commands ─▶ reply on the same socket
//!         (nothing subscribed)          └─ pushed events    ─▶ forwarded verbatim
//! ```
//!
//! The states are carried by the types: [`LiveConnection::connect`] is the connecting step, a
//! `LiveConnection` value is subscribed, and [`LiveConnection::run`] returning means closed.
//!
//! Pushed events are forwarded by their own task, so a slow command never delays them. Channel
//! membership is held by a guard that unsubscribes on drop; a connection that errors, panics or
//! is cancelled still leaves the registry clean.

use crate::model::{DataType, EntityId, UserId};
use crate::registry::{Channel, ChannelMessage, ConnectionId, SubscriptionRegistry};
use crate::{AccessError, AccessResult, CoreServices};
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

/// Reply sent for a successful create command.
pub const CREATED_REPLY: &str = "AccessRequest and AccessRequestItems created successfully.";

const INVALID_DATA_REPLY: &str = "Invalid data received.";

/// Whose dashboard a connection is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DashboardIdentity {
    Entity(EntityId),
    User(UserId),
}

impl DashboardIdentity {
    pub fn channel(&self) -> Channel {
        match self {
            DashboardIdentity::Entity(id) => Channel::Entity(*id),
            DashboardIdentity::User(id) => Channel::User(*id),
        }
    }

    /// Entity dashboards take item events; user dashboards take request events.
    fn accepts(&self, message: &ChannelMessage) -> bool {
        matches!(
            (self, message),
            (
                DashboardIdentity::Entity(_),
                ChannelMessage::AccessRequestItemEvent { .. }
            ) | (
                DashboardIdentity::User(_),
                ChannelMessage::AccessRequestEvent { .. }
            )
        )
    }
}

/// A frame received from the client, already stripped of transport details.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Close,
}

/// Registry membership of one connection. Dropping it unsubscribes from every channel.
struct Subscription {
    registry: Arc<SubscriptionRegistry>,
    connection: ConnectionId,
    channels: Vec<Channel>,
}

impl Subscription {
    fn join(
        registry: Arc<SubscriptionRegistry>,
        connection: ConnectionId,
        channels: Vec<Channel>,
        sender: UnboundedSender<ChannelMessage>,
    ) -> Self {
        for channel in &channels {
            registry.subscribe(*channel, connection, sender.clone());
        }
        Self {
            registry,
            connection,
            channels,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for channel in self.channels.drain(..) {
            self.registry.unsubscribe(channel, self.connection);
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateRequestCommand {
    selected_data_types: Vec<String>,
    #[serde(default)]
    user_id: Option<i64>,
    #[serde(default)]
    purpose: Option<String>,
}

/// One dashboard connection that has been accepted and subscribed.
pub struct LiveConnection {
    id: ConnectionId,
    identity: DashboardIdentity,
    services: CoreServices,
    events: UnboundedReceiver<ChannelMessage>,
    subscription: Subscription,
}

impl LiveConnection {
    /// Resolves `identity` and subscribes to its channel.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound`/`UserNotFound` if the identity does not exist. Nothing is
    /// subscribed in that case and the caller must not accept the socket.
    pub async fn connect(identity: DashboardIdentity, services: &CoreServices) -> AccessResult<Self> {
        let directory = services.directory.clone();
        tokio::task::spawn_blocking(move || match identity {
            DashboardIdentity::Entity(id) => directory.get_entity(id).map(|_| ()),
            DashboardIdentity::User(id) => directory.get_user(id).map(|_| ()),
        })
        .await
        .map_err(|e| AccessError::TaskJoin(e.to_string()))??;

        let id = ConnectionId::new();
        let (sender, events) = unbounded_channel();
        let subscription = Subscription::join(
            services.registry.clone(),
            id,
            vec![identity.channel()],
            sender,
        );
        tracing::info!(connection = %id, channel = %identity.channel(), "dashboard connected");

        Ok(Self {
            id,
            identity,
            services: services.clone(),
            events,
            subscription,
        })
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn identity(&self) -> DashboardIdentity {
        self.identity
    }

    /// Serves the connection until the client goes away.
    ///
    /// Sends the confirmation greeting, forwards pushed events and answers commands. Consumes the
    /// connection; once this returns it is closed and unsubscribed.
    pub async fn run<S>(self, mut inbound: S, outbound: UnboundedSender<String>)
    where
        S: Stream<Item = InboundFrame> + Unpin + Send,
    {
        let LiveConnection {
            id,
            identity,
            services,
            events,
            subscription,
            ..
        } = self;

        let greeting = json!({ "message": format!("Connected to {}", identity.channel()) });
        if outbound.send(greeting.to_string()).is_ok() {
            let forwarder = tokio::spawn(forward_events(identity, events, outbound.clone()));

            while let Some(frame) = inbound.next().await {
                let text = match frame {
                    InboundFrame::Text(text) => text,
                    InboundFrame::Close => break,
                };
                let reply = handle_command(identity, &services, &text).await;
                if outbound.send(reply.to_string()).is_err() {
                    break;
                }
            }

            forwarder.abort();
        }

        drop(subscription);
        tracing::info!(connection = %id, channel = %identity.channel(), "dashboard disconnected");
    }
}

async fn forward_events(
    identity: DashboardIdentity,
    mut events: UnboundedReceiver<ChannelMessage>,
    outbound: UnboundedSender<String>,
) {
    while let Some(message) = events.recv().await {
        if !identity.accepts(&message) {
            tracing::warn!(channel = %identity.channel(), "ignoring event of unexpected kind");
            continue;
        }
        if outbound.send(message.message().to_string()).is_err() {
            break;
        }
    }
}

async fn handle_command(
    identity: DashboardIdentity,
    services: &CoreServices,
    text: &str,
) -> serde_json::Value {
    let DashboardIdentity::Entity(entity_id) = identity else {
        return json!({ "error": "This dashboard does not accept commands." });
    };

    let command: CreateRequestCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(error = %e, "malformed dashboard command");
            return json!({ "error": INVALID_DATA_REPLY });
        }
    };

    match create_from_command(entity_id, services, command).await {
        Ok((request_id, data_types)) => json!({
            "message": CREATED_REPLY,
            "access_request_id": request_id,
            "selected_data_types": data_types,
        }),
        Err(e) => {
            tracing::warn!(entity_id = %entity_id, error = %e, "dashboard command failed");
            json!({ "error": e.to_string() })
        }
    }
}

async fn create_from_command(
    entity_id: EntityId,
    services: &CoreServices,
    command: CreateRequestCommand,
) -> AccessResult<(i64, Vec<DataType>)> {
    if command.selected_data_types.is_empty() {
        return Err(AccessError::InvalidInput(
            "selected_data_types must not be empty".into(),
        ));
    }
    let data_types = DataType::parse_all(&command.selected_data_types)?;
    let user_id = command
        .user_id
        .map(UserId)
        .unwrap_or_else(|| services.cfg.default_user_id());
    let purpose = command
        .purpose
        .unwrap_or_else(|| services.cfg.dashboard_purpose().to_string());

    let access = services.access.clone();
    let types = data_types.clone();
    let created = tokio::task::spawn_blocking(move || {
        access.create_access_request(entity_id, user_id, &purpose, &types)
    })
    .await
    .map_err(|e| AccessError::TaskJoin(e.to_string()))??;

    Ok((created.id.0, data_types))
}
