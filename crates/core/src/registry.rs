//! Subscription registry: which live connections listen on which channel.
//!
//! One registry is built per serving process and shared by reference (`Arc`) with the
//! dispatcher and every connection handler. Membership is process-local and ephemeral.
//!
//! Each subscriber is an unbounded sender. `broadcast` never waits on a receiver, so a slow
//! dashboard can not hold up the write path. A send that fails means the receiving connection is
//! gone; that subscriber is pruned and the broadcast carries on with the rest.

use crate::constants::{ENTITY_CHANNEL_PREFIX, USER_CHANNEL_PREFIX};
use crate::model::{EntityId, UserId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// A named broadcast destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `entity:{id}`: item status changes for requests issued by the entity.
    Entity(EntityId),
    /// `user:{id}`: request created/updated events for the data owner.
    User(UserId),
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Entity(id) => write!(f, "{ENTITY_CHANNEL_PREFIX}:{id}"),
            Channel::User(id) => write!(f, "{USER_CHANNEL_PREFIX}:{id}"),
        }
    }
}

/// Identifies one live connection across all the channels it joins.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A pre-serialised event on its way to a connection, tagged by kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelMessage {
    AccessRequestEvent { message: Arc<str> },
    AccessRequestItemEvent { message: Arc<str> },
}

impl ChannelMessage {
    pub fn message(&self) -> &str {
        match self {
            ChannelMessage::AccessRequestEvent { message }
            | ChannelMessage::AccessRequestItemEvent { message } => message,
        }
    }
}

type Subscribers = HashMap<ConnectionId, UnboundedSender<ChannelMessage>>;

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    channels: Mutex<HashMap<Channel, Subscribers>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock can not leave the map half-updated, so the poisoned state
    // is safe to keep using.
    fn channels(&self) -> MutexGuard<'_, HashMap<Channel, Subscribers>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers `sender` under `connection` on `channel`, replacing any previous sender.
    pub fn subscribe(
        &self,
        channel: Channel,
        connection: ConnectionId,
        sender: UnboundedSender<ChannelMessage>,
    ) {
        self.channels()
            .entry(channel)
            .or_default()
            .insert(connection, sender);
        tracing::debug!(%channel, %connection, "subscribed");
    }

    /// Removes `connection` from `channel`. Returns whether it was registered.
    pub fn unsubscribe(&self, channel: Channel, connection: ConnectionId) -> bool {
        let mut channels = self.channels();
        let Some(subscribers) = channels.get_mut(&channel) else {
            return false;
        };

        let removed = subscribers.remove(&connection).is_some();
        if subscribers.is_empty() {
            channels.remove(&channel);
        }
        if removed {
            tracing::debug!(%channel, %connection, "unsubscribed");
        }
        removed
    }

    /// Sends `message` to every connection on `channel` and returns how many accepted it.
    ///
    /// Never fails. Subscribers whose receiver has been dropped are removed.
    pub fn broadcast(&self, channel: Channel, message: ChannelMessage) -> usize {
        let mut channels = self.channels();
        let Some(subscribers) = channels.get_mut(&channel) else {
            tracing::debug!(%channel, "broadcast to channel with no subscribers");
            return 0;
        };

        let mut delivered = 0;
        subscribers.retain(|connection, sender| match sender.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::warn!(%channel, %connection, "dropping closed subscriber");
                false
            }
        });

        if subscribers.is_empty() {
            channels.remove(&channel);
        }

        tracing::debug!(%channel, delivered, "broadcast");
        delivered
    }

    pub fn subscriber_count(&self, channel: Channel) -> usize {
        self.channels().get(&channel).map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn item_event(body: &str) -> ChannelMessage {
        ChannelMessage::AccessRequestItemEvent {
            message: Arc::from(body),
        }
    }

    #[test]
    fn test_channel_names() {
        assert_eq!(Channel::Entity(EntityId(4)).to_string(), "entity:4");
        assert_eq!(Channel::User(UserId(9)).to_string(), "user:9");
    }

    #[test]
    fn test_broadcast_without_subscribers_is_noop() {
        let registry = SubscriptionRegistry::new();
        assert_eq!(registry.broadcast(Channel::User(UserId(1)), item_event("{}")), 0);
    }

    #[test]
    fn test_broadcast_skips_severed_subscriber() {
        let registry = SubscriptionRegistry::new();
        let channel = Channel::Entity(EntityId(1));

        let mut receivers = Vec::new();
        for _ in 0..3 {
            let (tx, rx) = unbounded_channel();
            registry.subscribe(channel, ConnectionId::new(), tx);
            receivers.push(rx);
        }
        // Sever the middle connection.
        drop(receivers.remove(1));

        assert_eq!(registry.broadcast(channel, item_event("hello")), 2);
        for rx in receivers.iter_mut() {
            let msg = rx.try_recv().expect("live subscriber should receive");
            assert_eq!(msg.message(), "hello");
        }
        assert_eq!(registry.subscriber_count(channel), 2, "severed one is pruned");
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let registry = SubscriptionRegistry::new();
        let channel = Channel::User(UserId(2));
        let (tx, mut rx) = unbounded_channel();
        let conn = ConnectionId::new();

        registry.subscribe(channel, conn, tx);
        assert!(registry.unsubscribe(channel, conn));
        assert!(!registry.unsubscribe(channel, conn), "second call is a no-op");

        assert_eq!(registry.broadcast(channel, item_event("late")), 0);
        assert!(rx.try_recv().is_err());
        assert_eq!(registry.subscriber_count(channel), 0);
    }

    #[test]
    fn test_channels_are_isolated() {
        let registry = SubscriptionRegistry::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        registry.subscribe(Channel::Entity(EntityId(1)), ConnectionId::new(), tx_a);
        registry.subscribe(Channel::Entity(EntityId(2)), ConnectionId::new(), tx_b);

        registry.broadcast(Channel::Entity(EntityId(1)), item_event("one"));

        assert_eq!(rx_a.try_recv().expect("should receive").message(), "one");
        assert!(rx_b.try_recv().is_err());
    }

    #[test]
    fn test_per_channel_order_is_preserved() {
        let registry = SubscriptionRegistry::new();
        let channel = Channel::Entity(EntityId(1));
        let (tx, mut rx) = unbounded_channel();
        registry.subscribe(channel, ConnectionId::new(), tx);

        for n in 0..5 {
            registry.broadcast(channel, item_event(&n.to_string()));
        }
        for n in 0..5 {
            assert_eq!(rx.try_recv().expect("in order").message(), n.to_string());
        }
    }

    #[test]
    fn test_concurrent_subscribe_and_unsubscribe() {
        let registry = Arc::new(SubscriptionRegistry::new());
        let channel = Channel::User(UserId(1));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let (tx, _rx) = unbounded_channel();
                        let conn = ConnectionId::new();
                        registry.subscribe(channel, conn, tx);
                        assert!(registry.unsubscribe(channel, conn));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("thread should finish");
        }

        assert_eq!(registry.subscriber_count(channel), 0);
    }
}
