use time::OffsetDateTime;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, instrument, warn};

use crate::{
    db::StorageError,
    messages::{Message, SharedMessageStore},
};

use super::{hub::Hub, ConnectionId, Frame, SessionRegistry};

pub const SYSTEM_SENDER: &str = "System";
pub const WELCOME_TEXT: &str = "Welcome to the chat!";

const QUEUE_CAPACITY: usize = 64;
const PUBLIC_TOPIC_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The connection never joined, or has since closed.
    Unbound,
    /// `senderUsername` differs from the username bound to the connection.
    SenderMismatch,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    Dropped(DropReason),
    Delivered { message: Message, deliveries: usize },
}

#[derive(Clone)]
pub struct MessageRouter {
    sessions: SessionRegistry,
    hub: Hub,
    store: SharedMessageStore,
}

/// A registered connection: its id and the two streams it must forward to the
/// client. Dropping `guard` unbinds and deregisters the connection.
pub struct Connection {
    pub id: ConnectionId,
    pub queue: mpsc::Receiver<Frame>,
    pub public: broadcast::Receiver<Frame>,
    pub guard: ConnectionGuard,
}

pub struct ConnectionGuard {
    id: ConnectionId,
    router: MessageRouter,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.router.close(self.id);
    }
}

impl MessageRouter {
    pub fn new(store: SharedMessageStore) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            hub: Hub::new(QUEUE_CAPACITY, PUBLIC_TOPIC_CAPACITY),
            store,
        }
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn open(&self) -> Connection {
        let id = ConnectionId::new();
        let (queue, public) = self.hub.register(id);
        debug!(connection = %id, "connection registered");

        Connection {
            id,
            queue,
            public,
            guard: ConnectionGuard {
                id,
                router: self.clone(),
            },
        }
    }

    /// The claimed username is trusted as is.
    pub fn join(&self, connection: ConnectionId, username: &str) {
        if username.is_empty() {
            warn!(%connection, "ignoring join without a username");
            return;
        }

        if let Some(previous) = self.sessions.bind(connection, username) {
            if previous != username {
                self.hub.unsubscribe(connection, &previous);
            }
        }
        self.hub.subscribe(connection, username);

        let welcomed = self
            .hub
            .deliver(username, &Message::chat(SYSTEM_SENDER, username, WELCOME_TEXT));
        self.hub.broadcast(Message::join(username));

        info!(%connection, %username, welcomed, "user joined");
    }

    /// Unbound connections and spoofed senders are dropped without persisting
    /// anything. A message to oneself is delivered once.
    #[instrument(skip_all, fields(%connection))]
    pub async fn send_private(
        &self,
        connection: ConnectionId,
        mut message: Message,
    ) -> Result<Routed, StorageError> {
        message.timestamp = Some(OffsetDateTime::now_utc());

        let Some(bound) = self.sessions.lookup(connection) else {
            warn!("dropping private message from a connection that never joined");
            return Ok(Routed::Dropped(DropReason::Unbound));
        };
        if bound != message.sender_username {
            warn!(%bound, claimed = %message.sender_username, "dropping private message with spoofed sender");
            return Ok(Routed::Dropped(DropReason::SenderMismatch));
        }

        let message = self.store.save(message).await?;

        let mut deliveries = self.hub.deliver(&message.receiver_username, &message);
        if message.sender_username != message.receiver_username {
            deliveries += self.hub.deliver(&message.sender_username, &message);
        }

        debug!(id = ?message.id, receiver = %message.receiver_username, deliveries, "private message routed");
        Ok(Routed::Delivered { message, deliveries })
    }

    /// Safe to call more than once.
    pub fn close(&self, connection: ConnectionId) {
        if let Some(username) = self.sessions.unbind(connection) {
            self.hub.unsubscribe(connection, &username);
            debug!(%connection, %username, "connection unbound");
        }
        self.hub.deregister(connection);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use time::macros::datetime;
    use uuid::Uuid;

    use super::*;
    use crate::messages::{MessageStore, MessageType};

    #[derive(Default)]
    struct RecordingStore {
        saved: Mutex<Vec<Message>>,
    }

    impl RecordingStore {
        fn saved(&self) -> Vec<Message> {
            self.saved.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MessageStore for RecordingStore {
        async fn save(&self, mut message: Message) -> Result<Message, StorageError> {
            message.id = Some(Uuid::now_v7());
            self.saved.lock().unwrap().push(message.clone());
            Ok(message)
        }

        async fn find_between(&self, sender: &str, receiver: &str) -> Result<Vec<Message>, StorageError> {
            Ok(self
                .saved()
                .into_iter()
                .filter(|m| m.sender_username == sender && m.receiver_username == receiver)
                .collect())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl MessageStore for FailingStore {
        async fn save(&self, _: Message) -> Result<Message, StorageError> {
            Err(StorageError::Database(sqlx::Error::PoolClosed))
        }

        async fn find_between(&self, _: &str, _: &str) -> Result<Vec<Message>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn setup() -> (MessageRouter, Arc<RecordingStore>) {
        let store = Arc::new(RecordingStore::default());
        (MessageRouter::new(store.clone()), store)
    }

    fn drain(conn: &mut Connection) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = conn.queue.try_recv() {
            frames.push(frame);
        }
        frames
    }

    fn joined(router: &MessageRouter, username: &str) -> Connection {
        let mut conn = router.open();
        router.join(conn.id, username);
        drain(&mut conn);
        conn
    }

    #[test]
    fn join_binds_and_welcomes() {
        let (router, _) = setup();
        let mut conn = router.open();

        router.join(conn.id, "alice");

        assert_eq!(router.sessions().lookup(conn.id).as_deref(), Some("alice"));
        let frames = drain(&mut conn);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].destination, "/user/alice/queue/messages");
        assert_eq!(frames[0].body.sender_username, SYSTEM_SENDER);
        assert_eq!(frames[0].body.receiver_username, "alice");
        assert_eq!(frames[0].body.content, WELCOME_TEXT);
        assert_eq!(frames[0].body.kind, MessageType::Chat);
    }

    #[test]
    fn join_is_announced_on_the_public_topic() {
        let (router, _) = setup();
        let mut watcher = router.open();
        let conn = router.open();

        router.join(conn.id, "alice");

        let frame = watcher.public.try_recv().unwrap();
        assert_eq!(frame.destination, "/topic/public");
        assert_eq!(frame.body.kind, MessageType::Join);
        assert_eq!(frame.body.sender_username, "alice");
    }

    #[test]
    fn repeated_join_keeps_one_binding() {
        let (router, _) = setup();
        let mut conn = router.open();

        router.join(conn.id, "alice");
        router.join(conn.id, "alice");

        assert_eq!(router.sessions().len(), 1);
        assert_eq!(router.sessions().lookup(conn.id).as_deref(), Some("alice"));
        drain(&mut conn);
        assert_eq!(router.hub.deliver("alice", &Message::chat("x", "alice", "once")), 1);
    }

    #[test]
    fn rejoin_under_new_name_moves_the_subscription() {
        let (router, _) = setup();
        let mut conn = router.open();

        router.join(conn.id, "alice");
        router.join(conn.id, "bob");
        drain(&mut conn);

        assert_eq!(router.hub.deliver("alice", &Message::chat("x", "alice", "old")), 0);
        assert_eq!(router.hub.deliver("bob", &Message::chat("x", "bob", "new")), 1);
    }

    #[test]
    fn empty_username_does_not_bind() {
        let (router, _) = setup();
        let conn = router.open();

        router.join(conn.id, "");

        assert_eq!(router.sessions().lookup(conn.id), None);
    }

    #[tokio::test]
    async fn private_message_reaches_receiver_and_echoes_to_sender() {
        let (router, store) = setup();
        let mut alice = joined(&router, "alice");
        let mut bob = joined(&router, "bob");

        let routed = router
            .send_private(alice.id, Message::chat("alice", "bob", "hi"))
            .await
            .unwrap();

        let (message, deliveries) = match routed {
            Routed::Delivered { message, deliveries } => (message, deliveries),
            other => panic!("expected delivery, got {other:?}"),
        };
        assert_eq!(deliveries, 2);
        assert!(message.id.is_some());

        let saved = store.saved();
        assert_eq!(saved.len(), 1);
        assert_eq!((saved[0].sender_username.as_str(), saved[0].receiver_username.as_str()), ("alice", "bob"));
        assert_eq!(saved[0].content, "hi");

        let to_bob = drain(&mut bob);
        assert_eq!(to_bob.len(), 1);
        assert_eq!(to_bob[0].destination, "/user/bob/queue/messages");
        assert_eq!(to_bob[0].body.content, "hi");

        let to_alice = drain(&mut alice);
        assert_eq!(to_alice.len(), 1);
        assert_eq!(to_alice[0].destination, "/user/alice/queue/messages");
        assert_eq!(to_alice[0].body, to_bob[0].body);
    }

    #[tokio::test]
    async fn message_to_self_is_delivered_once() {
        let (router, store) = setup();
        let mut alice = joined(&router, "alice");

        let routed = router
            .send_private(alice.id, Message::chat("alice", "alice", "note to self"))
            .await
            .unwrap();

        assert!(matches!(routed, Routed::Delivered { deliveries: 1, .. }));
        assert_eq!(drain(&mut alice).len(), 1);
        assert_eq!(store.saved().len(), 1);
    }

    #[tokio::test]
    async fn timestamp_is_set_at_routing_time() {
        let (router, store) = setup();
        let alice = joined(&router, "alice");
        let mut message = Message::chat("alice", "bob", "hi");
        let client_supplied = datetime!(2001-01-01 00:00:00 UTC);
        message.timestamp = Some(client_supplied);

        let before = OffsetDateTime::now_utc();
        router.send_private(alice.id, message).await.unwrap();

        let stamped = store.saved()[0].timestamp.unwrap();
        assert_ne!(stamped, client_supplied);
        assert!(stamped >= before);
    }

    #[tokio::test]
    async fn unjoined_connection_is_dropped() {
        let (router, store) = setup();
        let mut alice = joined(&router, "alice");
        let eve = router.open();

        let routed = router
            .send_private(eve.id, Message::chat("eve", "alice", "x"))
            .await
            .unwrap();

        assert_eq!(routed, Routed::Dropped(DropReason::Unbound));
        assert!(store.saved().is_empty());
        assert!(drain(&mut alice).is_empty());
    }

    #[tokio::test]
    async fn spoofed_sender_is_dropped() {
        let (router, store) = setup();
        let mut alice = joined(&router, "alice");
        let mut bob = joined(&router, "bob");

        let routed = router
            .send_private(alice.id, Message::chat("bob", "alice", "spoof"))
            .await
            .unwrap();

        assert_eq!(routed, Routed::Dropped(DropReason::SenderMismatch));
        assert!(store.saved().is_empty());
        assert!(drain(&mut alice).is_empty());
        assert!(drain(&mut bob).is_empty());
    }

    #[tokio::test]
    async fn closed_connection_is_treated_as_unbound() {
        let (router, store) = setup();
        let alice = joined(&router, "alice");

        router.close(alice.id);
        let routed = router
            .send_private(alice.id, Message::chat("alice", "bob", "after close"))
            .await
            .unwrap();

        assert_eq!(routed, Routed::Dropped(DropReason::Unbound));
        assert!(store.saved().is_empty());
    }

    #[tokio::test]
    async fn dropping_the_connection_unbinds_it() {
        let (router, _) = setup();
        let alice = joined(&router, "alice");
        let id = alice.id;

        drop(alice);

        assert_eq!(router.sessions().lookup(id), None);
        assert_eq!(router.hub.deliver("alice", &Message::chat("x", "alice", "gone")), 0);
    }

    #[tokio::test]
    async fn offline_receiver_still_gets_persisted() {
        let (router, store) = setup();
        let mut alice = joined(&router, "alice");

        let routed = router
            .send_private(alice.id, Message::chat("alice", "carol", "are you there?"))
            .await
            .unwrap();

        assert!(matches!(routed, Routed::Delivered { deliveries: 1, .. }));
        assert_eq!(drain(&mut alice).len(), 1);
        assert_eq!(store.find_between("alice", "carol").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn every_device_of_the_receiver_gets_a_copy() {
        let (router, _) = setup();
        let alice = joined(&router, "alice");
        let mut bob_phone = joined(&router, "bob");
        let mut bob_laptop = joined(&router, "bob");
        // the laptop's welcome also landed on the phone
        drain(&mut bob_phone);

        let routed = router
            .send_private(alice.id, Message::chat("alice", "bob", "hi"))
            .await
            .unwrap();

        assert!(matches!(routed, Routed::Delivered { deliveries: 3, .. }));
        assert_eq!(drain(&mut bob_phone).len(), 1);
        assert_eq!(drain(&mut bob_laptop).len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_delivers_nothing() {
        let router = MessageRouter::new(Arc::new(FailingStore));
        let mut alice = joined(&router, "alice");
        let mut bob = joined(&router, "bob");

        let result = router
            .send_private(alice.id, Message::chat("alice", "bob", "lost"))
            .await;

        assert!(matches!(result, Err(StorageError::Database(_))));
        assert!(drain(&mut alice).is_empty());
        assert!(drain(&mut bob).is_empty());
    }
}
