use std::{collections::HashSet, sync::Arc};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{
    broadcast,
    mpsc::{self, error::TrySendError},
};
use tracing::{trace, warn};

use crate::messages::Message;

use super::ConnectionId;

pub const PUBLIC_TOPIC: &str = "/topic/public";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub destination: String,
    pub body: Message,
}

impl Frame {
    pub fn queue(username: &str, body: Message) -> Self {
        Self {
            destination: user_queue(username),
            body,
        }
    }

    pub fn public(body: Message) -> Self {
        Self {
            destination: PUBLIC_TOPIC.to_owned(),
            body,
        }
    }
}

pub fn user_queue(username: &str) -> String {
    format!("/user/{username}/queue/messages")
}

/// A private queue per connection, a subscription set per username, and the
/// public topic. Queues are bounded: a client that stops reading loses frames
/// instead of growing its queue.
#[derive(Clone)]
pub(crate) struct Hub {
    outbound: Arc<DashMap<ConnectionId, mpsc::Sender<Frame>>>,
    queues: Arc<DashMap<String, HashSet<ConnectionId>>>,
    public: broadcast::Sender<Frame>,
    queue_capacity: usize,
}

impl Hub {
    pub(crate) fn new(queue_capacity: usize, public_capacity: usize) -> Self {
        Self {
            outbound: Arc::default(),
            queues: Arc::default(),
            public: broadcast::channel(public_capacity).0,
            queue_capacity,
        }
    }

    pub(crate) fn register(
        &self,
        connection: ConnectionId,
    ) -> (mpsc::Receiver<Frame>, broadcast::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.outbound.insert(connection, tx);
        (rx, self.public.subscribe())
    }

    pub(crate) fn deregister(&self, connection: ConnectionId) {
        self.outbound.remove(&connection);
    }

    pub(crate) fn subscribe(&self, connection: ConnectionId, username: &str) {
        self.queues
            .entry(username.to_owned())
            .or_default()
            .insert(connection);
    }

    pub(crate) fn unsubscribe(&self, connection: ConnectionId, username: &str) {
        if let Some(mut subscribers) = self.queues.get_mut(username) {
            subscribers.remove(&connection);
        }
        self.queues.remove_if(username, |_, subscribers| subscribers.is_empty());
    }

    /// Returns how many connections were reached; zero just means nobody is
    /// listening.
    pub(crate) fn deliver(&self, username: &str, message: &Message) -> usize {
        let Some(subscribers) = self.queues.get(username) else {
            trace!(%username, "no live subscription");
            return 0;
        };

        let frame = Frame::queue(username, message.clone());
        subscribers
            .iter()
            .filter(|connection| {
                let Some(tx) = self.outbound.get(*connection) else {
                    return false;
                };
                match tx.try_send(frame.clone()) {
                    Ok(()) => true,
                    Err(TrySendError::Full(_)) => {
                        warn!(connection = %**connection, %username, "outbound queue full, dropping frame");
                        false
                    }
                    Err(TrySendError::Closed(_)) => false,
                }
            })
            .count()
    }

    pub(crate) fn broadcast(&self, message: Message) -> usize {
        self.public.send(Frame::public(message)).unwrap_or(0)
    }
}
