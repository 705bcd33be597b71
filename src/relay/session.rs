use std::{fmt, sync::Arc};

use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Connection → username bindings for every joined connection.
///
/// One username may be bound to many connections (several devices); a
/// connection is bound to at most one username, last join wins.
#[derive(Debug, Default, Clone)]
pub struct SessionRegistry {
    bindings: Arc<DashMap<ConnectionId, String>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `connection` to `username`, returning the username it replaced.
    pub fn bind(&self, connection: ConnectionId, username: impl Into<String>) -> Option<String> {
        self.bindings.insert(connection, username.into())
    }

    pub fn lookup(&self, connection: ConnectionId) -> Option<String> {
        self.bindings.get(&connection).map(|username| username.value().clone())
    }

    pub fn unbind(&self, connection: ConnectionId) -> Option<String> {
        self.bindings.remove(&connection).map(|(_, username)| username)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
