//! # Connection Registry
//!
//! Process-scoped map of admitted command-channel connections, used for
//! server-initiated push.
//!
//! Each connection owns a bounded outbound queue drained by its transport
//! loop. Push never waits: a full queue drops the message for that
//! connection only, so one slow client cannot stall the others.
//!
//! ## Invariants
//! - A connection is removed at most once; later removals return `false`
//! - Push to a removed connection is a no-op

use std::collections::HashMap;
use std::sync::RwLock;

use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use super::connection::ConnectionTag;
use super::envelope::ResultEnvelope;
use crate::auth::Role;

/// Outbound queue depth per connection
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Frames queued for a connection's transport loop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
}

/// Public view of an admitted connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub id: Uuid,
    pub tag: ConnectionTag,
    /// Role fixed at admission
    pub role: Role,
    pub remote: String,
}

/// Which connections a push targets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushScope {
    All,
    Connection(Uuid),
    App(String),
    AllExcept(Uuid),
}

impl PushScope {
    fn includes(&self, info: &ConnectionInfo) -> bool {
        match self {
            PushScope::All => true,
            PushScope::Connection(id) => info.id == *id,
            PushScope::App(app) => info.tag.app.as_deref() == Some(app.as_str()),
            PushScope::AllExcept(id) => info.id != *id,
        }
    }
}

#[derive(Debug)]
struct Entry {
    info: ConnectionInfo,
    sender: mpsc::Sender<Outbound>,
}

#[derive(Debug)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, Entry>>,
    queue_capacity: usize,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

impl ConnectionRegistry {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Add a connection and return the receiving end of its outbound queue
    pub fn register(&self, info: ConnectionInfo) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);

        if let Ok(mut connections) = self.connections.write() {
            connections.insert(info.id, Entry { info, sender: tx });
        }

        rx
    }

    /// Remove a connection; `true` only the first time
    pub fn remove(&self, id: Uuid) -> bool {
        match self.connections.write() {
            Ok(mut connections) => connections.remove(&id).is_some(),
            Err(_) => false,
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.connections
            .read()
            .map(|c| c.contains_key(&id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.connections.read().map(|c| c.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the admitted connections
    pub fn connections(&self) -> Vec<ConnectionInfo> {
        self.connections
            .read()
            .map(|c| c.values().map(|e| e.info.clone()).collect())
            .unwrap_or_default()
    }

    /// Push an unsolicited payload; returns how many queues accepted it
    pub fn push(&self, payload: &ResultEnvelope, scope: &PushScope) -> usize {
        let frame = Outbound::Text(payload.to_json());
        let targets: Vec<(Uuid, mpsc::Sender<Outbound>)> = match self.connections.read() {
            Ok(connections) => connections
                .values()
                .filter(|e| scope.includes(&e.info))
                .map(|e| (e.info.id, e.sender.clone()))
                .collect(),
            Err(_) => return 0,
        };

        let mut delivered = 0;
        for (id, sender) in targets {
            match sender.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(connection = %id, "push queue full, dropping message");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    // Transport already gone; its loop removes the entry.
                }
            }
        }
        delivered
    }
}
