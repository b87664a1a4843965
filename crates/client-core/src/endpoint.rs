//! Remote endpoints, their connections and presence resolution.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use peerlink_session_core::{ConnectionId, EndpointId};

/// Presence of one connection. Unknown values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Presence {
    Chat,
    Available,
    Away,
    Dnd,
    Xa,
    Unavailable,
    Other(String),
}

impl Presence {
    /// Lower ranks win when several connections disagree
    pub fn rank(&self) -> usize {
        match self {
            Presence::Chat => 0,
            Presence::Available => 1,
            Presence::Away => 2,
            Presence::Dnd => 3,
            Presence::Xa => 4,
            Presence::Unavailable => 5,
            Presence::Other(_) => 6,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Presence::Chat => "chat",
            Presence::Available => "available",
            Presence::Away => "away",
            Presence::Dnd => "dnd",
            Presence::Xa => "xa",
            Presence::Unavailable => "unavailable",
            Presence::Other(value) => value,
        }
    }

    pub fn is_online(&self) -> bool {
        !matches!(self, Presence::Unavailable)
    }
}

impl From<&str> for Presence {
    fn from(value: &str) -> Self {
        match value {
            "chat" => Presence::Chat,
            "available" => Presence::Available,
            "away" => Presence::Away,
            "dnd" => Presence::Dnd,
            "xa" => Presence::Xa,
            "unavailable" => Presence::Unavailable,
            other => Presence::Other(other.to_string()),
        }
    }
}

impl From<String> for Presence {
    fn from(value: String) -> Self {
        Presence::from(value.as_str())
    }
}

impl From<Presence> for String {
    fn from(value: Presence) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for Presence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Collapses the presence of every connection into one endpoint presence
pub type PresenceResolver = Arc<dyn Fn(&[Presence]) -> Presence + Send + Sync>;

/// Highest-priority presence among `presences`; `unavailable` when there are none.
pub fn resolve_presence(presences: &[Presence]) -> Presence {
    presences
        .iter()
        .min_by_key(|p| p.rank())
        .cloned()
        .unwrap_or(Presence::Unavailable)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub presence: Presence,
    pub updated_at: DateTime<Utc>,
}

pub struct Endpoint {
    id: EndpointId,
    connections: RwLock<HashMap<ConnectionId, Connection>>,
    resolver: Option<PresenceResolver>,
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.id)
            .field("connections", &self.connections.read().len())
            .field("presence", &self.presence())
            .finish()
    }
}

impl Endpoint {
    pub fn new(id: EndpointId, resolver: Option<PresenceResolver>) -> Self {
        Self {
            id,
            connections: RwLock::new(HashMap::new()),
            resolver,
        }
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    /// Record the presence of one connection. Returns the resolved endpoint presence.
    pub fn update_presence(&self, connection: ConnectionId, presence: Presence) -> Presence {
        {
            let mut connections = self.connections.write();
            connections.insert(
                connection.clone(),
                Connection {
                    id: connection,
                    presence,
                    updated_at: Utc::now(),
                },
            );
        }
        self.presence()
    }

    pub fn remove_connection(&self, connection: &ConnectionId) -> Option<Connection> {
        self.connections.write().remove(connection)
    }

    pub fn connection(&self, connection: &ConnectionId) -> Option<Connection> {
        self.connections.read().get(connection).cloned()
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.connections.read().values().cloned().collect()
    }

    /// Connections worth ringing: everything not `unavailable`
    pub fn online_connections(&self) -> Vec<ConnectionId> {
        self.connections
            .read()
            .values()
            .filter(|c| c.presence.is_online())
            .map(|c| c.id.clone())
            .collect()
    }

    pub fn presence(&self) -> Presence {
        let presences: Vec<Presence> = self
            .connections
            .read()
            .values()
            .map(|c| c.presence.clone())
            .collect();
        match &self.resolver {
            Some(resolver) => resolver(presences.as_slice()),
            None => resolve_presence(&presences),
        }
    }
}

/// Endpoints the client has heard of, created on first use
#[derive(Default)]
pub struct EndpointRegistry {
    endpoints: DashMap<EndpointId, Arc<Endpoint>>,
    resolver: Option<PresenceResolver>,
}

impl EndpointRegistry {
    pub fn new(resolver: Option<PresenceResolver>) -> Self {
        Self {
            endpoints: DashMap::new(),
            resolver,
        }
    }

    pub fn get_or_create(&self, id: &EndpointId) -> Arc<Endpoint> {
        self.endpoints
            .entry(id.clone())
            .or_insert_with(|| {
                debug!(endpoint = %id, "tracking new endpoint");
                Arc::new(Endpoint::new(id.clone(), self.resolver.clone()))
            })
            .clone()
    }

    pub fn get(&self, id: &EndpointId) -> Option<Arc<Endpoint>> {
        self.endpoints.get(id).map(|e| e.clone())
    }

    pub fn all(&self) -> Vec<Arc<Endpoint>> {
        self.endpoints.iter().map(|e| e.value().clone()).collect()
    }

    pub fn clear(&self) {
        self.endpoints.clear();
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}
