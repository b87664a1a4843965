//! Groups the local endpoint has joined and their known members.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use peerlink_session_core::{ConnectionId, EndpointId};

#[derive(Debug, Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub String);

impl GroupId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GroupId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for GroupId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub endpoint_id: EndpointId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
}

impl GroupMember {
    pub fn new(endpoint_id: EndpointId, connection_id: Option<ConnectionId>) -> Self {
        Self {
            endpoint_id,
            connection_id,
        }
    }
}

#[derive(Default)]
pub struct GroupRegistry {
    groups: DashMap<GroupId, HashSet<GroupMember>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joined(&self, group: GroupId) {
        self.groups.entry(group).or_default();
    }

    pub fn left(&self, group: &GroupId) -> bool {
        self.groups.remove(group).is_some()
    }

    pub fn is_member(&self, group: &GroupId) -> bool {
        self.groups.contains_key(group)
    }

    /// Replace the known members of `group`
    pub fn set_members(&self, group: &GroupId, members: Vec<GroupMember>) {
        if let Some(mut known) = self.groups.get_mut(group) {
            *known = members.into_iter().collect();
        }
    }

    /// Returns false when the group is not joined or the member was already known.
    pub fn add_member(&self, group: &GroupId, member: GroupMember) -> bool {
        match self.groups.get_mut(group) {
            Some(mut known) => known.insert(member),
            None => false,
        }
    }

    pub fn remove_member(&self, group: &GroupId, member: &GroupMember) -> bool {
        match self.groups.get_mut(group) {
            Some(mut known) => known.remove(member),
            None => false,
        }
    }

    pub fn members(&self, group: &GroupId) -> Vec<GroupMember> {
        self.groups
            .get(group)
            .map(|known| known.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn groups(&self) -> Vec<GroupId> {
        self.groups.iter().map(|g| g.key().clone()).collect()
    }

    pub fn clear(&self) {
        self.groups.clear();
    }
}
