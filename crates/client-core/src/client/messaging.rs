//! Presence, text messages and groups

use tracing::{debug, info};

use peerlink_session_core::EndpointId;

use crate::channel::Message;
use crate::endpoint::Presence;
use crate::error::ClientResult;
use crate::group::{GroupId, GroupMember};

impl super::Client {
    /// Publish our own presence
    pub async fn set_presence(&self, presence: Presence) -> ClientResult<()> {
        let identity = self.require_identity()?;
        self.channel.send_presence(&presence).await?;
        self.get_endpoint(&identity.endpoint_id)
            .update_presence(identity.connection_id, presence.clone());
        debug!(%presence, "presence published");
        Ok(())
    }

    pub async fn send_message(&self, to: EndpointId, body: impl Into<String>) -> ClientResult<Message> {
        let identity = self.require_identity()?;
        let mut message = Message::new(to, body);
        message.from_endpoint = Some(identity.endpoint_id);
        message.from_connection = Some(identity.connection_id);

        self.channel.send_message(&message).await?;
        self.stats.lock().messages_sent += 1;
        Ok(message)
    }

    /// Join `group` and learn its current members
    pub async fn join_group(&self, group: GroupId) -> ClientResult<Vec<GroupMember>> {
        self.require_identity()?;
        self.channel.join_group(&group).await?;
        self.groups.joined(group.clone());
        info!(%group, "joined group");
        self.get_group_members(&group).await
    }

    pub async fn leave_group(&self, group: &GroupId) -> ClientResult<()> {
        self.require_identity()?;
        self.channel.leave_group(group).await?;
        self.groups.left(group);
        info!(%group, "left group");
        Ok(())
    }

    /// Fetch the member list from the service and remember it
    pub async fn get_group_members(&self, group: &GroupId) -> ClientResult<Vec<GroupMember>> {
        self.require_identity()?;
        let members = self.channel.get_group_members(group).await?;
        for member in &members {
            self.get_endpoint(&member.endpoint_id);
        }
        self.groups.set_members(group, members.clone());
        Ok(members)
    }

    /// Members known locally, without asking the service
    pub fn known_group_members(&self, group: &GroupId) -> Vec<GroupMember> {
        self.groups.members(group)
    }

    pub fn joined_groups(&self) -> Vec<GroupId> {
        self.groups.groups()
    }
}
